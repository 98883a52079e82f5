//! Defines an enum of the basic SQL supported column types and routines for conversion to and from string.
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
/// These are the basic types that a SQL value can have.
/// Notes:
///   - `Null` is only the type of a bare `NULL` literal.  It is compatible with every other type
///     and never appears as a declared column type.
///   - Type name aliases like `varchar` are accepted in create statements, but map onto the canonical type.
pub enum SqlType {
    Int,
    Real,
    Text,
    Bool,
    Null,
}

impl std::fmt::Display for SqlType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SqlType::Int => "integer".fmt(f),
            SqlType::Real => "real".fmt(f),
            SqlType::Text => "text".fmt(f),
            SqlType::Bool => "boolean".fmt(f),
            SqlType::Null => "null".fmt(f),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("Unable to parse SqlType from creation SQL: {0}.")]
    ParseSqlTypeError(String),
}

impl FromStr for SqlType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // VARCHAR(10) and friends: the length is accepted and ignored.
        let base = match s.find('(') {
            Some(idx) => &s[..idx],
            None => s,
        };
        match base.trim().to_lowercase().as_str() {
            "int" | "integer" | "bigint" | "smallint" | "tinyint" => Ok(SqlType::Int),
            "real" | "double" | "float" | "decimal" | "numeric" => Ok(SqlType::Real),
            "text" | "string" | "varchar" | "char" => Ok(SqlType::Text),
            "boolean" | "bool" => Ok(SqlType::Bool),
            x => Err(Error::ParseSqlTypeError(String::from(x))),
        }
    }
}

impl SqlType {
    pub fn is_numeric(&self) -> bool {
        matches!(self, SqlType::Int | SqlType::Real | SqlType::Null)
    }

    /// Name used for this type in the I/O metadata handed to execution backends.
    pub fn io_name(&self) -> &'static str {
        match self {
            SqlType::Int => "INTEGER",
            SqlType::Real => "DOUBLE",
            SqlType::Text => "VARCHAR",
            SqlType::Bool => "BOOLEAN",
            SqlType::Null => "NULL",
        }
    }

    /// Returns the type both operands can be converted to, if any.
    pub fn unify(self, other: SqlType) -> Option<SqlType> {
        use SqlType::*;
        match (self, other) {
            (Null, x) | (x, Null) => Some(x),
            (Int, Real) | (Real, Int) => Some(Real),
            (x, y) if x == y => Some(x),
            _ => None,
        }
    }
}

use crate::ast;
pub fn from_ast_constant(c: &ast::Constant) -> SqlType {
    match c {
        ast::Constant::Int(_) => SqlType::Int,
        ast::Constant::String(_) => SqlType::Text,
        ast::Constant::Real(_) => SqlType::Real,
        ast::Constant::Bool(_) => SqlType::Bool,
        ast::Constant::Null() => SqlType::Null,
    }
}

#[test]
fn test_parse_sql_types() {
    let cases = vec![
        ("int", SqlType::Int),
        ("INTEGER", SqlType::Int),
        ("BigInt", SqlType::Int),
        ("double", SqlType::Real),
        ("real", SqlType::Real),
        ("varchar(20)", SqlType::Text),
        ("string", SqlType::Text),
        ("Boolean", SqlType::Bool),
    ];
    for (input, expected) in cases {
        assert_eq!(SqlType::from_str(input), Ok(expected));
    }
    assert!(SqlType::from_str("blob").is_err());
}

#[test]
fn test_unify() {
    assert_eq!(SqlType::Int.unify(SqlType::Real), Some(SqlType::Real));
    assert_eq!(SqlType::Null.unify(SqlType::Text), Some(SqlType::Text));
    assert_eq!(SqlType::Bool.unify(SqlType::Bool), Some(SqlType::Bool));
    assert_eq!(SqlType::Text.unify(SqlType::Int), None);
}
