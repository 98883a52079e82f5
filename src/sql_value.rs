//! Defines an enum of all the possible values that a SQL value can have, and the scalar operations on them.

use std::cmp::Ordering;
use std::hash::{Hash, Hasher};

use crate::ast;
use crate::sql_type::SqlType;

#[derive(Debug, Clone)]
/// can hold any value that can be stored in table.
/// Values are any of the types in `sql_type::SqlType`, or `NULL`.
///
/// Values are used as keys of weighted relations, so they are totally ordered and hashable:
/// values of different types never compare equal (`Int(1)` and `Real(1.0)` are distinct keys), and
/// reals are compared by their IEEE total order.  SQL comparison semantics live in `binop`.
pub enum SqlValue {
    Int(i64),
    Text(String),
    Real(f64),
    Bool(bool),
    Null(),
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("Invalid types in binary expression: {lhs} {op} {rhs}")]
    TypeMismatch { lhs: String, op: String, rhs: String },
    #[error("Invalid type in unary expression: {op}{value}")]
    UnaryTypeMismatch { op: String, value: String },
    #[error("Division by zero")]
    DivisionByZero,
    #[error("Integer overflow in {lhs} {op} {rhs}")]
    Overflow { lhs: String, op: String, rhs: String },
    #[error("Cannot convert {value} to {to}")]
    InvalidCast { value: String, to: SqlType },
}

impl std::fmt::Display for SqlValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SqlValue::Int(x) => x.fmt(f),
            SqlValue::Text(x) => x.fmt(f),
            SqlValue::Real(x) => x.fmt(f),
            SqlValue::Bool(x) => x.fmt(f),
            SqlValue::Null() => "NULL".fmt(f),
        }
    }
}

impl SqlValue {
    fn rank(&self) -> u8 {
        match self {
            SqlValue::Null() => 0,
            SqlValue::Bool(_) => 1,
            SqlValue::Int(_) => 2,
            SqlValue::Real(_) => 3,
            SqlValue::Text(_) => 4,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null())
    }

    pub fn sql_type(&self) -> SqlType {
        match self {
            SqlValue::Int(_) => SqlType::Int,
            SqlValue::Text(_) => SqlType::Text,
            SqlValue::Real(_) => SqlType::Real,
            SqlValue::Bool(_) => SqlType::Bool,
            SqlValue::Null() => SqlType::Null,
        }
    }

    /// Truth value of a predicate result.  `NULL` is neither true nor false.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            SqlValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Converts a value to a column type.  Integers widen to reals; `NULL` fits any type.
    pub fn cast_to(&self, to: SqlType) -> Result<SqlValue, Error> {
        match (self, to) {
            (SqlValue::Null(), _) => Ok(SqlValue::Null()),
            (SqlValue::Int(i), SqlType::Real) => Ok(SqlValue::Real(*i as f64)),
            (v, t) if v.sql_type() == t => Ok(v.clone()),
            (v, t) => Err(Error::InvalidCast {
                value: v.to_string(),
                to: t,
            }),
        }
    }

    fn type_mismatch(&self, op: &ast::Op, rhs: &SqlValue) -> Error {
        Error::TypeMismatch {
            lhs: self.to_string(),
            op: op.to_string(),
            rhs: rhs.to_string(),
        }
    }

    /// Applies a binary operator with SQL semantics: `NULL` propagates through arithmetic and
    /// comparisons, and `AND`/`OR` use three-valued logic.
    pub fn binop(&self, op: &ast::Op, rhs: &SqlValue) -> Result<SqlValue, Error> {
        use ast::Op::*;
        use SqlValue::*;
        match op {
            And => {
                return match (self.logic_operand(op, rhs)?, rhs.logic_operand(op, self)?) {
                    (Some(false), _) | (_, Some(false)) => Ok(Bool(false)),
                    (Some(true), Some(true)) => Ok(Bool(true)),
                    _ => Ok(Null()),
                }
            }
            Or => {
                return match (self.logic_operand(op, rhs)?, rhs.logic_operand(op, self)?) {
                    (Some(true), _) | (_, Some(true)) => Ok(Bool(true)),
                    (Some(false), Some(false)) => Ok(Bool(false)),
                    _ => Ok(Null()),
                }
            }
            _ => (),
        }
        if self.is_null() || rhs.is_null() {
            return Ok(Null());
        }
        if op.is_comparison() {
            let ordering = self.sql_compare(rhs).ok_or_else(|| self.type_mismatch(op, rhs))?;
            let result = match op {
                Eq => ordering == Ordering::Equal,
                NotEq => ordering != Ordering::Equal,
                Lt => ordering == Ordering::Less,
                LtEq => ordering != Ordering::Greater,
                Gt => ordering == Ordering::Greater,
                GtEq => ordering != Ordering::Less,
                _ => unreachable!(),
            };
            return Ok(Bool(result));
        }
        match (self, rhs) {
            (Int(i), Int(j)) => do_int_binop(*i, op, *j).map(Int),
            (Real(i), Real(j)) => Ok(Real(do_real_binop(*i, op, *j))),
            (Int(i), Real(j)) => Ok(Real(do_real_binop(*i as f64, op, *j))),
            (Real(i), Int(j)) => Ok(Real(do_real_binop(*i, op, *j as f64))),
            _ => Err(self.type_mismatch(op, rhs)),
        }
    }

    fn logic_operand(&self, op: &ast::Op, other: &SqlValue) -> Result<Option<bool>, Error> {
        match self {
            SqlValue::Bool(b) => Ok(Some(*b)),
            SqlValue::Null() => Ok(None),
            _ => Err(self.type_mismatch(op, other)),
        }
    }

    pub fn unop(&self, op: &ast::UnaryOp) -> Result<SqlValue, Error> {
        use SqlValue::*;
        match (op, self) {
            (_, Null()) => Ok(Null()),
            (ast::UnaryOp::Neg, Int(i)) => i.checked_neg().map(Int).ok_or(Error::Overflow {
                lhs: "0".to_string(),
                op: "-".to_string(),
                rhs: i.to_string(),
            }),
            (ast::UnaryOp::Neg, Real(f)) => Ok(Real(-f)),
            (ast::UnaryOp::Not, Bool(b)) => Ok(Bool(!b)),
            (op, v) => Err(Error::UnaryTypeMismatch {
                op: op.to_string(),
                value: v.to_string(),
            }),
        }
    }

    /// Compares two non-null values of compatible types; numbers compare across `Int` and `Real`.
    pub fn sql_compare(&self, other: &SqlValue) -> Option<Ordering> {
        use SqlValue::*;
        match (self, other) {
            (Int(i), Int(j)) => Some(i.cmp(j)),
            (Real(i), Real(j)) => i.partial_cmp(j),
            (Int(i), Real(j)) => (*i as f64).partial_cmp(j),
            (Real(i), Int(j)) => i.partial_cmp(&(*j as f64)),
            (Text(a), Text(b)) => Some(a.cmp(b)),
            (Bool(a), Bool(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }
}

fn do_int_binop(i: i64, op: &ast::Op, j: i64) -> Result<i64, Error> {
    use ast::Op::*;
    let overflow = || Error::Overflow {
        lhs: i.to_string(),
        op: op.to_string(),
        rhs: j.to_string(),
    };
    match op {
        Add => i.checked_add(j).ok_or_else(overflow),
        Subtract => i.checked_sub(j).ok_or_else(overflow),
        Multiply => i.checked_mul(j).ok_or_else(overflow),
        Divide if j == 0 => Err(Error::DivisionByZero),
        Divide => i.checked_div(j).ok_or_else(overflow),
        Modulo if j == 0 => Err(Error::DivisionByZero),
        Modulo => i.checked_rem(j).ok_or_else(overflow),
        _ => unreachable!("do_int_binop called with non-arithmetic operator {}", op),
    }
}

fn do_real_binop(i: f64, op: &ast::Op, j: f64) -> f64 {
    use ast::Op::*;
    match op {
        Add => i + j,
        Subtract => i - j,
        Multiply => i * j,
        Divide => i / j,
        Modulo => i % j,
        _ => unreachable!("do_real_binop called with non-arithmetic operator {}", op),
    }
}

impl PartialEq for SqlValue {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for SqlValue {}

impl PartialOrd for SqlValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SqlValue {
    fn cmp(&self, other: &Self) -> Ordering {
        use SqlValue::*;
        match (self, other) {
            (Int(a), Int(b)) => a.cmp(b),
            (Real(a), Real(b)) => a.total_cmp(b),
            (Text(a), Text(b)) => a.cmp(b),
            (Bool(a), Bool(b)) => a.cmp(b),
            (Null(), Null()) => Ordering::Equal,
            (a, b) => a.rank().cmp(&b.rank()),
        }
    }
}

impl Hash for SqlValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.rank().hash(state);
        match self {
            SqlValue::Int(i) => i.hash(state),
            SqlValue::Text(s) => s.hash(state),
            SqlValue::Real(f) => f.to_bits().hash(state),
            SqlValue::Bool(b) => b.hash(state),
            SqlValue::Null() => (),
        }
    }
}

impl serde::Serialize for SqlValue {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            SqlValue::Int(i) => serializer.serialize_i64(*i),
            SqlValue::Text(s) => serializer.serialize_str(s),
            SqlValue::Real(f) => serializer.serialize_f64(*f),
            SqlValue::Bool(b) => serializer.serialize_bool(*b),
            SqlValue::Null() => serializer.serialize_unit(),
        }
    }
}

pub fn from_ast_constant(c: &ast::Constant) -> SqlValue {
    match c {
        ast::Constant::Int(i) => SqlValue::Int(*i),
        ast::Constant::String(s) => SqlValue::Text(s.clone()),
        ast::Constant::Real(f) => SqlValue::Real(*f),
        ast::Constant::Bool(b) => SqlValue::Bool(*b),
        ast::Constant::Null() => SqlValue::Null(),
    }
}

pub fn to_ast_constant(v: &SqlValue) -> ast::Constant {
    match v {
        SqlValue::Int(i) => ast::Constant::Int(*i),
        SqlValue::Text(s) => ast::Constant::String(s.clone()),
        SqlValue::Real(f) => ast::Constant::Real(*f),
        SqlValue::Bool(b) => ast::Constant::Bool(*b),
        SqlValue::Null() => ast::Constant::Null(),
    }
}

#[test]
fn test_binop_ok() {
    use ast::Op::*;
    use SqlValue::*;
    let cases = vec![
        (Int(1), Add, Int(1), Int(2)),
        (Int(7), Modulo, Int(4), Int(3)),
        (Int(1), Add, Real(0.5), Real(1.5)),
        (Int(1), Lt, Real(1.5), Bool(true)),
        (Text("a".to_string()), Eq, Text("a".to_string()), Bool(true)),
        (Null(), Add, Int(1), Null()),
        (Null(), And, Bool(false), Bool(false)),
        (Null(), Or, Bool(true), Bool(true)),
        (Null(), Or, Bool(false), Null()),
    ];
    for case in cases {
        let res = case.0.binop(&case.1, &case.2);
        assert_eq!(res, Ok(case.3));
    }
}

#[test]
fn test_binop_err() {
    use ast::Op::*;
    use SqlValue::*;
    let cases = vec![
        (Text("foo".to_string()), Subtract, Real(1.1)),
        (Int(1), Divide, Int(0)),
        (Int(i64::MAX), Add, Int(1)),
        (Int(1), And, Bool(true)),
        (Text("a".to_string()), Lt, Int(1)),
    ];
    for case in cases {
        assert!(case.0.binop(&case.1, &case.2).is_err());
    }
}

#[test]
fn test_key_ordering_keeps_types_apart() {
    assert_ne!(SqlValue::Int(1), SqlValue::Real(1.0));
    assert!(SqlValue::Null() < SqlValue::Int(-5));
    assert_eq!(SqlValue::Real(f64::NAN), SqlValue::Real(f64::NAN));
}

#[test]
fn test_cast_to() {
    assert_eq!(SqlValue::Int(2).cast_to(SqlType::Real), Ok(SqlValue::Real(2.0)));
    assert_eq!(SqlValue::Null().cast_to(SqlType::Text), Ok(SqlValue::Null()));
    assert!(SqlValue::Text("x".to_string()).cast_to(SqlType::Int).is_err());
}
