//! This module defines abstract syntax tree (AST) types for SQL.

use enum_as_inner::EnumAsInner;

use crate::errors::SourcePositionRange;
use crate::sql_type::SqlType;

#[derive(Debug, Clone, PartialEq)]
pub struct SelectClause {
    pub items: Vec<SelItem>,
}
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColName {
    pub name: String,
}
impl std::fmt::Display for ColName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.name.fmt(f)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SelItem {
    Expr { expr: Expr, alias: Option<ColName> },
    Star,
}

impl std::fmt::Display for SelItem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SelItem::Expr { expr, alias: None } => expr.fmt(f),
            SelItem::Expr {
                expr,
                alias: Some(a),
            } => write!(f, "{} AS {}", expr, a),
            SelItem::Star => "*".fmt(f),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FromClause {
    pub tablename: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SelectStatement {
    pub distinct: bool,
    pub select: SelectClause,
    pub from: Option<FromClause>,
    pub r#where: Option<Expr>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetOp {
    UnionAll,
    Union,
    Except,
}

impl std::fmt::Display for SetOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SetOp::UnionAll => "UNION ALL".fmt(f),
            SetOp::Union => "UNION".fmt(f),
            SetOp::Except => "EXCEPT".fmt(f),
        }
    }
}

/// A query is a chain of selects combined left to right by set operations.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub first: SelectStatement,
    pub rest: Vec<(SetOp, SelectStatement)>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColDef {
    pub colname: ColName,
    pub coltype: SqlType,
    pub nullable: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateStatement {
    pub tablename: String,
    pub coldefs: Vec<ColDef>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CreateViewStatement {
    pub viewname: String,
    pub query: Query,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InsertStatement {
    pub tablename: String,
    pub columns: Option<Vec<ColName>>,
    pub values: Vec<Vec<Expr>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeleteStatement {
    pub tablename: String,
    pub r#where: Option<Expr>,
}

#[derive(Debug, Clone, PartialEq, EnumAsInner)]
pub enum Statement {
    CreateTable(CreateStatement),
    CreateView(CreateViewStatement),
    Insert(InsertStatement),
    Delete(DeleteStatement),
}

/// A statement together with where it came from in the session's source text.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedStatement {
    pub statement: Statement,
    pub range: SourcePositionRange,
    pub text: String,
    pub comment: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Constant {
    Int(i64),
    String(String),
    Real(f64),
    Bool(bool),
    Null(),
}

impl std::fmt::Display for Constant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Constant::Int(x) => x.fmt(f),
            Constant::String(x) => write!(f, "'{}'", x.replace('\'', "''")),
            Constant::Real(x) => x.fmt(f),
            Constant::Bool(x) => match x {
                true => "TRUE".fmt(f),
                false => "FALSE".fmt(f),
            },
            Constant::Null() => "NULL".fmt(f),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Constant(Constant),
    ColName(ColName),
    BinOp {
        lhs: Box<Expr>,
        op: Op,
        rhs: Box<Expr>,
    },
    UnaryOp {
        op: UnaryOp,
        expr: Box<Expr>,
    },
    IsNull {
        expr: Box<Expr>,
        negated: bool,
    },
}

impl std::fmt::Display for Expr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Expr::Constant(x) => x.fmt(f),
            Expr::ColName(x) => x.fmt(f),
            Expr::BinOp { lhs, op, rhs } => write!(f, "({} {} {})", lhs, op, rhs),
            Expr::UnaryOp { op, expr } => write!(f, "{}{}", op, expr),
            Expr::IsNull {
                expr,
                negated: false,
            } => write!(f, "({} IS NULL)", expr),
            Expr::IsNull {
                expr,
                negated: true,
            } => write!(f, "({} IS NOT NULL)", expr),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum Op {
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    And,
    Or,
}

impl Op {
    pub fn is_arithmetic(&self) -> bool {
        use Op::*;
        matches!(self, Add | Subtract | Multiply | Divide | Modulo)
    }

    pub fn is_comparison(&self) -> bool {
        use Op::*;
        matches!(self, Eq | NotEq | Lt | LtEq | Gt | GtEq)
    }
}

impl std::fmt::Display for Op {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        use Op::*;
        match self {
            Add => "+".fmt(f),
            Subtract => "-".fmt(f),
            Multiply => "*".fmt(f),
            Divide => "/".fmt(f),
            Modulo => "%".fmt(f),
            Eq => "=".fmt(f),
            NotEq => "<>".fmt(f),
            Lt => "<".fmt(f),
            LtEq => "<=".fmt(f),
            Gt => ">".fmt(f),
            GtEq => ">=".fmt(f),
            And => "AND".fmt(f),
            Or => "OR".fmt(f),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum UnaryOp {
    Neg,
    Not,
}

impl std::fmt::Display for UnaryOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UnaryOp::Neg => "-".fmt(f),
            UnaryOp::Not => "NOT ".fmt(f),
        }
    }
}
