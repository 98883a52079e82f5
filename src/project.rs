//! provides helper functions for the projection block of a query, and name resolution and typing of
//! expressions against the columns of the relation they range over.

use crate::ast;
use crate::ir::ScalarExpr;
use crate::sql_type::{self, SqlType};
use crate::sql_value;
use crate::table_traits::Column;

/// Name given to projected expressions that are neither a plain column nor aliased.
pub const UNNAMED_COLUMN: &str = "?column?";

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("Column '{name}' not found; available columns are: {available}")]
    ColumnNotFound { name: String, available: String },
    #[error("Cannot apply {op} to {lhs} and {rhs}")]
    BinaryTypeMismatch {
        op: String,
        lhs: SqlType,
        rhs: SqlType,
    },
    #[error("Cannot apply {op} to {ty}")]
    UnaryTypeMismatch { op: String, ty: SqlType },
    #[error("{clause} must be a boolean expression, found {ty}")]
    NotBoolean { clause: String, ty: SqlType },
}

/// A resolved expression and the type of its result.
#[derive(Debug, Clone, PartialEq)]
pub struct TypedExpr {
    pub expr: ScalarExpr,
    pub ty: SqlType,
    pub nullable: bool,
}

fn find_column(columns: &[Column], name: &str) -> Result<usize, Error> {
    columns
        .iter()
        .position(|c| c.name == name)
        .ok_or_else(|| Error::ColumnNotFound {
            name: name.to_string(),
            available: columns
                .iter()
                .map(|c| c.name.clone())
                .collect::<Vec<String>>()
                .join(", "),
        })
}

/// Resolves column names to positions in `columns` and computes the result type.
pub fn resolve_expr(expr: &ast::Expr, columns: &[Column]) -> Result<TypedExpr, Error> {
    match expr {
        ast::Expr::Constant(c) => {
            let ty = sql_type::from_ast_constant(c);
            Ok(TypedExpr {
                expr: ScalarExpr::Literal(sql_value::from_ast_constant(c)),
                ty,
                nullable: ty == SqlType::Null,
            })
        }
        ast::Expr::ColName(n) => {
            let idx = find_column(columns, &n.name)?;
            Ok(TypedExpr {
                expr: ScalarExpr::Column(idx),
                ty: columns[idx].ty,
                nullable: columns[idx].nullable,
            })
        }
        ast::Expr::BinOp { lhs, op, rhs } => {
            let l = resolve_expr(lhs, columns)?;
            let r = resolve_expr(rhs, columns)?;
            let mismatch = || Error::BinaryTypeMismatch {
                op: op.to_string(),
                lhs: l.ty,
                rhs: r.ty,
            };
            let ty = if op.is_arithmetic() {
                if !l.ty.is_numeric() || !r.ty.is_numeric() {
                    return Err(mismatch());
                }
                l.ty.unify(r.ty).ok_or_else(mismatch)?
            } else if op.is_comparison() {
                l.ty.unify(r.ty).ok_or_else(mismatch)?;
                SqlType::Bool
            } else {
                // AND, OR
                let logical = |t: SqlType| matches!(t, SqlType::Bool | SqlType::Null);
                if !logical(l.ty) || !logical(r.ty) {
                    return Err(mismatch());
                }
                SqlType::Bool
            };
            Ok(TypedExpr {
                nullable: l.nullable || r.nullable,
                expr: ScalarExpr::Binary {
                    op: *op,
                    lhs: Box::new(l.expr),
                    rhs: Box::new(r.expr),
                },
                ty,
            })
        }
        ast::Expr::UnaryOp { op, expr } => {
            let e = resolve_expr(expr, columns)?;
            let ok = match op {
                ast::UnaryOp::Neg => e.ty.is_numeric(),
                ast::UnaryOp::Not => matches!(e.ty, SqlType::Bool | SqlType::Null),
            };
            if !ok {
                return Err(Error::UnaryTypeMismatch {
                    op: op.to_string().trim().to_string(),
                    ty: e.ty,
                });
            }
            let ty = match op {
                ast::UnaryOp::Neg => e.ty,
                ast::UnaryOp::Not => SqlType::Bool,
            };
            Ok(TypedExpr {
                expr: ScalarExpr::Unary {
                    op: *op,
                    expr: Box::new(e.expr),
                },
                ty,
                nullable: e.nullable,
            })
        }
        ast::Expr::IsNull { expr, negated } => {
            let e = resolve_expr(expr, columns)?;
            Ok(TypedExpr {
                expr: ScalarExpr::IsNull {
                    expr: Box::new(e.expr),
                    negated: *negated,
                },
                ty: SqlType::Bool,
                nullable: false,
            })
        }
    }
}

/// Resolves a predicate; it must be boolean (a bare NULL is accepted and filters out every row).
pub fn resolve_predicate(
    expr: &ast::Expr,
    columns: &[Column],
    clause: &str,
) -> Result<ScalarExpr, Error> {
    let typed = resolve_expr(expr, columns)?;
    match typed.ty {
        SqlType::Bool | SqlType::Null => Ok(typed.expr),
        ty => Err(Error::NotBoolean {
            clause: clause.to_string(),
            ty,
        }),
    }
}

/// builds the information needed to do a project of a relation: one expression per output column,
/// and the output schema.  `*` expands to every input column.
pub fn build_project(
    in_columns: &[Column],
    out_cols: &[ast::SelItem],
) -> Result<(Vec<ScalarExpr>, Vec<Column>), Error> {
    let mut exprs = vec![];
    let mut out_columns = vec![];
    for out_item in out_cols.iter() {
        match out_item {
            ast::SelItem::Star => {
                for (i, c) in in_columns.iter().enumerate() {
                    exprs.push(ScalarExpr::Column(i));
                    out_columns.push(c.clone());
                }
            }
            ast::SelItem::Expr { expr, alias } => {
                let typed = resolve_expr(expr, in_columns)?;
                let name = match (alias, expr) {
                    (Some(a), _) => a.name.clone(),
                    (None, ast::Expr::ColName(n)) => n.name.clone(),
                    // Postgres calls it "?column?"; sqlite names columns after the expression text.
                    (None, _) => UNNAMED_COLUMN.to_string(),
                };
                exprs.push(typed.expr);
                out_columns.push(Column::new(name, typed.ty, typed.nullable));
            }
        }
    }
    Ok((exprs, out_columns))
}

#[cfg(test)]
fn test_columns() -> Vec<Column> {
    vec![
        Column::new("a", SqlType::Int, false),
        Column::new("b", SqlType::Real, true),
        Column::new("c", SqlType::Text, true),
    ]
}

#[cfg(test)]
fn col(name: &str) -> Box<ast::Expr> {
    Box::new(ast::Expr::ColName(ast::ColName {
        name: name.to_string(),
    }))
}

#[test]
fn test_build_project() {
    let items = vec![
        ast::SelItem::Expr {
            expr: *col("c"),
            alias: None,
        },
        ast::SelItem::Expr {
            expr: ast::Expr::BinOp {
                lhs: col("a"),
                op: ast::Op::Add,
                rhs: col("b"),
            },
            alias: Some(ast::ColName {
                name: "s".to_string(),
            }),
        },
        ast::SelItem::Expr {
            expr: ast::Expr::Constant(ast::Constant::Int(1)),
            alias: None,
        },
    ];
    let (exprs, columns) = build_project(&test_columns(), &items).unwrap();
    assert_eq!(
        exprs.iter().map(|e| e.to_string()).collect::<Vec<String>>(),
        vec!["#2", "(#0 + #1)", "1"]
    );
    assert_eq!(
        columns,
        vec![
            Column::new("c", SqlType::Text, true),
            Column::new("s", SqlType::Real, true),
            Column::new(UNNAMED_COLUMN, SqlType::Int, false),
        ]
    );
}

#[test]
fn test_build_project_star() {
    let (exprs, columns) = build_project(&test_columns(), &[ast::SelItem::Star]).unwrap();
    assert_eq!(exprs.len(), 3);
    assert_eq!(columns, test_columns());
}

#[test]
fn test_resolve_errors() {
    struct Case {
        desc: &'static str,
        input: ast::Expr,
    }
    let cases = vec![
        Case {
            desc: "unknown column",
            input: *col("z"),
        },
        Case {
            desc: "text arithmetic",
            input: ast::Expr::BinOp {
                lhs: col("c"),
                op: ast::Op::Multiply,
                rhs: col("a"),
            },
        },
        Case {
            desc: "comparing text with number",
            input: ast::Expr::BinOp {
                lhs: col("c"),
                op: ast::Op::Lt,
                rhs: col("a"),
            },
        },
        Case {
            desc: "AND on integers",
            input: ast::Expr::BinOp {
                lhs: col("a"),
                op: ast::Op::And,
                rhs: col("a"),
            },
        },
        Case {
            desc: "NOT on text",
            input: ast::Expr::UnaryOp {
                op: ast::UnaryOp::Not,
                expr: col("c"),
            },
        },
    ];
    for case in cases {
        println!("Running case: {}", case.desc);
        assert!(resolve_expr(&case.input, &test_columns()).is_err());
    }
}

#[test]
fn test_resolve_predicate() {
    let cols = test_columns();
    let pred = ast::Expr::BinOp {
        lhs: col("a"),
        op: ast::Op::GtEq,
        rhs: col("b"),
    };
    assert!(resolve_predicate(&pred, &cols, "WHERE").is_ok());
    assert_eq!(
        resolve_predicate(&col("a"), &cols, "WHERE"),
        Err(Error::NotBoolean {
            clause: "WHERE".to_string(),
            ty: SqlType::Int
        })
    );
}
