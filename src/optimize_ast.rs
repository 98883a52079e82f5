//! simplifies ast trees.
//! - evaluates constant subexpressions in select items, where clauses and inserted values.

use crate::ast;
use crate::sql_value::{self, SqlValue};

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("{0}")]
    Eval(#[from] sql_value::Error),
    #[error("Expression {0} is not a constant")]
    NotConstant(String),
}

fn as_constant(expr: &ast::Expr) -> Option<SqlValue> {
    match expr {
        ast::Expr::Constant(c) => Some(sql_value::from_ast_constant(c)),
        _ => None,
    }
}

/// Folds every subexpression whose operands are all constants.  Column references are left alone.
pub fn simplify_expr(expr: &ast::Expr) -> Result<ast::Expr, Error> {
    use ast::Expr;
    Ok(match expr {
        Expr::Constant(_) | Expr::ColName(_) => expr.clone(),
        Expr::BinOp { lhs, op, rhs } => {
            let lhs = simplify_expr(lhs)?;
            let rhs = simplify_expr(rhs)?;
            match (as_constant(&lhs), as_constant(&rhs)) {
                (Some(l), Some(r)) => Expr::Constant(sql_value::to_ast_constant(&l.binop(op, &r)?)),
                _ => Expr::BinOp {
                    lhs: Box::new(lhs),
                    op: *op,
                    rhs: Box::new(rhs),
                },
            }
        }
        Expr::UnaryOp { op, expr } => {
            let inner = simplify_expr(expr)?;
            match as_constant(&inner) {
                Some(v) => Expr::Constant(sql_value::to_ast_constant(&v.unop(op)?)),
                None => Expr::UnaryOp {
                    op: *op,
                    expr: Box::new(inner),
                },
            }
        }
        Expr::IsNull { expr, negated } => {
            let inner = simplify_expr(expr)?;
            match as_constant(&inner) {
                Some(v) => Expr::Constant(ast::Constant::Bool(v.is_null() != *negated)),
                None => Expr::IsNull {
                    expr: Box::new(inner),
                    negated: *negated,
                },
            }
        }
    })
}

/// Evaluates an expression that must not refer to any column, like the items of a VALUES list.
pub fn eval_constant_expr(expr: &ast::Expr) -> Result<SqlValue, Error> {
    let simplified = simplify_expr(expr)?;
    as_constant(&simplified).ok_or_else(|| Error::NotConstant(expr.to_string()))
}

pub fn simplify_ast_select_statement(ss: &mut ast::SelectStatement) -> Result<(), Error> {
    for item in ss.select.items.iter_mut() {
        if let ast::SelItem::Expr { expr, .. } = item {
            *expr = simplify_expr(expr)?;
        }
    }
    if let Some(w) = &ss.r#where {
        ss.r#where = Some(simplify_expr(w)?);
    }
    Ok(())
}

#[cfg(test)]
fn int(i: i64) -> Box<ast::Expr> {
    Box::new(ast::Expr::Constant(ast::Constant::Int(i)))
}

#[test]
fn test_simplify_ast_select_statement() {
    struct Case {
        desc: String,
        input: ast::SelectStatement,
        expected: ast::SelectStatement,
    }
    let col_x = ast::Expr::ColName(ast::ColName {
        name: "x".to_string(),
    });
    let cases: Vec<Case> = vec![
        Case {
            desc: "Select 1+1;".to_string(),
            input: ast::SelectStatement {
                distinct: false,
                select: ast::SelectClause {
                    items: vec![ast::SelItem::Expr {
                        expr: ast::Expr::BinOp {
                            lhs: int(1),
                            op: crate::ast::Op::Add,
                            rhs: int(1),
                        },
                        alias: None,
                    }],
                },
                from: None,
                r#where: None,
            },
            expected: ast::SelectStatement {
                distinct: false,
                select: ast::SelectClause {
                    items: vec![ast::SelItem::Expr {
                        expr: *int(2),
                        alias: None,
                    }],
                },
                from: None,
                r#where: None,
            },
        },
        Case {
            desc: "Select x + (2 * 3) from t where 1 < 2;".to_string(),
            input: ast::SelectStatement {
                distinct: false,
                select: ast::SelectClause {
                    items: vec![ast::SelItem::Expr {
                        expr: ast::Expr::BinOp {
                            lhs: Box::new(col_x.clone()),
                            op: ast::Op::Add,
                            rhs: Box::new(ast::Expr::BinOp {
                                lhs: int(2),
                                op: ast::Op::Multiply,
                                rhs: int(3),
                            }),
                        },
                        alias: None,
                    }],
                },
                from: Some(ast::FromClause {
                    tablename: String::from("t"),
                }),
                r#where: Some(ast::Expr::BinOp {
                    lhs: int(1),
                    op: ast::Op::Lt,
                    rhs: int(2),
                }),
            },
            expected: ast::SelectStatement {
                distinct: false,
                select: ast::SelectClause {
                    items: vec![ast::SelItem::Expr {
                        expr: ast::Expr::BinOp {
                            lhs: Box::new(col_x.clone()),
                            op: ast::Op::Add,
                            rhs: int(6),
                        },
                        alias: None,
                    }],
                },
                from: Some(ast::FromClause {
                    tablename: String::from("t"),
                }),
                r#where: Some(ast::Expr::Constant(ast::Constant::Bool(true))),
            },
        },
    ];
    for case in cases {
        println!("Running case: {}", case.desc);
        let mut actual = case.input.clone();
        let res = simplify_ast_select_statement(&mut actual);
        if res.is_ok() {
            assert_eq!(actual, case.expected);
        } else {
            println!("Actual's error: {}", res.unwrap_err());
            assert!(false, "Actual was not ok");
        }
    }
}

#[test]
fn test_eval_constant_expr() {
    let neg = ast::Expr::UnaryOp {
        op: ast::UnaryOp::Neg,
        expr: int(5),
    };
    assert_eq!(eval_constant_expr(&neg), Ok(SqlValue::Int(-5)));
    let is_null = ast::Expr::IsNull {
        expr: Box::new(ast::Expr::Constant(ast::Constant::Null())),
        negated: false,
    };
    assert_eq!(eval_constant_expr(&is_null), Ok(SqlValue::Bool(true)));
    let col = ast::Expr::ColName(ast::ColName {
        name: "x".to_string(),
    });
    assert!(matches!(eval_constant_expr(&col), Err(Error::NotConstant(_))));
    let div = ast::Expr::BinOp {
        lhs: int(1),
        op: ast::Op::Divide,
        rhs: int(0),
    };
    assert_eq!(
        eval_constant_expr(&div),
        Err(Error::Eval(sql_value::Error::DivisionByZero))
    );
}
