//! `pt_to_ast` has routines for converting parse trees to ASTs for SQL.
//! A Pest parse tree has one enum for all possible terminals and non-terminals.
//! Our AST has enums for groups of terminals that are used in the same production.
//! The AST also discards some lexical detail like case.  Positions are kept only per statement.

use std::str::FromStr;

use pest::iterators::Pair;

use crate::ast;
use crate::errors::{CompilerError, SourcePosition, SourcePositionRange};
use crate::parser::{parse_expr, Rule, SQLParser, StatementText};
use crate::pest::Parser;
use crate::sql_type::SqlType;

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("{message} at {position}")]
    Syntax {
        message: String,
        position: SourcePosition,
    },
    #[error("Invalid literal: {0}")]
    InvalidLiteral(String),
    #[error("{0}")]
    UnknownType(#[from] crate::sql_type::Error),
    #[error("Unexpected parse tree: {0}")]
    Malformed(String),
}

fn malformed(pair: &Pair<Rule>) -> Error {
    Error::Malformed(format!("{:?}: {}", pair.as_rule(), pair.as_str()))
}

fn identifier(pair: &Pair<Rule>) -> String {
    pair.as_str().to_lowercase()
}

pub fn parse_literal_from_rule(pair: Pair<Rule>) -> Result<ast::Constant, Error> {
    match pair.as_rule() {
        Rule::null_literal => Ok(ast::Constant::Null()),
        Rule::true_literal => Ok(ast::Constant::Bool(true)),
        Rule::false_literal => Ok(ast::Constant::Bool(false)),
        Rule::integer_literal => str::parse::<i64>(pair.as_str())
            .map(ast::Constant::Int)
            .map_err(|e| Error::InvalidLiteral(format!("{}: {}", pair.as_str(), e))),
        // Danger: floating point conversion.
        Rule::decimal_literal => str::parse::<f64>(pair.as_str())
            .map(ast::Constant::Real)
            .map_err(|e| Error::InvalidLiteral(format!("{}: {}", pair.as_str(), e))),
        Rule::single_quoted_string => {
            let inner = pair.into_inner().next();
            Ok(ast::Constant::String(
                inner.map_or(String::new(), |s| s.as_str().replace("''", "'")),
            ))
        }
        _ => Err(malformed(&pair)),
    }
}

fn pt_create_table_to_ast(create_stmt: Pair<Rule>) -> Result<ast::CreateStatement, Error> {
    let mut tablename = String::from("");
    let mut coldefs: Vec<ast::ColDef> = vec![];
    for c in create_stmt.into_inner() {
        match c.as_rule() {
            Rule::table_identifier => {
                tablename = identifier(&c);
            }
            Rule::column_defs => {
                for column_def in c.into_inner() {
                    let mut name = None;
                    let mut coltype = None;
                    let mut nullable = true;
                    for part in column_def.into_inner() {
                        match part.as_rule() {
                            Rule::column_name => name = Some(identifier(&part)),
                            Rule::type_name => coltype = Some(SqlType::from_str(part.as_str())?),
                            Rule::not_null => nullable = false,
                            _ => return Err(malformed(&part)),
                        }
                    }
                    match (name, coltype) {
                        (Some(name), Some(coltype)) => coldefs.push(ast::ColDef {
                            colname: ast::ColName { name },
                            coltype,
                            nullable,
                        }),
                        _ => return Err(Error::Malformed("column definition".to_string())),
                    }
                }
            }
            _ => return Err(malformed(&c)),
        }
    }
    Ok(ast::CreateStatement { tablename, coldefs })
}

fn pt_where_to_ast(where_clause: Pair<Rule>) -> Result<ast::Expr, Error> {
    match where_clause.into_inner().next() {
        Some(e) if e.as_rule() == Rule::expr => parse_expr(e.into_inner()),
        _ => Err(Error::Malformed("where clause".to_string())),
    }
}

fn pt_select_statement_to_ast(select_stmt: Pair<Rule>) -> Result<ast::SelectStatement, Error> {
    let mut ast = ast::SelectStatement {
        distinct: false,
        select: ast::SelectClause { items: vec![] },
        from: None,
        r#where: None,
    };
    for s in select_stmt.into_inner() {
        match s.as_rule() {
            Rule::distinct => ast.distinct = true,
            Rule::select_items => {
                // For each select item.
                for t in s.into_inner() {
                    let mut parts = t.into_inner();
                    let item = match parts.next() {
                        Some(u) if u.as_rule() == Rule::star => ast::SelItem::Star,
                        Some(u) if u.as_rule() == Rule::expr => ast::SelItem::Expr {
                            expr: parse_expr(u.into_inner())?,
                            alias: parts.next().map(|a| ast::ColName {
                                name: identifier(&a),
                            }),
                        },
                        _ => return Err(Error::Malformed("select item".to_string())),
                    };
                    ast.select.items.push(item);
                }
            }
            Rule::from_clause => {
                let table = s
                    .into_inner()
                    .next()
                    .ok_or_else(|| Error::Malformed("from clause".to_string()))?;
                ast.from = Some(ast::FromClause {
                    tablename: identifier(&table),
                });
            }
            Rule::where_clause => ast.r#where = Some(pt_where_to_ast(s)?),
            _ => return Err(malformed(&s)),
        }
    }
    Ok(ast)
}

fn pt_query_to_ast(query: Pair<Rule>) -> Result<ast::Query, Error> {
    let mut first = None;
    let mut rest = vec![];
    let mut pending_op = None;
    for q in query.into_inner() {
        match q.as_rule() {
            Rule::select_stmt => {
                let select = pt_select_statement_to_ast(q)?;
                match pending_op.take() {
                    Some(op) => rest.push((op, select)),
                    None => first = Some(select),
                }
            }
            Rule::union_all => pending_op = Some(ast::SetOp::UnionAll),
            Rule::union => pending_op = Some(ast::SetOp::Union),
            Rule::except => pending_op = Some(ast::SetOp::Except),
            _ => return Err(malformed(&q)),
        }
    }
    match first {
        Some(first) => Ok(ast::Query { first, rest }),
        None => Err(Error::Malformed("empty query".to_string())),
    }
}

fn pt_create_view_to_ast(create_stmt: Pair<Rule>) -> Result<ast::CreateViewStatement, Error> {
    let mut viewname = None;
    let mut query = None;
    for c in create_stmt.into_inner() {
        match c.as_rule() {
            Rule::table_identifier => viewname = Some(identifier(&c)),
            Rule::query => query = Some(pt_query_to_ast(c)?),
            _ => return Err(malformed(&c)),
        }
    }
    match (viewname, query) {
        (Some(viewname), Some(query)) => Ok(ast::CreateViewStatement { viewname, query }),
        _ => Err(Error::Malformed("create view".to_string())),
    }
}

fn pt_insert_to_ast(insert_stmt: Pair<Rule>) -> Result<ast::InsertStatement, Error> {
    let mut ast = ast::InsertStatement {
        tablename: String::new(),
        columns: None,
        values: vec![],
    };
    for c in insert_stmt.into_inner() {
        match c.as_rule() {
            Rule::table_identifier => ast.tablename = identifier(&c),
            Rule::column_list => {
                ast.columns = Some(
                    c.into_inner()
                        .map(|col| ast::ColName {
                            name: identifier(&col),
                        })
                        .collect(),
                )
            }
            Rule::expr_list => {
                let row = c
                    .into_inner()
                    .map(|e| parse_expr(e.into_inner()))
                    .collect::<Result<Vec<ast::Expr>, Error>>()?;
                ast.values.push(row);
            }
            _ => return Err(malformed(&c)),
        }
    }
    Ok(ast)
}

fn pt_delete_to_ast(delete_stmt: Pair<Rule>) -> Result<ast::DeleteStatement, Error> {
    let mut ast = ast::DeleteStatement {
        tablename: String::new(),
        r#where: None,
    };
    for c in delete_stmt.into_inner() {
        match c.as_rule() {
            Rule::table_identifier => ast.tablename = identifier(&c),
            Rule::where_clause => ast.r#where = Some(pt_where_to_ast(c)?),
            _ => return Err(malformed(&c)),
        }
    }
    Ok(ast)
}

/// Parses one statement of text.  Positions in syntax errors are relative to the statement.
pub fn pt_statement_to_ast(text: &str) -> Result<ast::Statement, Error> {
    let statement = SQLParser::parse(Rule::statement, text)
        .map_err(|e| {
            let (line, column) = match e.line_col {
                pest::error::LineColLocation::Pos(p) => p,
                pest::error::LineColLocation::Span(p, _) => p,
            };
            Error::Syntax {
                message: e.variant.message().to_string(),
                position: SourcePosition::new(line, column),
            }
        })?
        .next()
        .ok_or_else(|| Error::Malformed("no statement".to_string()))?;
    for s in statement.into_inner() {
        match s.as_rule() {
            Rule::create_table_stmt => return Ok(ast::Statement::CreateTable(pt_create_table_to_ast(s)?)),
            Rule::create_view_stmt => return Ok(ast::Statement::CreateView(pt_create_view_to_ast(s)?)),
            Rule::insert_stmt => return Ok(ast::Statement::Insert(pt_insert_to_ast(s)?)),
            Rule::delete_stmt => return Ok(ast::Statement::Delete(pt_delete_to_ast(s)?)),
            Rule::EOI => (),
            _ => return Err(malformed(&s)),
        }
    }
    Err(Error::Malformed("no statement".to_string()))
}

/// Parses a statement cut out of the session's source, tagging it (and any error) with its range.
pub fn parse_statement(
    stmt: &StatementText,
    comment: Option<&str>,
) -> Result<ast::ParsedStatement, CompilerError> {
    let range = SourcePositionRange::new(stmt.start, stmt.end);
    tracing::trace!(text = %stmt.text, %range, "parsing statement");
    match pt_statement_to_ast(&stmt.text) {
        Ok(statement) => Ok(ast::ParsedStatement {
            statement,
            range,
            text: stmt.text.clone(),
            comment: comment.map(String::from),
        }),
        Err(Error::Syntax { message, position }) => Err(CompilerError::Parse {
            range,
            message: format!("{} at {}", message, position.offset_by(stmt.start)),
        }),
        Err(e @ Error::InvalidLiteral(_)) => Err(CompilerError::Parse {
            range,
            message: e.to_string(),
        }),
        Err(e @ Error::UnknownType(_)) => Err(CompilerError::Context {
            range,
            message: e.to_string(),
        }),
        Err(e @ Error::Malformed(_)) => Err(CompilerError::Internal {
            range,
            message: e.to_string(),
        }),
    }
}

#[test]
fn test_parsing_literals() {
    let cases = vec![
        ("1", "1"),
        ("1.01", "1.01"),
        ("'hi'", "'hi'"),
        ("'it''s'", "'it''s'"),
        ("''", "''"),
        ("true", "TRUE"),
        ("tRuE", "TRUE"),
        ("FALSE", "FALSE"),
        ("nUlL", "NULL"),
    ];
    for case in cases {
        let input = case.0;
        let expr = SQLParser::parse(Rule::expr, input)
            .expect("unsuccessful parse") // unwrap the parse result
            .next()
            .unwrap();
        let literal = expr.into_inner().next().unwrap();
        let ast = parse_literal_from_rule(literal).unwrap();
        let actual = format!("{}", ast);
        let expected = case.1;
        assert_eq!(actual, expected);
    }
}

#[test]
fn test_integer_literal_out_of_range() {
    assert!(matches!(
        pt_statement_to_ast("INSERT INTO t VALUES (99999999999999999999)"),
        Err(Error::InvalidLiteral(_))
    ));
}

#[test]
fn test_pt_create_statement_to_ast() {
    let input = "CREATE TABLE T (A int NOT NULL, b VARCHAR(4))";
    let actual = pt_statement_to_ast(input).unwrap();
    let expected = ast::Statement::CreateTable(ast::CreateStatement {
        tablename: "t".to_string(),
        coldefs: vec![
            ast::ColDef {
                colname: ast::ColName {
                    name: "a".to_string(),
                },
                coltype: SqlType::Int,
                nullable: false,
            },
            ast::ColDef {
                colname: ast::ColName {
                    name: "b".to_string(),
                },
                coltype: SqlType::Text,
                nullable: true,
            },
        ],
    });
    assert_eq!(actual, expected);
}

#[test]
fn test_unknown_type_is_reported() {
    assert!(matches!(
        pt_statement_to_ast("CREATE TABLE t (a blob)"),
        Err(Error::UnknownType(_))
    ));
}

#[test]
fn test_pt_create_view_to_ast() {
    struct Case {
        desc: &'static str,
        input: &'static str,
        // (distinct, from, items, where) of each select, and the set operations between them.
        expected: Vec<(bool, Option<&'static str>, Vec<&'static str>, Option<&'static str>)>,
        ops: Vec<ast::SetOp>,
    }
    let cases = vec![
        Case {
            desc: "star",
            input: "CREATE VIEW v AS SELECT * FROM Tbl",
            expected: vec![(false, Some("tbl"), vec!["*"], None)],
            ops: vec![],
        },
        Case {
            desc: "expressions, aliases and where",
            input: "create view v as select distinct a, b + 1 AS c fRoM tbl where a > 1",
            expected: vec![(true, Some("tbl"), vec!["a", "(b + 1) AS c"], Some("(a > 1)"))],
            ops: vec![],
        },
        Case {
            desc: "no from",
            input: "create view v as select 123.456, 'seven', NULL",
            expected: vec![(false, None, vec!["123.456", "'seven'", "NULL"], None)],
            ops: vec![],
        },
        Case {
            desc: "set operations",
            input: "create view v as select a from t union select a from u union all select 1 except select 2",
            expected: vec![
                (false, Some("t"), vec!["a"], None),
                (false, Some("u"), vec!["a"], None),
                (false, None, vec!["1"], None),
                (false, None, vec!["2"], None),
            ],
            ops: vec![ast::SetOp::Union, ast::SetOp::UnionAll, ast::SetOp::Except],
        },
    ];
    for case in cases {
        println!("Running case: {}", case.desc);
        let view = pt_statement_to_ast(case.input)
            .unwrap()
            .into_create_view()
            .unwrap();
        assert_eq!(view.viewname, "v");
        let selects: Vec<&ast::SelectStatement> = std::iter::once(&view.query.first)
            .chain(view.query.rest.iter().map(|(_, s)| s))
            .collect();
        let actual: Vec<(bool, Option<String>, Vec<String>, Option<String>)> = selects
            .iter()
            .map(|s| {
                (
                    s.distinct,
                    s.from.as_ref().map(|f| f.tablename.clone()),
                    s.select.items.iter().map(|i| i.to_string()).collect(),
                    s.r#where.as_ref().map(|w| w.to_string()),
                )
            })
            .collect();
        let expected: Vec<(bool, Option<String>, Vec<String>, Option<String>)> = case
            .expected
            .iter()
            .map(|(d, f, i, w)| {
                (
                    *d,
                    f.map(String::from),
                    i.iter().map(|x| x.to_string()).collect(),
                    w.map(String::from),
                )
            })
            .collect();
        assert_eq!(actual, expected);
        assert_eq!(
            view.query.rest.iter().map(|(op, _)| *op).collect::<Vec<_>>(),
            case.ops
        );
    }
}

#[test]
fn test_pt_insert_and_delete_to_ast() {
    let insert = pt_statement_to_ast("INSERT INTO T (B, a) VALUES (1, 'x'), (-2, NULL);")
        .unwrap()
        .into_insert()
        .unwrap();
    assert_eq!(insert.tablename, "t");
    assert_eq!(
        insert.columns,
        Some(vec![
            ast::ColName {
                name: "b".to_string()
            },
            ast::ColName {
                name: "a".to_string()
            }
        ])
    );
    assert_eq!(insert.values.len(), 2);
    assert_eq!(insert.values[1][0].to_string(), "-2");

    let delete = pt_statement_to_ast("delete from t where x = 1")
        .unwrap()
        .into_delete()
        .unwrap();
    assert_eq!(delete.tablename, "t");
    assert_eq!(delete.r#where.unwrap().to_string(), "(x = 1)");
}

#[test]
fn test_parse_statement_error_range() {
    let stmt = StatementText {
        text: "CREATE VIEW v AS SELEC x FROM t".to_string(),
        start: SourcePosition::new(3, 5),
        end: SourcePosition::new(3, 35),
    };
    match parse_statement(&stmt, None) {
        Err(CompilerError::Parse { range, message }) => {
            assert_eq!(range.start, SourcePosition::new(3, 5));
            assert_eq!(range.end, SourcePosition::new(3, 35));
            assert!(message.contains(" at 3:"), "message was {}", message);
        }
        other => panic!("Expected a parse error, got {:?}", other),
    }
}
