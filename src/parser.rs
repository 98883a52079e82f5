//! `parser` contains generated parsing routines for SQL, the statement splitter, and tests on them.

use pest::iterators::Pairs;
use pest::pratt_parser::PrattParser;

use crate::ast;
use crate::errors::SourcePosition;

#[allow(unused_imports)]
use pest::Parser; // This needs to be in scope for the next statements to work.
#[derive(Parser)]
#[grammar = "sql.pest"]
pub struct SQLParser;

// From: https://pest.rs/book/examples/calculator.html, MIT,Apache2.0 licenses.
lazy_static::lazy_static! {
    pub static ref PRATT_PARSER: PrattParser<Rule> = {
        use pest::pratt_parser::{Assoc::*, Op};
        use Rule::*;

        // Precedence is defined lowest to highest
        PrattParser::new()
            .op(Op::infix(or, Left))
            .op(Op::infix(and, Left))
            .op(Op::prefix(not))
            .op(Op::postfix(is_null) | Op::postfix(is_not_null))
            .op(Op::infix(eq, Left)
                | Op::infix(neq, Left)
                | Op::infix(lt, Left)
                | Op::infix(le, Left)
                | Op::infix(gt, Left)
                | Op::infix(ge, Left))
            // Addition and subtract have equal precedence
            .op(Op::infix(add, Left) | Op::infix(subtract, Left))
            .op(Op::infix(multiply, Left) | Op::infix(divide, Left) | Op::infix(modulo, Left))
            .op(Op::prefix(neg))
    };
}

// From: https://pest.rs/book/examples/calculator.html, MIT,Apache2.0 licenses.
pub fn parse_expr(pairs: Pairs<Rule>) -> Result<ast::Expr, crate::pt_to_ast::Error> {
    PRATT_PARSER
        .map_primary(|primary| match primary.as_rule() {
            Rule::null_literal
            | Rule::true_literal
            | Rule::false_literal
            | Rule::integer_literal
            | Rule::decimal_literal
            | Rule::single_quoted_string => Ok(ast::Expr::Constant(
                crate::pt_to_ast::parse_literal_from_rule(primary)?,
            )),
            Rule::column_name => Ok(ast::Expr::ColName(ast::ColName {
                name: primary.as_str().to_lowercase(),
            })),
            Rule::expr => parse_expr(primary.into_inner()),
            rule => Err(crate::pt_to_ast::Error::Malformed(format!(
                "parse_expr expected literal, column or expression, found {:?}",
                rule
            ))),
        })
        .map_prefix(|op, rhs| {
            let op = match op.as_rule() {
                Rule::neg => ast::UnaryOp::Neg,
                Rule::not => ast::UnaryOp::Not,
                rule => {
                    return Err(crate::pt_to_ast::Error::Malformed(format!(
                        "parse_expr expected prefix operation, found {:?}",
                        rule
                    )))
                }
            };
            Ok(ast::Expr::UnaryOp {
                op,
                expr: Box::new(rhs?),
            })
        })
        .map_postfix(|lhs, op| {
            let negated = match op.as_rule() {
                Rule::is_null => false,
                Rule::is_not_null => true,
                rule => {
                    return Err(crate::pt_to_ast::Error::Malformed(format!(
                        "parse_expr expected postfix operation, found {:?}",
                        rule
                    )))
                }
            };
            Ok(ast::Expr::IsNull {
                expr: Box::new(lhs?),
                negated,
            })
        })
        .map_infix(|lhs, op, rhs| {
            let op = match op.as_rule() {
                Rule::add => ast::Op::Add,
                Rule::subtract => ast::Op::Subtract,
                Rule::multiply => ast::Op::Multiply,
                Rule::divide => ast::Op::Divide,
                Rule::modulo => ast::Op::Modulo,
                Rule::eq => ast::Op::Eq,
                Rule::neq => ast::Op::NotEq,
                Rule::lt => ast::Op::Lt,
                Rule::le => ast::Op::LtEq,
                Rule::gt => ast::Op::Gt,
                Rule::ge => ast::Op::GtEq,
                Rule::and => ast::Op::And,
                Rule::or => ast::Op::Or,
                rule => {
                    return Err(crate::pt_to_ast::Error::Malformed(format!(
                        "parse_expr expected infix operation, found {:?}",
                        rule
                    )))
                }
            };
            Ok(ast::Expr::BinOp {
                lhs: Box::new(lhs?),
                op,
                rhs: Box::new(rhs?),
            })
        })
        .parse(pairs)
}

/// One statement cut out of a program, with the positions of its first and last characters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatementText {
    pub text: String,
    pub start: SourcePosition,
    pub end: SourcePosition,
}

/// Splits `program` at semicolons that are not inside string literals or comments.
///
/// Positions are computed as if `program` started at `base`.  Leading whitespace and comments
/// are not part of a statement, and chunks holding nothing but whitespace and comments are dropped.
/// The terminating semicolon is not part of the statement text.
pub fn split_statements(program: &str, base: SourcePosition) -> Vec<StatementText> {
    enum State {
        Code,
        String,
        LineComment,
        BlockComment,
    }
    let chars: Vec<(usize, char)> = program.char_indices().collect();
    let mut positions = Vec::with_capacity(chars.len());
    let mut pos = SourcePosition::new(1, 1);
    for (_, c) in &chars {
        positions.push(pos);
        pos = match c {
            '\n' => SourcePosition::new(pos.line + 1, 1),
            _ => SourcePosition::new(pos.line, pos.column + 1),
        };
    }

    let mut result = vec![];
    let mut state = State::Code;
    // Indexes into `chars` of the first and last significant characters of the current statement.
    let mut first: Option<usize> = None;
    let mut last: Option<usize> = None;
    let mut k = 0;
    while k < chars.len() {
        let c = chars[k].1;
        let next = chars.get(k + 1).map(|(_, n)| *n);
        match state {
            State::Code => match (c, next) {
                (';', _) => push_statement(
                    program,
                    &chars,
                    &positions,
                    base,
                    first.take(),
                    last.take(),
                    &mut result,
                ),
                ('-', Some('-')) => {
                    state = State::LineComment;
                    k += 1;
                }
                ('/', Some('*')) => {
                    state = State::BlockComment;
                    k += 1;
                }
                (c, _) if c.is_whitespace() => (),
                (c, _) => {
                    if c == '\'' {
                        state = State::String;
                    }
                    first.get_or_insert(k);
                    last = Some(k);
                }
            },
            State::String => {
                last = Some(k);
                if c == '\'' {
                    if next == Some('\'') {
                        k += 1;
                        last = Some(k);
                    } else {
                        state = State::Code;
                    }
                }
            }
            State::LineComment => {
                if c == '\n' {
                    state = State::Code;
                }
            }
            State::BlockComment => {
                if c == '*' && next == Some('/') {
                    state = State::Code;
                    k += 1;
                }
            }
        }
        k += 1;
    }
    push_statement(program, &chars, &positions, base, first, last, &mut result);
    result
}

fn push_statement(
    program: &str,
    chars: &[(usize, char)],
    positions: &[SourcePosition],
    base: SourcePosition,
    first: Option<usize>,
    last: Option<usize>,
    result: &mut Vec<StatementText>,
) {
    if let (Some(first), Some(last)) = (first, last) {
        let (b0, _) = chars[first];
        let (b1, c1) = chars[last];
        result.push(StatementText {
            text: program[b0..b1 + c1.len_utf8()].to_string(),
            start: positions[first].offset_by(base),
            end: positions[last].offset_by(base),
        });
    }
}

#[test]
fn test_parse_literals() {
    let cases = vec![
        ("1"),
        ("1000000000000"),
        ("-1000000000000"),
        ("1.01"),
        ("123456789.987654321"),
        ("'hi'"),
        ("'it''s'"),
        ("true"),
        ("tRuE"),
        ("TRUE"),
        ("false"),
        ("fAlSe"),
        ("FALSE"),
        ("null"),
        ("nUlL"),
        ("NULL"),
    ];
    for case in cases {
        println!("Case: {}", case);
        assert!(SQLParser::parse(Rule::expr, case).is_ok());
    }
}

#[test]
fn test_not_parse_invalid_literals() {
    let cases = vec![("\"hi\""), ("'unterminated"), ("DELETE"), ("1 +"), ("NIL NIL")];
    for case in cases {
        println!("Case: {}", case);
        let stmt = format!("INSERT INTO t VALUES ({})", case);
        assert!(SQLParser::parse(Rule::statement, &stmt).is_err());
    }
}

#[test]
fn test_parse_expr() {
    struct Case {
        input: &'static str,
        expected: &'static str,
    }
    let cases = vec![
        Case {
            input: "1 + 2",
            expected: "(1 + 2)",
        },
        Case {
            input: "5 * 6 + 7",
            expected: "((5 * 6) + 7)",
        },
        Case {
            input: "8 + 9 * 10",
            expected: "(8 + (9 * 10))",
        },
        Case {
            input: "a = 1 AND b <> 2 OR NOT c",
            expected: "(((a = 1) AND (b <> 2)) OR NOT c)",
        },
        Case {
            input: "X + 1 IS NOT NULL",
            expected: "((x + 1) IS NOT NULL)",
        },
        Case {
            input: "-a % 3 >= (b - 1)",
            expected: "((-a % 3) >= (b - 1))",
        },
        Case {
            input: "nothing != nullable",
            expected: "(nothing <> nullable)",
        },
    ];
    for case in cases {
        println!("Case: {}", case.input);
        let mut pairs = SQLParser::parse(Rule::expr, case.input).expect("Should have parsed.");
        let expr = parse_expr(pairs.next().unwrap().into_inner()).unwrap();
        assert_eq!(expr.to_string(), case.expected);
    }
}

#[test]
fn test_parse_statements() {
    let cases = vec![
        "CREATE TABLE FOO (A INT, B INT)",
        "create table foo (a int not null, b varchar(10), c boolean);",
        "creaTe TaBle superlongname (superduperlongname integer)",
        "CREATE VIEW v AS SELECT * FROM t",
        "CREATE VIEW v AS SELECT DISTINCT a + 1 AS b FROM t WHERE a > 0",
        "create view v as select a from t union all select a from u except select 1",
        "CREATE VIEW v AS SELECT 1, 'two', 3.3",
        "INSERT INTO t VALUES (1, 'two', 3.3), (4, NULL, -5)",
        "insert into t (b, a) values (1, 2);",
        "DELETE FROM t",
        "DELETE FROM t WHERE x = 1 -- trailing comment",
        "/* leading */ DELETE FROM t WHERE x IS NULL",
    ];
    for case in cases {
        println!("Case: {}", case);
        assert!(SQLParser::parse(Rule::statement, case).is_ok());
    }
}

#[test]
fn test_not_parse_invalid_statements() {
    let cases = vec![
        "CREATE TABLE FOO (nonsense that does not have commas)",
        "create table foo a int, b int",
        "create table foo ()",
        "create table foo (,,,,,)",
        "SELECT * from T",
        "CREATE T TABLE FOO (A INT, B INT)",
        "CREATE VIEW v AS SELECT FROM t",
        "CREATE VIEW select AS SELECT 1",
        "INSERT INTO t VALUES",
        "DELETE t",
        "CREATE TABLE t(x INT); CREATE TABLE u(y INT)",
    ];
    for case in cases {
        println!("Case: {}", case);
        assert!(SQLParser::parse(Rule::statement, case).is_err());
    }
}

#[test]
fn test_split_statements() {
    struct Case {
        desc: &'static str,
        input: &'static str,
        expected: Vec<(&'static str, (usize, usize), (usize, usize))>,
    }
    let cases = vec![
        Case {
            desc: "two statements on one line",
            input: "CREATE TABLE t(x INT); DELETE FROM t;",
            expected: vec![
                ("CREATE TABLE t(x INT)", (1, 1), (1, 21)),
                ("DELETE FROM t", (1, 24), (1, 36)),
            ],
        },
        Case {
            desc: "semicolons in strings and comments",
            input: "-- a; b\nINSERT INTO t VALUES ('a;b', 'it''s');\n/* ; */",
            expected: vec![("INSERT INTO t VALUES ('a;b', 'it''s')", (2, 1), (2, 37))],
        },
        Case {
            desc: "multi-line statement without terminator",
            input: "\n  CREATE VIEW v AS\n  SELECT x FROM t",
            expected: vec![("CREATE VIEW v AS\n  SELECT x FROM t", (2, 3), (3, 17))],
        },
        Case {
            desc: "only comments",
            input: "-- nothing here\n/* or here */ ;",
            expected: vec![],
        },
    ];
    for case in cases {
        println!("Running case: {}", case.desc);
        let actual = split_statements(case.input, SourcePosition::new(1, 1));
        let expected: Vec<StatementText> = case
            .expected
            .iter()
            .map(|(text, start, end)| StatementText {
                text: text.to_string(),
                start: SourcePosition::new(start.0, start.1),
                end: SourcePosition::new(end.0, end.1),
            })
            .collect();
        assert_eq!(actual, expected);
    }
}

#[test]
fn test_split_statements_with_base() {
    let actual = split_statements("DELETE FROM t", SourcePosition::new(4, 1));
    assert_eq!(actual[0].start, SourcePosition::new(4, 1));
    assert_eq!(actual[0].end, SourcePosition::new(4, 13));
}
