//! `ast_to_ir` converts statement ASTs into circuit intermediate representation (IR).
//!
//! The `CircuitBuilder` consumes one statement at a time:
//!   - CREATE TABLE registers an input table and adds a source node for it.
//!   - CREATE VIEW adds the operators computing the view over already declared relations, and
//!     (unless disabled) a sink node making the view an output.
//!   - INSERT and DELETE update the simulated table contents, and optionally splice the change
//!     into the circuit as a constant delta.
//!
//! Registries and table contents outlive any one circuit.  The partial circuit does not: sealing
//! hands it out and building resumes from an empty one.

use std::collections::{HashMap, HashSet};

use crate::ast;
use crate::errors::{CompilerError, CompilerMessage, CompilerMessages, SourcePositionRange};
use crate::io_description::{InputTableDescription, OutputViewDescription};
use crate::ir::{self, Circuit, NodeId, Operator, PartialCircuit, ZSetType};
use crate::ir_interpreter;
use crate::optimize_ast;
use crate::project;
use crate::sql_type::SqlType;
use crate::sql_value::SqlValue;
use crate::table_traits::{Column, TableMeta};
use crate::temp_db::{self, TableContents};
use crate::typed_row::Row;
use crate::zset::{self, WeightType, ZSet};

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Object '{0}' not found")]
    ObjectNotFound(String),
    #[error("Table or view '{0}' already exists")]
    DuplicateRelation(String),
    #[error("Column '{0}' is declared more than once")]
    DuplicateColumn(String),
    #[error("View '{0}' belongs to a circuit that has already been completed")]
    SealedView(String),
    #[error("Table '{table}' has no column '{column}'")]
    NoSuchColumn { table: String, column: String },
    #[error("Expected {expected} values, got {actual}")]
    ValueCount { expected: usize, actual: usize },
    #[error("SELECT * requires a FROM clause")]
    StarWithoutFrom,
    #[error("Operands of {op} have {left} and {right} columns")]
    SetArity {
        op: ast::SetOp,
        left: usize,
        right: usize,
    },
    #[error("Column {column} of {op} operands has incompatible types {left} and {right}")]
    SetTypes {
        op: ast::SetOp,
        column: usize,
        left: SqlType,
        right: SqlType,
    },
    #[error("{0}")]
    Resolve(#[from] project::Error),
    #[error("{0}")]
    Simplify(#[from] optimize_ast::Error),
    #[error("{0}")]
    Eval(#[from] crate::sql_value::Error),
    #[error("{0}")]
    Row(#[from] crate::temp_table::Error),
    #[error("{0}")]
    Table(#[from] temp_db::Error),
    #[error("{0}")]
    Weight(#[from] zset::Error),
    #[error("{0}")]
    Ir(#[from] ir::Error),
}

impl Error {
    fn into_compiler_error(self, range: SourcePositionRange) -> CompilerError {
        let message = self.to_string();
        match self {
            Error::Ir(_) => CompilerError::Internal { range, message },
            Error::Simplify(_)
            | Error::Eval(_)
            | Error::Row(_)
            | Error::Table(_)
            | Error::Weight(_) => CompilerError::Compilation { range, message },
            _ => CompilerError::Context { range, message },
        }
    }
}

pub struct CircuitBuilder {
    weight_type: WeightType,
    emit_table_deltas: bool,
    generate_output: bool,
    circuit: PartialCircuit,
    /// Node carrying the contents of each relation in the current partial circuit.
    streams: HashMap<String, NodeId>,
    /// Schemas of every declared view, including views of sealed circuits.
    views: HashMap<String, Vec<Column>>,
    input_tables: Vec<InputTableDescription>,
    output_views: Vec<OutputViewDescription>,
    table_contents: TableContents,
    /// Comment attached to the nodes of the statement being compiled.
    comment: Option<String>,
}

impl CircuitBuilder {
    pub fn new(weight_type: WeightType, emit_table_deltas: bool) -> Self {
        CircuitBuilder {
            weight_type,
            emit_table_deltas,
            generate_output: true,
            circuit: PartialCircuit::new(weight_type),
            streams: HashMap::new(),
            views: HashMap::new(),
            input_tables: vec![],
            output_views: vec![],
            table_contents: TableContents::new(),
            comment: None,
        }
    }

    pub fn weight_type(&self) -> WeightType {
        self.weight_type
    }

    /// When false, the views compiled from now on get no sink and are not registered as outputs.
    pub fn generate_output_for_next_view(&mut self, generate: bool) {
        self.generate_output = generate;
    }

    pub fn input_tables(&self) -> &[InputTableDescription] {
        &self.input_tables
    }

    pub fn output_views(&self) -> &[OutputViewDescription] {
        &self.output_views
    }

    pub fn table_contents(&self) -> &TableContents {
        &self.table_contents
    }

    #[cfg(test)]
    pub fn partial_circuit(&self) -> &PartialCircuit {
        &self.circuit
    }

    /// Hands out the circuit built so far under `name` and starts a new, empty one.
    pub fn seal(&mut self, name: &str) -> Circuit {
        let circuit = std::mem::replace(&mut self.circuit, PartialCircuit::new(self.weight_type));
        self.streams.clear();
        circuit.seal(name)
    }

    /// Compiles one statement.  Warnings are reported to `messages`; errors are returned, and
    /// a statement that fails leaves the circuit and the table contents as they were.
    pub fn compile(
        &mut self,
        stmt: &ast::ParsedStatement,
        messages: &mut CompilerMessages,
    ) -> Result<(), CompilerError> {
        tracing::debug!(range = %stmt.range, "compiling statement");
        self.comment = stmt.comment.clone();
        let nodes = self.circuit.len();
        let streams = self.streams.clone();
        let result = match &stmt.statement {
            ast::Statement::CreateTable(c) => self.compile_create_table(c),
            ast::Statement::CreateView(v) => self.compile_create_view(v, stmt.range, messages),
            ast::Statement::Insert(i) => self.compile_insert(i),
            ast::Statement::Delete(d) => self.compile_delete(d, stmt.range, messages),
        };
        self.comment = None;
        if result.is_err() {
            self.circuit.truncate(nodes);
            self.streams = streams;
        }
        result.map_err(|e| e.into_compiler_error(stmt.range))
    }

    fn add(&mut self, op: Operator, columns: Vec<Column>) -> Result<NodeId, Error> {
        let output_type = ZSetType::new(columns, self.weight_type);
        Ok(self.circuit.add(op, output_type, self.comment.clone())?)
    }

    fn check_new_relation(&self, name: &str) -> Result<(), Error> {
        if self.table_contents.get_temp_table(name).is_ok() || self.views.contains_key(name) {
            return Err(Error::DuplicateRelation(name.to_string()));
        }
        Ok(())
    }

    fn compile_create_table(&mut self, c: &ast::CreateStatement) -> Result<(), Error> {
        self.check_new_relation(&c.tablename)?;
        let mut seen = HashSet::new();
        for coldef in &c.coldefs {
            if !seen.insert(coldef.colname.name.as_str()) {
                return Err(Error::DuplicateColumn(coldef.colname.name.clone()));
            }
        }
        let columns: Vec<Column> = c
            .coldefs
            .iter()
            .map(|d| Column::new(d.colname.name.clone(), d.coltype, d.nullable))
            .collect();
        self.table_contents
            .new_table(c.tablename.clone(), columns.clone())?;
        self.input_tables
            .push(InputTableDescription::new(&c.tablename, columns));
        self.table_stream(&c.tablename)?;
        Ok(())
    }

    /// The node carrying a table in the current circuit, adding a source for it if there is none yet.
    fn table_stream(&mut self, table: &str) -> Result<(NodeId, Vec<Column>), Error> {
        let columns = self.table_contents.get_temp_table(table)?.columns().to_vec();
        if let Some(node) = self.streams.get(table) {
            return Ok((*node, columns));
        }
        let node = self.add(
            Operator::Source {
                table: table.to_string(),
            },
            columns.clone(),
        )?;
        self.streams.insert(table.to_string(), node);
        Ok((node, columns))
    }

    fn relation_stream(&mut self, name: &str) -> Result<(NodeId, Vec<Column>), Error> {
        if self.table_contents.get_temp_table(name).is_ok() {
            return self.table_stream(name);
        }
        match (self.views.get(name), self.streams.get(name)) {
            (Some(columns), Some(node)) => Ok((*node, columns.clone())),
            (Some(_), None) => Err(Error::SealedView(name.to_string())),
            _ => Err(Error::ObjectNotFound(name.to_string())),
        }
    }

    fn compile_create_view(
        &mut self,
        v: &ast::CreateViewStatement,
        range: SourcePositionRange,
        messages: &mut CompilerMessages,
    ) -> Result<(), Error> {
        self.check_new_relation(&v.viewname)?;
        let (node, columns) = self.compile_query(&v.query)?;
        let mut seen = HashSet::new();
        for c in &columns {
            if !seen.insert(c.name.as_str()) {
                messages.report(CompilerMessage::warning(
                    range,
                    "Warning",
                    format!("View '{}' has more than one column named '{}'", v.viewname, c.name),
                ));
            }
        }
        if self.generate_output {
            self.add(
                Operator::Sink {
                    input: node,
                    view: v.viewname.clone(),
                },
                columns.clone(),
            )?;
            self.output_views
                .push(OutputViewDescription::new(&v.viewname, columns.clone()));
        }
        self.views.insert(v.viewname.clone(), columns);
        self.streams.insert(v.viewname.clone(), node);
        Ok(())
    }

    fn compile_query(&mut self, q: &ast::Query) -> Result<(NodeId, Vec<Column>), Error> {
        let (mut node, mut columns) = self.compile_select(&q.first)?;
        for (op, select) in &q.rest {
            let (right, right_columns) = self.compile_select(select)?;
            columns = unify_set_columns(*op, &columns, &right_columns)?;
            node = match op {
                ast::SetOp::UnionAll => self.add(
                    Operator::Sum {
                        inputs: vec![node, right],
                    },
                    columns.clone(),
                )?,
                ast::SetOp::Union => {
                    let sum = self.add(
                        Operator::Sum {
                            inputs: vec![node, right],
                        },
                        columns.clone(),
                    )?;
                    self.add(Operator::Distinct { input: sum }, columns.clone())?
                }
                ast::SetOp::Except => {
                    let left = self.add(Operator::Distinct { input: node }, columns.clone())?;
                    let right = self.add(Operator::Distinct { input: right }, columns.clone())?;
                    let negated = self.add(Operator::Negate { input: right }, columns.clone())?;
                    let sum = self.add(
                        Operator::Sum {
                            inputs: vec![left, negated],
                        },
                        columns.clone(),
                    )?;
                    self.add(Operator::Distinct { input: sum }, columns.clone())?
                }
            };
        }
        Ok((node, columns))
    }

    fn compile_select(&mut self, ss: &ast::SelectStatement) -> Result<(NodeId, Vec<Column>), Error> {
        let mut ss = ss.clone();
        optimize_ast::simplify_ast_select_statement(&mut ss)?;
        let from = match &ss.from {
            Some(from) => from.tablename.clone(),
            None => return self.compile_constant_select(&ss),
        };
        let (mut node, in_columns) = self.relation_stream(&from)?;
        if let Some(w) = &ss.r#where {
            let predicate = project::resolve_predicate(w, &in_columns, "WHERE")?;
            node = self.add(Operator::Filter { input: node, predicate }, in_columns.clone())?;
        }
        let columns = if ss.select.items == [ast::SelItem::Star] {
            // No projection needed if all columns are selected.
            in_columns
        } else {
            let (exprs, out_columns) = project::build_project(&in_columns, &ss.select.items)?;
            node = self.add(Operator::Map { input: node, exprs }, out_columns.clone())?;
            out_columns
        };
        if ss.distinct {
            node = self.add(Operator::Distinct { input: node }, columns.clone())?;
        }
        Ok((node, columns))
    }

    /// A select without FROM produces at most one row, computed here.
    fn compile_constant_select(
        &mut self,
        ss: &ast::SelectStatement,
    ) -> Result<(NodeId, Vec<Column>), Error> {
        if ss.select.items.contains(&ast::SelItem::Star) {
            return Err(Error::StarWithoutFrom);
        }
        let empty = Row::new(vec![]);
        let (exprs, columns) = project::build_project(&[], &ss.select.items)?;
        let keep = match &ss.r#where {
            Some(w) => {
                let predicate = project::resolve_predicate(w, &[], "WHERE")?;
                ir_interpreter::eval_predicate(&predicate, &empty)? == Some(true)
            }
            None => true,
        };
        let mut data = ZSet::new();
        if keep {
            let items = exprs
                .iter()
                .map(|e| ir_interpreter::eval_scalar(e, &empty))
                .collect::<Result<Vec<_>, _>>()?;
            data.add(Row::new(items), 1, self.weight_type)?;
        }
        let node = self.add(Operator::Constant { data }, columns.clone())?;
        Ok((node, columns))
    }

    /// Adds `delta` to a table's stream in the current circuit.
    fn splice_delta(&mut self, table: &str, delta: ZSet) -> Result<(), Error> {
        let (stream, columns) = self.table_stream(table)?;
        let constant = self.add(Operator::Constant { data: delta }, columns.clone())?;
        let sum = self.add(
            Operator::Sum {
                inputs: vec![stream, constant],
            },
            columns,
        )?;
        self.streams.insert(table.to_string(), sum);
        Ok(())
    }

    fn compile_insert(&mut self, i: &ast::InsertStatement) -> Result<(), Error> {
        let table = self.table_contents.get_temp_table(&i.tablename).map_err(|_| {
            Error::ObjectNotFound(i.tablename.clone())
        })?;
        let table_columns = table.columns().to_vec();
        // Position in the table of each value of a VALUES row.
        let positions: Vec<usize> = match &i.columns {
            None => (0..table_columns.len()).collect(),
            Some(names) => {
                let mut positions = vec![];
                for n in names {
                    let p = table_columns
                        .iter()
                        .position(|c| c.name == n.name)
                        .ok_or_else(|| Error::NoSuchColumn {
                            table: i.tablename.clone(),
                            column: n.name.clone(),
                        })?;
                    if positions.contains(&p) {
                        return Err(Error::DuplicateColumn(n.name.clone()));
                    }
                    positions.push(p);
                }
                positions
            }
        };
        let mut delta = ZSet::new();
        for values in &i.values {
            if values.len() != positions.len() {
                return Err(Error::ValueCount {
                    expected: positions.len(),
                    actual: values.len(),
                });
            }
            let mut items = vec![SqlValue::Null(); table_columns.len()];
            for (expr, p) in values.iter().zip(&positions) {
                items[*p] = optimize_ast::eval_constant_expr(expr)?;
            }
            let row = table.typed_row(items)?;
            delta.add(row, 1, self.weight_type)?;
        }
        if self.emit_table_deltas {
            self.splice_delta(&i.tablename, delta.clone())?;
        }
        self.table_contents.add_to_table(&i.tablename, &delta)?;
        Ok(())
    }

    fn compile_delete(
        &mut self,
        d: &ast::DeleteStatement,
        range: SourcePositionRange,
        messages: &mut CompilerMessages,
    ) -> Result<(), Error> {
        let table = self.table_contents.get_temp_table(&d.tablename).map_err(|_| {
            Error::ObjectNotFound(d.tablename.clone())
        })?;
        let predicate = match &d.r#where {
            Some(w) => Some(project::resolve_predicate(
                &optimize_ast::simplify_expr(w)?,
                table.columns(),
                "WHERE",
            )?),
            None => None,
        };
        let mut delta = ZSet::new();
        for (row, weight) in self.table_contents.raw(&d.tablename)? {
            if *weight <= 0 {
                continue;
            }
            let matches = match &predicate {
                Some(p) => ir_interpreter::eval_predicate(p, row)? == Some(true),
                None => true,
            };
            if matches {
                delta.add(row.clone(), -1, self.weight_type)?;
            }
        }
        if delta.is_empty() {
            messages.report(CompilerMessage::warning(
                range,
                "Warning",
                format!("DELETE does not match any row of table '{}'", d.tablename),
            ));
            return Ok(());
        }
        if self.emit_table_deltas {
            self.splice_delta(&d.tablename, delta.clone())?;
        }
        self.table_contents.add_to_table(&d.tablename, &delta)?;
        Ok(())
    }
}

/// Column types of a set operation: the operands must agree on arity, and on each column's type
/// up to NULL literals.
fn unify_set_columns(op: ast::SetOp, left: &[Column], right: &[Column]) -> Result<Vec<Column>, Error> {
    if left.len() != right.len() {
        return Err(Error::SetArity {
            op,
            left: left.len(),
            right: right.len(),
        });
    }
    left.iter()
        .zip(right)
        .enumerate()
        .map(|(i, (l, r))| {
            let ty = match (l.ty, r.ty) {
                (a, b) if a == b => a,
                (SqlType::Null, b) => b,
                (a, SqlType::Null) => a,
                (a, b) => {
                    return Err(Error::SetTypes {
                        op,
                        column: i,
                        left: a,
                        right: b,
                    })
                }
            };
            Ok(Column::new(l.name.clone(), ty, l.nullable || r.nullable))
        })
        .collect()
}

#[cfg(test)]
fn compile_program(
    builder: &mut CircuitBuilder,
    messages: &mut CompilerMessages,
    program: &str,
) -> Vec<Result<(), CompilerError>> {
    use crate::errors::SourcePosition;
    crate::parser::split_statements(program, SourcePosition::new(1, 1))
        .iter()
        .map(|s| {
            let parsed = crate::pt_to_ast::parse_statement(s, None)?;
            builder.compile(&parsed, messages)
        })
        .collect()
}

#[test]
fn test_views_to_ir() {
    struct Case {
        desc: &'static str,
        input: &'static str,
        expected: &'static str,
    }
    let cases = vec![
        Case {
            desc: "filter and projection",
            input: "CREATE TABLE t (x INT, y INT); CREATE VIEW v AS SELECT x + 1 AS z FROM t WHERE y > 2;",
            expected: "circuit c (weights: i64) {\n  n0 = source t\n  n1 = filter n0 (#1 > 2)\n  \
                       n2 = map n1 [(#0 + 1)]\n  n3 = sink v n2\n}",
        },
        Case {
            desc: "star with union and a constant",
            input: "CREATE TABLE t (x INT); CREATE VIEW v AS SELECT * FROM t UNION SELECT 1;",
            expected: "circuit c (weights: i64) {\n  n0 = source t\n  n1 = constant {(1) => 1}\n  \
                       n2 = sum n0 n1\n  n3 = distinct n2\n  n4 = sink v n3\n}",
        },
        Case {
            desc: "except",
            input: "CREATE TABLE t (x INT); CREATE VIEW v AS SELECT x FROM t EXCEPT SELECT x FROM t WHERE x > 1;",
            expected: "circuit c (weights: i64) {\n  n0 = source t\n  n1 = map n0 [#0]\n  \
                       n2 = filter n0 (#0 > 1)\n  n3 = map n2 [#0]\n  n4 = distinct n1\n  \
                       n5 = distinct n3\n  n6 = negate n5\n  n7 = sum n4 n6\n  n8 = distinct n7\n  \
                       n9 = sink v n8\n}",
        },
        Case {
            desc: "view over view reuses its node",
            input: "CREATE TABLE t (x INT); CREATE VIEW v AS SELECT DISTINCT * FROM t; \
                    CREATE VIEW w AS SELECT * FROM v UNION ALL SELECT * FROM t;",
            expected: "circuit c (weights: i64) {\n  n0 = source t\n  n1 = distinct n0\n  \
                       n2 = sink v n1\n  n3 = sum n1 n0\n  n4 = sink w n3\n}",
        },
    ];
    for case in cases {
        println!("Running case: {}", case.desc);
        let mut builder = CircuitBuilder::new(WeightType::I64, false);
        let mut messages = CompilerMessages::new();
        for result in compile_program(&mut builder, &mut messages, case.input) {
            assert_eq!(result, Ok(()));
        }
        assert_eq!(builder.seal("c").to_string(), case.expected);
    }
}

#[test]
fn test_context_errors() {
    struct Case {
        desc: &'static str,
        input: &'static str,
    }
    let cases = vec![
        Case {
            desc: "unknown table",
            input: "CREATE VIEW v AS SELECT * FROM nowhere",
        },
        Case {
            desc: "unknown column",
            input: "CREATE TABLE t (x INT); CREATE VIEW v AS SELECT y FROM t",
        },
        Case {
            desc: "duplicate table",
            input: "CREATE TABLE t (x INT); CREATE TABLE t (y INT)",
        },
        Case {
            desc: "duplicate column",
            input: "CREATE TABLE t (x INT, x INT)",
        },
        Case {
            desc: "union arity",
            input: "CREATE TABLE t (x INT); CREATE VIEW v AS SELECT x FROM t UNION SELECT 1, 2",
        },
        Case {
            desc: "where is not boolean",
            input: "CREATE TABLE t (x INT); CREATE VIEW v AS SELECT x FROM t WHERE x + 1",
        },
        Case {
            desc: "star without from",
            input: "CREATE VIEW v AS SELECT *",
        },
    ];
    for case in cases {
        println!("Running case: {}", case.desc);
        let mut builder = CircuitBuilder::new(WeightType::I64, false);
        let mut messages = CompilerMessages::new();
        let results = compile_program(&mut builder, &mut messages, case.input);
        assert!(matches!(
            results.last(),
            Some(Err(CompilerError::Context { .. }))
        ));
    }
}

#[test]
fn test_sealed_view_cannot_be_referenced() {
    let mut builder = CircuitBuilder::new(WeightType::I64, false);
    let mut messages = CompilerMessages::new();
    compile_program(
        &mut builder,
        &mut messages,
        "CREATE TABLE t (x INT); CREATE VIEW v AS SELECT * FROM t",
    );
    let first = builder.seal("first");
    assert_eq!(first.output_relations(), vec!["v"]);
    assert!(builder.partial_circuit().is_empty());
    let results = compile_program(
        &mut builder,
        &mut messages,
        "CREATE VIEW w AS SELECT * FROM v; CREATE VIEW u AS SELECT * FROM t",
    );
    assert!(matches!(results[0], Err(CompilerError::Context { .. })));
    assert_eq!(results[1], Ok(()));
    // The table source is added again to the new circuit.
    assert_eq!(builder.seal("second").input_relations(), vec!["t"]);
}

#[test]
fn test_insert_and_delete() {
    let mut builder = CircuitBuilder::new(WeightType::I64, false);
    let mut messages = CompilerMessages::new();
    let results = compile_program(
        &mut builder,
        &mut messages,
        "CREATE TABLE t (x INT, s VARCHAR NOT NULL);
         INSERT INTO t VALUES (1, 'a'), (2, 'b');
         INSERT INTO t (s, x) VALUES ('a', 1);
         INSERT INTO t (s) VALUES ('c');
         DELETE FROM t WHERE x = 1;
         DELETE FROM t WHERE x > 100;",
    );
    assert!(results.iter().all(|r| r.is_ok()));
    let contents = builder.table_contents().contents("t").unwrap();
    use SqlValue::*;
    let row = |x: SqlValue, s: &str| Row::new(vec![x, Text(s.to_string())]);
    assert_eq!(contents.weight(&row(Int(1), "a")), 1);
    assert_eq!(contents.weight(&row(Int(2), "b")), 1);
    assert_eq!(contents.weight(&row(Null(), "c")), 1);
    assert_eq!(contents.len(), 3);
    // The DELETE matching nothing is a warning.
    assert!(messages.has_warnings());
    assert_eq!(messages.exit_code(), 0);
}

#[test]
fn test_insert_errors() {
    struct Case {
        desc: &'static str,
        input: &'static str,
    }
    let cases = vec![
        Case {
            desc: "null in not null column",
            input: "INSERT INTO t VALUES (1, NULL)",
        },
        Case {
            desc: "wrong type",
            input: "INSERT INTO t VALUES ('one', 'a')",
        },
        Case {
            desc: "wrong arity",
            input: "INSERT INTO t VALUES (1)",
        },
        Case {
            desc: "unknown column",
            input: "INSERT INTO t (z) VALUES (1)",
        },
        Case {
            desc: "unknown table",
            input: "INSERT INTO u VALUES (1)",
        },
        Case {
            desc: "division by zero",
            input: "INSERT INTO t VALUES (1 / 0, 'a')",
        },
    ];
    for case in cases {
        println!("Running case: {}", case.desc);
        let mut builder = CircuitBuilder::new(WeightType::I64, false);
        let mut messages = CompilerMessages::new();
        compile_program(&mut builder, &mut messages, "CREATE TABLE t (x INT, s TEXT NOT NULL)");
        let results = compile_program(&mut builder, &mut messages, case.input);
        assert!(results[0].is_err());
        assert!(builder.table_contents().contents("t").unwrap().is_empty());
    }
}

#[test]
fn test_emit_table_deltas() {
    let mut builder = CircuitBuilder::new(WeightType::I32, true);
    let mut messages = CompilerMessages::new();
    compile_program(
        &mut builder,
        &mut messages,
        "CREATE TABLE t (x INT); INSERT INTO t VALUES (1); CREATE VIEW v AS SELECT * FROM t",
    );
    let circuit = builder.seal("c");
    assert_eq!(
        circuit.to_string(),
        "circuit c (weights: i32) {\n  n0 = source t\n  n1 = constant {(1) => 1}\n  \
         n2 = sum n0 n1\n  n3 = sink v n2\n}"
    );
    for node in circuit.nodes() {
        assert_eq!(node.output_type.weight, WeightType::I32);
    }
}

#[test]
fn test_generate_output_for_next_view() {
    let mut builder = CircuitBuilder::new(WeightType::I64, false);
    let mut messages = CompilerMessages::new();
    compile_program(&mut builder, &mut messages, "CREATE TABLE t (x INT)");
    builder.generate_output_for_next_view(false);
    compile_program(&mut builder, &mut messages, "CREATE VIEW hidden AS SELECT x FROM t");
    builder.generate_output_for_next_view(true);
    compile_program(&mut builder, &mut messages, "CREATE VIEW shown AS SELECT * FROM hidden");
    assert_eq!(
        builder
            .output_views()
            .iter()
            .map(|v| v.table_name().to_string())
            .collect::<Vec<_>>(),
        vec!["shown"]
    );
    assert_eq!(builder.seal("c").output_relations(), vec!["shown"]);
}

#[test]
fn test_duplicate_view_columns_warn() {
    let mut builder = CircuitBuilder::new(WeightType::I64, false);
    let mut messages = CompilerMessages::new();
    let results = compile_program(
        &mut builder,
        &mut messages,
        "CREATE TABLE t (x INT); CREATE VIEW v AS SELECT x, x FROM t",
    );
    assert!(results.iter().all(|r| r.is_ok()));
    assert!(messages.has_warnings());
}

#[test]
fn test_failed_statement_leaves_circuit_unchanged() {
    let mut builder = CircuitBuilder::new(WeightType::I64, true);
    let mut messages = CompilerMessages::new();
    let results = compile_program(
        &mut builder,
        &mut messages,
        "CREATE TABLE t (x INT);
         CREATE VIEW v AS SELECT x + 1 FROM t WHERE x > 0 UNION SELECT 1, 2;
         INSERT INTO t VALUES (1), ('two');
         CREATE VIEW w AS SELECT * FROM t",
    );
    assert!(results[1].is_err());
    assert!(results[2].is_err());
    assert_eq!(results[3], Ok(()));
    assert!(builder.table_contents().contents("t").unwrap().is_empty());
    assert_eq!(
        builder.seal("c").to_string(),
        "circuit c (weights: i64) {\n  n0 = source t\n  n1 = sink w n0\n}"
    );
}
