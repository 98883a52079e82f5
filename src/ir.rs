//! `ir` defines the circuit intermediate representation (IR) that SQL views compile to.
//!
//! A circuit is a dataflow graph whose edges carry weighted relations (Z-sets).  The AST and IR are
//! separate: the AST follows the syntax of the program, the IR describes how view contents are
//! computed from table contents, and only refers to columns by position.
//!
//! As an example, begin with these definitions:
//!
//! ```sql
//! create table t (a int, b int);
//! create view v as select a + 1 from t where b > 10;
//! ```
//! The view compiles to this circuit:
//! ```text
//! n0 = source t
//! n1 = filter n0 (#1 > 10)
//! n2 = map n1 [(#0 + 1)]
//! n3 = sink v n2
//! ```
//! A downstream runtime feeds changes of `t` into `n0` and reads changes of `v` from `n3`.
//!
//! Nodes are numbered densely, and every node only refers to nodes with smaller numbers, so the
//! node list is always in topological order.

use crate::ast;
use crate::sql_value::SqlValue;
use crate::table_traits::Column;
use crate::zset::{WeightType, ZSet};

/// Index of a node in its circuit.
pub type NodeId = usize;

/// A scalar expression over the columns of one input row.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub enum ScalarExpr {
    Column(usize),
    Literal(SqlValue),
    Binary {
        op: ast::Op,
        lhs: Box<ScalarExpr>,
        rhs: Box<ScalarExpr>,
    },
    Unary {
        op: ast::UnaryOp,
        expr: Box<ScalarExpr>,
    },
    IsNull {
        expr: Box<ScalarExpr>,
        negated: bool,
    },
}

impl ScalarExpr {
    /// Replaces every column reference `#i` with `columns[i]`.
    pub fn substitute(&self, columns: &[ScalarExpr]) -> ScalarExpr {
        match self {
            ScalarExpr::Column(i) => columns[*i].clone(),
            ScalarExpr::Literal(v) => ScalarExpr::Literal(v.clone()),
            ScalarExpr::Binary { op, lhs, rhs } => ScalarExpr::Binary {
                op: *op,
                lhs: Box::new(lhs.substitute(columns)),
                rhs: Box::new(rhs.substitute(columns)),
            },
            ScalarExpr::Unary { op, expr } => ScalarExpr::Unary {
                op: *op,
                expr: Box::new(expr.substitute(columns)),
            },
            ScalarExpr::IsNull { expr, negated } => ScalarExpr::IsNull {
                expr: Box::new(expr.substitute(columns)),
                negated: *negated,
            },
        }
    }

    pub fn and(self, other: ScalarExpr) -> ScalarExpr {
        ScalarExpr::Binary {
            op: ast::Op::And,
            lhs: Box::new(self),
            rhs: Box::new(other),
        }
    }
}

impl std::fmt::Display for ScalarExpr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScalarExpr::Column(i) => write!(f, "#{}", i),
            ScalarExpr::Literal(SqlValue::Text(s)) => write!(f, "'{}'", s),
            ScalarExpr::Literal(v) => v.fmt(f),
            ScalarExpr::Binary { op, lhs, rhs } => write!(f, "({} {} {})", lhs, op, rhs),
            ScalarExpr::Unary { op, expr } => write!(f, "{}{}", op, expr),
            ScalarExpr::IsNull {
                expr,
                negated: false,
            } => write!(f, "({} IS NULL)", expr),
            ScalarExpr::IsNull {
                expr,
                negated: true,
            } => write!(f, "({} IS NOT NULL)", expr),
        }
    }
}

/// The type of the relation a node produces.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct ZSetType {
    pub columns: Vec<Column>,
    pub weight: WeightType,
}

impl ZSetType {
    pub fn new(columns: Vec<Column>, weight: WeightType) -> Self {
        ZSetType { columns, weight }
    }
}

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub enum Operator {
    /// Changes of an input table.
    Source { table: String },
    /// A fixed Z-set, produced once.
    Constant { data: ZSet },
    Map { input: NodeId, exprs: Vec<ScalarExpr> },
    Filter { input: NodeId, predicate: ScalarExpr },
    Distinct { input: NodeId },
    Negate { input: NodeId },
    Sum { inputs: Vec<NodeId> },
    /// Changes of an output view.
    Sink { input: NodeId, view: String },
}

impl Operator {
    pub fn inputs(&self) -> Vec<NodeId> {
        match self {
            Operator::Source { .. } | Operator::Constant { .. } => vec![],
            Operator::Map { input, .. }
            | Operator::Filter { input, .. }
            | Operator::Distinct { input }
            | Operator::Negate { input }
            | Operator::Sink { input, .. } => vec![*input],
            Operator::Sum { inputs } => inputs.clone(),
        }
    }

    /// Rewrites every input reference through `f`.
    pub fn map_inputs(&mut self, mut f: impl FnMut(NodeId) -> NodeId) {
        match self {
            Operator::Source { .. } | Operator::Constant { .. } => (),
            Operator::Map { input, .. }
            | Operator::Filter { input, .. }
            | Operator::Distinct { input }
            | Operator::Negate { input }
            | Operator::Sink { input, .. } => *input = f(*input),
            Operator::Sum { inputs } => {
                for input in inputs.iter_mut() {
                    *input = f(*input);
                }
            }
        }
    }

    pub fn is_source(&self) -> bool {
        matches!(self, Operator::Source { .. })
    }

    pub fn is_sink(&self) -> bool {
        matches!(self, Operator::Sink { .. })
    }
}

impl std::fmt::Display for Operator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Operator::Source { table } => write!(f, "source {}", table),
            Operator::Constant { data } => write!(f, "constant {}", data),
            Operator::Map { input, exprs } => write!(
                f,
                "map n{} [{}]",
                input,
                exprs
                    .iter()
                    .map(|e| e.to_string())
                    .collect::<Vec<String>>()
                    .join(", ")
            ),
            Operator::Filter { input, predicate } => write!(f, "filter n{} {}", input, predicate),
            Operator::Distinct { input } => write!(f, "distinct n{}", input),
            Operator::Negate { input } => write!(f, "negate n{}", input),
            Operator::Sum { inputs } => write!(
                f,
                "sum {}",
                inputs
                    .iter()
                    .map(|i| format!("n{}", i))
                    .collect::<Vec<String>>()
                    .join(" ")
            ),
            Operator::Sink { input, view } => write!(f, "sink {} n{}", view, input),
        }
    }
}

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct Node {
    pub id: NodeId,
    pub op: Operator,
    pub output_type: ZSetType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("Node n{node} refers to missing input n{input}")]
    DanglingInput { node: NodeId, input: NodeId },
    #[error("Node weight type {found} does not match circuit weight type {expected}")]
    WeightTypeMismatch {
        found: WeightType,
        expected: WeightType,
    },
    #[error("Constant does not fit the circuit weight type: {0}")]
    Weight(#[from] crate::zset::Error),
}

/// The mutable circuit under construction.  Only the circuit builder holds one.
#[derive(Debug, Clone, PartialEq)]
pub struct PartialCircuit {
    weight_type: WeightType,
    nodes: Vec<Node>,
}

impl PartialCircuit {
    pub fn new(weight_type: WeightType) -> Self {
        PartialCircuit {
            weight_type,
            nodes: vec![],
        }
    }

    pub fn weight_type(&self) -> WeightType {
        self.weight_type
    }

    /// Appends a node and returns its id.
    pub fn add(
        &mut self,
        op: Operator,
        output_type: ZSetType,
        comment: Option<String>,
    ) -> Result<NodeId, Error> {
        let id = self.nodes.len();
        if output_type.weight != self.weight_type {
            return Err(Error::WeightTypeMismatch {
                found: output_type.weight,
                expected: self.weight_type,
            });
        }
        if let Some(input) = op.inputs().into_iter().find(|i| *i >= id) {
            return Err(Error::DanglingInput { node: id, input });
        }
        if let Operator::Constant { data } = &op {
            self.weight_type.check(data.max_abs_weight() as i128)?;
        }
        self.nodes.push(Node {
            id,
            op,
            output_type,
            comment,
        });
        Ok(id)
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Drops the nodes added after the first `len`.
    pub fn truncate(&mut self, len: usize) {
        self.nodes.truncate(len);
    }

    /// Freezes the circuit under a name.
    pub fn seal(self, name: &str) -> Circuit {
        tracing::trace!(name, nodes = self.nodes.len(), "sealing circuit");
        Circuit {
            name: name.to_string(),
            weight_type: self.weight_type,
            nodes: self.nodes,
        }
    }
}

/// An immutable, named circuit.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct Circuit {
    name: String,
    weight_type: WeightType,
    nodes: Vec<Node>,
}

impl Circuit {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn weight_type(&self) -> WeightType {
        self.weight_type
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    pub fn rename(self, name: &str) -> Circuit {
        Circuit {
            name: name.to_string(),
            ..self
        }
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Names of the tables this circuit reads, in node order.
    pub fn input_relations(&self) -> Vec<&str> {
        self.nodes
            .iter()
            .filter_map(|n| match &n.op {
                Operator::Source { table } => Some(table.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Names of the views this circuit produces, in node order.
    pub fn output_relations(&self) -> Vec<&str> {
        self.nodes
            .iter()
            .filter_map(|n| match &n.op {
                Operator::Sink { view, .. } => Some(view.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Builds a circuit with the same name and weight type over a rewritten node list.
    pub(crate) fn with_nodes(&self, nodes: Vec<Node>) -> Circuit {
        Circuit {
            name: self.name.clone(),
            weight_type: self.weight_type,
            nodes,
        }
    }

    pub(crate) fn into_nodes(self) -> Vec<Node> {
        self.nodes
    }
}

impl std::fmt::Display for Circuit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "circuit {} (weights: {}) {{", self.name, self.weight_type)?;
        for node in &self.nodes {
            if let Some(comment) = &node.comment {
                writeln!(f, "  // {}", comment)?;
            }
            writeln!(f, "  n{} = {}", node.id, node.op)?;
        }
        write!(f, "}}")
    }
}

#[cfg(test)]
fn int_type(weight: WeightType) -> ZSetType {
    ZSetType::new(
        vec![Column::new("x", crate::sql_type::SqlType::Int, true)],
        weight,
    )
}

#[test]
fn test_partial_circuit_checks_inputs_and_weights() {
    let mut pc = PartialCircuit::new(WeightType::I32);
    let src = pc
        .add(
            Operator::Source {
                table: "t".to_string(),
            },
            int_type(WeightType::I32),
            None,
        )
        .unwrap();
    assert_eq!(
        pc.add(Operator::Distinct { input: 5 }, int_type(WeightType::I32), None),
        Err(Error::DanglingInput { node: 1, input: 5 })
    );
    assert!(matches!(
        pc.add(Operator::Distinct { input: src }, int_type(WeightType::I64), None),
        Err(Error::WeightTypeMismatch { .. })
    ));
    pc.add(
        Operator::Sink {
            input: src,
            view: "v".to_string(),
        },
        int_type(WeightType::I32),
        Some("copy of t".to_string()),
    )
    .unwrap();
    let circuit = pc.seal("c");
    assert_eq!(circuit.input_relations(), vec!["t"]);
    assert_eq!(circuit.output_relations(), vec!["v"]);
    assert_eq!(
        circuit.to_string(),
        "circuit c (weights: i32) {\n  n0 = source t\n  // copy of t\n  n1 = sink v n0\n}"
    );
    let renamed = circuit.rename("d");
    assert_eq!(renamed.name(), "d");
    assert_eq!(renamed.nodes().len(), 2);
}

#[test]
fn test_substitute() {
    use crate::ast::Op;
    let e = ScalarExpr::Binary {
        op: Op::Add,
        lhs: Box::new(ScalarExpr::Column(0)),
        rhs: Box::new(ScalarExpr::Literal(SqlValue::Int(1))),
    };
    let inner = vec![ScalarExpr::Column(3)];
    assert_eq!(e.substitute(&inner).to_string(), "(#3 + 1)");
}
