//! Rewrites sealed circuits into cheaper equivalent circuits.
//!
//! Each pass takes a circuit and returns a new one computing the same contents for every view.
//! Passes run in a fixed order and each leaves a circuit with no dead nodes, so running the
//! optimizer again on its own output changes nothing.

use crate::ir::{Circuit, Node, NodeId, Operator, ScalarExpr};
use crate::options::OptimizerOptions;

/// One rewriting pass over a circuit.
pub trait CircuitPass {
    /// Stable pass name, used in logs.
    fn name(&self) -> &str;
    fn apply(&self, circuit: Circuit) -> Circuit;
}

/// Number of consumers of each node.
fn consumer_counts(nodes: &[Node]) -> Vec<usize> {
    let mut counts = vec![0; nodes.len()];
    for node in nodes {
        for input in node.op.inputs() {
            counts[input] += 1;
        }
    }
    counts
}

/// Drops every node that is neither a source nor needed by some sink, and renumbers the rest densely.
fn compact(nodes: Vec<Node>) -> Vec<Node> {
    let mut live: Vec<bool> = nodes
        .iter()
        .map(|n| n.op.is_sink() || n.op.is_source())
        .collect();
    for id in (0..nodes.len()).rev() {
        if live[id] && !nodes[id].op.is_source() {
            for input in nodes[id].op.inputs() {
                live[input] = true;
            }
        }
    }
    let mut new_ids: Vec<Option<NodeId>> = vec![None; nodes.len()];
    let mut result = Vec::with_capacity(nodes.len());
    for (old_id, mut node) in nodes.into_iter().enumerate() {
        if !live[old_id] {
            continue;
        }
        let new_id = result.len();
        new_ids[old_id] = Some(new_id);
        // Inputs of live nodes are live and numbered lower, so they already have new ids.
        node.op.map_inputs(|i| new_ids[i].unwrap_or(i));
        node.id = new_id;
        result.push(node);
    }
    result
}

/// Rewrites every node in order.  `rewrite` sees the already rewritten nodes before the current
/// one and returns either a new operator or the id of an earlier node the current one is equivalent to.
fn rewrite_nodes(
    circuit: Circuit,
    rewrite: impl Fn(&[Node], &[usize], &Node) -> Rewrite,
) -> Circuit {
    let counts = consumer_counts(circuit.nodes());
    let template = circuit.with_nodes(vec![]);
    let mut alias: Vec<NodeId> = Vec::with_capacity(counts.len());
    let mut result: Vec<Node> = Vec::with_capacity(counts.len());
    for mut node in circuit.into_nodes() {
        node.op.map_inputs(|i| alias[i]);
        let id = node.id;
        match rewrite(&result, &counts, &node) {
            Rewrite::Keep => alias.push(id),
            Rewrite::Replace(op) => {
                node.op = op;
                alias.push(id);
            }
            Rewrite::Alias(target) => alias.push(target),
        }
        result.push(node);
    }
    template.with_nodes(compact(result))
}

enum Rewrite {
    Keep,
    Replace(Operator),
    Alias(NodeId),
}

/// Whether projecting `input` through `exprs` returns every column unchanged.
fn is_identity(exprs: &[ScalarExpr], input: &Node) -> bool {
    exprs.len() == input.output_type.columns.len()
        && exprs
            .iter()
            .enumerate()
            .all(|(i, e)| *e == ScalarExpr::Column(i))
}

/// Removes operators that do nothing: identity projections, a distinct of a distinct, and a
/// negation of a negation.
pub struct RedundantOperators;

impl CircuitPass for RedundantOperators {
    fn name(&self) -> &str {
        "redundant-operators"
    }

    fn apply(&self, circuit: Circuit) -> Circuit {
        rewrite_nodes(circuit, |nodes, _, node| match &node.op {
            Operator::Map { input, exprs } if is_identity(exprs, &nodes[*input]) => {
                Rewrite::Alias(*input)
            }
            Operator::Distinct { input } => match nodes[*input].op {
                Operator::Distinct { .. } => Rewrite::Alias(*input),
                _ => Rewrite::Keep,
            },
            Operator::Negate { input } => match nodes[*input].op {
                Operator::Negate { input: inner } => Rewrite::Alias(inner),
                _ => Rewrite::Keep,
            },
            _ => Rewrite::Keep,
        })
    }
}

/// Merges a filter into the filter it reads from, when it is that filter's only consumer.
pub struct FilterFusion;

impl CircuitPass for FilterFusion {
    fn name(&self) -> &str {
        "filter-fusion"
    }

    fn apply(&self, circuit: Circuit) -> Circuit {
        rewrite_nodes(circuit, |nodes, counts, node| match &node.op {
            Operator::Filter { input, predicate } if counts[*input] == 1 => {
                match &nodes[*input].op {
                    Operator::Filter {
                        input: inner,
                        predicate: first,
                    } => Rewrite::Replace(Operator::Filter {
                        input: *inner,
                        predicate: first.clone().and(predicate.clone()),
                    }),
                    _ => Rewrite::Keep,
                }
            }
            _ => Rewrite::Keep,
        })
    }
}

/// Composes a projection with the projection it reads from, when it is that projection's only consumer.
pub struct MapFusion;

impl CircuitPass for MapFusion {
    fn name(&self) -> &str {
        "map-fusion"
    }

    fn apply(&self, circuit: Circuit) -> Circuit {
        rewrite_nodes(circuit, |nodes, counts, node| match &node.op {
            Operator::Map { input, exprs } if counts[*input] == 1 => match &nodes[*input].op {
                Operator::Map {
                    input: inner,
                    exprs: first,
                } => {
                    let composed: Vec<ScalarExpr> =
                        exprs.iter().map(|e| e.substitute(first)).collect();
                    if is_identity(&composed, &nodes[*inner]) {
                        Rewrite::Alias(*inner)
                    } else {
                        Rewrite::Replace(Operator::Map {
                            input: *inner,
                            exprs: composed,
                        })
                    }
                }
                _ => Rewrite::Keep,
            },
            _ => Rewrite::Keep,
        })
    }
}

/// Removes nodes that no view depends on.  Sources are kept even when unused, so the set of
/// input relations of a circuit never changes.
pub struct DeadCodeElimination;

impl CircuitPass for DeadCodeElimination {
    fn name(&self) -> &str {
        "dead-code-elimination"
    }

    fn apply(&self, circuit: Circuit) -> Circuit {
        let template = circuit.with_nodes(vec![]);
        template.with_nodes(compact(circuit.into_nodes()))
    }
}

/// Runs the passes selected by the optimization level.
pub struct CircuitOptimizer {
    passes: Vec<Box<dyn CircuitPass>>,
}

impl CircuitOptimizer {
    pub fn new(options: &OptimizerOptions) -> Self {
        let passes: Vec<Box<dyn CircuitPass>> = match options.optimization_level {
            0 => vec![],
            1 => vec![Box::new(DeadCodeElimination)],
            _ => vec![
                Box::new(RedundantOperators),
                Box::new(FilterFusion),
                Box::new(MapFusion),
                Box::new(DeadCodeElimination),
            ],
        };
        CircuitOptimizer { passes }
    }

    pub fn pass_names(&self) -> Vec<&str> {
        self.passes.iter().map(|p| p.name()).collect()
    }

    pub fn optimize(&self, circuit: Circuit) -> Circuit {
        let mut circuit = circuit;
        for pass in &self.passes {
            let before = circuit.nodes().len();
            circuit = pass.apply(circuit);
            tracing::debug!(
                pass = pass.name(),
                circuit = circuit.name(),
                before,
                after = circuit.nodes().len(),
                "ran optimizer pass"
            );
        }
        circuit
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Op;
    use crate::ir::{PartialCircuit, ZSetType};
    use crate::sql_type::SqlType;
    use crate::sql_value::SqlValue;
    use crate::table_traits::Column;
    use crate::temp_db::TableContents;
    use crate::typed_row::Row;
    use crate::zset::{WeightType, ZSet};

    fn ty(n: usize) -> ZSetType {
        ZSetType::new(
            (0..n)
                .map(|i| Column::new(format!("c{}", i), SqlType::Int, true))
                .collect(),
            WeightType::I64,
        )
    }

    fn gt(col: usize, v: i64) -> ScalarExpr {
        ScalarExpr::Binary {
            op: Op::Gt,
            lhs: Box::new(ScalarExpr::Column(col)),
            rhs: Box::new(ScalarExpr::Literal(SqlValue::Int(v))),
        }
    }

    fn tables() -> TableContents {
        let mut tc = TableContents::new();
        tc.new_table("t".to_string(), ty(2).columns).unwrap();
        tc.new_table("u".to_string(), ty(2).columns).unwrap();
        let mut delta = ZSet::new();
        for (a, b) in [(1, 10), (2, 20), (3, 30), (3, 30)] {
            delta
                .add(
                    Row::new(vec![SqlValue::Int(a), SqlValue::Int(b)]),
                    1,
                    WeightType::I64,
                )
                .unwrap();
        }
        tc.add_to_table("t", &delta).unwrap();
        tc
    }

    /// t -> filter -> filter -> map -> map(identity) -> distinct -> distinct -> sink v
    /// u is never read by any view.
    fn test_circuit() -> Circuit {
        let mut pc = PartialCircuit::new(WeightType::I64);
        let t = pc.add(Operator::Source { table: "t".to_string() }, ty(2), None).unwrap();
        pc.add(Operator::Source { table: "u".to_string() }, ty(2), None).unwrap();
        let f1 = pc
            .add(Operator::Filter { input: t, predicate: gt(0, 1) }, ty(2), None)
            .unwrap();
        let f2 = pc
            .add(Operator::Filter { input: f1, predicate: gt(1, 20) }, ty(2), None)
            .unwrap();
        let m1 = pc
            .add(
                Operator::Map {
                    input: f2,
                    exprs: vec![ScalarExpr::Column(1), ScalarExpr::Column(0)],
                },
                ty(2),
                None,
            )
            .unwrap();
        let m2 = pc
            .add(
                Operator::Map {
                    input: m1,
                    exprs: vec![ScalarExpr::Column(0), ScalarExpr::Column(1)],
                },
                ty(2),
                None,
            )
            .unwrap();
        let d1 = pc.add(Operator::Distinct { input: m2 }, ty(2), None).unwrap();
        let d2 = pc.add(Operator::Distinct { input: d1 }, ty(2), None).unwrap();
        // A dangling computation that reaches no sink.
        pc.add(Operator::Negate { input: d2 }, ty(2), None).unwrap();
        pc.add(Operator::Sink { input: d2, view: "v".to_string() }, ty(2), None)
            .unwrap();
        pc.seal("test")
    }

    #[test]
    fn test_optimize_preserves_results() {
        let circuit = test_circuit();
        let optimizer = CircuitOptimizer::new(&OptimizerOptions::default());
        let optimized = optimizer.optimize(circuit.clone());
        let expected = crate::ir_interpreter::run_ir(&circuit, &tables()).unwrap();
        let actual = crate::ir_interpreter::run_ir(&optimized, &tables()).unwrap();
        assert_eq!(actual, expected);
        assert_eq!(optimized.input_relations(), vec!["t", "u"]);
        assert_eq!(optimized.output_relations(), vec!["v"]);
        assert_eq!(
            optimized.to_string(),
            "circuit test (weights: i64) {\n  n0 = source t\n  n1 = source u\n  \
             n2 = filter n0 ((#0 > 1) AND (#1 > 20))\n  n3 = map n2 [#1, #0]\n  \
             n4 = distinct n3\n  n5 = sink v n4\n}"
        );
    }

    #[test]
    fn test_optimize_is_idempotent() {
        let optimizer = CircuitOptimizer::new(&OptimizerOptions::default());
        let once = optimizer.optimize(test_circuit());
        let twice = optimizer.optimize(once.clone());
        assert_eq!(once, twice);
    }

    #[test]
    fn test_optimization_levels() {
        struct Case {
            level: u32,
            expected_passes: Vec<&'static str>,
        }
        let cases = vec![
            Case {
                level: 0,
                expected_passes: vec![],
            },
            Case {
                level: 1,
                expected_passes: vec!["dead-code-elimination"],
            },
            Case {
                level: 2,
                expected_passes: vec![
                    "redundant-operators",
                    "filter-fusion",
                    "map-fusion",
                    "dead-code-elimination",
                ],
            },
        ];
        for case in cases {
            println!("Running case: level {}", case.level);
            let options = OptimizerOptions {
                optimization_level: case.level,
                ..OptimizerOptions::default()
            };
            assert_eq!(CircuitOptimizer::new(&options).pass_names(), case.expected_passes);
        }
        let options = OptimizerOptions {
            optimization_level: 0,
            ..OptimizerOptions::default()
        };
        let circuit = test_circuit();
        assert_eq!(CircuitOptimizer::new(&options).optimize(circuit.clone()), circuit);
    }

    #[test]
    fn test_filter_fusion_respects_shared_inputs() {
        let mut pc = PartialCircuit::new(WeightType::I64);
        let t = pc.add(Operator::Source { table: "t".to_string() }, ty(2), None).unwrap();
        let f1 = pc
            .add(Operator::Filter { input: t, predicate: gt(0, 1) }, ty(2), None)
            .unwrap();
        let f2 = pc
            .add(Operator::Filter { input: f1, predicate: gt(1, 20) }, ty(2), None)
            .unwrap();
        pc.add(Operator::Sink { input: f1, view: "a".to_string() }, ty(2), None)
            .unwrap();
        pc.add(Operator::Sink { input: f2, view: "b".to_string() }, ty(2), None)
            .unwrap();
        let circuit = pc.seal("shared");
        let fused = FilterFusion.apply(circuit.clone());
        assert_eq!(fused, circuit);
    }
}
