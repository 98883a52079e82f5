use pretty_assertions::assert_eq;
use serde_json::json;

use sqlcircuit::errors::SourcePosition;
use sqlcircuit::ir_interpreter::run_ir;
use sqlcircuit::sql_value::SqlValue;
use sqlcircuit::typed_row::Row;
use sqlcircuit::{
    Compiler, CompilerOptions, Error, InputSource, JitFileAndSerialization, JitSerialization,
    WeightType,
};

fn compiler_with(throw_on_error: bool, optimization_level: u32) -> Compiler {
    let mut options = CompilerOptions::default();
    options.optimizer_options.throw_on_error = throw_on_error;
    options.optimizer_options.optimization_level = optimization_level;
    Compiler::new(options)
}

fn int_row(values: &[i64]) -> Row {
    Row::new(values.iter().map(|v| SqlValue::Int(*v)).collect())
}

#[test]
fn test_switching_source_kind_is_a_configuration_error() {
    let mut compiler = Compiler::new(CompilerOptions::default());
    compiler
        .set_entire_input(None, "CREATE TABLE t (x INT);".as_bytes())
        .unwrap();
    assert_eq!(compiler.input_source(), InputSource::Stdin);
    let result = compiler.compile_statements("CREATE TABLE u (x INT); INSERT INTO u VALUES (1);");
    assert!(matches!(result, Err(Error::Configuration(_))));
    // Nothing in the rejected call was compiled or recorded.
    assert!(compiler.input_tables().is_empty());
    assert!(compiler.get_table_contents().tables().is_empty());
    assert!(compiler.messages().is_empty());
    assert_eq!(compiler.sources().whole_program(), "CREATE TABLE t (x INT);");

    compiler.compile_input().unwrap();
    assert_eq!(compiler.input_tables().len(), 1);

    let mut compiler = Compiler::new(CompilerOptions::default());
    compiler.compile_statement("CREATE TABLE t (x INT)", None).unwrap();
    let result = compiler.set_entire_input(Some("prog.sql"), "CREATE TABLE u (y INT);".as_bytes());
    assert!(matches!(result, Err(Error::Configuration(_))));
    assert_eq!(compiler.sources().whole_program(), "CREATE TABLE t (x INT)");
}

#[test]
fn test_get_final_circuit_starts_a_new_circuit() {
    let mut compiler = Compiler::new(CompilerOptions::default());
    compiler
        .compile_statements("CREATE TABLE t (x INT); CREATE VIEW v AS SELECT x FROM t;")
        .unwrap();
    let first = compiler.get_final_circuit("first");
    assert_eq!(first.name(), "first");
    assert_eq!(first.input_relations(), vec!["t"]);
    assert_eq!(first.output_relations(), vec!["v"]);

    let second = compiler.get_final_circuit("second");
    let third = compiler.get_final_circuit("third");
    assert!(second.is_empty());
    assert_eq!(second.nodes(), third.nodes());
    assert_eq!(second.name(), "second");
    assert_eq!(third.name(), "third");
}

#[test]
fn test_table_contents_outlive_circuits() {
    let mut compiler = Compiler::new(CompilerOptions::default());
    compiler
        .compile_statements("CREATE TABLE t (x INT); INSERT INTO t VALUES (1), (2);")
        .unwrap();
    compiler.get_final_circuit("a");
    compiler
        .compile_statements("INSERT INTO t VALUES (3); DELETE FROM t WHERE x = 2;")
        .unwrap();
    compiler.get_final_circuit("b");
    let contents = compiler.get_table_contents().contents("t").unwrap();
    let rows: Vec<(Row, i64)> = contents.iter().map(|(r, w)| (r.clone(), *w)).collect();
    assert_eq!(rows, vec![(int_row(&[1]), 1), (int_row(&[3]), 1)]);
}

#[test]
fn test_insert_twice_delete_once() {
    let mut compiler = Compiler::new(CompilerOptions::default());
    compiler.compile_statement("CREATE TABLE t(x INT)", None).unwrap();
    compiler.compile_statement("INSERT INTO t VALUES (1)", None).unwrap();
    compiler.compile_statement("INSERT INTO t VALUES (1)", None).unwrap();
    compiler.compile_statement("DELETE FROM t WHERE x=1", None).unwrap();
    assert!(!compiler.has_errors());
    let contents = compiler.get_table_contents().contents("t").unwrap();
    assert_eq!(contents.len(), 1);
    assert_eq!(contents.weight(&int_row(&[1])), 1);
}

#[test]
fn test_unmatched_delete_is_a_warning() {
    let mut compiler = Compiler::new(CompilerOptions::default());
    compiler
        .compile_statements("CREATE TABLE t (x INT); DELETE FROM t WHERE x = 7;")
        .unwrap();
    assert!(compiler.has_warnings());
    assert!(!compiler.has_errors());
    assert!(compiler.throw_if_errors_occurred().is_ok());
}

#[test]
fn test_jit_runtime_config_requires_one_file_per_relation() {
    let mut compiler = Compiler::new(CompilerOptions::default());
    compiler
        .compile_statements(
            "CREATE TABLE t (x INT); CREATE TABLE u (y INT); CREATE VIEW v AS SELECT * FROM t;",
        )
        .unwrap();
    let file = |p: &str| JitFileAndSerialization::new(p, JitSerialization::Json);
    let two = vec![file("t.json"), file("u.json")];
    let one = vec![file("v.json")];
    assert!(compiler.create_jit_runtime_config(&two, &one).is_ok());
    assert!(matches!(
        compiler.create_jit_runtime_config(&one, &one),
        Err(Error::Configuration(_))
    ));
    assert!(matches!(
        compiler.create_jit_runtime_config(&two, &two),
        Err(Error::Configuration(_))
    ));
    assert!(matches!(
        compiler.create_jit_runtime_config(&two, &[]),
        Err(Error::Configuration(_))
    ));
}

#[test]
fn test_jit_runtime_config_document() {
    let mut options = CompilerOptions::default();
    options.io_options.jit = true;
    let mut compiler = Compiler::new(options);
    compiler
        .compile_statements("CREATE TABLE t (x INT NOT NULL); CREATE VIEW v AS SELECT x AS y FROM t;")
        .unwrap();
    assert_eq!(compiler.weight_type(), WeightType::I32);
    let config = compiler
        .create_jit_runtime_config(
            &[JitFileAndSerialization::new("in/t.json", JitSerialization::Json)],
            &[JitFileAndSerialization::new("out/v.csv", JitSerialization::Csv)],
        )
        .unwrap();
    assert_eq!(
        config.as_json(),
        json!({
            "workers": 1,
            "optimize": false,
            "release": false,
            "inputs": {
                "t": { "file": "in/t.json", "kind": { "Json": { "mappings": { "0": "/x" } } } }
            },
            "outputs": {
                "v": { "file": "out/v.csv", "kind": { "Csv": [[0, 0, null]] } }
            }
        })
    );
}

#[test]
fn test_io_metadata() {
    let mut compiler = Compiler::new(CompilerOptions::default());
    compiler
        .compile_statements(
            "CREATE TABLE b (s VARCHAR(10) NOT NULL); CREATE TABLE a (r DOUBLE);
             CREATE VIEW v AS SELECT r * 2 AS d FROM a;",
        )
        .unwrap();
    assert_eq!(
        compiler.get_io_metadata_as_json(),
        json!({
            "inputs": [
                { "name": "b", "fields": [
                    { "name": "s", "case_sensitive": false, "columntype": { "type": "VARCHAR", "nullable": false } }
                ] },
                { "name": "a", "fields": [
                    { "name": "r", "case_sensitive": false, "columntype": { "type": "DOUBLE", "nullable": true } }
                ] },
            ],
            "outputs": [
                { "name": "v", "fields": [
                    { "name": "d", "case_sensitive": false, "columntype": { "type": "DOUBLE", "nullable": true } }
                ] },
            ],
        })
    );
}

#[test]
fn test_optimize_twice_keeps_relations() {
    let mut compiler = Compiler::new(CompilerOptions::default());
    compiler
        .compile_statements("CREATE TABLE t(x INT); CREATE VIEW v AS SELECT x FROM t;")
        .unwrap();
    compiler.optimize();
    let once = compiler.get_final_circuit("once");
    let mut compiler = Compiler::new(CompilerOptions::default());
    compiler
        .compile_statements("CREATE TABLE t(x INT); CREATE VIEW v AS SELECT x FROM t;")
        .unwrap();
    compiler.optimize();
    compiler.optimize();
    let twice = compiler.get_final_circuit("once");
    assert_eq!(once.input_relations(), vec!["t"]);
    assert_eq!(once.output_relations(), vec!["v"]);
    assert_eq!(twice.input_relations(), once.input_relations());
    assert_eq!(twice.output_relations(), once.output_relations());
    assert_eq!(twice, once);
}

#[test]
fn test_optimize_without_sealed_circuit_uses_temporary_name() {
    let mut compiler = Compiler::new(CompilerOptions::default());
    compiler.compile_statements("CREATE TABLE t(x INT);").unwrap();
    compiler.optimize();
    // Statements after optimize go to the next circuit.
    compiler
        .compile_statements("CREATE VIEW v AS SELECT * FROM t;")
        .unwrap();
    let optimized = compiler.get_final_circuit("first");
    assert_eq!(optimized.output_relations(), Vec::<&str>::new());
    let next = compiler.get_final_circuit("second");
    assert_eq!(next.input_relations(), vec!["t"]);
    assert_eq!(next.output_relations(), vec!["v"]);
}

#[test]
fn test_optimization_preserves_view_contents() {
    let program = "
        CREATE TABLE t (x INT, y INT NOT NULL);
        CREATE TABLE u (x INT);
        INSERT INTO t VALUES (1, 10), (2, 20), (2, 20), (3, 30), (NULL, 40);
        INSERT INTO u VALUES (2), (5);
        CREATE VIEW big AS SELECT x, y FROM t WHERE y > 10;
        CREATE VIEW bigger AS SELECT x + 1 AS x1 FROM big WHERE y >= 20;
        CREATE VIEW distinct_x AS SELECT DISTINCT x FROM t;
        CREATE VIEW all_x AS SELECT x FROM t UNION ALL SELECT x FROM u;
        CREATE VIEW any_x AS SELECT x FROM t UNION SELECT x FROM u;
        CREATE VIEW only_t AS SELECT x FROM t EXCEPT SELECT x FROM u;
        CREATE VIEW consts AS SELECT 1 + 2 AS three, 'a' AS letter;
        DELETE FROM t WHERE x = 3;
    ";
    let mut results = vec![];
    for level in [0, 1, 2] {
        let mut compiler = compiler_with(false, level);
        compiler.compile_statements(program).unwrap();
        compiler.throw_if_errors_occurred().unwrap();
        compiler.optimize();
        let circuit = compiler.get_final_circuit("c");
        results.push(run_ir(&circuit, compiler.get_table_contents()).unwrap());
    }
    assert_eq!(results[0], results[1]);
    assert_eq!(results[0], results[2]);

    let views = &results[0];
    assert_eq!(views.len(), 7);
    assert_eq!(views["bigger"].weight(&int_row(&[3])), 2);
    assert_eq!(views["bigger"].len(), 2);
    assert_eq!(views["distinct_x"].weight(&int_row(&[2])), 1);
    assert_eq!(views["all_x"].weight(&int_row(&[2])), 3);
    assert_eq!(views["any_x"].weight(&int_row(&[2])), 1);
    assert_eq!(views["only_t"].weight(&int_row(&[2])), 0);
    assert_eq!(views["only_t"].weight(&int_row(&[1])), 1);
    assert_eq!(
        views["consts"].weight(&Row::new(vec![SqlValue::Int(3), SqlValue::Text("a".to_string())])),
        1
    );
}

#[test]
fn test_fused_filters_keep_guard_before_partial_predicate() {
    let mut results = vec![];
    for level in [0, 2] {
        let mut compiler = compiler_with(false, level);
        compiler
            .compile_statements("CREATE TABLE t (x INT); INSERT INTO t VALUES (0), (5);")
            .unwrap();
        compiler.generate_output_for_next_view(false);
        compiler
            .compile_statement("CREATE VIEW nonzero AS SELECT * FROM t WHERE x <> 0", None)
            .unwrap();
        compiler.generate_output_for_next_view(true);
        compiler
            .compile_statement("CREATE VIEW w AS SELECT * FROM nonzero WHERE 10 / x > 1", None)
            .unwrap();
        compiler.throw_if_errors_occurred().unwrap();
        compiler.optimize();
        let circuit = compiler.get_final_circuit("c");
        results.push(run_ir(&circuit, compiler.get_table_contents()).unwrap());
    }
    assert_eq!(results[0], results[1]);
    assert_eq!(results[0]["w"].weight(&int_row(&[5])), 1);
    assert_eq!(results[0]["w"].len(), 1);
}

#[test]
fn test_syntax_error_is_recorded_and_compilation_continues() {
    let mut compiler = compiler_with(false, 2);
    compiler
        .compile_statements(
            "CREATE TABLE t (x INT);\nCREATE VIEW v AS SELEC x FROM t;\nCREATE VIEW w AS SELECT x FROM t;",
        )
        .unwrap();
    assert!(compiler.has_errors());
    let errors: Vec<_> = compiler.messages().errors().collect();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].category, "Syntax error");
    assert_eq!(errors[0].range.start, SourcePosition::new(2, 1));
    assert_eq!(
        compiler.sources().fragment(errors[0].range),
        "CREATE VIEW v AS SELEC x FROM t"
    );
    let circuit = compiler.get_final_circuit("c");
    assert_eq!(circuit.output_relations(), vec!["w"]);
    assert!(matches!(
        compiler.throw_if_errors_occurred(),
        Err(Error::Compilation(_))
    ));
}

#[test]
fn test_syntax_error_with_throw_on_error_stops() {
    let mut compiler = compiler_with(true, 2);
    let result = compiler.compile_statements(
        "CREATE TABLE t (x INT);\nCREATE VIEW v AS SELEC x FROM t;\nCREATE VIEW w AS SELECT x FROM t;",
    );
    assert!(matches!(result, Err(Error::Compilation(_))));
    assert!(compiler.has_errors());
    assert_eq!(compiler.input_tables().len(), 1);
    assert!(compiler.output_views().is_empty());
    assert_eq!(compiler.get_final_circuit("c").output_relations(), Vec::<&str>::new());
}

#[test]
fn test_ranges_across_calls() {
    let mut compiler = Compiler::new(CompilerOptions::default());
    compiler.compile_statement("CREATE TABLE t (x INT);", None).unwrap();
    compiler
        .compile_statement("INSERT INTO t VALUES (1);\n  SELECT;", None)
        .unwrap();
    compiler
        .compile_statement("CREATE VIEW v AS SELECT z FROM t", None)
        .unwrap();
    let errors: Vec<_> = compiler.messages().errors().collect();
    assert_eq!(errors.len(), 2);
    assert_eq!(errors[0].range.start, SourcePosition::new(3, 3));
    assert_eq!(compiler.sources().fragment(errors[0].range), "SELECT");
    assert_eq!(errors[1].range.start, SourcePosition::new(4, 1));
    assert!(errors[1].message.contains("'z'"));

    let mut shown = Vec::new();
    compiler.show_errors(&mut shown).unwrap();
    let shown = String::from_utf8(shown).unwrap();
    assert!(shown.contains("3:3: error: Syntax error"));
    assert!(shown.contains("    CREATE VIEW v AS SELECT z FROM t"));
}

#[test]
fn test_compile_input_from_file() {
    let program = "-- tables\nCREATE TABLE t (x INT);\nINSERT INTO t VALUES (1), (2);\n\
                   CREATE VIEW v AS SELECT x FROM t WHERE x > 1;\n";
    let mut compiler = Compiler::new(CompilerOptions::default());
    compiler
        .set_entire_input(Some("program.sql"), program.as_bytes())
        .unwrap();
    assert_eq!(compiler.input_source(), InputSource::File);
    compiler.compile_input().unwrap();
    compiler.throw_if_errors_occurred().unwrap();
    assert_eq!(compiler.sources().source_name(), "program.sql");
    let circuit = compiler.get_final_circuit("c");
    let views = run_ir(&circuit, compiler.get_table_contents()).unwrap();
    assert_eq!(views["v"].iter().count(), 1);
    assert_eq!(views["v"].weight(&int_row(&[2])), 1);
}

#[test]
fn test_circuit_json() {
    let mut compiler = Compiler::new(CompilerOptions::default());
    compiler
        .compile_statement("CREATE TABLE t (x INT); CREATE VIEW v AS SELECT * FROM t", Some("v is t"))
        .unwrap();
    let circuit = compiler.get_final_circuit("c");
    let value = serde_json::to_value(&circuit).unwrap();
    assert_eq!(value["name"], json!("c"));
    assert_eq!(value["weight_type"], json!("i64"));
    assert_eq!(value["nodes"].as_array().map(|n| n.len()), Some(2));
    assert_eq!(value["nodes"][1]["comment"], json!("v is t"));
}
