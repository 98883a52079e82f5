//! Descriptions of the relations a circuit reads and writes, in the forms handed to execution backends.
//!
//! The I/O metadata lists every input table and output view with its columns.  The JIT runtime
//! additionally needs to know which file each relation lives in and how rows are serialized there.

use std::collections::BTreeMap;
use std::str::FromStr;

use serde_json::{json, Value};

use crate::table_traits::{Column, TableMeta};

fn relation_json(name: &str, columns: &[Column]) -> Value {
    let fields: Vec<Value> = columns
        .iter()
        .map(|c| {
            json!({
                "name": c.name,
                "case_sensitive": false,
                "columntype": {
                    "type": c.ty.io_name(),
                    "nullable": c.nullable,
                },
            })
        })
        .collect();
    json!({ "name": name, "fields": fields })
}

/// A declared table.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct InputTableDescription {
    name: String,
    columns: Vec<Column>,
}

impl InputTableDescription {
    pub fn new(name: impl Into<String>, columns: Vec<Column>) -> Self {
        InputTableDescription {
            name: name.into(),
            columns,
        }
    }

    pub fn as_json(&self) -> Value {
        relation_json(&self.name, &self.columns)
    }

    pub fn jit_description(&self, file: &JitFileAndSerialization) -> JitIODescription {
        JitIODescription::new(&self.name, &self.columns, file.clone(), true)
    }
}

impl TableMeta for InputTableDescription {
    fn table_name(&self) -> &str {
        &self.name
    }
    fn columns(&self) -> &[Column] {
        &self.columns
    }
}

/// A view that the circuit produces as an output.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct OutputViewDescription {
    name: String,
    columns: Vec<Column>,
}

impl OutputViewDescription {
    pub fn new(name: impl Into<String>, columns: Vec<Column>) -> Self {
        OutputViewDescription {
            name: name.into(),
            columns,
        }
    }

    pub fn as_json(&self) -> Value {
        relation_json(&self.name, &self.columns)
    }

    pub fn jit_description(&self, file: &JitFileAndSerialization) -> JitIODescription {
        JitIODescription::new(&self.name, &self.columns, file.clone(), false)
    }
}

impl TableMeta for OutputViewDescription {
    fn table_name(&self) -> &str {
        &self.name
    }
    fn columns(&self) -> &[Column] {
        &self.columns
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum JitSerialization {
    Json,
    Csv,
}

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum Error {
    #[error("Unknown serialization format {0}; expected json or csv")]
    UnknownSerialization(String),
}

impl FromStr for JitSerialization {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(JitSerialization::Json),
            "csv" => Ok(JitSerialization::Csv),
            x => Err(Error::UnknownSerialization(x.to_string())),
        }
    }
}

impl std::fmt::Display for JitSerialization {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JitSerialization::Json => "json".fmt(f),
            JitSerialization::Csv => "csv".fmt(f),
        }
    }
}

/// Where the rows of one relation are stored, and in what format.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct JitFileAndSerialization {
    pub path: String,
    pub serialization: JitSerialization,
}

impl JitFileAndSerialization {
    pub fn new(path: impl Into<String>, serialization: JitSerialization) -> Self {
        JitFileAndSerialization {
            path: path.into(),
            serialization,
        }
    }
}

/// The JIT runtime's view of one relation: its file and how columns map onto the serialized rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JitIODescription {
    pub relation: String,
    columns: Vec<String>,
    file: JitFileAndSerialization,
    input: bool,
}

impl JitIODescription {
    fn new(relation: &str, columns: &[Column], file: JitFileAndSerialization, input: bool) -> Self {
        JitIODescription {
            relation: relation.to_string(),
            columns: columns.iter().map(|c| c.name.clone()).collect(),
            file,
            input,
        }
    }

    pub fn as_json(&self) -> Value {
        let kind = match self.file.serialization {
            JitSerialization::Json => {
                // Inputs are addressed with JSON pointers, outputs with plain keys.
                let mappings: serde_json::Map<String, Value> = self
                    .columns
                    .iter()
                    .enumerate()
                    .map(|(i, name)| {
                        let key = if self.input {
                            format!("/{}", name)
                        } else {
                            name.clone()
                        };
                        (i.to_string(), Value::String(key))
                    })
                    .collect();
                json!({ "Json": { "mappings": mappings } })
            }
            JitSerialization::Csv => {
                let columns: Vec<Value> = (0..self.columns.len())
                    .map(|i| json!([i, i, null]))
                    .collect();
                json!({ "Csv": columns })
            }
        };
        json!({ "file": self.file.path, "kind": kind })
    }
}

/// Configuration document for the JIT runtime.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct JitRuntimeConfig {
    pub workers: u32,
    pub optimize: bool,
    pub release: bool,
    pub inputs: BTreeMap<String, Value>,
    pub outputs: BTreeMap<String, Value>,
}

impl JitRuntimeConfig {
    pub fn new(inputs: &[JitIODescription], outputs: &[JitIODescription]) -> Self {
        JitRuntimeConfig {
            workers: 1,
            optimize: false,
            release: false,
            inputs: inputs
                .iter()
                .map(|d| (d.relation.clone(), d.as_json()))
                .collect(),
            outputs: outputs
                .iter()
                .map(|d| (d.relation.clone(), d.as_json()))
                .collect(),
        }
    }

    pub fn as_json(&self) -> Value {
        json!({
            "workers": self.workers,
            "optimize": self.optimize,
            "release": self.release,
            "inputs": self.inputs,
            "outputs": self.outputs,
        })
    }
}

#[cfg(test)]
fn test_columns() -> Vec<Column> {
    use crate::sql_type::SqlType;
    vec![
        Column::new("a", SqlType::Int, false),
        Column::new("b", SqlType::Text, true),
    ]
}

#[test]
fn test_relation_json() {
    let input = InputTableDescription::new("t", test_columns());
    assert_eq!(
        input.as_json(),
        json!({
            "name": "t",
            "fields": [
                { "name": "a", "case_sensitive": false, "columntype": { "type": "INTEGER", "nullable": false } },
                { "name": "b", "case_sensitive": false, "columntype": { "type": "VARCHAR", "nullable": true } },
            ]
        })
    );
}

#[test]
fn test_jit_descriptions() {
    struct Case {
        desc: &'static str,
        input: bool,
        serialization: JitSerialization,
        expected: Value,
    }
    let cases = vec![
        Case {
            desc: "json input uses pointers",
            input: true,
            serialization: JitSerialization::Json,
            expected: json!({ "file": "f", "kind": { "Json": { "mappings": { "0": "/a", "1": "/b" } } } }),
        },
        Case {
            desc: "json output uses keys",
            input: false,
            serialization: JitSerialization::Json,
            expected: json!({ "file": "f", "kind": { "Json": { "mappings": { "0": "a", "1": "b" } } } }),
        },
        Case {
            desc: "csv",
            input: true,
            serialization: JitSerialization::Csv,
            expected: json!({ "file": "f", "kind": { "Csv": [[0, 0, null], [1, 1, null]] } }),
        },
    ];
    for case in cases {
        println!("Running case: {}", case.desc);
        let file = JitFileAndSerialization::new("f", case.serialization);
        let description = if case.input {
            InputTableDescription::new("t", test_columns()).jit_description(&file)
        } else {
            OutputViewDescription::new("t", test_columns()).jit_description(&file)
        };
        assert_eq!(description.as_json(), case.expected);
    }
}

#[test]
fn test_runtime_config() {
    let file = JitFileAndSerialization::new("in.csv", JitSerialization::Csv);
    let input = InputTableDescription::new("t", test_columns()).jit_description(&file);
    let config = JitRuntimeConfig::new(&[input], &[]);
    let json = config.as_json();
    assert_eq!(json["workers"], json!(1));
    assert_eq!(json["optimize"], json!(false));
    assert_eq!(json["release"], json!(false));
    assert_eq!(json["inputs"]["t"]["file"], json!("in.csv"));
    assert_eq!(json["outputs"], json!({}));
    assert_eq!(JitSerialization::from_str("CSV"), Ok(JitSerialization::Csv));
    assert!(JitSerialization::from_str("xml").is_err());
}
