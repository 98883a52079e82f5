//! Options that control a compilation session.  They are fixed before the session is created.

use std::fs;
use std::path::Path;

use crate::errors::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct IoOptions {
    /// Target the JIT backend, which uses 32-bit weights.
    pub jit: bool,
    /// Splice the data of INSERT and DELETE statements into the circuit as constant deltas.
    pub emit_table_deltas: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct OptimizerOptions {
    /// Stop at the first error instead of recording it and continuing.
    pub throw_on_error: bool,
    /// 0: no passes; 1: dead-code elimination only; 2 and above: all passes.
    pub optimization_level: u32,
}

impl Default for OptimizerOptions {
    fn default() -> Self {
        OptimizerOptions {
            throw_on_error: false,
            optimization_level: 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct CompilerOptions {
    pub io_options: IoOptions,
    pub optimizer_options: OptimizerOptions,
}

impl CompilerOptions {
    pub fn load_from_json(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let s = fs::read_to_string(path)?;
        serde_json::from_str(&s).map_err(|e| {
            Error::Configuration(format!("Invalid options file {}: {}", path.display(), e))
        })
    }
}

#[test]
fn test_partial_options_use_defaults() {
    let options: CompilerOptions =
        serde_json::from_str(r#"{ "io_options": { "jit": true } }"#).unwrap();
    assert!(options.io_options.jit);
    assert!(!options.io_options.emit_table_deltas);
    assert_eq!(options.optimizer_options, OptimizerOptions::default());
    assert_eq!(options.optimizer_options.optimization_level, 2);
}

#[test]
fn test_load_from_json() {
    let path = std::env::temp_dir().join(format!("sqlcircuit-options-{}.json", std::process::id()));
    fs::write(
        &path,
        r#"{ "optimizer_options": { "throw_on_error": true, "optimization_level": 0 } }"#,
    )
    .unwrap();
    let options = CompilerOptions::load_from_json(&path).unwrap();
    fs::remove_file(&path).unwrap();
    assert!(options.optimizer_options.throw_on_error);
    assert_eq!(options.optimizer_options.optimization_level, 0);

    let missing = CompilerOptions::load_from_json("/nonexistent/sqlcircuit.json");
    assert!(matches!(missing, Err(Error::Io(_))));
}
