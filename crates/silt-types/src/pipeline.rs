use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// The user-supplied computation of a pipeline stage.
///
/// `env` is a `BTreeMap` so canonical encodings never leak map iteration
/// order into the datum fingerprint.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transform {
    /// Command vector; `cmd[0]` is the binary.
    pub cmd: Vec<String>,
    /// Lines fed to the user process on stdin, newline-joined.
    pub stdin: Vec<String>,
    /// Environment applied to the user process.
    pub env: BTreeMap<String, String>,
    /// Non-zero exit codes the user has declared acceptable.
    pub accept_return_codes: Vec<i32>,
}

impl Transform {
    pub fn new(cmd: Vec<String>) -> Self {
        Self {
            cmd,
            ..Self::default()
        }
    }
}

/// One declared pipeline input.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Input {
    /// Input name; becomes a subdirectory of the input root.
    pub name: String,
    /// Materialize file contents on first read instead of eagerly.
    #[serde(default)]
    pub lazy: bool,
}

impl Input {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            lazy: false,
        }
    }

    pub fn lazy(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            lazy: true,
        }
    }
}

/// Declared inputs plus the transform: everything that, together with a
/// datum, determines the datum fingerprint.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineInfo {
    pub name: String,
    pub inputs: Vec<Input>,
    pub transform: Transform,
}

impl PipelineInfo {
    pub fn new(name: impl Into<String>, inputs: Vec<Input>, transform: Transform) -> Self {
        Self {
            name: name.into(),
            inputs,
            transform,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transform_default_is_empty() {
        let t = Transform::default();
        assert!(t.cmd.is_empty());
        assert!(t.stdin.is_empty());
        assert!(t.env.is_empty());
        assert!(t.accept_return_codes.is_empty());
    }

    #[test]
    fn input_lazy_flag() {
        assert!(!Input::new("a").lazy);
        assert!(Input::lazy("b").lazy);
    }

    #[test]
    fn serde_roundtrip() {
        let p = PipelineInfo::new(
            "wordcount",
            vec![Input::new("docs")],
            Transform::new(vec!["wc".into(), "-w".into()]),
        );
        let json = serde_json::to_string(&p).unwrap();
        let back: PipelineInfo = serde_json::from_str(&json).unwrap();
        assert_eq!(p, back);
    }
}
