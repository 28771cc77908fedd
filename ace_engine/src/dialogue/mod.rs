//! Contract with the external dialogue engine.
//!
//! The dialogue scripting language, its compiler, and its runtime are
//! collaborators behind `DialogueEngine`: the game core hands it node names
//! to run, pumps `poll` once per tick, and answers its command/function
//! requests. `ScriptedEngine` is the bundled implementation driven by plain
//! JSON node scripts.

pub mod scripted;

use std::fmt;

use anyhow::Result;
use serde_json::Value;

pub use scripted::ScriptedEngine;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DialogueLine {
    pub speaker: Option<String>,
    pub text: String,
    /// Raw `key` or `key:value` tag strings attached to the line.
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DialogueChoice {
    pub id: i32,
    pub text: String,
}

/// One event pulled out of the engine per `poll`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DialogueSignal {
    Line(DialogueLine),
    Options(Vec<DialogueChoice>),
    Command { name: String, args: Vec<String> },
    FunctionCall { name: String, args: Vec<String> },
    Complete { node: String },
}

/// Value handed back to the engine in answer to a `FunctionCall`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FunctionValue {
    Bool(bool),
    Text(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub source: usize,
    pub node: Option<String>,
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.node {
            Some(node) => write!(
                f,
                "source {}, node '{}': {}",
                self.source, node, self.message
            ),
            None => write!(f, "source {}: {}", self.source, self.message),
        }
    }
}

/// Compiled story scripts, opaque to the caller.
#[derive(Debug, Clone)]
pub struct Program(pub(crate) Value);

pub trait DialogueEngine {
    /// Compiles script sources into a loadable program, or reports every
    /// problem found.
    fn compile(&mut self, sources: &[String]) -> Result<Program, Vec<Diagnostic>>;

    fn load(&mut self, program: Program) -> Result<()>;

    fn start_node(&mut self, node: &str);

    fn stop(&mut self);

    fn is_running(&self) -> bool;

    fn current_node(&self) -> Option<&str>;

    /// Pulls the next signal, or `None` while the engine is idle or waiting
    /// for a response (`advance_line`, `choose`, `resolve_function`).
    fn poll(&mut self) -> Option<DialogueSignal>;

    fn advance_line(&mut self);

    fn choose(&mut self, id: i32);

    fn resolve_function(&mut self, value: FunctionValue);
}
