//! JSON-driven dialogue engine.
//!
//! A script source is a JSON object mapping node names to step arrays:
//!
//! ```json
//! {
//!   "OfficeIn": [
//!     {"line": {"speaker": "Amy", "text": "Hi.", "tags": ["emotion:happy"]}},
//!     {"command": {"name": "AddInventoryItem", "args": ["key"]}},
//!     {"call": {"name": "InventoryHasItem", "args": ["key"],
//!               "branches": {"true": "HasKey"}}},
//!     {"options": [{"id": 1, "text": "Leave", "target": "Goodbye"}]},
//!     {"jump": "Goodbye"}
//!   ]
//! }
//! ```
//!
//! Multiple sources are merged at compile time; duplicate node names and
//! malformed steps are compile diagnostics.

use std::collections::BTreeMap;

use anyhow::{bail, Context, Result};
use serde_json::{Map, Value};

use super::{
    DialogueChoice, DialogueEngine, DialogueLine, DialogueSignal, Diagnostic, FunctionValue,
    Program,
};

#[derive(Debug, Clone)]
struct OptionStep {
    id: i32,
    text: String,
    target: String,
}

#[derive(Debug, Clone)]
enum Step {
    Line(DialogueLine),
    Options(Vec<OptionStep>),
    Command {
        name: String,
        args: Vec<String>,
    },
    Call {
        name: String,
        args: Vec<String>,
        branches: BTreeMap<String, String>,
    },
    Jump(String),
}

#[derive(Debug)]
enum Waiting {
    Advance,
    Choice(Vec<OptionStep>),
    Function(BTreeMap<String, String>),
}

/// Ceiling on consecutive silent jumps within one poll; a script jump
/// cycle would otherwise spin forever.
const MAX_SILENT_JUMPS: usize = 64;

#[derive(Debug)]
struct Cursor {
    node: String,
    index: usize,
}

#[derive(Debug, Default)]
pub struct ScriptedEngine {
    nodes: BTreeMap<String, Vec<Step>>,
    cursor: Option<Cursor>,
    waiting: Option<Waiting>,
}

impl ScriptedEngine {
    pub fn new() -> Self {
        ScriptedEngine::default()
    }

    fn jump(&mut self, node: &str) {
        self.cursor = Some(Cursor {
            node: node.to_string(),
            index: 0,
        });
    }
}

impl DialogueEngine for ScriptedEngine {
    fn compile(&mut self, sources: &[String]) -> Result<Program, Vec<Diagnostic>> {
        let mut diagnostics = Vec::new();
        let mut merged = Map::new();

        for (source_index, source) in sources.iter().enumerate() {
            let parsed: Value = match serde_json::from_str(source) {
                Ok(value) => value,
                Err(err) => {
                    diagnostics.push(Diagnostic {
                        source: source_index,
                        node: None,
                        message: format!("not valid JSON: {err}"),
                    });
                    continue;
                }
            };
            let Some(object) = parsed.as_object() else {
                diagnostics.push(Diagnostic {
                    source: source_index,
                    node: None,
                    message: "script root must be an object of nodes".to_string(),
                });
                continue;
            };
            for (node, steps) in object {
                if merged.contains_key(node) {
                    diagnostics.push(Diagnostic {
                        source: source_index,
                        node: Some(node.clone()),
                        message: "duplicate node name".to_string(),
                    });
                    continue;
                }
                if let Err(message) = parse_steps(steps) {
                    diagnostics.push(Diagnostic {
                        source: source_index,
                        node: Some(node.clone()),
                        message,
                    });
                    continue;
                }
                merged.insert(node.clone(), steps.clone());
            }
        }

        if diagnostics.is_empty() {
            Ok(Program(Value::Object(merged)))
        } else {
            Err(diagnostics)
        }
    }

    fn load(&mut self, program: Program) -> Result<()> {
        let Program(value) = program;
        let Some(object) = value.as_object() else {
            bail!("compiled program root is not an object");
        };
        let mut nodes = BTreeMap::new();
        for (node, steps) in object {
            let steps = parse_steps(steps)
                .map_err(|message| anyhow::anyhow!(message))
                .with_context(|| format!("loading node '{node}'"))?;
            nodes.insert(node.clone(), steps);
        }
        self.nodes = nodes;
        self.cursor = None;
        self.waiting = None;
        Ok(())
    }

    fn start_node(&mut self, node: &str) {
        self.waiting = None;
        self.jump(node);
    }

    fn stop(&mut self) {
        self.cursor = None;
        self.waiting = None;
    }

    fn is_running(&self) -> bool {
        self.cursor.is_some()
    }

    fn current_node(&self) -> Option<&str> {
        self.cursor.as_ref().map(|cursor| cursor.node.as_str())
    }

    fn poll(&mut self) -> Option<DialogueSignal> {
        if self.waiting.is_some() {
            return None;
        }
        let mut silent_jumps = 0;
        loop {
            let cursor = self.cursor.as_mut()?;
            let Some(steps) = self.nodes.get(&cursor.node) else {
                // Unknown node: complete immediately rather than wedge.
                let node = cursor.node.clone();
                self.cursor = None;
                return Some(DialogueSignal::Complete { node });
            };
            let Some(step) = steps.get(cursor.index) else {
                let node = cursor.node.clone();
                self.cursor = None;
                return Some(DialogueSignal::Complete { node });
            };
            let step = step.clone();
            cursor.index += 1;

            match step {
                Step::Line(line) => {
                    self.waiting = Some(Waiting::Advance);
                    return Some(DialogueSignal::Line(line));
                }
                Step::Options(options) => {
                    let choices = options
                        .iter()
                        .map(|option| DialogueChoice {
                            id: option.id,
                            text: option.text.clone(),
                        })
                        .collect();
                    self.waiting = Some(Waiting::Choice(options));
                    return Some(DialogueSignal::Options(choices));
                }
                Step::Command { name, args } => {
                    return Some(DialogueSignal::Command { name, args });
                }
                Step::Call {
                    name,
                    args,
                    branches,
                } => {
                    self.waiting = Some(Waiting::Function(branches));
                    return Some(DialogueSignal::FunctionCall { name, args });
                }
                Step::Jump(target) => {
                    silent_jumps += 1;
                    if silent_jumps > MAX_SILENT_JUMPS {
                        self.cursor = None;
                        return Some(DialogueSignal::Complete { node: target });
                    }
                    self.jump(&target);
                }
            }
        }
    }

    fn advance_line(&mut self) {
        if matches!(self.waiting, Some(Waiting::Advance)) {
            self.waiting = None;
        }
    }

    fn choose(&mut self, id: i32) {
        let Some(Waiting::Choice(options)) = self.waiting.take() else {
            return;
        };
        match options.iter().find(|option| option.id == id) {
            Some(option) => {
                let target = option.target.clone();
                self.jump(&target);
            }
            None => {
                // Bad id; stay waiting so the caller can retry.
                self.waiting = Some(Waiting::Choice(options));
            }
        }
    }

    fn resolve_function(&mut self, value: FunctionValue) {
        let Some(Waiting::Function(branches)) = self.waiting.take() else {
            return;
        };
        let key = match value {
            FunctionValue::Bool(flag) => flag.to_string(),
            FunctionValue::Text(text) => text,
        };
        if let Some(target) = branches.get(&key) {
            let target = target.clone();
            self.jump(&target);
        }
        // No branch for the value: fall through to the next step.
    }
}

fn parse_steps(value: &Value) -> Result<Vec<Step>, String> {
    let Some(entries) = value.as_array() else {
        return Err("node body must be an array of steps".to_string());
    };
    entries.iter().map(parse_step).collect()
}

fn parse_step(entry: &Value) -> Result<Step, String> {
    let Some(object) = entry.as_object() else {
        return Err("step must be an object".to_string());
    };

    if let Some(body) = object.get("line") {
        let text = body
            .get("text")
            .and_then(Value::as_str)
            .ok_or("line step needs a text field")?;
        return Ok(Step::Line(DialogueLine {
            speaker: body
                .get("speaker")
                .and_then(Value::as_str)
                .map(str::to_string),
            text: text.to_string(),
            tags: string_list(body.get("tags")),
        }));
    }

    if let Some(body) = object.get("options") {
        let Some(entries) = body.as_array() else {
            return Err("options step must hold an array".to_string());
        };
        let mut options = Vec::with_capacity(entries.len());
        for entry in entries {
            let id = entry
                .get("id")
                .and_then(Value::as_i64)
                .ok_or("option needs an integer id")? as i32;
            let text = entry
                .get("text")
                .and_then(Value::as_str)
                .ok_or("option needs a text field")?;
            let target = entry
                .get("target")
                .and_then(Value::as_str)
                .ok_or("option needs a target node")?;
            options.push(OptionStep {
                id,
                text: text.to_string(),
                target: target.to_string(),
            });
        }
        if options.is_empty() {
            return Err("options step needs at least one option".to_string());
        }
        return Ok(Step::Options(options));
    }

    if let Some(body) = object.get("command") {
        let name = body
            .get("name")
            .and_then(Value::as_str)
            .ok_or("command step needs a name")?;
        return Ok(Step::Command {
            name: name.to_string(),
            args: string_list(body.get("args")),
        });
    }

    if let Some(body) = object.get("call") {
        let name = body
            .get("name")
            .and_then(Value::as_str)
            .ok_or("call step needs a name")?;
        let mut branches = BTreeMap::new();
        if let Some(map) = body.get("branches").and_then(Value::as_object) {
            for (key, target) in map {
                let target = target
                    .as_str()
                    .ok_or("call branch target must be a node name")?;
                branches.insert(key.clone(), target.to_string());
            }
        }
        return Ok(Step::Call {
            name: name.to_string(),
            args: string_list(body.get("args")),
            branches,
        });
    }

    if let Some(target) = object.get("jump") {
        let target = target.as_str().ok_or("jump target must be a node name")?;
        return Ok(Step::Jump(target.to_string()));
    }

    Err("unknown step kind".to_string())
}

fn string_list(value: Option<&Value>) -> Vec<String> {
    value
        .and_then(Value::as_array)
        .map(|entries| {
            entries
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use crate::dialogue::{DialogueEngine, DialogueSignal, FunctionValue};

    use super::ScriptedEngine;

    fn engine_with(script: &str) -> ScriptedEngine {
        let mut engine = ScriptedEngine::new();
        let program = engine
            .compile(&[script.to_string()])
            .expect("script compiles");
        engine.load(program).expect("program loads");
        engine
    }

    const SCRIPT: &str = r#"{
        "Start": [
            {"line": {"speaker": "Amy", "text": "Hi.", "tags": ["noshow"]}},
            {"command": {"name": "AddInventoryItem", "args": ["key"]}},
            {"call": {"name": "InventoryHasItem", "args": ["key"],
                      "branches": {"true": "HasKey", "false": "NoKey"}}}
        ],
        "HasKey": [
            {"options": [
                {"id": 1, "text": "Leave", "target": "Goodbye"},
                {"id": 2, "text": "Stay", "target": "Start"}
            ]}
        ],
        "NoKey": [
            {"jump": "Goodbye"}
        ],
        "Goodbye": [
            {"line": {"text": "Bye."}}
        ]
    }"#;

    #[test]
    fn walks_lines_commands_and_branches() {
        let mut engine = engine_with(SCRIPT);
        engine.start_node("Start");
        assert!(engine.is_running());

        let signal = engine.poll().expect("line signal");
        match signal {
            DialogueSignal::Line(line) => {
                assert_eq!(line.speaker.as_deref(), Some("Amy"));
                assert_eq!(line.tags, vec!["noshow".to_string()]);
            }
            other => panic!("unexpected signal: {other:?}"),
        }
        assert!(engine.poll().is_none(), "waiting for advance");
        engine.advance_line();

        assert_eq!(
            engine.poll(),
            Some(DialogueSignal::Command {
                name: "AddInventoryItem".to_string(),
                args: vec!["key".to_string()],
            })
        );

        let signal = engine.poll().expect("function call");
        assert!(matches!(signal, DialogueSignal::FunctionCall { ref name, .. } if name == "InventoryHasItem"));
        assert!(engine.poll().is_none(), "waiting for function value");
        engine.resolve_function(FunctionValue::Bool(true));
        assert_eq!(engine.current_node(), Some("HasKey"));

        let signal = engine.poll().expect("options");
        match signal {
            DialogueSignal::Options(choices) => assert_eq!(choices.len(), 2),
            other => panic!("unexpected signal: {other:?}"),
        }
        engine.choose(1);
        assert_eq!(engine.current_node(), Some("Goodbye"));

        assert!(matches!(engine.poll(), Some(DialogueSignal::Line(_))));
        engine.advance_line();
        assert_eq!(
            engine.poll(),
            Some(DialogueSignal::Complete {
                node: "Goodbye".to_string()
            })
        );
        assert!(!engine.is_running());
    }

    #[test]
    fn jump_steps_are_silent() {
        let mut engine = engine_with(SCRIPT);
        engine.start_node("NoKey");
        assert!(matches!(engine.poll(), Some(DialogueSignal::Line(_))));
        assert_eq!(engine.current_node(), Some("Goodbye"));
    }

    #[test]
    fn jump_cycles_finish_instead_of_spinning() {
        let mut engine = engine_with(r#"{"Loop": [{"jump": "Loop"}]}"#);
        engine.start_node("Loop");
        assert!(matches!(
            engine.poll(),
            Some(DialogueSignal::Complete { .. })
        ));
        assert!(!engine.is_running());
    }

    #[test]
    fn unknown_node_completes_instead_of_wedging() {
        let mut engine = engine_with(SCRIPT);
        engine.start_node("Missing");
        assert_eq!(
            engine.poll(),
            Some(DialogueSignal::Complete {
                node: "Missing".to_string()
            })
        );
    }

    #[test]
    fn stop_discards_the_cursor() {
        let mut engine = engine_with(SCRIPT);
        engine.start_node("Start");
        engine.poll();
        engine.stop();
        assert!(!engine.is_running());
        assert!(engine.poll().is_none());
    }

    #[test]
    fn bad_choice_id_keeps_waiting() {
        let mut engine = engine_with(SCRIPT);
        engine.start_node("HasKey");
        engine.poll();
        engine.choose(99);
        assert!(engine.poll().is_none(), "still waiting on a valid choice");
        engine.choose(2);
        assert_eq!(engine.current_node(), Some("Start"));
    }

    #[test]
    fn compile_reports_duplicates_and_bad_steps() {
        let mut engine = ScriptedEngine::new();
        let diagnostics = engine
            .compile(&[
                r#"{"A": [{"line": {"text": "one"}}]}"#.to_string(),
                r#"{"A": [{"line": {"text": "two"}}], "B": [{"mystery": 1}]}"#.to_string(),
            ])
            .unwrap_err();
        assert_eq!(diagnostics.len(), 2);
        assert_eq!(diagnostics[0].node.as_deref(), Some("A"));
        assert_eq!(diagnostics[1].node.as_deref(), Some("B"));
        assert_eq!(diagnostics[1].source, 1);
    }

    #[test]
    fn unmatched_function_value_falls_through() {
        let mut engine = engine_with(
            r#"{
                "Start": [
                    {"call": {"name": "GetItemToPresent",
                              "branches": {"key": "Goodbye"}}},
                    {"line": {"text": "fallthrough"}}
                ],
                "Goodbye": [
                    {"line": {"text": "matched"}}
                ]
            }"#,
        );
        engine.start_node("Start");
        engine.poll();
        engine.resolve_function(FunctionValue::Text("rock".to_string()));
        match engine.poll() {
            Some(DialogueSignal::Line(line)) => assert_eq!(line.text, "fallthrough"),
            other => panic!("unexpected signal: {other:?}"),
        }
    }
}
