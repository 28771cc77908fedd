//! Story-description document parsing.
//!
//! A story document is a single JSON file listing every room, object, point
//! of interest, character, and item in the story, plus the room the session
//! starts in. Records missing a required field are skipped with a warning so
//! an authoring mistake never takes down the whole load.

use std::fs;
use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoryError {
    #[error("reading story document {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("story document is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("story document root must be an object")]
    NotAnObject,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoomRecord {
    pub id: String,
    pub name: String,
    pub entrance_node: String,
    pub connected_rooms: Vec<String>,
    pub starts_visible: bool,
    pub background: Option<String>,
    pub icon: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ObjectRecord {
    pub id: String,
    pub image: String,
    pub room: String,
    pub on_interact: String,
    pub position: (f32, f32),
    pub scale: f32,
}

/// Axis-aligned interaction rectangle, authored as `"(x, y, w, h)"`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct RectBounds {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl RectBounds {
    pub const ZERO: RectBounds = RectBounds {
        x: 0.0,
        y: 0.0,
        width: 0.0,
        height: 0.0,
    };

    pub fn contains(&self, x: f32, y: f32) -> bool {
        x >= self.x && x <= self.x + self.width && y >= self.y && y <= self.y + self.height
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PoiRecord {
    pub id: String,
    pub room: String,
    pub on_interact: String,
    pub bounds: Vec<RectBounds>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CharacterRecord {
    pub id: String,
    pub name: String,
    pub on_interact: String,
    pub on_present: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ItemRecord {
    pub id: String,
    pub name: String,
    pub description: String,
    pub icon: Option<String>,
}

/// Flat record lists as authored; grouping objects and POIs under their
/// owning rooms is the engine's job.
#[derive(Debug, Clone, Default)]
pub struct StoryDocument {
    pub rooms: Vec<RoomRecord>,
    pub objects: Vec<ObjectRecord>,
    pub pois: Vec<PoiRecord>,
    pub characters: Vec<CharacterRecord>,
    pub items: Vec<ItemRecord>,
    pub start_room: Option<String>,
    pub warnings: Vec<String>,
}

impl StoryDocument {
    pub fn load(path: &Path) -> Result<Self, StoryError> {
        let text = fs::read_to_string(path).map_err(|source| StoryError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::parse(&text)
    }

    pub fn parse(text: &str) -> Result<Self, StoryError> {
        let root: Value = serde_json::from_str(text)?;
        let root = root.as_object().ok_or(StoryError::NotAnObject)?;

        let mut doc = StoryDocument {
            start_room: root
                .get("startroom")
                .and_then(Value::as_str)
                .map(str::to_string),
            ..StoryDocument::default()
        };

        for entry in array_entries(root.get("rooms")) {
            doc.parse_room(entry);
        }
        for entry in array_entries(root.get("objects")) {
            doc.parse_object(entry);
        }
        for entry in array_entries(root.get("pois")) {
            doc.parse_poi(entry);
        }
        for entry in array_entries(root.get("characters")) {
            doc.parse_character(entry);
        }
        for entry in array_entries(root.get("items")) {
            doc.parse_item(entry);
        }

        Ok(doc)
    }

    fn parse_room(&mut self, entry: &Value) {
        let Some(id) = required_str(entry, "id") else {
            self.warnings.push("room record missing id, skipped".into());
            return;
        };
        // The entrance node key is required but its value may be empty,
        // meaning the room has no entrance dialogue.
        let entrance_node = entry
            .get("entrancenode")
            .and_then(Value::as_str)
            .map(str::to_string);
        let (Some(name), Some(entrance_node)) = (required_str(entry, "name"), entrance_node)
        else {
            self.warnings
                .push(format!("room '{id}' missing required field, skipped"));
            return;
        };
        let Some(connected) = entry.get("connectedrooms").and_then(Value::as_array) else {
            self.warnings
                .push(format!("room '{id}' missing connectedrooms, skipped"));
            return;
        };
        let connected_rooms = connected
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect();

        self.rooms.push(RoomRecord {
            id,
            name,
            entrance_node,
            connected_rooms,
            starts_visible: parse_bool(entry.get("startsvisible"), true),
            background: optional_str(entry, "background"),
            icon: optional_str(entry, "icon"),
        });
    }

    fn parse_object(&mut self, entry: &Value) {
        let Some(id) = required_str(entry, "id") else {
            self.warnings.push("object record missing id, skipped".into());
            return;
        };
        let (Some(image), Some(room), Some(on_interact)) = (
            required_str(entry, "image"),
            required_str(entry, "room"),
            required_str(entry, "oninteract"),
        ) else {
            self.warnings
                .push(format!("object '{id}' missing required field, skipped"));
            return;
        };

        let position = match entry.get("position").and_then(Value::as_str) {
            None => (0.0, 0.0),
            Some(raw) => match parse_position(raw) {
                Some(position) => position,
                None => {
                    self.warnings.push(format!(
                        "object '{id}' has malformed position '{raw}', using (0, 0)"
                    ));
                    (0.0, 0.0)
                }
            },
        };

        let scale = match entry.get("scale") {
            None => 1.0,
            Some(value) => match value.as_f64() {
                Some(scale) => scale as f32,
                None => {
                    self.warnings
                        .push(format!("object '{id}' has malformed scale, using 1"));
                    1.0
                }
            },
        };

        self.objects.push(ObjectRecord {
            id,
            image,
            room,
            on_interact,
            position,
            scale,
        });
    }

    fn parse_poi(&mut self, entry: &Value) {
        let Some(id) = required_str(entry, "id") else {
            self.warnings.push("poi record missing id, skipped".into());
            return;
        };
        let (Some(room), Some(on_interact)) =
            (required_str(entry, "room"), required_str(entry, "oninteract"))
        else {
            self.warnings
                .push(format!("poi '{id}' missing required field, skipped"));
            return;
        };

        // Bounds are one rectangle string or an array of them.
        let raw_bounds: Vec<&str> = match entry.get("bounds") {
            Some(Value::String(text)) => vec![text.as_str()],
            Some(Value::Array(entries)) => entries.iter().filter_map(Value::as_str).collect(),
            _ => Vec::new(),
        };
        if raw_bounds.is_empty() {
            self.warnings
                .push(format!("poi '{id}' missing bounds, skipped"));
            return;
        }

        let mut bounds = Vec::with_capacity(raw_bounds.len());
        for raw in raw_bounds {
            match parse_bounds(raw) {
                Some(rect) => bounds.push(rect),
                None => {
                    self.warnings.push(format!(
                        "poi '{id}' has malformed bounds '{raw}', using zero rect"
                    ));
                    bounds.push(RectBounds::ZERO);
                }
            }
        }

        self.pois.push(PoiRecord {
            id,
            room,
            on_interact,
            bounds,
        });
    }

    fn parse_character(&mut self, entry: &Value) {
        let Some(id) = required_str(entry, "id") else {
            self.warnings
                .push("character record missing id, skipped".into());
            return;
        };
        let (Some(name), Some(on_interact), Some(on_present)) = (
            required_str(entry, "name"),
            required_str(entry, "oninteract"),
            required_str(entry, "onpresent"),
        ) else {
            self.warnings
                .push(format!("character '{id}' missing required field, skipped"));
            return;
        };

        self.characters.push(CharacterRecord {
            id,
            name,
            on_interact,
            on_present,
        });
    }

    fn parse_item(&mut self, entry: &Value) {
        let Some(id) = required_str(entry, "id") else {
            self.warnings.push("item record missing id, skipped".into());
            return;
        };
        let (Some(name), Some(description)) =
            (required_str(entry, "name"), required_str(entry, "description"))
        else {
            self.warnings
                .push(format!("item '{id}' missing required field, skipped"));
            return;
        };
        let icon = optional_str(entry, "icon");
        if icon.is_none() {
            self.warnings.push(format!("item '{id}' has no icon"));
        }

        self.items.push(ItemRecord {
            id,
            name,
            description,
            icon,
        });
    }
}

fn array_entries(value: Option<&Value>) -> impl Iterator<Item = &Value> {
    value
        .and_then(Value::as_array)
        .map(|entries| entries.iter())
        .into_iter()
        .flatten()
}

fn required_str(entry: &Value, key: &str) -> Option<String> {
    let text = entry.get(key)?.as_str()?;
    if text.is_empty() {
        return None;
    }
    Some(text.to_string())
}

fn optional_str(entry: &Value, key: &str) -> Option<String> {
    entry
        .get(key)
        .and_then(Value::as_str)
        .filter(|text| !text.is_empty())
        .map(str::to_string)
}

/// Booleans are authored either as JSON bools or as the strings
/// `"true"`/`"false"`.
fn parse_bool(value: Option<&Value>, default: bool) -> bool {
    match value {
        None => default,
        Some(Value::Bool(flag)) => *flag,
        Some(Value::String(text)) => match text.trim().to_ascii_lowercase().as_str() {
            "true" => true,
            "false" => false,
            _ => default,
        },
        Some(_) => default,
    }
}

/// Pulls every signed numeric token out of a coordinate string like
/// `"(12, -4.5)"`, ignoring the surrounding punctuation.
fn numeric_tokens(raw: &str) -> Vec<f32> {
    static PATTERN: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"-?\d+(\.\d+)?").expect("numeric token pattern"));
    PATTERN
        .find_iter(raw)
        .filter_map(|token| token.as_str().parse().ok())
        .collect()
}

fn parse_position(raw: &str) -> Option<(f32, f32)> {
    match numeric_tokens(raw).as_slice() {
        &[x, y] => Some((x, y)),
        _ => None,
    }
}

fn parse_bounds(raw: &str) -> Option<RectBounds> {
    match numeric_tokens(raw).as_slice() {
        &[x, y, width, height] => Some(RectBounds {
            x,
            y,
            width,
            height,
        }),
        _ => None,
    }
}
