//! The in-memory story model: rooms owning their objects and POIs, the
//! character and item tables, and the player inventory. Built once from a
//! parsed story document, mutated throughout a session, never torn down.

use std::collections::{BTreeMap, BTreeSet};

use ace_formats::{RectBounds, StoryDocument};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoryLookupError {
    #[error("unknown room '{0}'")]
    UnknownRoom(String),
    #[error("unknown character '{0}'")]
    UnknownCharacter(String),
    #[error("no object '{id}' in room '{room}'")]
    UnknownObject { room: String, id: String },
    #[error("unknown item '{0}'")]
    UnknownItem(String),
    #[error("no room is currently active")]
    NoCurrentRoom,
}

#[derive(Debug, Clone)]
pub struct SceneObject {
    pub id: String,
    pub image: String,
    pub on_interact: String,
    pub position: (f32, f32),
    pub scale: f32,
    pub visible: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Poi {
    pub id: String,
    pub on_interact: String,
    pub bounds: Vec<RectBounds>,
}

impl Poi {
    pub fn contains(&self, x: f32, y: f32) -> bool {
        self.bounds.iter().any(|rect| rect.contains(x, y))
    }
}

#[derive(Debug, Clone)]
pub struct Room {
    pub id: String,
    pub name: String,
    pub entrance_node: String,
    pub connected_rooms: Vec<String>,
    pub visible: bool,
    pub background: Option<String>,
    pub icon: Option<String>,
    pub objects: BTreeMap<String, SceneObject>,
    pub pois: BTreeMap<String, Poi>,
    pub occupant: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Character {
    pub id: String,
    pub name: String,
    pub on_interact: String,
    pub on_present: String,
    pub emotion: String,
    pub current_room: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Item {
    pub id: String,
    pub name: String,
    pub description: String,
    pub icon: Option<String>,
}

#[derive(Debug, Default)]
pub struct StoryModel {
    pub rooms: BTreeMap<String, Room>,
    pub characters: BTreeMap<String, Character>,
    pub items: BTreeMap<String, Item>,
    pub inventory: BTreeSet<String>,
    pub current_room: Option<String>,
    pub start_room: Option<String>,
}

impl StoryModel {
    /// Builds the model from a parsed document. Objects and POIs naming a
    /// room that was never loaded are dropped with a warning; a broken record
    /// never takes the rest of the story down with it.
    pub fn from_document(doc: &StoryDocument) -> (Self, Vec<String>) {
        let mut warnings = Vec::new();
        let mut model = StoryModel {
            start_room: doc.start_room.clone(),
            ..StoryModel::default()
        };

        for record in &doc.rooms {
            model.rooms.insert(
                record.id.clone(),
                Room {
                    id: record.id.clone(),
                    name: record.name.clone(),
                    entrance_node: record.entrance_node.clone(),
                    connected_rooms: record.connected_rooms.clone(),
                    visible: record.starts_visible,
                    background: record.background.clone(),
                    icon: record.icon.clone(),
                    objects: BTreeMap::new(),
                    pois: BTreeMap::new(),
                    occupant: None,
                },
            );
        }

        for record in &doc.objects {
            let Some(room) = model.rooms.get_mut(&record.room) else {
                warnings.push(format!(
                    "object '{}' names unknown room '{}', dropped",
                    record.id, record.room
                ));
                continue;
            };
            room.objects.insert(
                record.id.clone(),
                SceneObject {
                    id: record.id.clone(),
                    image: record.image.clone(),
                    on_interact: record.on_interact.clone(),
                    position: record.position,
                    scale: record.scale,
                    visible: true,
                },
            );
        }

        for record in &doc.pois {
            let Some(room) = model.rooms.get_mut(&record.room) else {
                warnings.push(format!(
                    "poi '{}' names unknown room '{}', dropped",
                    record.id, record.room
                ));
                continue;
            };
            room.pois.insert(
                record.id.clone(),
                Poi {
                    id: record.id.clone(),
                    on_interact: record.on_interact.clone(),
                    bounds: record.bounds.clone(),
                },
            );
        }

        for record in &doc.characters {
            model.characters.insert(
                record.id.clone(),
                Character {
                    id: record.id.clone(),
                    name: record.name.clone(),
                    on_interact: record.on_interact.clone(),
                    on_present: record.on_present.clone(),
                    emotion: "neutral".to_string(),
                    current_room: None,
                },
            );
        }

        for record in &doc.items {
            model.items.insert(
                record.id.clone(),
                Item {
                    id: record.id.clone(),
                    name: record.name.clone(),
                    description: record.description.clone(),
                    icon: record.icon.clone(),
                },
            );
        }

        (model, warnings)
    }

    pub fn room(&self, id: &str) -> Result<&Room, StoryLookupError> {
        self.rooms
            .get(id)
            .ok_or_else(|| StoryLookupError::UnknownRoom(id.to_string()))
    }

    pub fn room_mut(&mut self, id: &str) -> Result<&mut Room, StoryLookupError> {
        self.rooms
            .get_mut(id)
            .ok_or_else(|| StoryLookupError::UnknownRoom(id.to_string()))
    }

    pub fn character(&self, id: &str) -> Result<&Character, StoryLookupError> {
        self.characters
            .get(id)
            .ok_or_else(|| StoryLookupError::UnknownCharacter(id.to_string()))
    }

    pub fn item(&self, id: &str) -> Result<&Item, StoryLookupError> {
        self.items
            .get(id)
            .ok_or_else(|| StoryLookupError::UnknownItem(id.to_string()))
    }

    pub fn current_room(&self) -> Result<&Room, StoryLookupError> {
        let id = self
            .current_room
            .as_deref()
            .ok_or(StoryLookupError::NoCurrentRoom)?;
        self.room(id)
    }

    /// Sets (or clears, with `None`) the room's occupant. Keeps the
    /// occupant/back-reference pair in lockstep: the new occupant's
    /// `current_room` points at the room, and the displaced occupant's
    /// back-reference is cleared.
    pub fn set_current_character_in_room(
        &mut self,
        room_id: &str,
        character_id: Option<&str>,
    ) -> Result<(), StoryLookupError> {
        if let Some(id) = character_id {
            if !self.characters.contains_key(id) {
                return Err(StoryLookupError::UnknownCharacter(id.to_string()));
            }
        }
        let room = self
            .rooms
            .get_mut(room_id)
            .ok_or_else(|| StoryLookupError::UnknownRoom(room_id.to_string()))?;

        let previous = room.occupant.take();
        room.occupant = character_id.map(str::to_string);

        if let Some(previous) = previous {
            if Some(previous.as_str()) != character_id {
                if let Some(character) = self.characters.get_mut(&previous) {
                    character.current_room = None;
                }
            }
        }
        if let Some(id) = character_id {
            if let Some(character) = self.characters.get_mut(id) {
                character.current_room = Some(room_id.to_string());
            }
        }
        Ok(())
    }

    pub fn set_object_visible(
        &mut self,
        room_id: &str,
        object_id: &str,
        visible: bool,
    ) -> Result<(), StoryLookupError> {
        let room = self.room_mut(room_id)?;
        let object = room
            .objects
            .get_mut(object_id)
            .ok_or_else(|| StoryLookupError::UnknownObject {
                room: room_id.to_string(),
                id: object_id.to_string(),
            })?;
        object.visible = visible;
        Ok(())
    }

    pub fn set_room_visible(&mut self, room_id: &str, visible: bool) -> Result<(), StoryLookupError> {
        self.room_mut(room_id)?.visible = visible;
        Ok(())
    }

    pub fn add_inventory_item(&mut self, item_id: &str) -> Result<bool, StoryLookupError> {
        self.item(item_id)?;
        Ok(self.inventory.insert(item_id.to_string()))
    }

    pub fn remove_inventory_item(&mut self, item_id: &str) -> bool {
        self.inventory.remove(item_id)
    }

    pub fn inventory_has_item(&self, item_id: &str) -> bool {
        self.inventory.contains(item_id)
    }

    /// Rooms reachable from `room_id` that are currently unlocked, in the
    /// order the story author listed them.
    pub fn visible_connected_rooms(&self, room_id: &str) -> Result<Vec<&Room>, StoryLookupError> {
        let room = self.room(room_id)?;
        Ok(room
            .connected_rooms
            .iter()
            .filter_map(|id| self.rooms.get(id))
            .filter(|room| room.visible)
            .collect())
    }

    /// Topmost POI in the current room whose bounds contain the point.
    pub fn poi_at(&self, x: f32, y: f32) -> Result<Option<&Poi>, StoryLookupError> {
        let room = self.current_room()?;
        Ok(room.pois.values().find(|poi| poi.contains(x, y)))
    }
}
