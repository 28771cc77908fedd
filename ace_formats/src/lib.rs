//! Data-format layer for AceV stories: the story-description document, the
//! per-character emotion sheets, and the PNG frame images those sheets
//! reference. Everything here is pure parsing; game state lives in
//! `ace_engine`.

pub mod emotion;
pub mod sprite;
pub mod story;

pub use emotion::{EmotionDef, EmotionError, EmotionSheet};
pub use sprite::{FrameImage, SpriteError};
pub use story::{
    CharacterRecord, ItemRecord, ObjectRecord, PoiRecord, RectBounds, RoomRecord, StoryDocument,
    StoryError,
};
