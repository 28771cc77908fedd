//! Character asset resolution and caching.
//!
//! Story assets are small and bounded, so everything that has been touched
//! once stays cached for the process lifetime. Emotion lookups that fail are
//! retried on the next request (only successes are memoized); frame-image
//! decode results are memoized by path either way, so a corrupt file is not
//! re-read every frame.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use ace_formats::{EmotionSheet, FrameImage};

/// Resolved playback data for one (character, emotion) pair. Frame entries
/// are (image index, duration in 60 Hz ticks); `images` is indexed by the
/// image index and holds `None` for files that were missing or unreadable.
#[derive(Debug, Clone)]
pub struct CharacterEmotion {
    pub frames: Vec<(u32, u32)>,
    pub talking_frames: Vec<(u32, u32)>,
    pub looped: bool,
    pub loop_index: usize,
    pub images: Vec<Option<Rc<FrameImage>>>,
}

#[derive(Debug, Default)]
pub struct AssetCache {
    character_paths: BTreeMap<String, PathBuf>,
    emotions: BTreeMap<String, Rc<CharacterEmotion>>,
    sheets: BTreeMap<PathBuf, Rc<EmotionSheet>>,
    images: BTreeMap<PathBuf, Option<Rc<FrameImage>>>,
    warnings: Vec<String>,
}

impl AssetCache {
    pub fn new() -> Self {
        AssetCache::default()
    }

    /// Warnings accumulated by failed lookups since the last drain.
    pub fn drain_warnings(&mut self) -> Vec<String> {
        std::mem::take(&mut self.warnings)
    }

    /// Directory holding a character's sprite assets, memoized per id.
    pub fn sprite_path(&mut self, story_root: &Path, character_id: &str) -> PathBuf {
        if let Some(path) = self.character_paths.get(character_id) {
            return path.clone();
        }
        let path = story_root.join("characters").join(character_id);
        self.character_paths
            .insert(character_id.to_string(), path.clone());
        path
    }

    /// Resolves the playback data for a (character, emotion) pair, or `None`
    /// if the character folder, the emotion sheet, or the named emotion does
    /// not exist. Never fails the process.
    pub fn character_emotion(
        &mut self,
        story_root: &Path,
        character_id: &str,
        emotion: &str,
    ) -> Option<Rc<CharacterEmotion>> {
        // Tolerate a story-root path that names the document instead of its
        // directory.
        let story_root = if story_root.is_file() {
            story_root.parent().unwrap_or(story_root)
        } else {
            story_root
        };

        if character_id.is_empty() {
            return None;
        }
        let char_path = self.sprite_path(story_root, character_id);
        if !char_path.is_dir() {
            return None;
        }

        let key = format!("{character_id}-{emotion}");
        if let Some(cached) = self.emotions.get(&key) {
            return Some(cached.clone());
        }

        let loaded = Rc::new(self.load_emotion(&char_path, character_id, emotion)?);
        self.emotions.insert(key, loaded.clone());
        Some(loaded)
    }

    fn load_emotion(
        &mut self,
        char_path: &Path,
        character_id: &str,
        emotion: &str,
    ) -> Option<CharacterEmotion> {
        let sheet_path = char_path.join(format!("{character_id}.json"));
        let sheet = self.emotion_sheet(&sheet_path)?;
        let def = sheet.get(emotion)?.clone();

        let image_count = def.max_frame_index().map(|max| max as usize + 1).unwrap_or(0);
        let mut images = Vec::with_capacity(image_count);
        for index in 0..image_count {
            let frame_path = char_path.join(format!("{character_id}-{emotion}-{index}.png"));
            images.push(self.frame_image(&frame_path));
        }

        Some(CharacterEmotion {
            frames: def.frames,
            talking_frames: def.talking_frames,
            looped: def.looped,
            loop_index: def.loop_index,
            images,
        })
    }

    fn emotion_sheet(&mut self, path: &Path) -> Option<Rc<EmotionSheet>> {
        if let Some(sheet) = self.sheets.get(path) {
            return Some(sheet.clone());
        }
        if !path.is_file() {
            return None;
        }
        match EmotionSheet::load(path) {
            Ok(sheet) => {
                let sheet = Rc::new(sheet);
                self.sheets.insert(path.to_path_buf(), sheet.clone());
                Some(sheet)
            }
            Err(err) => {
                self.warnings
                    .push(format!("emotion sheet {}: {err}", path.display()));
                None
            }
        }
    }

    fn frame_image(&mut self, path: &Path) -> Option<Rc<FrameImage>> {
        if let Some(cached) = self.images.get(path) {
            return cached.clone();
        }
        let loaded = match FrameImage::load(path) {
            Ok(image) => Some(Rc::new(image)),
            Err(err) => {
                self.warnings
                    .push(format!("frame image {}: {err}", path.display()));
                None
            }
        };
        self.images.insert(path.to_path_buf(), loaded.clone());
        loaded
    }
}
