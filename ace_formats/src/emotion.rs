use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EmotionError {
    #[error("reading emotion sheet {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("emotion sheet is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("emotion sheet root must be an object")]
    NotAnObject,
    #[error("emotion '{emotion}' has a malformed frame entry '{entry}'")]
    BadFrameEntry { emotion: String, entry: String },
}

/// One named animation for a character: an idle frame sequence plus a talking
/// sequence that always loops. Frame entries pair an image index with a hold
/// duration in 60 Hz ticks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmotionDef {
    pub frames: Vec<(u32, u32)>,
    pub talking_frames: Vec<(u32, u32)>,
    pub looped: bool,
    pub loop_index: usize,
}

impl EmotionDef {
    /// Highest image index referenced by either sequence, if any frames exist.
    pub fn max_frame_index(&self) -> Option<u32> {
        self.frames
            .iter()
            .chain(self.talking_frames.iter())
            .map(|&(index, _)| index)
            .max()
    }
}

/// A character's emotion sheet: `<character>.json` in the character's asset
/// folder, mapping emotion names to frame definitions.
#[derive(Debug, Clone, Default)]
pub struct EmotionSheet {
    emotions: BTreeMap<String, EmotionDef>,
}

impl EmotionSheet {
    pub fn load(path: &Path) -> Result<Self, EmotionError> {
        let text = fs::read_to_string(path).map_err(|source| EmotionError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::parse(&text)
    }

    pub fn parse(text: &str) -> Result<Self, EmotionError> {
        let root: Value = serde_json::from_str(text)?;
        let object = root.as_object().ok_or(EmotionError::NotAnObject)?;

        let mut emotions = BTreeMap::new();
        for (name, body) in object {
            let looped = body
                .get("loop")
                .and_then(Value::as_bool)
                .unwrap_or(false);
            let loop_index = body
                .get("loopIndex")
                .and_then(Value::as_u64)
                .unwrap_or(0) as usize;
            let frames = parse_frame_list(name, body.get("frames"))?;
            let talking_frames = parse_frame_list(name, body.get("talkingFrames"))?;
            emotions.insert(
                name.clone(),
                EmotionDef {
                    frames,
                    talking_frames,
                    looped,
                    loop_index,
                },
            );
        }

        Ok(EmotionSheet { emotions })
    }

    pub fn get(&self, emotion: &str) -> Option<&EmotionDef> {
        self.emotions.get(emotion)
    }

    pub fn emotion_names(&self) -> impl Iterator<Item = &str> {
        self.emotions.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.emotions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.emotions.is_empty()
    }
}

fn parse_frame_list(emotion: &str, value: Option<&Value>) -> Result<Vec<(u32, u32)>, EmotionError> {
    let Some(entries) = value.and_then(Value::as_array) else {
        return Ok(Vec::new());
    };

    let mut frames = Vec::with_capacity(entries.len());
    for entry in entries {
        let text = entry.as_str().unwrap_or_default();
        frames.push(parse_frame_entry(emotion, text)?);
    }
    Ok(frames)
}

/// Frame entries look like `"<frameIndex>:<durationTicks>"`.
fn parse_frame_entry(emotion: &str, entry: &str) -> Result<(u32, u32), EmotionError> {
    let bad_entry = || EmotionError::BadFrameEntry {
        emotion: emotion.to_string(),
        entry: entry.to_string(),
    };
    let (index, duration) = entry.split_once(':').ok_or_else(bad_entry)?;
    let index: u32 = index.trim().parse().map_err(|_| bad_entry())?;
    let duration: u32 = duration.trim().parse().map_err(|_| bad_entry())?;
    Ok((index, duration))
}

#[cfg(test)]
mod tests {
    use super::{EmotionError, EmotionSheet};

    const SHEET: &str = r#"{
        "neutral": {
            "loop": true,
            "loopIndex": 1,
            "frames": ["0:10", "1:8", "2:12"],
            "talkingFrames": ["0:4", "1:4"]
        },
        "shocked": {
            "frames": ["3:30"]
        }
    }"#;

    #[test]
    fn parses_frame_sequences_and_loop_data() {
        let sheet = EmotionSheet::parse(SHEET).expect("valid sheet");
        let neutral = sheet.get("neutral").expect("neutral defined");
        assert_eq!(neutral.frames, vec![(0, 10), (1, 8), (2, 12)]);
        assert_eq!(neutral.talking_frames, vec![(0, 4), (1, 4)]);
        assert!(neutral.looped);
        assert_eq!(neutral.loop_index, 1);
        assert_eq!(neutral.max_frame_index(), Some(2));
    }

    #[test]
    fn missing_sequences_default_to_empty() {
        let sheet = EmotionSheet::parse(SHEET).expect("valid sheet");
        let shocked = sheet.get("shocked").expect("shocked defined");
        assert!(!shocked.looped);
        assert_eq!(shocked.loop_index, 0);
        assert!(shocked.talking_frames.is_empty());
        assert_eq!(shocked.max_frame_index(), Some(3));
    }

    #[test]
    fn undefined_emotion_is_absent() {
        let sheet = EmotionSheet::parse(SHEET).expect("valid sheet");
        assert!(sheet.get("angry").is_none());
    }

    #[test]
    fn malformed_frame_entry_fails_the_sheet() {
        let err = EmotionSheet::parse(r#"{"broken": {"frames": ["zero:ten"]}}"#).unwrap_err();
        match err {
            EmotionError::BadFrameEntry { emotion, entry } => {
                assert_eq!(emotion, "broken");
                assert_eq!(entry, "zero:ten");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
