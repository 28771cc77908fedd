use std::{fs, path::PathBuf};

use anyhow::{bail, Context, Result};
use serde::Serialize;

use ace_formats::StoryDocument;

use crate::assets::AssetCache;
use crate::cli::Args;
use crate::context::{GameContext, GameHost};
use crate::dialogue::{DialogueEngine, ScriptedEngine};
use crate::story::StoryModel;

#[derive(Serialize)]
struct EventLog<'a> {
    events: &'a [String],
}

pub fn execute(args: Args) -> Result<()> {
    let Args {
        story_root,
        scripts,
        demo,
        ticks,
        tick_seconds,
        verbose,
        event_log_json,
    } = args;

    if tick_seconds <= 0.0 {
        bail!("--tick-seconds must be positive");
    }

    let (root, story_file) = resolve_story_file(story_root);
    let story_text = fs::read_to_string(&story_file)
        .with_context(|| format!("reading story data from {}", story_file.display()))?;
    let document = StoryDocument::parse(&story_text)
        .with_context(|| format!("parsing story data from {}", story_file.display()))?;
    for warning in &document.warnings {
        eprintln!("[ace_engine] warning: {warning}");
    }

    let (model, warnings) = StoryModel::from_document(&document);
    for warning in warnings {
        eprintln!("[ace_engine] warning: {warning}");
    }

    let mut sources = Vec::with_capacity(scripts.len());
    for path in &scripts {
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading script from {}", path.display()))?;
        sources.push(text);
    }

    let mut engine = ScriptedEngine::new();
    let program = match engine.compile(&sources) {
        Ok(program) => program,
        Err(diagnostics) => {
            for diagnostic in &diagnostics {
                eprintln!("[ace_engine] script error: {diagnostic}");
            }
            bail!("script compilation failed with {} error(s)", diagnostics.len());
        }
    };
    engine.load(program)?;

    let context = GameContext::new(model, AssetCache::new(), root, verbose);
    let mut host = GameHost::new(context, Box::new(engine)).demo(demo);
    host.begin_story();
    for _ in 0..ticks {
        host.tick(tick_seconds);
    }

    for event in host.context.events() {
        println!("{event}");
    }
    let room = host
        .context
        .model
        .current_room()
        .map(|room| room.name.clone())
        .unwrap_or_else(|_| "(none)".to_string());
    println!(
        "session: {} tick(s), room {:?}, state {}",
        ticks,
        room,
        host.context.stack.peek().label()
    );

    if let Some(path) = event_log_json {
        let log = EventLog {
            events: host.context.events(),
        };
        let json = serde_json::to_string_pretty(&log).context("serialising event log")?;
        fs::write(&path, json)
            .with_context(|| format!("writing event log to {}", path.display()))?;
        eprintln!("[ace_engine] info: wrote event log to {}", path.display());
    }

    Ok(())
}

/// Accepts either the story directory or the story file itself.
fn resolve_story_file(story_root: PathBuf) -> (PathBuf, PathBuf) {
    if story_root.is_file() {
        let root = story_root
            .parent()
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."));
        (root, story_root)
    } else {
        let file = story_root.join("story.json");
        (story_root, file)
    }
}
