use std::fs;
use std::path::Path;
use std::process::Command;

use anyhow::{Context, Result};
use serde::Deserialize;
use tempfile::tempdir;

#[derive(Deserialize)]
struct EventLog {
    events: Vec<String>,
}

const STORY: &str = r#"{
    "startroom": "office",
    "rooms": [
        {"id": "office", "name": "The Office", "entrancenode": "OfficeIn",
         "connectedrooms": ["lobby"]},
        {"id": "lobby", "name": "Lobby", "entrancenode": "",
         "connectedrooms": ["office"], "startsvisible": false}
    ],
    "objects": [
        {"id": "lamp", "image": "lamp.png", "room": "office",
         "oninteract": "LampLook"}
    ],
    "pois": [
        {"id": "window", "room": "office", "oninteract": "WindowLook",
         "bounds": "(0, 0, 40, 40)"}
    ],
    "characters": [
        {"id": "amy", "name": "Amy", "oninteract": "TalkAmy",
         "onpresent": "PresentAmy"}
    ],
    "items": [
        {"id": "key", "name": "Key", "description": "A small brass key."}
    ]
}"#;

const SCRIPT: &str = r#"{
    "OfficeIn": [
        {"command": {"name": "EnterCharacterInRoom", "args": ["Amy", "office"]}},
        {"line": {"speaker": "Amy", "text": "You made it.", "tags": ["continue:0"]}},
        {"line": {"text": "Finally."}},
        {"command": {"name": "UnlockRoom", "args": ["lobby"]}},
        {"command": {"name": "AddInventoryItem", "args": ["key"]}},
        {"call": {"name": "InventoryHasItem", "args": ["key"],
                  "branches": {"false": "Missing"}}},
        {"line": {"speaker": "Amy", "text": "Take the key."}}
    ],
    "Missing": [
        {"line": {"text": "unreachable"}}
    ]
}"#;

const AMY_SHEET: &str = r#"{
    "neutral": {
        "loop": true,
        "loopIndex": 0,
        "frames": ["0:10", "1:10"],
        "talkingFrames": ["0:5", "1:5"]
    }
}"#;

// Signature plus a minimal IHDR chunk; enough for the decoder.
fn minimal_png(width: u32, height: u32) -> Vec<u8> {
    let mut bytes = vec![0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a];
    bytes.extend_from_slice(&13u32.to_be_bytes());
    bytes.extend_from_slice(b"IHDR");
    bytes.extend_from_slice(&width.to_be_bytes());
    bytes.extend_from_slice(&height.to_be_bytes());
    bytes.extend_from_slice(&[8, 6, 0, 0, 0]);
    bytes.extend_from_slice(&[0, 0, 0, 0]);
    bytes
}

fn write_fixture(root: &Path) -> Result<()> {
    fs::write(root.join("story.json"), STORY).context("writing story.json")?;
    fs::write(root.join("script.json"), SCRIPT).context("writing script.json")?;

    let amy_dir = root.join("characters").join("amy");
    fs::create_dir_all(&amy_dir).context("creating character directory")?;
    fs::write(amy_dir.join("amy.json"), AMY_SHEET).context("writing emotion sheet")?;
    for index in 0..2 {
        let name = format!("amy-neutral-{index}.png");
        fs::write(amy_dir.join(name), minimal_png(32, 48)).context("writing frame image")?;
    }
    Ok(())
}

#[test]
fn demo_session_reaches_room_options_with_the_key() -> Result<()> {
    let temp_dir = tempdir().context("creating story fixture directory")?;
    write_fixture(temp_dir.path())?;

    let event_log_path = temp_dir.path().join("events.json");
    let output = Command::new(env!("CARGO_BIN_EXE_ace_engine"))
        .args([
            "--story-root",
            temp_dir.path().to_str().context("fixture path utf-8")?,
            "--script",
            temp_dir
                .path()
                .join("script.json")
                .to_str()
                .context("script path utf-8")?,
            "--demo",
            "--ticks",
            "3600",
            "--event-log-json",
            event_log_path.to_str().context("log path utf-8")?,
        ])
        .output()
        .context("executing ace_engine demo session")?;

    assert!(
        output.status.success(),
        "ace_engine exited with {:?}: {}",
        output.status,
        String::from_utf8_lossy(&output.stderr)
    );
    assert!(
        event_log_path.is_file(),
        "ace_engine did not produce an event log"
    );

    let log: EventLog = serde_json::from_str(
        &fs::read_to_string(&event_log_path).context("reading event log")?,
    )
    .context("deserialising event log")?;

    for expected in [
        "room.load office",
        "char.enter amy office",
        "char.show amy",
        "dialog.line Amy",
        "room.unlock lobby",
        "inventory.add key",
        "dialog.complete OfficeIn",
        "poi.interact window",
        "item.present key",
        "travel.select lobby",
        "room.load lobby",
    ] {
        assert!(
            log.events.iter().any(|event| event == expected),
            "expected '{expected}' in event log: {:?}",
            log.events
        );
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(
        stdout.contains("state room_options"),
        "session should end back on room options: {stdout}"
    );
    Ok(())
}

#[test]
fn bad_script_fails_compilation_with_diagnostics() -> Result<()> {
    let temp_dir = tempdir().context("creating story fixture directory")?;
    write_fixture(temp_dir.path())?;
    let bad_script = temp_dir.path().join("bad.json");
    fs::write(&bad_script, "{ not json").context("writing bad script")?;

    let output = Command::new(env!("CARGO_BIN_EXE_ace_engine"))
        .args([
            "--story-root",
            temp_dir.path().to_str().context("fixture path utf-8")?,
            "--script",
            bad_script.to_str().context("script path utf-8")?,
        ])
        .output()
        .context("executing ace_engine with a bad script")?;

    assert!(!output.status.success(), "bad script should fail the run");
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("script error"),
        "diagnostics missing from stderr: {stderr}"
    );
    Ok(())
}
