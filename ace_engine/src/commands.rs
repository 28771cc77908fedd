//! Script-invocable commands and value functions.
//!
//! Commands arrive from dialogue step metadata by name with string
//! arguments. Most complete immediately; the awaitable ones return a
//! `WaitCondition` that the host polls before pumping the engine again.
//! Lookup failures are logged and the command is dropped, never fatal.

use crate::context::{GameContext, COVER_FADE_SECONDS};
use crate::dialogue::FunctionValue;
use crate::ui::CoverColor;

/// What a blocked command is waiting on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WaitCondition {
    ScreenCoverIdle,
    CharacterFadeIdle(String),
    OneShotFinished(String),
    RoomIntroDone,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CommandStatus {
    Done,
    Value(FunctionValue),
    Blocked(WaitCondition),
}

pub fn dispatch(ctx: &mut GameContext, name: &str, args: &[String]) -> CommandStatus {
    match name {
        "LoadRoom" => {
            let Some(room) = required_arg(ctx, name, args, 0) else {
                return CommandStatus::Done;
            };
            ctx.request_load_room(&room);
            CommandStatus::Done
        }
        "UnlockRoom" | "LockRoom" => {
            let Some(room) = required_arg(ctx, name, args, 0) else {
                return CommandStatus::Done;
            };
            let visible = name == "UnlockRoom";
            match ctx.model.set_room_visible(&room, visible) {
                Ok(()) => {
                    let verb = if visible { "unlock" } else { "lock" };
                    ctx.log_event(format!("room.{verb} {room}"));
                }
                Err(err) => ctx.warn(format!("{name} failed: {err}")),
            }
            CommandStatus::Done
        }
        "EnterCharacterInRoom" => {
            let (Some(character), Some(room)) = (
                required_arg(ctx, name, args, 0),
                required_arg(ctx, name, args, 1),
            ) else {
                return CommandStatus::Done;
            };
            // Character ids are matched lowercase regardless of how the
            // script spells them.
            enter_character(ctx, &character.to_lowercase(), &room);
            CommandStatus::Done
        }
        "EnterCharacter" => {
            let Some(character) = required_arg(ctx, name, args, 0) else {
                return CommandStatus::Done;
            };
            let Some(room) = current_room_id(ctx, name) else {
                return CommandStatus::Done;
            };
            enter_character(ctx, &character.to_lowercase(), &room);
            CommandStatus::Done
        }
        "ExitCharacterFromRoom" => {
            // Takes (character, room); the character name is redundant.
            let Some(room) = args.get(1).or_else(|| args.first()).cloned() else {
                ctx.warn(format!("{name}: missing room argument"));
                return CommandStatus::Done;
            };
            exit_character(ctx, &room);
            CommandStatus::Done
        }
        "ExitCharacter" => {
            let Some(room) = current_room_id(ctx, name) else {
                return CommandStatus::Done;
            };
            exit_character(ctx, &room);
            CommandStatus::Done
        }
        "PlayAnimationBlocking" => {
            let (character, animation) = match (args.first(), args.get(1)) {
                (Some(character), Some(animation)) => {
                    (Some(character.clone()), animation.clone())
                }
                (Some(animation), None) => (None, animation.clone()),
                _ => {
                    ctx.warn(format!("{name}: missing animation name"));
                    return CommandStatus::Done;
                }
            };
            if let Some(character) = character {
                ctx.show_character_by_name(Some(&character));
            }
            // The animation itself still targets the room's occupant.
            let Some(occupant) = ctx.occupant_id() else {
                ctx.warn(format!("{name}: no character in the current room"));
                return CommandStatus::Done;
            };
            if ctx.play_one_shot(&occupant, &animation) {
                CommandStatus::Blocked(WaitCondition::OneShotFinished(occupant))
            } else {
                CommandStatus::Done
            }
        }
        "FadeInCharacter" | "FadeOutCharacter" => {
            let Some(character) = required_arg(ctx, name, args, 0) else {
                return CommandStatus::Done;
            };
            let character = character.to_lowercase();
            let seconds = parse_seconds(ctx, name, args.get(1));
            let animator = ctx.ensure_animator(&character);
            if name == "FadeInCharacter" {
                animator.fade_in(seconds);
                animator.start_animating();
            } else {
                animator.fade_out(seconds);
            }
            ctx.log_event(format!("char.fade {character}"));
            CommandStatus::Blocked(WaitCondition::CharacterFadeIdle(character))
        }
        "ShowObject" | "HideObject" => {
            let Some(object) = required_arg(ctx, name, args, 0) else {
                return CommandStatus::Done;
            };
            ctx.set_object_visible(&object, name == "ShowObject");
            CommandStatus::Done
        }
        "AddInventoryItem" => {
            let Some(item) = required_arg(ctx, name, args, 0) else {
                return CommandStatus::Done;
            };
            match ctx.model.add_inventory_item(&item) {
                Ok(true) => ctx.log_event(format!("inventory.add {item}")),
                Ok(false) => {}
                Err(err) => ctx.warn(format!("{name} failed: {err}")),
            }
            CommandStatus::Done
        }
        "RemoveInventoryItem" => {
            let Some(item) = required_arg(ctx, name, args, 0) else {
                return CommandStatus::Done;
            };
            if ctx.model.remove_inventory_item(&item) {
                ctx.log_event(format!("inventory.remove {item}"));
            }
            CommandStatus::Done
        }
        "InventoryHasItem" => {
            let Some(item) = required_arg(ctx, name, args, 0) else {
                return CommandStatus::Value(FunctionValue::Bool(false));
            };
            CommandStatus::Value(FunctionValue::Bool(ctx.model.inventory_has_item(&item)))
        }
        "GetItemToPresent" => CommandStatus::Value(FunctionValue::Text(
            ctx.item_to_present().unwrap_or("").to_string(),
        )),
        "ShowBlack" | "ShowWhite" => {
            let color = cover_color(name);
            ctx.ui.cover.show(color);
            ctx.log_event(format!("cover.show {}", color.label()));
            CommandStatus::Done
        }
        "FadeToBlack" | "FadeToWhite" => {
            let color = cover_color(name);
            let seconds = parse_seconds(ctx, name, args.first());
            ctx.ui.cover.fade_to(color, seconds);
            ctx.log_event(format!("cover.fade_to {}", color.label()));
            CommandStatus::Blocked(WaitCondition::ScreenCoverIdle)
        }
        "FadeFromBlack" | "FadeFromWhite" => {
            let color = cover_color(name);
            let seconds = parse_seconds(ctx, name, args.first());
            ctx.ui.cover.fade_from(color, seconds);
            ctx.log_event(format!("cover.fade_from {}", color.label()));
            CommandStatus::Blocked(WaitCondition::ScreenCoverIdle)
        }
        "RoomIntro" => {
            let title = args.first().cloned().unwrap_or_default();
            let subtitle = args.get(1).cloned().unwrap_or_default();
            ctx.ui.show_intro(&title, &subtitle);
            ctx.log_event(format!("room.intro {title}"));
            CommandStatus::Blocked(WaitCondition::RoomIntroDone)
        }
        _ => {
            ctx.warn(format!("unknown script command '{name}'"));
            CommandStatus::Done
        }
    }
}

fn enter_character(ctx: &mut GameContext, character_id: &str, room_id: &str) {
    match ctx
        .model
        .set_current_character_in_room(room_id, Some(character_id))
    {
        Ok(()) => {
            ctx.log_event(format!("char.enter {character_id} {room_id}"));
            // Off-screen rooms change silently.
            if ctx.model.current_room.as_deref() == Some(room_id) {
                ctx.resync_characters();
            }
        }
        Err(err) => ctx.warn(format!("cannot place character: {err}")),
    }
}

fn exit_character(ctx: &mut GameContext, room_id: &str) {
    match ctx.model.set_current_character_in_room(room_id, None) {
        Ok(()) => {
            ctx.log_event(format!("char.exit {room_id}"));
            if ctx.model.current_room.as_deref() == Some(room_id) {
                ctx.resync_characters();
            }
        }
        Err(err) => ctx.warn(format!("cannot clear character: {err}")),
    }
}

fn current_room_id(ctx: &mut GameContext, name: &str) -> Option<String> {
    match ctx.model.current_room() {
        Ok(room) => Some(room.id.clone()),
        Err(err) => {
            ctx.warn(format!("{name} failed: {err}"));
            None
        }
    }
}

fn cover_color(name: &str) -> CoverColor {
    if name.ends_with("White") {
        CoverColor::White
    } else {
        CoverColor::Black
    }
}

fn required_arg(ctx: &mut GameContext, name: &str, args: &[String], index: usize) -> Option<String> {
    let value = args.get(index).cloned();
    if value.is_none() {
        ctx.warn(format!("{name}: missing argument {index}"));
    }
    value
}

fn parse_seconds(ctx: &mut GameContext, name: &str, arg: Option<&String>) -> f32 {
    match arg {
        None => COVER_FADE_SECONDS,
        Some(raw) => match raw.parse::<f32>() {
            Ok(seconds) if seconds >= 0.0 => seconds,
            _ => {
                ctx.warn(format!("{name}: bad duration '{raw}', using default"));
                COVER_FADE_SECONDS
            }
        },
    }
}
