//! The game context: every subsystem the story mutates, owned in one place.
//!
//! `GameContext` holds the story model, the action state stack, the UI
//! runtime, the per-character animators, and the room-transition sequencer,
//! and advances them all from a single `tick`. `GameHost` couples a context
//! with a dialogue engine and pumps signals between the two; nothing here is
//! a global.

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::rc::Rc;

use crate::animation::CharacterAnimator;
use crate::assets::{AssetCache, CharacterEmotion};
use crate::commands::{self, CommandStatus, WaitCondition};
use crate::dialogue::{DialogueChoice, DialogueEngine, DialogueLine, DialogueSignal, FunctionValue};
use crate::scheduler::Countdown;
use crate::stack::{ActionStack, ActionState, StateTransition};
use crate::story::StoryModel;
use crate::transition::{RoomTransition, TransitionPhase};
use crate::ui::{CoverColor, UiRuntime};

/// Screen-cover fade used by room transitions.
pub const COVER_FADE_SECONDS: f32 = 0.5;

/// Delay before a `continue` line auto-advances, unless the tag supplies one.
pub const DEFAULT_CONTINUE_SECONDS: f32 = 0.25;

/// Reserved node run once at boot to declare script variables; its
/// completion is ignored by the bridge.
pub const DECLVARS_NODE: &str = "declvars";

/// Requests queued for the dialogue engine, applied by the host between
/// ticks so context methods never need the engine in hand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineOp {
    StartNode(String),
    Stop,
    StopThenStart(String),
    AdvanceLine,
    Choose(i32),
}

#[derive(Debug)]
enum LinePhase {
    Idle,
    Revealing,
    AwaitingAdvance,
    ContinueDelay(Countdown),
}

pub struct GameContext {
    pub model: StoryModel,
    pub assets: AssetCache,
    pub stack: ActionStack,
    pub ui: UiRuntime,
    pub transition: RoomTransition,
    story_root: PathBuf,
    animators: BTreeMap<String, CharacterAnimator>,
    shown_character: Option<String>,
    line_phase: LinePhase,
    continue_armed: bool,
    continue_delay: f32,
    ignore_character_changes: bool,
    read_options: BTreeSet<i32>,
    current_choices: Vec<DialogueChoice>,
    item_to_present: Option<String>,
    queued_node: Option<String>,
    room_loaded_latch: bool,
    dialogue_ended_latch: bool,
    engine_ops: Vec<EngineOp>,
    events: Vec<String>,
    verbose: bool,
}

impl GameContext {
    pub fn new(model: StoryModel, assets: AssetCache, story_root: PathBuf, verbose: bool) -> Self {
        GameContext {
            model,
            assets,
            stack: ActionStack::new(),
            ui: UiRuntime::new(),
            transition: RoomTransition::new(),
            story_root,
            animators: BTreeMap::new(),
            shown_character: None,
            line_phase: LinePhase::Idle,
            continue_armed: false,
            continue_delay: DEFAULT_CONTINUE_SECONDS,
            ignore_character_changes: false,
            read_options: BTreeSet::new(),
            current_choices: Vec::new(),
            item_to_present: None,
            queued_node: None,
            room_loaded_latch: false,
            dialogue_ended_latch: false,
            engine_ops: Vec::new(),
            events: Vec::new(),
            verbose,
        }
    }

    pub fn events(&self) -> &[String] {
        &self.events
    }

    pub(crate) fn log_event(&mut self, label: impl Into<String>) {
        let label = label.into();
        if self.verbose {
            eprintln!("[ace_engine] info: {label}");
        }
        self.events.push(label);
    }

    pub(crate) fn warn(&mut self, message: impl AsRef<str>) {
        eprintln!("[ace_engine] warning: {}", message.as_ref());
    }

    pub(crate) fn drain_engine_ops(&mut self) -> Vec<EngineOp> {
        std::mem::take(&mut self.engine_ops)
    }

    // ---- state stack -------------------------------------------------

    pub fn push_state(&mut self, state: ActionState) {
        match self.stack.push(state) {
            Ok(transition) => self.note_transition("state.push", transition),
            Err(err) => self.warn(format!("state push rejected: {err}")),
        }
    }

    pub fn pop_state(&mut self) {
        match self.stack.pop() {
            Ok(transition) => self.note_transition("state.pop", transition),
            Err(err) => self.warn(format!("state pop rejected: {err}")),
        }
    }

    pub fn force_states(&mut self, states: &[ActionState]) {
        if let Some(transition) = self.stack.force_state(states) {
            self.note_transition("state.force", transition);
        }
    }

    fn note_transition(&mut self, kind: &str, transition: StateTransition) {
        self.log_event(format!(
            "{kind} {} -> {}",
            transition.old.label(),
            transition.new.label()
        ));
        let skip_out = self.room_loaded_latch;
        self.ui.apply_transition(transition, skip_out);
    }

    // ---- characters --------------------------------------------------

    fn resolve_emotion(&mut self, character_id: &str) -> Option<Rc<CharacterEmotion>> {
        let emotion = self.model.characters.get(character_id)?.emotion.clone();
        self.assets
            .character_emotion(&self.story_root, character_id, &emotion)
    }

    pub(crate) fn ensure_animator(&mut self, character_id: &str) -> &mut CharacterAnimator {
        let fresh_data = if self.animators.contains_key(character_id) {
            None
        } else {
            Some(self.resolve_emotion(character_id))
        };
        let animator = self
            .animators
            .entry(character_id.to_string())
            .or_insert_with(CharacterAnimator::new);
        if let Some(data) = fresh_data {
            animator.set_emotion_data(data);
        }
        animator
    }

    pub fn animator(&self, character_id: &str) -> Option<&CharacterAnimator> {
        self.animators.get(character_id)
    }

    pub fn shown_character(&self) -> Option<&str> {
        self.shown_character.as_deref()
    }

    /// Auto-show for a line's speaker. The player is never shown; unknown
    /// names are left alone.
    pub(crate) fn show_character_by_name(&mut self, speaker: Option<&str>) {
        let Some(name) = speaker else {
            return;
        };
        if name.eq_ignore_ascii_case("player") {
            return;
        }
        let Some(id) = self
            .model
            .characters
            .values()
            .find(|character| character.name == name)
            .map(|character| character.id.clone())
        else {
            return;
        };
        self.show_character(&id);
    }

    pub(crate) fn show_character(&mut self, character_id: &str) {
        if self.shown_character.as_deref() == Some(character_id) {
            // Already on screen; no hide/show flicker.
            if let Some(animator) = self.animators.get_mut(character_id) {
                animator.set_visible(true);
                animator.start_animating();
            }
            return;
        }
        if let Some(previous) = self.shown_character.take() {
            if let Some(animator) = self.animators.get_mut(&previous) {
                animator.stop_animating();
                animator.set_visible(false);
            }
        }
        let animator = self.ensure_animator(character_id);
        animator.set_talking(false);
        animator.set_visible(true);
        animator.start_animating();
        self.shown_character = Some(character_id.to_string());
        self.log_event(format!("char.show {character_id}"));
    }

    fn hide_shown_character(&mut self) {
        if let Some(previous) = self.shown_character.take() {
            if let Some(animator) = self.animators.get_mut(&previous) {
                animator.stop_animating();
                animator.set_visible(false);
            }
            self.log_event(format!("char.hide {previous}"));
        }
    }

    fn set_shown_character_talking(&mut self, talking: bool) {
        if let Some(id) = self.shown_character.clone() {
            if let Some(animator) = self.animators.get_mut(&id) {
                animator.set_talking(talking);
            }
        }
    }

    pub(crate) fn set_character_emotion(&mut self, character_id: &str, emotion: &str) {
        let Some(character) = self.model.characters.get_mut(character_id) else {
            self.warn(format!(
                "emotion change for unknown character '{character_id}'"
            ));
            return;
        };
        character.emotion = emotion.to_string();
        let data = self.resolve_emotion(character_id);
        self.ensure_animator(character_id).set_emotion_data(data);
        self.log_event(format!("char.emotion {character_id} {emotion}"));
    }

    /// Occupant of the active room, if both exist.
    pub(crate) fn occupant_id(&self) -> Option<String> {
        self.model.current_room().ok()?.occupant.clone()
    }

    /// Starts a one-shot animation override; returns true while it is
    /// actually playing (an absent or empty emotion finishes immediately).
    pub(crate) fn play_one_shot(&mut self, character_id: &str, animation: &str) -> bool {
        let data = self
            .assets
            .character_emotion(&self.story_root, character_id, animation);
        let animator = self.ensure_animator(character_id);
        animator.play_animation(data);
        if animator.one_shot_active() {
            self.log_event(format!("char.anim {character_id} {animation}"));
            true
        } else {
            animator.take_one_shot_finished();
            self.warn(format!(
                "animation '{animation}' for '{character_id}' has no frames"
            ));
            false
        }
    }

    /// Puts the on-screen cast back in sync with the active room's occupant
    /// field, clearing stray back-references left by script commands.
    pub(crate) fn resync_characters(&mut self) {
        let Ok(room) = self.model.current_room() else {
            return;
        };
        let room_id = room.id.clone();
        let occupant = room.occupant.clone();

        let strays: Vec<String> = self
            .model
            .characters
            .values()
            .filter(|character| {
                character.current_room.as_deref() == Some(room_id.as_str())
                    && Some(&character.id) != occupant.as_ref()
            })
            .map(|character| character.id.clone())
            .collect();
        for stray in strays {
            if let Some(character) = self.model.characters.get_mut(&stray) {
                character.current_room = None;
            }
            if let Some(animator) = self.animators.get_mut(&stray) {
                animator.stop_animating();
                animator.set_visible(false);
            }
        }

        match occupant {
            Some(id) => self.show_character(&id),
            None => self.hide_shown_character(),
        }
    }

    // ---- objects -----------------------------------------------------

    /// Show/hide searches the current room only; a miss is logged and
    /// dropped.
    pub(crate) fn set_object_visible(&mut self, object_id: &str, visible: bool) {
        let room_id = match self.model.current_room() {
            Ok(room) => room.id.clone(),
            Err(err) => {
                self.warn(format!("object visibility change failed: {err}"));
                return;
            }
        };
        match self.model.set_object_visible(&room_id, object_id, visible) {
            Ok(()) => {
                let verb = if visible { "show" } else { "hide" };
                self.log_event(format!("object.{verb} {object_id}"));
            }
            Err(err) => self.warn(format!("object visibility change failed: {err}")),
        }
    }

    // ---- dialogue bridge ---------------------------------------------

    pub(crate) fn handle_line(&mut self, line: DialogueLine) {
        let continuing = self.continue_armed;
        self.continue_armed = false;
        self.continue_delay = DEFAULT_CONTINUE_SECONDS;

        let mut noshow = false;
        let mut one_shot: Option<String> = None;
        for tag in &line.tags {
            let (key, value) = match tag.split_once(':') {
                Some((key, value)) => (key.trim(), Some(value.trim())),
                None => (tag.trim(), None),
            };
            match key {
                "noshow" => noshow = true,
                "emotion" => {
                    if let (Some(value), Some(occupant)) = (value, self.occupant_id()) {
                        self.set_character_emotion(&occupant, value);
                    }
                }
                "continue" => {
                    self.continue_armed = true;
                    if let Some(seconds) = value.and_then(|value| value.parse::<f32>().ok()) {
                        if seconds >= 0.0 {
                            self.continue_delay = seconds;
                        }
                    }
                }
                "anim" => one_shot = value.map(str::to_string),
                // Unrecognized tags are ignored.
                _ => {}
            }
        }
        // A noshow line keeps suppressing presence and talking changes
        // through its continuations.
        if continuing && self.ignore_character_changes {
            noshow = true;
        }
        self.ignore_character_changes = noshow;

        if continuing {
            self.ui.text_box.append(&line.text);
        } else {
            if !noshow {
                self.show_character_by_name(line.speaker.as_deref());
            }
            self.ui.text_box.begin(line.speaker.as_deref(), &line.text);
        }

        let speaker_matches = match (&self.shown_character, &line.speaker) {
            (Some(id), Some(speaker)) => self
                .model
                .characters
                .get(id)
                .is_some_and(|character| character.name == *speaker),
            (Some(_), None) => continuing,
            _ => false,
        };
        if speaker_matches && !noshow {
            self.set_shown_character_talking(true);
        }

        if let Some(animation) = one_shot {
            if let Some(occupant) = self.occupant_id() {
                self.play_one_shot(&occupant, &animation);
            }
        }

        self.line_phase = LinePhase::Revealing;
        self.log_event(format!(
            "dialog.line {}",
            line.speaker.as_deref().unwrap_or("-")
        ));
    }

    pub(crate) fn handle_options(&mut self, choices: Vec<DialogueChoice>) {
        self.log_event(format!("dialog.options {}", choices.len()));
        self.current_choices = choices;
    }

    pub fn current_choices(&self) -> &[DialogueChoice] {
        &self.current_choices
    }

    /// True once the option has been offered and taken at least once; purely
    /// a display hint.
    pub fn option_is_read(&self, id: i32) -> bool {
        self.read_options.contains(&id)
    }

    pub fn choose_option(&mut self, id: i32) {
        if !self.current_choices.iter().any(|choice| choice.id == id) {
            self.warn(format!("choice {id} is not currently offered"));
            return;
        }
        self.read_options.insert(id);
        self.current_choices.clear();
        self.log_event(format!("dialog.choose {id}"));
        self.push_state(ActionState::Dialogue);
        self.engine_ops.push(EngineOp::Choose(id));
    }

    pub(crate) fn handle_complete(&mut self, node: &str) {
        self.log_event(format!("dialog.complete {node}"));
        if node == DECLVARS_NODE {
            return;
        }
        // One cleanup per completion event, however often it is reported.
        if self.dialogue_ended_latch {
            return;
        }
        self.dialogue_ended_latch = true;

        self.ui.text_box.blank();
        self.line_phase = LinePhase::Idle;
        self.continue_armed = false;
        self.ignore_character_changes = false;
        if self.stack.peek() == ActionState::Dialogue {
            self.pop_state();
        }
        self.resync_characters();
    }

    /// Player input: dismisses the title card, skips the reveal, or advances
    /// past a finished line, in that priority order.
    pub fn advance_input(&mut self) {
        if self.ui.advance_intro() {
            self.log_event("intro.advance");
            return;
        }
        match self.line_phase {
            LinePhase::Revealing => {
                self.ui.text_box.skip();
                self.set_shown_character_talking(false);
                // Skipping the reveal also skips a pending continue delay.
                self.line_phase = if self.continue_armed {
                    LinePhase::ContinueDelay(Countdown::new(0.0))
                } else {
                    LinePhase::AwaitingAdvance
                };
            }
            LinePhase::AwaitingAdvance => {
                self.line_phase = LinePhase::Idle;
                self.ignore_character_changes = false;
                self.log_event("dialog.advance");
                self.engine_ops.push(EngineOp::AdvanceLine);
            }
            _ => {}
        }
    }

    pub fn awaiting_line_input(&self) -> bool {
        matches!(
            self.line_phase,
            LinePhase::Revealing | LinePhase::AwaitingAdvance
        )
    }

    // ---- player entry points ------------------------------------------

    pub fn open_travel_menu(&mut self) {
        self.push_state(ActionState::RoomTravel);
    }

    pub fn open_inventory(&mut self) {
        self.push_state(ActionState::Items);
    }

    pub fn open_investigate(&mut self) {
        self.push_state(ActionState::RoomInvestigate);
    }

    pub fn back(&mut self) {
        self.pop_state();
    }

    pub fn travel_to(&mut self, room_id: &str) {
        self.log_event(format!("travel.select {room_id}"));
        self.request_load_room(room_id);
    }

    /// Talking to the room's occupant opens the talk flow on their
    /// interaction node.
    pub fn talk_to_occupant(&mut self) {
        let Some(occupant) = self.occupant_id() else {
            self.warn("talk requested with no character in the room");
            return;
        };
        let node = match self.model.character(&occupant) {
            Ok(character) => character.on_interact.clone(),
            Err(err) => {
                self.warn(format!("talk failed: {err}"));
                return;
            }
        };
        self.push_state(ActionState::RoomTalk);
        self.engine_ops.push(EngineOp::StartNode(node));
    }

    /// Investigate-mode click: the topmost POI under the point starts its
    /// node immediately.
    pub fn investigate_at(&mut self, x: f32, y: f32) {
        let hit = match self.model.poi_at(x, y) {
            Ok(hit) => hit.map(|poi| (poi.id.clone(), poi.on_interact.clone())),
            Err(err) => {
                self.warn(format!("investigate failed: {err}"));
                return;
            }
        };
        let Some((id, node)) = hit else {
            return;
        };
        self.log_event(format!("poi.interact {id}"));
        self.push_state(ActionState::Dialogue);
        self.engine_ops.push(EngineOp::StartNode(node));
    }

    /// Object interaction queues its node until the dialogue panel has
    /// finished sliding in.
    pub fn interact_object(&mut self, object_id: &str) {
        let node = match self.model.current_room() {
            Ok(room) => room
                .objects
                .get(object_id)
                .filter(|object| object.visible)
                .map(|object| object.on_interact.clone()),
            Err(err) => {
                self.warn(format!("object interaction failed: {err}"));
                return;
            }
        };
        let Some(node) = node else {
            self.warn(format!("no visible object '{object_id}' to interact with"));
            return;
        };
        self.log_event(format!("object.interact {object_id}"));
        self.queued_node = Some(node);
        self.push_state(ActionState::Dialogue);
    }

    /// Presents an owned item to the room's occupant, running their present
    /// node with the item recorded for `GetItemToPresent`.
    pub fn present_item(&mut self, item_id: &str) {
        if !self.model.inventory_has_item(item_id) {
            self.warn(format!("cannot present '{item_id}': not in inventory"));
            return;
        }
        let Some(occupant) = self.occupant_id() else {
            self.warn("present requested with no character in the room");
            return;
        };
        let node = match self.model.character(&occupant) {
            Ok(character) => character.on_present.clone(),
            Err(err) => {
                self.warn(format!("present failed: {err}"));
                return;
            }
        };
        self.item_to_present = Some(item_id.to_string());
        self.log_event(format!("item.present {item_id}"));
        self.push_state(ActionState::Dialogue);
        self.engine_ops.push(EngineOp::StartNode(node));
    }

    pub(crate) fn item_to_present(&self) -> Option<&str> {
        self.item_to_present.as_deref()
    }

    // ---- room transitions ---------------------------------------------

    pub fn request_load_room(&mut self, room_id: &str) {
        if !self.model.rooms.contains_key(room_id) {
            self.warn(format!("cannot load unknown room '{room_id}'"));
            return;
        }
        if !self.transition.request(room_id) {
            self.warn(format!(
                "room transition already running, ignoring load of '{room_id}'"
            ));
            self.log_event(format!("room.load.reject {room_id}"));
            return;
        }
        self.log_event(format!("room.load.request {room_id}"));
        match self.transition.phase {
            // First room of the session: the screen starts covered.
            TransitionPhase::Swapping => self.ui.cover.show(CoverColor::Black),
            _ => self
                .ui
                .cover
                .fade_to(CoverColor::Black, COVER_FADE_SECONDS),
        }
    }

    fn advance_transition(&mut self) {
        match self.transition.phase {
            TransitionPhase::Idle => {}
            TransitionPhase::FadingOut => {
                if !self.ui.cover.busy() {
                    self.perform_swap();
                }
            }
            TransitionPhase::Swapping => self.perform_swap(),
            TransitionPhase::FadingIn => {
                if !self.ui.cover.busy() {
                    self.transition.phase = TransitionPhase::Idle;
                    if let Some(node) = self.transition.pending_entrance.take() {
                        self.engine_ops.push(EngineOp::StopThenStart(node));
                    }
                }
            }
        }
    }

    fn perform_swap(&mut self) {
        let Some(target) = self.transition.target.take() else {
            self.transition.phase = TransitionPhase::Idle;
            return;
        };
        self.ui.force_close_travel_menu();

        // Tear down the outgoing room.
        self.hide_shown_character();
        if let Ok(room) = self.model.current_room() {
            if let Some(occupant) = room.occupant.clone() {
                if let Some(animator) = self.animators.get_mut(&occupant) {
                    animator.stop_animating();
                    animator.set_visible(false);
                }
            }
        }

        self.model.current_room = Some(target.clone());
        self.log_event(format!("room.load {target}"));

        let (occupant, entrance) = match self.model.room(&target) {
            Ok(room) => (room.occupant.clone(), room.entrance_node.clone()),
            Err(_) => (None, String::new()),
        };
        if let Some(id) = occupant {
            self.show_character(&id);
        }

        self.room_loaded_latch = true;
        self.transition.first_room_done = true;

        if entrance.is_empty() {
            self.force_states(&[ActionState::RoomOptions]);
        } else {
            // "Back" from the entrance dialogue lands on room options.
            self.force_states(&[ActionState::RoomOptions, ActionState::Dialogue]);
            self.transition.pending_entrance = Some(entrance);
        }

        self.ui
            .cover
            .fade_from(CoverColor::Black, COVER_FADE_SECONDS);
        self.transition.phase = TransitionPhase::FadingIn;
    }

    // ---- tick ----------------------------------------------------------

    pub fn tick(&mut self, dt: f32) {
        if let Some(settled) = self.ui.tick(dt) {
            if settled.in_state == ActionState::Dialogue {
                if let Some(node) = self.queued_node.take() {
                    self.engine_ops.push(EngineOp::StartNode(node));
                }
            }
        }

        self.advance_transition();

        for animator in self.animators.values_mut() {
            animator.tick(dt);
        }

        match &mut self.line_phase {
            LinePhase::Revealing => {
                if self.ui.text_box.tick(dt) {
                    self.set_shown_character_talking(false);
                    self.line_phase = if self.continue_armed {
                        LinePhase::ContinueDelay(Countdown::new(self.continue_delay))
                    } else {
                        LinePhase::AwaitingAdvance
                    };
                }
            }
            LinePhase::ContinueDelay(countdown) => {
                if countdown.tick(dt) {
                    self.line_phase = LinePhase::Idle;
                    self.engine_ops.push(EngineOp::AdvanceLine);
                }
            }
            _ => {}
        }

        self.room_loaded_latch = false;
        self.dialogue_ended_latch = false;

        for warning in self.assets.drain_warnings() {
            self.warn(warning);
        }
    }

    pub(crate) fn wait_satisfied(&mut self, wait: &WaitCondition) -> bool {
        match wait {
            WaitCondition::ScreenCoverIdle => !self.ui.cover.busy(),
            WaitCondition::CharacterFadeIdle(id) => self
                .animators
                .get(id)
                .map(|animator| !animator.fading())
                .unwrap_or(true),
            WaitCondition::OneShotFinished(id) => self
                .animators
                .get_mut(id)
                .map(|animator| animator.take_one_shot_finished())
                .unwrap_or(true),
            WaitCondition::RoomIntroDone => self.ui.intro().is_none(),
        }
    }
}

/// Scripted player walkthrough used by demo sessions: once the session is
/// idle each flow is exercised once, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DemoStage {
    Talk,
    Investigate,
    Inventory,
    Present,
    Travel,
    Done,
}

/// Couples a context with a dialogue engine and pumps the two against each
/// other once per tick.
pub struct GameHost {
    pub context: GameContext,
    pub engine: Box<dyn DialogueEngine>,
    pending_wait: Option<WaitCondition>,
    demo: bool,
    demo_stage: DemoStage,
    start_room_requested: bool,
}

impl GameHost {
    pub fn new(context: GameContext, engine: Box<dyn DialogueEngine>) -> Self {
        GameHost {
            context,
            engine,
            pending_wait: None,
            demo: false,
            demo_stage: DemoStage::Talk,
            start_room_requested: false,
        }
    }

    /// Demo mode: lines are advanced, options are picked, and the player
    /// flows (talk, investigate, inventory, present, travel) are each walked
    /// through once, all without input.
    pub fn demo(mut self, enabled: bool) -> Self {
        self.demo = enabled;
        self
    }

    /// Kicks off a session: runs the reserved variable-declaration node;
    /// once the engine goes idle, the configured start room loads.
    pub fn begin_story(&mut self) {
        self.context.log_event("boot.start");
        self.engine.start_node(DECLVARS_NODE);
    }

    pub fn tick(&mut self, dt: f32) {
        for op in self.context.drain_engine_ops() {
            self.apply_op(op);
        }

        if let Some(wait) = self.pending_wait.take() {
            if !self.context.wait_satisfied(&wait) {
                self.pending_wait = Some(wait);
            }
        }

        if self.pending_wait.is_none() {
            self.pump_engine();
        }

        self.context.tick(dt);

        if self.demo {
            self.drive_demo();
        }

        if !self.start_room_requested
            && self.pending_wait.is_none()
            && !self.engine.is_running()
            && !self.context.transition.busy()
        {
            self.start_room_requested = true;
            if let Some(room) = self.context.model.start_room.clone() {
                self.context.request_load_room(&room);
            }
        }
    }

    /// Stands in for the player: advances lines, takes the first unread
    /// option (falling back to the last, usually the goodbye), and once the
    /// session idles walks each player flow in turn.
    fn drive_demo(&mut self) {
        if self.context.ui.intro().is_some() || self.context.awaiting_line_input() {
            self.context.advance_input();
            return;
        }
        if !self.context.current_choices().is_empty() {
            let choices = self.context.current_choices();
            let pick = choices
                .iter()
                .find(|choice| !self.context.option_is_read(choice.id))
                .or_else(|| choices.last())
                .map(|choice| choice.id);
            if let Some(id) = pick {
                self.context.choose_option(id);
            }
            return;
        }

        let idle = self.start_room_requested
            && self.pending_wait.is_none()
            && !self.engine.is_running()
            && !self.context.transition.busy()
            && !self.context.ui.transition_busy();
        if !idle {
            return;
        }
        match self.context.stack.peek() {
            ActionState::RoomOptions => self.next_demo_stage(),
            // Leftover menu or flow state from the previous stage.
            ActionState::RoomTalk
            | ActionState::RoomInvestigate
            | ActionState::RoomTravel
            | ActionState::Items => self.context.back(),
            _ => {}
        }
    }

    fn next_demo_stage(&mut self) {
        match self.demo_stage {
            DemoStage::Talk => {
                self.demo_stage = DemoStage::Investigate;
                if self.context.occupant_id().is_some() {
                    self.context.talk_to_occupant();
                }
            }
            DemoStage::Investigate => {
                self.demo_stage = DemoStage::Inventory;
                let target = self
                    .context
                    .model
                    .current_room()
                    .ok()
                    .and_then(|room| room.pois.values().next())
                    .and_then(|poi| poi.bounds.first())
                    .map(|rect| (rect.x + rect.width / 2.0, rect.y + rect.height / 2.0));
                if let Some((x, y)) = target {
                    self.context.open_investigate();
                    self.context.investigate_at(x, y);
                }
            }
            DemoStage::Inventory => {
                self.demo_stage = DemoStage::Present;
                self.context.open_inventory();
            }
            DemoStage::Present => {
                self.demo_stage = DemoStage::Travel;
                let item = self.context.model.inventory.iter().next().cloned();
                if let (Some(item), Some(_)) = (item, self.context.occupant_id()) {
                    self.context.present_item(&item);
                }
            }
            DemoStage::Travel => {
                self.demo_stage = DemoStage::Done;
                let current = self
                    .context
                    .model
                    .current_room()
                    .ok()
                    .map(|room| room.id.clone());
                let target = current.and_then(|id| {
                    self.context
                        .model
                        .visible_connected_rooms(&id)
                        .ok()?
                        .first()
                        .map(|room| room.id.clone())
                });
                if let Some(room) = target {
                    self.context.open_travel_menu();
                    self.context.travel_to(&room);
                }
            }
            DemoStage::Done => {}
        }
    }

    fn pump_engine(&mut self) {
        while let Some(signal) = self.engine.poll() {
            match signal {
                DialogueSignal::Line(line) => self.context.handle_line(line),
                DialogueSignal::Options(choices) => {
                    self.context.handle_options(choices);
                    break;
                }
                DialogueSignal::Command { name, args } => {
                    match commands::dispatch(&mut self.context, &name, &args) {
                        CommandStatus::Done => {}
                        CommandStatus::Value(_) => self
                            .context
                            .warn(format!("command '{name}' returned an unused value")),
                        CommandStatus::Blocked(wait) => {
                            self.pending_wait = Some(wait);
                            break;
                        }
                    }
                }
                DialogueSignal::FunctionCall { name, args } => {
                    let value = match commands::dispatch(&mut self.context, &name, &args) {
                        CommandStatus::Value(value) => value,
                        _ => {
                            self.context
                                .warn(format!("function '{name}' produced no value"));
                            FunctionValue::Bool(false)
                        }
                    };
                    self.engine.resolve_function(value);
                }
                DialogueSignal::Complete { node } => self.context.handle_complete(&node),
            }
        }
    }

    fn apply_op(&mut self, op: EngineOp) {
        match op {
            EngineOp::StartNode(node) => self.engine.start_node(&node),
            EngineOp::Stop => self.engine.stop(),
            EngineOp::StopThenStart(node) => {
                self.engine.stop();
                self.engine.start_node(&node);
            }
            EngineOp::AdvanceLine => self.engine.advance_line(),
            EngineOp::Choose(id) => self.engine.choose(id),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use ace_formats::StoryDocument;

    use crate::assets::AssetCache;
    use crate::dialogue::{DialogueEngine, DialogueLine, ScriptedEngine};
    use crate::stack::ActionState;
    use crate::story::StoryModel;
    use crate::transition::TransitionPhase;
    use crate::ui::PANEL_ANIM_SECONDS;

    use super::{GameContext, GameHost, COVER_FADE_SECONDS};

    const STORY: &str = r#"{
        "startroom": "office",
        "rooms": [
            {"id": "office", "name": "The Office", "entrancenode": "OfficeIn",
             "connectedrooms": ["lobby"]},
            {"id": "lobby", "name": "Lobby", "entrancenode": "",
             "connectedrooms": ["office"]}
        ],
        "objects": [
            {"id": "lamp", "image": "lamp.png", "room": "office",
             "oninteract": "LampLook"}
        ],
        "pois": [
            {"id": "window", "room": "office", "oninteract": "WindowLook",
             "bounds": "(0, 0, 10, 10)"}
        ],
        "characters": [
            {"id": "amy", "name": "Amy", "oninteract": "TalkAmy",
             "onpresent": "PresentAmy"},
            {"id": "bob", "name": "Bob", "oninteract": "TalkBob",
             "onpresent": "PresentBob"}
        ],
        "items": [
            {"id": "key", "name": "Key", "description": "A key."}
        ]
    }"#;

    fn context() -> GameContext {
        let doc = StoryDocument::parse(STORY).expect("valid story");
        let (model, _) = StoryModel::from_document(&doc);
        GameContext::new(
            model,
            AssetCache::new(),
            PathBuf::from("missing-assets"),
            false,
        )
    }

    fn line(speaker: Option<&str>, text: &str, tags: &[&str]) -> DialogueLine {
        DialogueLine {
            speaker: speaker.map(str::to_string),
            text: text.to_string(),
            tags: tags.iter().map(|tag| tag.to_string()).collect(),
        }
    }

    fn settle(ctx: &mut GameContext) {
        for _ in 0..240 {
            ctx.tick(1.0 / 60.0);
        }
    }

    #[test]
    fn speaker_auto_show_switches_characters() {
        let mut ctx = context();
        ctx.handle_line(line(Some("Amy"), "Hi.", &[]));
        assert_eq!(ctx.shown_character(), Some("amy"));

        ctx.handle_line(line(Some("Bob"), "Yo.", &[]));
        assert_eq!(ctx.shown_character(), Some("bob"));
        assert!(!ctx.animator("amy").unwrap().visible());

        ctx.handle_line(line(Some("Player"), "Me.", &[]));
        assert_eq!(ctx.shown_character(), Some("bob"), "player is never shown");
    }

    #[test]
    fn noshow_suppresses_presence_changes() {
        let mut ctx = context();
        ctx.handle_line(line(Some("Amy"), "Hidden entrance.", &["noshow"]));
        assert_eq!(ctx.shown_character(), None);
    }

    #[test]
    fn noshow_suppression_carries_across_continued_lines() {
        let mut ctx = context();
        ctx.handle_line(line(Some("Amy"), "On screen.", &[]));
        settle(&mut ctx);
        ctx.advance_input();

        ctx.handle_line(line(Some("Bob"), "Offstage.", &["noshow", "continue:0"]));
        settle(&mut ctx);
        ctx.handle_line(line(None, "Still offstage.", &[]));
        assert_eq!(ctx.shown_character(), Some("amy"));
        assert!(!ctx.animator("amy").unwrap().talking());
    }

    #[test]
    fn continue_tag_appends_the_next_line() {
        let mut ctx = context();
        ctx.handle_line(line(Some("Amy"), "First.", &["continue:0"]));
        ctx.advance_input();
        settle(&mut ctx);
        assert!(
            ctx.drain_engine_ops()
                .contains(&super::EngineOp::AdvanceLine),
            "continue auto-advances after the delay"
        );

        ctx.handle_line(line(Some("Amy"), "Second.", &[]));
        assert_eq!(ctx.ui.text_box.text(), "First. Second.");
    }

    #[test]
    fn talking_tracks_the_reveal() {
        let mut ctx = context();
        ctx.handle_line(line(Some("Amy"), "Hello!", &[]));
        assert!(ctx.animator("amy").unwrap().talking());
        settle(&mut ctx);
        assert!(!ctx.animator("amy").unwrap().talking());
        assert!(ctx.awaiting_line_input());
    }

    #[test]
    fn mismatched_speaker_does_not_talk() {
        let mut ctx = context();
        ctx.handle_line(line(Some("Amy"), "Hi.", &[]));
        settle(&mut ctx);
        ctx.advance_input();
        // Bob speaks while Amy is on screen under noshow.
        ctx.handle_line(line(Some("Bob"), "Offstage.", &["noshow"]));
        assert_eq!(ctx.shown_character(), Some("amy"));
        assert!(!ctx.animator("amy").unwrap().talking());
    }

    #[test]
    fn first_room_load_skips_fade_out_and_runs_entrance() {
        let mut ctx = context();
        ctx.request_load_room("office");
        assert!(ctx.ui.cover.opaque(), "first load snaps to black");

        ctx.tick(1.0 / 60.0);
        assert_eq!(ctx.model.current_room().unwrap().id, "office");
        assert_eq!(ctx.stack.peek(), ActionState::Dialogue);
        assert!(ctx.stack.contains(ActionState::RoomOptions));
        assert_eq!(ctx.transition.phase, TransitionPhase::FadingIn);

        // Entrance node starts only after the fade-in completes.
        assert!(ctx.drain_engine_ops().is_empty());
        for _ in 0..40 {
            ctx.tick(COVER_FADE_SECONDS / 20.0);
        }
        assert_eq!(ctx.transition.phase, TransitionPhase::Idle);
        assert!(ctx
            .drain_engine_ops()
            .contains(&super::EngineOp::StopThenStart("OfficeIn".to_string())));
    }

    #[test]
    fn overlapping_room_loads_are_rejected() {
        let mut ctx = context();
        ctx.request_load_room("office");
        ctx.request_load_room("lobby");
        assert!(ctx
            .events()
            .iter()
            .any(|event| event == "room.load.reject lobby"));
        ctx.tick(1.0 / 60.0);
        assert_eq!(ctx.model.current_room().unwrap().id, "office");
    }

    #[test]
    fn entering_a_character_affects_screen_only_after_load() {
        let mut ctx = context();
        ctx.request_load_room("office");
        settle(&mut ctx);

        ctx.model
            .set_current_character_in_room("lobby", Some("amy"))
            .unwrap();
        ctx.resync_characters();
        assert_eq!(ctx.shown_character(), None, "amy waits in the lobby");

        ctx.request_load_room("lobby");
        settle(&mut ctx);
        assert_eq!(ctx.shown_character(), Some("amy"));
        let animator = ctx.animator("amy").unwrap();
        assert!(animator.visible());
    }

    #[test]
    fn dialogue_complete_pops_and_resyncs_once() {
        let mut ctx = context();
        ctx.request_load_room("office");
        settle(&mut ctx);
        assert_eq!(ctx.stack.peek(), ActionState::Dialogue);

        ctx.handle_line(line(Some("Amy"), "Hi.", &[]));
        ctx.handle_complete("OfficeIn");
        assert_eq!(ctx.stack.peek(), ActionState::RoomOptions);
        assert_eq!(ctx.ui.text_box.text(), "");
        assert_eq!(ctx.shown_character(), None, "no occupant to resync to");

        let depth = ctx.stack.depth();
        ctx.handle_complete("OfficeIn");
        assert_eq!(ctx.stack.depth(), depth, "second report is a no-op");
    }

    #[test]
    fn object_interaction_queues_until_panel_settles() {
        let mut ctx = context();
        ctx.request_load_room("office");
        settle(&mut ctx);
        ctx.handle_complete("OfficeIn");
        settle(&mut ctx);
        ctx.drain_engine_ops();

        ctx.interact_object("lamp");
        assert_eq!(ctx.stack.peek(), ActionState::Dialogue);
        assert!(ctx.drain_engine_ops().is_empty(), "node held back");

        let mut started = false;
        for _ in 0..120 {
            ctx.tick(PANEL_ANIM_SECONDS / 10.0);
            if ctx
                .drain_engine_ops()
                .contains(&super::EngineOp::StartNode("LampLook".to_string()))
            {
                started = true;
                break;
            }
        }
        assert!(started, "queued node plays after the slide finishes");
    }

    #[test]
    fn investigate_hits_poi_bounds() {
        let mut ctx = context();
        ctx.request_load_room("office");
        settle(&mut ctx);
        ctx.handle_complete("OfficeIn");

        ctx.investigate_at(5.0, 5.0);
        assert!(ctx
            .drain_engine_ops()
            .contains(&super::EngineOp::StartNode("WindowLook".to_string())));

        ctx.investigate_at(50.0, 50.0);
        assert!(ctx.drain_engine_ops().is_empty());
    }

    #[test]
    fn presenting_requires_the_item_and_an_occupant() {
        let mut ctx = context();
        ctx.request_load_room("office");
        settle(&mut ctx);
        ctx.drain_engine_ops();
        ctx.model
            .set_current_character_in_room("office", Some("amy"))
            .unwrap();

        ctx.present_item("key");
        assert!(ctx.drain_engine_ops().is_empty(), "key not owned yet");

        ctx.model.add_inventory_item("key").unwrap();
        ctx.present_item("key");
        assert_eq!(ctx.item_to_present(), Some("key"));
        assert!(ctx
            .drain_engine_ops()
            .contains(&super::EngineOp::StartNode("PresentAmy".to_string())));
    }

    #[test]
    fn host_runs_a_story_end_to_end() {
        let script = r#"{
            "OfficeIn": [
                {"line": {"speaker": "Amy", "text": "Welcome."}},
                {"command": {"name": "AddInventoryItem", "args": ["key"]}},
                {"call": {"name": "InventoryHasItem", "args": ["key"],
                          "branches": {"false": "Broke"}}},
                {"line": {"speaker": "Amy", "text": "Take this key."}}
            ],
            "Broke": [
                {"line": {"text": "unreachable"}}
            ]
        }"#;
        let mut engine = ScriptedEngine::new();
        let program = engine.compile(&[script.to_string()]).expect("compiles");
        engine.load(program).expect("loads");

        let mut host = GameHost::new(context(), Box::new(engine)).demo(true);
        host.begin_story();
        for _ in 0..2400 {
            host.tick(1.0 / 60.0);
        }

        let events = host.context.events();
        assert!(events.iter().any(|event| event == "room.load office"));
        assert!(events.iter().any(|event| event == "dialog.line Amy"));
        assert!(events.iter().any(|event| event == "inventory.add key"));
        assert!(events
            .iter()
            .any(|event| event == "dialog.complete OfficeIn"));
        assert!(host.context.model.inventory_has_item("key"));
        assert_eq!(host.context.stack.peek(), ActionState::RoomOptions);
    }
}
