//! UI-side runtime state: the screen cover, the dialogue text box and its
//! typewriter reveal, the room-title card, and the panel slide that plays
//! whenever the action state changes.
//!
//! Nothing here draws; this tracks exactly the state a renderer would need,
//! plus the busy flags other sequences poll so that cross-tick ordering
//! (transition out before transition in, cover opaque before room swap)
//! holds without a real frame loop.

use crate::scheduler::{Countdown, Ramp};
use crate::stack::{ActionState, StateTransition};

/// Seconds a panel takes to slide out or in.
pub const PANEL_ANIM_SECONDS: f32 = 0.5;

/// Characters revealed per second by the text box typewriter.
pub const REVEAL_RATE: f32 = 30.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoverColor {
    Black,
    White,
}

impl CoverColor {
    pub fn label(self) -> &'static str {
        match self {
            CoverColor::Black => "black",
            CoverColor::White => "white",
        }
    }
}

/// Fullscreen fade cover. At most one fade is in flight; starting another
/// replaces it, snapping alpha to the new ramp's starting value.
#[derive(Debug)]
pub struct ScreenCover {
    color: CoverColor,
    alpha: f32,
    fade: Option<Ramp>,
}

impl Default for ScreenCover {
    fn default() -> Self {
        ScreenCover {
            color: CoverColor::Black,
            alpha: 0.0,
            fade: None,
        }
    }
}

impl ScreenCover {
    pub fn show(&mut self, color: CoverColor) {
        self.color = color;
        self.alpha = 1.0;
        self.fade = None;
    }

    pub fn fade_to(&mut self, color: CoverColor, seconds: f32) {
        self.color = color;
        let ramp = Ramp::new(0.0, 1.0, seconds);
        self.alpha = ramp.from();
        self.fade = Some(ramp);
    }

    pub fn fade_from(&mut self, color: CoverColor, seconds: f32) {
        self.color = color;
        let ramp = Ramp::new(1.0, 0.0, seconds);
        self.alpha = ramp.from();
        self.fade = Some(ramp);
    }

    pub fn tick(&mut self, dt: f32) {
        if let Some(fade) = self.fade.as_mut() {
            self.alpha = fade.tick(dt);
            if fade.finished() {
                self.fade = None;
            }
        }
    }

    pub fn busy(&self) -> bool {
        self.fade.is_some()
    }

    pub fn opaque(&self) -> bool {
        self.alpha >= 1.0
    }

    pub fn alpha(&self) -> f32 {
        self.alpha
    }

    pub fn color(&self) -> CoverColor {
        self.color
    }
}

/// Dialogue text box with a typewriter reveal. `append` continues the
/// current contents in place instead of starting over.
#[derive(Debug, Default)]
pub struct TextBox {
    text: String,
    speaker: Option<String>,
    revealed: usize,
    clock: f32,
}

impl TextBox {
    pub fn begin(&mut self, speaker: Option<&str>, text: &str) {
        self.text = text.to_string();
        self.speaker = speaker.map(str::to_string);
        self.revealed = 0;
        self.clock = 0.0;
    }

    /// Continues the current line: glues `text` on (with a single separating
    /// space if neither side provides one) and keeps the reveal position.
    pub fn append(&mut self, text: &str) {
        if !self.text.is_empty() && !self.text.ends_with(' ') && !text.starts_with(' ') {
            self.text.push(' ');
        }
        self.text.push_str(text);
    }

    pub fn blank(&mut self) {
        self.text.clear();
        self.speaker = None;
        self.revealed = 0;
        self.clock = 0.0;
    }

    pub fn skip(&mut self) {
        self.revealed = self.char_count();
    }

    pub fn revealing(&self) -> bool {
        self.revealed < self.char_count()
    }

    /// Advances the reveal; returns true on the tick the reveal completes.
    pub fn tick(&mut self, dt: f32) -> bool {
        if !self.revealing() {
            return false;
        }
        self.clock += dt;
        let step = (self.clock * REVEAL_RATE) as usize;
        if step > 0 {
            self.clock -= step as f32 / REVEAL_RATE;
            self.revealed = (self.revealed + step).min(self.char_count());
        }
        !self.revealing()
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn speaker(&self) -> Option<&str> {
        self.speaker.as_deref()
    }

    pub fn visible_text(&self) -> String {
        self.text.chars().take(self.revealed).collect()
    }

    fn char_count(&self) -> usize {
        self.text.chars().count()
    }
}

/// Title card shown on room entry; blocks its waiter until the player
/// advances past it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomIntro {
    pub title: String,
    pub subtitle: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PanelPhase {
    Out,
    In,
}

#[derive(Debug)]
struct PanelTransition {
    out_state: ActionState,
    in_state: ActionState,
    phase: PanelPhase,
    countdown: Countdown,
}

/// Raised by `UiRuntime::tick` when a panel slide finishes, so the owner can
/// run whatever was waiting on the transition (queued dialogue nodes).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PanelSettled {
    pub in_state: ActionState,
}

#[derive(Debug, Default)]
pub struct UiRuntime {
    pub cover: ScreenCover,
    pub text_box: TextBox,
    intro: Option<RoomIntro>,
    transition: Option<PanelTransition>,
    talk_close_animating: bool,
    pub travel_menu_open: bool,
    pub inventory_open: bool,
}

impl UiRuntime {
    pub fn new() -> Self {
        UiRuntime::default()
    }

    /// Reacts to a state-stack transition: starts the out/in panel slide and
    /// updates which menus are showing. `skip_out` drops the out phase (used
    /// on the tick a room finishes loading, where the old panel is already
    /// gone).
    pub fn apply_transition(&mut self, transition: StateTransition, skip_out: bool) {
        self.travel_menu_open = transition.new == ActionState::RoomTravel;
        self.inventory_open = transition.new == ActionState::Items;

        let has_out = !skip_out && transition.old != ActionState::Null;
        if has_out && transition.old == ActionState::Dialogue {
            self.talk_close_animating = true;
        }
        let (phase, countdown) = if has_out {
            (PanelPhase::Out, Countdown::new(PANEL_ANIM_SECONDS))
        } else {
            (PanelPhase::In, Countdown::new(PANEL_ANIM_SECONDS))
        };
        self.transition = Some(PanelTransition {
            out_state: transition.old,
            in_state: transition.new,
            phase,
            countdown,
        });
    }

    pub fn force_close_travel_menu(&mut self) {
        self.travel_menu_open = false;
    }

    pub fn transition_busy(&self) -> bool {
        self.transition.is_some()
    }

    /// True while the dialogue box's closing animation is still playing.
    pub fn talk_close_animating(&self) -> bool {
        self.talk_close_animating
    }

    pub fn show_intro(&mut self, title: &str, subtitle: &str) {
        self.intro = Some(RoomIntro {
            title: title.to_string(),
            subtitle: subtitle.to_string(),
        });
    }

    pub fn intro(&self) -> Option<&RoomIntro> {
        self.intro.as_ref()
    }

    /// Player input while the title card is up dismisses it.
    pub fn advance_intro(&mut self) -> bool {
        self.intro.take().is_some()
    }

    pub fn tick(&mut self, dt: f32) -> Option<PanelSettled> {
        self.cover.tick(dt);

        let transition = self.transition.as_mut()?;
        if !transition.countdown.tick(dt) {
            return None;
        }
        match transition.phase {
            PanelPhase::Out => {
                if transition.out_state == ActionState::Dialogue {
                    self.talk_close_animating = false;
                }
                transition.phase = PanelPhase::In;
                transition.countdown = Countdown::new(PANEL_ANIM_SECONDS);
                None
            }
            PanelPhase::In => {
                let settled = PanelSettled {
                    in_state: transition.in_state,
                };
                self.transition = None;
                Some(settled)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::stack::{ActionState, StateTransition};

    use super::{CoverColor, PanelSettled, ScreenCover, TextBox, UiRuntime, PANEL_ANIM_SECONDS};

    #[test]
    fn cover_fade_replaces_and_snaps() {
        let mut cover = ScreenCover::default();
        cover.fade_to(CoverColor::Black, 1.0);
        cover.tick(0.5);
        assert!((cover.alpha() - 0.5).abs() < 1e-6);

        cover.fade_from(CoverColor::White, 1.0);
        assert_eq!(cover.alpha(), 1.0, "snapped to new ramp start");
        assert_eq!(cover.color(), CoverColor::White);
        cover.tick(1.0);
        assert_eq!(cover.alpha(), 0.0);
        assert!(!cover.busy());
    }

    #[test]
    fn cover_show_is_instant() {
        let mut cover = ScreenCover::default();
        cover.show(CoverColor::Black);
        assert!(cover.opaque());
        assert!(!cover.busy());
    }

    #[test]
    fn text_box_reveals_at_fixed_rate() {
        let mut text_box = TextBox::default();
        text_box.begin(Some("Amy"), "Hello there");
        assert!(text_box.revealing());
        assert!(!text_box.tick(0.1));
        assert_eq!(text_box.visible_text(), "Hel");
        assert!(text_box.tick(10.0), "reveal completes");
        assert_eq!(text_box.visible_text(), "Hello there");
        assert!(!text_box.tick(0.1), "no repeat completion");
    }

    #[test]
    fn append_inserts_a_single_space() {
        let mut text_box = TextBox::default();
        text_box.begin(None, "First part.");
        text_box.skip();
        text_box.append("Second part.");
        assert_eq!(text_box.text(), "First part. Second part.");
        assert!(text_box.revealing(), "appended text reveals from where it left off");
        assert_eq!(text_box.visible_text(), "First part.");

        text_box.append(" pre-spaced");
        assert_eq!(text_box.text(), "First part. Second part. pre-spaced");
    }

    #[test]
    fn panel_transition_runs_out_then_in() {
        let mut ui = UiRuntime::new();
        ui.apply_transition(
            StateTransition {
                new: ActionState::RoomOptions,
                old: ActionState::Dialogue,
            },
            false,
        );
        assert!(ui.transition_busy());
        assert!(ui.talk_close_animating());

        assert!(ui.tick(PANEL_ANIM_SECONDS).is_none(), "out phase ends");
        assert!(!ui.talk_close_animating());
        assert!(ui.transition_busy());

        assert_eq!(
            ui.tick(PANEL_ANIM_SECONDS),
            Some(PanelSettled {
                in_state: ActionState::RoomOptions
            })
        );
        assert!(!ui.transition_busy());
    }

    #[test]
    fn skip_out_goes_straight_to_the_in_phase() {
        let mut ui = UiRuntime::new();
        ui.apply_transition(
            StateTransition {
                new: ActionState::Dialogue,
                old: ActionState::RoomOptions,
            },
            true,
        );
        assert_eq!(
            ui.tick(PANEL_ANIM_SECONDS),
            Some(PanelSettled {
                in_state: ActionState::Dialogue
            })
        );
    }

    #[test]
    fn menu_flags_track_the_new_state() {
        let mut ui = UiRuntime::new();
        ui.apply_transition(
            StateTransition {
                new: ActionState::RoomTravel,
                old: ActionState::RoomOptions,
            },
            false,
        );
        assert!(ui.travel_menu_open);
        ui.force_close_travel_menu();
        assert!(!ui.travel_menu_open);
    }

    #[test]
    fn intro_blocks_until_advanced() {
        let mut ui = UiRuntime::new();
        ui.show_intro("The Office", "Day 1");
        assert!(ui.intro().is_some());
        assert!(ui.advance_intro());
        assert!(ui.intro().is_none());
        assert!(!ui.advance_intro());
    }
}
