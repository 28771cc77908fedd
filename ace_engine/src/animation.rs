//! Per-character frame playback.
//!
//! Each on-screen character owns one `CharacterAnimator` advanced by the
//! frame tick. Frame durations are authored in 60 Hz ticks, so a frame holds
//! for `duration / 60` seconds of wall-clock time. An animator with no
//! resolved emotion data is inert: every operation is a visual no-op, never
//! a failure.

use std::rc::Rc;

use crate::assets::CharacterEmotion;
use crate::scheduler::Ramp;

const TICK_RATE: f32 = 60.0;

#[derive(Debug, Default)]
pub struct CharacterAnimator {
    emotion_data: Option<Rc<CharacterEmotion>>,
    one_shot: Option<Rc<CharacterEmotion>>,
    frame: usize,
    hold: f32,
    /// The frame-advance loop is live. Cleared when a non-looping sequence
    /// reaches its final frame, so a later reset starts it over.
    running: bool,
    /// Explicitly stopped; stays stopped across resets until restarted.
    paused: bool,
    talking: bool,
    visible: bool,
    alpha: f32,
    fade: Option<Ramp>,
    one_shot_finished: bool,
}

impl CharacterAnimator {
    pub fn new() -> Self {
        CharacterAnimator {
            alpha: 1.0,
            ..CharacterAnimator::default()
        }
    }

    pub fn set_emotion_data(&mut self, data: Option<Rc<CharacterEmotion>>) {
        self.emotion_data = data;
        self.reset_animation();
    }

    pub fn start_animating(&mut self) {
        self.paused = false;
        self.running = true;
        self.hold = self.current_frame_hold();
    }

    /// Cancels the frame-advance loop. The character keeps showing the frame
    /// it stopped on.
    pub fn stop_animating(&mut self) {
        self.paused = true;
        self.running = false;
    }

    /// Back to frame zero; resumes only if the animator was not explicitly
    /// stopped.
    pub fn reset_animation(&mut self) {
        self.frame = 0;
        self.hold = self.current_frame_hold();
        if !self.paused {
            self.running = true;
        }
    }

    pub fn set_talking(&mut self, talking: bool) {
        if self.talking == talking {
            return;
        }
        self.talking = talking;
        self.reset_animation();
    }

    pub fn talking(&self) -> bool {
        self.talking
    }

    pub fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
    }

    pub fn visible(&self) -> bool {
        self.visible
    }

    /// Plays `data` once as a temporary override of the standing emotion,
    /// then restores normal playback. An absent or empty override finishes
    /// immediately rather than stalling its waiters.
    pub fn play_animation(&mut self, data: Option<Rc<CharacterEmotion>>) {
        let playable = data
            .as_ref()
            .is_some_and(|emotion| !emotion.frames.is_empty());
        if !playable {
            self.one_shot = None;
            self.one_shot_finished = true;
            self.reset_animation();
            return;
        }
        self.one_shot = data;
        self.one_shot_finished = false;
        self.paused = false;
        self.running = true;
        self.frame = 0;
        self.hold = self.current_frame_hold();
    }

    pub fn one_shot_active(&self) -> bool {
        self.one_shot.is_some()
    }

    /// One-time latch set when a one-shot override completes; consumed by
    /// whoever was waiting on it.
    pub fn take_one_shot_finished(&mut self) -> bool {
        std::mem::take(&mut self.one_shot_finished)
    }

    pub fn fade_in(&mut self, duration: f32) {
        self.visible = true;
        self.start_fade(Ramp::new(0.0, 1.0, duration));
    }

    pub fn fade_out(&mut self, duration: f32) {
        self.start_fade(Ramp::new(1.0, 0.0, duration));
    }

    // Starting a fade cancels any fade in flight, snapping alpha to the new
    // ramp's starting value.
    fn start_fade(&mut self, ramp: Ramp) {
        self.alpha = ramp.from();
        self.fade = Some(ramp);
    }

    pub fn fading(&self) -> bool {
        self.fade.is_some()
    }

    pub fn alpha(&self) -> f32 {
        self.alpha
    }

    pub fn current_frame(&self) -> usize {
        self.frame
    }

    /// Image index the character is showing right now, if any frames exist.
    pub fn current_image_index(&self) -> Option<u32> {
        let data = self.active_data()?;
        let sequence = self.active_sequence(data);
        sequence.get(self.frame).map(|&(index, _)| index)
    }

    pub fn tick(&mut self, dt: f32) {
        if let Some(fade) = self.fade.as_mut() {
            self.alpha = fade.tick(dt);
            if fade.finished() {
                if self.alpha <= 0.0 {
                    self.visible = false;
                }
                self.fade = None;
            }
        }

        if !self.running || self.paused {
            return;
        }
        let Some(data) = self.active_data().cloned() else {
            return;
        };
        let sequence_len = self.active_sequence(&data).len();
        if sequence_len == 0 {
            if self.one_shot.is_some() {
                self.finish_one_shot();
            }
            return;
        }

        self.hold -= dt;
        while self.hold <= 0.0 && self.running {
            if self.advance_frame(&data, sequence_len) {
                // A one-shot just ended; its hold was re-primed for the
                // restored data and the leftover time is discarded.
                break;
            }
            self.hold += self.current_frame_hold();
            // A zero-duration frame would never let the loop terminate.
            if self.hold <= 0.0 && self.current_frame_hold() <= 0.0 {
                break;
            }
        }
    }

    /// Returns true when this advance completed a one-shot override.
    fn advance_frame(&mut self, data: &Rc<CharacterEmotion>, len: usize) -> bool {
        let talking_loop = self.talking && self.one_shot.is_none();
        if talking_loop {
            self.frame = (self.frame + 1) % len;
            return false;
        }

        if self.frame + 1 < len {
            self.frame += 1;
            return false;
        }

        // End of the idle (or one-shot) sequence.
        if self.one_shot.is_some() {
            self.finish_one_shot();
            return true;
        }
        if data.looped {
            self.frame = data.loop_index.min(len - 1);
        } else {
            // Hold the last frame; the loop is no longer running, so a later
            // reset starts playback over.
            self.running = false;
        }
        false
    }

    fn finish_one_shot(&mut self) {
        self.one_shot = None;
        self.one_shot_finished = true;
        self.frame = 0;
        self.hold = self.current_frame_hold();
    }

    fn active_data(&self) -> Option<&Rc<CharacterEmotion>> {
        self.one_shot.as_ref().or(self.emotion_data.as_ref())
    }

    fn active_sequence<'a>(&self, data: &'a CharacterEmotion) -> &'a [(u32, u32)] {
        if self.talking && self.one_shot.is_none() {
            &data.talking_frames
        } else {
            &data.frames
        }
    }

    fn current_frame_hold(&self) -> f32 {
        let Some(data) = self.active_data() else {
            return 0.0;
        };
        self.active_sequence(data)
            .get(self.frame)
            .map(|&(_, duration)| duration as f32 / TICK_RATE)
            .unwrap_or(0.0)
    }
}
