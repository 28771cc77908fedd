//! Room-change sequencing state.
//!
//! The actual teardown/swap work happens in the game context's tick; this
//! tracks which leg of the sequence is in flight and guards against a second
//! load request arriving mid-transition, which is rejected outright.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionPhase {
    Idle,
    FadingOut,
    Swapping,
    FadingIn,
}

#[derive(Debug)]
pub struct RoomTransition {
    pub phase: TransitionPhase,
    pub target: Option<String>,
    /// Entrance node to start once the fade-in has begun.
    pub pending_entrance: Option<String>,
    /// The very first room of a session skips the fade-out; the screen is
    /// already covered.
    pub first_room_done: bool,
}

impl Default for RoomTransition {
    fn default() -> Self {
        RoomTransition {
            phase: TransitionPhase::Idle,
            target: None,
            pending_entrance: None,
            first_room_done: false,
        }
    }
}

impl RoomTransition {
    pub fn new() -> Self {
        RoomTransition::default()
    }

    pub fn busy(&self) -> bool {
        self.phase != TransitionPhase::Idle
    }

    /// Accepts a load request unless one is already running.
    pub fn request(&mut self, room_id: &str) -> bool {
        if self.busy() {
            return false;
        }
        self.target = Some(room_id.to_string());
        self.phase = if self.first_room_done {
            TransitionPhase::FadingOut
        } else {
            TransitionPhase::Swapping
        };
        true
    }
}

#[cfg(test)]
mod tests {
    use super::{RoomTransition, TransitionPhase};

    #[test]
    fn first_request_skips_the_fade_out() {
        let mut transition = RoomTransition::new();
        assert!(transition.request("office"));
        assert_eq!(transition.phase, TransitionPhase::Swapping);
        assert_eq!(transition.target.as_deref(), Some("office"));
    }

    #[test]
    fn later_requests_fade_out_first() {
        let mut transition = RoomTransition::new();
        transition.first_room_done = true;
        assert!(transition.request("lobby"));
        assert_eq!(transition.phase, TransitionPhase::FadingOut);
    }

    #[test]
    fn overlapping_requests_are_rejected() {
        let mut transition = RoomTransition::new();
        assert!(transition.request("office"));
        assert!(!transition.request("lobby"));
        assert_eq!(transition.target.as_deref(), Some("office"));
    }
}
