//! The player action state stack.
//!
//! At any moment the player is in exactly one action state (top of stack);
//! the states beneath it record where "back" leads. Misuse (pushing the
//! `Null` sentinel, popping an empty stack) is a caller bug: it is reported
//! as a typed error and leaves the stack untouched.

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionState {
    Null,
    RoomOptions,
    RoomTalk,
    RoomInvestigate,
    RoomTravel,
    Items,
    Dialogue,
    DialogueChoice,
    DialoguePresent,
}

impl ActionState {
    pub fn label(self) -> &'static str {
        match self {
            ActionState::Null => "null",
            ActionState::RoomOptions => "room_options",
            ActionState::RoomTalk => "room_talk",
            ActionState::RoomInvestigate => "room_investigate",
            ActionState::RoomTravel => "room_travel",
            ActionState::Items => "items",
            ActionState::Dialogue => "dialogue",
            ActionState::DialogueChoice => "dialogue_choice",
            ActionState::DialoguePresent => "dialogue_present",
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StateError {
    #[error("the null state cannot be pushed")]
    PushNull,
    #[error("pop on an empty state stack")]
    Underflow,
}

/// Reported to the UI layer after every push, pop, or forced replacement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateTransition {
    pub new: ActionState,
    pub old: ActionState,
}

#[derive(Debug, Default)]
pub struct ActionStack {
    states: Vec<ActionState>,
}

impl ActionStack {
    pub fn new() -> Self {
        ActionStack::default()
    }

    pub fn peek(&self) -> ActionState {
        self.states.last().copied().unwrap_or(ActionState::Null)
    }

    pub fn depth(&self) -> usize {
        self.states.len()
    }

    pub fn push(&mut self, state: ActionState) -> Result<StateTransition, StateError> {
        if state == ActionState::Null {
            return Err(StateError::PushNull);
        }
        let old = self.peek();
        self.states.push(state);
        Ok(StateTransition { new: state, old })
    }

    pub fn pop(&mut self) -> Result<StateTransition, StateError> {
        let old = self.states.pop().ok_or(StateError::Underflow)?;
        Ok(StateTransition {
            new: self.peek(),
            old,
        })
    }

    /// Replaces the whole stack with `states`. Intermediate states are set up
    /// silently; only the final state yields a transition, so a room can be
    /// entered already mid-dialogue without flickering through the states
    /// underneath.
    pub fn force_state(&mut self, states: &[ActionState]) -> Option<StateTransition> {
        let old = self.peek();
        self.states.clear();
        self.states
            .extend(states.iter().copied().filter(|s| *s != ActionState::Null));
        let new = self.peek();
        if new == ActionState::Null {
            return None;
        }
        Some(StateTransition { new, old })
    }

    pub fn contains(&self, state: ActionState) -> bool {
        self.states.contains(&state)
    }
}
