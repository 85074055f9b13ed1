/// One-shot alert state stored as the `sent` flag of a param
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertState {
    Armed,
    Fired,
}

/// What a caller must do after feeding a condition into the state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Condition just became true: send the alert
    Fire,
    /// Condition cleared after firing: reset the flag
    Rearm,
    /// Nothing changes
    Hold,
}

impl AlertState {
    pub fn from_sent(sent: bool) -> Self {
        if sent {
            AlertState::Fired
        } else {
            AlertState::Armed
        }
    }

    pub fn is_sent(&self) -> bool {
        matches!(self, AlertState::Fired)
    }

    pub fn next(self, condition: bool) -> (AlertState, Transition) {
        match (self, condition) {
            (AlertState::Armed, true) => (AlertState::Fired, Transition::Fire),
            (AlertState::Fired, false) => (AlertState::Armed, Transition::Rearm),
            (state, _) => (state, Transition::Hold),
        }
    }
}
