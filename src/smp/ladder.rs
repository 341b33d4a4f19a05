//! Auto-downgrade ladder (§4.8): a fixed sequence of decreasing security
//! demands attempted in turn when the peer rejects a stronger one.

use super::{IoCap, SecLevel};

/// One rung: the security level and IO capability to request for this
/// attempt.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Rung {
    pub sec_level: SecLevel,
    pub io_cap: IoCap,
}

/// Stepper over the ladder's four rungs (§4.8). Owns no connection state;
/// the caller (`Device::connect_le`) drives `LE_CREATE_CONN` attempts and
/// feeds back whether each rung reached `COMPLETED` or `FAILED`.
#[derive(Clone, Copy, Debug)]
pub struct DowngradeLadder {
    user_io_cap: IoCap,
    rung: u8,
    exhausted: bool,
}

const RUNG_COUNT: u8 = 4;

impl DowngradeLadder {
    /// Starts a new ladder. `user_io_cap` is substituted into the first two
    /// rungs, which retain the caller's chosen IO capability; the last two
    /// rungs always downgrade to `NO_INPUT_NO_OUTPUT` (§4.8).
    #[must_use]
    pub const fn new(user_io_cap: IoCap) -> Self {
        Self {
            user_io_cap,
            rung: 0,
            exhausted: false,
        }
    }

    /// Returns the current rung to attempt, or `None` if the ladder is
    /// exhausted.
    #[must_use]
    pub fn current(&self) -> Option<Rung> {
        if self.exhausted {
            return None;
        }
        let (sec_level, io_cap) = match self.rung {
            0 => (SecLevel::EncAuthFips, self.user_io_cap),
            1 => (SecLevel::EncAuth, self.user_io_cap),
            2 => (SecLevel::EncOnly, IoCap::NoInputNoOutput),
            3 => (SecLevel::None, IoCap::NoInputNoOutput),
            _ => return None,
        };
        Some(Rung { sec_level, io_cap })
    }

    /// Returns whether the current rung is the terminal one (§4.8 "NONE,
    /// NO_INPUT_NO_OUTPUT (terminal)").
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.rung + 1 >= RUNG_COUNT
    }

    /// Advances to the next rung after the current one failed. Returns
    /// `false` once the ladder is exhausted.
    pub fn advance(&mut self) -> bool {
        if self.exhausted || self.is_terminal() {
            self.exhausted = true;
            return false;
        }
        self.rung += 1;
        true
    }

    /// Whether a connect/disconnect cycle for the current rung should be
    /// suppressed from application-visible listeners (§4.8: "Intermediate
    /// deviceConnected/deviceDisconnected emissions during ladder
    /// iterations are suppressed").
    #[must_use]
    pub fn suppress_intermediate_events(&self) -> bool {
        !self.exhausted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn four_rungs_in_order() {
        let mut ladder = DowngradeLadder::new(IoCap::KeyboardDisplay);
        assert_eq!(
            ladder.current(),
            Some(Rung { sec_level: SecLevel::EncAuthFips, io_cap: IoCap::KeyboardDisplay })
        );
        assert!(ladder.advance());
        assert_eq!(
            ladder.current(),
            Some(Rung { sec_level: SecLevel::EncAuth, io_cap: IoCap::KeyboardDisplay })
        );
        assert!(ladder.advance());
        assert_eq!(
            ladder.current(),
            Some(Rung { sec_level: SecLevel::EncOnly, io_cap: IoCap::NoInputNoOutput })
        );
        assert!(ladder.is_terminal() == false);
        assert!(ladder.advance());
        assert_eq!(
            ladder.current(),
            Some(Rung { sec_level: SecLevel::None, io_cap: IoCap::NoInputNoOutput })
        );
        assert!(ladder.is_terminal());
        assert!(!ladder.advance());
        assert_eq!(ladder.current(), None);
    }
}
