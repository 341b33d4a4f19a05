//! L2CAP ATT channel bring-up: security-level negotiation and the
//! ready-delay before GATT discovery (C8, §4.9, §4.10). The attribute
//! database itself (server logic, MTU exchange, notification fan-out) is an
//! external collaborator (§1 Non-goals); this module only decides *when*
//! the link is secure enough, and for how long to wait, before handing off.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::device::Device;
use crate::smp::{PairingState, SecLevel};

/// Computes the effective security level to apply before opening ATT (§4.9
/// step 1). The user's explicit request wins; otherwise, if the peer
/// signals interest in encryption, default up to `ENC_AUTH` (or
/// `ENC_AUTH_FIPS` if the local adapter is Secure Connections capable);
/// otherwise `NONE`.
#[must_use]
pub fn effective_sec_level(user: SecLevel, peer_likes_encryption: bool, adapter_sc_capable: bool) -> SecLevel {
    if user != SecLevel::Unset {
        return user;
    }
    if !peer_likes_encryption {
        return SecLevel::None;
    }
    if adapter_sc_capable {
        SecLevel::EncAuthFips
    } else {
        SecLevel::EncAuth
    }
}

/// Outcome of driving ATT bring-up to completion (§4.9 steps 3-5).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum BringUpOutcome {
    Ready,
    Failed,
    TimedOut,
}

/// Drives the security-wait portion of ATT bring-up (§4.9 steps 3-4): if
/// `sec_level` is `NONE` the channel is ready immediately; otherwise blocks
/// on the device's pairing condition variable for a terminal state within
/// `timeout`.
#[must_use]
pub fn await_security(device: &Arc<Device>, sec_level: SecLevel, timeout: Duration) -> BringUpOutcome {
    if sec_level == SecLevel::None {
        return BringUpOutcome::Ready;
    }
    let pd = device.wait_pairing_terminal(Instant::now() + timeout);
    match pd.state {
        PairingState::Completed => BringUpOutcome::Ready,
        PairingState::Failed => BringUpOutcome::Failed,
        _ => BringUpOutcome::TimedOut,
    }
}

/// Post-ready validation for the peripheral (server) role (§4.9
/// "post-ready validation"): if the local user required at least `floor`
/// but the link's negotiated level fell short, bring-up must fail even
/// though encryption did complete.
#[must_use]
pub fn validate_server_security(floor: SecLevel, negotiated: SecLevel) -> bool {
    floor == SecLevel::Unset || floor == SecLevel::None || negotiated >= floor
}

/// Ready-delay applied before triggering GATT discovery (§4.10): shorter
/// for a pre-paired reconnect, longer for a freshly completed pairing,
/// since the peer's GATT server needs more time to settle after a fresh
/// bond.
#[must_use]
pub fn ready_delay(is_pre_paired: bool, range: (Duration, Duration)) -> Duration {
    if is_pre_paired {
        range.0
    } else {
        range.1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_request_overrides_peer_signal() {
        assert_eq!(effective_sec_level(SecLevel::EncOnly, true, true), SecLevel::EncOnly);
    }

    #[test]
    fn defaults_to_fips_when_sc_capable() {
        assert_eq!(effective_sec_level(SecLevel::Unset, true, true), SecLevel::EncAuthFips);
        assert_eq!(effective_sec_level(SecLevel::Unset, true, false), SecLevel::EncAuth);
    }

    #[test]
    fn no_signal_means_no_security() {
        assert_eq!(effective_sec_level(SecLevel::Unset, false, true), SecLevel::None);
    }

    #[test]
    fn none_level_is_ready_without_waiting() {
        use crate::addr::{AddrType, AddressAndType, Eui48};
        let identity = AddressAndType::new(Eui48::new([1, 2, 3, 4, 5, 6]), AddrType::LePublic);
        let d = Arc::new(Device::new(identity, true));
        assert_eq!(await_security(&d, SecLevel::None, Duration::from_millis(1)), BringUpOutcome::Ready);
    }

    #[test]
    fn unmet_floor_fails_server_validation() {
        assert!(!validate_server_security(SecLevel::EncAuth, SecLevel::EncOnly));
        assert!(validate_server_security(SecLevel::EncAuth, SecLevel::EncAuthFips));
    }

    #[test]
    fn ready_delay_picks_pre_paired_side_of_range() {
        let range = (Duration::from_millis(100), Duration::from_millis(150));
        assert_eq!(ready_delay(true, range), Duration::from_millis(100));
        assert_eq!(ready_delay(false, range), Duration::from_millis(150));
    }
}
