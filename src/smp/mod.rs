//! Security Manager Protocol: pairing state machine, PDU codec, and the
//! auto-downgrade ladder (C7, §3 `PairingData`, §4.7, §4.8).

mod ladder;
pub mod pdu;
mod state;

use bitflags::bitflags;

pub use ladder::DowngradeLadder;
pub use state::{PairingData, PairingSide};

/// Requested security level for a connection (§3 `sec_level_user`/
/// `sec_level_conn`, §4.8 downgrade ladder rungs).
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, PartialOrd, Ord, strum::Display)]
pub enum SecLevel {
    /// No value configured; the security registry / connection default
    /// applies (§9 "the registry only narrows, never widens").
    #[default]
    Unset,
    None,
    EncOnly,
    EncAuth,
    EncAuthFips,
}

/// IO capability, exchanged during feature exchange and used to derive the
/// [`PairingMode`] (§3 `io_cap_user`/`io_cap_conn`).
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, num_enum::IntoPrimitive, num_enum::FromPrimitive)]
#[repr(u8)]
pub enum IoCap {
    DisplayOnly = 0x00,
    DisplayYesNo = 0x01,
    KeyboardOnly = 0x02,
    #[default]
    NoInputNoOutput = 0x03,
    KeyboardDisplay = 0x04,
    /// Not a wire value; sentinel meaning "no value configured" (§3
    /// `io_cap_auto` "UNSET disables auto-ladder").
    #[num_enum(catch_all)]
    Unset(u8),
}

impl IoCap {
    #[must_use]
    pub const fn has_display(self) -> bool {
        matches!(self, Self::DisplayOnly | Self::DisplayYesNo | Self::KeyboardDisplay)
    }

    #[must_use]
    pub const fn has_yes_no(self) -> bool {
        matches!(self, Self::DisplayYesNo | Self::KeyboardDisplay)
    }

    #[must_use]
    pub const fn has_keyboard(self) -> bool {
        matches!(self, Self::KeyboardOnly | Self::KeyboardDisplay)
    }

    #[must_use]
    pub const fn is_unset(self) -> bool {
        matches!(self, Self::Unset(_))
    }
}

bitflags! {
    /// `AuthReq` octet exchanged in `Pairing Request`/`Pairing Response`
    /// ([Vol 3] Part H, Section 3.5.1).
    #[derive(Default)]
    pub struct AuthReq: u8 {
        const BONDING      = 0b0000_0001;
        const MITM         = 0b0000_0100;
        const SC           = 0b0000_1000;
        const KEYPRESS     = 0b0001_0000;
        const CT2          = 0b0010_0000;
    }
}

bitflags! {
    /// Key distribution / generation bitmask exchanged in `Pairing
    /// Request`/`Pairing Response` and used for `keys_init`/`keys_resp` and
    /// the completion invariant's expected/has masks (§3, §6.1).
    #[derive(Default)]
    pub struct KeyDist: u8 {
        const ENC_KEY  = 0b0001;
        const ID_KEY   = 0b0010;
        const SIGN_KEY = 0b0100;
        const LINK_KEY = 0b1000;
    }
}

/// Pairing association model, derived from the SC flag and both sides'
/// `AuthReq`/`IoCap`/OOB per the standard SMP table (§4.7 "Mode
/// derivation").
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum PairingMode {
    #[default]
    None,
    Negotiating,
    JustWorks,
    PasskeyEntryIni,
    PasskeyEntryResp,
    NumericCompareIni,
    NumericCompareResp,
    OutOfBand,
    PrePaired,
}

/// Pairing progress, §4.7's canonical state diagram.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum PairingState {
    #[default]
    None,
    RequestedByResponder,
    FeatureExchangeStarted,
    FeatureExchangeCompleted,
    PasskeyExpected,
    NumericCompareExpected,
    PasskeyNotify,
    OobExpected,
    KeyDistribution,
    Completed,
    Failed,
}

impl PairingState {
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// Derives the [`PairingMode`] from the SC flag and both sides' negotiated
/// `AuthReq`/`IoCap`/OOB flag (§4.7 "Mode derivation", standard Bluetooth
/// SMP table, [Vol 3] Part H, Section 2.3.5.1).
///
/// `initiator` is `true` when evaluating from the initiator's perspective
/// (selects `PasskeyEntryIni` vs `PasskeyEntryResp` etc).
#[must_use]
pub fn derive_mode(
    sc: bool,
    init_auth: AuthReq,
    resp_auth: AuthReq,
    init_io: IoCap,
    resp_io: IoCap,
    init_oob: bool,
    resp_oob: bool,
) -> PairingMode {
    if init_oob || resp_oob {
        return PairingMode::OutOfBand;
    }
    let mitm = init_auth.contains(AuthReq::MITM) || resp_auth.contains(AuthReq::MITM);
    if !mitm || init_io == IoCap::NoInputNoOutput || resp_io == IoCap::NoInputNoOutput {
        return PairingMode::JustWorks;
    }
    if sc && init_io.has_display() && init_io.has_yes_no() && resp_io.has_display() && resp_io.has_yes_no() {
        return PairingMode::NumericCompareIni;
    }
    // One side displays, the other has a keyboard: the side with the
    // keyboard enters the passkey the other side displays.
    if init_io.has_keyboard() && resp_io.has_display() {
        return PairingMode::PasskeyEntryIni;
    }
    if resp_io.has_keyboard() && init_io.has_display() {
        return PairingMode::PasskeyEntryResp;
    }
    if init_io.has_keyboard() && resp_io.has_keyboard() {
        return PairingMode::PasskeyEntryIni;
    }
    PairingMode::JustWorks
}

/// Expected key-distribution mask for a completed pairing (§3 completion
/// invariant): under SC, `LINK_KEY` is additionally expected (cross-transport
/// key derivation); under legacy it is not.
#[must_use]
pub fn expected_keys(sc: bool) -> KeyDist {
    let base = KeyDist::ENC_KEY | KeyDist::ID_KEY | KeyDist::SIGN_KEY;
    if sc {
        base | KeyDist::LINK_KEY
    } else {
        base
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn just_works_when_no_mitm_required() {
        let mode = derive_mode(
            false,
            AuthReq::BONDING,
            AuthReq::BONDING,
            IoCap::DisplayYesNo,
            IoCap::DisplayYesNo,
            false,
            false,
        );
        assert_eq!(mode, PairingMode::JustWorks);
    }

    #[test]
    fn numeric_compare_when_sc_and_both_display_yes_no() {
        let mode = derive_mode(
            true,
            AuthReq::MITM,
            AuthReq::MITM,
            IoCap::DisplayYesNo,
            IoCap::DisplayYesNo,
            false,
            false,
        );
        assert_eq!(mode, PairingMode::NumericCompareIni);
    }

    #[test]
    fn passkey_entry_when_keyboard_meets_display() {
        let mode = derive_mode(
            false,
            AuthReq::MITM,
            AuthReq::MITM,
            IoCap::KeyboardOnly,
            IoCap::DisplayOnly,
            false,
            false,
        );
        assert_eq!(mode, PairingMode::PasskeyEntryIni);
    }

    #[test]
    fn expected_keys_add_link_key_under_sc() {
        assert!(!expected_keys(false).contains(KeyDist::LINK_KEY));
        assert!(expected_keys(true).contains(KeyDist::LINK_KEY));
    }
}
