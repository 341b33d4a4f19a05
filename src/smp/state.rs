//! Per-device SMP pairing progress (§3 `PairingData`, §4.7 state diagram).
//! Pure state machine: callers feed it PDU and management-event inputs and
//! read back what to do (key store writes, replies to send); no I/O lives
//! here.

use crate::addr::AddressAndType;

use super::pdu::{PairingFeatures, SmpPdu};
use super::{derive_mode, expected_keys, AuthReq, IoCap, KeyDist, PairingMode, PairingState, SecLevel};

/// Per-side (initiator or responder) negotiated features and captured keys
/// (§3 "Per-side records").
#[derive(Clone, Debug, Default)]
pub struct PairingSide {
    pub auth_req: AuthReq,
    pub io_cap: IoCap,
    pub oob: bool,
    pub max_enc_size: u8,
    pub keys_expected: KeyDist,
    pub keys_have: KeyDist,
    pub ltk: Option<[u8; 16]>,
    pub ediv: u16,
    pub rand: u64,
    pub irk: Option<[u8; 16]>,
    pub csrk: Option<[u8; 16]>,
    pub link_key: Option<[u8; 16]>,
    pub identity_address: Option<AddressAndType>,
}

impl PairingSide {
    fn apply_features(&mut self, f: &PairingFeatures, is_initiator_side: bool) {
        self.auth_req = f.auth_req;
        self.io_cap = IoCap::from(f.io_cap);
        self.oob = f.oob_present;
        self.max_enc_size = f.max_enc_key_size;
        self.keys_expected = if is_initiator_side { f.init_key_dist } else { f.resp_key_dist };
    }

    /// Sets `ltk` only if not already held (§4.7 "A held key is never
    /// overwritten").
    fn set_ltk(&mut self, ltk: [u8; 16]) {
        if self.ltk.is_none() {
            self.ltk = Some(ltk);
            self.keys_have |= KeyDist::ENC_KEY;
        }
    }

    fn set_irk(&mut self, irk: [u8; 16]) {
        if self.irk.is_none() {
            self.irk = Some(irk);
            self.keys_have |= KeyDist::ID_KEY;
        }
    }

    fn set_csrk(&mut self, csrk: [u8; 16]) {
        if self.csrk.is_none() {
            self.csrk = Some(csrk);
            self.keys_have |= KeyDist::SIGN_KEY;
        }
    }

    fn set_link_key(&mut self, key: [u8; 16]) {
        if self.link_key.is_none() {
            self.link_key = Some(key);
            self.keys_have |= KeyDist::LINK_KEY;
        }
    }

    fn keys_satisfied(&self) -> bool {
        self.keys_have.contains(self.keys_expected)
    }
}

/// A non-PDU input to the state machine, drawn from the management event
/// vocabulary listed in §4.7.
#[derive(Clone, Copy, Debug)]
pub enum SmpEvent {
    UserConfirmRequest,
    UserPasskeyRequest,
    PasskeyNotify(u32),
    EncryptionChanged(bool),
    EncryptionKeyRefresh,
    AuthFailed,
    /// `NEW_LONG_TERM_KEY` delivered by the kernel mgmt channel, mirrored to
    /// both sides under SC (§4.7 "Key capture rules").
    NewLongTermKey([u8; 16]),
    NewLinkKey([u8; 16]),
    /// HCI reported encryption established without any preceding SMP PDU:
    /// pre-paired or already-paired reuse (§4.11, §4.7 "any" transition).
    PrePairedEncryption,
    DeviceUnpaired,
}

/// Full per-remote pairing state (§3 `PairingData`), owned by the remote's
/// `Device`.
#[derive(Clone, Debug, Default)]
pub struct PairingData {
    pub sec_level_user: SecLevel,
    pub io_cap_user: IoCap,
    pub io_cap_auto: IoCap,
    pub sec_level_conn: SecLevel,
    pub io_cap_conn: IoCap,
    pub mode: PairingMode,
    pub state: PairingState,
    pub initiator: PairingSide,
    pub responder: PairingSide,
    pub use_sc: bool,
    pub encryption_enabled: bool,
    pub is_pre_paired: bool,
    pub res_requested_sec: bool,
    /// Whether the local side is the pairing initiator (usually, but not
    /// necessarily, the link-layer Master — §3, §9 glossary).
    pub is_local_initiator: bool,
    pub passkey: Option<u32>,
    /// Bumped on every SMP-relevant input; the adapter watchdog compares
    /// this against its last-seen value (§4.7 "Watchdog").
    pub smp_events: u64,
}

impl PairingData {
    #[must_use]
    pub fn new(is_local_initiator: bool) -> Self {
        Self {
            is_local_initiator,
            ..Self::default()
        }
    }

    /// Returns whether the completion invariant (§3, I2) currently holds.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.state == PairingState::Completed
            && self.encryption_enabled
            && self.initiator.keys_satisfied()
            && self.responder.keys_satisfied()
    }

    fn maybe_complete(&mut self) {
        if self.state == PairingState::KeyDistribution
            && self.encryption_enabled
            && self.initiator.keys_satisfied()
            && self.responder.keys_satisfied()
        {
            self.state = PairingState::Completed;
        }
    }

    fn bump(&mut self) {
        self.smp_events += 1;
    }

    /// Derives `sec_level_conn`/`io_cap_conn` once feature exchange settles
    /// the pairing mode (§3 "negotiated security level", §6.1 security
    /// levels): SC plus an authenticated association model reaches
    /// `EncAuthFips`; legacy plus authenticated reaches `EncAuth`; anything
    /// Just Works or Out-of-Band stays at `EncOnly` regardless of transport.
    fn negotiate_sec_level(&mut self) {
        let authenticated = matches!(
            self.mode,
            PairingMode::NumericCompareIni
                | PairingMode::NumericCompareResp
                | PairingMode::PasskeyEntryIni
                | PairingMode::PasskeyEntryResp
        );
        self.sec_level_conn = match (self.use_sc, authenticated) {
            (true, true) => SecLevel::EncAuthFips,
            (false, true) => SecLevel::EncAuth,
            (_, false) => SecLevel::EncOnly,
        };
        self.io_cap_conn = if self.is_local_initiator { self.responder.io_cap } else { self.initiator.io_cap };
    }

    /// Feeds one SMP PDU into the state machine (§4.7 canonical transitions).
    /// `from_initiator` is whether the PDU arrived from the pairing
    /// initiator (so that initiator-side records update from a
    /// `PairingRequest` and responder-side from a `PairingResponse`, as
    /// prescribed by the on-wire roles rather than link role).
    pub fn on_pdu(&mut self, pdu: &SmpPdu) {
        if self.state == PairingState::Failed {
            return;
        }
        self.bump();
        match pdu {
            SmpPdu::SecurityRequest(_) => {
                if self.state == PairingState::None {
                    self.state = PairingState::RequestedByResponder;
                }
            }
            SmpPdu::PairingRequest(f) => {
                self.initiator.apply_features(f, true);
                if matches!(self.state, PairingState::None | PairingState::RequestedByResponder) {
                    self.state = PairingState::FeatureExchangeStarted;
                }
            }
            SmpPdu::PairingResponse(f) => {
                self.responder.apply_features(f, false);
                if self.state == PairingState::FeatureExchangeStarted {
                    self.use_sc = self.initiator.auth_req.contains(AuthReq::SC) && self.responder.auth_req.contains(AuthReq::SC);
                    self.mode = derive_mode(
                        self.use_sc,
                        self.initiator.auth_req,
                        self.responder.auth_req,
                        self.initiator.io_cap,
                        self.responder.io_cap,
                        self.initiator.oob,
                        self.responder.oob,
                    );
                    self.initiator.keys_expected = expected_keys(self.use_sc) & self.initiator.keys_expected;
                    self.responder.keys_expected = expected_keys(self.use_sc) & self.responder.keys_expected;
                    self.negotiate_sec_level();
                    self.state = PairingState::FeatureExchangeCompleted;
                }
            }
            SmpPdu::PairingFailed(_) => {
                self.state = PairingState::Failed;
            }
            SmpPdu::PairingConfirm(_) | SmpPdu::PairingPublicKey(_) | SmpPdu::PairingRandom(_) | SmpPdu::PairingDhKeyCheck(_) => {
                if self.state == PairingState::FeatureExchangeCompleted
                    || self.state == PairingState::NumericCompareExpected
                    || self.state == PairingState::PasskeyExpected
                    || self.state == PairingState::OobExpected
                {
                    self.state = PairingState::KeyDistribution;
                }
            }
            SmpPdu::EncryptionInformation(ltk) => self.capture_enc_key(*ltk),
            SmpPdu::MasterIdentification { ediv, rand } => self.capture_master_id(*ediv, *rand),
            SmpPdu::IdentityInformation(irk) => self.capture_irk(*irk),
            SmpPdu::IdentityAddressInformation { addr_type, addr } => {
                self.capture_identity_address(*addr_type, *addr);
            }
            SmpPdu::SigningInformation(csrk) => self.capture_csrk(*csrk),
            SmpPdu::PairingKeypressNotification(_) => {}
        }
        self.maybe_complete();
    }

    /// The side that should capture a key PDU not carrying an explicit
    /// direction marker: legacy distribution always comes from whichever
    /// side is currently sending its key-distribution phase, which in this
    /// simplified model is tracked by `is_local_initiator`'s peer — i.e. we
    /// capture into the remote side's record.
    fn remote_side_mut(&mut self) -> &mut PairingSide {
        if self.is_local_initiator {
            &mut self.responder
        } else {
            &mut self.initiator
        }
    }

    fn capture_enc_key(&mut self, ltk: [u8; 16]) {
        self.remote_side_mut().set_ltk(ltk);
    }

    fn capture_master_id(&mut self, ediv: u16, rand: u64) {
        let side = self.remote_side_mut();
        side.ediv = ediv;
        side.rand = rand;
    }

    fn capture_irk(&mut self, irk: [u8; 16]) {
        self.remote_side_mut().set_irk(irk);
    }

    fn capture_csrk(&mut self, csrk: [u8; 16]) {
        self.remote_side_mut().set_csrk(csrk);
    }

    /// Resolves a resolvable-private identity to its stable address (§9
    /// open question: "must preserve" the `deviceUpdated` notification;
    /// the glue layer in `device.rs` is responsible for emitting it).
    fn capture_identity_address(&mut self, addr_type: u8, addr: [u8; 6]) {
        use crate::addr::{AddrType, Eui48};
        let at = match addr_type {
            0x01 => AddrType::LeRandom,
            _ => AddrType::LePublic,
        };
        self.remote_side_mut().identity_address = Some(AddressAndType::new(Eui48::new(addr), at));
    }

    /// Feeds one non-PDU input (management-event-sourced) into the state
    /// machine (§4.7).
    pub fn on_event(&mut self, ev: SmpEvent) {
        if self.state == PairingState::Failed && !matches!(ev, SmpEvent::DeviceUnpaired) {
            return;
        }
        self.bump();
        match ev {
            SmpEvent::UserConfirmRequest => {
                if self.state == PairingState::FeatureExchangeCompleted {
                    self.state = PairingState::NumericCompareExpected;
                }
            }
            SmpEvent::UserPasskeyRequest => {
                if self.state == PairingState::FeatureExchangeCompleted {
                    self.state = PairingState::PasskeyExpected;
                }
            }
            SmpEvent::PasskeyNotify(v) => {
                self.passkey = Some(v);
                if self.state == PairingState::FeatureExchangeCompleted {
                    self.state = PairingState::PasskeyNotify;
                }
            }
            SmpEvent::EncryptionChanged(enabled) => {
                self.encryption_enabled = enabled;
                self.maybe_complete();
            }
            SmpEvent::EncryptionKeyRefresh => {
                self.encryption_enabled = true;
                self.maybe_complete();
            }
            SmpEvent::AuthFailed => {
                self.state = PairingState::Failed;
            }
            SmpEvent::NewLongTermKey(ltk) => {
                // Under SC the encryption key is mirrored to both sides
                // (§4.7 "Key capture rules"); under legacy only the remote
                // side's slot is populated, matching the PDU-sourced path.
                if self.use_sc {
                    self.initiator.set_ltk(ltk);
                    self.responder.set_ltk(ltk);
                } else {
                    self.remote_side_mut().set_ltk(ltk);
                }
                self.maybe_complete();
            }
            SmpEvent::NewLinkKey(key) => {
                self.initiator.set_link_key(key);
                self.responder.set_link_key(key);
                self.maybe_complete();
            }
            SmpEvent::PrePairedEncryption => {
                self.mode = PairingMode::PrePaired;
                self.is_pre_paired = true;
                self.encryption_enabled = true;
                self.state = PairingState::Completed;
            }
            SmpEvent::DeviceUnpaired => {
                self.clear(false);
            }
        }
    }

    /// Resets all pairing progress. Only valid while not connected (§3
    /// monotonicity invariant, I3): callers must ensure `connected` is
    /// false before calling, or the reset is itself the bug the invariant
    /// guards against.
    pub fn clear(&mut self, connected: bool) {
        if connected {
            return;
        }
        let keep_user = (self.sec_level_user, self.io_cap_user, self.io_cap_auto);
        *self = Self {
            is_local_initiator: self.is_local_initiator,
            ..Self::default()
        };
        (self.sec_level_user, self.io_cap_user, self.io_cap_auto) = keep_user;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::smp::pdu::PairingFeatures;

    fn features(auth: AuthReq, io: IoCap) -> PairingFeatures {
        PairingFeatures {
            io_cap: io.into(),
            oob_present: false,
            auth_req: auth,
            max_enc_key_size: 16,
            init_key_dist: KeyDist::ENC_KEY | KeyDist::ID_KEY | KeyDist::SIGN_KEY,
            resp_key_dist: KeyDist::ENC_KEY | KeyDist::ID_KEY | KeyDist::SIGN_KEY,
        }
    }

    #[test]
    fn feature_exchange_then_key_distribution_then_completed() {
        let mut pd = PairingData::new(true);
        pd.on_pdu(&SmpPdu::PairingRequest(features(AuthReq::BONDING, IoCap::NoInputNoOutput)));
        assert_eq!(pd.state, PairingState::FeatureExchangeStarted);
        pd.on_pdu(&SmpPdu::PairingResponse(features(AuthReq::BONDING, IoCap::NoInputNoOutput)));
        assert_eq!(pd.state, PairingState::FeatureExchangeCompleted);
        assert_eq!(pd.mode, PairingMode::JustWorks);

        pd.on_pdu(&SmpPdu::PairingConfirm([0; 16]));
        assert_eq!(pd.state, PairingState::KeyDistribution);

        pd.on_pdu(&SmpPdu::EncryptionInformation([1; 16]));
        pd.on_pdu(&SmpPdu::MasterIdentification { ediv: 1, rand: 2 });
        pd.on_pdu(&SmpPdu::IdentityInformation([2; 16]));
        pd.on_pdu(&SmpPdu::SigningInformation([3; 16]));
        assert_eq!(pd.state, PairingState::KeyDistribution); // not yet: encryption not enabled

        pd.on_event(SmpEvent::EncryptionChanged(true));
        assert_eq!(pd.state, PairingState::Completed);
        assert!(pd.is_complete());
    }

    #[test]
    fn failed_is_absorbing_until_cleared() {
        let mut pd = PairingData::new(true);
        pd.on_event(SmpEvent::AuthFailed);
        assert_eq!(pd.state, PairingState::Failed);
        pd.on_pdu(&SmpPdu::PairingRequest(features(AuthReq::BONDING, IoCap::NoInputNoOutput)));
        assert_eq!(pd.state, PairingState::Failed);
        pd.clear(false);
        assert_eq!(pd.state, PairingState::None);
    }

    #[test]
    fn clear_is_refused_while_connected() {
        let mut pd = PairingData::new(true);
        pd.on_event(SmpEvent::AuthFailed);
        pd.clear(true);
        assert_eq!(pd.state, PairingState::Failed);
    }

    #[test]
    fn key_slot_never_overwritten() {
        let mut pd = PairingData::new(true);
        pd.on_pdu(&SmpPdu::EncryptionInformation([1; 16]));
        pd.on_pdu(&SmpPdu::EncryptionInformation([2; 16]));
        assert_eq!(pd.responder.ltk, Some([1; 16]));
    }

    #[test]
    fn pre_paired_reuse_completes_without_pdus() {
        let mut pd = PairingData::new(true);
        pd.on_event(SmpEvent::PrePairedEncryption);
        assert_eq!(pd.mode, PairingMode::PrePaired);
        assert_eq!(pd.state, PairingState::Completed);
        assert!(pd.is_pre_paired);
    }

    #[test]
    fn sc_mirrors_ltk_to_both_sides() {
        let mut pd = PairingData::new(true);
        pd.use_sc = true;
        pd.on_event(SmpEvent::NewLongTermKey([9; 16]));
        assert_eq!(pd.initiator.ltk, Some([9; 16]));
        assert_eq!(pd.responder.ltk, Some([9; 16]));
    }
}
