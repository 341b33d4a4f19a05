//! SMP PDU codec ([Vol 3] Part H, Section 3). SMP PDUs ride on ACL via
//! L2CAP CID `0x0006` (§4.2 "SMP uses its own fixed CID").

use crate::error::{Error, Result};
use crate::octets::{Packer, Unpacker};

use super::{AuthReq, KeyDist};

/// Fixed L2CAP channel ID for SMP ([Vol 3] Part A, Section 2.1).
pub const SMP_CID: u16 = 0x0006;
/// Fixed L2CAP channel ID for ATT, used for security-level purposes by the
/// bring-up layer (§4.2).
pub const ATT_CID: u16 = 0x0004;

/// SMP command codes ([Vol 3] Part H, Section 3.3).
#[derive(Clone, Copy, Debug, Eq, PartialEq, num_enum::FromPrimitive, num_enum::IntoPrimitive)]
#[repr(u8)]
pub enum SmpCode {
    #[num_enum(default)]
    Unknown = 0x00,
    PairingRequest = 0x01,
    PairingResponse = 0x02,
    PairingConfirm = 0x03,
    PairingRandom = 0x04,
    PairingFailed = 0x05,
    EncryptionInformation = 0x06,
    MasterIdentification = 0x07,
    IdentityInformation = 0x08,
    IdentityAddressInformation = 0x09,
    SigningInformation = 0x0A,
    SecurityRequest = 0x0B,
    PairingPublicKey = 0x0C,
    PairingDhKeyCheck = 0x0D,
    PairingKeypressNotification = 0x0E,
}

/// `Pairing Request`/`Pairing Response` body ([Vol 3] Part H, Section
/// 3.5.1/3.5.2): identical layout for both PDUs.
#[derive(Clone, Copy, Debug)]
pub struct PairingFeatures {
    pub io_cap: u8,
    pub oob_present: bool,
    pub auth_req: AuthReq,
    pub max_enc_key_size: u8,
    pub init_key_dist: KeyDist,
    pub resp_key_dist: KeyDist,
}

impl PairingFeatures {
    #[must_use]
    pub fn encode(&self) -> [u8; 6] {
        [
            self.io_cap,
            u8::from(self.oob_present),
            self.auth_req.bits(),
            self.max_enc_key_size,
            self.init_key_dist.bits(),
            self.resp_key_dist.bits(),
        ]
    }

    #[must_use]
    pub fn decode(u: &mut Unpacker<'_>) -> Self {
        Self {
            io_cap: u.u8(),
            oob_present: u.u8() != 0,
            auth_req: AuthReq::from_bits_truncate(u.u8()),
            max_enc_key_size: u.u8(),
            init_key_dist: KeyDist::from_bits_truncate(u.u8()),
            resp_key_dist: KeyDist::from_bits_truncate(u.u8()),
        }
    }
}

/// One decoded SMP PDU (the on-wire inputs enumerated in §4.7).
#[derive(Clone, Debug)]
pub enum SmpPdu {
    PairingRequest(PairingFeatures),
    PairingResponse(PairingFeatures),
    PairingConfirm([u8; 16]),
    PairingRandom([u8; 16]),
    PairingFailed(u8),
    EncryptionInformation([u8; 16]),
    MasterIdentification { ediv: u16, rand: u64 },
    IdentityInformation([u8; 16]),
    IdentityAddressInformation { addr_type: u8, addr: [u8; 6] },
    SigningInformation([u8; 16]),
    SecurityRequest(AuthReq),
    PairingPublicKey([u8; 64]),
    PairingDhKeyCheck([u8; 16]),
    PairingKeypressNotification(u8),
}

impl SmpPdu {
    /// Encodes this PDU's SMP payload (opcode byte followed by parameters),
    /// ready to hand to the L2CAP layer for ACL framing on [`SMP_CID`].
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut p = Packer::with_capacity(32);
        match self {
            Self::PairingRequest(f) => {
                p.u8(SmpCode::PairingRequest.into()).put(&f.encode());
            }
            Self::PairingResponse(f) => {
                p.u8(SmpCode::PairingResponse.into()).put(&f.encode());
            }
            Self::PairingConfirm(v) => {
                p.u8(SmpCode::PairingConfirm.into()).put(v);
            }
            Self::PairingRandom(v) => {
                p.u8(SmpCode::PairingRandom.into()).put(v);
            }
            Self::PairingFailed(reason) => {
                p.u8(SmpCode::PairingFailed.into()).u8(*reason);
            }
            Self::EncryptionInformation(ltk) => {
                p.u8(SmpCode::EncryptionInformation.into()).put(ltk);
            }
            Self::MasterIdentification { ediv, rand } => {
                p.u8(SmpCode::MasterIdentification.into()).u16(*ediv).u64(*rand);
            }
            Self::IdentityInformation(irk) => {
                p.u8(SmpCode::IdentityInformation.into()).put(irk);
            }
            Self::IdentityAddressInformation { addr_type, addr } => {
                p.u8(SmpCode::IdentityAddressInformation.into()).u8(*addr_type).put(addr);
            }
            Self::SigningInformation(csrk) => {
                p.u8(SmpCode::SigningInformation.into()).put(csrk);
            }
            Self::SecurityRequest(auth_req) => {
                p.u8(SmpCode::SecurityRequest.into()).u8(auth_req.bits());
            }
            Self::PairingPublicKey(k) => {
                p.u8(SmpCode::PairingPublicKey.into()).put(k);
            }
            Self::PairingDhKeyCheck(v) => {
                p.u8(SmpCode::PairingDhKeyCheck.into()).put(v);
            }
            Self::PairingKeypressNotification(v) => {
                p.u8(SmpCode::PairingKeypressNotification.into()).u8(*v);
            }
        }
        p.into_vec()
    }

    /// Decodes one SMP PDU from an ACL payload already demultiplexed to
    /// [`SMP_CID`].
    pub fn decode(raw: &[u8]) -> Result<Self> {
        let mut u = Unpacker::new(raw);
        let code = SmpCode::from(u.u8());
        let pdu = match code {
            SmpCode::PairingRequest => Self::PairingRequest(PairingFeatures::decode(&mut u)),
            SmpCode::PairingResponse => Self::PairingResponse(PairingFeatures::decode(&mut u)),
            SmpCode::PairingConfirm => Self::PairingConfirm(u.bytes()),
            SmpCode::PairingRandom => Self::PairingRandom(u.bytes()),
            SmpCode::PairingFailed => Self::PairingFailed(u.u8()),
            SmpCode::EncryptionInformation => Self::EncryptionInformation(u.bytes()),
            SmpCode::MasterIdentification => Self::MasterIdentification { ediv: u.u16(), rand: u.u64() },
            SmpCode::IdentityInformation => Self::IdentityInformation(u.bytes()),
            SmpCode::IdentityAddressInformation => Self::IdentityAddressInformation {
                addr_type: u.u8(),
                addr: u.eui48(),
            },
            SmpCode::SigningInformation => Self::SigningInformation(u.bytes()),
            SmpCode::SecurityRequest => Self::SecurityRequest(AuthReq::from_bits_truncate(u.u8())),
            SmpCode::PairingPublicKey => Self::PairingPublicKey(u.bytes()),
            SmpCode::PairingDhKeyCheck => Self::PairingDhKeyCheck(u.bytes()),
            SmpCode::PairingKeypressNotification => Self::PairingKeypressNotification(u.u8()),
            SmpCode::Unknown => return Err(Error::Codec("unknown SMP opcode")),
        };
        if !u.is_ok() {
            return Err(Error::Codec("truncated SMP PDU"));
        }
        Ok(pdu)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pairing_request_round_trips() {
        let f = PairingFeatures {
            io_cap: 0x01,
            oob_present: false,
            auth_req: AuthReq::BONDING | AuthReq::MITM,
            max_enc_key_size: 16,
            init_key_dist: KeyDist::ENC_KEY | KeyDist::ID_KEY,
            resp_key_dist: KeyDist::ENC_KEY,
        };
        let encoded = SmpPdu::PairingRequest(f).encode();
        let decoded = SmpPdu::decode(&encoded).unwrap();
        match decoded {
            SmpPdu::PairingRequest(g) => {
                assert_eq!(g.io_cap, 0x01);
                assert_eq!(g.auth_req, AuthReq::BONDING | AuthReq::MITM);
                assert_eq!(g.max_enc_key_size, 16);
            }
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn pairing_failed_carries_reason() {
        let encoded = SmpPdu::PairingFailed(0x08).encode();
        assert_eq!(encoded, vec![0x05, 0x08]);
    }

    #[test]
    fn unknown_opcode_is_rejected() {
        assert!(SmpPdu::decode(&[0xFF]).is_err());
    }

    #[test]
    fn master_identification_round_trips() {
        let encoded = SmpPdu::MasterIdentification { ediv: 0x1234, rand: 0xDEAD_BEEF_0000_0001 }.encode();
        match SmpPdu::decode(&encoded).unwrap() {
            SmpPdu::MasterIdentification { ediv, rand } => {
                assert_eq!(ediv, 0x1234);
                assert_eq!(rand, 0xDEAD_BEEF_0000_0001);
            }
            _ => panic!("wrong variant"),
        }
    }
}
