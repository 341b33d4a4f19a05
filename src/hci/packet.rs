//! HCI packet framing (§4.2, §6.2). The kernel HCI socket carries packets
//! prefixed with a one-byte packet-type indicator (`H4`-style framing); the
//! user-space filter only ever sees `EVENT` and `ACLDATA` packets on the
//! read side and emits `COMMAND` packets on the write side.

use crate::error::{Error, Result};
use crate::octets::{Packer, Unpacker};

/// HCI command header and buffer sizes ([Vol 4] Part E, Section 5.4.1).
pub const CMD_HDR: usize = 3;
pub const CMD_BUF: usize = CMD_HDR + u8::MAX as usize;

/// HCI ACL data header and buffer sizes ([Vol 4] Part E, Section 5.4.2).
pub const ACL_HDR: usize = 4;

/// HCI event header and buffer sizes ([Vol 4] Part E, Section 5.4.4).
pub const EVT_HDR: usize = 2;
pub const EVT_BUF: usize = EVT_HDR + u8::MAX as usize;

/// The one-byte packet-type indicator prefixing every HCI packet on the
/// socket (§6.2).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[repr(u8)]
pub enum PacketType {
    Command = 0x01,
    AclData = 0x02,
    ScoData = 0x03,
    Event = 0x04,
}

impl PacketType {
    #[must_use]
    pub const fn from_byte(b: u8) -> Option<Self> {
        match b {
            0x01 => Some(Self::Command),
            0x02 => Some(Self::AclData),
            0x03 => Some(Self::ScoData),
            0x04 => Some(Self::Event),
            _ => None,
        }
    }
}

/// Encodes a `COMMAND` packet: `[0x01][opcode:2][param_len:1][params]`.
#[must_use]
pub fn encode_command(opcode: u16, params: &[u8]) -> Vec<u8> {
    debug_assert!(params.len() <= u8::MAX as usize);
    let mut p = Packer::with_capacity(1 + CMD_HDR + params.len());
    p.u8(PacketType::Command as u8);
    p.u16(opcode);
    #[allow(clippy::cast_possible_truncation)]
    p.u8(params.len() as u8);
    p.put(params);
    p.into_vec()
}

/// Encodes an `ACLDATA` packet: `[0x02][handle+flags:2][len:2][payload]`.
#[must_use]
pub fn encode_acl(handle: u16, flags: u8, payload: &[u8]) -> Vec<u8> {
    let handle_flags = (handle & 0x0FFF) | (u16::from(flags) << 12);
    let mut p = Packer::with_capacity(1 + ACL_HDR + payload.len());
    p.u8(PacketType::AclData as u8);
    p.u16(handle_flags);
    #[allow(clippy::cast_possible_truncation)]
    p.u16(payload.len() as u16);
    p.put(payload);
    p.into_vec()
}

/// One ACL data fragment decoded from the wire, prior to L2CAP
/// reassembly.
#[derive(Clone, Copy, Debug)]
pub struct AclFragment<'a> {
    pub handle: u16,
    /// Packet-boundary flags (bits 12-13 of `handle_flags`).
    pub pb: u8,
    /// Broadcast flag (bits 14-15).
    pub bc: u8,
    pub payload: &'a [u8],
}

/// Parses the packet-type byte and dispatches the remaining bytes to either
/// [`Event`](super::Event) or [`AclFragment`] decoding.
pub fn parse_acl(buf: &[u8]) -> Result<AclFragment<'_>> {
    let mut u = Unpacker::new(buf);
    let handle_flags = u.u16();
    let len = u.u16();
    let payload = u.raw(usize::from(len));
    if !u.is_ok() {
        return Err(Error::Codec("truncated ACL packet"));
    }
    Ok(AclFragment {
        handle: handle_flags & 0x0FFF,
        pb: ((handle_flags >> 12) & 0x3) as u8,
        bc: ((handle_flags >> 14) & 0x3) as u8,
        payload,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_command_has_expected_header() {
        let pkt = encode_command(0x0C03, &[1, 2, 3]);
        assert_eq!(pkt[0], PacketType::Command as u8);
        assert_eq!(&pkt[1..3], &0x0C03u16.to_le_bytes());
        assert_eq!(pkt[3], 3);
        assert_eq!(&pkt[4..], &[1, 2, 3]);
    }

    #[test]
    fn parse_acl_extracts_handle_and_flags() {
        let pkt = encode_acl(0x0040, 0b10, &[9, 9]);
        let frag = parse_acl(&pkt[1..]).unwrap();
        assert_eq!(frag.handle, 0x0040);
        assert_eq!(frag.pb, 0b10);
        assert_eq!(frag.payload, &[9, 9]);
    }
}
