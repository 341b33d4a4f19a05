//! Synchronous HCI command encoders (§4.2, §4.5-§4.8, §6.3). Each function
//! builds the parameter bytes for one command; [`super::transport`] wraps
//! them with [`super::packet::encode_command`] and handles the
//! command/reply correlation.

use crate::addr::{AddrType, Eui48};
use crate::octets::Packer;

use super::{AdvAddrType, AdvChanMap, AdvFilterPolicy, ConnHandle, EventMask, Opcode};

/// One encoded command: opcode plus parameter bytes, ready for
/// [`super::packet::encode_command`].
#[derive(Clone, Debug)]
pub struct Command {
    pub opcode: Opcode,
    pub params: Vec<u8>,
}

impl Command {
    fn new(opcode: Opcode, params: Vec<u8>) -> Self {
        Self { opcode, params }
    }

    fn build(opcode: Opcode, f: impl FnOnce(&mut Packer)) -> Self {
        let mut p = Packer::with_capacity(16);
        f(&mut p);
        Self::new(opcode, p.into_vec())
    }
}

fn put_addr(p: &mut Packer, addr: Eui48) {
    // Wire order is little-endian (least significant octet first); our
    // `Eui48` stores display order (most significant first).
    let mut octets = addr.0;
    octets.reverse();
    p.put(&octets);
}

/// `HCI_Reset` ([Vol 4] Part E, Section 7.3.2).
#[must_use]
pub fn reset() -> Command {
    Command::new(Opcode::Reset, Vec::new())
}

/// `HCI_Set_Event_Mask` ([Vol 4] Part E, Section 7.3.1).
#[must_use]
pub fn set_event_mask(mask: &EventMask) -> Command {
    Command::build(Opcode::SetEventMask, |p| {
        p.u64(mask.page1());
    })
}

/// `HCI_Set_Event_Mask_Page_2` ([Vol 4] Part E, Section 7.3.69).
#[must_use]
pub fn set_event_mask_page_2(mask: &EventMask) -> Command {
    Command::build(Opcode::SetEventMaskPage2, |p| {
        p.u64(mask.page2());
    })
}

/// `HCI_LE_Set_Event_Mask` ([Vol 4] Part E, Section 7.8.1).
#[must_use]
pub fn le_set_event_mask(mask: &EventMask) -> Command {
    Command::build(Opcode::LeSetEventMask, |p| {
        p.u64(mask.le());
    })
}

/// `HCI_Write_LE_Host_Support` ([Vol 4] Part E, Section 7.3.79).
#[must_use]
pub fn write_le_host_support(enable: bool) -> Command {
    Command::build(Opcode::WriteLeHostSupport, |p| {
        p.u8(u8::from(enable)).u8(0);
    })
}

/// `HCI_LE_Set_Random_Address` ([Vol 4] Part E, Section 7.8.4).
#[must_use]
pub fn le_set_random_address(addr: Eui48) -> Command {
    Command::build(Opcode::LeSetRandomAddress, |p| put_addr(p, addr))
}

/// `HCI_LE_Set_Scan_Parameters` ([Vol 4] Part E, Section 7.8.10). `interval`
/// and `window` are in 0.625 ms units (§6.3: range `[4, 0x4000]`).
#[must_use]
pub fn le_set_scan_parameters(active: bool, interval: u16, window: u16, own_addr_type: AdvAddrType, filter_policy: AdvFilterPolicy) -> Command {
    Command::build(Opcode::LeSetScanParameters, |p| {
        p.u8(u8::from(active))
            .u16(interval)
            .u16(window)
            .u8(own_addr_type.into())
            .u8(filter_policy.into());
    })
}

/// `HCI_LE_Set_Scan_Enable` ([Vol 4] Part E, Section 7.8.11).
#[must_use]
pub fn le_set_scan_enable(enable: bool, filter_duplicates: bool) -> Command {
    Command::build(Opcode::LeSetScanEnable, |p| {
        p.u8(u8::from(enable)).u8(u8::from(filter_duplicates));
    })
}

/// `HCI_LE_Create_Connection` ([Vol 4] Part E, Section 7.8.12). Interval and
/// window are 0.625 ms units, `conn_interval_*` are 1.25 ms units,
/// `supervision_timeout` is 10 ms units (§6.3).
#[must_use]
#[allow(clippy::too_many_arguments)]
pub fn le_create_connection(
    scan_interval: u16,
    scan_window: u16,
    peer_addr_type: AddrType,
    peer_addr: Eui48,
    own_addr_type: AdvAddrType,
    conn_interval_min: u16,
    conn_interval_max: u16,
    conn_latency: u16,
    supervision_timeout: u16,
) -> Command {
    Command::build(Opcode::LeCreateConnection, |p| {
        p.u16(scan_interval)
            .u16(scan_window)
            .u8(0); // Initiator_Filter_Policy: use peer address, ignore accept list
        p.u8(match peer_addr_type {
            AddrType::LeRandom => 0x01,
            _ => 0x00,
        });
        put_addr(p, peer_addr);
        p.u8(own_addr_type.into())
            .u16(conn_interval_min)
            .u16(conn_interval_max)
            .u16(conn_latency)
            .u16(supervision_timeout)
            .u16(0) // Min_CE_Length
            .u16(0); // Max_CE_Length
    })
}

/// `HCI_LE_Create_Connection_Cancel` ([Vol 4] Part E, Section 7.8.13).
#[must_use]
pub fn le_create_connection_cancel() -> Command {
    Command::new(Opcode::LeCreateConnectionCancel, Vec::new())
}

/// `HCI_Disconnect` ([Vol 4] Part E, Section 7.1.6).
#[must_use]
pub fn disconnect(handle: ConnHandle, reason: u8) -> Command {
    Command::build(Opcode::Disconnect, |p| {
        p.u16(handle.raw()).u8(reason);
    })
}

/// `HCI_LE_Set_Advertising_Parameters` ([Vol 4] Part E, Section 7.8.5).
/// `interval_min`/`interval_max` are 0.625 ms units (§6.3: `[0x0020,
/// 0x4000]`).
#[must_use]
pub fn le_set_advertising_parameters(
    interval_min: u16,
    interval_max: u16,
    adv_type: u8,
    own_addr_type: AdvAddrType,
    peer_addr_type: AddrType,
    peer_addr: Eui48,
    chan_map: AdvChanMap,
    filter_policy: AdvFilterPolicy,
) -> Command {
    Command::build(Opcode::LeSetAdvertisingParameters, |p| {
        p.u16(interval_min).u16(interval_max).u8(adv_type);
        p.u8(own_addr_type.into());
        p.u8(match peer_addr_type {
            AddrType::LeRandom => 0x01,
            _ => 0x00,
        });
        put_addr(p, peer_addr);
        p.u8(chan_map.bits()).u8(filter_policy.into());
    })
}

/// `HCI_LE_Set_Advertising_Data` ([Vol 4] Part E, Section 7.8.7). `data`
/// must be at most 31 bytes.
#[must_use]
pub fn le_set_advertising_data(data: &[u8]) -> Command {
    debug_assert!(data.len() <= 31);
    Command::build(Opcode::LeSetAdvertisingData, |p| {
        #[allow(clippy::cast_possible_truncation)]
        p.u8(data.len() as u8);
        p.put(data);
        p.put(&[0u8; 31][..31 - data.len()]);
    })
}

/// `HCI_LE_Set_Scan_Response_Data` ([Vol 4] Part E, Section 7.8.8).
#[must_use]
pub fn le_set_scan_response_data(data: &[u8]) -> Command {
    debug_assert!(data.len() <= 31);
    Command::build(Opcode::LeSetScanResponseData, |p| {
        #[allow(clippy::cast_possible_truncation)]
        p.u8(data.len() as u8);
        p.put(data);
        p.put(&[0u8; 31][..31 - data.len()]);
    })
}

/// `HCI_LE_Set_Advertising_Enable` ([Vol 4] Part E, Section 7.8.9).
#[must_use]
pub fn le_set_advertising_enable(enable: bool) -> Command {
    Command::build(Opcode::LeSetAdvertisingEnable, |p| {
        p.u8(u8::from(enable));
    })
}

/// `HCI_LE_Long_Term_Key_Request_Reply` /
/// `HCI_LE_Long_Term_Key_Request_Negative_Reply` ([Vol 4] Part E, Sections
/// 7.8.24-7.8.25).
#[must_use]
pub fn le_long_term_key_request_reply(handle: ConnHandle, ltk: Option<&bthostd_crypto::Ltk>) -> Command {
    match ltk {
        Some(k) => Command::build(Opcode::LeLongTermKeyRequestReply, |p| {
            p.u16(handle.raw()).put(k);
        }),
        None => Command::build(Opcode::LeLongTermKeyRequestNegativeReply, |p| {
            p.u16(handle.raw());
        }),
    }
}

/// `HCI_LE_Start_Encryption` ([Vol 4] Part E, Section 7.8.24), used to
/// resume encryption with a previously stored LTK on reconnect (§4.11
/// pre-pair upload) or to kick off encryption with a freshly derived SC LTK.
#[must_use]
pub fn le_start_encryption(handle: ConnHandle, rand: u64, ediv: u16, ltk: &bthostd_crypto::Ltk) -> Command {
    Command::build(Opcode::LeStartEncryption, |p| {
        p.u16(handle.raw()).u64(rand).u16(ediv).put(ltk);
    })
}

/// `HCI_User_Confirmation_Request_Reply` / `..._Negative_Reply` ([Vol 4]
/// Part E, Sections 7.1.30-7.1.31), reused by LE numeric comparison
/// ([Vol 3] Part H, Section 2.3.5.6.2).
#[must_use]
pub fn user_confirmation_request_reply(addr: Eui48, positive: bool) -> Command {
    let opcode = if positive { Opcode::UserConfirmationRequestReply } else { Opcode::UserConfirmationRequestNegativeReply };
    Command::build(opcode, |p| put_addr(p, addr))
}

/// `HCI_User_Passkey_Request_Reply` / `..._Negative_Reply` ([Vol 4] Part E,
/// Sections 7.1.32-7.1.33). `passkey` is `0..=999999`; `None` sends the
/// negative reply (no way to collect one from this IO capability).
#[must_use]
pub fn user_passkey_request_reply(addr: Eui48, passkey: Option<u32>) -> Command {
    match passkey {
        Some(v) => Command::build(Opcode::UserPasskeyRequestReply, |p| {
            put_addr(p, addr);
            p.u32(v);
        }),
        None => Command::build(Opcode::UserPasskeyRequestNegativeReply, |p| put_addr(p, addr)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reset_has_no_params() {
        assert!(reset().params.is_empty());
    }

    #[test]
    fn disconnect_encodes_handle_and_reason() {
        let cmd = disconnect(ConnHandle::new(0x0040), 0x13);
        assert_eq!(cmd.params, vec![0x40, 0x00, 0x13]);
    }

    #[test]
    fn advertising_data_is_zero_padded_to_31_bytes() {
        let cmd = le_set_advertising_data(&[1, 2, 3]);
        assert_eq!(cmd.params.len(), 1 + 31);
        assert_eq!(cmd.params[0], 3);
    }

    #[test]
    fn user_confirmation_reply_picks_positive_or_negative_opcode() {
        let addr = Eui48::new([0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF]);
        assert_eq!(user_confirmation_request_reply(addr, true).opcode, Opcode::UserConfirmationRequestReply);
        assert_eq!(user_confirmation_request_reply(addr, false).opcode, Opcode::UserConfirmationRequestNegativeReply);
    }

    #[test]
    fn user_passkey_reply_encodes_numeric_value() {
        let addr = Eui48::new([0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF]);
        let cmd = user_passkey_request_reply(addr, Some(123456));
        assert_eq!(cmd.opcode, Opcode::UserPasskeyRequestReply);
        assert_eq!(&cmd.params[6..], &123456u32.to_le_bytes());
        assert_eq!(user_passkey_request_reply(addr, None).opcode, Opcode::UserPasskeyRequestNegativeReply);
    }

    #[test]
    fn le_create_connection_encodes_peer_address_little_endian() {
        let peer = Eui48::new([0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF]);
        let cmd = le_create_connection(0x10, 0x10, AddrType::LePublic, peer, AdvAddrType::Public, 6, 6, 0, 200);
        // Scan_Interval(2) + Scan_Window(2) + Filter_Policy(1) + Addr_Type(1) + Addr(6)
        let addr_bytes = &cmd.params[6..12];
        assert_eq!(addr_bytes, &[0xFF, 0xEE, 0xDD, 0xCC, 0xBB, 0xAA]);
    }
}
