//! L2CAP basic (B-frame) framing over ACL (C8 prelude, §4.2 "SMP/ATT use
//! fixed CIDs"). Only what the fixed-CID SMP/ATT channels need: framing,
//! per-connection reassembly of fragmented ACL payloads, and CID
//! demultiplexing. Connection-oriented channels, credit-based flow control,
//! and the signaling channel's request/response machinery are out of scope
//! (§1 Non-goals: "L2CAP signaling channel beyond fixed-CID demux").

use std::collections::HashMap;

use parking_lot::Mutex;

/// Fixed L2CAP signaling CID ([Vol 3] Part A, Section 2.1). Not acted on by
/// this host (no dynamic channels), but demultiplexed so it can be silently
/// dropped instead of misread as SMP/ATT.
pub const SIGNALING_CID: u16 = 0x0001;

/// One complete, reassembled L2CAP basic frame.
#[derive(Clone, Debug)]
pub struct L2capFrame {
    pub cid: u16,
    pub payload: Vec<u8>,
}

/// Encodes `payload` as a basic L2CAP frame addressed to `cid`, ready to
/// hand to [`crate::hci::Transport::send_acl`] (the B-frame header is
/// `Length(2) || CID(2)` per [Vol 3] Part A, Section 3.1).
#[must_use]
pub fn encode_frame(cid: u16, payload: &[u8]) -> Vec<u8> {
    let mut v = Vec::with_capacity(4 + payload.len());
    #[allow(clippy::cast_possible_truncation)]
    v.extend_from_slice(&(payload.len() as u16).to_le_bytes());
    v.extend_from_slice(&cid.to_le_bytes());
    v.extend_from_slice(payload);
    v
}

struct Partial {
    cid: u16,
    want: usize,
    buf: Vec<u8>,
}

/// Reassembles ACL fragments, per connection handle, into complete L2CAP
/// basic frames. One instance is shared by an adapter across all its
/// connections.
#[derive(Default)]
pub struct Reassembler {
    partial: Mutex<HashMap<u16, Partial>>,
}

impl Reassembler {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds one ACL fragment for `handle`. `first` is whether this fragment
    /// starts a new L2CAP frame (the HCI packet-boundary flag's "first"
    /// value) as opposed to continuing a previous one. Returns the
    /// completed frame once all of its bytes have arrived.
    pub fn feed(&self, handle: u16, first: bool, data: &[u8]) -> Option<L2capFrame> {
        let mut map = self.partial.lock();
        if !first {
            let done = {
                let p = map.get_mut(&handle)?;
                p.buf.extend_from_slice(data);
                p.buf.len() >= p.want
            };
            return done.then(|| {
                let p = map.remove(&handle).expect("checked above");
                L2capFrame { cid: p.cid, payload: p.buf }
            });
        }
        if data.len() < 4 {
            return None;
        }
        let len = usize::from(u16::from_le_bytes([data[0], data[1]]));
        let cid = u16::from_le_bytes([data[2], data[3]]);
        let body = &data[4..];
        if body.len() >= len {
            return Some(L2capFrame { cid, payload: body[..len].to_vec() });
        }
        map.insert(handle, Partial { cid, want: len, buf: body.to_vec() });
        None
    }

    /// Drops any partial reassembly state for `handle`, e.g. on disconnect.
    pub fn forget(&self, handle: u16) {
        self.partial.lock().remove(&handle);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_fragment_frame_completes_immediately() {
        let r = Reassembler::new();
        let frame = encode_frame(0x0006, &[1, 2, 3]);
        let out = r.feed(0x0040, true, &frame).unwrap();
        assert_eq!(out.cid, 0x0006);
        assert_eq!(out.payload, vec![1, 2, 3]);
    }

    #[test]
    fn split_fragment_reassembles_across_two_feeds() {
        let r = Reassembler::new();
        let frame = encode_frame(0x0004, &[0xAA; 10]);
        assert!(r.feed(0x0041, true, &frame[..6]).is_none());
        let out = r.feed(0x0041, false, &frame[6..]).unwrap();
        assert_eq!(out.cid, 0x0004);
        assert_eq!(out.payload, vec![0xAA; 10]);
    }

    #[test]
    fn forget_drops_partial_state() {
        let r = Reassembler::new();
        let frame = encode_frame(0x0004, &[0xAA; 10]);
        r.feed(0x0042, true, &frame[..6]);
        r.forget(0x0042);
        assert!(r.feed(0x0042, false, &frame[6..]).is_none());
    }
}
