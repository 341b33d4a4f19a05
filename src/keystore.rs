//! Persistent key store: one binary file per `(local, remote)` adapter/peer
//! pair (C9, §6.1), plus directory scan and pre-pair upload bookkeeping
//! (§4.11, §9 "`SMPKeyBin::readAllForLocalAdapter`/`applyAll`").

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use bitflags::bitflags;

use crate::addr::{AddrType, AddressAndType, Eui48};
use crate::error::{Error, Result};
use crate::smp::{IoCap, KeyDist, SecLevel};

/// `magic << 8 | version`; the magic half marks the file as an SMPKeyBin,
/// the low byte is the format version (§6.1: "version 5").
const FORMAT_VERSION: u8 = 5;
const MAGIC: u8 = 0x55;

fn version_field() -> u16 {
    (u16::from(MAGIC) << 8) | u16::from(FORMAT_VERSION)
}

bitflags! {
    /// Per-key "properties" byte preceding each key block (§6.1). Only the
    /// responder-side normalization bit is meaningful today (§4.7 "the
    /// responder flag normalized").
    #[derive(Default)]
    pub struct KeyProps: u8 {
        const RESPONDER = 1 << 0;
        /// IRK block is followed by a 7-byte identity address (§6.1 "IRK_init
        /// ... followed by id_address 7 if present").
        const HAS_IDENTITY_ADDRESS = 1 << 1;
    }
}

/// One `(properties, EDIV, RAND, LTK)` record (§6.1 "LTK_init").
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct StoredLtk {
    pub responder: bool,
    pub enc_size: u8,
    pub ediv: u16,
    pub rand: u64,
    pub ltk: [u8; 16],
}

/// One `(properties, IRK[, identity address])` record.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct StoredIrk {
    pub responder: bool,
    pub irk: [u8; 16],
    pub identity_address: Option<AddressAndType>,
}

/// One `(properties, CSRK)` record.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct StoredCsrk {
    pub responder: bool,
    pub csrk: [u8; 16],
}

/// One `(properties, type, pin_len, key)` BR/EDR link key record.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct StoredLinkKey {
    pub responder: bool,
    pub key_type: u8,
    pub pin_len: u8,
    pub key: [u8; 16],
}

/// One side's (initiator or responder) optional key set, mirroring
/// [`super::smp::PairingSide`] but holding only what is persisted.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct StoredKeys {
    pub ltk: Option<StoredLtk>,
    pub irk: Option<StoredIrk>,
    pub csrk: Option<StoredCsrk>,
    pub link_key: Option<StoredLinkKey>,
}

impl StoredKeys {
    fn mask(&self) -> KeyDist {
        let mut m = KeyDist::empty();
        if self.ltk.is_some() {
            m |= KeyDist::ENC_KEY;
        }
        if self.irk.is_some() {
            m |= KeyDist::ID_KEY;
        }
        if self.csrk.is_some() {
            m |= KeyDist::SIGN_KEY;
        }
        if self.link_key.is_some() {
            m |= KeyDist::LINK_KEY;
        }
        m
    }

    fn encoded_len(&self) -> usize {
        let mut n = 0;
        if self.ltk.is_some() {
            n += 28;
        }
        if self.irk.is_some() {
            n += 17 + usize::from(self.irk.unwrap().identity_address.is_some()) * 7;
        }
        if self.csrk.is_some() {
            n += 17;
        }
        if self.link_key.is_some() {
            n += 19;
        }
        n
    }
}

/// A loaded or about-to-be-written key file (§3 `SMPKeyBin`, §6.1).
#[derive(Clone, Copy, Debug)]
pub struct SmpKeyBin {
    pub ts_creation: SystemTime,
    pub local: AddressAndType,
    pub remote: AddressAndType,
    pub sec_level: SecLevel,
    pub io_cap: IoCap,
    pub initiator: StoredKeys,
    pub responder: StoredKeys,
}

impl SmpKeyBin {
    #[must_use]
    pub fn new(local: AddressAndType, remote: AddressAndType, sec_level: SecLevel, io_cap: IoCap) -> Self {
        Self {
            ts_creation: SystemTime::now(),
            local,
            remote,
            sec_level,
            io_cap,
            initiator: StoredKeys::default(),
            responder: StoredKeys::default(),
        }
    }

    /// Total encoded file size (§6.1 "size ... for integrity check").
    #[must_use]
    pub fn calc_size(&self) -> usize {
        30 + self.initiator.encoded_len() + self.responder.encoded_len()
    }

    /// Serializes to the bit-exact on-disk layout (§6.1).
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        use crate::octets::Packer;
        let size = self.calc_size();
        let mut p = Packer::with_capacity(size);
        #[allow(clippy::cast_possible_truncation)]
        p.u16(version_field()).u16(size as u16);
        let ts = self.ts_creation.duration_since(UNIX_EPOCH).unwrap_or(Duration::ZERO).as_secs();
        p.u64(ts);
        put_addr(&mut p, self.local);
        put_addr(&mut p, self.remote);
        p.u8(sec_level_byte(self.sec_level)).u8(io_cap_byte(self.io_cap));
        p.u8(self.initiator.mask().bits()).u8(self.responder.mask().bits());
        encode_side(&mut p, &self.initiator);
        encode_side(&mut p, &self.responder);
        p.into_vec()
    }

    /// Parses the on-disk layout, validating version, declared size, and
    /// that any present LTK block has a non-zero `enc_size` (§6.1 "A
    /// corrupt file is removed").
    pub fn from_bytes(raw: &[u8]) -> Result<Self> {
        use crate::octets::Unpacker;
        let mut u = Unpacker::new(raw);
        let version = u.u16();
        if version != version_field() {
            return Err(Error::KeyStore(format!("unsupported key file version {version:#06x}")));
        }
        let size = usize::from(u.u16());
        if size != raw.len() {
            return Err(Error::KeyStore(format!("size mismatch: header {size}, file {}", raw.len())));
        }
        let ts = UNIX_EPOCH + Duration::from_secs(u.u64());
        let local = get_addr(&mut u);
        let remote = get_addr(&mut u);
        let sec_level = sec_level_from_byte(u.u8());
        let io_cap = IoCap::from(u.u8());
        let keys_init = KeyDist::from_bits_truncate(u.u8());
        let keys_resp = KeyDist::from_bits_truncate(u.u8());
        let initiator = decode_side(&mut u, keys_init, false)?;
        let responder = decode_side(&mut u, keys_resp, true)?;
        if !u.is_ok() {
            return Err(Error::KeyStore("truncated key file".into()));
        }
        Ok(Self {
            ts_creation: ts,
            local,
            remote,
            sec_level,
            io_cap,
            initiator,
            responder,
        })
    }

    /// Filename for this pair: `bd_<local>_<remote><type-digit>.key` (§6.1).
    #[must_use]
    pub fn file_name(&self) -> String {
        format!(
            "bd_{}_{}{}.key",
            self.local.addr.to_hex_compact(),
            self.remote.addr.to_hex_compact(),
            self.remote.type_digit()
        )
    }

    /// Whether `self` is valid to apply to `device`: local and remote
    /// address-and-type must match exactly (§9 "Adapter role / address-type
    /// validation before apply").
    #[must_use]
    pub fn is_valid_for(&self, local: AddressAndType, remote: AddressAndType) -> bool {
        self.local == local && self.remote == remote
    }

    /// Writes this key bin atomically to `dir`: any existing file is
    /// removed first; on any write error the partial file is removed
    /// (§6.1, §5 "Key files are written atomically").
    pub fn write_to(&self, dir: &Path) -> Result<PathBuf> {
        let path = dir.join(self.file_name());
        if path.exists() {
            fs::remove_file(&path)?;
        }
        let bytes = self.to_bytes();
        if let Err(e) = fs::write(&path, &bytes) {
            let _ = fs::remove_file(&path);
            return Err(e.into());
        }
        Ok(path)
    }

    /// Reads and validates a key bin from `path`, removing the file if it
    /// is corrupt (§6.1).
    pub fn read_from(path: &Path) -> Result<Self> {
        let raw = fs::read(path)?;
        match Self::from_bytes(&raw) {
            Ok(bin) => Ok(bin),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "removing corrupt key file");
                let _ = fs::remove_file(path);
                Err(e)
            }
        }
    }
}

fn put_addr(p: &mut crate::octets::Packer, a: AddressAndType) {
    let mut octets = a.addr.0;
    octets.reverse();
    p.put(&octets);
    p.u8(a.type_digit());
}

fn get_addr(u: &mut crate::octets::Unpacker<'_>) -> AddressAndType {
    let mut octets = u.eui48();
    octets.reverse();
    let digit = u.u8();
    AddressAndType::from_type_digit(Eui48::new(octets), digit).unwrap_or(AddressAndType::new(Eui48::new(octets), AddrType::LePublic))
}

fn sec_level_byte(s: SecLevel) -> u8 {
    match s {
        SecLevel::Unset => 0,
        SecLevel::None => 1,
        SecLevel::EncOnly => 2,
        SecLevel::EncAuth => 3,
        SecLevel::EncAuthFips => 4,
    }
}

fn sec_level_from_byte(b: u8) -> SecLevel {
    match b {
        1 => SecLevel::None,
        2 => SecLevel::EncOnly,
        3 => SecLevel::EncAuth,
        4 => SecLevel::EncAuthFips,
        _ => SecLevel::Unset,
    }
}

fn io_cap_byte(io: IoCap) -> u8 {
    u8::from(io)
}

fn encode_side(p: &mut crate::octets::Packer, side: &StoredKeys) {
    if let Some(ltk) = side.ltk {
        let mut props = KeyProps::empty();
        if ltk.responder {
            props |= KeyProps::RESPONDER;
        }
        p.u8(props.bits()).u8(ltk.enc_size).u16(ltk.ediv).u64(ltk.rand).put(&ltk.ltk);
    }
    if let Some(irk) = side.irk {
        let mut props = KeyProps::empty();
        if irk.responder {
            props |= KeyProps::RESPONDER;
        }
        if irk.identity_address.is_some() {
            props |= KeyProps::HAS_IDENTITY_ADDRESS;
        }
        p.u8(props.bits()).put(&irk.irk);
        if let Some(ia) = irk.identity_address {
            put_addr(p, ia);
        }
    }
    if let Some(csrk) = side.csrk {
        let mut props = KeyProps::empty();
        if csrk.responder {
            props |= KeyProps::RESPONDER;
        }
        p.u8(props.bits()).put(&csrk.csrk);
    }
    if let Some(lk) = side.link_key {
        let mut props = KeyProps::empty();
        if lk.responder {
            props |= KeyProps::RESPONDER;
        }
        p.u8(props.bits()).u8(lk.key_type).u8(lk.pin_len).put(&lk.key);
    }
}

fn decode_side(u: &mut crate::octets::Unpacker<'_>, mask: KeyDist, responder_side: bool) -> Result<StoredKeys> {
    let mut out = StoredKeys::default();
    if mask.contains(KeyDist::ENC_KEY) {
        let props = KeyProps::from_bits_truncate(u.u8());
        let enc_size = u.u8();
        let ediv = u.u16();
        let rand = u.u64();
        let ltk = u.bytes();
        if enc_size == 0 {
            return Err(Error::KeyStore("LTK block has zero enc_size".into()));
        }
        out.ltk = Some(StoredLtk {
            responder: props.contains(KeyProps::RESPONDER) || responder_side,
            enc_size,
            ediv,
            rand,
            ltk,
        });
    }
    if mask.contains(KeyDist::ID_KEY) {
        let props = KeyProps::from_bits_truncate(u.u8());
        let irk = u.bytes();
        let identity_address = props.contains(KeyProps::HAS_IDENTITY_ADDRESS).then(|| get_addr(u));
        out.irk = Some(StoredIrk {
            responder: props.contains(KeyProps::RESPONDER) || responder_side,
            irk,
            identity_address,
        });
    }
    if mask.contains(KeyDist::SIGN_KEY) {
        let props = KeyProps::from_bits_truncate(u.u8());
        let csrk = u.bytes();
        out.csrk = Some(StoredCsrk {
            responder: props.contains(KeyProps::RESPONDER) || responder_side,
            csrk,
        });
    }
    if mask.contains(KeyDist::LINK_KEY) {
        let props = KeyProps::from_bits_truncate(u.u8());
        let key_type = u.u8();
        let pin_len = u.u8();
        let key = u.bytes();
        out.link_key = Some(StoredLinkKey {
            responder: props.contains(KeyProps::RESPONDER) || responder_side,
            key_type,
            pin_len,
            key,
        });
    }
    Ok(out)
}

/// Directory-backed collection of key files for one local adapter (§4.11,
/// §9 "`SMPKeyBin::readAllForLocalAdapter`/`applyAll`").
#[derive(Clone, Debug)]
pub struct KeyStore {
    dir: PathBuf,
}

impl KeyStore {
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn save(&self, bin: &SmpKeyBin) -> Result<PathBuf> {
        fs::create_dir_all(&self.dir)?;
        bin.write_to(&self.dir)
    }

    /// Scans `self.dir` for files matching the `bd_*.key` pattern whose
    /// local address matches `local`, returning every one that parses and
    /// validates (§9 "filtered additionally by local-address match").
    pub fn load_dir(&self, local: AddressAndType) -> Vec<SmpKeyBin> {
        let Ok(entries) = fs::read_dir(&self.dir) else {
            return Vec::new();
        };
        let mut out = Vec::new();
        for entry in entries.flatten() {
            let path = entry.path();
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else { continue };
            if !name.starts_with("bd_") || !name.ends_with(".key") {
                continue;
            }
            if let Ok(bin) = SmpKeyBin::read_from(&path) {
                if bin.local == local {
                    out.push(bin);
                }
            }
        }
        out
    }

    /// Applies every loaded key bin whose stored `sec_level` is at or above
    /// `floor` to `apply`; bins below the floor, or whose stored
    /// local/remote address-and-type no longer matches `local`, are removed
    /// and reported as `EncryptionModeNotAccepted` (§9 "`readAndApply` ...
    /// minimum-security gate", "Adapter role / address-type validation
    /// before apply").
    pub fn apply_all(
        &self,
        local: AddressAndType,
        floor: SecLevel,
        mut apply: impl FnMut(&SmpKeyBin) -> Result<()>,
    ) -> Vec<Result<()>> {
        self.load_dir(local)
            .into_iter()
            .map(|bin| {
                if !bin.is_valid_for(local, bin.remote) || bin.sec_level < floor {
                    let path = self.dir.join(bin.file_name());
                    let _ = fs::remove_file(path);
                    return Err(Error::Auth(crate::hci::Status::EncryptionModeNotAcceptable));
                }
                apply(&bin)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(b: u8, t: AddrType) -> AddressAndType {
        AddressAndType::new(Eui48::new([b, 0x11, 0x22, 0x33, 0x44, 0x55]), t)
    }

    #[test]
    fn round_trips_byte_identical() {
        let local = AddressAndType::new(Eui48::new([0x00, 0x11, 0x22, 0x33, 0x44, 0x55]), AddrType::LePublic);
        let remote = AddressAndType::new(Eui48::new([0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF]), AddrType::LePublic);
        let mut bin = SmpKeyBin::new(local, remote, SecLevel::EncOnly, IoCap::NoInputNoOutput);
        bin.responder.ltk = Some(StoredLtk {
            responder: true,
            enc_size: 16,
            ediv: 0x1234,
            rand: 0xABAB_ABAB_ABAB_ABAB,
            ltk: [0xCD; 16],
        });
        let bytes = bin.to_bytes();
        assert_eq!(bytes.len(), 58); // scenario 6
        let back = SmpKeyBin::from_bytes(&bytes).unwrap();
        assert_eq!(back.local, bin.local);
        assert_eq!(back.remote, bin.remote);
        assert_eq!(back.sec_level, bin.sec_level);
        assert_eq!(back.responder.ltk, bin.responder.ltk);
        assert_eq!(back.to_bytes(), bytes);
    }

    #[test]
    fn zero_enc_size_ltk_is_rejected() {
        let local = addr(0, AddrType::LePublic);
        let remote = addr(1, AddrType::LePublic);
        let mut bin = SmpKeyBin::new(local, remote, SecLevel::EncOnly, IoCap::NoInputNoOutput);
        bin.initiator.ltk = Some(StoredLtk { responder: false, enc_size: 0, ediv: 0, rand: 0, ltk: [0; 16] });
        let bytes = bin.to_bytes();
        assert!(SmpKeyBin::from_bytes(&bytes).is_err());
    }

    #[test]
    fn write_and_load_dir_round_trip() {
        let tmp = std::env::temp_dir().join(format!("bthostd-keystore-test-{}", std::process::id()));
        let _ = fs::remove_dir_all(&tmp);
        let store = KeyStore::new(&tmp);
        let local = addr(0, AddrType::LePublic);
        let remote = addr(1, AddrType::LePublic);
        let mut bin = SmpKeyBin::new(local, remote, SecLevel::EncOnly, IoCap::NoInputNoOutput);
        bin.responder.ltk = Some(StoredLtk { responder: true, enc_size: 16, ediv: 1, rand: 2, ltk: [9; 16] });
        store.save(&bin).unwrap();
        let loaded = store.load_dir(local);
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].remote, remote);
        fs::remove_dir_all(&tmp).ok();
    }
}
