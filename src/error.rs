//! Crate-wide error type ([SYSTEM OVERVIEW], error handling design).

use crate::hci::Status;

/// Result type returned by every fallible public operation.
pub type Result<T> = std::result::Result<T, Error>;

/// Error taxonomy. Every variant carries enough context to be converted into
/// a synthetic [`crate::mgmt::MgmtEvent`] on the normal event path — internal
/// layers never propagate errors across a thread boundary by other means.
#[derive(Clone, Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// The HCI socket was closed, an ioctl failed, or the reader thread hit
    /// an unexpected EOF. Fatal for the owning adapter.
    #[error("transport failure: {0}")]
    Transport(String),

    /// No reply arrived within the configured window.
    #[error("timed out waiting for {0}")]
    Timeout(&'static str),

    /// The controller rejected a command (`COMMAND_DISALLOWED`,
    /// `CONNECTION_ALREADY_EXISTS`, …).
    #[error("controller rejected command: {0}")]
    ControllerRejection(Status),

    /// An authentication-related failure (`AUTH_FAILED`,
    /// `PIN_OR_KEY_MISSING`, `ENCRYPTION_MODE_NOT_ACCEPTED`, …).
    #[error("authentication failure: {0}")]
    Auth(Status),

    /// A public API argument failed a synchronous range/size check; the
    /// transport was never reached.
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    /// An operation was attempted on a closed adapter or a removed device.
    #[error("lifecycle error: {0}")]
    Lifecycle(&'static str),

    /// A malformed HCI/L2CAP/ATT/SMP packet or PDU.
    #[error("codec error: {0}")]
    Codec(&'static str),

    /// A key store I/O error or a corrupt `SMPKeyBin` file.
    #[error("key store error: {0}")]
    KeyStore(String),
}

impl Error {
    /// Returns the HCI status this error should be reported as when
    /// converted into a synthetic `MgmtEvent`.
    #[must_use]
    pub fn as_status(&self) -> Status {
        match self {
            Self::Transport(_) => Status::UnspecifiedError,
            Self::Timeout(_) => Status::ConnectionTimeout,
            Self::ControllerRejection(s) | Self::Auth(s) => *s,
            Self::InvalidArgument(_) => Status::InvalidCommandParameters,
            Self::Lifecycle(_) => Status::UnspecifiedError,
            Self::Codec(_) => Status::UnspecifiedError,
            Self::KeyStore(_) => Status::UnspecifiedError,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Self::Transport(e.to_string())
    }
}
