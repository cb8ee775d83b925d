#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Error categories, error-code namespaces and the shared error type for the
//! component update engine.
//!
//! The engine never surfaces a collaborator failure as a propagated
//! exception: every failure becomes a terminal [`ErrorCategory`] +
//! error-code pair recorded on the owning component. This crate defines that
//! vocabulary plus a `thiserror`-based [`Error`] for the (rarer) cases where
//! a collaborator boundary itself needs to return a `Result`.

pub mod codes;

use thiserror::Error;

/// The fixed, observable set of error categories a `CrxUpdateItem` can carry.
///
/// Numeric values are part of the wire contract (they are reported verbatim
/// in ping events) and must not be renumbered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(i32)]
pub enum ErrorCategory {
    None = 0,
    Download = 1,
    Unpack = 2,
    Installer = 3,
    Service = 4,
    UpdateCheck = 5,
}

impl ErrorCategory {
    #[must_use]
    pub fn as_i32(self) -> i32 {
        self as i32
    }
}

impl Default for ErrorCategory {
    fn default() -> Self {
        Self::None
    }
}

/// Failure to complete an update-check round trip (collaborator: `UpdateChecker`).
#[derive(Debug, Clone, Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[non_exhaustive]
pub enum CheckError {
    #[error("update check produced no response")]
    NoResponse,

    #[error("update check response could not be parsed: {message}")]
    ParseError { message: String },

    #[error("update check transport failed: {message}")]
    TransportError { message: String },
}

/// Failure while fetching a full or differential artifact (collaborator: `CrxDownloader`).
#[derive(Debug, Clone, Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[non_exhaustive]
pub enum DownloadError {
    #[error("no urls available for download")]
    NoUrls,

    #[error("available disk space is below the package size")]
    DiskFull,

    #[error("downloaded artifact hash did not match the expected value")]
    HashMismatch,

    #[error("download failed with collaborator code {code} (extra {extra_code1})")]
    CollaboratorError { code: i32, extra_code1: i32 },
}

/// Failure while verifying/unpacking a downloaded archive (collaborator: `Unpacker`).
#[derive(Debug, Clone, Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[non_exhaustive]
pub enum UnpackError {
    #[error("archive signature did not match the component's public key hash")]
    SignatureMismatch,

    #[error("archive does not satisfy the required crx format")]
    FormatUnsupported,

    #[error("unpack failed with collaborator code {code}")]
    CollaboratorError { code: i32 },
}

/// Failure while applying a differential patch (collaborator: `Patcher`).
#[derive(Debug, Clone, Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[non_exhaustive]
pub enum PatchError {
    #[error("no cached previous artifact for this id/fingerprint")]
    CacheMiss,

    #[error("previous artifact in cache is corrupt")]
    CacheCorrupt,

    #[error("patch application failed with collaborator code {code}")]
    CollaboratorError { code: i32 },
}

/// Failure while installing an unpacked component (collaborator: `Installer`).
#[derive(Debug, Clone, Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[non_exhaustive]
pub enum InstallError {
    #[error("installer failed with code {code}")]
    CollaboratorError { code: i32 },
}

/// Failure reading or writing persisted `(pv, fp)` state (collaborator: `PersistedData`).
#[derive(Debug, Clone, Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[non_exhaustive]
pub enum PersistError {
    #[error("persisted data store error: {message}")]
    StoreError { message: String },
}

/// Generic error type for cross-crate boundaries.
#[derive(Debug, Clone, Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Error {
    #[error("update check error: {0}")]
    Check(#[from] CheckError),

    #[error("download error: {0}")]
    Download(#[from] DownloadError),

    #[error("unpack error: {0}")]
    Unpack(#[from] UnpackError),

    #[error("patch error: {0}")]
    Patch(#[from] PatchError),

    #[error("install error: {0}")]
    Install(#[from] InstallError),

    #[error("persist error: {0}")]
    Persist(#[from] PersistError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}

/// Result type alias for component update engine operations.
pub type Result<T> = std::result::Result<T, Error>;
