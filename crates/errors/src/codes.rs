//! Per-category error-code namespaces.
//!
//! Error codes are only meaningful together with the [`crate::ErrorCategory`]
//! they were reported under — the same integer means different things in
//! `service` and `installer`. Downloader- and installer-supplied integers are
//! passed through unchanged and are not enumerated here.

/// Codes reported under [`crate::ErrorCategory::Service`].
pub mod service {
    pub const CRX_NOT_FOUND: i32 = 1;
    pub const UPDATE_DISABLED: i32 = 2;
    pub const UPDATE_RESPONSE_NOT_FOUND: i32 = 3;
    pub const UNKNOWN_APPLICATION: i32 = 4;
    pub const RESTRICTED_APPLICATION: i32 = 5;
    pub const INVALID_APPID: i32 = 6;
    pub const CANCELLED: i32 = 7;
    pub const CHECK_FOR_UPDATE_ONLY: i32 = 8;
}

/// Codes reported under [`crate::ErrorCategory::Download`].
pub mod download {
    /// Available space was below the declared package size; no download was attempted.
    pub const DISK_FULL: i32 = 100;
    /// The downloaded artifact's hash did not match the package manifest.
    pub const HASH_MISMATCH: i32 = 101;
    /// No urls were offered for this artifact.
    pub const NO_URLS: i32 = 102;
    /// A diff was offered but there is no previously-cached artifact on disk
    /// to patch against.
    pub const MISSING_CACHED_CRX: i32 = 18;
}

/// Codes reported under [`crate::ErrorCategory::Installer`].
pub mod installer {
    pub const GENERIC_ERROR: i32 = 9;
}

/// Codes reported under [`crate::ErrorCategory::Unpack`], used when the
/// engine itself rejects an archive before handing it to the collaborator's
/// own `CollaboratorError` code.
pub mod unpack {
    pub const SIGNATURE_MISMATCH: i32 = 1;
    pub const FORMAT_UNSUPPORTED: i32 = 2;
}

/// Codes reported under [`crate::ErrorCategory::UpdateCheck`].
pub mod update_check {
    pub const NO_RESPONSE: i32 = 1;
    pub const TRANSPORT_FAILED: i32 = 2;
    pub const PARSE_FAILED: i32 = 3;
}
