use semver::Version;
use serde::{Deserialize, Serialize};

/// Identity and configuration for one installed component, as resolved by
/// the caller's `data_cb`.
///
/// A `None` entry for a requested id is a valid value meaning "data not
/// available for this id"; that case is modeled at the call site as
/// `Option<CrxComponent>`, not inside this struct.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrxComponent {
    /// Opaque app id. Must match the id the caller requested.
    pub app_id: String,
    /// Human-readable display name, surfaced to observers only.
    pub name: String,
    /// Fingerprint of the expected signer's public key.
    pub pk_hash: Vec<u8>,
    /// Currently installed version.
    pub version: Version,
    /// Opaque string identifying the installed artifact, used as the diff
    /// patch base key.
    pub fingerprint: String,
    /// Installer handle resolved by the caller (opaque to the engine except
    /// for the `Installer` trait it implements).
    pub installer_handle: String,
    /// Action-handler handle, if the component supports post-install actions.
    pub action_handler_handle: Option<String>,
    /// Archive format the unpacker must enforce.
    pub crx_format_requirement: CrxFormatRequirement,
    /// Client-side policy: when `false` the core still performs the check
    /// but refuses to apply an update.
    pub updates_enabled: bool,
    /// Propagated into the check request as `installsource=ondemand`.
    pub is_foreground: bool,
}

/// Archive format requirement enforced by the `Unpacker`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CrxFormatRequirement {
    CrxAnyVersion,
    Crx3,
    Crx3WithPublisherProof,
}
