use std::collections::HashMap;

use semver::Version;
use serde::{Deserialize, Serialize};

/// One package offered by an update-check result: either the full artifact
/// or, when `namediff`/`hashdiff_sha256` are present, a differential patch
/// against the currently-installed fingerprint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Package {
    pub name: String,
    pub hash_sha256: String,
    pub namediff: Option<String>,
    pub hashdiff_sha256: Option<String>,
    pub fingerprint: String,
    /// Declared artifact size in bytes, checked against
    /// `DiskSpaceProbe::available_space` before a download is attempted.
    pub size: i64,
}

/// Parsed `<manifest>` for a component with an available update.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    pub version: Version,
    pub run: Option<String>,
    pub arguments: Option<String>,
    pub packages: Vec<Package>,
}

/// Server-reported status for one requested id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResultStatus {
    Ok,
    NoUpdate,
    ErrorUnknownApplication,
    Restricted,
    ErrorInvalidAppId,
    /// Any other status string the server may return in the future.
    Other(String),
}

/// One entry of `UpdateChecker::check`'s results list, keyed by
/// `extension_id` (order-independent; the engine looks results up by id).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckResult {
    pub extension_id: String,
    pub status: ResultStatus,
    pub crx_urls: Vec<String>,
    pub crx_diffurls: Vec<String>,
    pub manifest: Option<Manifest>,
    pub action_run: Option<String>,
    /// Populated only from server keys with a leading underscore.
    pub custom_attributes: HashMap<String, String>,
}
