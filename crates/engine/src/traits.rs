//! Contracts for the collaborators the engine consumes but does not
//! implement: the wire checker, the byte-range downloader, the
//! archive verifier/unzipper, the patch engine, the per-component
//! installer, the post-install action runner, and the persisted-data
//! and ping-flush stores. This module only fixes the Rust shape of the
//! boundary; each trait's doc comment states the semantics implementors
//! must uphold.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use ceu_errors::{ErrorCategory, Error};
use ceu_events::Event;
use ceu_types::{CheckResult, CrxComponent, CrxFormatRequirement, InstallParams, SessionId};

/// Latched cancellation flag shared between `UpdateContext` and every
/// in-flight collaborator call for one batch; checked at state boundaries
/// and on every progress callback.
#[derive(Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Per-component facts the default `UpdateChecker` request builder needs:
/// at minimum id, current version/fingerprint, the disabled flag and the
/// on-demand flag.
#[derive(Debug, Clone)]
pub struct CheckComponentInfo {
    pub app_id: String,
    pub version: semver::Version,
    pub fingerprint: String,
    pub updates_enabled: bool,
    pub is_foreground: bool,
    pub brand: Option<String>,
    pub ap: Option<String>,
    pub lang: Option<String>,
}

/// Outcome of one `UpdateChecker::check` round trip.
pub struct CheckOutcome {
    /// `None` models "no response" (a transport failure); `Some` carries the
    /// per-id results even when some/all ids are missing from the list.
    pub results: Option<Vec<CheckResult>>,
    pub error_category: ErrorCategory,
    pub error_code: i32,
    /// Forwarded to the client throttle regardless of success.
    pub retry_after_sec: u32,
}

#[async_trait]
pub trait UpdateChecker: Send + Sync {
    async fn check(
        &self,
        components: &[CheckComponentInfo],
        extra_attrs: &HashMap<String, String>,
    ) -> CheckOutcome;
}

/// Progress sample callback invoked from a collaborator on the engine's
/// runner; byte/percentage values may be `-1` for unknown.
pub type ProgressCallback = Arc<dyn Fn(i64, i64) + Send + Sync>;

/// Outcome of one `CrxDownloader::download` call (one url).
pub struct DownloadOutcome {
    /// `0` on success.
    pub error: i32,
    pub extra_code1: i32,
    pub response_path: Option<PathBuf>,
    pub metrics: ceu_types::DownloadMetrics,
}

impl DownloadOutcome {
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.error == 0 && self.response_path.is_some()
    }
}

#[async_trait]
pub trait CrxDownloader: Send + Sync {
    async fn download(
        &self,
        url: &str,
        dest_dir: &Path,
        on_progress: ProgressCallback,
        cancel: CancelFlag,
    ) -> DownloadOutcome;
}

#[async_trait]
pub trait Unpacker: Send + Sync {
    /// Verify `archive_path` against `pk_hash`/`format` and unpack it.
    /// Returns the unpacked directory on success.
    async fn unpack(
        &self,
        archive_path: &Path,
        pk_hash: &[u8],
        format: CrxFormatRequirement,
        dest_dir: &Path,
    ) -> Result<PathBuf, ceu_errors::UnpackError>;
}

#[async_trait]
pub trait Patcher: Send + Sync {
    /// Apply the diff at `diff_path` against `previous_artifact`, writing
    /// the reconstructed artifact to `output_path`.
    async fn patch(
        &self,
        previous_artifact: &Path,
        diff_path: &Path,
        output_path: &Path,
    ) -> Result<(), i32>;
}

#[async_trait]
pub trait Installer: Send + Sync {
    /// Install the unpacked component. `on_progress` reports `-1` or
    /// `0..=100`; the final value must be non-decreasing across calls.
    async fn install(
        &self,
        unpacked_path: &Path,
        pk_hash: &[u8],
        params: Option<&InstallParams>,
        on_progress: Arc<dyn Fn(i32) + Send + Sync>,
    ) -> Result<(), i32>;
}

#[async_trait]
pub trait ActionHandler: Send + Sync {
    async fn handle(&self, action_path: &str, session_id: SessionId) -> Result<(), i32>;
}

/// Persisted `(pv, fp)` store under `updateclientdata/apps/<id>/{pv,fp}`.
/// Written atomically only at successful installer completion.
#[async_trait]
pub trait PersistedData: Send + Sync {
    async fn get_pv(&self, id: &str) -> Option<String>;
    async fn get_fp(&self, id: &str) -> Option<String>;
    async fn set_pv_fp(&self, id: &str, pv: &str, fp: &str) -> Result<(), Error>;
}

/// Persists/flushes one batch's accumulated events. The ping manager owns
/// its own serialization: the next batch may call it again while a prior
/// flush is still in flight.
#[async_trait]
pub trait PingManager: Send + Sync {
    async fn send_ping(
        &self,
        session_id: SessionId,
        component_id: &str,
        events: Vec<Event>,
    ) -> Result<(), Error>;
}

/// Local disk-space probe backing the download-size gate. Synchronous: it
/// is not a suspension point.
pub trait DiskSpaceProbe: Send + Sync {
    fn available_space(&self, path: &Path) -> i64;
}

/// Resolves a batch's ids to their `CrxComponent` configuration. `None` at
/// an index means "data not available for this id".
#[async_trait]
pub trait DataSource: Send + Sync {
    async fn resolve(&self, ids: &[String]) -> Vec<Option<CrxComponent>>;
}
