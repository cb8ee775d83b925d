//! The per-id state machine: accumulates progress and events, and drives a
//! `CAN_UPDATE` component through download (full or differential, with
//! fallback), unpack, install and persistence to a terminal state. Mutated
//! only by `UpdateEngine` on its single task runner; never mutated
//! concurrently with another `Component`.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use ceu_errors::{codes, ErrorCategory};
use ceu_events::{Event, EventType};
use ceu_types::{
    ComponentState, CrxComponent, CrxUpdateItem, InstallParams, Manifest, Package, ResultStatus,
};
use semver::Version;

use crate::cache::CrxCache;
use crate::context::Collaborators;
use crate::traits::{CancelFlag, ProgressCallback};
use ceu_types::{CheckResult, SessionId};

/// Outcome of exhausting every `crx_urls` candidate during a full download.
enum DownloadFailure {
    Cancelled,
    NoUrls,
    Collaborator { code: i32, extra_code1: i32 },
}

/// Per-id progress/error/event state plus the pipeline that drives a
/// resolved, checked component from `CAN_UPDATE` to a terminal state.
pub struct Component {
    pub id: String,
    pub item: CrxUpdateItem,
    pub crx: Option<CrxComponent>,
    pub events: Vec<Event>,
    check_result: Option<CheckResult>,
    installed_version: Option<Version>,
    diff_errorcat: ErrorCategory,
    diff_errorcode: i32,
}

impl Component {
    #[must_use]
    pub fn new(id: impl Into<String>, crx: Option<CrxComponent>) -> Self {
        let id = id.into();
        let mut item = CrxUpdateItem::new(id.clone());
        item.component = crx.clone();
        let installed_version = crx.as_ref().map(|c| c.version.clone());
        Self {
            id,
            item,
            crx,
            events: Vec::new(),
            check_result: None,
            installed_version,
            diff_errorcat: ErrorCategory::None,
            diff_errorcode: 0,
        }
    }

    /// Builds an already-terminal component for an id `data_cb` resolved to
    /// `None`. Excluded from the update check.
    pub fn not_found(
        id: impl Into<String>,
        eventtype: EventType,
        emit: &mut (dyn FnMut(&CrxUpdateItem) + Send),
    ) -> Self {
        let mut component = Self::new(id, None);
        component.fail(
            ErrorCategory::Service,
            codes::service::CRX_NOT_FOUND,
            0,
            eventtype,
            emit,
        );
        component
    }

    fn set_state(&mut self, state: ComponentState, emit: &mut (dyn FnMut(&CrxUpdateItem) + Send)) {
        self.item.state = state;
        emit(&self.item);
    }

    fn next_version(&self) -> Option<Version> {
        self.check_result
            .as_ref()
            .and_then(|r| r.manifest.as_ref())
            .map(|m| m.version.clone())
    }

    fn fail(
        &mut self,
        category: ErrorCategory,
        code: i32,
        extra_code1: i32,
        eventtype: EventType,
        emit: &mut (dyn FnMut(&CrxUpdateItem) + Send),
    ) {
        self.item.state = ComponentState::UpdateError;
        self.item.error_category = category;
        self.item.error_code = code;
        self.item.extra_code1 = extra_code1;
        self.item.downloaded_bytes = -1;
        self.item.total_bytes = -1;
        emit(&self.item);
        self.events.push(Event::terminal(
            eventtype,
            false,
            category,
            code,
            extra_code1,
            self.installed_version.clone(),
            self.next_version(),
            self.diff_errorcat,
            self.diff_errorcode,
        ));
    }

    fn succeed(&mut self, eventtype: EventType, emit: &mut (dyn FnMut(&CrxUpdateItem) + Send)) {
        self.item.state = ComponentState::Updated;
        self.item.error_category = ErrorCategory::None;
        self.item.error_code = 0;
        self.item.extra_code1 = 0;
        self.item.downloaded_bytes = -1;
        self.item.total_bytes = -1;
        self.item.install_progress = 100;
        emit(&self.item);
        self.events.push(Event::terminal(
            eventtype,
            true,
            ErrorCategory::None,
            0,
            0,
            self.installed_version.clone(),
            self.next_version(),
            self.diff_errorcat,
            self.diff_errorcode,
        ));
    }

    /// Transitions a component straight from `CHECKING` to `UPDATE_ERROR`
    /// when the whole-batch update check produced no response or a parse
    /// error, rather than a per-id result.
    pub(crate) fn fail_checking(
        &mut self,
        category: ErrorCategory,
        code: i32,
        eventtype: EventType,
        emit: &mut (dyn FnMut(&CrxUpdateItem) + Send),
    ) {
        self.set_state(ComponentState::Checking, emit);
        self.fail(category, code, 0, eventtype, emit);
    }

    /// Applies one `UpdateChecker` result to this component, transitioning
    /// it out of `CHECKING`. Called once per component, before `run`.
    pub fn apply_check_result(
        &mut self,
        result: Option<CheckResult>,
        eventtype: EventType,
        emit: &mut (dyn FnMut(&CrxUpdateItem) + Send),
    ) {
        self.set_state(ComponentState::Checking, emit);

        let Some(result) = result else {
            self.fail(
                ErrorCategory::Service,
                codes::service::UPDATE_RESPONSE_NOT_FOUND,
                0,
                eventtype,
                emit,
            );
            return;
        };

        match &result.status {
            ResultStatus::NoUpdate => {
                for (key, value) in &result.custom_attributes {
                    if key.starts_with('_') {
                        self.item
                            .custom_updatecheck_data
                            .insert(key.clone(), value.clone());
                    }
                }
                self.check_result = Some(result);
                self.set_state(ComponentState::UpToDate, emit);
            }
            ResultStatus::Ok => {
                self.check_result = Some(result);
                self.set_state(ComponentState::CanUpdate, emit);
            }
            ResultStatus::ErrorUnknownApplication => {
                self.check_result = Some(result);
                self.fail(
                    ErrorCategory::Service,
                    codes::service::UNKNOWN_APPLICATION,
                    0,
                    eventtype,
                    emit,
                );
            }
            ResultStatus::Restricted => {
                self.check_result = Some(result);
                self.fail(
                    ErrorCategory::Service,
                    codes::service::RESTRICTED_APPLICATION,
                    0,
                    eventtype,
                    emit,
                );
            }
            ResultStatus::ErrorInvalidAppId => {
                self.check_result = Some(result);
                self.fail(
                    ErrorCategory::Service,
                    codes::service::INVALID_APPID,
                    0,
                    eventtype,
                    emit,
                );
            }
            ResultStatus::Other(_) => {
                self.check_result = Some(result);
                self.fail(
                    ErrorCategory::Service,
                    codes::service::UPDATE_RESPONSE_NOT_FOUND,
                    0,
                    eventtype,
                    emit,
                );
            }
        }
    }

    /// Drives a `CAN_UPDATE` component to a terminal state: download
    /// selection with diff fallback, the disk-space gate, unpack, install,
    /// persistence and the post-install action run.
    #[allow(clippy::too_many_arguments, clippy::too_many_lines)]
    pub async fn run(
        &mut self,
        collaborators: &Collaborators,
        cache: &CrxCache,
        cache_root: &Path,
        work_dir: &Path,
        session_id: SessionId,
        cancel: &CancelFlag,
        eventtype: EventType,
        check_only: bool,
        emit: &mut (dyn FnMut(&CrxUpdateItem) + Send),
    ) {
        debug_assert_eq!(self.item.state, ComponentState::CanUpdate);

        if check_only {
            self.events.push(Event::terminal(
                eventtype,
                false,
                ErrorCategory::Service,
                codes::service::CHECK_FOR_UPDATE_ONLY,
                0,
                self.installed_version.clone(),
                self.next_version(),
                ErrorCategory::None,
                0,
            ));
            return;
        }

        if cancel.is_cancelled() {
            self.fail(
                ErrorCategory::Service,
                codes::service::CANCELLED,
                0,
                eventtype,
                emit,
            );
            return;
        }

        let Some(crx) = self.crx.clone() else {
            self.fail(
                ErrorCategory::Service,
                codes::service::CRX_NOT_FOUND,
                0,
                eventtype,
                emit,
            );
            return;
        };

        if !crx.updates_enabled {
            self.fail(
                ErrorCategory::Service,
                codes::service::UPDATE_DISABLED,
                0,
                eventtype,
                emit,
            );
            return;
        }

        let Some((package, manifest, crx_urls, crx_diffurls)) =
            self.check_result.as_ref().and_then(|r| {
                let manifest = r.manifest.clone()?;
                let package = manifest.packages.first().cloned()?;
                Some((package, manifest, r.crx_urls.clone(), r.crx_diffurls.clone()))
            })
        else {
            self.fail(
                ErrorCategory::Service,
                codes::service::UPDATE_RESPONSE_NOT_FOUND,
                0,
                eventtype,
                emit,
            );
            return;
        };

        let (artifact, just_downloaded) =
            if let Some(cached) = cache.lookup(&self.id, &package.fingerprint).await {
                (cached, false)
            } else {
                let wants_diff = !crx_diffurls.is_empty() && package.namediff.is_some();

                let from_diff = if wants_diff {
                    self.set_state(ComponentState::DownloadingDiff, emit);

                    match cache.lookup(&self.id, &crx.fingerprint).await {
                        Some(previous_artifact) => {
                            if collaborators.disk_probe.available_space(cache_root) < package.size {
                                self.fail(
                                    ErrorCategory::Download,
                                    codes::download::DISK_FULL,
                                    0,
                                    eventtype,
                                    emit,
                                );
                                return;
                            }

                            match self
                                .attempt_diff(
                                    collaborators,
                                    &previous_artifact,
                                    &package,
                                    &crx_diffurls,
                                    work_dir,
                                    cancel,
                                    emit,
                                )
                                .await
                            {
                                Ok(path) => Some(path),
                                Err((ErrorCategory::Service, code)) => {
                                    self.fail(ErrorCategory::Service, code, 0, eventtype, emit);
                                    return;
                                }
                                Err((cat, code)) => {
                                    self.diff_errorcat = cat;
                                    self.diff_errorcode = code;
                                    self.events.push(Event::diff_failure(cat, code));
                                    None
                                }
                            }
                        }
                        None => {
                            // Nothing cached to patch against: record the
                            // failed diff attempt and fall back to a full
                            // download below.
                            self.diff_errorcat = ErrorCategory::Download;
                            self.diff_errorcode = codes::download::MISSING_CACHED_CRX;
                            self.events.push(Event::diff_failure(
                                ErrorCategory::Download,
                                codes::download::MISSING_CACHED_CRX,
                            ));
                            None
                        }
                    }
                } else {
                    None
                };

                match from_diff {
                    Some(path) => (path, true),
                    None => {
                        self.set_state(ComponentState::Downloading, emit);

                        if collaborators.disk_probe.available_space(cache_root) < package.size {
                            self.fail(
                                ErrorCategory::Download,
                                codes::download::DISK_FULL,
                                0,
                                eventtype,
                                emit,
                            );
                            return;
                        }

                        match self
                            .attempt_full(collaborators, &package, &crx_urls, work_dir, cancel, emit)
                            .await
                        {
                            Ok(path) => (path, true),
                            Err(DownloadFailure::Cancelled) => {
                                self.fail(
                                    ErrorCategory::Service,
                                    codes::service::CANCELLED,
                                    0,
                                    eventtype,
                                    emit,
                                );
                                return;
                            }
                            Err(DownloadFailure::NoUrls) => {
                                self.fail(
                                    ErrorCategory::Download,
                                    codes::download::NO_URLS,
                                    0,
                                    eventtype,
                                    emit,
                                );
                                return;
                            }
                            Err(DownloadFailure::Collaborator { code, extra_code1 }) => {
                                self.fail(ErrorCategory::Download, code, extra_code1, eventtype, emit);
                                return;
                            }
                        }
                    }
                }
            };

        if cancel.is_cancelled() {
            self.fail(
                ErrorCategory::Service,
                codes::service::CANCELLED,
                0,
                eventtype,
                emit,
            );
            return;
        }

        let artifact = if just_downloaded {
            match cache.store(&self.id, &package.fingerprint, &artifact).await {
                Ok(cached_path) => {
                    let _ = tokio::fs::remove_file(&artifact).await;
                    cached_path
                }
                Err(e) => {
                    tracing::warn!(id = %self.id, error = %e, "failed to cache downloaded artifact");
                    artifact
                }
            }
        } else {
            artifact
        };

        self.item.downloaded_bytes = -1;
        self.item.total_bytes = -1;
        self.set_state(ComponentState::Updating, emit);

        let unpack_dir = work_dir.join(format!("{}-unpacked", self.id));
        let unpack_result = collaborators
            .unpacker
            .unpack(&artifact, &crx.pk_hash, crx.crx_format_requirement, &unpack_dir)
            .await;

        let unpacked_path = match unpack_result {
            Ok(path) => path,
            Err(e) => {
                let code = match e {
                    ceu_errors::UnpackError::SignatureMismatch => codes::unpack::SIGNATURE_MISMATCH,
                    ceu_errors::UnpackError::FormatUnsupported => codes::unpack::FORMAT_UNSUPPORTED,
                    ceu_errors::UnpackError::CollaboratorError { code } => code,
                    _ => codes::unpack::FORMAT_UNSUPPORTED,
                };
                self.fail(ErrorCategory::Unpack, code, 0, eventtype, emit);
                return;
            }
        };

        if cancel.is_cancelled() {
            let _ = tokio::fs::remove_dir_all(&unpacked_path).await;
            self.fail(
                ErrorCategory::Service,
                codes::service::CANCELLED,
                0,
                eventtype,
                emit,
            );
            return;
        }

        let Some(installer) = collaborators.installers.get(&crx.installer_handle).cloned() else {
            let _ = tokio::fs::remove_dir_all(&unpacked_path).await;
            self.fail(
                ErrorCategory::Installer,
                codes::installer::GENERIC_ERROR,
                0,
                eventtype,
                emit,
            );
            return;
        };

        let install_params = install_params_from_manifest(&manifest);

        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<i32>();
        let progress: Arc<dyn Fn(i32) + Send + Sync> = Arc::new(move |p| {
            let _ = tx.send(p);
        });
        let install_fut = installer.install(&unpacked_path, &crx.pk_hash, install_params.as_ref(), progress);
        tokio::pin!(install_fut);

        let install_result = loop {
            tokio::select! {
                biased;
                Some(p) = rx.recv() => {
                    self.item.install_progress = p;
                    emit(&self.item);
                }
                result = &mut install_fut => {
                    while let Ok(p) = rx.try_recv() {
                        self.item.install_progress = p;
                        emit(&self.item);
                    }
                    break result;
                }
            }
        };

        let _ = tokio::fs::remove_dir_all(&unpacked_path).await;

        match install_result {
            Ok(()) => {
                if let Err(e) = collaborators
                    .persisted_data
                    .set_pv_fp(&self.id, &manifest.version.to_string(), &package.fingerprint)
                    .await
                {
                    tracing::warn!(id = %self.id, error = %e, "failed to persist pv/fp after install");
                }
                let _ = cache.prune(&self.id, &package.fingerprint).await;

                if let Some(action_path) = self.check_result.as_ref().and_then(|r| r.action_run.clone()) {
                    if let Some(handler) = crx
                        .action_handler_handle
                        .as_ref()
                        .and_then(|handle| collaborators.action_handlers.get(handle).cloned())
                    {
                        let outcome = handler.handle(&action_path, session_id).await;
                        self.events
                            .push(Event::action_run(outcome.is_ok(), outcome.err().unwrap_or(0)));
                    }
                }

                self.succeed(eventtype, emit);
            }
            Err(code) => {
                self.fail(ErrorCategory::Installer, code, 0, eventtype, emit);
            }
        }
    }

    /// Tries each `crx_diffurls` candidate in order: download, hash-check
    /// against `hashdiff_sha256`, then patch against `previous_artifact`.
    /// Returns the combined `(category, code)` of the last failure if every
    /// candidate fails.
    async fn attempt_diff(
        &mut self,
        collaborators: &Collaborators,
        previous_artifact: &Path,
        package: &Package,
        crx_diffurls: &[String],
        work_dir: &Path,
        cancel: &CancelFlag,
        emit: &mut (dyn FnMut(&CrxUpdateItem) + Send),
    ) -> Result<PathBuf, (ErrorCategory, i32)> {
        if crx_diffurls.is_empty() {
            return Err((ErrorCategory::Download, codes::download::NO_URLS));
        }

        let dest_dir = work_dir.join(format!("{}-diff", self.id));
        let _ = tokio::fs::create_dir_all(&dest_dir).await;

        let mut last = (ErrorCategory::Download, codes::download::NO_URLS);

        for url in crx_diffurls {
            if cancel.is_cancelled() {
                return Err((ErrorCategory::Service, codes::service::CANCELLED));
            }

            let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<(i64, i64)>();
            let progress: ProgressCallback = Arc::new(move |downloaded, total| {
                let _ = tx.send((downloaded, total));
            });
            let download_fut = collaborators
                .downloader
                .download(url, &dest_dir, progress, cancel.clone());
            tokio::pin!(download_fut);

            let outcome = loop {
                tokio::select! {
                    biased;
                    Some((downloaded, total)) = rx.recv() => {
                        self.item.downloaded_bytes = downloaded;
                        self.item.total_bytes = total;
                        emit(&self.item);
                    }
                    outcome = &mut download_fut => {
                        while let Ok((downloaded, total)) = rx.try_recv() {
                            self.item.downloaded_bytes = downloaded;
                            self.item.total_bytes = total;
                            emit(&self.item);
                        }
                        break outcome;
                    }
                }
            };

            if !outcome.is_success() {
                last = (ErrorCategory::Download, outcome.error);
                continue;
            }
            let diff_path = outcome.response_path.expect("checked by is_success");

            if let Some(expected) = &package.hashdiff_sha256 {
                match crate::hashing::sha256_hex(&diff_path).await {
                    Ok(actual) if &actual == expected => {}
                    _ => {
                        let _ = tokio::fs::remove_file(&diff_path).await;
                        last = (ErrorCategory::Download, codes::download::HASH_MISMATCH);
                        continue;
                    }
                }
            }

            let output_path = work_dir.join(format!("{}-patched", self.id));
            let patch_result = collaborators
                .patcher
                .patch(previous_artifact, &diff_path, &output_path)
                .await;
            let _ = tokio::fs::remove_file(&diff_path).await;

            match patch_result {
                Ok(()) => return Ok(output_path),
                Err(code) => {
                    last = (ErrorCategory::Download, code);
                    continue;
                }
            }
        }

        Err(last)
    }

    /// Tries each `crx_urls` candidate in order, first success wins,
    /// recording a non-terminal download-attempt event for every failure.
    async fn attempt_full(
        &mut self,
        collaborators: &Collaborators,
        package: &Package,
        crx_urls: &[String],
        work_dir: &Path,
        cancel: &CancelFlag,
        emit: &mut (dyn FnMut(&CrxUpdateItem) + Send),
    ) -> Result<PathBuf, DownloadFailure> {
        if crx_urls.is_empty() {
            return Err(DownloadFailure::NoUrls);
        }

        let dest_dir = work_dir.join(format!("{}-full", self.id));
        let _ = tokio::fs::create_dir_all(&dest_dir).await;

        let mut last = DownloadFailure::NoUrls;

        for url in crx_urls {
            if cancel.is_cancelled() {
                return Err(DownloadFailure::Cancelled);
            }

            let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<(i64, i64)>();
            let progress: ProgressCallback = Arc::new(move |downloaded, total| {
                let _ = tx.send((downloaded, total));
            });
            let download_fut = collaborators
                .downloader
                .download(url, &dest_dir, progress, cancel.clone());
            tokio::pin!(download_fut);

            let outcome = loop {
                tokio::select! {
                    biased;
                    Some((downloaded, total)) = rx.recv() => {
                        self.item.downloaded_bytes = downloaded;
                        self.item.total_bytes = total;
                        emit(&self.item);
                    }
                    outcome = &mut download_fut => {
                        while let Ok((downloaded, total)) = rx.try_recv() {
                            self.item.downloaded_bytes = downloaded;
                            self.item.total_bytes = total;
                            emit(&self.item);
                        }
                        break outcome;
                    }
                }
            };

            if outcome.is_success() {
                let path = outcome.response_path.expect("checked by is_success");
                match crate::hashing::sha256_hex(&path).await {
                    Ok(actual) if actual == package.hash_sha256 => return Ok(path),
                    _ => {
                        let _ = tokio::fs::remove_file(&path).await;
                        self.events
                            .push(Event::download_attempt_failure(codes::download::HASH_MISMATCH, 0, url));
                        last = DownloadFailure::Collaborator {
                            code: codes::download::HASH_MISMATCH,
                            extra_code1: 0,
                        };
                        continue;
                    }
                }
            }

            self.events
                .push(Event::download_attempt_failure(outcome.error, outcome.extra_code1, url));
            last = DownloadFailure::Collaborator {
                code: outcome.error,
                extra_code1: outcome.extra_code1,
            };
        }

        Err(last)
    }
}

fn install_params_from_manifest(manifest: &Manifest) -> Option<InstallParams> {
    if manifest.run.is_none() && manifest.arguments.is_none() {
        None
    } else {
        Some(InstallParams {
            run: manifest.run.clone(),
            arguments: manifest.arguments.clone(),
        })
    }
}
