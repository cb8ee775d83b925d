//! End-to-end batch scenarios driving `UpdateEngine::run` directly against
//! mock collaborators, mirroring the pipeline's documented behaviors: plain
//! success and no-update, server omissions, diff-with-fallback, cached-crx
//! retry, disabled/disk-full error paths, check-only batches and queued
//! cancellation through the client façade.

use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use ceu_engine::collaborators::fs::NoopActionHandler;
use ceu_engine::engine::{self, UpdateEngine};
use ceu_engine::{
    ActionHandler, CancelFlag, CheckComponentInfo, CheckOutcome, Collaborators, CrxCache,
    CrxDownloader, DataSource, DiskSpaceProbe, DownloadOutcome, Installer, Operation, Patcher,
    PersistedData, PingManager, ProgressCallback, Unpacker, UpdateChecker, UpdateClient,
    UpdateContext,
};
use ceu_errors::{codes, ErrorCategory};
use ceu_events::Event;
use ceu_types::{
    CheckResult, CrxComponent, CrxFormatRequirement, CrxUpdateItem, InstallParams, Manifest,
    Package, ResultStatus, SessionId,
};
use semver::Version;

fn component(version: &str, fingerprint: &str) -> CrxComponent {
    CrxComponent {
        app_id: "A".to_string(),
        name: "Component A".to_string(),
        pk_hash: vec![1, 2, 3],
        version: Version::parse(version).unwrap(),
        fingerprint: fingerprint.to_string(),
        installer_handle: "fs".to_string(),
        action_handler_handle: Some("noop".to_string()),
        crx_format_requirement: CrxFormatRequirement::CrxAnyVersion,
        updates_enabled: true,
        is_foreground: false,
    }
}

struct FixedDataSource(HashMap<String, CrxComponent>);

#[async_trait]
impl DataSource for FixedDataSource {
    async fn resolve(&self, ids: &[String]) -> Vec<Option<CrxComponent>> {
        ids.iter().map(|id| self.0.get(id).cloned()).collect()
    }
}

struct MockChecker<F>(F);

#[async_trait]
impl<F> UpdateChecker for MockChecker<F>
where
    F: Fn() -> CheckOutcome + Send + Sync,
{
    async fn check(
        &self,
        _components: &[CheckComponentInfo],
        _extra_attrs: &HashMap<String, String>,
    ) -> CheckOutcome {
        (self.0)()
    }
}

fn results_checker(results: Vec<CheckResult>, retry_after_sec: u32) -> MockChecker<impl Fn() -> CheckOutcome + Send + Sync> {
    MockChecker(move || CheckOutcome {
        results: Some(results.clone()),
        error_category: ErrorCategory::None,
        error_code: 0,
        retry_after_sec,
    })
}

fn no_update_result(id: &str) -> CheckResult {
    CheckResult {
        extension_id: id.to_string(),
        status: ResultStatus::NoUpdate,
        crx_urls: Vec::new(),
        crx_diffurls: Vec::new(),
        manifest: None,
        action_run: None,
        custom_attributes: HashMap::new(),
    }
}

fn ok_result(
    id: &str,
    version: &str,
    package: Package,
    crx_urls: Vec<String>,
    crx_diffurls: Vec<String>,
) -> CheckResult {
    CheckResult {
        extension_id: id.to_string(),
        status: ResultStatus::Ok,
        crx_urls,
        crx_diffurls,
        manifest: Some(Manifest {
            version: Version::parse(version).unwrap(),
            run: None,
            arguments: None,
            packages: vec![package],
        }),
        action_run: None,
        custom_attributes: HashMap::new(),
    }
}

enum DownloadScript {
    Ok(Vec<u8>),
    Err(i32, i32),
}

#[derive(Default)]
struct ScriptedDownloader {
    script: Mutex<VecDeque<DownloadScript>>,
    urls_called: Mutex<Vec<String>>,
}

impl ScriptedDownloader {
    fn new(scripts: Vec<DownloadScript>) -> Self {
        Self {
            script: Mutex::new(scripts.into_iter().collect()),
            urls_called: Mutex::new(Vec::new()),
        }
    }

    fn call_count(&self) -> usize {
        self.urls_called.lock().expect("lock").len()
    }
}

#[async_trait]
impl CrxDownloader for ScriptedDownloader {
    async fn download(
        &self,
        url: &str,
        dest_dir: &Path,
        on_progress: ProgressCallback,
        _cancel: CancelFlag,
    ) -> DownloadOutcome {
        self.urls_called.lock().expect("lock").push(url.to_string());
        tokio::fs::create_dir_all(dest_dir).await.expect("create dest dir");

        let next = self.script.lock().expect("lock").pop_front();
        match next {
            Some(DownloadScript::Ok(bytes)) => {
                let path = dest_dir.join("artifact");
                tokio::fs::write(&path, &bytes).await.expect("write artifact");
                on_progress(bytes.len() as i64, bytes.len() as i64);
                DownloadOutcome {
                    error: 0,
                    extra_code1: 0,
                    response_path: Some(path),
                    metrics: ceu_types::DownloadMetrics {
                        url: url.to_string(),
                        downloader_tag: "mock".to_string(),
                        error: 0,
                        extra_code1: 0,
                        downloaded_bytes: bytes.len() as i64,
                        total_bytes: bytes.len() as i64,
                        download_time_ms: 1,
                    },
                }
            }
            Some(DownloadScript::Err(error, extra_code1)) => DownloadOutcome {
                error,
                extra_code1,
                response_path: None,
                metrics: ceu_types::DownloadMetrics::default(),
            },
            None => DownloadOutcome {
                error: -1,
                extra_code1: 0,
                response_path: None,
                metrics: ceu_types::DownloadMetrics::default(),
            },
        }
    }
}

struct OkUnpacker;

#[async_trait]
impl Unpacker for OkUnpacker {
    async fn unpack(
        &self,
        _archive_path: &Path,
        _pk_hash: &[u8],
        _format: CrxFormatRequirement,
        dest_dir: &Path,
    ) -> Result<PathBuf, ceu_errors::UnpackError> {
        tokio::fs::create_dir_all(dest_dir).await.expect("create unpack dir");
        Ok(dest_dir.to_path_buf())
    }
}

struct OkPatcher;

#[async_trait]
impl Patcher for OkPatcher {
    async fn patch(&self, _previous_artifact: &Path, diff_path: &Path, output_path: &Path) -> Result<(), i32> {
        tokio::fs::copy(diff_path, output_path).await.map_err(|_| 1)?;
        Ok(())
    }
}

enum InstallScript {
    Succeed(Vec<i32>),
    Fail(i32),
}

#[derive(Default)]
struct ScriptedInstaller {
    script: Mutex<VecDeque<InstallScript>>,
}

impl ScriptedInstaller {
    fn new(scripts: Vec<InstallScript>) -> Self {
        Self {
            script: Mutex::new(scripts.into_iter().collect()),
        }
    }
}

#[async_trait]
impl Installer for ScriptedInstaller {
    async fn install(
        &self,
        _unpacked_path: &Path,
        _pk_hash: &[u8],
        _params: Option<&InstallParams>,
        on_progress: Arc<dyn Fn(i32) + Send + Sync>,
    ) -> Result<(), i32> {
        match self.script.lock().expect("lock").pop_front() {
            Some(InstallScript::Succeed(samples)) => {
                for sample in samples {
                    on_progress(sample);
                }
                Ok(())
            }
            Some(InstallScript::Fail(code)) => Err(code),
            None => Err(codes::installer::GENERIC_ERROR),
        }
    }
}

#[derive(Default)]
struct RecordingStore {
    pv_fp: Mutex<HashMap<String, (String, String)>>,
}

#[async_trait]
impl PersistedData for RecordingStore {
    async fn get_pv(&self, id: &str) -> Option<String> {
        self.pv_fp.lock().expect("lock").get(id).map(|(pv, _)| pv.clone())
    }

    async fn get_fp(&self, id: &str) -> Option<String> {
        self.pv_fp.lock().expect("lock").get(id).map(|(_, fp)| fp.clone())
    }

    async fn set_pv_fp(&self, id: &str, pv: &str, fp: &str) -> ceu_errors::Result<()> {
        self.pv_fp
            .lock()
            .expect("lock")
            .insert(id.to_string(), (pv.to_string(), fp.to_string()));
        Ok(())
    }
}

#[async_trait]
impl PingManager for RecordingStore {
    async fn send_ping(&self, _session_id: SessionId, _component_id: &str, _events: Vec<Event>) -> ceu_errors::Result<()> {
        Ok(())
    }
}

struct FixedSpace(i64);

impl DiskSpaceProbe for FixedSpace {
    fn available_space(&self, _path: &Path) -> i64 {
        self.0
    }
}

#[allow(clippy::too_many_arguments)]
fn build_collaborators(
    checker: impl UpdateChecker + 'static,
    downloader: impl CrxDownloader + 'static,
    unpacker: impl Unpacker + 'static,
    patcher: impl Patcher + 'static,
    installer: impl Installer + 'static,
    persisted_data: Arc<RecordingStore>,
    disk_space: i64,
) -> Arc<Collaborators> {
    let mut installers: HashMap<String, Arc<dyn Installer>> = HashMap::new();
    installers.insert("fs".to_string(), Arc::new(installer));

    let mut action_handlers: HashMap<String, Arc<dyn ActionHandler>> = HashMap::new();
    action_handlers.insert("noop".to_string(), Arc::new(NoopActionHandler));

    Arc::new(Collaborators {
        checker: Arc::new(checker),
        downloader: Arc::new(downloader),
        unpacker: Arc::new(unpacker),
        patcher: Arc::new(patcher),
        installers,
        action_handlers,
        persisted_data: persisted_data.clone(),
        ping_manager: persisted_data,
        disk_probe: Arc::new(FixedSpace(disk_space)),
    })
}

/// Same as [`build_collaborators`] but takes an already-`Arc`-wrapped downloader so the
/// caller can keep a handle to it (e.g. to assert on `call_count()` after the run).
fn build_collaborators_shared_downloader(
    checker: impl UpdateChecker + 'static,
    downloader: Arc<dyn CrxDownloader>,
    unpacker: impl Unpacker + 'static,
    patcher: impl Patcher + 'static,
    installer: impl Installer + 'static,
    persisted_data: Arc<RecordingStore>,
    disk_space: i64,
) -> Arc<Collaborators> {
    let mut installers: HashMap<String, Arc<dyn Installer>> = HashMap::new();
    installers.insert("fs".to_string(), Arc::new(installer));

    let mut action_handlers: HashMap<String, Arc<dyn ActionHandler>> = HashMap::new();
    action_handlers.insert("noop".to_string(), Arc::new(NoopActionHandler));

    Arc::new(Collaborators {
        checker: Arc::new(checker),
        downloader,
        unpacker: Arc::new(unpacker),
        patcher: Arc::new(patcher),
        installers,
        action_handlers,
        persisted_data: persisted_data.clone(),
        ping_manager: persisted_data,
        disk_probe: Arc::new(FixedSpace(disk_space)),
    })
}

fn new_context(
    ids: Vec<&str>,
    collaborators: Arc<Collaborators>,
    cache_root: PathBuf,
    work_dir: PathBuf,
    operation: Operation,
) -> UpdateContext {
    UpdateContext::new(
        SessionId::new_v4(),
        operation,
        false,
        ids.into_iter().map(str::to_string).collect(),
        collaborators,
        CrxCache::new(cache_root),
        PathBuf::from("/unused"),
        work_dir,
        CancelFlag::new(),
    )
}

fn states(emitted: &[CrxUpdateItem]) -> Vec<ceu_types::ComponentState> {
    emitted.iter().map(|item| item.state).collect()
}

#[tokio::test]
async fn s1_single_no_update() {
    let data_source = FixedDataSource(HashMap::from([("A".to_string(), component("0.9.0", "fp9"))]));
    let checker = results_checker(vec![no_update_result("A")], 0);
    let downloader = ScriptedDownloader::new(Vec::new());
    let store = Arc::new(RecordingStore::default());
    let collaborators = build_collaborators(checker, downloader, OkUnpacker, OkPatcher, ScriptedInstaller::default(), store, i64::MAX);

    let cache_dir = tempfile::tempdir().unwrap();
    let work_dir = tempfile::tempdir().unwrap();
    let mut context = new_context(vec!["A"], collaborators, cache_dir.path().to_path_buf(), work_dir.path().to_path_buf(), Operation::Update);

    let mut emitted = Vec::new();
    let mut emit = |item: &CrxUpdateItem| emitted.push(item.clone());
    let outcome = UpdateEngine::run(&mut context, &data_source, &mut emit).await.unwrap();

    assert_eq!(outcome.completion, engine::CompletionCode::None);
    assert_eq!(
        states(&emitted),
        vec![ceu_types::ComponentState::Checking, ceu_types::ComponentState::UpToDate]
    );
    assert!(context.components["A"].events.is_empty(), "no terminal event when nothing changed");
}

#[tokio::test]
async fn s2_single_full_update() {
    let data_source = FixedDataSource(HashMap::from([("A".to_string(), component("0.9.0", "fp9"))]));
    let package = Package {
        name: "a.crx".to_string(),
        hash_sha256: "00cb20f892d0be281dcf43a9e99ef98ece566f8760a56ece33575067e02dc606".to_string(),
        namediff: None,
        hashdiff_sha256: None,
        fingerprint: "fp10".to_string(),
        size: 18,
    };
    let checker = results_checker(
        vec![ok_result("A", "1.0.0", package, vec!["https://example/a.crx".to_string()], Vec::new())],
        0,
    );
    let downloader = ScriptedDownloader::new(vec![DownloadScript::Ok(b"full-artifact-A-v1".to_vec())]);
    let installer = ScriptedInstaller::new(vec![InstallScript::Succeed(vec![-1, 50, 100])]);
    let store = Arc::new(RecordingStore::default());
    let collaborators = build_collaborators(checker, downloader, OkUnpacker, OkPatcher, installer, store.clone(), i64::MAX);

    let cache_dir = tempfile::tempdir().unwrap();
    let work_dir = tempfile::tempdir().unwrap();
    let mut context = new_context(vec!["A"], collaborators, cache_dir.path().to_path_buf(), work_dir.path().to_path_buf(), Operation::Update);

    let mut emitted = Vec::new();
    let mut emit = |item: &CrxUpdateItem| emitted.push(item.clone());
    let outcome = UpdateEngine::run(&mut context, &data_source, &mut emit).await.unwrap();

    assert_eq!(outcome.completion, engine::CompletionCode::None);
    let seq = states(&emitted);
    assert_eq!(
        seq,
        vec![
            ceu_types::ComponentState::Checking,
            ceu_types::ComponentState::CanUpdate,
            ceu_types::ComponentState::Downloading,
            ceu_types::ComponentState::Updating,
            ceu_types::ComponentState::Updating,
            ceu_types::ComponentState::Updating,
            ceu_types::ComponentState::Updated,
        ]
    );
    assert_eq!(store.get_pv("A").await, Some("1.0.0".to_string()));
    assert_eq!(store.get_fp("A").await, Some("fp10".to_string()));

    // The download reported progress, but every `Updating` snapshot must
    // show no bytes in flight - the component is no longer downloading.
    for item in emitted.iter().filter(|i| i.state == ceu_types::ComponentState::Updating) {
        assert_eq!((item.downloaded_bytes, item.total_bytes), (-1, -1));
    }

    let events = &context.components["A"].events;
    assert_eq!(events.len(), 1);
    let terminal = &events[0];
    assert_eq!(terminal.eventresult, 1);
    assert_eq!(terminal.errorcat, ErrorCategory::None);
    assert_eq!(terminal.errorcode, 0);
    assert_eq!(terminal.previousversion, Some(Version::parse("0.9.0").unwrap()));
    assert_eq!(terminal.nextversion, Some(Version::parse("1.0.0").unwrap()));
}

#[tokio::test]
async fn s3_two_components_server_omits_one() {
    let data_source = FixedDataSource(HashMap::from([
        ("A".to_string(), component("0.9.0", "fp9")),
        ("B".to_string(), component("2.0.0", "fpb")),
    ]));
    let package = Package {
        name: "a.crx".to_string(),
        hash_sha256: "00cb20f892d0be281dcf43a9e99ef98ece566f8760a56ece33575067e02dc606".to_string(),
        namediff: None,
        hashdiff_sha256: None,
        fingerprint: "fp10".to_string(),
        size: 18,
    };
    let checker = results_checker(
        vec![ok_result("A", "1.0.0", package, vec!["https://example/a.crx".to_string()], Vec::new())],
        0,
    );
    let downloader = ScriptedDownloader::new(vec![DownloadScript::Ok(b"full-artifact-A-v1".to_vec())]);
    let installer = ScriptedInstaller::new(vec![InstallScript::Succeed(vec![100])]);
    let store = Arc::new(RecordingStore::default());
    let collaborators = build_collaborators(checker, downloader, OkUnpacker, OkPatcher, installer, store, i64::MAX);

    let cache_dir = tempfile::tempdir().unwrap();
    let work_dir = tempfile::tempdir().unwrap();
    let mut context = new_context(vec!["A", "B"], collaborators, cache_dir.path().to_path_buf(), work_dir.path().to_path_buf(), Operation::Update);

    let mut emitted = Vec::new();
    let mut emit = |item: &CrxUpdateItem| emitted.push(item.clone());
    UpdateEngine::run(&mut context, &data_source, &mut emit).await.unwrap();

    assert_eq!(context.components["A"].item.state, ceu_types::ComponentState::Updated);
    assert_eq!(context.components["B"].item.state, ceu_types::ComponentState::UpdateError);
    assert_eq!(context.components["B"].item.error_category, ErrorCategory::Service);
    assert_eq!(context.components["B"].item.error_code, codes::service::UPDATE_RESPONSE_NOT_FOUND);
}

#[tokio::test]
async fn s4_diff_fails_full_succeeds() {
    let data_source = FixedDataSource(HashMap::from([("A".to_string(), component("1.0.0", "fp21"))]));
    let cache_dir = tempfile::tempdir().unwrap();
    let cache = CrxCache::new(cache_dir.path().to_path_buf());
    let previous = tempfile::tempdir().unwrap();
    let previous_artifact = previous.path().join("prev.crx");
    tokio::fs::write(&previous_artifact, b"previous-bytes").await.unwrap();
    cache.store("A", "fp21", &previous_artifact).await.unwrap();

    let package = Package {
        name: "a.crx".to_string(),
        hash_sha256: "b33cf8076e18a774b33cba04ea2f65a64f7a7a6b59ab0cb465e398c3411ee82b".to_string(),
        namediff: Some("a.diff".to_string()),
        hashdiff_sha256: None,
        fingerprint: "fp22".to_string(),
        size: 27,
    };
    let checker = results_checker(
        vec![ok_result(
            "A",
            "1.1.0",
            package,
            vec!["https://example/a-full.crx".to_string()],
            vec!["https://example/a.diff".to_string()],
        )],
        0,
    );
    let downloader = ScriptedDownloader::new(vec![
        DownloadScript::Err(-1, 0),
        DownloadScript::Ok(b"full-artifact-A-v1-fallback".to_vec()),
    ]);
    let installer = ScriptedInstaller::new(vec![InstallScript::Succeed(vec![100])]);
    let store = Arc::new(RecordingStore::default());
    let collaborators = build_collaborators(checker, downloader, OkUnpacker, OkPatcher, installer, store, i64::MAX);

    let work_dir = tempfile::tempdir().unwrap();
    let mut context = new_context(vec!["A"], collaborators, cache_dir.path().to_path_buf(), work_dir.path().to_path_buf(), Operation::Update);

    let mut emitted = Vec::new();
    let mut emit = |item: &CrxUpdateItem| emitted.push(item.clone());
    UpdateEngine::run(&mut context, &data_source, &mut emit).await.unwrap();

    let seq = states(&emitted);
    assert!(seq.contains(&ceu_types::ComponentState::DownloadingDiff));
    assert!(seq.contains(&ceu_types::ComponentState::Downloading));
    assert_eq!(context.components["A"].item.state, ceu_types::ComponentState::Updated);

    let terminal = &context.components["A"].events[0];
    assert!(terminal.diff_update_failed());
    assert_eq!(terminal.differrorcat, ErrorCategory::Download);
    assert_eq!(terminal.differrorcode, -1);
    assert_eq!(terminal.errorcat, ErrorCategory::None);
    assert_eq!(terminal.errorcode, 0);
}

#[tokio::test]
async fn s5_diff_falls_back_on_missing_cached_artifact() {
    let data_source = FixedDataSource(HashMap::from([("A".to_string(), component("1.0.0", "fp21"))]));
    let cache_dir = tempfile::tempdir().unwrap();
    // No cached previous artifact for fp21: the diff is attempted but has
    // nothing on disk to patch against.

    let package = Package {
        name: "a.crx".to_string(),
        hash_sha256: "e0f768812e52169f572d906f5b38dff7b363e9ebb1b0d92380072c5c992402d8".to_string(),
        namediff: Some("a.diff".to_string()),
        hashdiff_sha256: None,
        fingerprint: "fp22".to_string(),
        size: 21,
    };
    let checker = results_checker(
        vec![ok_result(
            "A",
            "1.1.0",
            package,
            vec!["https://example/a-full.crx".to_string()],
            vec!["https://example/a.diff".to_string()],
        )],
        0,
    );
    let downloader = ScriptedDownloader::new(vec![DownloadScript::Ok(b"full-artifact-A-v1-s5".to_vec())]);
    let installer = ScriptedInstaller::new(vec![InstallScript::Succeed(vec![100])]);
    let store = Arc::new(RecordingStore::default());
    let collaborators = build_collaborators(checker, downloader, OkUnpacker, OkPatcher, installer, store, i64::MAX);

    let work_dir = tempfile::tempdir().unwrap();
    let mut context = new_context(vec!["A"], collaborators, cache_dir.path().to_path_buf(), work_dir.path().to_path_buf(), Operation::Update);

    let mut emitted = Vec::new();
    let mut emit = |item: &CrxUpdateItem| emitted.push(item.clone());
    UpdateEngine::run(&mut context, &data_source, &mut emit).await.unwrap();

    // No cached previous artifact to patch against: the missing-artifact
    // diff failure is recorded and the pipeline falls back to a full
    // download, which succeeds.
    assert!(states(&emitted).contains(&ceu_types::ComponentState::DownloadingDiff));
    assert!(states(&emitted).contains(&ceu_types::ComponentState::Downloading));
    assert_eq!(context.components["A"].item.state, ceu_types::ComponentState::Updated);

    let terminal = &context.components["A"].events[0];
    assert!(terminal.diff_update_failed());
    assert_eq!(terminal.differrorcat, ErrorCategory::Download);
    assert_eq!(terminal.differrorcode, codes::download::MISSING_CACHED_CRX);
    assert_eq!(terminal.errorcat, ErrorCategory::None);
    assert_eq!(terminal.errorcode, 0);
}

#[tokio::test]
async fn s6_installer_retry_skips_download_on_cached_artifact() {
    let data_source = FixedDataSource(HashMap::from([("A".to_string(), component("0.9.0", "fp9"))]));
    let package = Package {
        name: "a.crx".to_string(),
        hash_sha256: "c17070c249aa90b8a30398b313b65e4fa8f787e550505ffc892d4f6638cdad60".to_string(),
        namediff: None,
        hashdiff_sha256: None,
        fingerprint: "fpnew".to_string(),
        size: 21,
    };

    let cache_dir = tempfile::tempdir().unwrap();
    let work_dir = tempfile::tempdir().unwrap();
    let store = Arc::new(RecordingStore::default());

    // First batch: installer fails, but the artifact is already cached by
    // the time install runs (the pipeline caches after download, before install).
    {
        let checker = results_checker(
            vec![ok_result("A", "1.0.0", package.clone(), vec!["https://example/a.crx".to_string()], Vec::new())],
            0,
        );
        let downloader = ScriptedDownloader::new(vec![DownloadScript::Ok(b"full-artifact-A-v1-s6".to_vec())]);
        let installer = ScriptedInstaller::new(vec![InstallScript::Fail(codes::installer::GENERIC_ERROR)]);
        let collaborators = build_collaborators(checker, downloader, OkUnpacker, OkPatcher, installer, store.clone(), i64::MAX);

        let mut context = new_context(vec!["A"], collaborators, cache_dir.path().to_path_buf(), work_dir.path().to_path_buf(), Operation::Update);
        let mut emitted = Vec::new();
        let mut emit = |item: &CrxUpdateItem| emitted.push(item.clone());
        UpdateEngine::run(&mut context, &data_source, &mut emit).await.unwrap();

        assert_eq!(context.components["A"].item.state, ceu_types::ComponentState::UpdateError);
        assert_eq!(context.components["A"].item.error_category, ErrorCategory::Installer);
        assert_eq!(context.components["A"].item.error_code, codes::installer::GENERIC_ERROR);
    }

    let cache = CrxCache::new(cache_dir.path().to_path_buf());
    assert!(cache.lookup("A", "fpnew").await.is_some(), "artifact survives a failed install");

    // Second batch at the same response: the cache hit skips straight to
    // UPDATING, no DOWNLOADING state at all.
    {
        let checker = results_checker(
            vec![ok_result("A", "1.0.0", package, vec!["https://example/a.crx".to_string()], Vec::new())],
            0,
        );
        let downloader = ScriptedDownloader::new(Vec::new());
        let installer = ScriptedInstaller::new(vec![InstallScript::Succeed(vec![50, 100])]);
        let collaborators = build_collaborators(checker, downloader, OkUnpacker, OkPatcher, installer, store.clone(), i64::MAX);

        let mut context = new_context(vec!["A"], collaborators, cache_dir.path().to_path_buf(), work_dir.path().to_path_buf(), Operation::Update);
        let mut emitted = Vec::new();
        let mut emit = |item: &CrxUpdateItem| emitted.push(item.clone());
        UpdateEngine::run(&mut context, &data_source, &mut emit).await.unwrap();

        let seq = states(&emitted);
        assert!(!seq.contains(&ceu_types::ComponentState::Downloading));
        assert!(!seq.contains(&ceu_types::ComponentState::DownloadingDiff));
        assert_eq!(context.components["A"].item.state, ceu_types::ComponentState::Updated);
    }
}

#[tokio::test]
async fn s7_updates_disabled_client_side() {
    let mut crx = component("0.9.0", "fp9");
    crx.updates_enabled = false;
    let data_source = FixedDataSource(HashMap::from([("A".to_string(), crx)]));

    let package = Package {
        name: "a.crx".to_string(),
        hash_sha256: "00cb20f892d0be281dcf43a9e99ef98ece566f8760a56ece33575067e02dc606".to_string(),
        namediff: None,
        hashdiff_sha256: None,
        fingerprint: "fp10".to_string(),
        size: 18,
    };
    let checker = results_checker(
        vec![ok_result("A", "1.0.0", package, vec!["https://example/a.crx".to_string()], Vec::new())],
        0,
    );
    let downloader = ScriptedDownloader::new(Vec::new());
    let store = Arc::new(RecordingStore::default());
    let collaborators = build_collaborators(checker, downloader, OkUnpacker, OkPatcher, ScriptedInstaller::default(), store, i64::MAX);

    let cache_dir = tempfile::tempdir().unwrap();
    let work_dir = tempfile::tempdir().unwrap();
    let mut context = new_context(vec!["A"], collaborators, cache_dir.path().to_path_buf(), work_dir.path().to_path_buf(), Operation::Update);

    let mut emitted = Vec::new();
    let mut emit = |item: &CrxUpdateItem| emitted.push(item.clone());
    UpdateEngine::run(&mut context, &data_source, &mut emit).await.unwrap();

    assert_eq!(
        states(&emitted),
        vec![
            ceu_types::ComponentState::Checking,
            ceu_types::ComponentState::CanUpdate,
            ceu_types::ComponentState::UpdateError,
        ]
    );
    let terminal = &context.components["A"].events[0];
    assert_eq!(terminal.errorcat, ErrorCategory::Service);
    assert_eq!(terminal.errorcode, codes::service::UPDATE_DISABLED);
}

#[tokio::test]
async fn s8_disk_full_fetches_no_bytes() {
    let data_source = FixedDataSource(HashMap::from([("A".to_string(), component("0.9.0", "fp9"))]));
    let package = Package {
        name: "a.crx".to_string(),
        hash_sha256: "00cb20f892d0be281dcf43a9e99ef98ece566f8760a56ece33575067e02dc606".to_string(),
        namediff: None,
        hashdiff_sha256: None,
        fingerprint: "fp10".to_string(),
        size: 18,
    };
    let checker = results_checker(
        vec![ok_result("A", "1.0.0", package, vec!["https://example/a.crx".to_string()], Vec::new())],
        0,
    );
    let downloader = Arc::new(ScriptedDownloader::new(vec![DownloadScript::Ok(b"full-artifact-A-v1".to_vec())]));
    let store = Arc::new(RecordingStore::default());
    let collaborators = build_collaborators_shared_downloader(checker, downloader.clone(), OkUnpacker, OkPatcher, ScriptedInstaller::default(), store, 0);

    let cache_dir = tempfile::tempdir().unwrap();
    let work_dir = tempfile::tempdir().unwrap();
    let mut context = new_context(vec!["A"], collaborators, cache_dir.path().to_path_buf(), work_dir.path().to_path_buf(), Operation::Update);

    let mut emitted = Vec::new();
    let mut emit = |item: &CrxUpdateItem| emitted.push(item.clone());
    UpdateEngine::run(&mut context, &data_source, &mut emit).await.unwrap();

    assert_eq!(
        states(&emitted),
        vec![
            ceu_types::ComponentState::Checking,
            ceu_types::ComponentState::CanUpdate,
            ceu_types::ComponentState::UpdateError,
        ]
    );
    let terminal = &context.components["A"].events[0];
    assert_eq!(terminal.errorcat, ErrorCategory::Download);
    assert_eq!(terminal.errorcode, codes::download::DISK_FULL);
    assert_eq!(downloader.call_count(), 0, "the disk-space gate must run before any bytes are fetched");
}

#[tokio::test]
async fn s9_check_for_update_stops_at_can_update() {
    let data_source = FixedDataSource(HashMap::from([("A".to_string(), component("0.9.0", "fp9"))]));
    let package = Package {
        name: "a.crx".to_string(),
        hash_sha256: "00cb20f892d0be281dcf43a9e99ef98ece566f8760a56ece33575067e02dc606".to_string(),
        namediff: None,
        hashdiff_sha256: None,
        fingerprint: "fp10".to_string(),
        size: 18,
    };
    let checker = results_checker(
        vec![ok_result("A", "1.0.0", package, vec!["https://example/a.crx".to_string()], Vec::new())],
        0,
    );
    let downloader = ScriptedDownloader::new(Vec::new());
    let store = Arc::new(RecordingStore::default());
    let collaborators = build_collaborators(checker, downloader, OkUnpacker, OkPatcher, ScriptedInstaller::default(), store, i64::MAX);

    let cache_dir = tempfile::tempdir().unwrap();
    let work_dir = tempfile::tempdir().unwrap();
    let mut context = new_context(
        vec!["A"],
        collaborators,
        cache_dir.path().to_path_buf(),
        work_dir.path().to_path_buf(),
        Operation::CheckForUpdate,
    );

    let mut emitted = Vec::new();
    let mut emit = |item: &CrxUpdateItem| emitted.push(item.clone());
    let outcome = UpdateEngine::run(&mut context, &data_source, &mut emit).await.unwrap();

    assert_eq!(outcome.completion, engine::CompletionCode::None);
    assert_eq!(
        states(&emitted),
        vec![ceu_types::ComponentState::Checking, ceu_types::ComponentState::CanUpdate]
    );

    let terminal = &context.components["A"].events[0];
    assert_eq!(terminal.errorcat, ErrorCategory::Service);
    assert_eq!(terminal.errorcode, codes::service::CHECK_FOR_UPDATE_ONLY);
}

/// Blocks inside `check()` until released, so a test can deterministically
/// observe a batch sitting "in flight" (already popped off the client's
/// queue) while a second batch is still queued behind it.
struct GatedChecker {
    entered: Arc<tokio::sync::Notify>,
    release: Arc<tokio::sync::Notify>,
}

#[async_trait]
impl UpdateChecker for GatedChecker {
    async fn check(&self, _components: &[CheckComponentInfo], _extra_attrs: &HashMap<String, String>) -> CheckOutcome {
        self.entered.notify_one();
        self.release.notified().await;
        CheckOutcome {
            results: Some(vec![no_update_result("A")]),
            error_category: ErrorCategory::None,
            error_code: 0,
            retry_after_sec: 0,
        }
    }
}

#[tokio::test]
async fn s10_stop_cancels_only_queued_batches() {
    let entered = Arc::new(tokio::sync::Notify::new());
    let release = Arc::new(tokio::sync::Notify::new());
    let checker = GatedChecker {
        entered: entered.clone(),
        release: release.clone(),
    };
    let store = Arc::new(RecordingStore::default());
    let collaborators = build_collaborators(
        checker,
        ScriptedDownloader::default(),
        OkUnpacker,
        OkPatcher,
        ScriptedInstaller::default(),
        store,
        i64::MAX,
    );

    let cache_dir = tempfile::tempdir().unwrap();
    let work_dir = tempfile::tempdir().unwrap();
    let client = UpdateClient::new(collaborators, cache_dir.path().to_path_buf(), work_dir.path().to_path_buf());

    let data_source: Arc<dyn DataSource> = Arc::new(FixedDataSource(HashMap::from([(
        "A".to_string(),
        component("0.9.0", "fp9"),
    )])));

    let (first_tx, first_rx) = tokio::sync::oneshot::channel();
    client.check_for_update("A".to_string(), data_source.clone(), None, false, move |code| {
        let _ = first_tx.send(code);
    });

    // Wait until the worker has actually popped the first job and entered
    // its (blocked) update check, so it is no longer sitting in the queue.
    entered.notified().await;

    let (second_tx, second_rx) = tokio::sync::oneshot::channel();
    client.check_for_update("A".to_string(), data_source, None, false, move |code| {
        let _ = second_tx.send(code);
    });

    client.stop();
    assert_eq!(second_rx.await.unwrap(), ceu_engine::CompletionCode::UpdateCanceled);

    release.notify_one();
    assert_eq!(first_rx.await.unwrap(), ceu_engine::CompletionCode::None);
}
