//! The per-batch aggregate: an immutable session id, the caller's id
//! ordering, the id → `Component` map, and every collaborator the pipeline
//! needs. `UpdateContext` owns its components by value; a `Component` never
//! holds a reference back.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use ceu_events::EventType;
use ceu_types::SessionId;

use crate::cache::CrxCache;
use crate::component::Component;
use crate::traits::{
    ActionHandler, CancelFlag, CrxDownloader, DiskSpaceProbe, Installer, PersistedData,
    PingManager, Patcher, Unpacker, UpdateChecker,
};

/// Which façade call produced this batch; determines the terminal event's
/// `eventtype` and whether the batch stops at `CAN_UPDATE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Update,
    Install,
    CheckForUpdate,
}

impl Operation {
    #[must_use]
    pub fn event_type(self) -> EventType {
        match self {
            Self::Install => EventType::Install,
            Self::Update | Self::CheckForUpdate => EventType::Update,
        }
    }

    #[must_use]
    pub fn check_only(self) -> bool {
        matches!(self, Self::CheckForUpdate)
    }
}

/// Injected collaborators shared by every component in one batch.
pub struct Collaborators {
    pub checker: Arc<dyn UpdateChecker>,
    pub downloader: Arc<dyn CrxDownloader>,
    pub unpacker: Arc<dyn Unpacker>,
    pub patcher: Arc<dyn Patcher>,
    pub installers: HashMap<String, Arc<dyn Installer>>,
    pub action_handlers: HashMap<String, Arc<dyn ActionHandler>>,
    pub persisted_data: Arc<dyn PersistedData>,
    pub ping_manager: Arc<dyn PingManager>,
    pub disk_probe: Arc<dyn DiskSpaceProbe>,
}

/// One batch: the ordered id list, the resolved component map, the shared
/// collaborators, cache/work directories, and the cancellation flag every
/// in-flight operation watches.
pub struct UpdateContext {
    pub session_id: SessionId,
    pub operation: Operation,
    pub is_foreground: bool,
    pub ids: Vec<String>,
    pub components: HashMap<String, Component>,
    pub collaborators: Arc<Collaborators>,
    pub cache: CrxCache,
    pub cache_root: PathBuf,
    pub work_dir: PathBuf,
    pub cancel: CancelFlag,
}

impl UpdateContext {
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        session_id: SessionId,
        operation: Operation,
        is_foreground: bool,
        ids: Vec<String>,
        collaborators: Arc<Collaborators>,
        cache: CrxCache,
        cache_root: PathBuf,
        work_dir: PathBuf,
        cancel: CancelFlag,
    ) -> Self {
        Self {
            session_id,
            operation,
            is_foreground,
            ids,
            components: HashMap::new(),
            collaborators,
            cache,
            cache_root,
            work_dir,
            cancel,
        }
    }
}
