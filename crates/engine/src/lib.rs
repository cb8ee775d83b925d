#![deny(clippy::pedantic)]
#![allow(clippy::module_name_repetitions, unsafe_code)]

//! Per-component update state machine, batch scheduler and client façade.
//!
//! [`UpdateClient`](client::UpdateClient) is the intended entry point: it
//! owns the cross-batch throttle and observer set and serializes batches
//! behind one worker. [`UpdateEngine`](engine::UpdateEngine) drives a single
//! already-built [`UpdateContext`](context::UpdateContext) to completion and
//! is exposed directly for callers (and tests) that want to build their own
//! batch loop instead.

pub mod cache;
pub mod client;
pub mod collaborators;
pub mod component;
pub mod context;
pub mod engine;
pub mod fs_probe;
pub mod hashing;
pub mod throttle;
pub mod traits;

pub use cache::CrxCache;
pub use client::{CancelHandle, CompletionCode, UpdateClient};
pub use component::Component;
pub use context::{Collaborators, Operation, UpdateContext};
pub use engine::UpdateEngine;
pub use fs_probe::StatvfsDiskSpaceProbe;
pub use throttle::Throttle;
pub use traits::{
    ActionHandler, CancelFlag, CheckComponentInfo, CheckOutcome, CrxDownloader, DataSource,
    DiskSpaceProbe, DownloadOutcome, Installer, Patcher, PersistedData, PingManager,
    ProgressCallback, Unpacker, UpdateChecker,
};
