#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Data model for the component update engine.
//!
//! This crate holds the shapes shared across collaborator boundaries:
//! component identity and configuration, per-id progress/state snapshots,
//! the parsed update-check response, and install parameters. It owns no
//! behavior beyond small accessors and constructors.

pub mod check;
pub mod component;
pub mod download;
pub mod install_params;
pub mod item;
pub mod state;

pub use check::{CheckResult, Manifest, Package, ResultStatus};
pub use component::{CrxComponent, CrxFormatRequirement};
pub use download::DownloadMetrics;
pub use install_params::InstallParams;
pub use item::CrxUpdateItem;
pub use state::ComponentState;

pub use semver::Version;

/// Opaque app/component identifier.
pub type ComponentId = String;

/// Opaque globally-unique session identifier tagging every event in a batch.
pub type SessionId = uuid::Uuid;
