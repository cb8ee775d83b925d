#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Default HTTP-backed [`ceu_engine::UpdateChecker`] and
//! [`ceu_engine::CrxDownloader`] implementations. The engine itself never
//! depends on this crate: any transport can be wired in by implementing the
//! two traits directly.

pub mod checker;
pub mod client;
pub mod downloader;

pub use checker::JsonUpdateChecker;
pub use client::HttpClient;
pub use downloader::HttpCrxDownloader;
