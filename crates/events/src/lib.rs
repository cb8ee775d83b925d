#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Ping/event records and observer fan-out for the component update engine.
//!
//! Every observable state transition flows through [`ObserverSet`]; every
//! wire-level occurrence worth reporting to the update service accumulates
//! on a component as an [`Event`] until the batch flushes them through a
//! `PingManager` (defined in `ceu-engine`, which is the trait's consumer).

pub mod event;
pub mod observer;

pub use event::{Event, EventType};
pub use observer::{Observer, ObserverSet};
