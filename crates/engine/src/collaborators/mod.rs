//! Reference collaborator implementations that exercise the engine without
//! claiming to be production-grade. Archive format, patch format and
//! signature verification are all Non-goals of the core; `fs` keeps the
//! demonstration binary and integration tests runnable by treating an
//! artifact as an opaque payload file rather than a real crx/zip archive.

pub mod fs;
