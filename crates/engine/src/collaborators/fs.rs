//! Filesystem-only `Unpacker`/`Patcher`/`Installer`/`ActionHandler`. An
//! artifact here is just a file; "unpacking" copies it into a directory,
//! "patching" replaces the previous artifact outright, and "installing"
//! copies the unpacked directory into an install root. None of this
//! attempts real archive parsing, binary diffing or signature checking,
//! all of which are out of scope for the core engine.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use ceu_errors::UnpackError;
use ceu_types::{CrxFormatRequirement, InstallParams, SessionId};

use crate::traits::{ActionHandler, Installer, Patcher, Unpacker};

/// Unpacks by copying the archive file into `dest_dir/payload`.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsUnpacker;

#[async_trait]
impl Unpacker for FsUnpacker {
    async fn unpack(
        &self,
        archive_path: &Path,
        _pk_hash: &[u8],
        _format: CrxFormatRequirement,
        dest_dir: &Path,
    ) -> Result<PathBuf, UnpackError> {
        let metadata = tokio::fs::metadata(archive_path)
            .await
            .map_err(|_| UnpackError::FormatUnsupported)?;
        if !metadata.is_file() || metadata.len() == 0 {
            return Err(UnpackError::FormatUnsupported);
        }

        tokio::fs::create_dir_all(dest_dir)
            .await
            .map_err(|e| UnpackError::CollaboratorError { code: io_code(&e) })?;
        tokio::fs::copy(archive_path, dest_dir.join("payload"))
            .await
            .map_err(|e| UnpackError::CollaboratorError { code: io_code(&e) })?;

        Ok(dest_dir.to_path_buf())
    }
}

/// Replaces `previous_artifact` outright with `diff_path`'s content; there
/// is no real binary-diff format to apply here.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsPatcher;

#[async_trait]
impl Patcher for FsPatcher {
    async fn patch(
        &self,
        _previous_artifact: &Path,
        diff_path: &Path,
        output_path: &Path,
    ) -> Result<(), i32> {
        if let Some(parent) = output_path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| io_code(&e))?;
        }
        tokio::fs::copy(diff_path, output_path).await.map_err(|e| io_code(&e))?;
        Ok(())
    }
}

/// Copies an unpacked component directory into `install_root`, reporting
/// coarse 0/50/100 progress since there is no real package layout to walk
/// incrementally.
pub struct FsInstaller {
    install_root: PathBuf,
}

impl FsInstaller {
    #[must_use]
    pub fn new(install_root: PathBuf) -> Self {
        Self { install_root }
    }
}

#[async_trait]
impl Installer for FsInstaller {
    async fn install(
        &self,
        unpacked_path: &Path,
        _pk_hash: &[u8],
        _params: Option<&InstallParams>,
        on_progress: Arc<dyn Fn(i32) + Send + Sync>,
    ) -> Result<(), i32> {
        on_progress(0);

        let name = unpacked_path.file_name().ok_or(1)?;
        let dest = self.install_root.join(name);
        if dest.exists() {
            tokio::fs::remove_dir_all(&dest).await.map_err(|e| io_code(&e))?;
        }

        on_progress(50);
        copy_dir_recursive(unpacked_path, &dest).await.map_err(|e| io_code(&e))?;
        on_progress(100);
        Ok(())
    }
}

fn copy_dir_recursive<'a>(
    src: &'a Path,
    dest: &'a Path,
) -> std::pin::Pin<Box<dyn std::future::Future<Output = std::io::Result<()>> + Send + 'a>> {
    Box::pin(async move {
        tokio::fs::create_dir_all(dest).await?;
        let mut entries = tokio::fs::read_dir(src).await?;
        while let Some(entry) = entries.next_entry().await? {
            let file_type = entry.file_type().await?;
            let from = entry.path();
            let to = dest.join(entry.file_name());
            if file_type.is_dir() {
                copy_dir_recursive(&from, &to).await?;
            } else {
                tokio::fs::copy(&from, &to).await?;
            }
        }
        Ok(())
    })
}

/// Invokes nothing: running an arbitrary `action_path` is out of scope for a
/// reference collaborator. Logs the request and reports success.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopActionHandler;

#[async_trait]
impl ActionHandler for NoopActionHandler {
    async fn handle(&self, action_path: &str, session_id: SessionId) -> Result<(), i32> {
        tracing::debug!(action_path, %session_id, "skipping action run (reference handler)");
        Ok(())
    }
}

fn io_code(e: &std::io::Error) -> i32 {
    e.raw_os_error().unwrap_or(1)
}
