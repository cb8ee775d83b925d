//! Streaming sha-256 of a downloaded artifact, checked against the package
//! manifest's `hash_sha256`/`hashdiff_sha256` before an artifact is handed to
//! the unpacker or patcher.

use std::path::Path;

use sha2::{Digest, Sha256};
use tokio::fs::File;
use tokio::io::AsyncReadExt;

const CHUNK_SIZE: usize = 64 * 1024;

/// Hex-encoded sha-256 digest of the file at `path`.
///
/// # Errors
///
/// Returns an error if the file cannot be opened or read.
pub async fn sha256_hex(path: &Path) -> std::io::Result<String> {
    let mut file = File::open(path).await?;
    let mut hasher = Sha256::new();
    let mut buffer = vec![0_u8; CHUNK_SIZE];

    loop {
        let n = file.read(&mut buffer).await?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
    }

    Ok(hex::encode(hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn hashes_known_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("artifact");
        tokio::fs::write(&path, b"hello world").await.unwrap();

        let digest = sha256_hex(&path).await.unwrap();
        assert_eq!(
            digest,
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde"
        );
    }
}
