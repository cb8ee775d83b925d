//! Default [`CrxDownloader`] collaborator: streams one url to a file under
//! `dest_dir`, reporting `(downloaded, total)` to `on_progress` as chunks
//! arrive and honoring cancellation between chunks.

use std::path::{Path, PathBuf};
use std::time::Instant;

use ceu_engine::{CancelFlag, DownloadOutcome, CrxDownloader, ProgressCallback};
use ceu_types::DownloadMetrics;
use futures::StreamExt;
use tokio::io::AsyncWriteExt;

use crate::client::HttpClient;

pub struct HttpCrxDownloader {
    http: HttpClient,
}

impl HttpCrxDownloader {
    #[must_use]
    pub fn new(http: HttpClient) -> Self {
        Self { http }
    }
}

#[async_trait::async_trait]
impl CrxDownloader for HttpCrxDownloader {
    async fn download(
        &self,
        url: &str,
        dest_dir: &Path,
        on_progress: ProgressCallback,
        cancel: CancelFlag,
    ) -> DownloadOutcome {
        let started = Instant::now();
        let file_name = url.rsplit('/').next().unwrap_or("artifact");
        let dest_path: PathBuf = dest_dir.join(file_name);

        if let Err(e) = tokio::fs::create_dir_all(dest_dir).await {
            return failure(url, 1, e.to_string());
        }

        let response = match self.http.retry(|| self.http.inner().get(url).send()).await {
            Ok(response) => response,
            Err(e) => return failure(url, 1, e.to_string()),
        };

        if !response.status().is_success() {
            return failure(url, i32::from(response.status().as_u16()), response.status().to_string());
        }

        let total_bytes = response.content_length().map_or(-1, |n| i64::try_from(n).unwrap_or(-1));
        on_progress(0, total_bytes);

        let mut file = match tokio::fs::File::create(&dest_path).await {
            Ok(file) => file,
            Err(e) => return failure(url, 1, e.to_string()),
        };

        let mut stream = response.bytes_stream();
        let mut downloaded: i64 = 0;

        while let Some(chunk) = stream.next().await {
            if cancel.is_cancelled() {
                let _ = tokio::fs::remove_file(&dest_path).await;
                return DownloadOutcome {
                    error: -1,
                    extra_code1: 0,
                    response_path: None,
                    metrics: DownloadMetrics {
                        url: url.to_string(),
                        downloader_tag: "http".to_string(),
                        error: -1,
                        extra_code1: 0,
                        downloaded_bytes: downloaded,
                        total_bytes,
                        download_time_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
                    },
                };
            }

            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(e) => return failure(url, 1, e.to_string()),
            };
            if let Err(e) = file.write_all(&chunk).await {
                return failure(url, 1, e.to_string());
            }

            downloaded += i64::try_from(chunk.len()).unwrap_or(0);
            on_progress(downloaded, total_bytes);
        }

        if let Err(e) = file.flush().await {
            return failure(url, 1, e.to_string());
        }

        DownloadOutcome {
            error: 0,
            extra_code1: 0,
            response_path: Some(dest_path),
            metrics: DownloadMetrics {
                url: url.to_string(),
                downloader_tag: "http".to_string(),
                error: 0,
                extra_code1: 0,
                downloaded_bytes: downloaded,
                total_bytes,
                download_time_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
            },
        }
    }
}

fn failure(url: &str, code: i32, message: String) -> DownloadOutcome {
    tracing::warn!(url, code, message, "download attempt failed");
    DownloadOutcome {
        error: code,
        extra_code1: 0,
        response_path: None,
        metrics: DownloadMetrics {
            url: url.to_string(),
            downloader_tag: "http".to_string(),
            error: code,
            extra_code1: 0,
            downloaded_bytes: 0,
            total_bytes: -1,
            download_time_ms: 0,
        },
    }
}
