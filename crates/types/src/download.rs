use serde::{Deserialize, Serialize};

/// Telemetry reported by `CrxDownloader::on_download_complete`, carried into
/// the non-terminal download-attempt event.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DownloadMetrics {
    pub url: String,
    pub downloader_tag: String,
    /// `0` on success; otherwise a downloader-defined code.
    pub error: i32,
    pub extra_code1: i32,
    pub downloaded_bytes: i64,
    pub total_bytes: i64,
    pub download_time_ms: u64,
}
