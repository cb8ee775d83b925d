//! Default [`UpdateChecker`] collaborator: POSTs the batch's
//! [`CheckComponentInfo`] list as JSON and parses the server's per-id
//! results into a [`CheckOutcome`].

use std::collections::HashMap;

use ceu_engine::{CheckComponentInfo, CheckOutcome, UpdateChecker};
use ceu_errors::ErrorCategory;
use ceu_types::{CheckResult, Manifest, Package, ResultStatus};
use serde::{Deserialize, Serialize};

use crate::client::HttpClient;

#[derive(Debug, Serialize)]
struct WireComponent<'a> {
    appid: &'a str,
    version: String,
    fingerprint: &'a str,
    updates_enabled: bool,
    installsource: Option<&'static str>,
}

#[derive(Debug, Serialize)]
struct WireRequest<'a> {
    apps: Vec<WireComponent<'a>>,
    #[serde(flatten)]
    extra_attrs: &'a HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct WirePackage {
    name: String,
    hash_sha256: String,
    namediff: Option<String>,
    hashdiff_sha256: Option<String>,
    fingerprint: String,
    size: i64,
}

impl From<WirePackage> for Package {
    fn from(value: WirePackage) -> Self {
        Self {
            name: value.name,
            hash_sha256: value.hash_sha256,
            namediff: value.namediff,
            hashdiff_sha256: value.hashdiff_sha256,
            fingerprint: value.fingerprint,
            size: value.size,
        }
    }
}

#[derive(Debug, Deserialize)]
struct WireManifest {
    version: semver::Version,
    run: Option<String>,
    arguments: Option<String>,
    packages: Vec<WirePackage>,
}

impl From<WireManifest> for Manifest {
    fn from(value: WireManifest) -> Self {
        Self {
            version: value.version,
            run: value.run,
            arguments: value.arguments,
            packages: value.packages.into_iter().map(Package::from).collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct WireResult {
    extension_id: String,
    status: String,
    #[serde(default)]
    crx_urls: Vec<String>,
    #[serde(default)]
    crx_diffurls: Vec<String>,
    manifest: Option<WireManifest>,
    action_run: Option<String>,
    #[serde(flatten)]
    extra: HashMap<String, serde_json::Value>,
}

fn parse_status(raw: &str) -> ResultStatus {
    match raw {
        "ok" => ResultStatus::Ok,
        "noupdate" => ResultStatus::NoUpdate,
        "error-unknownApplication" => ResultStatus::ErrorUnknownApplication,
        "restricted" => ResultStatus::Restricted,
        "error-invalidAppId" => ResultStatus::ErrorInvalidAppId,
        other => ResultStatus::Other(other.to_string()),
    }
}

/// Keys the server marks as custom data are prefixed with `_`; every other
/// top-level key on a result entry is a field this struct already named.
fn custom_attributes(extra: HashMap<String, serde_json::Value>) -> HashMap<String, String> {
    extra
        .into_iter()
        .filter(|(key, _)| key.starts_with('_'))
        .map(|(key, value)| {
            let value = match value {
                serde_json::Value::String(s) => s,
                other => other.to_string(),
            };
            (key, value)
        })
        .collect()
}

impl From<WireResult> for CheckResult {
    fn from(value: WireResult) -> Self {
        Self {
            extension_id: value.extension_id,
            status: parse_status(&value.status),
            crx_urls: value.crx_urls,
            crx_diffurls: value.crx_diffurls,
            manifest: value.manifest.map(Manifest::from),
            action_run: value.action_run,
            custom_attributes: custom_attributes(value.extra),
        }
    }
}

#[derive(Debug, Deserialize)]
struct WireResponse {
    #[serde(default)]
    results: Vec<WireResult>,
    #[serde(default)]
    retry_after_sec: u32,
}

/// Talks the update-check protocol over HTTP. One `endpoint` per instance;
/// construct a fresh one if the engine needs to check against a different
/// server.
pub struct JsonUpdateChecker {
    http: HttpClient,
    endpoint: String,
}

impl JsonUpdateChecker {
    #[must_use]
    pub fn new(http: HttpClient, endpoint: impl Into<String>) -> Self {
        Self {
            http,
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait::async_trait]
impl UpdateChecker for JsonUpdateChecker {
    async fn check(
        &self,
        components: &[CheckComponentInfo],
        extra_attrs: &HashMap<String, String>,
    ) -> CheckOutcome {
        let apps = components
            .iter()
            .map(|c| WireComponent {
                appid: &c.app_id,
                version: c.version.to_string(),
                fingerprint: &c.fingerprint,
                updates_enabled: c.updates_enabled,
                installsource: c.is_foreground.then_some("ondemand"),
            })
            .collect();
        let body = WireRequest { apps, extra_attrs };

        let response = self
            .http
            .retry(|| self.http.inner().post(&self.endpoint).json(&body).send())
            .await;

        let response = match response {
            Ok(response) => response,
            Err(_) => {
                return CheckOutcome {
                    results: None,
                    error_category: ErrorCategory::UpdateCheck,
                    error_code: ceu_errors::codes::update_check::TRANSPORT_FAILED,
                    retry_after_sec: 0,
                };
            }
        };

        if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after_sec = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse().ok())
                .unwrap_or(3600);
            return CheckOutcome {
                results: None,
                error_category: ErrorCategory::UpdateCheck,
                error_code: ceu_errors::codes::update_check::TRANSPORT_FAILED,
                retry_after_sec,
            };
        }

        if !response.status().is_success() {
            return CheckOutcome {
                results: None,
                error_category: ErrorCategory::UpdateCheck,
                error_code: ceu_errors::codes::update_check::NO_RESPONSE,
                retry_after_sec: 0,
            };
        }

        match response.json::<WireResponse>().await {
            Ok(parsed) => CheckOutcome {
                results: Some(parsed.results.into_iter().map(CheckResult::from).collect()),
                error_category: ErrorCategory::None,
                error_code: 0,
                retry_after_sec: parsed.retry_after_sec,
            },
            Err(_) => CheckOutcome {
                results: None,
                error_category: ErrorCategory::UpdateCheck,
                error_code: ceu_errors::codes::update_check::PARSE_FAILED,
                retry_after_sec: 0,
            },
        }
    }
}
