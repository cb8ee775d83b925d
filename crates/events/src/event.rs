use ceu_errors::ErrorCategory;
use semver::Version;
use serde::{Deserialize, Serialize};

/// Tag values for [`Event::eventtype`]; only install/update/uninstall are
/// terminal (see [`Event::is_terminal`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(i32)]
pub enum EventType {
    Install = 2,
    Update = 3,
    Uninstall = 4,
    /// Recorded for every download attempt, including diff-fallback failures.
    DownloadAttempt = 14,
    /// Recorded for the post-install action run, if any.
    ActionRun = 42,
}

impl EventType {
    #[must_use]
    pub fn value(self) -> i32 {
        self as i32
    }
}

/// One entry in a component's lazily-accumulated ping history.
///
/// Non-terminal events (e.g. a failed diff-download attempt) are kept in
/// order so the batch's final ping to `PingManager` carries the full
/// history; the terminal event (`eventtype` 2/3/4) is emitted exactly once
/// per component per batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub eventtype: EventType,
    /// `1` for success, `0` for failure; meaning is event-type specific.
    pub eventresult: i32,
    pub errorcat: ErrorCategory,
    pub errorcode: i32,
    pub extracode1: i32,
    pub previousversion: Option<Version>,
    pub nextversion: Option<Version>,
    pub differrorcat: ErrorCategory,
    pub differrorcode: i32,
    /// Set only on [`EventType::DownloadAttempt`] events.
    pub download_url: Option<String>,
}

impl Event {
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self.eventtype,
            EventType::Install | EventType::Update | EventType::Uninstall
        )
    }

    /// Build the non-terminal diff-download-attempt event recorded whenever
    /// a diff update fails and the component falls back to a full download.
    #[must_use]
    pub fn diff_failure(differrorcat: ErrorCategory, differrorcode: i32) -> Self {
        Self {
            eventtype: EventType::DownloadAttempt,
            eventresult: 0,
            errorcat: ErrorCategory::None,
            errorcode: 0,
            extracode1: 0,
            previousversion: None,
            nextversion: None,
            differrorcat,
            differrorcode,
            download_url: None,
        }
    }

    /// Build the non-terminal event recorded for one failed full-download
    /// attempt (before falling through to the next url, if any).
    #[must_use]
    pub fn download_attempt_failure(errorcode: i32, extracode1: i32, url: &str) -> Self {
        Self {
            eventtype: EventType::DownloadAttempt,
            eventresult: 0,
            errorcat: ErrorCategory::Download,
            errorcode,
            extracode1,
            previousversion: None,
            nextversion: None,
            differrorcat: ErrorCategory::None,
            differrorcode: 0,
            download_url: Some(url.to_string()),
        }
    }

    /// Build the single per-component terminal event (`eventtype` 2/3/4),
    /// carrying the final outcome plus whatever diff-fallback error, if any,
    /// preceded it.
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn terminal(
        eventtype: EventType,
        success: bool,
        errorcat: ErrorCategory,
        errorcode: i32,
        extracode1: i32,
        previousversion: Option<Version>,
        nextversion: Option<Version>,
        differrorcat: ErrorCategory,
        differrorcode: i32,
    ) -> Self {
        Self {
            eventtype,
            eventresult: i32::from(success),
            errorcat,
            errorcode,
            extracode1,
            previousversion,
            nextversion,
            differrorcat,
            differrorcode,
            download_url: None,
        }
    }

    /// Whether this terminal event's diff attempt (if any) failed before
    /// falling back to a full update.
    #[must_use]
    pub fn diff_update_failed(&self) -> bool {
        self.differrorcat != ErrorCategory::None
    }

    /// Build the post-install action-run event. Its result never changes
    /// the component's terminal state.
    #[must_use]
    pub fn action_run(success: bool, errorcode: i32) -> Self {
        Self {
            eventtype: EventType::ActionRun,
            eventresult: i32::from(success),
            errorcat: ErrorCategory::None,
            errorcode,
            extracode1: 0,
            previousversion: None,
            nextversion: None,
            differrorcat: ErrorCategory::None,
            differrorcode: 0,
            download_url: None,
        }
    }
}
