use std::collections::HashMap;

use ceu_errors::ErrorCategory;
use serde::{Deserialize, Serialize};

use crate::component::CrxComponent;
use crate::state::ComponentState;

/// Observable snapshot of one component's progress, emitted to observers on
/// every state transition and on every progress-bearing callback.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrxUpdateItem {
    pub id: String,
    pub state: ComponentState,
    pub component: Option<CrxComponent>,
    pub error_category: ErrorCategory,
    pub error_code: i32,
    pub extra_code1: i32,
    /// `(-1, -1)` whenever `state` is not a downloading state.
    pub downloaded_bytes: i64,
    pub total_bytes: i64,
    /// `-1` (indeterminate) or `0..=100`; non-decreasing within one
    /// `UPDATING`/`UPDATING_DIFF` run.
    pub install_progress: i32,
    /// Server-extension keys (leading underscore) forwarded verbatim.
    pub custom_updatecheck_data: HashMap<String, String>,
}

impl CrxUpdateItem {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            state: ComponentState::New,
            component: None,
            error_category: ErrorCategory::None,
            error_code: 0,
            extra_code1: 0,
            downloaded_bytes: -1,
            total_bytes: -1,
            install_progress: -1,
            custom_updatecheck_data: HashMap::new(),
        }
    }

    #[must_use]
    pub fn is_downloading(&self) -> bool {
        matches!(
            self.state,
            ComponentState::Downloading | ComponentState::DownloadingDiff
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_item_has_no_progress() {
        let item = CrxUpdateItem::new("app1");
        assert_eq!(item.state, ComponentState::New);
        assert_eq!((item.downloaded_bytes, item.total_bytes), (-1, -1));
        assert_eq!(item.install_progress, -1);
        assert_eq!(item.error_category, ErrorCategory::None);
    }

    #[test]
    fn is_downloading_matches_downloading_states_only() {
        let mut item = CrxUpdateItem::new("app1");
        for state in [
            ComponentState::New,
            ComponentState::Checking,
            ComponentState::CanUpdate,
            ComponentState::Updating,
            ComponentState::Updated,
        ] {
            item.state = state;
            assert!(!item.is_downloading(), "{state:?} should not be downloading");
        }
        for state in [ComponentState::Downloading, ComponentState::DownloadingDiff] {
            item.state = state;
            assert!(item.is_downloading(), "{state:?} should be downloading");
        }
    }
}
