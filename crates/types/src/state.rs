use serde::{Deserialize, Serialize};

/// A component's position in the update state machine.
///
/// ```text
/// NEW → CHECKING → {UP_TO_DATE | CAN_UPDATE | UPDATE_ERROR}
/// CAN_UPDATE → DOWNLOADING_DIFF → UPDATING_DIFF → {UPDATED | (fallback) DOWNLOADING}
/// CAN_UPDATE → DOWNLOADING → UPDATING → {UPDATED | UPDATE_ERROR}
/// any → UPDATE_ERROR (terminal for this component this batch)
/// ```
///
/// `UPDATED`, `UP_TO_DATE` and `UPDATE_ERROR` are terminal for the batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ComponentState {
    New,
    Checking,
    UpToDate,
    CanUpdate,
    DownloadingDiff,
    UpdatingDiff,
    Downloading,
    Updating,
    Updated,
    UpdateError,
}

impl ComponentState {
    /// Whether this state is terminal for the current batch: once entered,
    /// the component never re-transitions.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::UpToDate | Self::Updated | Self::UpdateError)
    }
}
