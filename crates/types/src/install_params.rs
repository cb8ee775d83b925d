use serde::{Deserialize, Serialize};

/// Parameters carried from the manifest into `Installer::install` and, on
/// success, into `ActionHandler::handle`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InstallParams {
    pub run: Option<String>,
    pub arguments: Option<String>,
}
