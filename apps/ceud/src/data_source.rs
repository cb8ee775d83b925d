//! [`DataSource`] backed by a JSON file: `{ "<id>": <CrxComponent> }`.

use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use ceu_engine::DataSource;
use ceu_types::CrxComponent;

pub struct FileDataSource {
    components: HashMap<String, CrxComponent>,
}

impl FileDataSource {
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or does not parse as a
    /// `{ id: CrxComponent }` map.
    pub async fn load(path: &Path) -> Result<Self, ceu_errors::Error> {
        let contents = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| ceu_errors::Error::internal(format!("reading registry {}: {e}", path.display())))?;
        let components = serde_json::from_str(&contents)
            .map_err(|e| ceu_errors::Error::internal(format!("parsing registry {}: {e}", path.display())))?;
        Ok(Self { components })
    }

    #[must_use]
    pub fn ids(&self) -> Vec<String> {
        self.components.keys().cloned().collect()
    }
}

#[async_trait]
impl DataSource for FileDataSource {
    async fn resolve(&self, ids: &[String]) -> Vec<Option<CrxComponent>> {
        ids.iter().map(|id| self.components.get(id).cloned()).collect()
    }
}
