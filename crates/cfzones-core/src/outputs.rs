// # Run Outputs
//
// Named values exported by a run for consumption by other infrastructure
// programs, e.g. the Cloudflare zone id of every declared zone:
//
// ```json
// {
//   "zone_ids": {
//     "main-com": "023e105f4ecef8ad9ca31a8372d0c353"
//   }
// }
// ```
//
// ## Persistence
//
// `write_to_file` writes to a temporary sibling first and renames it into
// place, so readers never observe a half-written file.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::{Error, Result};

/// Output group holding zone ids keyed by zone identity
pub const ZONE_IDS: &str = "zone_ids";

/// Exported values, grouped by name
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Outputs {
    groups: BTreeMap<String, BTreeMap<String, String>>,
}

impl Outputs {
    /// Create an empty set of outputs
    pub fn new() -> Self {
        Self::default()
    }

    /// Export a value, returning the value it replaced
    pub fn export(
        &mut self,
        group: impl Into<String>,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Option<String> {
        let name = name.into();
        let previous = self
            .groups
            .entry(group.into())
            .or_default()
            .insert(name.clone(), value.into());
        if previous.is_some() {
            tracing::warn!("Output {} exported twice, keeping the latest value", name);
        }
        previous
    }

    /// Look up one exported value
    pub fn get(&self, group: &str, name: &str) -> Option<&str> {
        self.groups.get(group)?.get(name).map(String::as_str)
    }

    /// All values of one group
    pub fn group(&self, group: &str) -> Option<&BTreeMap<String, String>> {
        self.groups.get(group)
    }

    /// Total number of exported values
    pub fn len(&self) -> usize {
        self.groups.values().map(BTreeMap::len).sum()
    }

    /// Whether nothing was exported
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Render the outputs as pretty-printed JSON
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Atomically write the outputs as JSON
    pub async fn write_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let json = self.to_json()?;

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            fs::create_dir_all(parent).await.map_err(|e| {
                Error::Other(format!(
                    "Failed to create outputs directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        // Never the target itself, even when it ends in `.tmp`
        let temp_path = temp_path_for(path);
        {
            let mut file = fs::File::create(&temp_path).await?;
            file.write_all(json.as_bytes()).await?;
            file.sync_all().await?;
        }
        fs::rename(&temp_path, path).await?;

        tracing::debug!("Wrote {} output(s) to {}", self.len(), path.display());
        Ok(())
    }
}

/// Sibling path used while writing `path`
fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".tmp");
    PathBuf::from(name)
}
