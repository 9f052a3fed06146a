//! Edge directory: the controller's authoritative edge records
//!
//! Persisted as a JSON array of `[id, edge]` pairs:
//!
//! ```json
//! [["999", { "id": "999", "updatedAtMs": 1718000000000, ... }]]
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::edge::{Edge, InstanceId};
use crate::errors::{EdgeError, Result};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<(String, Edge)>", into = "Vec<(String, Edge)>")]
pub struct EdgeDirectory {
    edges: BTreeMap<String, Edge>,
}

impl From<Vec<(String, Edge)>> for EdgeDirectory {
    fn from(pairs: Vec<(String, Edge)>) -> Self {
        EdgeDirectory {
            edges: pairs.into_iter().collect(),
        }
    }
}

impl From<EdgeDirectory> for Vec<(String, Edge)> {
    fn from(directory: EdgeDirectory) -> Self {
        directory.edges.into_iter().collect()
    }
}

impl EdgeDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a directory file; a missing file is an empty directory
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            tracing::info!(path = %path.display(), "No edge directory file, starting empty");
            return Ok(Self::new());
        }

        let content = fs::read_to_string(path)?;
        let directory: EdgeDirectory = serde_json::from_str(&content)
            .map_err(|e| EdgeError::InvalidDirectory(format!("{}: {}", path.display(), e)))?;

        for (key, edge) in &directory.edges {
            if key != &edge.id {
                return Err(EdgeError::InvalidDirectory(format!(
                    "key {} holds edge {}",
                    key, edge.id
                )));
            }
        }

        tracing::info!(path = %path.display(), edges = directory.len(), "Loaded edge directory");
        Ok(directory)
    }

    /// Write the directory through a temp file in the same folder
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let json = serde_json::to_string(self)?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, path)?;

        tracing::debug!(path = %path.display(), edges = self.len(), "Saved edge directory");
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Edge> {
        self.edges.get(id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut Edge> {
        self.edges.get_mut(id)
    }

    /// Insert or replace, returning the previous record
    pub fn insert(&mut self, edge: Edge) -> Option<Edge> {
        self.edges.insert(edge.id.clone(), edge)
    }

    /// Edges in id order
    pub fn values(&self) -> impl Iterator<Item = &Edge> {
        self.edges.values()
    }

    pub fn values_mut(&mut self) -> impl Iterator<Item = &mut Edge> {
        self.edges.values_mut()
    }

    /// Edges changed strictly after `since_ms`
    pub fn updated_since(&self, since_ms: i64) -> Vec<Edge> {
        self.edges
            .values()
            .filter(|edge| edge.updated_at_ms > since_ms)
            .cloned()
            .collect()
    }

    /// Edges with the instance as either endpoint
    pub fn edges_for_instance(&self, instance_id: InstanceId) -> Vec<Edge> {
        self.edges
            .values()
            .filter(|edge| edge.touches(instance_id))
            .cloned()
            .collect()
    }
}
