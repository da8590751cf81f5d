use std::fs;
use std::io::Write;
use std::path::{Component, Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::debug;

use super::PlanStore;
use crate::error::StoreError;
use crate::plan::Plan;

/// One pretty-printed JSON file per plan: `<dir>/<plan_id>.json`.
#[derive(Debug, Clone)]
pub struct JsonPlanStore {
    dir: PathBuf,
}

impl JsonPlanStore {
    pub fn new<P: Into<PathBuf>>(dir: P) -> Result<Self, StoreError> {
        let dir = dir.into();
        if !dir.exists() {
            fs::create_dir_all(&dir).map_err(|source| StoreError::Io {
                path: dir.clone(),
                source,
            })?;
        }
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File backing `plan_id`. Ids that are not a single plain path component
    /// are rejected so a plan never lands outside the store directory.
    pub fn path_for(&self, plan_id: &str) -> Result<PathBuf, StoreError> {
        let mut components = Path::new(plan_id).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(name)), None) if name == plan_id => {
                Ok(self.dir.join(format!("{plan_id}.json")))
            }
            _ => Err(StoreError::InvalidPlanId(plan_id.to_string())),
        }
    }

    /// Ids of every stored plan, sorted.
    pub fn list(&self) -> Result<Vec<String>, StoreError> {
        let io_err = |source| StoreError::Io {
            path: self.dir.clone(),
            source,
        };
        let mut ids = Vec::new();
        for entry in fs::read_dir(&self.dir).map_err(io_err)? {
            let path = entry.map_err(io_err)?.path();
            if path.is_file() && path.extension().and_then(|s| s.to_str()) == Some("json") {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    ids.push(stem.to_string());
                }
            }
        }
        ids.sort();
        Ok(ids)
    }
}

impl PlanStore for JsonPlanStore {
    fn save(&self, plan: &Plan) -> Result<(), StoreError> {
        let path = self.path_for(plan.plan_id())?;
        let json = serde_json::to_string_pretty(plan)?;

        // Write next to the target so the rename stays on one filesystem.
        let mut tmp = NamedTempFile::new_in(&self.dir).map_err(|source| StoreError::Io {
            path: self.dir.clone(),
            source,
        })?;
        tmp.write_all(json.as_bytes())
            .and_then(|_| tmp.as_file().sync_all())
            .map_err(|source| StoreError::Io {
                path: tmp.path().to_path_buf(),
                source,
            })?;
        tmp.persist(&path).map_err(|e| StoreError::Io {
            path: path.clone(),
            source: e.error,
        })?;

        debug!(plan_id = plan.plan_id(), path = ?path, tasks = plan.len(), "plan saved");
        Ok(())
    }

    fn load(&self, plan_id: &str) -> Result<Plan, StoreError> {
        let path = self.path_for(plan_id)?;
        if !path.exists() {
            return Err(StoreError::NotFound(plan_id.to_string()));
        }
        let json = fs::read_to_string(&path).map_err(|source| StoreError::Io {
            path: path.clone(),
            source,
        })?;
        serde_json::from_str(&json).map_err(|e| StoreError::Corrupt {
            path,
            reason: e.to_string(),
        })
    }

    fn exists(&self, plan_id: &str) -> bool {
        self.path_for(plan_id).is_ok_and(|path| path.is_file())
    }
}
