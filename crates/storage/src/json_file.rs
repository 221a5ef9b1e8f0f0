//! Single-file JSON store: the whole problem list is rewritten on every change.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracker_core::model::{Problem, ProblemId};

use crate::repository::{
    ProblemPatch, ProblemRecord, ProblemRepository, Storage, StorageError, position_of,
};

const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct Snapshot {
    version: u32,
    problems: Vec<ProblemRecord>,
}

fn io<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Io(e.to_string())
}

/// File-backed repository; the last write wins.
#[derive(Clone)]
pub struct JsonFileRepository {
    path: PathBuf,
    records: Arc<Mutex<Vec<ProblemRecord>>>,
}

impl JsonFileRepository {
    /// Open (or lazily create) the store at `path`.
    ///
    /// A missing file is an empty store; it is created on the first write.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Io` if the file cannot be read and
    /// `StorageError::Serialization` if it is not a valid snapshot.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let path = path.as_ref().to_path_buf();
        let records = if path.exists() {
            let raw = fs::read_to_string(&path).map_err(io)?;
            if raw.trim().is_empty() {
                Vec::new()
            } else {
                let snapshot: Snapshot = serde_json::from_str(&raw)
                    .map_err(|e| StorageError::Serialization(e.to_string()))?;
                if snapshot.version != SNAPSHOT_VERSION {
                    return Err(StorageError::Serialization(format!(
                        "unsupported snapshot version {}",
                        snapshot.version
                    )));
                }
                snapshot.problems
            }
        } else {
            Vec::new()
        };
        tracing::debug!(path = %path.display(), count = records.len(), "opened json store");
        Ok(Self {
            path,
            records: Arc::new(Mutex::new(records)),
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock(&self) -> Result<MutexGuard<'_, Vec<ProblemRecord>>, StorageError> {
        self.records
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))
    }

    /// Writes `next` to disk via a temp file + rename, then swaps it in memory.
    fn commit(
        &self,
        guard: &mut MutexGuard<'_, Vec<ProblemRecord>>,
        next: Vec<ProblemRecord>,
    ) -> Result<(), StorageError> {
        let snapshot = Snapshot {
            version: SNAPSHOT_VERSION,
            problems: next,
        };
        let body = serde_json::to_string_pretty(&snapshot)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(io)?;
        }
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, body).map_err(io)?;
        fs::rename(&tmp, &self.path).map_err(io)?;

        **guard = snapshot.problems;
        Ok(())
    }
}

#[async_trait]
impl ProblemRepository for JsonFileRepository {
    async fn list_all(&self) -> Result<Vec<Problem>, StorageError> {
        let guard = self.lock()?;
        guard.iter().cloned().map(ProblemRecord::into_problem).collect()
    }

    async fn get(&self, id: &ProblemId) -> Result<Problem, StorageError> {
        let guard = self.lock()?;
        let idx = position_of(&guard, id).ok_or(StorageError::NotFound)?;
        guard[idx].clone().into_problem()
    }

    async fn insert(&self, problem: &Problem) -> Result<Problem, StorageError> {
        let mut guard = self.lock()?;
        if position_of(&guard, problem.id()).is_some() {
            return Err(StorageError::Conflict);
        }
        let mut next = guard.clone();
        next.push(ProblemRecord::from_problem(problem));
        self.commit(&mut guard, next)?;
        Ok(problem.clone())
    }

    async fn update_fields(
        &self,
        id: &ProblemId,
        patch: &ProblemPatch,
    ) -> Result<(), StorageError> {
        let mut guard = self.lock()?;
        let idx = position_of(&guard, id).ok_or(StorageError::NotFound)?;
        let mut next = guard.clone();
        patch.apply_to(&mut next[idx]);
        self.commit(&mut guard, next)
    }

    async fn delete(&self, id: &ProblemId) -> Result<(), StorageError> {
        let mut guard = self.lock()?;
        let idx = position_of(&guard, id).ok_or(StorageError::NotFound)?;
        let mut next = guard.clone();
        next.remove(idx);
        self.commit(&mut guard, next)
    }
}

impl Storage {
    /// Build a `Storage` backed by a JSON file.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if an existing file cannot be loaded.
    pub fn json_file(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let repo = JsonFileRepository::open(path)?;
        let problems: Arc<dyn ProblemRepository> = Arc::new(repo);
        Ok(Self { problems })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracker_core::model::ProblemDraft;
    use tracker_core::time::fixed_today;

    fn build_problem(id: &str) -> Problem {
        ProblemDraft::new(id, format!("Problem {id}"))
            .validate(fixed_today())
            .unwrap()
    }

    #[tokio::test]
    async fn missing_file_is_an_empty_store() {
        let dir = tempfile::tempdir().unwrap();
        let repo = JsonFileRepository::open(dir.path().join("nope.json")).unwrap();
        assert!(repo.list_all().await.unwrap().is_empty());
        assert!(!repo.path().exists());
    }

    #[tokio::test]
    async fn writes_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("problems.json");

        let repo = JsonFileRepository::open(&path).unwrap();
        repo.insert(&build_problem("b")).await.unwrap();
        repo.insert(&build_problem("a")).await.unwrap();
        repo.delete(&ProblemId::new("b").unwrap()).await.unwrap();
        repo.insert(&build_problem("c")).await.unwrap();

        let reopened = JsonFileRepository::open(&path).unwrap();
        let ids: Vec<_> = reopened
            .list_all()
            .await
            .unwrap()
            .iter()
            .map(|p| p.id().as_str().to_owned())
            .collect();
        assert_eq!(ids, ["a", "c"]);
    }

    #[tokio::test]
    async fn rejects_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("problems.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            JsonFileRepository::open(&path),
            Err(StorageError::Serialization(_))
        ));
    }
}
