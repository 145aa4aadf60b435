//! JSON file store.
//!
//! The whole [`Dataset`] lives in one JSON file:
//! ```text
//! shipyard.json
//!   environments, deploy_groups, stages,
//!   variable_groups, variables, sequences, revision, updated_at
//! ```
//! Every commit reloads the file, applies the change to what it found, and
//! writes the result to `<file>.<pid>.tmp` before renaming it over the
//! original, so readers see either the old or the new file. `revision`
//! counts commits. A commit whose base revision is no longer the one on
//! disk when it is about to rename fails with `StoreError::Conflict`.

use std::collections::BTreeSet;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::Deserialize;
use shipyard_application::ports::{
    Clock, FileSystem, FileSystemError, ResolutionSets, StoreError, VariableRepository,
    VariableStore,
};
use shipyard_domain::environment::{
    EnvironmentVariable, KnownScopes, Owner, VariableBatch, VariableGroup,
};
use shipyard_domain::{DeployGroup, DeployGroupId, Environment, Stage, StageId, VariableGroupId};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use super::dataset::Dataset;
use crate::serialization::{SerializationError, from_json_bytes, to_json_stable_bytes};

/// Converts `FileSystemError` to `StoreError`.
fn to_store_error(e: FileSystemError) -> StoreError {
    match e {
        FileSystemError::Io(io_err) => StoreError::Io(io_err),
        FileSystemError::NotFound(path) => StoreError::NotFound(path.display().to_string()),
        FileSystemError::PermissionDenied(path) => StoreError::Io(std::io::Error::new(
            std::io::ErrorKind::PermissionDenied,
            path.display().to_string(),
        )),
    }
}

fn serialization_error(e: SerializationError) -> StoreError {
    StoreError::Serialization(e.to_string())
}

/// Path of the temporary file a commit of process `pid` is written to
/// before the rename.
fn temp_path(path: &Path, pid: u32) -> PathBuf {
    let mut name = path
        .file_name()
        .map_or_else(|| OsString::from("dataset"), OsString::from);
    name.push(format!(".{pid}.tmp"));
    path.with_file_name(name)
}

/// Just the revision of a dataset file.
#[derive(Deserialize)]
struct Revision {
    #[serde(default)]
    revision: u64,
}

/// Store persisting its [`Dataset`] as a JSON file.
#[derive(Debug)]
pub struct JsonFileStore<F, C> {
    fs: F,
    clock: C,
    path: PathBuf,
    dataset: RwLock<Dataset>,
}

impl<F: FileSystem, C: Clock> JsonFileStore<F, C> {
    /// Opens the store at `path`. A missing file is an empty dataset; it is
    /// only created by the first commit.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed, or if it
    /// contains references to records that do not exist.
    pub async fn open(fs: F, clock: C, path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let dataset = load(&fs, &path).await?.unwrap_or_default();

        info!(
            path = %path.display(),
            stages = dataset.stages.len(),
            variables = dataset.variables.len(),
            revision = dataset.revision,
            "opened dataset"
        );
        Ok(Self {
            fs,
            clock,
            path,
            dataset: RwLock::new(dataset),
        })
    }

    /// Returns the dataset file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns a copy of the current dataset.
    pub async fn snapshot(&self) -> Dataset {
        self.dataset.read().await.clone()
    }

    /// Replaces the whole dataset and writes it out.
    ///
    /// # Errors
    /// Returns `StoreError::Invalid` if `dataset` has broken references, or
    /// an error if it cannot be written.
    pub async fn replace(&self, mut dataset: Dataset) -> Result<(), StoreError> {
        dataset.check()?;
        dataset.sync_sequences();
        self.commit(move |current| {
            *current = dataset;
            Ok(())
        })
        .await
    }

    /// Reloads the file, runs `change` against a copy of it, writes the copy
    /// out and only then makes it visible.
    async fn commit<T>(
        &self,
        change: impl FnOnce(&mut Dataset) -> Result<T, StoreError> + Send,
    ) -> Result<T, StoreError> {
        let mut dataset = self.dataset.write().await;
        if let Some(latest) = load(&self.fs, &self.path).await? {
            if latest.revision != dataset.revision {
                debug!(
                    held = dataset.revision,
                    on_disk = latest.revision,
                    "reloaded dataset changed by another writer"
                );
            }
            *dataset = latest;
        }

        let base = dataset.revision;
        let mut next = dataset.clone();
        let value = change(&mut next)?;
        next.revision = base + 1;
        next.updated_at = Some(self.clock.now());

        self.persist(&next, base).await?;
        *dataset = next;
        Ok(value)
    }

    async fn persist(&self, dataset: &Dataset, base: u64) -> Result<(), StoreError> {
        let bytes = to_json_stable_bytes(dataset).map_err(serialization_error)?;
        let temp = temp_path(&self.path, std::process::id());

        self.fs
            .write_file(&temp, &bytes)
            .await
            .map_err(to_store_error)?;
        let result = match self.disk_revision().await {
            Ok(on_disk) if on_disk == base => {
                self.fs.rename(&temp, &self.path).await.map_err(to_store_error)
            }
            Ok(on_disk) => {
                warn!(path = %self.path.display(), base, on_disk, "dataset changed during commit");
                Err(StoreError::Conflict(format!(
                    "dataset changed on disk during commit (revision {on_disk}, expected {base})"
                )))
            }
            Err(e) => Err(e),
        };
        if let Err(e) = result {
            // Best effort; the original file is untouched either way.
            let _ = self.fs.remove_file(&temp).await;
            return Err(e);
        }

        debug!(
            path = %self.path.display(),
            bytes = bytes.len(),
            revision = dataset.revision,
            "wrote dataset"
        );
        Ok(())
    }

    /// Revision of the file on disk; a missing file has revision 0.
    async fn disk_revision(&self) -> Result<u64, StoreError> {
        if !self.fs.exists(&self.path).await {
            return Ok(0);
        }
        let bytes = self.fs.read_file(&self.path).await.map_err(to_store_error)?;
        let header: Revision = from_json_bytes(&bytes).map_err(serialization_error)?;
        Ok(header.revision)
    }
}

/// Reads and checks the dataset at `path`, or `None` if there is no file.
async fn load<F: FileSystem>(fs: &F, path: &Path) -> Result<Option<Dataset>, StoreError> {
    if !fs.exists(path).await {
        return Ok(None);
    }
    let bytes = fs.read_file(path).await.map_err(to_store_error)?;
    let mut dataset: Dataset = from_json_bytes(&bytes).map_err(serialization_error)?;
    dataset.check()?;
    dataset.sync_sequences();
    Ok(Some(dataset))
}

#[async_trait]
impl<F: FileSystem, C: Clock> VariableStore for JsonFileStore<F, C> {
    async fn fetch_stage(&self, stage: StageId) -> Result<Option<Stage>, StoreError> {
        Ok(self.dataset.read().await.stage(stage).cloned())
    }

    async fn fetch_direct(&self, stage: StageId) -> Result<Vec<EnvironmentVariable>, StoreError> {
        Ok(self.dataset.read().await.owned(Owner::Stage(stage)))
    }

    async fn fetch_via_groups(
        &self,
        stage: StageId,
    ) -> Result<Vec<EnvironmentVariable>, StoreError> {
        Ok(self.dataset.read().await.via_groups(stage))
    }

    async fn fetch_resolution_sets(&self, stage: StageId) -> Result<ResolutionSets, StoreError> {
        let dataset = self.dataset.read().await;
        Ok(ResolutionSets {
            direct: dataset.owned(Owner::Stage(stage)),
            via_groups: dataset.via_groups(stage),
        })
    }

    async fn fetch_deploy_group(
        &self,
        deploy_group: DeployGroupId,
    ) -> Result<Option<DeployGroup>, StoreError> {
        Ok(self.dataset.read().await.deploy_group(deploy_group).cloned())
    }

    async fn fetch_owning_environment(
        &self,
        deploy_group: DeployGroupId,
    ) -> Result<Option<Environment>, StoreError> {
        Ok(self
            .dataset
            .read()
            .await
            .owning_environment(deploy_group)
            .cloned())
    }

    async fn fetch_deploy_groups(&self, stage: StageId) -> Result<Vec<DeployGroup>, StoreError> {
        Ok(self.dataset.read().await.deploy_groups_of(stage))
    }

    async fn fetch_known_scopes(&self) -> Result<KnownScopes, StoreError> {
        Ok(self.dataset.read().await.known_scopes())
    }
}

#[async_trait]
impl<F: FileSystem, C: Clock> VariableRepository for JsonFileStore<F, C> {
    async fn list_groups(&self) -> Result<Vec<VariableGroup>, StoreError> {
        Ok(self.dataset.read().await.groups())
    }

    async fn load_group(&self, id: VariableGroupId) -> Result<Option<VariableGroup>, StoreError> {
        Ok(self.dataset.read().await.group(id))
    }

    async fn create_group(
        &self,
        name: &str,
        batch: &VariableBatch,
    ) -> Result<VariableGroup, StoreError> {
        self.commit(|d| d.create_group(name, batch)).await
    }

    async fn update_group(
        &self,
        id: VariableGroupId,
        name: Option<&str>,
        batch: &VariableBatch,
    ) -> Result<VariableGroup, StoreError> {
        self.commit(|d| d.apply_group_batch(id, name, batch)).await
    }

    async fn delete_group(&self, id: VariableGroupId) -> Result<(), StoreError> {
        self.commit(|d| d.remove_group(id)).await
    }

    async fn apply_stage_batch(
        &self,
        stage: StageId,
        batch: &VariableBatch,
    ) -> Result<Vec<EnvironmentVariable>, StoreError> {
        self.commit(|d| d.apply_stage_batch(stage, batch)).await
    }

    async fn assign_groups(
        &self,
        stage: StageId,
        groups: BTreeSet<VariableGroupId>,
    ) -> Result<Stage, StoreError> {
        self.commit(|d| d.assign_groups(stage, groups)).await
    }

    async fn count_variables(&self) -> Result<usize, StoreError> {
        Ok(self.dataset.read().await.variables.len())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::adapters::SystemClock;
    use crate::persistence::TokioFileSystem;
    use parking_lot::Mutex;
    use pretty_assertions::assert_eq;
    use shipyard_domain::EnvironmentId;
    use shipyard_domain::environment::VariableAttributes;
    use tempfile::TempDir;

    /// File system that lets another writer commit right after a temp file
    /// is written.
    struct InterleavedFileSystem {
        inner: TokioFileSystem,
        target: PathBuf,
        other_writer: Mutex<Option<Vec<u8>>>,
    }

    impl FileSystem for InterleavedFileSystem {
        async fn read_file(&self, path: &Path) -> Result<Vec<u8>, FileSystemError> {
            self.inner.read_file(path).await
        }

        async fn write_file(&self, path: &Path, contents: &[u8]) -> Result<(), FileSystemError> {
            let other = self.other_writer.lock().take();
            if let Some(bytes) = other {
                self.inner.write_file(&self.target, &bytes).await?;
            }
            self.inner.write_file(path, contents).await
        }

        async fn rename(&self, from: &Path, to: &Path) -> Result<(), FileSystemError> {
            self.inner.rename(from, to).await
        }

        async fn create_dir_all(&self, path: &Path) -> Result<(), FileSystemError> {
            self.inner.create_dir_all(path).await
        }

        async fn exists(&self, path: &Path) -> bool {
            self.inner.exists(path).await
        }

        async fn remove_file(&self, path: &Path) -> Result<(), FileSystemError> {
            self.inner.remove_file(path).await
        }
    }

    fn stage() -> StageId {
        StageId::new(1).unwrap()
    }

    fn seeded() -> Dataset {
        let production = EnvironmentId::new(1).unwrap();
        let pod = DeployGroupId::new(1).unwrap();
        Dataset::new()
            .with_environment(Environment::new(production, "production"))
            .with_deploy_group(DeployGroup::new(pod, "pod1", production))
            .with_stage(Stage::new(stage(), "production").with_deploy_group(pod))
    }

    fn create(name: &str) -> VariableBatch {
        VariableBatch::new().with("0", VariableAttributes::create(name, "1"))
    }

    async fn open(path: &Path) -> JsonFileStore<TokioFileSystem, SystemClock> {
        JsonFileStore::open(TokioFileSystem::new(), SystemClock::new(), path)
            .await
            .unwrap()
    }

    fn temp_files(dir: &TempDir) -> Vec<PathBuf> {
        std::fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().path())
            .filter(|p| p.extension().is_some_and(|ext| ext == "tmp"))
            .collect()
    }

    #[test]
    fn test_temp_path() {
        assert_eq!(
            temp_path(Path::new("/srv/shipyard.json"), 42),
            PathBuf::from("/srv/shipyard.json.42.tmp")
        );
        assert_eq!(temp_path(Path::new("data"), 7), PathBuf::from("data.7.tmp"));
    }

    #[test]
    fn test_not_found_maps_to_store_not_found() {
        let error = to_store_error(FileSystemError::NotFound(PathBuf::from("/x.json")));
        assert!(matches!(error, StoreError::NotFound(p) if p == "/x.json"));
    }

    #[tokio::test]
    async fn test_commits_count_revisions() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("shipyard.json");
        let store = open(&path).await;

        store.replace(seeded()).await.unwrap();
        store.apply_stage_batch(stage(), &create("A")).await.unwrap();

        assert_eq!(store.snapshot().await.revision, 2);
        assert_eq!(open(&path).await.snapshot().await.revision, 2);
        assert!(temp_files(&dir).is_empty());
    }

    #[tokio::test]
    async fn test_two_stores_on_one_file_keep_both_commits() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("shipyard.json");
        open(&path).await.replace(seeded()).await.unwrap();
        let first = open(&path).await;
        let second = open(&path).await;

        first.apply_stage_batch(stage(), &create("A")).await.unwrap();
        second.create_group("shared", &create("X")).await.unwrap();

        let reopened = open(&path).await;
        assert_eq!(reopened.fetch_direct(stage()).await.unwrap().len(), 1);
        assert_eq!(reopened.list_groups().await.unwrap().len(), 1);
        assert_eq!(reopened.snapshot().await.revision, 3);
    }

    #[tokio::test]
    async fn test_batch_after_stale_read_keeps_other_commit() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("shipyard.json");
        open(&path).await.replace(seeded()).await.unwrap();
        let first = open(&path).await;
        let second = open(&path).await;

        let earlier = second.fetch_direct(stage()).await.unwrap();
        first.apply_stage_batch(stage(), &create("CONCURRENT")).await.unwrap();
        let records = second.apply_stage_batch(stage(), &create("MINE")).await.unwrap();

        assert!(earlier.is_empty());
        let names: Vec<_> = records.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["CONCURRENT", "MINE"]);
        let reopened = open(&path).await;
        assert_eq!(reopened.fetch_direct(stage()).await.unwrap(), records);
    }

    #[tokio::test]
    async fn test_write_during_commit_is_a_conflict() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("shipyard.json");
        open(&path).await.replace(seeded()).await.unwrap();

        let mut theirs = seeded();
        theirs.revision = 2;
        let theirs = to_json_stable_bytes(&theirs).unwrap();
        let fs = InterleavedFileSystem {
            inner: TokioFileSystem::new(),
            target: path.clone(),
            other_writer: Mutex::new(Some(theirs.clone())),
        };
        let store = JsonFileStore::open(fs, SystemClock::new(), &path).await.unwrap();

        let result = store.apply_stage_batch(stage(), &create("A")).await;

        assert!(matches!(result, Err(StoreError::Conflict(_))));
        assert_eq!(std::fs::read(&path).unwrap(), theirs);
        assert!(store.fetch_direct(stage()).await.unwrap().is_empty());
        assert!(temp_files(&dir).is_empty());
    }
}
