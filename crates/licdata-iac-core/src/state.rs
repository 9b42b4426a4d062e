//! State management for the local backend
//!
//! Manages `.licdata-iac/<project>/<stack>.json`, which records the resources
//! and outputs of the last successful synchronization of one stack, and the
//! sibling `<stack>.lock` that serializes synchronizations. `<stack>.lock.guard`
//! is only ever held for the moment a lock is inspected, taken or released.

use crate::declaration::ResourceConfig;
use crate::error::{IacError, Result};
use crate::runner::StackOutputs;
use crate::stack::StackIdentity;
use chrono::{DateTime, Utc};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::fs;
use uuid::Uuid;

const STATE_VERSION: u32 = 1;
pub const STATE_DIR: &str = ".licdata-iac";
const LOCK_TTL_HOURS: i64 = 1;

/// Recorded state of one stack
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StackState {
    /// State file version
    pub version: u32,

    pub identity: StackIdentity,

    /// Last modified timestamp
    pub updated_at: DateTime<Utc>,

    /// Provider settings used by the last synchronization
    #[serde(default)]
    pub config: BTreeMap<String, String>,

    /// Resources indexed by logical name
    pub resources: BTreeMap<String, ResourceState>,

    #[serde(default)]
    pub outputs: StackOutputs,
}

impl StackState {
    pub fn new(identity: StackIdentity) -> Self {
        Self {
            version: STATE_VERSION,
            identity,
            updated_at: Utc::now(),
            config: BTreeMap::new(),
            resources: BTreeMap::new(),
            outputs: StackOutputs::new(),
        }
    }

    /// Add or update a resource
    pub fn set_resource(&mut self, name: String, state: ResourceState) {
        self.resources.insert(name, state);
        self.updated_at = Utc::now();
    }

    pub fn get_resource(&self, name: &str) -> Option<&ResourceState> {
        self.resources.get(name)
    }
}

/// State of a single resource
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceState {
    pub resource_type: String,

    pub properties: serde_json::Value,

    #[serde(default)]
    pub depends_on: Vec<String>,

    /// When the resource was created
    pub created_at: DateTime<Utc>,

    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

impl ResourceState {
    pub fn from_config(config: &ResourceConfig) -> Self {
        let now = Utc::now();
        Self {
            resource_type: config.resource_type.clone(),
            properties: config.properties.clone(),
            depends_on: config.depends_on.clone(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether the recorded resource already matches `desired`
    pub fn matches(&self, desired: &ResourceConfig) -> bool {
        self.resource_type == desired.resource_type
            && self.properties == desired.properties
            && self.depends_on == desired.depends_on
    }
}

/// State manager for reading/writing per-stack state files
pub struct StateManager {
    /// Directory holding the state tree
    root: PathBuf,
}

impl StateManager {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Uses `<project_root>/.licdata-iac`
    pub fn in_project(project_root: impl AsRef<Path>) -> Self {
        Self::new(project_root.as_ref().join(STATE_DIR))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn stack_dir(&self, identity: &StackIdentity) -> PathBuf {
        self.root.join(&identity.project_name)
    }

    pub fn state_path(&self, identity: &StackIdentity) -> PathBuf {
        self.stack_dir(identity)
            .join(format!("{}.json", identity.stack_name))
    }

    fn backup_path(&self, identity: &StackIdentity) -> PathBuf {
        self.stack_dir(identity)
            .join(format!("{}.json.backup", identity.stack_name))
    }

    fn lock_path(&self, identity: &StackIdentity) -> PathBuf {
        self.stack_dir(identity)
            .join(format!("{}.lock", identity.stack_name))
    }

    async fn ensure_stack_dir(&self, identity: &StackIdentity) -> Result<()> {
        let dir = self.stack_dir(identity);
        if !dir.exists() {
            fs::create_dir_all(&dir).await?;
            tracing::debug!("Created state directory: {}", dir.display());
        }
        Ok(())
    }

    /// Load the state of a stack, or an empty one if it was never synchronized
    pub async fn load(&self, identity: &StackIdentity) -> Result<StackState> {
        let path = self.state_path(identity);
        if !path.exists() {
            tracing::debug!("State file not found for {}, returning empty state", identity);
            return Ok(StackState::new(identity.clone()));
        }

        let content = fs::read_to_string(&path).await?;
        let state: StackState = serde_json::from_str(&content)?;

        // Version check
        if state.version > STATE_VERSION {
            return Err(IacError::StateError(format!(
                "State file version {} is newer than supported version {}",
                state.version, STATE_VERSION
            )));
        }

        tracing::debug!(
            "Loaded state of {} with {} resources",
            identity,
            state.resources.len()
        );
        Ok(state)
    }

    /// Save the state, keeping the previous version as a backup
    pub async fn save(&self, state: &StackState) -> Result<()> {
        let identity = &state.identity;
        self.ensure_stack_dir(identity).await?;

        let path = self.state_path(identity);
        let backup = self.backup_path(identity);

        if path.exists() {
            if backup.exists() {
                fs::remove_file(&backup).await?;
            }
            fs::rename(&path, &backup).await?;
            tracing::debug!("Created state backup");
        }

        let content = serde_json::to_string_pretty(state)?;
        fs::write(&path, content).await?;

        tracing::debug!(
            "Saved state of {} with {} resources",
            identity,
            state.resources.len()
        );
        Ok(())
    }

    /// Forget a stack entirely
    pub async fn remove(&self, identity: &StackIdentity) -> Result<()> {
        for path in [self.state_path(identity), self.backup_path(identity)] {
            if path.exists() {
                fs::remove_file(&path).await?;
            }
        }
        tracing::debug!("Removed state of {}", identity);
        Ok(())
    }

    /// Acquire the stack lock for exclusive access
    ///
    /// A lock older than one hour is considered stale and replaced. The age
    /// of a lock file without readable content is taken from its mtime.
    pub async fn acquire_lock(&self, identity: &StackIdentity) -> Result<StateLock> {
        self.ensure_stack_dir(identity).await?;

        let token = Uuid::new_v4().to_string();
        let info = LockInfo {
            holder: std::env::var("HOSTNAME")
                .or_else(|_| std::env::var("HOST"))
                .unwrap_or_else(|_| "unknown".to_string()),
            pid: std::process::id(),
            acquired_at: Utc::now(),
            token: token.clone(),
        };
        let content = serde_json::to_string_pretty(&info)?;
        let lock_path = self.lock_path(identity);
        let guard_path = self.guard_path(identity);
        let name = identity.to_string();

        let (target, guard) = (lock_path.clone(), guard_path.clone());
        tokio::task::spawn_blocking(move || {
            let _guard = LockGuard::acquire(&guard)?;
            if let Some(held) = HeldLock::read(&target)? {
                let age = Utc::now().signed_duration_since(held.since);
                if age.num_hours() < LOCK_TTL_HOURS {
                    return Err(IacError::LockError(format!(
                        "{} is locked by {} since {}",
                        name, held.holder, held.since
                    )));
                }
                tracing::warn!("Replacing stale lock of {} from {}", name, held.holder);
            }
            write_replacing(&target, &content)
        })
        .await
        .map_err(|e| IacError::StateError(format!("lock task failed: {}", e)))??;

        tracing::debug!("Acquired state lock for {}", identity);
        Ok(StateLock {
            lock_path,
            guard_path,
            token,
            released: false,
        })
    }

    fn guard_path(&self, identity: &StackIdentity) -> PathBuf {
        self.stack_dir(identity)
            .join(format!("{}.lock.guard", identity.stack_name))
    }
}

/// Lock information
#[derive(Debug, Serialize, Deserialize)]
struct LockInfo {
    holder: String,
    pid: u32,
    acquired_at: DateTime<Utc>,
    #[serde(default)]
    token: String,
}

/// The lock currently on disk, as far as it can be read
struct HeldLock {
    holder: String,
    since: DateTime<Utc>,
    token: Option<String>,
}

impl HeldLock {
    fn read(path: &Path) -> Result<Option<Self>> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        if let Ok(info) = serde_json::from_str::<LockInfo>(&content) {
            return Ok(Some(Self {
                holder: format!("{} (pid {})", info.holder, info.pid),
                since: info.acquired_at,
                token: Some(info.token),
            }));
        }

        // left behind by a crash, or written by something else
        let modified = std::fs::metadata(path)?.modified()?;
        Ok(Some(Self {
            holder: "an unknown holder".to_string(),
            since: DateTime::<Utc>::from(modified),
            token: None,
        }))
    }
}

/// Advisory lock on the guard file, serializing inspection and replacement
/// of the stack lock between processes. The OS drops it if the holder dies.
struct LockGuard {
    file: std::fs::File,
}

impl LockGuard {
    fn acquire(path: &Path) -> Result<Self> {
        let file = std::fs::OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;
        file.lock_exclusive()?;
        Ok(Self { file })
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

/// Writes `content` to a sibling file and renames it over `path`
fn write_replacing(path: &Path, content: &str) -> Result<()> {
    let tmp = path.with_extension("lock.tmp");
    if let Err(e) = std::fs::write(&tmp, content).and_then(|_| std::fs::rename(&tmp, path)) {
        let _ = std::fs::remove_file(&tmp);
        return Err(e.into());
    }
    Ok(())
}

/// RAII guard for a stack lock
///
/// Only removes the lock file while it still carries this guard's token; a
/// lock taken over after going stale belongs to its new holder.
pub struct StateLock {
    lock_path: PathBuf,
    guard_path: PathBuf,
    token: String,
    released: bool,
}

impl StateLock {
    /// Release the lock
    pub async fn release(mut self) -> Result<()> {
        if self.released {
            return Ok(());
        }
        self.released = true;

        let lock_path = self.lock_path.clone();
        let guard_path = self.guard_path.clone();
        let token = self.token.clone();
        tokio::task::spawn_blocking(move || release_owned(&lock_path, &guard_path, &token))
            .await
            .map_err(|e| IacError::StateError(format!("lock task failed: {}", e)))?
    }
}

fn release_owned(lock_path: &Path, guard_path: &Path, token: &str) -> Result<()> {
    let _guard = LockGuard::acquire(guard_path)?;
    match HeldLock::read(lock_path)? {
        Some(held) if held.token.as_deref() == Some(token) => {
            std::fs::remove_file(lock_path)?;
            tracing::debug!("Released state lock");
        }
        Some(held) => {
            tracing::warn!(
                "State lock was taken over by {}, leaving it in place",
                held.holder
            );
        }
        None => {}
    }
    Ok(())
}

impl Drop for StateLock {
    fn drop(&mut self) {
        if !self.released {
            let _ = release_owned(&self.lock_path, &self.guard_path, &self.token);
        }
    }
}
