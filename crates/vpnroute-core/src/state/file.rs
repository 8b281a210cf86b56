// # File State Store
//
// File-based implementation of StateStore with crash recovery.
//
// ## Crash Recovery
//
// - Every change is written to `<path>.tmp` and renamed over the state file
// - The previous state file is copied to `<path>.backup` before each rename
// - A state file that fails to parse is replaced by its backup on load
//
// ## File Format
//
// ```json
// {
//   "version": "1.0",
//   "routes": {
//     "office": {
//       "id": "60cd0be17723cf3c91146873",
//       "server_id": "60cd0be07723cf3c9114686c",
//       "network": "10.10.0.0/16",
//       "comment": "office LAN",
//       "nat": true,
//       "net_gateway": false,
//       "last_refreshed": "2026-01-09T12:00:00Z"
//     }
//   }
// }
// ```

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;

use crate::Error;
use crate::config::StateStoreConfig;
use crate::resource::RouteState;
use crate::traits::{StateStore, StateStoreFactory};

/// State file format version
const STATE_FILE_VERSION: &str = "1.0";

/// File-based state store
///
/// # Example
///
/// ```rust,no_run
/// use vpnroute_core::state::FileStateStore;
/// use vpnroute_core::traits::StateStore;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = FileStateStore::new("/var/lib/vpnroute/state.json").await?;
///
///     for name in store.list_routes().await? {
///         println!("tracking {}", name);
///     }
///
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct FileStateStore {
    path: PathBuf,
    state: Arc<RwLock<FileState>>,
}

#[derive(Debug)]
struct FileState {
    routes: BTreeMap<String, RouteState>,
    dirty: bool,
}

#[derive(Debug, serde::Serialize, serde::Deserialize)]
struct StateFileFormat {
    version: String,
    routes: BTreeMap<String, RouteState>,
}

impl FileStateStore {
    /// Create or load a file state store
    ///
    /// Parent directories are created as needed. A corrupted state file is
    /// recovered from its backup; if the backup is unusable too, the store
    /// starts empty.
    pub async fn new<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !fs::try_exists(parent).await?
        {
            fs::create_dir_all(parent).await.map_err(|e| {
                Error::config(format!(
                    "Failed to create state directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let routes = Self::load_with_recovery(&path).await?;

        Ok(Self {
            path,
            state: Arc::new(RwLock::new(FileState {
                routes,
                dirty: false,
            })),
        })
    }

    async fn load_with_recovery(path: &Path) -> Result<BTreeMap<String, RouteState>, Error> {
        let parse_err = match Self::load(path).await {
            Ok(routes) => {
                tracing::debug!("Loaded {} tracked routes from {}", routes.len(), path.display());
                return Ok(routes);
            }
            Err(Error::Json(e)) => e,
            Err(e) => return Err(e),
        };

        tracing::warn!(
            "State file {} is corrupted ({}), trying backup",
            path.display(),
            parse_err
        );

        let backup = Self::backup_path(path);
        if !fs::try_exists(&backup).await? {
            tracing::warn!("No backup file found, starting with empty state");
            return Ok(BTreeMap::new());
        }

        match Self::load(&backup).await {
            Ok(routes) => {
                tracing::info!("Recovered {} tracked routes from backup", routes.len());
                if let Err(e) = fs::copy(&backup, path).await {
                    tracing::error!("Failed to restore state file from backup: {}", e);
                }
                Ok(routes)
            }
            Err(e) => {
                tracing::error!("Backup also unusable ({}), starting with empty state", e);
                Ok(BTreeMap::new())
            }
        }
    }

    async fn load(path: &Path) -> Result<BTreeMap<String, RouteState>, Error> {
        if !fs::try_exists(path).await? {
            return Ok(BTreeMap::new());
        }

        let content = fs::read_to_string(path).await.map_err(|e| {
            Error::state_store(format!("Failed to read state file {}: {}", path.display(), e))
        })?;
        let file: StateFileFormat = serde_json::from_str(&content)?;

        if file.version != STATE_FILE_VERSION {
            tracing::warn!(
                "State file version mismatch: expected {}, got {}; loading anyway",
                STATE_FILE_VERSION,
                file.version
            );
        }

        Ok(file.routes)
    }

    async fn write(&self) -> Result<(), Error> {
        let mut guard = self.state.write().await;

        let json = serde_json::to_string_pretty(&StateFileFormat {
            version: STATE_FILE_VERSION.to_string(),
            routes: guard.routes.clone(),
        })?;

        let temp = self.temp_path();
        let mut file = fs::File::create(&temp).await.map_err(|e| {
            Error::state_store(format!("Failed to create {}: {}", temp.display(), e))
        })?;
        file.write_all(json.as_bytes()).await?;
        file.flush().await?;
        drop(file);

        if fs::try_exists(&self.path).await?
            && let Err(e) = fs::copy(&self.path, Self::backup_path(&self.path)).await
        {
            tracing::warn!("Failed to create state backup: {}", e);
        }

        fs::rename(&temp, &self.path).await.map_err(|e| {
            Error::state_store(format!(
                "Failed to rename {} to {}: {}",
                temp.display(),
                self.path.display(),
                e
            ))
        })?;

        guard.dirty = false;
        tracing::trace!("State written to {}", self.path.display());
        Ok(())
    }

    fn temp_path(&self) -> PathBuf {
        self.path.with_extension("tmp")
    }

    fn backup_path(path: &Path) -> PathBuf {
        path.with_extension("backup")
    }
}

#[async_trait]
impl StateStore for FileStateStore {
    async fn get_route(&self, name: &str) -> Result<Option<RouteState>, Error> {
        Ok(self.state.read().await.routes.get(name).cloned())
    }

    async fn set_route(&self, name: &str, state: &RouteState) -> Result<(), Error> {
        {
            let mut guard = self.state.write().await;
            guard.routes.insert(name.to_string(), state.clone());
            guard.dirty = true;
        }
        self.write().await
    }

    async fn delete_route(&self, name: &str) -> Result<(), Error> {
        {
            let mut guard = self.state.write().await;
            if guard.routes.remove(name).is_none() {
                return Ok(());
            }
            guard.dirty = true;
        }
        self.write().await
    }

    async fn list_routes(&self) -> Result<Vec<String>, Error> {
        Ok(self.state.read().await.routes.keys().cloned().collect())
    }

    async fn flush(&self) -> Result<(), Error> {
        if self.state.read().await.dirty {
            self.write().await
        } else {
            Ok(())
        }
    }
}

/// Factory for the `file` state store type
pub struct FileStateStoreFactory;

#[async_trait]
impl StateStoreFactory for FileStateStoreFactory {
    async fn create(&self, config: &StateStoreConfig) -> Result<Box<dyn StateStore>, Error> {
        match config {
            StateStoreConfig::File { path } => Ok(Box::new(FileStateStore::new(path).await?)),
            _ => Err(Error::config("Invalid config for file state store")),
        }
    }
}
