//! Profile persistence
//!
//! The in-memory [`ProfileStore`](crate::domain::profile::ProfileStore) is
//! always authoritative; this module only mirrors it to disk. Writes go
//! through the [`WriteScheduler`], which coalesces bursts of edits into a
//! single save after a quiescence window and never blocks the caller.
//! Reads happen once at startup, with corrupt files backed up and replaced
//! by an empty state rather than failing the launch.

use crate::domain::profile::{Profile, DOCUMENT_TYPE, DOCUMENT_VERSION};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::fs;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info, instrument, warn};

pub type Result<T> = std::result::Result<T, PersistError>;

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("File watch error: {0}")]
    Watch(#[from] notify::Error),
}

/// On-disk layout of the profile file
#[derive(Debug, Serialize, Deserialize)]
struct ProfileFile {
    #[serde(rename = "type")]
    kind: String,
    version: u32,
    last_active_id: u32,
    profiles: Vec<Profile>,
}

/// The persistence seam the store logic talks to
///
/// Production uses [`ProfileRepository`]; tests substitute counters and
/// failure injectors.
#[async_trait]
pub trait ProfilePersistence: Send + Sync {
    async fn load(&self) -> Result<(Vec<Profile>, Option<u32>)>;
    async fn save(&self, profiles: &[Profile], active_id: u32) -> Result<()>;
}

/// JSON file repository for profiles
#[derive(Debug, Clone)]
pub struct ProfileRepository {
    path: PathBuf,
}

impl ProfileRepository {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn backup_corrupt(&self) {
        let backup = self.path.with_extension("json.corrupt");
        if let Err(e) = fs::copy(&self.path, &backup).await {
            error!(
                path = %backup.display(),
                error = %e,
                "failed to back up corrupt profile file"
            );
        }
    }
}

#[async_trait]
impl ProfilePersistence for ProfileRepository {
    /// Load all profiles and the last active selection.
    ///
    /// A missing file is a normal first launch. A file that fails to parse
    /// or carries the wrong tag is backed up and treated as empty; the
    /// caller's store refills itself.
    #[instrument(skip(self))]
    async fn load(&self) -> Result<(Vec<Profile>, Option<u32>)> {
        if !self.path.exists() {
            info!(path = %self.path.display(), "no profile file yet, starting empty");
            return Ok((Vec::new(), None));
        }

        let contents = fs::read_to_string(&self.path).await?;
        let file: ProfileFile = match serde_json::from_str(&contents) {
            Ok(file) => file,
            Err(e) => {
                error!(
                    path = %self.path.display(),
                    error = %e,
                    "profile file unreadable, starting empty"
                );
                self.backup_corrupt().await;
                return Ok((Vec::new(), None));
            }
        };

        if file.kind != DOCUMENT_TYPE || file.version != DOCUMENT_VERSION {
            warn!(
                kind = file.kind,
                version = file.version,
                "profile file has an unexpected header, starting empty"
            );
            self.backup_corrupt().await;
            return Ok((Vec::new(), None));
        }

        debug!(count = file.profiles.len(), "profiles loaded");
        Ok((file.profiles, Some(file.last_active_id)))
    }

    #[instrument(skip(self, profiles))]
    async fn save(&self, profiles: &[Profile], active_id: u32) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let file = ProfileFile {
            kind: DOCUMENT_TYPE.to_string(),
            version: DOCUMENT_VERSION,
            last_active_id: active_id,
            profiles: profiles.to_vec(),
        };
        let json = serde_json::to_string_pretty(&file)?;
        fs::write(&self.path, json).await?;

        debug!(count = profiles.len(), "profiles saved");
        Ok(())
    }
}

/// Everything one save needs, captured at edit time
#[derive(Debug, Clone)]
pub struct StoreSnapshot {
    pub profiles: Vec<Profile>,
    pub active_id: u32,
}

/// Debounced pending-write scheduler
///
/// Each [`Self::mark_dirty`] replaces the pending snapshot and restarts
/// the quiescence timer; only the last snapshot of a burst reaches disk.
/// Saves run on the runtime, fire-and-forget, so chain and metering work
/// never waits on storage.
pub struct WriteScheduler {
    tx: mpsc::UnboundedSender<StoreSnapshot>,
}

impl WriteScheduler {
    pub fn new(persistence: Arc<dyn ProfilePersistence>, quiescence: Duration) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<StoreSnapshot>();

        tokio::spawn(async move {
            let mut pending: Option<StoreSnapshot> = None;
            loop {
                tokio::select! {
                    message = rx.recv() => match message {
                        Some(snapshot) => pending = Some(snapshot),
                        None => break,
                    },
                    _ = tokio::time::sleep(quiescence), if pending.is_some() => {
                        if let Some(snapshot) = pending.take() {
                            flush(persistence.as_ref(), snapshot).await;
                        }
                    }
                }
            }
            // Sender dropped with a write still pending: flush it on the
            // way out so a clean shutdown loses nothing.
            if let Some(snapshot) = pending.take() {
                flush(persistence.as_ref(), snapshot).await;
            }
        });

        Self { tx }
    }

    /// Queue the latest state for an eventual save.
    pub fn mark_dirty(&self, snapshot: StoreSnapshot) {
        if self.tx.send(snapshot).is_err() {
            warn!("write scheduler task is gone, dropping snapshot");
        }
    }
}

async fn flush(persistence: &dyn ProfilePersistence, snapshot: StoreSnapshot) {
    if let Err(e) = persistence
        .save(&snapshot.profiles, snapshot.active_id)
        .await
    {
        error!(error = %e, "profile save failed");
    }
}

/// File system watcher over the profile file
///
/// Lets a running instance notice when another process rewrites the file.
pub struct ProfileWatcher {
    _watcher: notify::RecommendedWatcher,
    tx: broadcast::Sender<PathBuf>,
}

impl ProfileWatcher {
    pub async fn new(file_path: PathBuf) -> Result<Self> {
        use notify::Watcher;

        let (tx, _rx) = broadcast::channel(32);

        let dir = match file_path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir).await?;

        let tx_clone = tx.clone();
        let watched_file = file_path.clone();
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
            if let Ok(event) = res {
                if matches!(
                    event.kind,
                    notify::EventKind::Create(_) | notify::EventKind::Modify(_)
                ) {
                    for path in event.paths {
                        if path == watched_file {
                            if let Err(e) = tx_clone.send(path) {
                                error!("failed to send profile change event: {}", e);
                            }
                        }
                    }
                }
            }
        })?;

        watcher.watch(&dir, notify::RecursiveMode::NonRecursive)?;
        info!(path = %file_path.display(), "profile watcher started");

        Ok(Self {
            _watcher: watcher,
            tx,
        })
    }

    /// Subscribe to change events for the watched file.
    pub fn subscribe(&self) -> broadcast::Receiver<PathBuf> {
        self.tx.subscribe()
    }
}
