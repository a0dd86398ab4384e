use std::collections::BTreeSet;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;

#[derive(Debug, Error)]
pub enum StatsError {
    #[error("stats file I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("stats file is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Aggregate usage counters, stored as one JSON record.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stats {
    #[serde(default)]
    pub total_users: u64,
    #[serde(default)]
    pub active_users: BTreeSet<String>,
    #[serde(default)]
    pub total_downloads: u64,
}

/// Owns the counters and hands every changed snapshot to a single writer task.
///
/// The writer only ever sees the newest snapshot, so bursts of mutations are
/// coalesced and the last one wins. The mutex is never held across an await.
pub struct StatsStore {
    path: PathBuf,
    stats: Mutex<Stats>,
    snapshots: watch::Sender<Stats>,
    stop: Arc<Notify>,
}

impl StatsStore {
    /// Never fails: a missing or unreadable file yields zeroed counters.
    pub async fn load(path: impl Into<PathBuf>) -> StatsStore {
        let path = path.into();
        log::debug!("Loading stats from {:?}", path);

        let stats = match read_snapshot(&path).await {
            Ok(Some(stats)) => stats,
            Ok(None) => {
                log::info!("No stats file at {:?}, starting from zero", path);
                Stats::default()
            }
            Err(e) => {
                log::warn!("Failed to load stats from {:?}, starting from zero: {}", path, e);
                Stats::default()
            }
        };

        let (snapshots, _) = watch::channel(stats.clone());

        StatsStore {
            path,
            stats: Mutex::new(stats),
            snapshots,
            stop: Arc::new(Notify::new()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn snapshot(&self) -> Stats {
        self.lock().clone()
    }

    /// Sorted copy of every user ID seen so far.
    pub fn active_users(&self) -> Vec<String> {
        self.lock().active_users.iter().cloned().collect()
    }

    /// Returns `true` when the user had not been seen before.
    pub fn record_active_user(&self, user_id: &str) -> bool {
        let snapshot = {
            let mut stats = self.lock();
            if !stats.active_users.insert(user_id.to_string()) {
                return false;
            }
            stats.total_users = stats.active_users.len() as u64;
            stats.clone()
        };

        log::debug!("New active user {:?}, total {}", user_id, snapshot.total_users);
        self.schedule_persist(snapshot);
        true
    }

    pub fn record_download(&self) {
        let snapshot = {
            let mut stats = self.lock();
            stats.total_downloads += 1;
            stats.clone()
        };

        log::debug!("Total downloads now {}", snapshot.total_downloads);
        self.schedule_persist(snapshot);
    }

    /// Writes the current counters right away. Failures are logged only.
    pub async fn persist(&self) {
        let snapshot = self.snapshot();
        if let Err(e) = write_snapshot(&self.path, &snapshot).await {
            log::error!("Failed to save stats to {:?}: {}", self.path, e);
        }
    }

    /// Starts the task that writes every published snapshot to disk.
    ///
    /// The task ends once the store is dropped or `shutdown` is called. It is
    /// the only thing writing the file while it runs.
    pub fn spawn_writer(&self) -> JoinHandle<()> {
        let mut receiver = self.snapshots.subscribe();
        let stop = self.stop.clone();
        let path = self.path.clone();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    changed = receiver.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        let snapshot = receiver.borrow_and_update().clone();
                        if let Err(e) = write_snapshot(&path, &snapshot).await {
                            log::error!("Failed to save stats to {:?}: {}", path, e);
                        }
                    }
                    _ = stop.notified() => {
                        let snapshot = receiver.borrow_and_update().clone();
                        if let Err(e) = write_snapshot(&path, &snapshot).await {
                            log::error!("Failed to save final stats to {:?}: {}", path, e);
                        }
                        break;
                    }
                }
            }
            log::debug!("Stats writer for {:?} stopped", path);
        })
    }

    /// Stops the writer after it has written the newest snapshot.
    ///
    /// If the writer died, the snapshot is written from here instead.
    pub async fn shutdown(&self, writer: JoinHandle<()>) {
        self.stop.notify_one();
        if let Err(e) = writer.await {
            log::error!("Stats writer for {:?} failed: {}", self.path, e);
            self.persist().await;
        }
    }

    fn schedule_persist(&self, snapshot: Stats) {
        self.snapshots.send_replace(snapshot);
    }

    fn lock(&self) -> MutexGuard<'_, Stats> {
        self.stats.lock().unwrap_or_else(|e| e.into_inner())
    }
}

async fn read_snapshot(path: &Path) -> Result<Option<Stats>, StatsError> {
    let raw = match tokio::fs::read_to_string(path).await {
        Ok(raw) => raw,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    let mut stats: Stats = serde_json::from_str(&raw)?;
    // the stored count is not trusted
    stats.total_users = stats.active_users.len() as u64;

    Ok(Some(stats))
}

/// Replaces the file through a sibling temp file and a rename, so a crash
/// mid-write leaves the previous snapshot in place.
async fn write_snapshot(path: &Path, stats: &Stats) -> Result<(), StatsError> {
    let data = serde_json::to_string_pretty(stats)?;
    let path = path.to_path_buf();

    tokio::task::spawn_blocking(move || replace_file(&path, data.as_bytes()))
        .await
        .map_err(|e| std::io::Error::new(ErrorKind::Other, e))??;

    Ok(())
}

fn replace_file(path: &Path, data: &[u8]) -> std::io::Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(data)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;

    Ok(())
}
