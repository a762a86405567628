//! Bounded live capture buffer backed by `live.json`.
//!
//! The buffer is fed one control message at a time by the ingest host and
//! read by other processes through the snapshot file. Every mutation holds
//! the buffer lock across the in-memory change and the file write.

use crate::persist::write_json_atomic;
use crate::Result;
use chrono::{Local, SecondsFormat, Utc};
use rep_types::{LiveSnapshot, Request};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Requests kept before the oldest are rotated out.
pub const DEFAULT_CAPACITY: usize = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LiveOptions {
    pub capacity: usize,
    /// Leave the snapshot in place when the capture agent disconnects.
    pub keep_on_disconnect: bool,
}

impl Default for LiveOptions {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            keep_on_disconnect: false,
        }
    }
}

/// Externally visible buffer state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LiveState {
    Empty,
    /// Holds at least one request and is bound to a session identifier.
    Active,
    /// At capacity; the next add rotates.
    Full,
}

/// Answer to a status probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PingStatus {
    pub count: usize,
    pub path: PathBuf,
}

#[derive(Debug)]
pub struct LiveBuffer {
    path: PathBuf,
    options: LiveOptions,
    state: Mutex<LiveSnapshot>,
}

impl LiveBuffer {
    /// Load the snapshot at `path`.
    ///
    /// A missing or unreadable snapshot starts an empty buffer. A fresh
    /// binding identifier is generated unless the loaded buffer already has
    /// requests and an identifier.
    pub fn open(path: impl Into<PathBuf>, options: LiveOptions) -> Self {
        let path = path.into();
        let mut snapshot = load_or_empty(&path);

        if snapshot.requests.is_empty() || snapshot.session_id.is_none() {
            snapshot.session_id = Some(binding_id());
        } else {
            tracing::info!(
                target: "rep::live",
                "Resuming live session {} with {} request(s)",
                snapshot.session_id.as_deref().unwrap_or_default(),
                snapshot.requests.len()
            );
        }
        for request in &mut snapshot.requests {
            request.compute_fields();
        }

        Self {
            path,
            options: LiveOptions {
                capacity: options.capacity.max(1),
                ..options
            },
            state: Mutex::new(snapshot),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn options(&self) -> LiveOptions {
        self.options
    }

    fn lock(&self) -> MutexGuard<'_, LiveSnapshot> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn persist(&self, snapshot: &mut LiveSnapshot) -> Result<()> {
        snapshot.exported_at = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);
        write_json_atomic(&self.path, snapshot)
    }

    /// Append one request, rotating out the oldest tenth of the buffer when
    /// it is full. Returns the new length.
    pub fn add(&self, mut request: Request) -> Result<usize> {
        request.compute_fields();
        let capacity = self.options.capacity;

        let mut snapshot = self.lock();
        let len = snapshot.requests.len();
        if len >= capacity {
            let evict = (capacity / 10).max(len + 1 - capacity).max(1);
            snapshot.requests.drain(..evict);
            tracing::debug!(target: "rep::live", "Buffer full, rotated out {} request(s)", evict);
        }
        snapshot.requests.push(request);
        bind(&mut snapshot);

        self.persist(&mut snapshot)?;
        Ok(snapshot.requests.len())
    }

    /// Replace the buffer. Only the last `capacity` requests are kept.
    /// Returns the new length.
    pub fn sync(&self, mut requests: Vec<Request>) -> Result<usize> {
        let capacity = self.options.capacity;
        if requests.len() > capacity {
            let excess = requests.len() - capacity;
            requests.drain(..excess);
            tracing::debug!(target: "rep::live", "Sync truncated {} request(s)", excess);
        }
        for request in &mut requests {
            request.compute_fields();
        }

        let mut snapshot = self.lock();
        snapshot.requests = requests;
        if !snapshot.requests.is_empty() {
            bind(&mut snapshot);
        }

        self.persist(&mut snapshot)?;
        Ok(snapshot.requests.len())
    }

    /// Empty the buffer and drop its session binding.
    pub fn clear(&self) -> Result<()> {
        let mut snapshot = self.lock();
        snapshot.requests.clear();
        snapshot.session_id = None;
        self.persist(&mut snapshot)
    }

    /// Current count and backing file. Never writes.
    pub fn ping(&self) -> PingStatus {
        PingStatus {
            count: self.lock().requests.len(),
            path: self.path.clone(),
        }
    }

    /// Handle the capture agent going away. Clears the buffer unless
    /// configured to keep it. Returns whether it was cleared.
    pub fn disconnect(&self) -> Result<bool> {
        if self.options.keep_on_disconnect {
            tracing::info!(target: "rep::live", "Agent disconnected, keeping live buffer");
            return Ok(false);
        }
        self.clear()?;
        tracing::info!(target: "rep::live", "Agent disconnected, live buffer cleared");
        Ok(true)
    }

    pub fn state(&self) -> LiveState {
        let len = self.lock().requests.len();
        if len == 0 {
            LiveState::Empty
        } else if len >= self.options.capacity {
            LiveState::Full
        } else {
            LiveState::Active
        }
    }

    pub fn len(&self) -> usize {
        self.lock().requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().requests.is_empty()
    }

    pub fn session_id(&self) -> Option<String> {
        self.lock().session_id.clone()
    }

    /// Copy of the in-memory snapshot.
    pub fn snapshot(&self) -> LiveSnapshot {
        self.lock().clone()
    }
}

fn binding_id() -> String {
    Local::now().format("%Y%m%d-%H%M%S").to_string()
}

fn bind(snapshot: &mut LiveSnapshot) {
    if snapshot.session_id.is_none() {
        snapshot.session_id = Some(binding_id());
    }
}

fn load_or_empty(path: &Path) -> LiveSnapshot {
    match read_live_snapshot(path) {
        Ok(snapshot) => snapshot,
        Err(crate::RepError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
            LiveSnapshot::default()
        }
        Err(e) => {
            tracing::error!(
                target: "rep::live",
                "Corrupted live snapshot {}, starting fresh: {}",
                path.display(),
                e
            );
            LiveSnapshot::default()
        }
    }
}

/// Read a live snapshot as written by the ingest host.
pub fn read_live_snapshot(path: &Path) -> Result<LiveSnapshot> {
    let content = std::fs::read(path)?;
    let mut snapshot: LiveSnapshot = serde_json::from_slice(&content)?;
    for request in &mut snapshot.requests {
        request.compute_fields();
    }
    Ok(snapshot)
}
