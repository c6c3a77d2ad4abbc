use chrono::{DateTime, Utc};
use std::{
    collections::HashMap,
    fs::{self, File, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
    time::Duration,
};
use tokio::{task::JoinHandle, time};

use crate::{
    error::Error,
    fs::parent_of,
    protocol::{ErrorKind, FileDescriptor},
    utils::unique_file_name,
};

/// Idle time after which an upload is abandoned
pub const DEFAULT_SESSION_TIMEOUT: Duration = Duration::from_secs(300);

const STAGING_EXTENSION: &str = "tmp";

/// Where an upload stands after accepting a chunk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteProgress {
    Pending { written: u64 },
    Completed,
}

/// One upload in progress. Chunks are appended to a staging file next to
/// the destination which replaces the destination once complete.
#[derive(Debug)]
pub struct WriteSession {
    session_id: String,
    owner: String,
    staging_path: PathBuf,
    target: FileDescriptor,
    file: Option<File>,
    written: u64,
    last_activity_utc: DateTime<Utc>,
    abandoned: bool,
}

impl WriteSession {
    fn open(session_id: &str, owner: &str, target: &FileDescriptor) -> Result<Self, Error> {
        let parent = parent_of(Path::new(&target.path));
        fs::create_dir_all(&parent)?;

        let staging_path = unique_file_name(&parent, STAGING_EXTENSION);
        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&staging_path)?;

        debug!(
            "write session {} staging {} for {}",
            session_id,
            staging_path.display(),
            target.path
        );

        Ok(Self {
            session_id: session_id.to_owned(),
            owner: owner.to_owned(),
            staging_path,
            target: target.clone(),
            file: Some(file),
            written: 0,
            last_activity_utc: Utc::now(),
            abandoned: false,
        })
    }

    fn append(&mut self, content: &[u8]) -> Result<(), Error> {
        let file = self
            .file
            .as_mut()
            .ok_or_else(|| Error::status(ErrorKind::FileSystemError, "Write session is closed"))?;

        file.write_all(content)?;
        self.written += content.len() as u64;
        self.last_activity_utc = Utc::now();
        Ok(())
    }

    /// Moves the staging file onto the destination when the received length
    /// matches the declared one; otherwise deletes it.
    fn finish(&mut self) -> Result<(), Error> {
        if let Some(file) = self.file.take() {
            file.sync_all()?;
        }

        if self.written != self.target.length {
            warn!(
                "write session {} received {} of {} bytes",
                self.session_id, self.written, self.target.length
            );
            self.discard();
            return Err(size_mismatch());
        }

        if let Err(err) = fs::rename(&self.staging_path, &self.target.path) {
            self.discard();
            return Err(err.into());
        }

        self.abandoned = true;
        Ok(())
    }

    /// Later chunks must come from the user who started the upload and name
    /// the same destination.
    fn accepts(&self, owner: &str, target: &FileDescriptor) -> bool {
        self.owner == owner
            && self.target.path == target.path
            && self.target.length == target.length
    }

    fn discard(&mut self) {
        self.file = None;
        self.abandoned = true;

        if let Err(err) = fs::remove_file(&self.staging_path) {
            if err.kind() != std::io::ErrorKind::NotFound {
                warn!(
                    "unable to delete staging file {}: {}",
                    self.staging_path.display(),
                    err
                );
            }
        }
    }

    fn is_idle(&self, now: DateTime<Utc>, timeout: Duration) -> bool {
        (now - self.last_activity_utc)
            .to_std()
            .is_ok_and(|idle| idle > timeout)
    }
}

fn size_mismatch() -> Error {
    Error::status(
        ErrorKind::FileSystemError,
        "Received file size is different to expected",
    )
}

fn poisoned<T>(_: T) -> Error {
    Error::status(ErrorKind::Unknown, "write session lock poisoned")
}

/// Owns every upload in progress, keyed by the client chosen session id.
/// Chunks for one session are applied one at a time while different
/// sessions proceed independently.
#[derive(Debug)]
pub struct WriteSessions {
    sessions: Mutex<HashMap<String, Arc<Mutex<WriteSession>>>>,
    timeout: Duration,
}

impl Default for WriteSessions {
    fn default() -> Self {
        Self::new(DEFAULT_SESSION_TIMEOUT)
    }
}

impl WriteSessions {
    pub fn new(timeout: Duration) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            timeout,
        }
    }

    pub fn len(&self) -> usize {
        self.sessions.lock().map_or(0, |s| s.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn staging_path(&self, session_id: &str) -> Option<PathBuf> {
        let session = self.sessions.lock().ok()?.get(session_id).cloned()?;
        let staging_path = session.lock().ok()?.staging_path.clone();
        Some(staging_path)
    }

    /// Applies one chunk of an upload on behalf of `owner`. A lone final
    /// chunk with no session behind it is written straight to the
    /// destination.
    pub fn write(
        &self,
        session_id: &str,
        owner: &str,
        target: &FileDescriptor,
        content: &[u8],
        is_more: bool,
    ) -> Result<WriteProgress, Error> {
        let handle = {
            let mut sessions = self.sessions.lock().map_err(poisoned)?;
            let existing = sessions.get(session_id).cloned();
            match existing {
                Some(handle) => handle,
                None if !is_more => {
                    drop(sessions);
                    return Self::write_direct(target, content);
                }
                None => {
                    let session = WriteSession::open(session_id, owner, target)?;
                    let handle = Arc::new(Mutex::new(session));
                    let _ = sessions.insert(session_id.to_owned(), handle.clone());
                    handle
                }
            }
        };

        self.apply(session_id, &handle, owner, target, content, is_more)
    }

    fn apply(
        &self,
        session_id: &str,
        handle: &Arc<Mutex<WriteSession>>,
        owner: &str,
        target: &FileDescriptor,
        content: &[u8],
        is_more: bool,
    ) -> Result<WriteProgress, Error> {
        let mut session = handle.lock().map_err(poisoned)?;
        if !session.accepts(owner, target) {
            warn!(
                "write session {} of {} refused a chunk from {} for {}",
                session_id, session.owner, owner, target.path
            );
            return Err(Error::status(
                ErrorKind::PermissionDenied,
                "Permission denied",
            ));
        }

        if session.abandoned {
            return Err(Error::status(
                ErrorKind::FileSystemError,
                "Write session is closed",
            ));
        }

        if let Err(err) = session.append(content) {
            self.forget(session_id, handle);
            session.discard();
            return Err(err);
        }

        if is_more {
            return Ok(WriteProgress::Pending {
                written: session.written,
            });
        }

        self.forget(session_id, handle);
        session.finish()?;

        info!(
            "write session {} completed {} ({} bytes)",
            session_id, session.target.path, session.written
        );

        Ok(WriteProgress::Completed)
    }

    fn write_direct(target: &FileDescriptor, content: &[u8]) -> Result<WriteProgress, Error> {
        if content.len() as u64 != target.length {
            return Err(size_mismatch());
        }

        fs::create_dir_all(parent_of(Path::new(&target.path)))?;
        fs::write(&target.path, content)?;

        debug!("wrote {} ({} bytes) in one chunk", target.path, content.len());
        Ok(WriteProgress::Completed)
    }

    /// Drops `session_id` unless the id already belongs to a newer upload
    fn forget(&self, session_id: &str, handle: &Arc<Mutex<WriteSession>>) {
        if let Ok(mut sessions) = self.sessions.lock() {
            if sessions
                .get(session_id)
                .is_some_and(|current| Arc::ptr_eq(current, handle))
            {
                let _ = sessions.remove(session_id);
            }
        }
    }

    /// Abandons sessions idle for longer than the timeout
    pub fn sweep(&self) -> usize {
        self.sweep_at(Utc::now())
    }

    pub(crate) fn sweep_at(&self, now: DateTime<Utc>) -> usize {
        let Ok(mut sessions) = self.sessions.lock() else {
            return 0;
        };

        let mut abandoned = 0;
        sessions.retain(|session_id, session| {
            // a session being written to is not idle
            let Ok(mut session) = session.try_lock() else {
                return true;
            };

            if !session.is_idle(now, self.timeout) {
                return true;
            }

            info!(
                "abandoning write session {} for {}",
                session_id, session.target.path
            );
            session.discard();
            abandoned += 1;
            false
        });

        abandoned
    }

    /// Abandons every session regardless of activity
    pub fn abandon_all(&self) {
        let drained = match self.sessions.lock() {
            Ok(mut sessions) => sessions.drain().collect::<Vec<_>>(),
            Err(_) => return,
        };

        for (session_id, session) in drained {
            if let Ok(mut session) = session.lock() {
                debug!("abandoning write session {}", session_id);
                session.discard();
            }
        }
    }

    /// Runs [`WriteSessions::sweep`] every `interval` until the sessions are
    /// dropped or the task is aborted.
    /// A zero `interval` is raised to one millisecond.
    pub fn spawn_sweeper(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let sessions = Arc::downgrade(self);
        let interval = interval.max(Duration::from_millis(1));

        tokio::spawn(async move {
            let mut ticker = time::interval(interval);
            ticker.tick().await;

            loop {
                ticker.tick().await;

                let Some(sessions) = sessions.upgrade() else {
                    break;
                };

                match tokio::task::spawn_blocking(move || sessions.sweep()).await {
                    Ok(0) => (),
                    Ok(count) => debug!("sweep abandoned {} write sessions", count),
                    Err(err) => warn!("sweep failed: {}", err),
                }
            }

            debug!("write session sweeper ended");
        })
    }
}
