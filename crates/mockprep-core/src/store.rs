use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use mockprep_schema::{AnalysisStatus, MediaRef, Response, Session};
use tokio::fs;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::StoreError;

/// Resolves a media reference to the uploaded bytes.
#[async_trait]
pub trait MediaStore: Send + Sync {
    async fn open(&self, media: &MediaRef) -> Result<Vec<u8>, StoreError>;
}

/// Persistence for sessions and their responses. Each call is atomic for the
/// entity it touches; nothing spans entities. Responses are persisted only
/// through `save_response` and `update_analysis_status`.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// The session with its responses in question order.
    async fn load_session(&self, session_id: Uuid) -> Result<Session, StoreError>;

    /// Persists only `analysis_status` of the given response.
    async fn update_analysis_status(&self, response: &Response) -> Result<(), StoreError>;

    async fn save_response(&self, response: &Response) -> Result<(), StoreError>;

    /// Persists the session-level fields. Creates the session, responses
    /// included, when it is not stored yet; otherwise stored responses are
    /// left as they are.
    async fn save_session(&self, session: &Session) -> Result<(), StoreError>;
}

fn check_transition(
    response_id: Uuid,
    from: AnalysisStatus,
    to: AnalysisStatus,
) -> Result<(), StoreError> {
    if from == to || from.can_transition_to(to) {
        Ok(())
    } else {
        Err(StoreError::InvalidTransition {
            response_id,
            from,
            to,
        })
    }
}

fn stored_response_mut<'a>(
    session: &'a mut Session,
    response_id: Uuid,
) -> Result<&'a mut Response, StoreError> {
    session
        .responses
        .iter_mut()
        .find(|r| r.id == response_id)
        .ok_or_else(|| StoreError::NotFound(format!("response {response_id}")))
}

fn apply_status(session: &mut Session, response: &Response) -> Result<AnalysisStatus, StoreError> {
    let stored = stored_response_mut(session, response.id)?;
    let previous = stored.analysis_status;
    check_transition(response.id, previous, response.analysis_status)?;
    stored.analysis_status = response.analysis_status;
    Ok(previous)
}

fn apply_response(session: &mut Session, response: &Response) -> Result<AnalysisStatus, StoreError> {
    let stored = stored_response_mut(session, response.id)?;
    let previous = stored.analysis_status;
    check_transition(response.id, previous, response.analysis_status)?;
    *stored = response.clone();
    Ok(previous)
}

fn apply_session(stored: &mut Session, session: &Session) {
    let responses = std::mem::take(&mut stored.responses);
    *stored = Session {
        responses,
        ..session.clone()
    };
}

/// In-process session store. Records every persisted status change in order,
/// which makes it the store of choice for tests and embedders.
#[derive(Default)]
pub struct MemorySessionStore {
    sessions: Mutex<HashMap<Uuid, Session>>,
    transitions: Mutex<Vec<(Uuid, AnalysisStatus)>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, session: Session) {
        self.sessions.lock().await.insert(session.id, session);
    }

    pub async fn get(&self, session_id: Uuid) -> Option<Session> {
        self.sessions.lock().await.get(&session_id).cloned()
    }

    /// Every status persisted for `response_id`, oldest first.
    pub async fn transitions_for(&self, response_id: Uuid) -> Vec<AnalysisStatus> {
        self.transitions
            .lock()
            .await
            .iter()
            .filter(|(id, _)| *id == response_id)
            .map(|(_, status)| *status)
            .collect()
    }

    async fn with_session<F>(&self, session_id: Uuid, f: F) -> Result<AnalysisStatus, StoreError>
    where
        F: FnOnce(&mut Session) -> Result<AnalysisStatus, StoreError>,
    {
        let mut sessions = self.sessions.lock().await;
        let session = sessions
            .get_mut(&session_id)
            .ok_or_else(|| StoreError::NotFound(format!("session {session_id}")))?;
        f(session)
    }

    async fn record(&self, response: &Response, previous: AnalysisStatus) {
        if previous != response.analysis_status {
            self.transitions
                .lock()
                .await
                .push((response.id, response.analysis_status));
        }
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn load_session(&self, session_id: Uuid) -> Result<Session, StoreError> {
        let mut session = self
            .get(session_id)
            .await
            .ok_or_else(|| StoreError::NotFound(format!("session {session_id}")))?;
        session.sort_responses();
        Ok(session)
    }

    async fn update_analysis_status(&self, response: &Response) -> Result<(), StoreError> {
        let previous = self
            .with_session(response.session_id, |s| apply_status(s, response))
            .await?;
        self.record(response, previous).await;
        Ok(())
    }

    async fn save_response(&self, response: &Response) -> Result<(), StoreError> {
        let previous = self
            .with_session(response.session_id, |s| apply_response(s, response))
            .await?;
        self.record(response, previous).await;
        Ok(())
    }

    async fn save_session(&self, session: &Session) -> Result<(), StoreError> {
        self.sessions
            .lock()
            .await
            .entry(session.id)
            .and_modify(|stored| apply_session(stored, session))
            .or_insert_with(|| session.clone());
        Ok(())
    }
}

/// One pretty-printed JSON document per session under `<data_dir>/sessions/`.
pub struct FileSessionStore {
    sessions_dir: PathBuf,
    // serializes read-modify-write cycles
    write_lock: Mutex<()>,
}

impl FileSessionStore {
    pub fn new(data_dir: impl AsRef<Path>) -> Self {
        Self {
            sessions_dir: data_dir.as_ref().join("sessions"),
            write_lock: Mutex::new(()),
        }
    }

    fn session_path(&self, session_id: Uuid) -> PathBuf {
        self.sessions_dir.join(format!("{session_id}.json"))
    }

    async fn read(&self, session_id: Uuid) -> Result<Session, StoreError> {
        match fs::read(self.session_path(session_id)).await {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                Err(StoreError::NotFound(format!("session {session_id}")))
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn write(&self, session: &Session) -> Result<(), StoreError> {
        fs::create_dir_all(&self.sessions_dir).await?;
        let path = self.session_path(session.id);
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_vec_pretty(session)?).await?;
        fs::rename(&tmp, &path).await?;
        Ok(())
    }

    async fn modify<F>(&self, session_id: Uuid, f: F) -> Result<(), StoreError>
    where
        F: FnOnce(&mut Session) -> Result<AnalysisStatus, StoreError>,
    {
        let _guard = self.write_lock.lock().await;
        let mut session = self.read(session_id).await?;
        f(&mut session)?;
        self.write(&session).await
    }
}

#[async_trait]
impl SessionStore for FileSessionStore {
    async fn load_session(&self, session_id: Uuid) -> Result<Session, StoreError> {
        let mut session = self.read(session_id).await?;
        session.sort_responses();
        Ok(session)
    }

    async fn update_analysis_status(&self, response: &Response) -> Result<(), StoreError> {
        self.modify(response.session_id, |s| apply_status(s, response))
            .await
    }

    async fn save_response(&self, response: &Response) -> Result<(), StoreError> {
        self.modify(response.session_id, |s| apply_response(s, response))
            .await
    }

    async fn save_session(&self, session: &Session) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        let merged = match self.read(session.id).await {
            Ok(mut stored) => {
                apply_session(&mut stored, session);
                stored
            }
            Err(StoreError::NotFound(_)) => session.clone(),
            Err(err) => return Err(err),
        };
        self.write(&merged).await
    }
}

/// Serves media from files below a root directory.
pub struct FsMediaStore {
    root: PathBuf,
}

impl FsMediaStore {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Relative references only; `..` and absolute paths are rejected.
    pub fn resolve(&self, media: &MediaRef) -> Result<PathBuf, StoreError> {
        let relative = Path::new(media.as_str());
        let valid = !media.as_str().trim().is_empty()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
        if !valid {
            return Err(StoreError::InvalidReference(media.to_string()));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl MediaStore for FsMediaStore {
    async fn open(&self, media: &MediaRef) -> Result<Vec<u8>, StoreError> {
        let path = self.resolve(media)?;
        match fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                Err(StoreError::NotFound(format!("media {media}")))
            }
            Err(err) => Err(err.into()),
        }
    }
}

/// Media held in memory, keyed by reference.
#[derive(Default)]
pub struct MemoryMediaStore {
    blobs: Mutex<HashMap<MediaRef, Vec<u8>>>,
}

impl MemoryMediaStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn put(&self, media: impl Into<String>, bytes: Vec<u8>) {
        self.blobs.lock().await.insert(MediaRef::new(media), bytes);
    }
}

#[async_trait]
impl MediaStore for MemoryMediaStore {
    async fn open(&self, media: &MediaRef) -> Result<Vec<u8>, StoreError> {
        self.blobs
            .lock()
            .await
            .get(media)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("media {media}")))
    }
}
