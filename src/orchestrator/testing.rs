//! Test doubles for pipeline runs.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::error::{DaemonError, Result};
use crate::generation::{GeneratedAudio, Generator};
use crate::store::{SqliteStore, Store, StoreOpener, TaskFilter, TaskUpdate};
use crate::types::{AudioFormat, GenerationRequest, Message, Session, Task, Track};

/// Wraps a real store and injects connection-class failures.
///
/// `fail_next(op, n)` fails the next `n` calls of `op`; `fail_after(op, k, n)`
/// lets `k` calls through first. `break_link()` fails every call, including
/// reconnects.
pub struct FlakyStore {
    inner: SqliteStore,
    /// Per operation: calls still allowed, then calls to fail.
    failures: Mutex<HashMap<&'static str, (usize, usize)>>,
    broken: AtomicBool,
    pub reconnects: AtomicUsize,
    /// Every reply written through `update_message_reply`.
    pub replies: Mutex<Vec<String>>,
}

impl FlakyStore {
    pub fn new(inner: SqliteStore) -> Self {
        Self {
            inner,
            failures: Mutex::new(HashMap::new()),
            broken: AtomicBool::new(false),
            reconnects: AtomicUsize::new(0),
            replies: Mutex::new(Vec::new()),
        }
    }

    pub fn url(&self) -> String {
        self.inner.url().to_string()
    }

    pub fn fail_next(&self, op: &'static str, times: usize) {
        self.fail_after(op, 0, times);
    }

    pub fn fail_after(&self, op: &'static str, skip: usize, times: usize) {
        self.failures.lock().unwrap().insert(op, (skip, times));
    }

    pub fn break_link(&self) {
        self.broken.store(true, Ordering::SeqCst);
    }

    fn check(&self, op: &'static str) -> Result<()> {
        if self.broken.load(Ordering::SeqCst) {
            return Err(DaemonError::connection(format!("{op}: link down")));
        }
        let mut failures = self.failures.lock().unwrap();
        match failures.get_mut(op) {
            Some((skip, _)) if *skip > 0 => {
                *skip -= 1;
                Ok(())
            }
            Some((_, left)) if *left > 0 => {
                *left -= 1;
                Err(DaemonError::connection(format!("{op}: connection reset")))
            }
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl Store for FlakyStore {
    async fn ping(&self) -> Result<()> {
        self.check("ping")?;
        self.inner.ping().await
    }

    async fn reconnect(&self) -> Result<()> {
        self.reconnects.fetch_add(1, Ordering::SeqCst);
        self.check("reconnect")?;
        self.inner.reconnect().await
    }

    async fn insert_task(&self, task: &Task) -> Result<()> {
        self.check("insert_task")?;
        self.inner.insert_task(task).await
    }

    async fn update_task(&self, id: &str, update: &TaskUpdate) -> Result<Option<Task>> {
        self.check("update_task")?;
        self.inner.update_task(id, update).await
    }

    async fn get_task(&self, id: &str) -> Result<Option<Task>> {
        self.check("get_task")?;
        self.inner.get_task(id).await
    }

    async fn list_tasks(&self, filter: &TaskFilter) -> Result<Vec<Task>> {
        self.check("list_tasks")?;
        self.inner.list_tasks(filter).await
    }

    async fn create_session(&self, session: &Session) -> Result<()> {
        self.check("create_session")?;
        self.inner.create_session(session).await
    }

    async fn session_exists(&self, id: &str) -> Result<bool> {
        self.check("session_exists")?;
        self.inner.session_exists(id).await
    }

    async fn delete_session(&self, id: &str) -> Result<bool> {
        self.check("delete_session")?;
        self.inner.delete_session(id).await
    }

    async fn insert_message(&self, message: &Message) -> Result<()> {
        self.check("insert_message")?;
        self.inner.insert_message(message).await
    }

    async fn list_messages(&self, session_id: &str) -> Result<Vec<Message>> {
        self.check("list_messages")?;
        self.inner.list_messages(session_id).await
    }

    async fn update_message_reply(&self, id: &str, reply: &str) -> Result<bool> {
        self.check("update_message_reply")?;
        self.replies.lock().unwrap().push(reply.to_string());
        self.inner.update_message_reply(id, reply).await
    }

    async fn insert_track_and_link_message(
        &self,
        track: &Track,
        message_id: &str,
        reply: &str,
    ) -> Result<()> {
        self.check("insert_track")?;
        self.inner
            .insert_track_and_link_message(track, message_id, reply)
            .await
    }
}

/// Opener that counts how often the recovery path asked for a new handle.
pub struct CountingOpener {
    url: String,
    pub opened: AtomicUsize,
}

impl CountingOpener {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            opened: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl StoreOpener for CountingOpener {
    async fn open(&self) -> Result<Arc<dyn Store>> {
        self.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(SqliteStore::connect(&self.url).await?))
    }
}

/// Generator returning fixed bytes, or a fixed error.
pub struct StubGenerator {
    pub outcome: std::result::Result<Vec<u8>, String>,
    pub seen: Mutex<Vec<GenerationRequest>>,
}

impl StubGenerator {
    pub fn ok(bytes: &[u8]) -> Self {
        Self {
            outcome: Ok(bytes.to_vec()),
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            outcome: Err(message.to_string()),
            seen: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl Generator for StubGenerator {
    async fn generate(&self, request: &GenerationRequest) -> Result<GeneratedAudio> {
        self.seen.lock().unwrap().push(request.clone());
        match &self.outcome {
            Ok(bytes) => Ok(GeneratedAudio {
                bytes: bytes.clone(),
                format: AudioFormat::Wav,
                duration_sec: request.duration_sec as f64,
                sample_rate: 48_000,
                model_name: "stub".to_string(),
            }),
            Err(message) => Err(DaemonError::generation_failed(message.clone())),
        }
    }

    fn name(&self) -> &str {
        "stub"
    }
}
