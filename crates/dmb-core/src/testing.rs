//! Shared in-memory fakes for engine and router tests.

use std::{
    collections::{BTreeMap, HashMap, HashSet},
    sync::{Arc, Mutex},
    time::Duration,
};

use async_trait::async_trait;

use crate::{
    config::Config,
    domain::{Listing, ListingId, MessageId, NewListing, ThreadId},
    errors::Error,
    lifecycle::Lifecycle,
    ports::{AuditSink, ControlButton, ListingPatch, ListingStore, ThreadService, ThreadState},
    Result,
};

pub(crate) fn test_config() -> Arc<Config> {
    Arc::new(Config {
        bot_token: "test-token".to_string(),
        forum_channel_id: 1,
        create_channel_id: 2,
        staff_log_channel_id: None,
        archive_after: Duration::from_secs(7 * 24 * 3600),
        delete_after: Duration::from_secs(30 * 24 * 3600),
        bump_cooldown: Duration::from_secs(24 * 3600),
        sweep_interval: Duration::from_secs(3600),
        db_path: ":memory:".into(),
    })
}

pub(crate) struct TestHarness {
    pub cfg: Arc<Config>,
    pub engine: Arc<Lifecycle>,
    pub threads: Arc<MemoryThreads>,
    pub store: Arc<MemoryStore>,
    pub audit: Arc<RecordingAudit>,
}

impl TestHarness {
    pub fn new(cfg: Arc<Config>) -> Self {
        let threads = Arc::new(MemoryThreads::default());
        let store = Arc::new(MemoryStore::default());
        let audit = Arc::new(RecordingAudit::default());
        let engine = Arc::new(Lifecycle::new(
            threads.clone(),
            store.clone(),
            audit.clone(),
            cfg.clone(),
        ));
        Self {
            cfg,
            engine,
            threads,
            store,
            audit,
        }
    }
}

// ============== Fake Thread Service ==============

#[derive(Clone, Debug)]
struct FakeMessage {
    content: String,
    controls: Vec<ControlButton>,
}

#[derive(Debug, Default)]
struct FakeThread {
    archived: bool,
    messages: HashMap<u64, FakeMessage>,
}

#[derive(Default)]
struct ThreadsInner {
    next_id: u64,
    threads: HashMap<u64, FakeThread>,
    deleted: HashSet<u64>,
    fail_archive: bool,
    fail_delete: bool,
    fail_fetch: bool,
}

#[derive(Default)]
pub(crate) struct MemoryThreads {
    inner: Mutex<ThreadsInner>,
}

impl MemoryThreads {
    pub fn archived(&self, thread: ThreadId) -> bool {
        let inner = self.inner.lock().unwrap();
        inner
            .threads
            .get(&thread.0)
            .map(|t| t.archived)
            .unwrap_or(false)
    }

    pub fn force_archived(&self, thread: ThreadId, archived: bool) {
        let mut inner = self.inner.lock().unwrap();
        if let Some(t) = inner.threads.get_mut(&thread.0) {
            t.archived = archived;
        }
    }

    pub fn remove_thread(&self, thread: ThreadId) {
        self.inner.lock().unwrap().threads.remove(&thread.0);
    }

    pub fn deleted(&self, thread: ThreadId) -> bool {
        self.inner.lock().unwrap().deleted.contains(&thread.0)
    }

    pub fn controls(&self, thread: ThreadId, message: MessageId) -> Vec<ControlButton> {
        let inner = self.inner.lock().unwrap();
        inner
            .threads
            .get(&thread.0)
            .and_then(|t| t.messages.get(&message.0))
            .map(|m| m.controls.clone())
            .unwrap_or_default()
    }

    pub fn content(&self, thread: ThreadId, message: MessageId) -> String {
        let inner = self.inner.lock().unwrap();
        inner
            .threads
            .get(&thread.0)
            .and_then(|t| t.messages.get(&message.0))
            .map(|m| m.content.clone())
            .unwrap_or_default()
    }

    pub fn fail_next_archive(&self) {
        self.inner.lock().unwrap().fail_archive = true;
    }

    pub fn fail_next_delete(&self) {
        self.inner.lock().unwrap().fail_delete = true;
    }

    pub fn fail_next_fetch(&self) {
        self.inner.lock().unwrap().fail_fetch = true;
    }
}

#[async_trait]
impl ThreadService for MemoryThreads {
    async fn create_thread(
        &self,
        _parent: u64,
        _name: &str,
        content: &str,
        controls: &[ControlButton],
    ) -> Result<(ThreadId, MessageId)> {
        let mut inner = self.inner.lock().unwrap();
        inner.next_id += 1;
        let thread_id = inner.next_id;
        inner.next_id += 1;
        let message_id = inner.next_id;

        let mut thread = FakeThread::default();
        thread.messages.insert(
            message_id,
            FakeMessage {
                content: content.to_string(),
                controls: controls.to_vec(),
            },
        );
        inner.threads.insert(thread_id, thread);

        Ok((ThreadId(thread_id), MessageId(message_id)))
    }

    async fn send_message(&self, thread: ThreadId, content: &str) -> Result<MessageId> {
        let mut inner = self.inner.lock().unwrap();
        inner.next_id += 1;
        let message_id = inner.next_id;
        let t = inner
            .threads
            .get_mut(&thread.0)
            .ok_or_else(|| Error::Thread("thread not found".to_string()))?;
        t.messages.insert(
            message_id,
            FakeMessage {
                content: content.to_string(),
                controls: Vec::new(),
            },
        );
        Ok(MessageId(message_id))
    }

    async fn edit_message(
        &self,
        thread: ThreadId,
        message: MessageId,
        content: Option<&str>,
        controls: Option<&[ControlButton]>,
    ) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        let m = inner
            .threads
            .get_mut(&thread.0)
            .and_then(|t| t.messages.get_mut(&message.0))
            .ok_or_else(|| Error::Thread("message not found".to_string()))?;
        if let Some(c) = content {
            m.content = c.to_string();
        }
        if let Some(c) = controls {
            m.controls = c.to_vec();
        }
        Ok(())
    }

    async fn set_archived(&self, thread: ThreadId, archived: bool, _reason: &str) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        if inner.fail_archive {
            inner.fail_archive = false;
            return Err(Error::Thread("simulated archive failure".to_string()));
        }
        let t = inner
            .threads
            .get_mut(&thread.0)
            .ok_or_else(|| Error::Thread("thread not found".to_string()))?;
        t.archived = archived;
        Ok(())
    }

    async fn is_archived(&self, thread: ThreadId) -> Result<bool> {
        let mut inner = self.inner.lock().unwrap();
        if inner.fail_archive {
            inner.fail_archive = false;
            return Err(Error::Thread("simulated archive failure".to_string()));
        }
        inner
            .threads
            .get(&thread.0)
            .map(|t| t.archived)
            .ok_or_else(|| Error::Thread("thread not found".to_string()))
    }

    async fn delete_thread(&self, thread: ThreadId, _reason: &str) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        if inner.fail_delete {
            inner.fail_delete = false;
            return Err(Error::Thread("simulated delete failure".to_string()));
        }
        inner.threads.remove(&thread.0);
        inner.deleted.insert(thread.0);
        Ok(())
    }

    async fn fetch_thread(&self, thread: ThreadId) -> Result<Option<ThreadState>> {
        let mut inner = self.inner.lock().unwrap();
        if inner.fail_fetch {
            inner.fail_fetch = false;
            return Err(Error::Thread("simulated fetch failure".to_string()));
        }
        Ok(inner
            .threads
            .get(&thread.0)
            .map(|t| ThreadState { archived: t.archived }))
    }
}

// ============== Fake Store ==============

#[derive(Default)]
struct StoreInner {
    next_id: i64,
    rows: BTreeMap<i64, Listing>,
}

#[derive(Default)]
pub(crate) struct MemoryStore {
    inner: Mutex<StoreInner>,
}

impl ListingStore for MemoryStore {
    fn insert(&self, rec: &NewListing) -> Result<ListingId> {
        let mut inner = self.inner.lock().unwrap();
        inner.next_id += 1;
        let id = ListingId(inner.next_id);
        inner.rows.insert(
            id.0,
            Listing {
                id,
                thread_id: rec.thread_id,
                starter_message_id: rec.starter_message_id,
                author_id: rec.author_id,
                title: rec.title.clone(),
                category: rec.category.clone(),
                description: rec.description.clone(),
                image_url: rec.image_url.clone(),
                status: rec.status,
                created_at: rec.created_at,
                archived_at: None,
                last_bump_at: None,
            },
        );
        Ok(id)
    }

    fn get(&self, id: ListingId) -> Result<Option<Listing>> {
        Ok(self.inner.lock().unwrap().rows.get(&id.0).cloned())
    }

    fn update(&self, id: ListingId, patch: &ListingPatch) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        let row = inner
            .rows
            .get_mut(&id.0)
            .ok_or_else(|| Error::Store(format!("no listing {id}")))?;
        if let Some(status) = patch.status {
            row.status = status;
        }
        if let Some(v) = patch.archived_at {
            row.archived_at = v;
        }
        if let Some(v) = patch.last_bump_at {
            row.last_bump_at = v;
        }
        Ok(())
    }

    fn delete(&self, id: ListingId) -> Result<()> {
        self.inner.lock().unwrap().rows.remove(&id.0);
        Ok(())
    }

    fn list_all(&self) -> Result<Vec<Listing>> {
        Ok(self.inner.lock().unwrap().rows.values().cloned().collect())
    }
}

// ============== Recording Audit Sink ==============

#[derive(Default)]
pub(crate) struct RecordingAudit {
    lines: Mutex<Vec<String>>,
}

impl RecordingAudit {
    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().unwrap().clone()
    }
}

#[async_trait]
impl AuditSink for RecordingAudit {
    async fn emit(&self, text: &str) -> Result<()> {
        self.lines.lock().unwrap().push(text.to_string());
        Ok(())
    }
}
