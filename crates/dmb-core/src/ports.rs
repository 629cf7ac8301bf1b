use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{
    domain::{Listing, ListingId, ListingStatus, MessageId, NewListing, ThreadId},
    Result,
};

// ============== Thread Service ==============

/// Visual style of a control button; the adapter maps this to the platform's
/// button styles.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ButtonStyle {
    Primary,
    Success,
    Danger,
    Secondary,
}

/// Platform-neutral control affordance attached to a message. `custom_id`
/// carries the `action:listingId` wire format (see `router`).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ControlButton {
    pub label: String,
    pub custom_id: String,
    pub style: ButtonStyle,
}

/// Externally observed state of a thread.
#[derive(Clone, Copy, Debug)]
pub struct ThreadState {
    pub archived: bool,
}

/// Hexagonal port for the externally-managed discussion threads.
///
/// Discord is the first implementation; the shape is designed so another
/// forum-like platform could fit behind the same interface.
#[async_trait]
pub trait ThreadService: Send + Sync {
    /// Create a thread under `parent` with a starter message.
    async fn create_thread(
        &self,
        parent: u64,
        name: &str,
        content: &str,
        controls: &[ControlButton],
    ) -> Result<(ThreadId, MessageId)>;

    async fn send_message(&self, thread: ThreadId, content: &str) -> Result<MessageId>;

    /// Edit a message in place. `None` leaves the corresponding part
    /// untouched; `Some(&[])` for controls strips all buttons.
    async fn edit_message(
        &self,
        thread: ThreadId,
        message: MessageId,
        content: Option<&str>,
        controls: Option<&[ControlButton]>,
    ) -> Result<()>;

    async fn set_archived(&self, thread: ThreadId, archived: bool, reason: &str) -> Result<()>;

    async fn is_archived(&self, thread: ThreadId) -> Result<bool>;

    async fn delete_thread(&self, thread: ThreadId, reason: &str) -> Result<()>;

    /// `Ok(None)` means the thread is definitively gone (orphan). A transport
    /// failure must surface as `Err`, never as `Ok(None)`, because the sweep
    /// purges records whose thread no longer exists.
    async fn fetch_thread(&self, thread: ThreadId) -> Result<Option<ThreadState>>;
}

// ============== Listing Store ==============

/// Partial update for a listing row. `None` fields are left untouched; the
/// double-`Option` on timestamps distinguishes "don't touch" from "set NULL".
#[derive(Clone, Debug, Default)]
pub struct ListingPatch {
    pub status: Option<ListingStatus>,
    pub archived_at: Option<Option<DateTime<Utc>>>,
    pub last_bump_at: Option<Option<DateTime<Utc>>>,
}

/// Hexagonal port for the single-table listing store.
///
/// Kept synchronous: the sqlite adapter is a local, fast, blocking call, and
/// the engine invokes it between (not across) thread-service awaits.
pub trait ListingStore: Send + Sync {
    fn insert(&self, rec: &NewListing) -> Result<ListingId>;
    fn get(&self, id: ListingId) -> Result<Option<Listing>>;
    fn update(&self, id: ListingId, patch: &ListingPatch) -> Result<()>;
    fn delete(&self, id: ListingId) -> Result<()>;
    fn list_all(&self) -> Result<Vec<Listing>>;
}

// ============== Audit Sink ==============

/// Optional staff-log sink. Emission is fire-and-forget: callers log failures
/// at debug and move on.
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn emit(&self, text: &str) -> Result<()>;
}

/// Default sink when no staff-log channel is configured.
pub struct NullAudit;

#[async_trait]
impl AuditSink for NullAudit {
    async fn emit(&self, _text: &str) -> Result<()> {
        Ok(())
    }
}
