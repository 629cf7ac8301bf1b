use chrono::{DateTime, Utc};

/// Store-assigned listing id (sqlite rowid).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListingId(pub i64);

impl std::fmt::Display for ListingId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Discord user id (snowflake).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct UserId(pub u64);

/// Discord thread id (snowflake). A thread is also a channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ThreadId(pub u64);

/// Discord message id (snowflake).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MessageId(pub u64);

/// The actor behind an interaction. Staff is anyone the platform grants
/// thread-management permission to.
#[derive(Clone, Copy, Debug)]
pub struct Actor {
    pub id: UserId,
    pub is_staff: bool,
}

/// Lifecycle status of a listing. Deleted listings are removed from the
/// store, not tombstoned.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ListingStatus {
    Active,
    Archived,
    Sold,
}

impl ListingStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ListingStatus::Active => "active",
            ListingStatus::Archived => "archived",
            ListingStatus::Sold => "sold",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "active" => Some(ListingStatus::Active),
            "archived" => Some(ListingStatus::Archived),
            "sold" => Some(ListingStatus::Sold),
            _ => None,
        }
    }
}

/// The sole persistent entity: one marketplace listing owning one thread.
///
/// Invariant: `archived_at` is non-null iff `status` is Archived or Sold.
/// `status` is mutated only through the lifecycle engine.
#[derive(Clone, Debug)]
pub struct Listing {
    pub id: ListingId,
    pub thread_id: ThreadId,
    pub starter_message_id: MessageId,
    pub author_id: UserId,
    pub title: String,
    pub category: String,
    pub description: String,
    pub image_url: String,
    pub status: ListingStatus,
    pub created_at: DateTime<Utc>,
    pub archived_at: Option<DateTime<Utc>>,
    pub last_bump_at: Option<DateTime<Utc>>,
}

impl Listing {
    /// Reference point for auto-archive aging: the last bump once present,
    /// otherwise creation time.
    pub fn last_activity(&self) -> DateTime<Utc> {
        self.last_bump_at.unwrap_or(self.created_at)
    }
}

/// Record handed to the store for insertion; the store assigns the id.
#[derive(Clone, Debug)]
pub struct NewListing {
    pub thread_id: ThreadId,
    pub starter_message_id: MessageId,
    pub author_id: UserId,
    pub title: String,
    pub category: String,
    pub description: String,
    pub image_url: String,
    pub status: ListingStatus,
    pub created_at: DateTime<Utc>,
}

// ============== Input Normalization ==============

pub const MAX_TITLE_LEN: usize = 90;
pub const MAX_DESCRIPTION_LEN: usize = 2000;
pub const MAX_THREAD_NAME_LEN: usize = 100;

pub fn truncate_chars(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    s.chars().take(max).collect()
}

/// Category is free-form user text like "Selling, lightly used" or
/// "Buying/Trading". Keep the part before the first comma or slash; default
/// to "Selling" when empty.
pub fn normalize_category(raw: &str) -> String {
    let head = raw
        .split(|c| c == ',' || c == '/')
        .next()
        .unwrap_or("")
        .trim();
    if head.is_empty() {
        "Selling".to_string()
    } else {
        head.to_string()
    }
}

/// Thread title shown in the forum channel list.
pub fn thread_name(title: &str, author_name: &str) -> String {
    truncate_chars(&format!("{title} — {author_name}"), MAX_THREAD_NAME_LEN)
}
