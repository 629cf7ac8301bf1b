//! Listing lifecycle engine.
//!
//! Owns every valid state transition, its side effects on the thread service
//! and listing store, and the audit trail. No other component mutates
//! `status`. Mutations are serialized per listing id via a keyed mutex, so a
//! user bump cannot race the sweep's auto-archive on the same record.

use std::{collections::HashMap, sync::Arc};

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::{
    access::{bump_eligibility, can_act, BumpEligibility},
    config::Config,
    domain::{
        normalize_category, thread_name, truncate_chars, Actor, Listing, ListingId, ListingStatus,
        NewListing, MAX_DESCRIPTION_LEN, MAX_TITLE_LEN,
    },
    ports::{AuditSink, ListingPatch, ListingStore, ThreadService},
    router,
    errors::Error,
    Result,
};

// ============== Operation Outcomes ==============

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BumpOutcome {
    Bumped,
    OnCooldown { retry_after_hours: u64 },
    NotFound,
    Forbidden,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ToggleOutcome {
    Archived,
    Unarchived,
    NotFound,
    Forbidden,
    /// Sold listings are final; they cannot be reopened by toggling.
    SoldFinal,
    ThreadOpFailed,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MarkSoldOutcome {
    Sold,
    NotFound,
    Forbidden,
    ThreadOpFailed,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    NotFound,
    Forbidden,
}

/// Counts returned by one sweep pass, for observability.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub scanned: usize,
    pub archived: usize,
    pub deleted: usize,
    pub orphans_removed: usize,
}

/// Payload of the create-listing modal.
#[derive(Clone, Debug)]
pub struct CreateRequest {
    pub author_id: crate::domain::UserId,
    pub author_name: String,
    pub title: String,
    pub category: String,
    pub description: String,
    pub image_url: String,
}

// ============== Per-Listing Locks ==============

#[derive(Default)]
struct ListingLocks {
    inner: Mutex<HashMap<i64, Arc<Mutex<()>>>>,
}

impl ListingLocks {
    async fn lock(&self, id: ListingId) -> OwnedMutexGuard<()> {
        let lock = {
            let mut map = self.inner.lock().await;
            map.entry(id.0)
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }
}

// ============== Engine ==============

pub struct Lifecycle {
    threads: Arc<dyn ThreadService>,
    store: Arc<dyn ListingStore>,
    audit: Arc<dyn AuditSink>,
    cfg: Arc<Config>,
    locks: ListingLocks,
}

impl Lifecycle {
    pub fn new(
        threads: Arc<dyn ThreadService>,
        store: Arc<dyn ListingStore>,
        audit: Arc<dyn AuditSink>,
        cfg: Arc<Config>,
    ) -> Self {
        Self {
            threads,
            store,
            audit,
            cfg,
            locks: ListingLocks::default(),
        }
    }

    /// Create the thread, persist the record, then rewrite the control
    /// buttons with the store-assigned id (two-phase affordance creation).
    ///
    /// Thread creation is not rolled back if the insert fails: the result is
    /// an orphaned thread with no record, which the sweep purges on its next
    /// pass. The reverse (record without thread) cannot happen.
    pub async fn create(&self, req: CreateRequest, now: DateTime<Utc>) -> Result<Listing> {
        let title = truncate_chars(req.title.trim(), MAX_TITLE_LEN);
        if title.is_empty() {
            return Err(Error::Invalid("title must not be empty".to_string()));
        }
        let category = normalize_category(&req.category);
        let description = truncate_chars(&req.description, MAX_DESCRIPTION_LEN);
        let image_url = req.image_url.trim().to_string();

        let name = thread_name(&title, &req.author_name);
        let content = listing_card(&title, &category, &description, &image_url, req.author_id);
        let placeholder = router::control_row(None);

        let (thread_id, starter_message_id) = self
            .threads
            .create_thread(self.cfg.forum_channel_id, &name, &content, &placeholder)
            .await?;

        let rec = NewListing {
            thread_id,
            starter_message_id,
            author_id: req.author_id,
            title,
            category,
            description,
            image_url,
            status: ListingStatus::Active,
            created_at: now,
        };
        let id = self.store.insert(&rec)?;

        // Rewrite button custom-ids now that the real id exists.
        let controls = router::control_row(Some(id));
        if let Err(e) = self
            .threads
            .edit_message(thread_id, starter_message_id, None, Some(controls.as_slice()))
            .await
        {
            tracing::debug!(listing = %id, "control rewrite failed: {e}");
        }

        self.emit_audit(&format!(
            "Listing #{id} created by <@{}> in thread {}",
            req.author_id.0, thread_id.0
        ))
        .await;

        Ok(Listing {
            id,
            thread_id,
            starter_message_id,
            author_id: rec.author_id,
            title: rec.title,
            category: rec.category,
            description: rec.description,
            image_url: rec.image_url,
            status: ListingStatus::Active,
            created_at: now,
            archived_at: None,
            last_bump_at: None,
        })
    }

    pub async fn bump(
        &self,
        id: ListingId,
        actor: Actor,
        now: DateTime<Utc>,
    ) -> Result<BumpOutcome> {
        let _guard = self.locks.lock(id).await;

        let Some(listing) = self.store.get(id)? else {
            return Ok(BumpOutcome::NotFound);
        };
        if !can_act(actor, listing.author_id) {
            return Ok(BumpOutcome::Forbidden);
        }

        let is_author = actor.id == listing.author_id;
        if let BumpEligibility::Wait { hours } = bump_eligibility(
            now,
            listing.last_bump_at,
            self.cfg.bump_cooldown,
            is_author,
        ) {
            return Ok(BumpOutcome::OnCooldown {
                retry_after_hours: hours,
            });
        }

        if listing.status == ListingStatus::Sold {
            // Bump never revives a sold listing: the thread stays archived
            // and archived_at stays set. Only the bump timestamp moves.
            self.store.update(
                id,
                &ListingPatch {
                    last_bump_at: Some(Some(now)),
                    ..ListingPatch::default()
                },
            )?;
        } else {
            if let Err(e) = self
                .threads
                .set_archived(listing.thread_id, false, "Bumped by user")
                .await
            {
                tracing::debug!(listing = %id, "unarchive on bump failed: {e}");
            }
            if let Err(e) = self
                .threads
                .send_message(
                    listing.thread_id,
                    &format!("Listing bumped by <@{}>", actor.id.0),
                )
                .await
            {
                tracing::debug!(listing = %id, "bump notice failed: {e}");
            }

            self.store.update(
                id,
                &ListingPatch {
                    status: Some(ListingStatus::Active),
                    archived_at: Some(None),
                    last_bump_at: Some(Some(now)),
                },
            )?;
        }

        self.emit_audit(&format!("Listing #{id} bumped by <@{}>", actor.id.0))
            .await;
        Ok(BumpOutcome::Bumped)
    }

    /// Flip between active and archived. The external thread's archived flag
    /// is the source of truth, so out-of-band changes are tolerated; the
    /// outcome always reflects the post-toggle state.
    pub async fn toggle_archive(
        &self,
        id: ListingId,
        actor: Actor,
        now: DateTime<Utc>,
    ) -> Result<ToggleOutcome> {
        let _guard = self.locks.lock(id).await;

        let Some(listing) = self.store.get(id)? else {
            return Ok(ToggleOutcome::NotFound);
        };
        if !can_act(actor, listing.author_id) {
            return Ok(ToggleOutcome::Forbidden);
        }
        if listing.status == ListingStatus::Sold {
            return Ok(ToggleOutcome::SoldFinal);
        }

        let currently_archived = match self.threads.is_archived(listing.thread_id).await {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(listing = %id, "archived-state check failed: {e}");
                return Ok(ToggleOutcome::ThreadOpFailed);
            }
        };

        if currently_archived {
            if let Err(e) = self
                .threads
                .set_archived(listing.thread_id, false, "Reopened by author/staff")
                .await
            {
                tracing::warn!(listing = %id, "unarchive failed: {e}");
                return Ok(ToggleOutcome::ThreadOpFailed);
            }
            self.store.update(
                id,
                &ListingPatch {
                    status: Some(ListingStatus::Active),
                    archived_at: Some(None),
                    ..ListingPatch::default()
                },
            )?;
            self.emit_audit(&format!("Listing #{id} reopened by <@{}>", actor.id.0))
                .await;
            Ok(ToggleOutcome::Unarchived)
        } else {
            if let Err(e) = self
                .threads
                .set_archived(listing.thread_id, true, "Archived by author/staff")
                .await
            {
                tracing::warn!(listing = %id, "archive failed: {e}");
                return Ok(ToggleOutcome::ThreadOpFailed);
            }
            self.store.update(
                id,
                &ListingPatch {
                    status: Some(ListingStatus::Archived),
                    archived_at: Some(Some(now)),
                    ..ListingPatch::default()
                },
            )?;
            self.emit_audit(&format!("Listing #{id} archived by <@{}>", actor.id.0))
                .await;
            Ok(ToggleOutcome::Archived)
        }
    }

    /// One-way: nothing reverses Sold back to Active.
    pub async fn mark_sold(
        &self,
        id: ListingId,
        actor: Actor,
        now: DateTime<Utc>,
    ) -> Result<MarkSoldOutcome> {
        let _guard = self.locks.lock(id).await;

        let Some(listing) = self.store.get(id)? else {
            return Ok(MarkSoldOutcome::NotFound);
        };
        if !can_act(actor, listing.author_id) {
            return Ok(MarkSoldOutcome::Forbidden);
        }

        if let Err(e) = self
            .threads
            .set_archived(listing.thread_id, true, "Marked sold")
            .await
        {
            tracing::warn!(listing = %id, "archive on mark-sold failed: {e}");
            return Ok(MarkSoldOutcome::ThreadOpFailed);
        }

        self.store.update(
            id,
            &ListingPatch {
                status: Some(ListingStatus::Sold),
                archived_at: Some(Some(now)),
                ..ListingPatch::default()
            },
        )?;

        // Stamp the starter message and strip the control buttons so the
        // affordances disappear with the sale.
        let stamped = sold_card(&listing, actor);
        let no_controls: &[crate::ports::ControlButton] = &[];
        if let Err(e) = self
            .threads
            .edit_message(
                listing.thread_id,
                listing.starter_message_id,
                Some(stamped.as_str()),
                Some(no_controls),
            )
            .await
        {
            tracing::debug!(listing = %id, "sold stamp failed: {e}");
        }

        self.emit_audit(&format!("Listing #{id} marked sold by <@{}>", actor.id.0))
            .await;
        Ok(MarkSoldOutcome::Sold)
    }

    /// Destroy the thread (best-effort) and remove the record. Irreversible.
    pub async fn delete(&self, id: ListingId, actor: Actor) -> Result<DeleteOutcome> {
        let _guard = self.locks.lock(id).await;

        let Some(listing) = self.store.get(id)? else {
            return Ok(DeleteOutcome::NotFound);
        };
        if !can_act(actor, listing.author_id) {
            return Ok(DeleteOutcome::Forbidden);
        }

        if let Err(e) = self
            .threads
            .delete_thread(listing.thread_id, "Deleted via bot")
            .await
        {
            tracing::debug!(listing = %id, "thread delete failed: {e}");
        }
        self.store.delete(id)?;

        self.emit_audit(&format!("Listing #{id} deleted by <@{}>", actor.id.0))
            .await;
        Ok(DeleteOutcome::Deleted)
    }

    /// Evaluate every listing against the archive/delete thresholds.
    ///
    /// Orphaned records (thread truly gone) are purged. The delete check uses
    /// the archived_at value from before this pass's archive step, so a
    /// listing archived here is never deleted in the same pass. Per-listing
    /// failures are logged and skipped; only a failed store scan aborts the
    /// cycle (retried next tick).
    pub async fn sweep_evaluate(&self, now: DateTime<Utc>) -> Result<SweepReport> {
        let listings = self.store.list_all()?;
        let mut report = SweepReport {
            scanned: listings.len(),
            ..SweepReport::default()
        };

        for listing in listings {
            if let Err(e) = self.sweep_one(&listing, now, &mut report).await {
                tracing::warn!(listing = %listing.id, "sweep step failed: {e}");
            }
        }

        Ok(report)
    }

    async fn sweep_one(
        &self,
        listing: &Listing,
        now: DateTime<Utc>,
        report: &mut SweepReport,
    ) -> Result<()> {
        let _guard = self.locks.lock(listing.id).await;

        // Re-read under the lock: a user operation may have run since list_all.
        let Some(listing) = self.store.get(listing.id)? else {
            return Ok(());
        };

        // A transport failure surfaces as Err and leaves the record alone;
        // only a definitive "gone" purges it.
        let Some(_thread) = self.threads.fetch_thread(listing.thread_id).await? else {
            self.store.delete(listing.id)?;
            report.orphans_removed += 1;
            tracing::info!(listing = %listing.id, "removed orphaned record (thread gone)");
            return Ok(());
        };

        let archived_at_before = listing.archived_at;

        if listing.status == ListingStatus::Active
            && age(now, listing.last_activity()) > self.cfg.archive_after
        {
            match self
                .threads
                .set_archived(listing.thread_id, true, "Auto-archived due to inactivity")
                .await
            {
                Ok(()) => {
                    self.store.update(
                        listing.id,
                        &ListingPatch {
                            status: Some(ListingStatus::Archived),
                            archived_at: Some(Some(now)),
                            ..ListingPatch::default()
                        },
                    )?;
                    report.archived += 1;
                    self.emit_audit(&format!("Listing #{} auto-archived", listing.id))
                        .await;
                }
                Err(e) => {
                    // Leave the record untouched; the next tick retries.
                    tracing::warn!(listing = %listing.id, "auto-archive failed: {e}");
                }
            }
        }

        // Sold listings age out exactly like archived ones.
        if let Some(archived_at) = archived_at_before {
            if age(now, archived_at) > self.cfg.delete_after {
                if let Err(e) = self
                    .threads
                    .delete_thread(listing.thread_id, "Auto-deleted after archived time")
                    .await
                {
                    tracing::debug!(listing = %listing.id, "auto-delete thread failed: {e}");
                }
                self.store.delete(listing.id)?;
                report.deleted += 1;
                self.emit_audit(&format!("Listing #{} auto-deleted", listing.id))
                    .await;
            }
        }

        Ok(())
    }

    async fn emit_audit(&self, text: &str) {
        if let Err(e) = self.audit.emit(text).await {
            tracing::debug!("audit emit failed: {e}");
        }
    }
}

fn age(now: DateTime<Utc>, since: DateTime<Utc>) -> std::time::Duration {
    (now - since).to_std().unwrap_or(std::time::Duration::ZERO)
}

// ============== Message Rendering ==============

fn listing_card(
    title: &str,
    category: &str,
    description: &str,
    image_url: &str,
    author: crate::domain::UserId,
) -> String {
    let desc = if description.trim().is_empty() {
        "No description provided."
    } else {
        description
    };
    let mut out = format!(
        "**{title}**\n\n{desc}\n\n**Type:** {category}\n**Posted by:** <@{}>",
        author.0
    );
    if !image_url.is_empty() {
        out.push('\n');
        out.push_str(image_url);
    }
    out
}

fn sold_card(listing: &Listing, actor: Actor) -> String {
    let card = listing_card(
        &listing.title,
        &listing.category,
        &listing.description,
        &listing.image_url,
        listing.author_id,
    );
    format!("🔒 **SOLD**\n\n{card}\n\n*Marked SOLD by <@{}>*", actor.id.0)
}

// ============== Tests ==============
