//! Interaction router: maps button custom-ids onto lifecycle operations.
//!
//! Custom-ids use the `action:listingId` wire format. Parsing happens once,
//! into a tagged `Action`; dispatch matches on the variant instead of string
//! prefixes scattered through handlers.

use chrono::{DateTime, Utc};

use crate::{
    domain::{Actor, ListingId},
    lifecycle::{BumpOutcome, DeleteOutcome, Lifecycle, MarkSoldOutcome, ToggleOutcome},
    ports::{ButtonStyle, ControlButton},
    Result,
};

/// Placeholder id embedded in controls before the store has assigned one;
/// rewritten by the create flow's second phase.
pub const PENDING_ID: &str = "pending";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Action {
    CreateListing,
    MarkSold(ListingId),
    Bump(ListingId),
    ToggleArchive(ListingId),
    Delete(ListingId),
    DeleteConfirm(ListingId),
    DeleteCancel(ListingId),
}

impl Action {
    pub fn parse(custom_id: &str) -> Option<Self> {
        if custom_id == "create_listing" {
            return Some(Action::CreateListing);
        }

        let (head, tail) = custom_id.split_once(':')?;
        let id = ListingId(tail.parse::<i64>().ok()?);
        match head {
            "mark_sold" => Some(Action::MarkSold(id)),
            "bump" => Some(Action::Bump(id)),
            "archive" => Some(Action::ToggleArchive(id)),
            "delete" => Some(Action::Delete(id)),
            "delete_confirm_yes" => Some(Action::DeleteConfirm(id)),
            "delete_confirm_no" => Some(Action::DeleteCancel(id)),
            _ => None,
        }
    }

    pub fn encode(self) -> String {
        match self {
            Action::CreateListing => "create_listing".to_string(),
            Action::MarkSold(id) => format!("mark_sold:{id}"),
            Action::Bump(id) => format!("bump:{id}"),
            Action::ToggleArchive(id) => format!("archive:{id}"),
            Action::Delete(id) => format!("delete:{id}"),
            Action::DeleteConfirm(id) => format!("delete_confirm_yes:{id}"),
            Action::DeleteCancel(id) => format!("delete_confirm_no:{id}"),
        }
    }
}

/// Short user-facing reply to the interacting actor.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Reply {
    pub text: String,
    pub ephemeral: bool,
    /// Confirmation buttons to attach, if any (delete two-step).
    pub controls: Vec<ControlButton>,
}

impl Reply {
    fn ephemeral(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ephemeral: true,
            controls: Vec::new(),
        }
    }
}

/// The management row attached to every listing's starter message. With no
/// id yet assigned, the custom-ids carry [`PENDING_ID`].
pub fn control_row(id: Option<ListingId>) -> Vec<ControlButton> {
    let encode = |head: &str| match id {
        Some(id) => format!("{head}:{id}"),
        None => format!("{head}:{PENDING_ID}"),
    };

    vec![
        ControlButton {
            label: "Mark as Sold".to_string(),
            custom_id: encode("mark_sold"),
            style: ButtonStyle::Success,
        },
        ControlButton {
            label: "Bump".to_string(),
            custom_id: encode("bump"),
            style: ButtonStyle::Primary,
        },
        ControlButton {
            label: "Archive".to_string(),
            custom_id: encode("archive"),
            style: ButtonStyle::Secondary,
        },
        ControlButton {
            label: "Delete".to_string(),
            custom_id: encode("delete"),
            style: ButtonStyle::Danger,
        },
    ]
}

fn delete_confirm_row(id: ListingId) -> Vec<ControlButton> {
    vec![
        ControlButton {
            label: "Confirm Delete".to_string(),
            custom_id: Action::DeleteConfirm(id).encode(),
            style: ButtonStyle::Danger,
        },
        ControlButton {
            label: "Cancel".to_string(),
            custom_id: Action::DeleteCancel(id).encode(),
            style: ButtonStyle::Secondary,
        },
    ]
}

/// Run one parsed action against the engine and produce the actor-facing
/// reply. Create goes through the modal flow, not through here.
pub async fn dispatch(
    engine: &Lifecycle,
    action: Action,
    actor: Actor,
    now: DateTime<Utc>,
) -> Result<Reply> {
    let reply = match action {
        Action::CreateListing => {
            Reply::ephemeral("Use the listing form to create a new listing.")
        }

        Action::Bump(id) => match engine.bump(id, actor, now).await? {
            BumpOutcome::Bumped => Reply::ephemeral("Bumped listing!"),
            BumpOutcome::OnCooldown { retry_after_hours } => Reply::ephemeral(format!(
                "Bump is on cooldown. Try again in ~{retry_after_hours} hour(s)."
            )),
            BumpOutcome::NotFound => Reply::ephemeral("Listing not found"),
            BumpOutcome::Forbidden => {
                Reply::ephemeral("Only the author or staff can bump this listing.")
            }
        },

        Action::MarkSold(id) => match engine.mark_sold(id, actor, now).await? {
            MarkSoldOutcome::Sold => Reply::ephemeral("Marked as sold and archived."),
            MarkSoldOutcome::NotFound => Reply::ephemeral("Listing not found"),
            MarkSoldOutcome::Forbidden => {
                Reply::ephemeral("Only the author or staff can mark this listing.")
            }
            MarkSoldOutcome::ThreadOpFailed => {
                Reply::ephemeral("Could not archive the thread. Try again shortly.")
            }
        },

        Action::ToggleArchive(id) => match engine.toggle_archive(id, actor, now).await? {
            ToggleOutcome::Archived => Reply::ephemeral("Listing archived."),
            ToggleOutcome::Unarchived => Reply::ephemeral("Listing reopened."),
            ToggleOutcome::NotFound => Reply::ephemeral("Listing not found"),
            ToggleOutcome::Forbidden => {
                Reply::ephemeral("Only the author or staff can archive this listing.")
            }
            ToggleOutcome::SoldFinal => {
                Reply::ephemeral("This listing is sold and can no longer be reopened.")
            }
            ToggleOutcome::ThreadOpFailed => {
                Reply::ephemeral("Could not update the thread. Try again shortly.")
            }
        },

        Action::Delete(id) => Reply {
            text: "Are you sure? This will permanently delete the thread.".to_string(),
            ephemeral: true,
            controls: delete_confirm_row(id),
        },

        Action::DeleteConfirm(id) => match engine.delete(id, actor).await? {
            DeleteOutcome::Deleted => Reply::ephemeral("Listing deleted."),
            DeleteOutcome::NotFound => Reply::ephemeral("Listing not found"),
            DeleteOutcome::Forbidden => {
                Reply::ephemeral("Only the author or staff can delete this listing.")
            }
        },

        Action::DeleteCancel(_) => Reply::ephemeral("Delete canceled"),
    };

    Ok(reply)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::UserId;
    use crate::lifecycle::CreateRequest;
    use crate::ports::ListingStore;
    use crate::testing::{test_config, TestHarness};
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn parses_known_actions() {
        assert_eq!(Action::parse("create_listing"), Some(Action::CreateListing));
        assert_eq!(Action::parse("bump:7"), Some(Action::Bump(ListingId(7))));
        assert_eq!(
            Action::parse("delete_confirm_yes:42"),
            Some(Action::DeleteConfirm(ListingId(42)))
        );
        assert_eq!(Action::parse("bump:pending"), None);
        assert_eq!(Action::parse("unknown:1"), None);
        assert_eq!(Action::parse("bump"), None);
    }

    #[test]
    fn encode_parse_round_trip() {
        let actions = [
            Action::MarkSold(ListingId(3)),
            Action::Bump(ListingId(3)),
            Action::ToggleArchive(ListingId(3)),
            Action::Delete(ListingId(3)),
            Action::DeleteConfirm(ListingId(3)),
            Action::DeleteCancel(ListingId(3)),
        ];
        for a in actions {
            assert_eq!(Action::parse(&a.encode()), Some(a));
        }
    }

    #[test]
    fn control_row_uses_placeholder_until_id_assigned() {
        let pending = control_row(None);
        assert!(pending.iter().all(|c| c.custom_id.ends_with(":pending")));
        assert!(pending.iter().all(|c| Action::parse(&c.custom_id).is_none()));

        let real = control_row(Some(ListingId(9)));
        assert!(real.iter().all(|c| Action::parse(&c.custom_id).is_some()));
    }

    #[tokio::test]
    async fn delete_is_a_two_step_confirmation() {
        let h = TestHarness::new(test_config());
        let author = Actor {
            id: UserId(1),
            is_staff: false,
        };
        let l = h
            .engine
            .create(
                CreateRequest {
                    author_id: author.id,
                    author_name: "alice".to_string(),
                    title: "Bike".to_string(),
                    category: String::new(),
                    description: String::new(),
                    image_url: String::new(),
                },
                now(),
            )
            .await
            .unwrap();

        let reply = dispatch(&h.engine, Action::Delete(l.id), author, now())
            .await
            .unwrap();
        assert_eq!(reply.controls.len(), 2);
        assert!(h.store.get(l.id).unwrap().is_some());

        let reply = dispatch(&h.engine, Action::DeleteCancel(l.id), author, now())
            .await
            .unwrap();
        assert_eq!(reply.text, "Delete canceled");
        assert!(h.store.get(l.id).unwrap().is_some());

        let reply = dispatch(&h.engine, Action::DeleteConfirm(l.id), author, now())
            .await
            .unwrap();
        assert_eq!(reply.text, "Listing deleted.");
        assert!(h.store.get(l.id).unwrap().is_none());
    }

    #[tokio::test]
    async fn cooldown_reply_carries_retry_hint() {
        let h = TestHarness::new(test_config());
        let author = Actor {
            id: UserId(1),
            is_staff: false,
        };
        let staff = Actor {
            id: UserId(2),
            is_staff: true,
        };
        let l = h
            .engine
            .create(
                CreateRequest {
                    author_id: author.id,
                    author_name: "alice".to_string(),
                    title: "Bike".to_string(),
                    category: String::new(),
                    description: String::new(),
                    image_url: String::new(),
                },
                now(),
            )
            .await
            .unwrap();

        h.engine.bump(l.id, staff, now()).await.unwrap();
        let reply = dispatch(
            &h.engine,
            Action::Bump(l.id),
            staff,
            now() + chrono::Duration::hours(1),
        )
        .await
        .unwrap();
        assert!(reply.text.contains("cooldown"));
        assert!(reply.text.contains("23 hour"));
    }
}
