use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::domain::{Actor, UserId};

// ============== Authorization Gate ==============

/// Every mutating transition uses the same predicate: the listing author or
/// staff. No operation is exempt.
pub fn can_act(actor: Actor, author_id: UserId) -> bool {
    actor.id == author_id || actor.is_staff
}

// ============== Bump Cooldown ==============

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BumpEligibility {
    Ready,
    /// Remaining wait, ceiling to whole hours, for user-facing messaging.
    Wait { hours: u64 },
}

/// The author bumping their own listing is exempt from the cooldown. A
/// listing never bumped before counts as bumped at epoch (always eligible).
pub fn bump_eligibility(
    now: DateTime<Utc>,
    last_bump_at: Option<DateTime<Utc>>,
    cooldown: Duration,
    is_author: bool,
) -> BumpEligibility {
    if is_author {
        return BumpEligibility::Ready;
    }

    let Some(last) = last_bump_at else {
        return BumpEligibility::Ready;
    };

    let elapsed = (now - last).to_std().unwrap_or(Duration::ZERO);
    if elapsed >= cooldown {
        return BumpEligibility::Ready;
    }

    let remaining = cooldown - elapsed;
    let hours = remaining.as_secs().div_ceil(3600).max(1);
    BumpEligibility::Wait { hours }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const COOLDOWN: Duration = Duration::from_secs(24 * 3600);

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn stranger_and_staff_predicate() {
        let author = UserId(1);
        let owner = Actor {
            id: UserId(1),
            is_staff: false,
        };
        let stranger = Actor {
            id: UserId(2),
            is_staff: false,
        };
        let staff = Actor {
            id: UserId(3),
            is_staff: true,
        };

        assert!(can_act(owner, author));
        assert!(!can_act(stranger, author));
        assert!(can_act(staff, author));
    }

    #[test]
    fn rejects_one_second_before_cooldown_expiry() {
        let now = t0() + chrono::Duration::seconds(24 * 3600 - 1);
        let e = bump_eligibility(now, Some(t0()), COOLDOWN, false);
        assert_eq!(e, BumpEligibility::Wait { hours: 1 });
    }

    #[test]
    fn accepts_exactly_at_cooldown_expiry() {
        let now = t0() + chrono::Duration::seconds(24 * 3600);
        let e = bump_eligibility(now, Some(t0()), COOLDOWN, false);
        assert_eq!(e, BumpEligibility::Ready);
    }

    #[test]
    fn author_is_exempt_regardless_of_timing() {
        let now = t0() + chrono::Duration::seconds(1);
        let e = bump_eligibility(now, Some(t0()), COOLDOWN, true);
        assert_eq!(e, BumpEligibility::Ready);
    }

    #[test]
    fn never_bumped_is_always_eligible() {
        let e = bump_eligibility(t0(), None, COOLDOWN, false);
        assert_eq!(e, BumpEligibility::Ready);
    }

    #[test]
    fn remaining_wait_rounds_up_to_whole_hours() {
        let now = t0() + chrono::Duration::hours(10) + chrono::Duration::minutes(1);
        let e = bump_eligibility(now, Some(t0()), COOLDOWN, false);
        // 13h 59m remaining -> 14 hours.
        assert_eq!(e, BumpEligibility::Wait { hours: 14 });
    }
}
