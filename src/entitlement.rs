// src/entitlement.rs
//
// Entitlement evaluator: decides whether a viewer may see a given student's
// result, and records consumption against the viewer's purchase quota.
// All durable state lives in Postgres; each call is one bounded
// request/response with no in-process shared state.

use sqlx::PgPool;

use crate::db;
use crate::models::Purchase;

/// Outcome of a permission check. `FreshView` grants permission without
/// consuming anything; consumption happens in [`record_view`].
#[derive(Debug)]
pub enum ViewDecision {
    /// The viewer owns this record. Always free, never metered.
    OwnResult,
    /// Already paid for under this purchase; re-viewing is free.
    AlreadyViewed { purchase: Purchase },
    /// Permitted; a call to `record_view` will consume quota.
    FreshView { purchase: Purchase },
    NoActivePlan,
}

/// Outcome of recording a view.
#[derive(Debug)]
pub enum RecordOutcome {
    /// Own result: nothing recorded, nothing decremented.
    OwnResult,
    /// The (viewer, roll_no, purchase) triple already existed. No-op;
    /// `views_remaining` is whatever it currently is.
    AlreadyViewed { views_remaining: Option<i32> },
    /// View row inserted and quota decremented (None = unlimited plan).
    Recorded { views_remaining: Option<i32> },
    NoActivePlan,
}

/// Permission check for (viewer, roll_no). Read-only.
///
/// An unknown roll number simply fails the own-result match and falls
/// through to the purchase check; 404 semantics belong to the caller.
pub async fn can_view(
    pool: &PgPool,
    batch: &str,
    viewer_email: &str,
    roll_no: &str,
) -> Result<ViewDecision, sqlx::Error> {
    if is_own_result(pool, batch, viewer_email, roll_no).await? {
        return Ok(ViewDecision::OwnResult);
    }

    let Some(purchase) = db::find_eligible_purchase(pool, viewer_email).await? else {
        return Ok(ViewDecision::NoActivePlan);
    };

    let viewed = db::find_result_view(pool, viewer_email, roll_no, purchase.purchase_id).await?;
    if viewed.is_some() {
        return Ok(ViewDecision::AlreadyViewed { purchase });
    }

    Ok(ViewDecision::FreshView { purchase })
}

/// Record a view and decrement quota. Idempotent per
/// (viewer, roll_no, purchase): a retry or double-click never
/// double-decrements.
///
/// The eligible purchase is re-selected here rather than carried over from
/// a prior `can_view`; a race between the two calls is tolerated because
/// the view-row uniqueness check and the conditional decrement both run
/// against current store state.
pub async fn record_view(
    pool: &PgPool,
    batch: &str,
    viewer_email: &str,
    roll_no: &str,
) -> Result<RecordOutcome, sqlx::Error> {
    if is_own_result(pool, batch, viewer_email, roll_no).await? {
        return Ok(RecordOutcome::OwnResult);
    }

    let Some(purchase) = db::find_eligible_purchase(pool, viewer_email).await? else {
        return Ok(RecordOutcome::NoActivePlan);
    };

    let viewed = db::find_result_view(pool, viewer_email, roll_no, purchase.purchase_id).await?;
    if viewed.is_some() {
        return Ok(RecordOutcome::AlreadyViewed {
            views_remaining: purchase.views_remaining,
        });
    }

    let inserted = db::insert_result_view(pool, viewer_email, roll_no, purchase.purchase_id).await?;
    if !inserted {
        // A concurrent record of the same triple won the insert between our
        // uniqueness check and this statement. That call owns the decrement;
        // this one is a duplicate and must not charge again.
        return Ok(RecordOutcome::AlreadyViewed {
            views_remaining: purchase.views_remaining,
        });
    }

    // Unlimited plans (NULL quota) skip the decrement entirely and never
    // exhaust. For metered plans the decrement-if-positive is one atomic
    // statement, so concurrent records cannot push quota below zero.
    if purchase.views_remaining.is_none() {
        return Ok(RecordOutcome::Recorded {
            views_remaining: None,
        });
    }

    let new_remaining = db::decrement_views_if_positive(pool, purchase.purchase_id).await?;

    match new_remaining {
        Some(n) => {
            if n <= 0 {
                // Exhausted: terminal state, the purchase is never
                // selected as eligible again.
                db::deactivate_purchase(pool, purchase.purchase_id).await?;
            }
            Ok(RecordOutcome::Recorded {
                views_remaining: Some(n),
            })
        }
        None => {
            // Lost a race: another record consumed the last view between
            // our select and the decrement. The view row is already
            // inserted under this purchase, so report it as recorded with
            // the floor value.
            db::deactivate_purchase(pool, purchase.purchase_id).await?;
            Ok(RecordOutcome::Recorded {
                views_remaining: Some(0),
            })
        }
    }
}

async fn is_own_result(
    pool: &PgPool,
    batch: &str,
    viewer_email: &str,
    roll_no: &str,
) -> Result<bool, sqlx::Error> {
    let student = db::find_student_by_roll(pool, batch, roll_no).await?;
    Ok(matches!(student, Some(s) if s.student_email == viewer_email))
}

/// First purchase that still has quota available, input newest-first.
/// Used by the purchases listing; the store-side equivalent is
/// `db::find_eligible_purchase`.
pub fn pick_active_purchase(purchases: &[Purchase]) -> Option<&Purchase> {
    purchases.iter().find(|p| {
        p.is_active && (p.views_remaining.is_none() || p.views_remaining.unwrap_or(0) > 0)
    })
}
