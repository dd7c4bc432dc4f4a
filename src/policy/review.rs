// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Underwriting decisions.

use chrono::{DateTime, Days, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use utoipa::ToSchema;

use super::{PolicyError, PolicyStatus};
use crate::audit_log;
use crate::models::WalletAddress;
use crate::storage::{
    AuditEvent, AuditEventType, CoverDatabase, Policy, PolicyRepository, ProductRepository,
};

/// Longest payment window an approval may grant.
pub const MAX_PAYMENT_WINDOW_DAYS: u32 = 90;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ReviewDecision {
    Approve,
    Reject,
}

/// Coverage window of `term_days` calendar days starting at `start` (UTC).
pub fn coverage_window(
    start: DateTime<Utc>,
    term_days: u32,
) -> Result<(DateTime<Utc>, DateTime<Utc>), PolicyError> {
    let end = start
        .checked_add_days(Days::new(u64::from(term_days)))
        .ok_or_else(|| PolicyError::Internal("coverage end out of range".to_string()))?;
    Ok((start, end))
}

/// Applies admin approve/reject decisions.
pub struct AdminReviewer<'a> {
    db: &'a CoverDatabase,
}

impl<'a> AdminReviewer<'a> {
    pub fn new(db: &'a CoverDatabase) -> Self {
        Self { db }
    }

    /// Decide a policy in `PENDING_UNDERWRITING`.
    ///
    /// Approval sets the payment deadline and a provisional coverage window;
    /// the window is re-anchored when the premium settles. Rejection is
    /// terminal and leaves the window unset.
    pub fn review(
        &self,
        policy_id: &str,
        decision: ReviewDecision,
        note: Option<String>,
        payment_window_days: u32,
        reviewer: &WalletAddress,
        now: DateTime<Utc>,
    ) -> Result<Policy, PolicyError> {
        if payment_window_days == 0 || payment_window_days > MAX_PAYMENT_WINDOW_DAYS {
            return Err(PolicyError::InvalidRequest(format!(
                "payment_window_days must be between 1 and {MAX_PAYMENT_WINDOW_DAYS}"
            )));
        }

        let repo = PolicyRepository::new(self.db);
        let current = repo
            .get(policy_id)?
            .ok_or_else(|| PolicyError::PolicyNotFound(policy_id.to_string()))?;
        require_pending(&current)?;

        let updated = match decision {
            ReviewDecision::Approve => {
                let product = ProductRepository::new(self.db)
                    .get(&current.product_id)?
                    .ok_or_else(|| PolicyError::ProductUnavailable(current.product_id.clone()))?;
                let (start, end) = coverage_window(now, product.term_days_or_default())?;
                let deadline = now
                    .checked_add_days(Days::new(u64::from(payment_window_days)))
                    .ok_or_else(|| PolicyError::Internal("deadline out of range".to_string()))?;

                repo.update::<_, PolicyError>(policy_id, |p| {
                    require_pending(p)?;
                    p.status = PolicyStatus::ApprovedAwaitingPayment;
                    p.payment_deadline = Some(deadline);
                    p.coverage_start_at = Some(start);
                    p.coverage_end_at = Some(end);
                    p.reviewer_note = note.clone();
                    p.reviewed_by = Some(reviewer.as_canonical());
                    p.reviewed_at = Some(now);
                    p.updated_at = now;
                    Ok(())
                })?
            }
            ReviewDecision::Reject => repo.update::<_, PolicyError>(policy_id, |p| {
                require_pending(p)?;
                p.status = PolicyStatus::Rejected;
                p.reviewer_note = note.clone();
                p.reviewed_by = Some(reviewer.as_canonical());
                p.reviewed_at = Some(now);
                p.updated_at = now;
                Ok(())
            })?,
        };

        tracing::info!(
            policy_id = %policy_id,
            reviewer = %reviewer,
            decision = ?decision,
            status = %updated.status,
            "Policy reviewed"
        );

        let event_type = match decision {
            ReviewDecision::Approve => AuditEventType::PolicyApproved,
            ReviewDecision::Reject => AuditEventType::PolicyRejected,
        };
        audit_log!(
            self.db,
            AuditEvent::new(event_type)
                .with_actor(reviewer.as_canonical())
                .with_resource("policy", policy_id)
                .with_details(json!({
                    "note": updated.reviewer_note,
                    "payment_deadline": updated.payment_deadline,
                }))
        );

        Ok(updated)
    }
}

fn require_pending(policy: &Policy) -> Result<(), PolicyError> {
    if policy.status == PolicyStatus::PendingUnderwriting {
        Ok(())
    } else {
        Err(PolicyError::invalid_state(
            &policy.id,
            policy.status,
            PolicyStatus::PendingUnderwriting,
        ))
    }
}
