// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Policy lifecycle states.
//!
//! ```text
//! DRAFT ── sign ──▶ PENDING_UNDERWRITING ── approve ──▶ APPROVED_AWAITING_PAYMENT ── pay ──▶ ACTIVE
//!                          │                                     │                            │
//!                        reject                              deadline                     term ends
//!                          ▼                                     ▼                            ▼
//!                      REJECTED                           EXPIRED_UNPAID                   EXPIRED
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PolicyStatus {
    Draft,
    PendingUnderwriting,
    ApprovedAwaitingPayment,
    Active,
    ExpiredUnpaid,
    Rejected,
    Expired,
}

impl PolicyStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PolicyStatus::Draft => "DRAFT",
            PolicyStatus::PendingUnderwriting => "PENDING_UNDERWRITING",
            PolicyStatus::ApprovedAwaitingPayment => "APPROVED_AWAITING_PAYMENT",
            PolicyStatus::Active => "ACTIVE",
            PolicyStatus::ExpiredUnpaid => "EXPIRED_UNPAID",
            PolicyStatus::Rejected => "REJECTED",
            PolicyStatus::Expired => "EXPIRED",
        }
    }

    /// No transition leaves a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PolicyStatus::ExpiredUnpaid | PolicyStatus::Rejected | PolicyStatus::Expired
        )
    }

    pub fn can_transition_to(&self, next: PolicyStatus) -> bool {
        use PolicyStatus::*;
        matches!(
            (self, next),
            (Draft, PendingUnderwriting)
                | (PendingUnderwriting, ApprovedAwaitingPayment)
                | (PendingUnderwriting, Rejected)
                | (ApprovedAwaitingPayment, Active)
                | (ApprovedAwaitingPayment, ExpiredUnpaid)
                | (Active, Expired)
        )
    }
}

impl fmt::Display for PolicyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PolicyStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "DRAFT" => Ok(PolicyStatus::Draft),
            "PENDING_UNDERWRITING" => Ok(PolicyStatus::PendingUnderwriting),
            "APPROVED_AWAITING_PAYMENT" => Ok(PolicyStatus::ApprovedAwaitingPayment),
            "ACTIVE" => Ok(PolicyStatus::Active),
            "EXPIRED_UNPAID" => Ok(PolicyStatus::ExpiredUnpaid),
            "REJECTED" => Ok(PolicyStatus::Rejected),
            "EXPIRED" => Ok(PolicyStatus::Expired),
            other => Err(format!("unknown policy status: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [PolicyStatus; 7] = [
        PolicyStatus::Draft,
        PolicyStatus::PendingUnderwriting,
        PolicyStatus::ApprovedAwaitingPayment,
        PolicyStatus::Active,
        PolicyStatus::ExpiredUnpaid,
        PolicyStatus::Rejected,
        PolicyStatus::Expired,
    ];

    #[test]
    fn terminal_states_have_no_exits() {
        for from in ALL.iter().filter(|s| s.is_terminal()) {
            for to in ALL {
                assert!(!from.can_transition_to(to), "{from} -> {to}");
            }
        }
    }

    #[test]
    fn review_precedes_payment() {
        assert!(PolicyStatus::PendingUnderwriting
            .can_transition_to(PolicyStatus::ApprovedAwaitingPayment));
        assert!(PolicyStatus::ApprovedAwaitingPayment.can_transition_to(PolicyStatus::Active));
        assert!(!PolicyStatus::PendingUnderwriting.can_transition_to(PolicyStatus::Active));
        assert!(!PolicyStatus::Draft.can_transition_to(PolicyStatus::ApprovedAwaitingPayment));
        assert!(!PolicyStatus::ApprovedAwaitingPayment.can_transition_to(PolicyStatus::Rejected));
    }

    #[test]
    fn wire_format_is_screaming_snake_case() {
        let json = serde_json::to_string(&PolicyStatus::ApprovedAwaitingPayment).unwrap();
        assert_eq!(json, "\"APPROVED_AWAITING_PAYMENT\"");
        for status in ALL {
            assert_eq!(status.as_str().parse::<PolicyStatus>().unwrap(), status);
        }
        assert_eq!("active".parse::<PolicyStatus>().unwrap(), PolicyStatus::Active);
        assert!("CANCELLED".parse::<PolicyStatus>().is_err());
    }
}
