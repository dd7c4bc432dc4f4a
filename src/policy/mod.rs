// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Policy Lifecycle
//!
//! State machine for insurance policies (see [`PolicyStatus`]). Holder-side
//! operations live in [`PolicyManager`], underwriting in [`AdminReviewer`];
//! the premium-triggered transition is driven by `crate::settlement`.
//!
//! Every transition is a read-check-write inside one storage transaction, so
//! the status precondition is evaluated against committed state.

pub mod error;
pub mod lifecycle;
pub mod review;
pub mod status;

pub use error::PolicyError;
pub use lifecycle::{ContractSubmission, ExpirySummary, PolicyManager};
pub use review::{coverage_window, AdminReviewer, ReviewDecision, MAX_PAYMENT_WINDOW_DAYS};
pub use status::PolicyStatus;
