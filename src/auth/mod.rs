// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Authentication Module
//!
//! Wallet sign-in for the Relational Cover API.
//!
//! ## Auth Flow
//!
//! 1. Client requests a nonce for its wallet address (`POST /v1/auth/nonce`)
//! 2. Wallet signs an EIP-4361 message embedding that nonce
//! 3. Server (`POST /v1/auth/verify`):
//!    - Parses the message and checks the nonce against storage
//!    - Recovers the signer and compares it with the claimed address
//!    - Rotates the nonce and returns an HS256 session token
//! 4. Client sends `Authorization: Bearer <token>` on later requests
//!
//! ## Security
//!
//! - Only the most recently issued nonce is accepted, once
//! - Admin role comes from the `ADMIN_WALLETS` allow-list
//! - Clock skew tolerance is 60 seconds

pub mod challenge;
pub mod claims;
pub mod error;
pub mod extractor;
pub mod roles;
pub mod session;
pub mod siwe;

pub use challenge::request_nonce;
pub use claims::{AuthenticatedUser, SessionClaims};
pub use error::AuthError;
pub use extractor::{AdminOnly, Auth};
pub use roles::Role;
pub use session::{SessionIssuer, SignIn, SESSION_ISSUER};
pub use siwe::{SiweError, SiweMessage};
