// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Canonical JSON serialization and contract hashing.
//!
//! Payloads are canonicalized per RFC 8785 (JCS): keys ordered by UTF-16
//! code units, ECMAScript number rendering, no insignificant whitespace.

use alloy::primitives::keccak256;
use serde_json::Value;

/// Canonical byte representation of a JSON document.
pub fn canonical_json(value: &Value) -> Result<Vec<u8>, serde_json::Error> {
    serde_jcs::to_vec(value)
}

/// `0x`-prefixed keccak-256 of the canonical form.
pub fn contract_hash(payload: &Value) -> Result<String, serde_json::Error> {
    let bytes = canonical_json(payload)?;
    Ok(format!("{:#x}", keccak256(&bytes)))
}
