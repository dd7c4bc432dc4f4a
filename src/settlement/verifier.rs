// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! On-chain premium transfer verification.
//!
//! Pure read: every call fetches the receipt again and reports either a
//! verified transfer or the first expectation the chain data violates.

use alloy::primitives::{Address, B256, U256};
use serde_json::json;

use crate::blockchain::{
    decode_transfer, ChainClientError, ChainReader, ChainReceipt, TokenTransfer, VerifiedTransfer,
};

/// What a premium payment must look like.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferExpectation {
    pub token: Address,
    pub from: Address,
    pub treasury: Address,
    pub amount: U256,
}

/// Reasons a transaction does not settle a premium.
#[derive(Debug, thiserror::Error)]
pub enum SettlementError {
    #[error("transaction {0} not found (it may not be mined yet)")]
    TransactionNotFound(String),

    #[error("transaction {0} failed on chain")]
    TransactionFailed(String),

    #[error("transaction contains no ERC-20 transfer")]
    NoTransferEvent,

    #[error("no transfer of token {token} to treasury {treasury}")]
    NoMatchingTransfer { treasury: String, token: String },

    #[error("transfer sent from {actual}, expected {expected}")]
    SenderMismatch { expected: String, actual: String },

    #[error("transferred amount {actual} does not equal premium {expected}")]
    AmountMismatch { expected: String, actual: String },

    #[error("chain RPC failure: {0}")]
    Rpc(#[from] ChainClientError),
}

impl SettlementError {
    pub fn error_code(&self) -> &'static str {
        match self {
            SettlementError::TransactionNotFound(_) => "transaction_not_found",
            SettlementError::TransactionFailed(_) => "transaction_failed",
            SettlementError::NoTransferEvent => "no_transfer_event",
            SettlementError::NoMatchingTransfer { .. } => "no_matching_transfer",
            SettlementError::SenderMismatch { .. } => "sender_mismatch",
            SettlementError::AmountMismatch { .. } => "amount_mismatch",
            SettlementError::Rpc(_) => "chain_rpc_error",
        }
    }

    /// Whether retrying the same request later may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SettlementError::TransactionNotFound(_) | SettlementError::Rpc(_)
        )
    }

    /// Expected/actual pair for mismatch reporting.
    pub fn details(&self) -> serde_json::Value {
        let retryable = self.is_retryable();
        match self {
            SettlementError::SenderMismatch { expected, actual }
            | SettlementError::AmountMismatch { expected, actual } => json!({
                "expected": expected,
                "actual": actual,
                "retryable": retryable,
            }),
            SettlementError::NoMatchingTransfer { treasury, token } => json!({
                "treasury": treasury,
                "token": token,
                "retryable": retryable,
            }),
            _ => json!({ "retryable": retryable }),
        }
    }
}

/// Match a receipt against the expected premium transfer.
pub fn match_transfer(
    receipt: &ChainReceipt,
    expected: &TransferExpectation,
) -> Result<TokenTransfer, SettlementError> {
    let tx = format!("{:#x}", receipt.tx_hash);
    if !receipt.success {
        return Err(SettlementError::TransactionFailed(tx));
    }

    let transfers: Vec<TokenTransfer> = receipt.logs.iter().filter_map(decode_transfer).collect();
    if transfers.is_empty() {
        return Err(SettlementError::NoTransferEvent);
    }

    let candidates: Vec<&TokenTransfer> = transfers
        .iter()
        .filter(|t| t.to == expected.treasury && t.token == expected.token)
        .collect();

    // A transaction may carry several treasury transfers; an exact one wins,
    // otherwise the first is the one reported.
    if let Some(exact) = candidates
        .iter()
        .find(|t| t.from == expected.from && t.amount == expected.amount)
    {
        return Ok(**exact);
    }

    let Some(first) = candidates.first() else {
        return Err(SettlementError::NoMatchingTransfer {
            treasury: format!("{:#x}", expected.treasury),
            token: format!("{:#x}", expected.token),
        });
    };

    if first.from != expected.from {
        return Err(SettlementError::SenderMismatch {
            expected: format!("{:#x}", expected.from),
            actual: format!("{:#x}", first.from),
        });
    }

    Err(SettlementError::AmountMismatch {
        expected: expected.amount.to_string(),
        actual: first.amount.to_string(),
    })
}

/// Fetch the receipt for `tx_hash` and verify it settles `expected`.
pub async fn verify_transfer(
    chain: &dyn ChainReader,
    chain_id: u64,
    tx_hash: B256,
    expected: &TransferExpectation,
) -> Result<VerifiedTransfer, SettlementError> {
    let receipt = chain
        .transaction_receipt(tx_hash)
        .await?
        .ok_or_else(|| SettlementError::TransactionNotFound(format!("{:#x}", tx_hash)))?;

    let transfer = match_transfer(&receipt, expected)?;

    Ok(VerifiedTransfer {
        tx_hash,
        chain_id,
        token: transfer.token,
        from: transfer.from,
        to: transfer.to,
        amount: transfer.amount,
        block_number: receipt.block_number,
    })
}
