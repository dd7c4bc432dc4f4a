// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Read-only EVM JSON-RPC client.

use alloy::{
    network::Ethereum,
    primitives::B256,
    providers::{
        fillers::{BlobGasFiller, ChainIdFiller, FillProvider, GasFiller, JoinFill, NonceFiller},
        Identity, Provider, ProviderBuilder, RootProvider,
    },
};
use async_trait::async_trait;

use super::types::{ChainReceipt, ReceiptLog};

/// HTTP provider type (with the default fillers).
type HttpProvider = FillProvider<
    JoinFill<
        Identity,
        JoinFill<GasFiller, JoinFill<BlobGasFiller, JoinFill<NonceFiller, ChainIdFiller>>>,
    >,
    RootProvider<Ethereum>,
>;

/// Read-only chain queries used by settlement verification.
///
/// Every call goes to the chain; implementations must not cache receipts.
#[async_trait]
pub trait ChainReader: Send + Sync {
    /// Execution receipt for a transaction, `None` if not (yet) mined.
    async fn transaction_receipt(
        &self,
        tx_hash: B256,
    ) -> Result<Option<ChainReceipt>, ChainClientError>;

    /// Network id reported by the endpoint.
    async fn chain_id(&self) -> Result<u64, ChainClientError>;
}

/// JSON-RPC backed [`ChainReader`].
pub struct ChainClient {
    provider: HttpProvider,
}

impl ChainClient {
    /// Create a client for the given RPC endpoint.
    pub fn new(rpc_url: &str) -> Result<Self, ChainClientError> {
        let url: url::Url = rpc_url
            .parse()
            .map_err(|e: url::ParseError| ChainClientError::InvalidRpcUrl(e.to_string()))?;

        let provider = ProviderBuilder::new().connect_http(url);

        Ok(Self { provider })
    }
}

#[async_trait]
impl ChainReader for ChainClient {
    async fn transaction_receipt(
        &self,
        tx_hash: B256,
    ) -> Result<Option<ChainReceipt>, ChainClientError> {
        let receipt = self
            .provider
            .get_transaction_receipt(tx_hash)
            .await
            .map_err(|e| ChainClientError::Rpc(e.to_string()))?;

        Ok(receipt.map(|receipt| {
            let logs = receipt
                .inner
                .logs()
                .iter()
                .map(|log| ReceiptLog {
                    address: log.address(),
                    topics: log.topics().to_vec(),
                    data: log.data().data.to_vec(),
                })
                .collect();

            ChainReceipt {
                tx_hash,
                success: receipt.inner.status(),
                block_number: receipt.block_number,
                logs,
            }
        }))
    }

    async fn chain_id(&self) -> Result<u64, ChainClientError> {
        self.provider
            .get_chain_id()
            .await
            .map_err(|e| ChainClientError::Rpc(e.to_string()))
    }
}

/// Errors that can occur during blockchain operations.
#[derive(Debug, thiserror::Error)]
pub enum ChainClientError {
    #[error("Invalid RPC URL: {0}")]
    InvalidRpcUrl(String),

    #[error("RPC error: {0}")]
    Rpc(String),
}
