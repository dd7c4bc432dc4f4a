// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;

use crate::auth::SessionIssuer;
use crate::blockchain::ChainReader;
use crate::contract::ArtifactStore;
use crate::storage::CoverDatabase;

/// Request-independent settings handlers need.
#[derive(Debug, Clone)]
pub struct ServiceOptions {
    /// Required domain in sign-in messages
    pub siwe_domain: Option<String>,
    /// Default payment window for approvals
    pub payment_window_days: u32,
}

#[derive(Clone)]
pub struct AppState {
    pub db: Arc<CoverDatabase>,
    pub sessions: Arc<SessionIssuer>,
    pub chain: Arc<dyn ChainReader>,
    pub artifacts: Arc<dyn ArtifactStore>,
    pub options: Arc<ServiceOptions>,
}

impl AppState {
    pub fn new(
        db: CoverDatabase,
        sessions: SessionIssuer,
        chain: Arc<dyn ChainReader>,
        artifacts: Arc<dyn ArtifactStore>,
        options: ServiceOptions,
    ) -> Self {
        Self {
            db: Arc::new(db),
            sessions: Arc::new(sessions),
            chain,
            artifacts,
            options: Arc::new(options),
        }
    }
}

/// State over a throwaway database, a [`crate::testing::MockChain`] on
/// chain 56 and an artifact directory; signer 9 is the admin.
#[cfg(test)]
pub(crate) fn test_state() -> (AppState, tempfile::TempDir) {
    test_state_with_chain(Arc::new(crate::testing::MockChain::new(56)))
}

#[cfg(test)]
pub(crate) fn test_state_with_chain(chain: Arc<dyn ChainReader>) -> (AppState, tempfile::TempDir) {
    use crate::blockchain::signing::test_signers;
    use crate::contract::FsArtifactStore;
    use crate::models::WalletAddress;

    let dir = tempfile::tempdir().unwrap();
    let db = CoverDatabase::open(&dir.path().join("cover.redb")).unwrap();
    let admins = [WalletAddress::from(test_signers::address(9))].into_iter().collect();
    let sessions = SessionIssuer::new(b"0123456789abcdef0123456789abcdef", 3600, admins);
    let artifacts = Arc::new(FsArtifactStore::new(dir.path().join("signatures"), "/artifacts"));

    let state = AppState::new(
        db,
        sessions,
        chain,
        artifacts,
        ServiceOptions {
            siwe_domain: Some("cover.test".to_string()),
            payment_window_days: 7,
        },
    );
    (state, dir)
}
