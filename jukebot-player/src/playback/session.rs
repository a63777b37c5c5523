//! Playback sessions and the session registry
//!
//! A session pairs one orchestrator (queue + loop) with one player and one
//! cancellation scope. Sessions are created lazily on the first play
//! request for a key and are fully independent of each other; the registry
//! is the only shared structure, safe for concurrent insert/lookup.

use crate::config::Config;
use crate::playback::monitor::StatusSink;
use crate::playback::orchestrator::QueueOrchestrator;
use crate::resolve::ResolverChain;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Key identifying one playback session (e.g. a guild or voice channel id)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionKey(pub u64);

impl std::fmt::Display for SessionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "session:{}", self.0)
    }
}

/// One playback session: orchestrator, player, and cancellation scope
pub struct PlaybackSession {
    key: SessionKey,
    orchestrator: QueueOrchestrator,
    scope: CancellationToken,
}

impl PlaybackSession {
    fn new(
        key: SessionKey,
        config: Arc<Config>,
        resolvers: Arc<ResolverChain>,
        status: Arc<dyn StatusSink>,
    ) -> Self {
        let scope = CancellationToken::new();
        let orchestrator = QueueOrchestrator::new(config, resolvers, status, scope.clone());
        Self {
            key,
            orchestrator,
            scope,
        }
    }

    pub fn key(&self) -> SessionKey {
        self.key
    }

    pub fn orchestrator(&self) -> &QueueOrchestrator {
        &self.orchestrator
    }

    /// A stopped session cannot be reused; the registry hands out a fresh
    /// one for its key.
    pub fn is_stopped(&self) -> bool {
        self.scope.is_cancelled()
    }

    /// Tear the session down. Returns whether anything was playing.
    pub async fn stop(&self) -> bool {
        self.orchestrator.stop().await
    }
}

/// Concurrent map of session key → live session
pub struct SessionRegistry {
    config: Arc<Config>,
    resolvers: Arc<ResolverChain>,
    sessions: RwLock<HashMap<SessionKey, Arc<PlaybackSession>>>,
}

impl SessionRegistry {
    pub fn new(config: Arc<Config>, resolvers: Arc<ResolverChain>) -> Self {
        Self {
            config,
            resolvers,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    pub async fn get(&self, key: SessionKey) -> Option<Arc<PlaybackSession>> {
        self.sessions.read().await.get(&key).cloned()
    }

    /// Fetch the live session for `key`, creating one lazily. A previously
    /// stopped session is replaced.
    pub async fn get_or_create(
        &self,
        key: SessionKey,
        status: Arc<dyn StatusSink>,
    ) -> Arc<PlaybackSession> {
        if let Some(session) = self.get(key).await {
            if !session.is_stopped() {
                return session;
            }
        }
        let mut sessions = self.sessions.write().await;
        // re-check under the write lock; another caller may have won
        if let Some(session) = sessions.get(&key) {
            if !session.is_stopped() {
                return Arc::clone(session);
            }
        }
        info!("creating playback session for {}", key);
        let session = Arc::new(PlaybackSession::new(
            key,
            Arc::clone(&self.config),
            Arc::clone(&self.resolvers),
            status,
        ));
        sessions.insert(key, Arc::clone(&session));
        session
    }

    /// Stop and drop the session for `key`. Returns whether anything was
    /// playing.
    pub async fn stop(&self, key: SessionKey) -> bool {
        let session = self.sessions.write().await.remove(&key);
        match session {
            Some(session) => {
                debug!("stopping {}", key);
                session.stop().await
            }
            None => false,
        }
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}
