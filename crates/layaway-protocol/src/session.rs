use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use layaway_core::{
    ContractViolation, PartyKey, PartySignature, RecordRef, SequencedCommit, SignedProposal,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::{Mutex, mpsc};
use tokio::time::timeout;

#[derive(Debug, Error, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RejectReason {
    #[error("contract violation: {0}")]
    Contract(#[from] ContractViolation),
    #[error("input {0} is not an unconsumed record in the counterparty vault")]
    UnknownInput(RecordRef),
    #[error("counterparty is not among the required signers")]
    NotARequiredSigner,
    #[error("the proposer's own signature is missing or does not verify")]
    ProposerSignatureInvalid,
    #[error("the proposer is not the buyer of record")]
    ProposerNotBuyer,
    #[error("the advertised digest does not match the proposal content")]
    DigestMismatch,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum SessionMessage {
    Propose(SignedProposal),
    Sign(PartySignature),
    Reject(RejectReason),
    Finalize(SequencedCommit),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("no session endpoint registered for {0}")]
    UnknownPeer(PartyKey),
    #[error("session closed by the remote end")]
    Closed,
    #[error("no message arrived within {waited:?}")]
    Timeout { waited: Duration },
}

#[derive(Debug)]
pub struct PeerSession {
    remote: PartyKey,
    tx: mpsc::Sender<SessionMessage>,
    rx: mpsc::Receiver<SessionMessage>,
}

impl PeerSession {
    pub fn remote(&self) -> PartyKey {
        self.remote
    }

    pub async fn send(&self, message: SessionMessage) -> Result<(), SessionError> {
        self.tx.send(message).await.map_err(|_| SessionError::Closed)
    }

    pub async fn receive(&mut self, wait: Duration) -> Result<SessionMessage, SessionError> {
        match timeout(wait, self.rx.recv()).await {
            Ok(Some(message)) => Ok(message),
            Ok(None) => Err(SessionError::Closed),
            Err(_) => Err(SessionError::Timeout { waited: wait }),
        }
    }
}

#[async_trait]
pub trait SessionTransport: Send + Sync {
    fn local_key(&self) -> PartyKey;
    async fn connect(&self, peer: PartyKey) -> Result<PeerSession, SessionError>;
    async fn accept(&self) -> Option<PeerSession>;
}

#[derive(Clone, Default)]
pub struct ChannelNetwork {
    peers: Arc<Mutex<HashMap<PartyKey, mpsc::Sender<PeerSession>>>>,
}

impl ChannelNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn endpoint(&self, local: PartyKey, buffer: usize) -> ChannelEndpoint {
        let buffer = buffer.max(1);
        let (accept_tx, accept_rx) = mpsc::channel(buffer);
        self.peers.lock().await.insert(local, accept_tx);
        ChannelEndpoint {
            local,
            buffer,
            network: self.clone(),
            accept_rx: Mutex::new(accept_rx),
        }
    }
}

pub struct ChannelEndpoint {
    local: PartyKey,
    buffer: usize,
    network: ChannelNetwork,
    accept_rx: Mutex<mpsc::Receiver<PeerSession>>,
}

#[async_trait]
impl SessionTransport for ChannelEndpoint {
    fn local_key(&self) -> PartyKey {
        self.local
    }

    async fn connect(&self, peer: PartyKey) -> Result<PeerSession, SessionError> {
        let accept_tx = {
            let peers = self.network.peers.lock().await;
            peers
                .get(&peer)
                .cloned()
                .ok_or(SessionError::UnknownPeer(peer))?
        };

        let (to_peer_tx, to_peer_rx) = mpsc::channel(self.buffer);
        let (to_local_tx, to_local_rx) = mpsc::channel(self.buffer);

        let remote_side = PeerSession {
            remote: self.local,
            tx: to_local_tx,
            rx: to_peer_rx,
        };
        accept_tx
            .send(remote_side)
            .await
            .map_err(|_| SessionError::Closed)?;

        Ok(PeerSession {
            remote: peer,
            tx: to_peer_tx,
            rx: to_local_rx,
        })
    }

    async fn accept(&self) -> Option<PeerSession> {
        self.accept_rx.lock().await.recv().await
    }
}
