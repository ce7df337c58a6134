use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::{CommittedRecord, LinearId, RecordRef};
use crate::proposal::{ProposalDigest, ProposalError, SignedProposal};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SequencedCommit {
    pub proposal: SignedProposal,
    pub consumed: Vec<RecordRef>,
    pub committed: Vec<CommittedRecord>,
    pub sequence: u64,
    pub sequenced_at: DateTime<Utc>,
}

impl SequencedCommit {
    pub fn digest(&self) -> &ProposalDigest {
        &self.proposal.digest
    }

    pub fn single_output(&self) -> Option<&CommittedRecord> {
        match self.committed.as_slice() {
            [only] => Some(only),
            _ => None,
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum VaultError {
    #[error("commit consumes {missing} which this vault does not hold unconsumed")]
    UnknownConsumption { missing: RecordRef },
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum SequencerError {
    #[error("input {input} was already consumed by proposal {consumed_by}")]
    InputConsumed {
        input: RecordRef,
        consumed_by: ProposalDigest,
    },
    #[error("submission failed verification: {0}")]
    Unverifiable(#[from] ProposalError),
    #[error("sequencing authority unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait Vault: Send + Sync {
    async fn current_unconsumed(
        &self,
        linear_id: LinearId,
    ) -> Result<Option<CommittedRecord>, VaultError>;
    async fn list_unconsumed(&self) -> Result<Vec<CommittedRecord>, VaultError>;
    async fn commit(&self, commit: &SequencedCommit) -> Result<(), VaultError>;
}

#[async_trait]
pub trait Sequencer: Send + Sync {
    async fn submit(&self, proposal: &SignedProposal) -> Result<SequencedCommit, SequencerError>;
}
