use std::time::Duration;

use layaway_core::{
    ContractViolation, LinearId, PartyKey, ProposalDigest, RecordRef, SequencerError, VaultError,
};
use thiserror::Error;

use crate::session::{RejectReason, SessionError};

#[derive(Debug, Error, Clone, PartialEq)]
pub enum FlowError {
    #[error("proposal failed local validation: {0}")]
    Validation(#[from] ContractViolation),
    #[error("counterparty {by} rejected the proposal: {reason}")]
    Rejected { by: PartyKey, reason: RejectReason },
    #[error("caller is not entitled to {action} this purchase")]
    Unauthorized { action: &'static str },
    #[error("no unconsumed purchase with id {0}")]
    NotFound(LinearId),
    #[error("counterparty {party} did not answer within {waited:?}")]
    SignatureTimeout { party: PartyKey, waited: Duration },
    #[error("input {input} was already sequenced under competing proposal {consumed_by}")]
    SequencerConflict {
        input: RecordRef,
        consumed_by: ProposalDigest,
    },
    #[error("the sequencer did not answer within {waited:?}")]
    SequencerTimeout { waited: Duration },
    #[error("malformed proposal: {0}")]
    Malformed(String),
    #[error("session failed: {0}")]
    Session(#[from] SessionError),
    #[error("vault refused the commit: {0}")]
    Vault(#[from] VaultError),
    #[error("sequencer refused the submission: {0}")]
    Sequencer(SequencerError),
}

impl FlowError {
    pub(crate) fn from_sequencer(err: SequencerError) -> Self {
        match err {
            SequencerError::InputConsumed { input, consumed_by } => {
                FlowError::SequencerConflict { input, consumed_by }
            }
            other => FlowError::Sequencer(other),
        }
    }
}
