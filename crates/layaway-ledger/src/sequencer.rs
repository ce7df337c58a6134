use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use layaway_core::{
    CommittedRecord, ProposalDigest, RecordRef, SequencedCommit, Sequencer, SequencerError,
    SignedProposal,
};
use tokio::sync::Mutex;
use tracing::{debug, warn};

#[derive(Default)]
pub struct InMemorySequencer {
    state: Mutex<SequencerState>,
}

#[derive(Default)]
struct SequencerState {
    consumed: HashMap<RecordRef, ProposalDigest>,
    minted: HashMap<ProposalDigest, SequencedCommit>,
    sequence: u64,
}

impl InMemorySequencer {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Sequencer for InMemorySequencer {
    async fn submit(&self, proposal: &SignedProposal) -> Result<SequencedCommit, SequencerError> {
        proposal.verify()?;

        let mut state = self.state.lock().await;

        if let Some(previous) = state.minted.get(&proposal.digest) {
            return Ok(previous.clone());
        }

        for input in &proposal.proposal.inputs {
            if let Some(holder) = state.consumed.get(input) {
                warn!(
                    "refusing proposal {}: input {input} already consumed by {holder}",
                    proposal.digest
                );
                return Err(SequencerError::InputConsumed {
                    input: input.clone(),
                    consumed_by: holder.clone(),
                });
            }
        }

        for input in &proposal.proposal.inputs {
            state.consumed.insert(input.clone(), proposal.digest.clone());
        }
        state.sequence += 1;

        let committed = proposal
            .proposal
            .outputs
            .iter()
            .enumerate()
            .map(|(index, record)| CommittedRecord {
                ref_id: RecordRef::output_of(&proposal.digest, index),
                record: record.clone(),
            })
            .collect();

        let commit = SequencedCommit {
            proposal: proposal.clone(),
            consumed: proposal.proposal.inputs.clone(),
            committed,
            sequence: state.sequence,
            sequenced_at: Utc::now(),
        };
        state.minted.insert(proposal.digest.clone(), commit.clone());

        debug!(
            "sequenced proposal {} as commit {}",
            proposal.digest, commit.sequence
        );
        Ok(commit)
    }
}
