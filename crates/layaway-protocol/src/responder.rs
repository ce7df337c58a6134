use std::sync::Arc;

use layaway_core::{
    CommittedRecord, Operation, PartyIdentity, PartyKey, RecordRef, SequencedCommit,
    SignedProposal, Vault, contract,
};
use tracing::{debug, info, warn};

use crate::config::ProtocolConfig;
use crate::session::{PeerSession, RejectReason, SessionMessage};

#[derive(Debug, Clone, PartialEq)]
pub enum ResponderOutcome {
    Recorded { sequence: u64 },
    Rejected(RejectReason),
    Discarded { reason: String },
}

pub async fn respond_once(
    mut session: PeerSession,
    identity: PartyIdentity,
    vault: Arc<dyn Vault>,
    config: ProtocolConfig,
) -> ResponderOutcome {
    let proposer = session.remote();

    let proposal = match session.receive(config.sign_timeout).await {
        Ok(SessionMessage::Propose(proposal)) => proposal,
        Ok(other) => return discarded(format!("expected a proposal, got {other:?}")),
        Err(err) => return discarded(format!("no proposal arrived: {err}")),
    };

    let unconsumed = match vault.list_unconsumed().await {
        Ok(unconsumed) => unconsumed,
        Err(err) => return discarded(format!("own vault unavailable: {err}")),
    };

    if let Err(reason) = evaluate(&proposal, &identity, &unconsumed, proposer) {
        warn!("rejecting proposal {} from {proposer}: {reason}", proposal.digest);
        let _ = session.send(SessionMessage::Reject(reason.clone())).await;
        return ResponderOutcome::Rejected(reason);
    }

    let signature = identity.sign(proposal.digest.as_bytes());
    if session.send(SessionMessage::Sign(signature)).await.is_err() {
        return discarded("session closed before the signature was delivered".to_string());
    }
    debug!("signed proposal {}, awaiting finality", proposal.digest);

    match session.receive(config.finality_timeout).await {
        Ok(SessionMessage::Finalize(commit)) => {
            if commit.digest() != &proposal.digest {
                return discarded(format!(
                    "finalized commit carries digest {} instead of {}",
                    commit.digest(),
                    proposal.digest
                ));
            }
            if let Err(err) = commit.proposal.verify() {
                return discarded(format!("finalized commit does not verify: {err}"));
            }
            if !finality_matches(&proposal, &commit) {
                warn!(
                    "discarding finality for {}: commit content differs from the signed proposal",
                    proposal.digest
                );
                return ResponderOutcome::Discarded {
                    reason: format!(
                        "finalized commit for {} does not match the signed proposal",
                        proposal.digest
                    ),
                };
            }
            match vault.commit(&commit).await {
                Ok(()) => {
                    info!(
                        "recorded commit {} for proposal {}",
                        commit.sequence, proposal.digest
                    );
                    ResponderOutcome::Recorded {
                        sequence: commit.sequence,
                    }
                }
                Err(err) => discarded(format!("vault refused the finalized commit: {err}")),
            }
        }
        Ok(other) => discarded(format!("expected finality, got {other:?}")),
        Err(err) => discarded(format!(
            "finality never arrived for {}: {err}",
            proposal.digest
        )),
    }
}

pub fn evaluate(
    proposal: &SignedProposal,
    identity: &PartyIdentity,
    unconsumed: &[CommittedRecord],
    proposer: PartyKey,
) -> Result<(), RejectReason> {
    if proposal.verify_digest().is_err() {
        return Err(RejectReason::DigestMismatch);
    }
    if !proposal.proposal.signers.contains(&identity.key()) {
        return Err(RejectReason::NotARequiredSigner);
    }

    let proposer_signed = proposal
        .signature_of(&proposer)
        .map(|signature| signature.verify(proposal.digest.as_bytes()).is_ok())
        .unwrap_or(false);
    if !proposer_signed {
        return Err(RejectReason::ProposerSignatureInvalid);
    }

    let mut resolved = Vec::with_capacity(proposal.proposal.inputs.len());
    for input in &proposal.proposal.inputs {
        let head = unconsumed
            .iter()
            .find(|committed| committed.ref_id == *input)
            .ok_or_else(|| RejectReason::UnknownInput(input.clone()))?;
        resolved.push(head.record.clone());
    }

    contract::verify_proposal(&proposal.proposal, &resolved)?;

    let buyer = match proposal.proposal.operation {
        Operation::Initiate => proposal.proposal.outputs.first().map(|record| record.buyer.key),
        Operation::PayInstallment | Operation::Complete => {
            resolved.first().map(|record| record.buyer.key)
        }
    };
    if buyer != Some(proposer) {
        return Err(RejectReason::ProposerNotBuyer);
    }

    Ok(())
}

fn finality_matches(proposal: &SignedProposal, commit: &SequencedCommit) -> bool {
    let outputs = &proposal.proposal.outputs;
    commit.consumed == proposal.proposal.inputs
        && commit.committed.len() == outputs.len()
        && commit
            .committed
            .iter()
            .zip(outputs)
            .enumerate()
            .all(|(index, (minted, output))| {
                minted.ref_id == RecordRef::output_of(&proposal.digest, index)
                    && minted.record == *output
            })
}

fn discarded(reason: String) -> ResponderOutcome {
    debug!("discarding session: {reason}");
    ResponderOutcome::Discarded { reason }
}
