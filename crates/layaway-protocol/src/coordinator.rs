use std::sync::Arc;

use layaway_core::{
    Amount, CommittedRecord, ContractViolation, LinearId, Operation, Party, PartyIdentity,
    PartyKey, Proposal, PurchaseRecord, SequencedCommit, Sequencer, SignedProposal, Vault,
    contract,
};
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::config::ProtocolConfig;
use crate::error::FlowError;
use crate::session::{PeerSession, SessionError, SessionMessage, SessionTransport};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SagaPhase {
    Building,
    SelfValidated,
    AwaitingPeerSignature,
    AwaitingSequencer,
    Finalized,
    Aborted,
}

pub struct Coordinator {
    identity: PartyIdentity,
    vault: Arc<dyn Vault>,
    sequencer: Arc<dyn Sequencer>,
    transport: Arc<dyn SessionTransport>,
    config: ProtocolConfig,
    phase: SagaPhase,
}

impl Coordinator {
    pub fn new(
        identity: PartyIdentity,
        vault: Arc<dyn Vault>,
        sequencer: Arc<dyn Sequencer>,
        transport: Arc<dyn SessionTransport>,
        config: ProtocolConfig,
    ) -> Self {
        Self {
            identity,
            vault,
            sequencer,
            transport,
            config,
            phase: SagaPhase::Building,
        }
    }

    pub fn phase(&self) -> SagaPhase {
        self.phase
    }

    pub async fn initiate(
        &mut self,
        seller: Party,
        price: Amount,
        item_id: u64,
    ) -> Result<CommittedRecord, FlowError> {
        let record = PurchaseRecord::opening(self.identity.party(), seller, price, item_id);
        info!(
            "initiating purchase {} of item {item_id} at {price} with {}",
            record.linear_id, record.seller
        );

        let signers = record.required_signers();
        let proposal = Proposal {
            operation: Operation::Initiate,
            inputs: vec![],
            outputs: vec![record],
            signers,
        };

        let commit = self.drive(proposal, &[]).await?;
        single_output(commit)
    }

    pub async fn pay_installment(
        &mut self,
        linear_id: LinearId,
        installment: Amount,
    ) -> Result<CommittedRecord, FlowError> {
        let head = self.resolve(linear_id).await?;
        self.ensure_buyer(&head.record, "pay installments on")?;

        if installment.currency != head.record.price.currency {
            return Err(FlowError::Validation(ContractViolation::CurrencyMismatch {
                expected: head.record.price.currency,
                found: installment.currency,
            }));
        }
        let amount_paid = head
            .record
            .amount_paid
            .checked_add(installment)
            .map_err(|err| FlowError::Malformed(err.to_string()))?;
        info!(
            "paying {installment} towards purchase {linear_id} ({amount_paid} of {})",
            head.record.price
        );

        let signers = head.record.required_signers();
        let proposal = Proposal {
            operation: Operation::PayInstallment,
            inputs: vec![head.ref_id],
            outputs: vec![head.record.with_amount_paid(amount_paid)],
            signers,
        };

        let commit = self.drive(proposal, &[head.record]).await?;
        single_output(commit)
    }

    pub async fn complete(&mut self, linear_id: LinearId) -> Result<SequencedCommit, FlowError> {
        let head = self.resolve(linear_id).await?;
        self.ensure_buyer(&head.record, "complete")?;
        info!("completing purchase {linear_id}");

        let signers = head.record.required_signers();
        let proposal = Proposal {
            operation: Operation::Complete,
            inputs: vec![head.ref_id],
            outputs: vec![],
            signers,
        };

        self.drive(proposal, &[head.record]).await
    }

    async fn resolve(&self, linear_id: LinearId) -> Result<CommittedRecord, FlowError> {
        self.vault
            .current_unconsumed(linear_id)
            .await?
            .ok_or(FlowError::NotFound(linear_id))
    }

    fn ensure_buyer(&self, record: &PurchaseRecord, action: &'static str) -> Result<(), FlowError> {
        if record.buyer.key != self.identity.key() {
            return Err(FlowError::Unauthorized { action });
        }
        Ok(())
    }

    async fn drive(
        &mut self,
        proposal: Proposal,
        resolved_inputs: &[PurchaseRecord],
    ) -> Result<SequencedCommit, FlowError> {
        let operation = proposal.operation;
        match self.run(proposal, resolved_inputs).await {
            Ok(commit) => {
                self.phase = SagaPhase::Finalized;
                info!("{} finalized as commit {}", operation.describe(), commit.sequence);
                Ok(commit)
            }
            Err(err) => {
                self.phase = SagaPhase::Aborted;
                warn!("{} aborted: {err}", operation.describe());
                Err(err)
            }
        }
    }

    async fn run(
        &mut self,
        proposal: Proposal,
        resolved_inputs: &[PurchaseRecord],
    ) -> Result<SequencedCommit, FlowError> {
        contract::verify_proposal(&proposal, resolved_inputs)?;
        self.phase = SagaPhase::SelfValidated;

        let mut signed =
            SignedProposal::new(proposal).map_err(|err| FlowError::Malformed(err.to_string()))?;
        signed.attach(self.identity.sign(signed.digest.as_bytes()));

        let counterparties: Vec<PartyKey> = signed
            .proposal
            .signers
            .iter()
            .filter(|key| **key != self.identity.key())
            .copied()
            .collect();

        self.phase = SagaPhase::AwaitingPeerSignature;
        let mut sessions = Vec::with_capacity(counterparties.len());
        for peer in counterparties {
            let session = self.collect_signature(&mut signed, peer).await?;
            sessions.push(session);
        }
        signed
            .verify()
            .map_err(|err| FlowError::Malformed(err.to_string()))?;

        self.phase = SagaPhase::AwaitingSequencer;
        let commit = match timeout(
            self.config.sequencer_timeout,
            self.sequencer.submit(&signed),
        )
        .await
        {
            Ok(Ok(commit)) => commit,
            Ok(Err(err)) => return Err(FlowError::from_sequencer(err)),
            Err(_) => {
                return Err(FlowError::SequencerTimeout {
                    waited: self.config.sequencer_timeout,
                });
            }
        };

        self.vault.commit(&commit).await?;

        for session in &sessions {
            if let Err(err) = session.send(SessionMessage::Finalize(commit.clone())).await {
                warn!(
                    "could not distribute finality to {}: {err}",
                    session.remote()
                );
            }
        }

        Ok(commit)
    }

    async fn collect_signature(
        &self,
        signed: &mut SignedProposal,
        peer: PartyKey,
    ) -> Result<PeerSession, FlowError> {
        let mut session = self.transport.connect(peer).await?;
        session
            .send(SessionMessage::Propose(signed.clone()))
            .await?;

        match session.receive(self.config.sign_timeout).await {
            Ok(SessionMessage::Sign(signature)) => {
                if signature.signer != peer
                    || signature.verify(signed.digest.as_bytes()).is_err()
                {
                    return Err(FlowError::Malformed(format!(
                        "counter-signature from {peer} does not verify"
                    )));
                }
                debug!("collected signature from {peer}");
                signed.attach(signature);
                Ok(session)
            }
            Ok(SessionMessage::Reject(reason)) => Err(FlowError::Rejected { by: peer, reason }),
            Ok(other) => Err(FlowError::Malformed(format!(
                "unexpected reply while collecting signatures: {other:?}"
            ))),
            Err(SessionError::Timeout { waited }) => {
                Err(FlowError::SignatureTimeout { party: peer, waited })
            }
            Err(err) => Err(err.into()),
        }
    }
}

fn single_output(commit: SequencedCommit) -> Result<CommittedRecord, FlowError> {
    commit
        .single_output()
        .cloned()
        .ok_or_else(|| FlowError::Malformed("commit carried no output record".to_string()))
}
