use std::collections::HashMap;

use async_trait::async_trait;
use layaway_core::{CommittedRecord, LinearId, SequencedCommit, Vault, VaultError};
use tokio::sync::RwLock;
use tracing::debug;

#[derive(Default)]
pub struct InMemoryVault {
    state: RwLock<VaultState>,
}

#[derive(Default)]
struct VaultState {
    heads: HashMap<LinearId, CommittedRecord>,
    history: HashMap<LinearId, Vec<CommittedRecord>>,
}

impl InMemoryVault {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn record_history(&self, linear_id: LinearId) -> Vec<CommittedRecord> {
        let state = self.state.read().await;
        state.history.get(&linear_id).cloned().unwrap_or_default()
    }
}

#[async_trait]
impl Vault for InMemoryVault {
    async fn current_unconsumed(
        &self,
        linear_id: LinearId,
    ) -> Result<Option<CommittedRecord>, VaultError> {
        let state = self.state.read().await;
        Ok(state.heads.get(&linear_id).cloned())
    }

    async fn list_unconsumed(&self) -> Result<Vec<CommittedRecord>, VaultError> {
        let state = self.state.read().await;
        Ok(state.heads.values().cloned().collect())
    }

    async fn commit(&self, commit: &SequencedCommit) -> Result<(), VaultError> {
        let mut state = self.state.write().await;

        let mut consumed_ids = Vec::with_capacity(commit.consumed.len());
        for reference in &commit.consumed {
            let linear_id = state
                .heads
                .iter()
                .find(|(_, head)| head.ref_id == *reference)
                .map(|(linear_id, _)| *linear_id)
                .ok_or_else(|| VaultError::UnknownConsumption {
                    missing: reference.clone(),
                })?;
            consumed_ids.push(linear_id);
        }

        for linear_id in consumed_ids {
            state.heads.remove(&linear_id);
        }
        for committed in &commit.committed {
            let linear_id = committed.record.linear_id;
            state.heads.insert(linear_id, committed.clone());
            state
                .history
                .entry(linear_id)
                .or_default()
                .push(committed.clone());
        }

        debug!(
            "vault applied commit {} ({} consumed, {} committed)",
            commit.sequence,
            commit.consumed.len(),
            commit.committed.len()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use layaway_core::{
        Amount, Currency, Operation, PartyIdentity, Proposal, PurchaseRecord, RecordRef,
        SignedProposal,
    };
    use rust_decimal::Decimal;

    use super::*;

    fn gbp(pence: i64) -> Amount {
        Amount::new(Decimal::new(pence, 2), Currency::GBP)
    }

    fn commit_of(
        operation: Operation,
        consumed: Vec<RecordRef>,
        outputs: Vec<PurchaseRecord>,
        sequence: u64,
    ) -> SequencedCommit {
        let signers = outputs
            .first()
            .map(|record| record.required_signers())
            .unwrap_or_default();
        let proposal = SignedProposal::new(Proposal {
            operation,
            inputs: consumed.clone(),
            outputs: outputs.clone(),
            signers,
        })
        .unwrap();

        let committed = outputs
            .iter()
            .enumerate()
            .map(|(index, record)| CommittedRecord {
                ref_id: RecordRef::output_of(&proposal.digest, index),
                record: record.clone(),
            })
            .collect();

        SequencedCommit {
            proposal,
            consumed,
            committed,
            sequence,
            sequenced_at: chrono::Utc::now(),
        }
    }

    fn opening() -> PurchaseRecord {
        PurchaseRecord::opening(
            PartyIdentity::generate("Buyer").party(),
            PartyIdentity::generate("Seller").party(),
            gbp(1000),
            1,
        )
    }

    #[tokio::test]
    async fn records_an_opening() {
        let vault = InMemoryVault::new();
        let record = opening();
        let commit = commit_of(Operation::Initiate, vec![], vec![record.clone()], 1);

        vault.commit(&commit).await.unwrap();

        let head = vault
            .current_unconsumed(record.linear_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(head.record, record);
        assert_eq!(vault.list_unconsumed().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn an_installment_replaces_the_head() {
        let vault = InMemoryVault::new();
        let record = opening();
        let first = commit_of(Operation::Initiate, vec![], vec![record.clone()], 1);
        vault.commit(&first).await.unwrap();
        let first_ref = first.committed[0].ref_id.clone();

        let paid = record.with_amount_paid(gbp(250));
        let second = commit_of(
            Operation::PayInstallment,
            vec![first_ref.clone()],
            vec![paid.clone()],
            2,
        );
        vault.commit(&second).await.unwrap();

        let head = vault
            .current_unconsumed(record.linear_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(head.record, paid);
        assert_ne!(head.ref_id, first_ref);
        assert_eq!(vault.list_unconsumed().await.unwrap().len(), 1);
        assert_eq!(vault.record_history(record.linear_id).await.len(), 2);
    }

    #[tokio::test]
    async fn completion_retires_the_id_but_keeps_history() {
        let vault = InMemoryVault::new();
        let record = opening().with_amount_paid(gbp(1000));
        let first = commit_of(Operation::Initiate, vec![], vec![record.clone()], 1);
        vault.commit(&first).await.unwrap();

        let last = commit_of(
            Operation::Complete,
            vec![first.committed[0].ref_id.clone()],
            vec![],
            2,
        );
        vault.commit(&last).await.unwrap();

        assert!(
            vault
                .current_unconsumed(record.linear_id)
                .await
                .unwrap()
                .is_none()
        );
        assert!(vault.list_unconsumed().await.unwrap().is_empty());
        assert_eq!(vault.record_history(record.linear_id).await.len(), 1);
    }

    #[tokio::test]
    async fn refuses_commits_consuming_unknown_refs() {
        let vault = InMemoryVault::new();
        let record = opening();
        let unseen = commit_of(Operation::Initiate, vec![], vec![record.clone()], 1);
        let stray_ref = unseen.committed[0].ref_id.clone();

        let paid = record.with_amount_paid(gbp(250));
        let commit = commit_of(
            Operation::PayInstallment,
            vec![stray_ref.clone()],
            vec![paid],
            2,
        );

        let err = vault.commit(&commit).await.unwrap_err();
        assert_eq!(err, VaultError::UnknownConsumption { missing: stray_ref });
        assert!(vault.list_unconsumed().await.unwrap().is_empty());
    }
}
