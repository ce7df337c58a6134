use std::sync::Arc;

use layaway_core::{
    Amount, CommittedRecord, LinearId, Party, PartyIdentity, PartyKey, SequencedCommit, Sequencer,
    Vault,
};
use tokio::task::JoinHandle;
use tracing::debug;

use crate::config::ProtocolConfig;
use crate::coordinator::Coordinator;
use crate::error::FlowError;
use crate::responder::respond_once;
use crate::session::SessionTransport;

pub struct PurchaseNode {
    identity: PartyIdentity,
    vault: Arc<dyn Vault>,
    sequencer: Arc<dyn Sequencer>,
    transport: Arc<dyn SessionTransport>,
    config: ProtocolConfig,
}

impl PurchaseNode {
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
        }
    }

    pub fn party(&self) -> Party {
        self.identity.party()
    }

    pub fn key(&self) -> PartyKey {
        self.identity.key()
    }

    pub async fn purchases(&self) -> Result<Vec<CommittedRecord>, FlowError> {
        Ok(self.vault.list_unconsumed().await?)
    }

    pub async fn purchase(
        &self,
        linear_id: LinearId,
    ) -> Result<Option<CommittedRecord>, FlowError> {
        Ok(self.vault.current_unconsumed(linear_id).await?)
    }

    pub async fn initiate(
        &self,
        seller: Party,
        price: Amount,
        item_id: u64,
    ) -> Result<CommittedRecord, FlowError> {
        self.saga().initiate(seller, price, item_id).await
    }

    pub async fn pay_installment(
        &self,
        linear_id: LinearId,
        installment: Amount,
    ) -> Result<CommittedRecord, FlowError> {
        self.saga().pay_installment(linear_id, installment).await
    }

    pub async fn complete(&self, linear_id: LinearId) -> Result<SequencedCommit, FlowError> {
        self.saga().complete(linear_id).await
    }

    pub fn spawn_responder(&self) -> JoinHandle<()> {
        let identity = self.identity.clone();
        let vault = Arc::clone(&self.vault);
        let transport = Arc::clone(&self.transport);
        let config = self.config.clone();
        tokio::spawn(async move {
            while let Some(session) = transport.accept().await {
                let identity = identity.clone();
                let vault = Arc::clone(&vault);
                let config = config.clone();
                tokio::spawn(async move {
                    let outcome = respond_once(session, identity, vault, config).await;
                    debug!("responder session finished: {outcome:?}");
                });
            }
        })
    }

    fn saga(&self) -> Coordinator {
        Coordinator::new(
            self.identity.clone(),
            Arc::clone(&self.vault),
            Arc::clone(&self.sequencer),
            Arc::clone(&self.transport),
            self.config.clone(),
        )
    }
}
