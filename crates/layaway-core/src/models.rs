use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::identity::{Party, PartyKey};
use crate::money::Amount;
use crate::proposal::ProposalDigest;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct LinearId(Uuid);

impl LinearId {
    pub fn fresh() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for LinearId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseRecord {
    pub buyer: Party,
    pub seller: Party,
    pub price: Amount,
    pub amount_paid: Amount,
    pub item_id: u64,
    pub linear_id: LinearId,
}

impl PurchaseRecord {
    pub fn opening(buyer: Party, seller: Party, price: Amount, item_id: u64) -> Self {
        let amount_paid = Amount::zero(price.currency);
        Self {
            buyer,
            seller,
            price,
            amount_paid,
            item_id,
            linear_id: LinearId::fresh(),
        }
    }

    pub fn participants(&self) -> [&Party; 2] {
        [&self.buyer, &self.seller]
    }

    pub fn required_signers(&self) -> BTreeSet<PartyKey> {
        [self.buyer.key, self.seller.key].into_iter().collect()
    }

    pub fn with_amount_paid(&self, amount_paid: Amount) -> PurchaseRecord {
        PurchaseRecord {
            amount_paid,
            ..self.clone()
        }
    }
}

#[derive(
    Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct RecordRef(String);

impl RecordRef {
    pub fn output_of(digest: &ProposalDigest, index: usize) -> Self {
        Self(format!("{digest}:{index}"))
    }
}

impl fmt::Display for RecordRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommittedRecord {
    pub ref_id: RecordRef,
    pub record: PurchaseRecord,
}
