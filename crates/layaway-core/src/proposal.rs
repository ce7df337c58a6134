use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::identity::{IdentityError, PartyKey, PartySignature};
use crate::models::{PurchaseRecord, RecordRef};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProposalError {
    #[error("proposal could not be canonically serialized: {0}")]
    Canonicalization(String),
    #[error("digest header {header} does not match content digest {content}")]
    DigestMismatch {
        header: ProposalDigest,
        content: ProposalDigest,
    },
    #[error("missing {} required signature(s)", .missing.len())]
    MissingSignatures { missing: BTreeSet<PartyKey> },
    #[error("signature from {signer} which is not a required signer")]
    UnexpectedSigner { signer: PartyKey },
    #[error(transparent)]
    Signature(#[from] IdentityError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operation {
    Initiate,
    PayInstallment,
    Complete,
}

impl Operation {
    pub fn describe(&self) -> &'static str {
        match self {
            Operation::Initiate => "initiating a purchase",
            Operation::PayInstallment => "paying an installment",
            Operation::Complete => "completing a purchase",
        }
    }
}

#[derive(
    Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct ProposalDigest(String);

impl ProposalDigest {
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl fmt::Display for ProposalDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proposal {
    pub operation: Operation,
    pub inputs: Vec<RecordRef>,
    pub outputs: Vec<PurchaseRecord>,
    pub signers: BTreeSet<PartyKey>,
}

impl Proposal {
    pub fn digest(&self) -> Result<ProposalDigest, ProposalError> {
        let bytes = serde_json::to_vec(self)
            .map_err(|err| ProposalError::Canonicalization(err.to_string()))?;
        Ok(ProposalDigest(sha256::digest(bytes.as_slice())))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedProposal {
    pub proposal: Proposal,
    pub digest: ProposalDigest,
    pub signatures: Vec<PartySignature>,
}

impl SignedProposal {
    pub fn new(proposal: Proposal) -> Result<Self, ProposalError> {
        let digest = proposal.digest()?;
        Ok(Self {
            proposal,
            digest,
            signatures: Vec::new(),
        })
    }

    pub fn attach(&mut self, signature: PartySignature) {
        if !self.signed_by(&signature.signer) {
            self.signatures.push(signature);
        }
    }

    pub fn signed_by(&self, key: &PartyKey) -> bool {
        self.signatures.iter().any(|sig| sig.signer == *key)
    }

    pub fn signature_of(&self, key: &PartyKey) -> Option<&PartySignature> {
        self.signatures.iter().find(|sig| sig.signer == *key)
    }

    pub fn missing_signers(&self) -> BTreeSet<PartyKey> {
        self.proposal
            .signers
            .iter()
            .filter(|key| !self.signed_by(key))
            .copied()
            .collect()
    }

    pub fn is_fully_signed(&self) -> bool {
        self.missing_signers().is_empty()
    }

    pub fn verify_digest(&self) -> Result<(), ProposalError> {
        let content = self.proposal.digest()?;
        if content != self.digest {
            return Err(ProposalError::DigestMismatch {
                header: self.digest.clone(),
                content,
            });
        }
        Ok(())
    }

    pub fn verify(&self) -> Result<(), ProposalError> {
        self.verify_digest()?;

        for signature in &self.signatures {
            if !self.proposal.signers.contains(&signature.signer) {
                return Err(ProposalError::UnexpectedSigner {
                    signer: signature.signer,
                });
            }
            signature.verify(self.digest.as_bytes())?;
        }

        let missing = self.missing_signers();
        if !missing.is_empty() {
            return Err(ProposalError::MissingSignatures { missing });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::*;
    use crate::identity::PartyIdentity;
    use crate::models::PurchaseRecord;
    use crate::money::{Amount, Currency};

    fn opening_proposal(
        buyer: &PartyIdentity,
        seller: &PartyIdentity,
    ) -> Proposal {
        let record = PurchaseRecord::opening(
            buyer.party(),
            seller.party(),
            Amount::new(Decimal::new(1000, 2), Currency::GBP),
            1,
        );
        let signers = record.required_signers();
        Proposal {
            operation: Operation::Initiate,
            inputs: Vec::new(),
            outputs: vec![record],
            signers,
        }
    }

    #[test]
    fn equal_proposals_share_a_digest() {
        let buyer = PartyIdentity::generate("Buyer");
        let seller = PartyIdentity::generate("Seller");
        let proposal = opening_proposal(&buyer, &seller);

        assert_eq!(
            proposal.digest().unwrap(),
            proposal.clone().digest().unwrap()
        );
    }

    #[test]
    fn any_content_change_moves_the_digest() {
        let buyer = PartyIdentity::generate("Buyer");
        let seller = PartyIdentity::generate("Seller");
        let proposal = opening_proposal(&buyer, &seller);

        let mut altered = proposal.clone();
        altered.outputs[0].item_id = 2;
        assert_ne!(proposal.digest().unwrap(), altered.digest().unwrap());
    }

    #[test]
    fn tampering_after_signing_is_detected() {
        let buyer = PartyIdentity::generate("Buyer");
        let seller = PartyIdentity::generate("Seller");
        let mut signed = SignedProposal::new(opening_proposal(&buyer, &seller)).unwrap();
        signed.attach(buyer.sign(signed.digest.as_bytes()));
        signed.attach(seller.sign(signed.digest.as_bytes()));
        assert!(signed.verify().is_ok());

        signed.proposal.outputs[0].item_id = 99;
        assert!(matches!(
            signed.verify(),
            Err(ProposalError::DigestMismatch { .. })
        ));
    }

    #[test]
    fn half_signed_proposals_do_not_verify() {
        let buyer = PartyIdentity::generate("Buyer");
        let seller = PartyIdentity::generate("Seller");
        let mut signed = SignedProposal::new(opening_proposal(&buyer, &seller)).unwrap();
        signed.attach(buyer.sign(signed.digest.as_bytes()));

        assert!(!signed.is_fully_signed());
        assert_eq!(signed.missing_signers().len(), 1);
        assert!(matches!(
            signed.verify(),
            Err(ProposalError::MissingSignatures { .. })
        ));
    }

    #[test]
    fn outsider_signatures_are_refused() {
        let buyer = PartyIdentity::generate("Buyer");
        let seller = PartyIdentity::generate("Seller");
        let outsider = PartyIdentity::generate("Outsider");
        let mut signed = SignedProposal::new(opening_proposal(&buyer, &seller)).unwrap();
        signed.attach(buyer.sign(signed.digest.as_bytes()));
        signed.attach(seller.sign(signed.digest.as_bytes()));
        signed.attach(outsider.sign(signed.digest.as_bytes()));

        assert!(matches!(
            signed.verify(),
            Err(ProposalError::UnexpectedSigner { .. })
        ));
    }
}
