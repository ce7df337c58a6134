pub mod contract;
pub mod identity;
pub mod models;
pub mod money;
pub mod proposal;
pub mod storage;

pub use contract::ContractViolation;
pub use identity::{IdentityError, Party, PartyIdentity, PartyKey, PartySignature};
pub use models::{CommittedRecord, LinearId, PurchaseRecord, RecordRef};
pub use money::{Amount, Currency, MoneyError};
pub use proposal::{Operation, Proposal, ProposalDigest, ProposalError, SignedProposal};
pub use storage::{SequencedCommit, Sequencer, SequencerError, Vault, VaultError};
