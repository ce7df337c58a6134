pub mod sequencer;
pub mod vault;

pub use sequencer::InMemorySequencer;
pub use vault::InMemoryVault;
