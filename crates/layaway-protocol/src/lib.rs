pub mod config;
pub mod coordinator;
pub mod error;
pub mod node;
pub mod responder;
pub mod session;

pub use config::ProtocolConfig;
pub use coordinator::{Coordinator, SagaPhase};
pub use error::FlowError;
pub use node::PurchaseNode;
pub use responder::{ResponderOutcome, respond_once};
pub use session::{
    ChannelEndpoint, ChannelNetwork, PeerSession, RejectReason, SessionError, SessionMessage,
    SessionTransport,
};
