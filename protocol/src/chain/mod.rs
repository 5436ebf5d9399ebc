//! # Chain Interaction Types
//!
//! The vocabulary the gateway uses to talk to a chain: call envelopes,
//! transaction receipts, event logs, and the [`ChainProvider`] trait that
//! abstracts over the actual transport (a JSON-RPC endpoint in production,
//! an in-process chain in tests and devnet).
//!
//! Contract ABIs are externally defined; this crate never encodes calldata
//! itself. A call is a method name plus JSON parameters, and the provider
//! on the other side is responsible for the wire format.

pub mod call;
pub mod provider;
pub mod receipt;

pub use call::{ContractCall, ViewCall};
pub use provider::{ChainError, ChainProvider, FallbackProvider};
pub use receipt::{EventLog, TransactionReceipt};
