//! # Contract Gateway
//!
//! Translates domain actions into contract calls and decodes the results.
//! One method per on-chain operation, all the same shape: build parameters,
//! submit the transaction, wait for the receipt, locate one named event log,
//! extract the generated identifier. Read operations are plain view calls,
//! paged in fixed-size batches where the result set is unbounded.
//!
//! The gateway owns no state beyond the last-used provider and signer,
//! both replaceable at any time via [`ContractService::initialize`] — the
//! wallet connects, disconnects, and reconnects as it pleases.
//!
//! [`network_guard`] sits in front of every write from an injected wallet:
//! no signature request ever goes out while the wallet is pointed at the
//! wrong chain.

pub mod error;
pub mod network_guard;
pub mod service;
pub mod types;
pub mod wallet;

pub use error::GatewayError;
pub use network_guard::NetworkGuard;
pub use service::{AddressBook, ContractService};
pub use types::{
    CreatedListing, CreatedPool, CreatedReceivable, ListingView, PoolView, ReceivableView,
    TxOutcome,
};
pub use wallet::{AddChainParams, WalletError, WalletProvider};
