//! Error types for the contract gateway.
//!
//! The taxonomy is deliberately shallow and caller-directed: connectivity
//! errors are fatal to the attempted operation, contract reverts carry the
//! revert reason through untouched, and a missing expected event is an
//! integration bug — the deployed contract and this client disagree about
//! the ABI — never a business failure.

use thiserror::Error;

use crate::amount::AmountError;
use crate::chain::ChainError;

/// Errors that can occur during gateway operations.
#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    /// No provider has been set. Call `initialize` first.
    #[error("provider not initialized")]
    ProviderNotInitialized,

    /// A provider is connected but no signer is — the wallet has not been
    /// connected, so write operations cannot be signed.
    #[error("signer not initialized")]
    SignerNotInitialized,

    /// The expected event was absent from the transaction receipt.
    ///
    /// This signals an ABI/contract mismatch, not a business failure:
    /// the transaction succeeded, but the deployed contract did not emit
    /// what this client was built against.
    #[error("expected event '{event}' not found in receipt — ABI/contract mismatch")]
    EventNotFound {
        /// The event name that was expected.
        event: String,
    },

    /// A field was missing or malformed inside a decoded event.
    #[error("malformed event '{event}': missing field '{field}'")]
    MalformedEvent {
        /// The event that was decoded.
        event: String,
        /// The field that could not be extracted.
        field: String,
    },

    /// The chain rejected or failed the call.
    #[error(transparent)]
    Chain(#[from] ChainError),

    /// A view call returned a payload that does not match the expected shape.
    #[error("unexpected view response from {method}: {reason}")]
    BadViewResponse {
        /// The view method that was called.
        method: String,
        /// What was wrong with the payload.
        reason: String,
    },

    /// Amount parsing or arithmetic failed.
    #[error(transparent)]
    Amount(#[from] AmountError),

    /// The wallet is connected to the wrong network and could not be
    /// switched. The message is user-facing guidance.
    #[error("{0}")]
    NetworkMismatch(String),
}
