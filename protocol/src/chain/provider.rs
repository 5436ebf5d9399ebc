//! The provider seam between the gateway and an actual chain.
//!
//! [`ChainProvider`] is the only interface the gateway knows. Production
//! wires it to a JSON-RPC endpoint; tests and devnet wire it to the
//! in-process `LocalChain` from `novax-contracts`. [`FallbackProvider`]
//! layers endpoint redundancy on top: candidate endpoints are tried in
//! sequence until one responds.

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

use super::call::{ContractCall, ViewCall};
use super::receipt::TransactionReceipt;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors surfaced by a chain provider.
#[derive(Debug, Clone, Error)]
pub enum ChainError {
    /// The contract reverted execution. Deterministic — retrying on another
    /// endpoint will not change the outcome.
    #[error("execution reverted: {0}")]
    Revert(String),

    /// Transport-level failure (endpoint down, malformed response).
    #[error("rpc error: {0}")]
    Rpc(String),

    /// The endpoint did not answer within the configured timeout.
    #[error("rpc timeout after {0}ms")]
    Timeout(u64),

    /// No contract is deployed at the target address.
    #[error("unknown contract: {0}")]
    UnknownContract(String),

    /// The contract has no such method — an ABI mismatch.
    #[error("unknown method {method} on contract {contract}")]
    UnknownMethod {
        /// The target contract address.
        contract: String,
        /// The method that was called.
        method: String,
    },

    /// Method parameters could not be decoded.
    #[error("bad call parameters: {0}")]
    BadParams(String),

    /// Every candidate endpoint failed.
    #[error("all rpc endpoints failed, last error: {0}")]
    AllEndpointsFailed(String),
}

impl ChainError {
    /// Whether trying another endpoint could plausibly succeed.
    ///
    /// Reverts and ABI mismatches are deterministic; only transport
    /// failures are worth retrying elsewhere.
    pub fn is_transient(&self) -> bool {
        matches!(self, ChainError::Rpc(_) | ChainError::Timeout(_))
    }
}

// ---------------------------------------------------------------------------
// Provider trait
// ---------------------------------------------------------------------------

/// Transport abstraction for submitting transactions and reading state.
#[async_trait]
pub trait ChainProvider: Send + Sync {
    /// Submits a signed transaction and waits for its receipt.
    async fn submit(&self, call: ContractCall) -> Result<TransactionReceipt, ChainError>;

    /// Executes a read-only view call and returns the decoded result.
    async fn view(&self, call: ViewCall) -> Result<serde_json::Value, ChainError>;

    /// Returns the chain ID this provider is connected to, hex-encoded.
    async fn chain_id_hex(&self) -> Result<String, ChainError>;
}

// ---------------------------------------------------------------------------
// FallbackProvider
// ---------------------------------------------------------------------------

/// Tries an ordered list of providers until one responds.
///
/// Only transient failures trigger a fallback: a revert from the first
/// endpoint is the final answer, because every honest endpoint would
/// report the same revert.
pub struct FallbackProvider {
    providers: Vec<Arc<dyn ChainProvider>>,
}

impl FallbackProvider {
    /// Wraps the given providers. Order matters: earlier entries are
    /// preferred, later ones are fallbacks.
    ///
    /// # Panics
    ///
    /// Panics if `providers` is empty — a gateway with zero endpoints is a
    /// configuration bug worth failing fast on.
    pub fn new(providers: Vec<Arc<dyn ChainProvider>>) -> Self {
        assert!(
            !providers.is_empty(),
            "FallbackProvider requires at least one endpoint"
        );
        Self { providers }
    }

    async fn try_each<'a, T, F, Fut>(&'a self, mut op: F) -> Result<T, ChainError>
    where
        F: FnMut(&'a dyn ChainProvider) -> Fut,
        Fut: std::future::Future<Output = Result<T, ChainError>>,
    {
        let mut last_err: Option<ChainError> = None;
        for (idx, provider) in self.providers.iter().enumerate() {
            match op(provider.as_ref()).await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() => {
                    tracing::warn!(endpoint = idx, error = %e, "endpoint failed, trying next");
                    last_err = Some(e);
                }
                Err(e) => return Err(e),
            }
        }
        let last = last_err.expect("at least one provider attempted");
        Err(ChainError::AllEndpointsFailed(last.to_string()))
    }
}

#[async_trait]
impl ChainProvider for FallbackProvider {
    async fn submit(&self, call: ContractCall) -> Result<TransactionReceipt, ChainError> {
        self.try_each(|p| {
            let call = call.clone();
            async move { p.submit(call).await }
        })
        .await
    }

    async fn view(&self, call: ViewCall) -> Result<serde_json::Value, ChainError> {
        self.try_each(|p| {
            let call = call.clone();
            async move { p.view(call).await }
        })
        .await
    }

    async fn chain_id_hex(&self) -> Result<String, ChainError> {
        self.try_each(|p| async move { p.chain_id_hex().await }).await
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
