//! The injected-wallet seam.
//!
//! Browser-extension and embedded wallets expose the same three JSON-RPC
//! methods the network guard cares about: `eth_chainId`,
//! `wallet_switchEthereumChain`, and `wallet_addEthereumChain`. This trait
//! models exactly that surface and nothing more — key management, signing
//! prompts, and account selection stay on the wallet's side of the fence.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors surfaced by a wallet provider.
#[derive(Debug, Clone, Error)]
pub enum WalletError {
    /// The user dismissed the wallet prompt.
    #[error("user rejected the wallet request")]
    UserRejected,

    /// The wallet does not know the requested chain. Standard error code
    /// 4902 from `wallet_switchEthereumChain` — the cue to try
    /// `wallet_addEthereumChain` instead.
    #[error("unrecognized chain: {0}")]
    UnrecognizedChain(String),

    /// Any other wallet RPC failure.
    #[error("wallet rpc error: {0}")]
    Rpc(String),
}

// ---------------------------------------------------------------------------
// AddChainParams
// ---------------------------------------------------------------------------

/// Parameters for a `wallet_addEthereumChain` request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddChainParams {
    /// Hex-encoded chain ID.
    pub chain_id_hex: String,
    /// Human-readable network name shown in the wallet prompt.
    pub chain_name: String,
    /// RPC endpoints for the network.
    pub rpc_urls: Vec<String>,
    /// Native currency ticker.
    pub native_symbol: String,
    /// Block explorer URL.
    pub explorer_url: String,
}

impl AddChainParams {
    /// The canonical add-network request for the target network, built
    /// from protocol constants.
    pub fn target_network() -> Self {
        Self {
            chain_id_hex: config::CHAIN_ID_HEX.to_string(),
            chain_name: config::NETWORK_NAME.to_string(),
            rpc_urls: config::DEFAULT_RPC_ENDPOINTS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            native_symbol: config::NATIVE_SYMBOL.to_string(),
            explorer_url: config::EXPLORER_URL.to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// WalletProvider trait
// ---------------------------------------------------------------------------

/// The injected-wallet interface the network guard drives.
#[async_trait]
pub trait WalletProvider: Send + Sync {
    /// Returns the chain ID the wallet is currently connected to,
    /// hex-encoded (`eth_chainId`).
    async fn chain_id_hex(&self) -> Result<String, WalletError>;

    /// Asks the wallet to switch to the given chain
    /// (`wallet_switchEthereumChain`). Triggers a wallet UI prompt.
    async fn switch_chain(&self, chain_id_hex: &str) -> Result<(), WalletError>;

    /// Asks the wallet to add and activate a network
    /// (`wallet_addEthereumChain`). Triggers a wallet UI prompt.
    async fn add_chain(&self, params: &AddChainParams) -> Result<(), WalletError>;

    /// Whether this is an embedded (non-browser-extension) wallet.
    ///
    /// Embedded wallets are provisioned with the correct network at login
    /// and expose no switching UI, so the guard skips them entirely.
    fn is_embedded(&self) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn target_network_params_come_from_config() {
        let params = AddChainParams::target_network();
        assert_eq!(params.chain_id_hex, config::CHAIN_ID_HEX);
        assert_eq!(params.chain_name, config::NETWORK_NAME);
        assert!(!params.rpc_urls.is_empty());
    }
}
