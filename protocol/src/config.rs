//! # Protocol Configuration & Constants
//!
//! Every magic number in Novax lives here. If you're hardcoding a constant
//! somewhere else, you're doing it wrong and you owe the team coffee.
//!
//! The chain IDs and decimals constants mirror the deployed contracts
//! exactly. Changing them without redeploying is somewhere between
//! "difficult" and "career-ending", so don't.

use std::time::Duration;

// ---------------------------------------------------------------------------
// Network Identifiers
// ---------------------------------------------------------------------------

/// The target network's chain ID as reported by a well-behaved wallet.
/// 128123 — Etherlink testnet.
pub const CHAIN_ID: u64 = 128_123;

/// Primary hex representation of [`CHAIN_ID`], as used in
/// `wallet_switchEthereumChain` requests.
pub const CHAIN_ID_HEX: &str = "0x1f47b";

/// Alternate chain ID some wallet builds report for the same network.
///
/// A known client-side quirk: the network can be registered twice under
/// different IDs, and the wallet answers `eth_chainId` with whichever entry
/// it activated. Both IDs are accepted; both are tried when switching.
pub const CHAIN_ID_ALT_HEX: &str = "0xa515";

/// Human-readable network name, used in wallet `add network` prompts and logs.
pub const NETWORK_NAME: &str = "Etherlink Testnet";

/// Native currency symbol for the wallet `add network` prompt.
pub const NATIVE_SYMBOL: &str = "XTZ";

/// Candidate RPC endpoints, tried in order until one responds.
pub const DEFAULT_RPC_ENDPOINTS: &[&str] = &[
    "https://node.ghostnet.etherlink.com",
    "https://128123.rpc.thirdweb.com",
];

/// Block explorer base URL, surfaced in receipts and API responses.
pub const EXPLORER_URL: &str = "https://testnet.explorer.etherlink.com";

// ---------------------------------------------------------------------------
// Token Decimals
// ---------------------------------------------------------------------------

/// MockUSDC decimals. 6, matching native USDC everywhere that matters.
///
/// This is the single most load-bearing constant in the system: every
/// invoice amount, investment, payment, and listing price is a 6-decimal
/// integer. Get this wrong and amounts are off by a factor of 10^12.
pub const USDC_DECIMALS: u8 = 6;

/// Pool share token decimals. 18, ERC-20 standard.
pub const SHARE_DECIMALS: u8 = 18;

/// NVX reward token decimals. 18.
pub const NVX_DECIMALS: u8 = 18;

/// Multiplier for scaling a 6-decimal USDC amount into 18-decimal shares.
/// `10^(18 - 6)`. Exact and reversible for every USDC amount.
pub const USDC_TO_SHARE_SCALE: u128 = 1_000_000_000_000;

/// APR and risk figures are expressed in basis points. 10_000 bps = 100%.
pub const BPS_SCALE: u64 = 10_000;

// ---------------------------------------------------------------------------
// Gateway Parameters
// ---------------------------------------------------------------------------

/// Page size for batched list reads (`get_all_pools` and friends).
/// Keeps a single view call bounded no matter how many pools exist.
pub const READ_BATCH_SIZE: u64 = 50;

/// How long the gateway waits for a transaction receipt before giving up.
pub const TX_WAIT_TIMEOUT: Duration = Duration::from_secs(90);

/// Timeout for a single view call round-trip.
pub const VIEW_TIMEOUT: Duration = Duration::from_secs(15);

// ---------------------------------------------------------------------------
// Node Parameters
// ---------------------------------------------------------------------------

/// Default REST API port for `novax-node`.
pub const DEFAULT_API_PORT: u16 = 8480;

/// Default Prometheus metrics port.
pub const DEFAULT_METRICS_PORT: u16 = 8481;

/// Devnet faucet mint amount in 6-decimal USDC units: 10,000 USDC.
pub const FAUCET_AMOUNT_USDC: u128 = 10_000_000_000;

// ---------------------------------------------------------------------------
// Utility
// ---------------------------------------------------------------------------

/// The two chain ID representations the network guard accepts.
pub fn accepted_chain_ids() -> [&'static str; 2] {
    [CHAIN_ID_HEX, CHAIN_ID_ALT_HEX]
}

/// Returns a friendly name for a hex chain ID, mainly for logging.
/// Unknown chains get echoed back because we're helpful like that.
pub fn network_name(chain_id_hex: &str) -> String {
    let normalized = chain_id_hex.to_ascii_lowercase();
    if normalized == CHAIN_ID_HEX || normalized == CHAIN_ID_ALT_HEX {
        NETWORK_NAME.to_string()
    } else {
        format!("unknown({})", chain_id_hex)
    }
}
