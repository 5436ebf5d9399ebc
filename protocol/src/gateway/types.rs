//! Typed views of on-chain records and write-operation results.
//!
//! These mirror what the deployed contracts return from view calls and
//! event logs. Raw amounts are string-encoded u128 on the wire (see
//! [`crate::amount::serde_raw`]); timestamps are RFC 3339.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::amount::serde_raw;

// ---------------------------------------------------------------------------
// Write results
// ---------------------------------------------------------------------------

/// Result of `create_receivable`: the hash-derived identifier from the
/// `ReceivableCreated` event plus the transaction hash.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatedReceivable {
    /// Hash-derived receivable identifier.
    pub receivable_id: String,
    /// Transaction hash of the creation.
    pub tx_hash: String,
}

/// Result of `create_pool`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatedPool {
    /// Hash-derived pool identifier.
    pub pool_id: String,
    /// Transaction hash of the creation.
    pub tx_hash: String,
}

/// Result of `create_listing`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatedListing {
    /// Marketplace listing identifier.
    pub listing_id: String,
    /// Transaction hash of the creation.
    pub tx_hash: String,
}

/// Result of a write operation that returns no generated identifier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TxOutcome {
    /// Transaction hash.
    pub tx_hash: String,
    /// Block height where the transaction was included.
    pub block_height: u64,
}

// ---------------------------------------------------------------------------
// Views
// ---------------------------------------------------------------------------

/// A receivable as returned by the receivable factory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReceivableView {
    /// Hash-derived identifier.
    pub id: String,
    /// Exporter (creator) address.
    pub exporter: String,
    /// Importer (obligor) address.
    pub importer: String,
    /// Invoice amount in 6-decimal USDC units.
    #[serde(with = "serde_raw")]
    pub amount_usd: u128,
    /// Invoice due date.
    pub due_date: DateTime<Utc>,
    /// Lifecycle status: `Pending`, `Verified`, `Rejected`, or `Paid`.
    pub status: String,
    /// AMC-assigned risk score (0–100), present once verified.
    pub risk_score: Option<u32>,
    /// AMC-assigned APR in basis points, present once verified.
    pub apr_bps: Option<u64>,
    /// IPFS CID of the supporting documents.
    pub metadata_cid: String,
}

/// A pool as returned by the pool manager.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolView {
    /// Hash-derived pool identifier.
    pub pool_id: String,
    /// The verified receivable backing this pool.
    pub receivable_id: String,
    /// Funding target in 6-decimal USDC units.
    #[serde(with = "serde_raw")]
    pub target_amount: u128,
    /// Total invested so far, 6-decimal USDC.
    #[serde(with = "serde_raw")]
    pub total_invested: u128,
    /// Total repayments recorded so far, 6-decimal USDC.
    #[serde(with = "serde_raw")]
    pub total_paid: u128,
    /// Pool APR in basis points.
    pub apr_bps: u64,
    /// Maturity date of the pool.
    pub maturity_date: DateTime<Utc>,
    /// Lifecycle status: `Active`, `Funded`, `Matured`, `Paid`,
    /// `Defaulted`, or `Closed`.
    pub status: String,
    /// Repayment progress: `Pending`, `Partial`, or `Full`.
    pub payment_status: String,
}

/// A marketplace listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListingView {
    /// Listing identifier.
    pub listing_id: String,
    /// Seller address.
    pub seller: String,
    /// Pool whose shares are for sale.
    pub pool_id: String,
    /// Shares originally listed, 18-decimal units.
    #[serde(with = "serde_raw")]
    pub amount: u128,
    /// Shares still available, 18-decimal units.
    #[serde(with = "serde_raw")]
    pub remaining: u128,
    /// Price per whole share token in 6-decimal USDC units.
    #[serde(with = "serde_raw")]
    pub price_per_token: u128,
    /// Minimum shares per purchase, 18-decimal units.
    #[serde(with = "serde_raw")]
    pub min_purchase: u128,
    /// Maximum shares per purchase, 18-decimal units.
    #[serde(with = "serde_raw")]
    pub max_purchase: u128,
    /// Listing expiry.
    pub deadline: DateTime<Utc>,
    /// Whether the listing can still be bought from.
    pub active: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_view_roundtrips_large_amounts() {
        let view = PoolView {
            pool_id: "0xpool".into(),
            receivable_id: "0xrecv".into(),
            target_amount: 500_000_000_000,
            total_invested: 120_000_000_000,
            total_paid: 0,
            apr_bps: 850,
            maturity_date: Utc::now(),
            status: "Active".into(),
            payment_status: "Pending".into(),
        };
        let json = serde_json::to_value(&view).expect("serialize");
        // Amounts travel as strings, not numbers.
        assert_eq!(json["target_amount"], "500000000000");
        let back: PoolView = serde_json::from_value(json).expect("deserialize");
        assert_eq!(back.target_amount, view.target_amount);
    }
}
