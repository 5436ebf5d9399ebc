//! # Marketplace Contract
//!
//! Secondary trading of pool share tokens. Sellers escrow shares into a
//! listing with a fixed USDC price per whole share, purchase bounds, and
//! a deadline; buyers take partial fills until the listing sells out or
//! expires. Cancelling returns whatever is still escrowed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

use crate::receivable_factory::derive_id;
use crate::tokens::{TokenError, TokenLedger};

/// One whole 18-decimal share token, the unit prices are quoted in.
const ONE_SHARE: u128 = 1_000_000_000_000_000_000;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors from marketplace operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MarketError {
    /// The referenced listing does not exist.
    #[error("listing not found: {0}")]
    NotFound(String),

    /// The listing is cancelled or sold out.
    #[error("listing {0} is no longer active")]
    Inactive(String),

    /// The listing's deadline has passed.
    #[error("listing {0} has expired")]
    Expired(String),

    /// Only the seller can cancel.
    #[error("unauthorized: only the seller can cancel a listing")]
    NotSeller,

    /// Purchase below the listing's minimum.
    #[error("purchase below minimum: {min_purchase} required")]
    BelowMinimum {
        /// The listing's minimum purchase.
        min_purchase: u128,
    },

    /// Purchase above the listing's maximum.
    #[error("purchase above maximum: {max_purchase} allowed")]
    AboveMaximum {
        /// The listing's maximum purchase.
        max_purchase: u128,
    },

    /// Purchase larger than what remains in the listing.
    #[error("purchase exceeds remaining: {remaining} available")]
    ExceedsRemaining {
        /// Shares still escrowed.
        remaining: u128,
    },

    /// The purchase is so small its USDC cost truncates to zero.
    #[error("purchase too small: cost rounds to zero USDC")]
    DustPurchase,

    /// min > max, min > amount, zero price, or zero amount.
    #[error("invalid listing terms: {0}")]
    InvalidTerms(&'static str),

    /// The deadline is not in the future.
    #[error("deadline must be in the future")]
    DeadlinePassed,

    /// Price × amount overflowed.
    #[error("cost overflow")]
    Overflow,

    /// A token ledger operation failed.
    #[error(transparent)]
    Token(#[from] TokenError),
}

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// A share listing with escrowed inventory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Listing {
    /// Hash-derived listing identifier.
    pub listing_id: String,
    /// Seller address.
    pub seller: String,
    /// Pool whose shares are for sale.
    pub pool_id: String,
    /// Shares originally listed, 18-decimal units.
    pub amount: u128,
    /// Shares still escrowed, 18-decimal units.
    pub remaining: u128,
    /// Price per whole share in 6-decimal USDC units.
    pub price_per_token: u128,
    /// Minimum shares per purchase.
    pub min_purchase: u128,
    /// Maximum shares per purchase.
    pub max_purchase: u128,
    /// Listing expiry.
    pub deadline: DateTime<Utc>,
    /// Whether the listing can still be bought from.
    pub active: bool,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

/// Result of a fill: what the execution environment needs to settle
/// holder accounting and emit the purchase event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fill {
    /// The pool whose shares moved.
    pub pool_id: String,
    /// The seller who was paid.
    pub seller: String,
    /// USDC paid by the buyer.
    pub cost: u128,
    /// Whether this fill emptied the listing.
    pub sold_out: bool,
}

/// The marketplace contract.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Marketplace {
    /// The contract's own address: holds escrowed shares.
    address: String,
    /// Listings keyed by id.
    listings: HashMap<String, Listing>,
    /// Listing-id-derivation nonce.
    nonce: u64,
}

impl Marketplace {
    /// Creates an empty marketplace deployed at `address`.
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            listings: HashMap::new(),
            nonce: 0,
        }
    }

    /// The contract's own address.
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Lists shares for sale, escrowing them via allowance pull.
    pub fn create_listing(
        &mut self,
        seller: &str,
        pool_id: &str,
        amount: u128,
        price_per_token: u128,
        min_purchase: u128,
        max_purchase: u128,
        deadline: DateTime<Utc>,
        shares: &mut TokenLedger,
    ) -> Result<String, MarketError> {
        if amount == 0 {
            return Err(MarketError::InvalidTerms("amount must be positive"));
        }
        if price_per_token == 0 {
            return Err(MarketError::InvalidTerms("price must be positive"));
        }
        if min_purchase > max_purchase {
            return Err(MarketError::InvalidTerms("min exceeds max"));
        }
        if min_purchase > amount {
            return Err(MarketError::InvalidTerms("min exceeds listed amount"));
        }
        if deadline <= Utc::now() {
            return Err(MarketError::DeadlinePassed);
        }

        let address = self.address.clone();
        shares.transfer_from(&address, seller, &address, amount)?;

        let listing_id = derive_id(b"listing", &[seller, pool_id], self.nonce);
        self.nonce += 1;

        let listing = Listing {
            listing_id: listing_id.clone(),
            seller: seller.to_string(),
            pool_id: pool_id.to_string(),
            amount,
            remaining: amount,
            price_per_token,
            min_purchase,
            max_purchase,
            deadline,
            active: true,
            created_at: Utc::now(),
        };
        self.listings.insert(listing_id.clone(), listing);

        Ok(listing_id)
    }

    /// Buys `amount` shares from a listing. Moves USDC buyer → seller at
    /// the listed price and releases escrowed shares to the buyer.
    ///
    /// The minimum-purchase bound is waived when the buy takes the entire
    /// remainder, so a listing can always be emptied.
    pub fn buy(
        &mut self,
        buyer: &str,
        listing_id: &str,
        amount: u128,
        now: DateTime<Utc>,
        usdc: &mut TokenLedger,
        shares: &mut TokenLedger,
    ) -> Result<Fill, MarketError> {
        let address = self.address.clone();
        let listing = self
            .listings
            .get_mut(listing_id)
            .ok_or_else(|| MarketError::NotFound(listing_id.to_string()))?;

        if !listing.active {
            return Err(MarketError::Inactive(listing_id.to_string()));
        }
        if now > listing.deadline {
            return Err(MarketError::Expired(listing_id.to_string()));
        }
        if amount > listing.remaining {
            return Err(MarketError::ExceedsRemaining {
                remaining: listing.remaining,
            });
        }
        if amount < listing.min_purchase && amount != listing.remaining {
            return Err(MarketError::BelowMinimum {
                min_purchase: listing.min_purchase,
            });
        }
        if amount > listing.max_purchase {
            return Err(MarketError::AboveMaximum {
                max_purchase: listing.max_purchase,
            });
        }

        let cost = amount
            .checked_mul(listing.price_per_token)
            .ok_or(MarketError::Overflow)?
            / ONE_SHARE;
        if cost == 0 {
            return Err(MarketError::DustPurchase);
        }

        usdc.transfer_from(&address, buyer, &listing.seller, cost)?;
        shares.transfer(&address, buyer, amount)?;

        listing.remaining -= amount;
        let sold_out = listing.remaining == 0;
        if sold_out {
            listing.active = false;
        }

        Ok(Fill {
            pool_id: listing.pool_id.clone(),
            seller: listing.seller.clone(),
            cost,
            sold_out,
        })
    }

    /// Cancels a listing and returns the escrowed remainder to the
    /// seller. Seller only; idempotence is not offered — cancelling an
    /// inactive listing is an error.
    pub fn cancel(
        &mut self,
        caller: &str,
        listing_id: &str,
        shares: &mut TokenLedger,
    ) -> Result<(), MarketError> {
        let address = self.address.clone();
        let listing = self
            .listings
            .get_mut(listing_id)
            .ok_or_else(|| MarketError::NotFound(listing_id.to_string()))?;

        if caller != listing.seller {
            return Err(MarketError::NotSeller);
        }
        if !listing.active {
            return Err(MarketError::Inactive(listing_id.to_string()));
        }

        listing.active = false;
        if listing.remaining > 0 {
            shares.transfer(&address, caller, listing.remaining)?;
        }
        Ok(())
    }

    /// Returns a listing by id.
    pub fn get_listing(&self, listing_id: &str) -> Option<&Listing> {
        self.listings.get(listing_id)
    }
}
