//! # Pool Manager Contract
//!
//! Verified receivables become fixed-target investment pools. Investors
//! fund a pool in USDC and receive 18-decimal pool share tokens at the
//! exact 6 → 18 decimal scale; the AMC records importer repayments back
//! into the pool and, once payments cover the funding target, distributes
//! principal plus APR-proportional yield to shareholders.
//!
//! ## Lifecycle
//!
//! ```text
//! ACTIVE ──invest to target──► FUNDED ──maturity──► MATURED
//!    │                            │                    │
//!    │                     payments reach target       │
//!    │                            ▼                    │
//!    └──────────────────────►   PAID ──distribute──► CLOSED
//!                                 ▲
//!          DEFAULTED ◄── AMC, past maturity, payments short
//! ```
//!
//! Payment status is a separate axis: PENDING → PARTIAL → FULL, where
//! FULL holds if and only if recorded payments sum to at least the
//! funding target.
//!
//! Shares are tradeable on the marketplace, so distribution pays the
//! holders of record at distribution time, not the original investors.
//! The per-pool holder map is kept in sync by the execution environment
//! on every secondary-market settlement.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

use novax_protocol::amount::{shares_to_usdc, usdc_to_shares};
use novax_protocol::config::BPS_SCALE;

use crate::receivable_factory::{Receivable, ReceivableStatus};
use crate::tokens::{TokenError, TokenLedger};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors from pool manager operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PoolError {
    /// The referenced pool does not exist.
    #[error("pool not found: {0}")]
    NotFound(String),

    /// The caller is not the AMC.
    #[error("unauthorized: AMC only")]
    Unauthorized,

    /// The backing receivable is not in the VERIFIED state.
    #[error("receivable {id} is {status}, not verified")]
    ReceivableNotVerified {
        /// The receivable in question.
        id: String,
        /// Its current status.
        status: ReceivableStatus,
    },

    /// The receivable already backs another pool.
    #[error("receivable {0} already backs a pool")]
    ReceivableAlreadyPooled(String),

    /// The pool is not accepting this operation in its current state.
    #[error("pool {id} is {status}: {operation} not allowed")]
    WrongStatus {
        /// The pool in question.
        id: String,
        /// Its current status.
        status: PoolStatus,
        /// The operation that was attempted.
        operation: &'static str,
    },

    /// An investment would push the pool past its funding target.
    #[error("investment exceeds target: {remaining} remaining")]
    ExceedsTarget {
        /// USDC still needed to reach the target.
        remaining: u128,
    },

    /// Withdrawal larger than the caller's recorded contribution.
    #[error("withdrawal exceeds contribution: contributed {contributed}, requested {requested}")]
    ExceedsContribution {
        /// The caller's current contribution.
        contributed: u128,
        /// The requested withdrawal.
        requested: u128,
    },

    /// Distribution attempted before payments reached the target.
    #[error("payments incomplete: {paid} of {target} recorded")]
    PaymentsIncomplete {
        /// Total recorded so far.
        paid: u128,
        /// The funding target.
        target: u128,
    },

    /// The pool does not hold enough USDC to cover all payouts.
    #[error("pool holds {held} USDC, distribution requires {required}")]
    InsufficientFunds {
        /// USDC currently held by the pool.
        held: u128,
        /// Total payout required.
        required: u128,
    },

    /// A holder's spendable share balance cannot cover the distribution
    /// burn; the missing shares sit escrowed in an open listing.
    #[error(
        "holder {holder} has {available} of {needed} shares spendable; \
         open listings must be cancelled before distribution"
    )]
    SharesEscrowed {
        /// The holder whose shares are locked up.
        holder: String,
        /// Shares on the holder's ledger balance.
        available: u128,
        /// Shares the distribution must burn.
        needed: u128,
    },

    /// Default declared before maturity or after full repayment.
    #[error("pool {0} cannot default: not past maturity with payments short")]
    NotDefaultable(String),

    /// A share movement larger than the holder's recorded balance.
    #[error("share transfer exceeds holding: holds {held}, moving {amount}")]
    ExceedsHolding {
        /// Shares the holder has in this pool.
        held: u128,
        /// Shares the transfer tried to move.
        amount: u128,
    },

    /// The maturity date is not in the future.
    #[error("maturity date must be in the future")]
    MaturityPassed,

    /// Zero target or zero amount.
    #[error("amount must be positive")]
    ZeroAmount,

    /// Arithmetic overflow in pool accounting.
    #[error("pool accounting overflow")]
    Overflow,

    /// A token ledger operation failed.
    #[error(transparent)]
    Token(#[from] TokenError),
}

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Pool lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PoolStatus {
    /// Accepting investments.
    Active,
    /// Funding target reached; investments closed.
    Funded,
    /// Past maturity without full repayment, not yet defaulted.
    Matured,
    /// Recorded payments cover the target.
    Paid,
    /// Declared defaulted by the AMC.
    Defaulted,
    /// Yield distributed, shares burned. Terminal.
    Closed,
}

impl std::fmt::Display for PoolStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PoolStatus::Active => write!(f, "Active"),
            PoolStatus::Funded => write!(f, "Funded"),
            PoolStatus::Matured => write!(f, "Matured"),
            PoolStatus::Paid => write!(f, "Paid"),
            PoolStatus::Defaulted => write!(f, "Defaulted"),
            PoolStatus::Closed => write!(f, "Closed"),
        }
    }
}

/// Repayment progress, orthogonal to lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentStatus {
    /// No payments recorded.
    Pending,
    /// Some payments recorded, below the target.
    Partial,
    /// Recorded payments sum to at least the funding target.
    Full,
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PaymentStatus::Pending => write!(f, "Pending"),
            PaymentStatus::Partial => write!(f, "Partial"),
            PaymentStatus::Full => write!(f, "Full"),
        }
    }
}

/// An investment pool backed by one verified receivable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pool {
    /// Hash-derived pool identifier.
    pub pool_id: String,
    /// The verified receivable backing this pool.
    pub receivable_id: String,
    /// Funding target in 6-decimal USDC units.
    pub target_amount: u128,
    /// Total invested so far, 6-decimal USDC.
    pub total_invested: u128,
    /// Total repayments recorded so far, 6-decimal USDC.
    pub total_paid: u128,
    /// Pool APR in basis points.
    pub apr_bps: u64,
    /// Maturity date.
    pub maturity_date: DateTime<Utc>,
    /// Lifecycle status.
    pub status: PoolStatus,
    /// Repayment progress.
    pub payment_status: PaymentStatus,
    /// Share holders of record, 18-decimal share units. Kept in sync with
    /// the share token ledger for this pool's shares.
    pub holders: HashMap<String, u128>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

/// What `record_payment` observed, so the execution environment can mark
/// the backing receivable PAID exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaymentRecorded {
    /// Whether this payment pushed the pool to FULL.
    pub reached_full: bool,
}

/// The pool manager contract.
///
/// Pulls USDC through the ledger's allowance mechanism and mints/burns
/// share tokens as the pool's issuer. In production this state lives in
/// the deployed contract's storage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolManager {
    /// The contract's own address: holds escrowed USDC, issues shares.
    address: String,
    /// The AMC address.
    amc: String,
    /// Pools keyed by id.
    pools: HashMap<String, Pool>,
    /// Pool ids in creation order, for paged views.
    order: Vec<String>,
    /// Receivable → pool guard against double-pooling.
    by_receivable: HashMap<String, String>,
    /// Pool-id-derivation nonce.
    nonce: u64,
}

impl PoolManager {
    /// Creates an empty pool manager deployed at `address`, administered
    /// by `amc`.
    pub fn new(address: impl Into<String>, amc: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            amc: amc.into(),
            pools: HashMap::new(),
            order: Vec::new(),
            by_receivable: HashMap::new(),
            nonce: 0,
        }
    }

    /// The contract's own address.
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Creates a pool over a verified receivable. AMC only.
    pub fn create_pool(
        &mut self,
        caller: &str,
        receivable: &Receivable,
        target_amount: u128,
        apr_bps: u64,
        maturity_date: DateTime<Utc>,
    ) -> Result<String, PoolError> {
        if caller != self.amc {
            return Err(PoolError::Unauthorized);
        }
        if target_amount == 0 {
            return Err(PoolError::ZeroAmount);
        }
        if maturity_date <= Utc::now() {
            return Err(PoolError::MaturityPassed);
        }
        if receivable.status != ReceivableStatus::Verified {
            return Err(PoolError::ReceivableNotVerified {
                id: receivable.id.clone(),
                status: receivable.status,
            });
        }
        if self.by_receivable.contains_key(&receivable.id) {
            return Err(PoolError::ReceivableAlreadyPooled(receivable.id.clone()));
        }

        let pool_id =
            crate::receivable_factory::derive_id(b"pool", &[&receivable.id], self.nonce);
        self.nonce += 1;

        let pool = Pool {
            pool_id: pool_id.clone(),
            receivable_id: receivable.id.clone(),
            target_amount,
            total_invested: 0,
            total_paid: 0,
            apr_bps,
            maturity_date,
            status: PoolStatus::Active,
            payment_status: PaymentStatus::Pending,
            holders: HashMap::new(),
            created_at: Utc::now(),
        };

        self.pools.insert(pool_id.clone(), pool);
        self.order.push(pool_id.clone());
        self.by_receivable
            .insert(receivable.id.clone(), pool_id.clone());

        Ok(pool_id)
    }

    /// Invests USDC into an ACTIVE pool. Pulls the USDC via allowance,
    /// mints shares at the 6 → 18 decimal scale, and transitions the pool
    /// to FUNDED when the target is reached. On funding, the collected
    /// principal is released to the AMC, which advances it to the
    /// exporter. Returns the shares minted.
    pub fn invest(
        &mut self,
        caller: &str,
        pool_id: &str,
        amount: u128,
        usdc: &mut TokenLedger,
        shares: &mut TokenLedger,
    ) -> Result<u128, PoolError> {
        if amount == 0 {
            return Err(PoolError::ZeroAmount);
        }
        let address = self.address.clone();
        let pool = self.pool_mut(pool_id)?;
        if pool.status != PoolStatus::Active {
            return Err(PoolError::WrongStatus {
                id: pool_id.to_string(),
                status: pool.status,
                operation: "invest",
            });
        }
        let remaining = pool.target_amount - pool.total_invested;
        if amount > remaining {
            return Err(PoolError::ExceedsTarget { remaining });
        }

        usdc.transfer_from(&address, caller, &address, amount)?;

        let minted = usdc_to_shares(amount).map_err(|_| PoolError::Overflow)?;
        shares.mint(&address, caller, minted)?;

        let amc = self.amc.clone();
        let pool = self.pool_mut(pool_id)?;
        pool.total_invested += amount;
        *pool.holders.entry(caller.to_string()).or_insert(0) += minted;
        let funded = pool.total_invested == pool.target_amount;
        if funded {
            pool.status = PoolStatus::Funded;
        }
        let total_invested = pool.total_invested;
        if funded {
            // Release the principal for the exporter advance.
            usdc.transfer(&address, &amc, total_invested)?;
        }

        Ok(minted)
    }

    /// Withdraws part of an investment. Only while the pool is still
    /// ACTIVE; once funded the capital is committed until distribution.
    pub fn withdraw(
        &mut self,
        caller: &str,
        pool_id: &str,
        amount: u128,
        usdc: &mut TokenLedger,
        shares: &mut TokenLedger,
    ) -> Result<(), PoolError> {
        if amount == 0 {
            return Err(PoolError::ZeroAmount);
        }
        let address = self.address.clone();
        let pool = self.pool_mut(pool_id)?;
        if pool.status != PoolStatus::Active {
            return Err(PoolError::WrongStatus {
                id: pool_id.to_string(),
                status: pool.status,
                operation: "withdraw",
            });
        }

        let share_amount = usdc_to_shares(amount).map_err(|_| PoolError::Overflow)?;
        let held = pool.holders.get(caller).copied().unwrap_or(0);
        if share_amount > held {
            return Err(PoolError::ExceedsContribution {
                contributed: shares_to_usdc(held),
                requested: amount,
            });
        }

        shares.burn(caller, share_amount)?;
        usdc.transfer(&address, caller, amount)?;

        let pool = self.pool_mut(pool_id)?;
        pool.total_invested -= amount;
        *pool.holders.get_mut(caller).unwrap() -= share_amount;

        Ok(())
    }

    /// Records an importer repayment. AMC only; the USDC is pulled from
    /// the AMC's balance into the pool. Payments may exceed the target —
    /// the excess is the interest the importer owes — and FULL is reached
    /// exactly when the running total covers the target.
    pub fn record_payment(
        &mut self,
        caller: &str,
        pool_id: &str,
        amount: u128,
        usdc: &mut TokenLedger,
    ) -> Result<PaymentRecorded, PoolError> {
        if caller != self.amc {
            return Err(PoolError::Unauthorized);
        }
        if amount == 0 {
            return Err(PoolError::ZeroAmount);
        }
        let address = self.address.clone();
        let pool = self.pool_mut(pool_id)?;
        match pool.status {
            PoolStatus::Active | PoolStatus::Funded | PoolStatus::Matured => {}
            status => {
                return Err(PoolError::WrongStatus {
                    id: pool_id.to_string(),
                    status,
                    operation: "record_payment",
                })
            }
        }

        usdc.transfer_from(&address, caller, &address, amount)?;

        let pool = self.pool_mut(pool_id)?;
        pool.total_paid = pool
            .total_paid
            .checked_add(amount)
            .ok_or(PoolError::Overflow)?;

        let was_full = pool.payment_status == PaymentStatus::Full;
        pool.payment_status = if pool.total_paid >= pool.target_amount {
            PaymentStatus::Full
        } else {
            PaymentStatus::Partial
        };
        let reached_full = !was_full && pool.payment_status == PaymentStatus::Full;
        if reached_full {
            pool.status = PoolStatus::Paid;
        }

        Ok(PaymentRecorded { reached_full })
    }

    /// Distributes principal plus APR-proportional yield to the holders
    /// of record, burning their shares and closing the pool. AMC only;
    /// rejected unless payments are FULL and the pool holds enough USDC
    /// to cover every payout. Any surplus returns to the AMC.
    pub fn distribute_yield(
        &mut self,
        caller: &str,
        pool_id: &str,
        usdc: &mut TokenLedger,
        shares: &mut TokenLedger,
    ) -> Result<Vec<(String, u128)>, PoolError> {
        if caller != self.amc {
            return Err(PoolError::Unauthorized);
        }
        let address = self.address.clone();
        let amc = self.amc.clone();
        let pool = self.pool_mut(pool_id)?;
        if pool.payment_status != PaymentStatus::Full {
            return Err(PoolError::PaymentsIncomplete {
                paid: pool.total_paid,
                target: pool.target_amount,
            });
        }
        if pool.status != PoolStatus::Paid {
            return Err(PoolError::WrongStatus {
                id: pool_id.to_string(),
                status: pool.status,
                operation: "distribute_yield",
            });
        }

        // Payout per holder: principal backing their shares plus the APR
        // share of that principal. Truncating division rounds dust in the
        // pool's favor, so the sum never exceeds what full payment holds.
        let apr_bps = pool.apr_bps as u128;
        let mut payouts: Vec<(String, u128)> = Vec::with_capacity(pool.holders.len());
        for (holder, share_balance) in &pool.holders {
            if *share_balance == 0 {
                continue;
            }
            let principal = shares_to_usdc(*share_balance);
            let yield_part = principal
                .checked_mul(apr_bps)
                .ok_or(PoolError::Overflow)?
                / BPS_SCALE as u128;
            payouts.push((holder.clone(), principal + yield_part));
        }
        payouts.sort(); // deterministic payout order

        let required: u128 = payouts.iter().map(|(_, p)| p).sum();
        let held = usdc.balance_of(&address);
        if held < required {
            return Err(PoolError::InsufficientFunds { held, required });
        }

        // Every leg must be known to succeed before the first one runs:
        // a holder with shares escrowed in an open listing cannot cover
        // the burn, and a half-applied distribution would strand the
        // remaining funds in a Paid pool.
        for (holder, _) in &payouts {
            let needed = pool.holders[holder];
            let available = shares.balance_of(holder);
            if available < needed {
                return Err(PoolError::SharesEscrowed {
                    holder: holder.clone(),
                    available,
                    needed,
                });
            }
        }

        for (holder, payout) in &payouts {
            let share_balance = pool.holders[holder];
            shares.burn(holder, share_balance)?;
            usdc.transfer(&address, holder, *payout)?;
        }
        pool.holders.clear();
        pool.status = PoolStatus::Closed;

        // Whatever the payouts did not consume goes back to the AMC.
        let surplus = held - required;
        if surplus > 0 {
            usdc.transfer(&address, &amc, surplus)?;
        }

        Ok(payouts)
    }

    /// Marks a FUNDED pool MATURED once its maturity date has passed.
    pub fn mark_matured(&mut self, pool_id: &str, now: DateTime<Utc>) -> Result<(), PoolError> {
        let pool = self.pool_mut(pool_id)?;
        if pool.status != PoolStatus::Funded || now < pool.maturity_date {
            return Err(PoolError::WrongStatus {
                id: pool_id.to_string(),
                status: pool.status,
                operation: "mark_matured",
            });
        }
        pool.status = PoolStatus::Matured;
        Ok(())
    }

    /// Declares a pool DEFAULTED. AMC only; requires the maturity date to
    /// have passed with payments still short of the target.
    pub fn mark_defaulted(
        &mut self,
        caller: &str,
        pool_id: &str,
        now: DateTime<Utc>,
    ) -> Result<(), PoolError> {
        if caller != self.amc {
            return Err(PoolError::Unauthorized);
        }
        let pool = self.pool_mut(pool_id)?;
        let past_maturity = now >= pool.maturity_date;
        let payments_short = pool.payment_status != PaymentStatus::Full;
        let defaultable = matches!(
            pool.status,
            PoolStatus::Active | PoolStatus::Funded | PoolStatus::Matured
        );
        if !(past_maturity && payments_short && defaultable) {
            return Err(PoolError::NotDefaultable(pool_id.to_string()));
        }
        pool.status = PoolStatus::Defaulted;
        Ok(())
    }

    /// Re-points share ownership after a secondary-market settlement so
    /// distribution pays the current holder.
    pub fn transfer_shares(
        &mut self,
        pool_id: &str,
        from: &str,
        to: &str,
        amount: u128,
    ) -> Result<(), PoolError> {
        let pool = self.pool_mut(pool_id)?;
        let held = pool.holders.get(from).copied().unwrap_or(0);
        if amount > held {
            return Err(PoolError::ExceedsHolding { held, amount });
        }
        pool.holders.insert(from.to_string(), held - amount);
        *pool.holders.entry(to.to_string()).or_insert(0) += amount;
        Ok(())
    }

    fn pool_mut(&mut self, pool_id: &str) -> Result<&mut Pool, PoolError> {
        self.pools
            .get_mut(pool_id)
            .ok_or_else(|| PoolError::NotFound(pool_id.to_string()))
    }

    /// Returns a pool by id.
    pub fn get_pool(&self, pool_id: &str) -> Option<&Pool> {
        self.pools.get(pool_id)
    }

    /// Returns up to `limit` pools starting at `start`, in creation order.
    pub fn all_pools(&self, start: u64, limit: u64) -> Vec<&Pool> {
        self.order
            .iter()
            .skip(start as usize)
            .take(limit as usize)
            .filter_map(|id| self.pools.get(id))
            .collect()
    }
}
