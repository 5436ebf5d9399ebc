//! # Token Ledger Contract
//!
//! ERC-20-style fungible token ledger. One ledger instance per deployed
//! token: MockUSDC (6 decimals), pool share tokens (18 decimals), and the
//! NVX reward token (18 decimals).
//!
//! ## Security Model
//!
//! - **Mint gating**: only the ledger's issuer address can mint. For
//!   MockUSDC on devnet the issuer is the faucet; for share tokens it is
//!   the pool manager contract.
//! - **Allowance pulls**: `transfer_from` deducts from an explicit
//!   owner → spender allowance, never from the balance directly. This is
//!   the seam the pool manager and marketplace pull funds through.
//! - **Checked arithmetic**: balances, allowances, and total supply are
//!   u128 and every update is overflow-checked.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors from token ledger operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenError {
    /// The caller is not the ledger's issuer.
    #[error("unauthorized: only the issuer can mint")]
    UnauthorizedMint,

    /// The holder does not have enough balance.
    #[error("insufficient balance: account holds {balance}, needs {amount}")]
    InsufficientBalance {
        /// Current balance of the account.
        balance: u128,
        /// Amount the operation required.
        amount: u128,
    },

    /// The spender's allowance does not cover the pull.
    #[error("insufficient allowance: approved {allowance}, needs {amount}")]
    InsufficientAllowance {
        /// Current owner → spender allowance.
        allowance: u128,
        /// Amount the pull required.
        amount: u128,
    },

    /// Total supply would overflow u128.
    #[error("supply overflow")]
    SupplyOverflow,

    /// Zero-amount transfers and approvals are rejected at the contract
    /// boundary to keep event logs meaningful.
    #[error("amount must be positive")]
    ZeroAmount,
}

// ---------------------------------------------------------------------------
// TokenLedger
// ---------------------------------------------------------------------------

/// A single token's balances and allowances.
///
/// In production this state lives in the deployed ERC-20's storage slots;
/// the in-memory representation here backs the local execution environment
/// and the contract test suites.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenLedger {
    /// Ticker symbol, e.g. `"USDC"`, `"nvxPOOL"`, `"NVX"`.
    pub symbol: String,
    /// Decimal precision of this token.
    pub decimals: u8,
    /// The only address allowed to mint.
    pub issuer: String,
    /// Current total supply in the smallest denomination.
    pub total_supply: u128,
    /// Per-address balances.
    balances: HashMap<String, u128>,
    /// Owner → spender allowances, keyed `"{owner}:{spender}"`.
    allowances: HashMap<String, u128>,
}

fn allowance_key(owner: &str, spender: &str) -> String {
    format!("{owner}:{spender}")
}

impl TokenLedger {
    /// Creates an empty ledger for a token with the given symbol,
    /// precision, and issuer.
    pub fn new(symbol: impl Into<String>, decimals: u8, issuer: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            decimals,
            issuer: issuer.into(),
            total_supply: 0,
            balances: HashMap::new(),
            allowances: HashMap::new(),
        }
    }

    /// Mints new tokens to `to`. Issuer only.
    pub fn mint(&mut self, caller: &str, to: &str, amount: u128) -> Result<(), TokenError> {
        if caller != self.issuer {
            return Err(TokenError::UnauthorizedMint);
        }
        if amount == 0 {
            return Err(TokenError::ZeroAmount);
        }
        let new_supply = self
            .total_supply
            .checked_add(amount)
            .ok_or(TokenError::SupplyOverflow)?;
        let balance = self.balances.entry(to.to_string()).or_insert(0);
        *balance = balance.checked_add(amount).ok_or(TokenError::SupplyOverflow)?;
        self.total_supply = new_supply;
        Ok(())
    }

    /// Burns tokens from `from`. Used by the pool manager when shares are
    /// redeemed; holders can also burn their own balance.
    pub fn burn(&mut self, from: &str, amount: u128) -> Result<(), TokenError> {
        if amount == 0 {
            return Err(TokenError::ZeroAmount);
        }
        self.debit(from, amount)?;
        // Supply cannot underflow if the debit succeeded.
        self.total_supply -= amount;
        Ok(())
    }

    /// Moves `amount` from `from` to `to`.
    pub fn transfer(&mut self, from: &str, to: &str, amount: u128) -> Result<(), TokenError> {
        if amount == 0 {
            return Err(TokenError::ZeroAmount);
        }
        self.debit(from, amount)?;
        self.credit(to, amount);
        Ok(())
    }

    /// Sets the owner → spender allowance to exactly `amount`.
    pub fn approve(&mut self, owner: &str, spender: &str, amount: u128) {
        self.allowances.insert(allowance_key(owner, spender), amount);
    }

    /// Current owner → spender allowance, or 0.
    pub fn allowance(&self, owner: &str, spender: &str) -> u128 {
        self.allowances
            .get(&allowance_key(owner, spender))
            .copied()
            .unwrap_or(0)
    }

    /// Pulls `amount` from `owner` to `to` on behalf of `spender`,
    /// deducting the allowance.
    pub fn transfer_from(
        &mut self,
        spender: &str,
        owner: &str,
        to: &str,
        amount: u128,
    ) -> Result<(), TokenError> {
        if amount == 0 {
            return Err(TokenError::ZeroAmount);
        }
        let key = allowance_key(owner, spender);
        let allowance = self.allowances.get(&key).copied().unwrap_or(0);
        if allowance < amount {
            return Err(TokenError::InsufficientAllowance { allowance, amount });
        }
        self.debit(owner, amount)?;
        self.allowances.insert(key, allowance - amount);
        self.credit(to, amount);
        Ok(())
    }

    /// Balance of `address`, or 0.
    pub fn balance_of(&self, address: &str) -> u128 {
        self.balances.get(address).copied().unwrap_or(0)
    }

    fn debit(&mut self, from: &str, amount: u128) -> Result<(), TokenError> {
        let balance = self.balances.get(from).copied().unwrap_or(0);
        if balance < amount {
            return Err(TokenError::InsufficientBalance { balance, amount });
        }
        self.balances.insert(from.to_string(), balance - amount);
        Ok(())
    }

    fn credit(&mut self, to: &str, amount: u128) {
        // Credit cannot overflow: total_supply is checked at mint and the
        // sum of all balances never exceeds it.
        let balance = self.balances.entry(to.to_string()).or_insert(0);
        *balance += amount;
    }
}
