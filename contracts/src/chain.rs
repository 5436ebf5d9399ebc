//! # Local Execution Environment
//!
//! Hosts the four contract state machines behind the gateway's
//! `ChainProvider` interface: dispatches transactions by (contract
//! address, method), decodes JSON parameters, executes the contract
//! logic, and produces transaction receipts with the same named event
//! logs the deployed EVM contracts emit. Contract reverts surface as
//! `ChainError::Revert` with the contract's reason string, so the
//! gateway cannot tell this apart from a real chain.
//!
//! View calls return JSON shaped exactly like the gateway's view types:
//! amounts as decimal strings, timestamps as RFC 3339, status enums as
//! their display names.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::RwLock;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use novax_protocol::amount::serde_raw;
use novax_protocol::chain::{
    ChainError, ChainProvider, ContractCall, EventLog, TransactionReceipt, ViewCall,
};
use novax_protocol::config::CHAIN_ID_HEX;
use novax_protocol::gateway::AddressBook;

use crate::marketplace::{Listing, Marketplace};
use crate::pool_manager::{Pool, PoolManager};
use crate::receivable_factory::{Receivable, ReceivableFactory};
use crate::tokens::TokenLedger;

/// Devnet faucet address: the MockUSDC issuer.
pub const FAUCET_ADDRESS: &str = "0xfaucet";

// ---------------------------------------------------------------------------
// LocalChain
// ---------------------------------------------------------------------------

struct ChainState {
    factory: ReceivableFactory,
    pools: PoolManager,
    market: Marketplace,
    usdc: TokenLedger,
    shares: TokenLedger,
    nvx: TokenLedger,
}

/// The in-process chain. Thread-safe; clone the `Arc` it lives in.
pub struct LocalChain {
    addresses: AddressBook,
    state: RwLock<ChainState>,
    /// Receipts indexed by transaction hash.
    receipts: DashMap<String, TransactionReceipt>,
    block_height: AtomicU64,
}

impl LocalChain {
    /// Boots a chain with the contracts deployed at the given addresses
    /// and `amc` as the asset management company.
    pub fn new(addresses: AddressBook, amc: impl Into<String>) -> Self {
        let amc = amc.into();
        let state = ChainState {
            factory: ReceivableFactory::new(&amc),
            pools: PoolManager::new(&addresses.pool_manager, &amc),
            market: Marketplace::new(&addresses.marketplace),
            usdc: TokenLedger::new("USDC", 6, FAUCET_ADDRESS),
            shares: TokenLedger::new("nvxPOOL", 18, &addresses.pool_manager),
            nvx: TokenLedger::new("NVX", 18, &amc),
        };
        Self {
            addresses,
            state: RwLock::new(state),
            receipts: DashMap::new(),
            block_height: AtomicU64::new(1),
        }
    }

    /// Devnet helper: mints MockUSDC to an address, as the faucet.
    pub fn faucet_mint(&self, to: &str, amount: u128) -> Result<(), ChainError> {
        self.state
            .write()
            .usdc
            .mint(FAUCET_ADDRESS, to, amount)
            .map_err(revert)
    }

    /// Current block height.
    pub fn height(&self) -> u64 {
        self.block_height.load(Ordering::SeqCst)
    }

    /// Looks up a receipt by transaction hash.
    pub fn receipt(&self, tx_hash: &str) -> Option<TransactionReceipt> {
        self.receipts.get(tx_hash).map(|r| r.clone())
    }

    fn seal(&self, logs: Vec<EventLog>) -> TransactionReceipt {
        let height = self.block_height.fetch_add(1, Ordering::SeqCst);
        let receipt = TransactionReceipt {
            tx_hash: format!("0x{}", Uuid::new_v4().simple()),
            block_height: height,
            timestamp: Utc::now().timestamp_millis() as u64,
            logs,
        };
        self.receipts
            .insert(receipt.tx_hash.clone(), receipt.clone());
        receipt
    }

    fn execute(&self, call: &ContractCall) -> Result<Vec<EventLog>, ChainError> {
        let mut state = self.state.write();
        let contract = call.contract.as_str();
        let caller = call.caller.as_str();

        if contract == self.addresses.receivable_factory {
            return self.execute_factory(&mut state, caller, call);
        }
        if contract == self.addresses.pool_manager {
            return self.execute_pools(&mut state, caller, call);
        }
        if contract == self.addresses.marketplace {
            return self.execute_market(&mut state, caller, call);
        }
        if let Some(kind) = self.token_kind(contract) {
            return execute_token(&mut state, kind, contract, caller, call);
        }
        Err(ChainError::UnknownContract(contract.to_string()))
    }

    fn execute_factory(
        &self,
        state: &mut ChainState,
        caller: &str,
        call: &ContractCall,
    ) -> Result<Vec<EventLog>, ChainError> {
        match call.method.as_str() {
            "createReceivable" => {
                let p: CreateReceivableParams = decode_params(&call.params)?;
                let id = state
                    .factory
                    .create(caller, &p.importer, p.amount_usd, p.due_date, &p.metadata_cid)
                    .map_err(revert)?;
                Ok(vec![EventLog::new(
                    "ReceivableCreated",
                    &call.contract,
                    json!({ "receivable_id": id, "exporter": caller }),
                )])
            }
            "verifyReceivable" => {
                let p: VerifyReceivableParams = decode_params(&call.params)?;
                state
                    .factory
                    .verify(caller, &p.receivable_id, p.approved, p.risk_score, p.apr_bps)
                    .map_err(revert)?;
                Ok(vec![EventLog::new(
                    "ReceivableVerified",
                    &call.contract,
                    json!({ "receivable_id": p.receivable_id, "approved": p.approved }),
                )])
            }
            method => unknown_method(&call.contract, method),
        }
    }

    fn execute_pools(
        &self,
        state: &mut ChainState,
        caller: &str,
        call: &ContractCall,
    ) -> Result<Vec<EventLog>, ChainError> {
        let ChainState {
            factory,
            pools,
            usdc,
            shares,
            ..
        } = state;
        match call.method.as_str() {
            "createPool" => {
                let p: CreatePoolParams = decode_params(&call.params)?;
                let receivable = factory
                    .get(&p.receivable_id)
                    .cloned()
                    .ok_or_else(|| ChainError::Revert(format!(
                        "receivable not found: {}",
                        p.receivable_id
                    )))?;
                let pool_id = pools
                    .create_pool(caller, &receivable, p.target_amount, p.apr_bps, p.maturity_date)
                    .map_err(revert)?;
                Ok(vec![EventLog::new(
                    "PoolCreated",
                    &call.contract,
                    json!({ "pool_id": pool_id, "receivable_id": p.receivable_id }),
                )])
            }
            "invest" => {
                let p: PoolAmountParams = decode_params(&call.params)?;
                let minted = pools
                    .invest(caller, &p.pool_id, p.amount, usdc, shares)
                    .map_err(revert)?;
                Ok(vec![EventLog::new(
                    "Invested",
                    &call.contract,
                    json!({
                        "pool_id": p.pool_id,
                        "investor": caller,
                        "amount": p.amount.to_string(),
                        "shares_minted": minted.to_string(),
                    }),
                )])
            }
            "withdraw" => {
                let p: PoolAmountParams = decode_params(&call.params)?;
                pools
                    .withdraw(caller, &p.pool_id, p.amount, usdc, shares)
                    .map_err(revert)?;
                Ok(vec![EventLog::new(
                    "Withdrawn",
                    &call.contract,
                    json!({
                        "pool_id": p.pool_id,
                        "investor": caller,
                        "amount": p.amount.to_string(),
                    }),
                )])
            }
            "recordPayment" => {
                let p: PoolAmountParams = decode_params(&call.params)?;
                let recorded = pools
                    .record_payment(caller, &p.pool_id, p.amount, usdc)
                    .map_err(revert)?;
                if recorded.reached_full {
                    let receivable_id = pools
                        .get_pool(&p.pool_id)
                        .map(|pool| pool.receivable_id.clone())
                        .unwrap_or_default();
                    factory.mark_paid(&receivable_id).map_err(revert)?;
                }
                let status = pools
                    .get_pool(&p.pool_id)
                    .map(|pool| pool.payment_status.to_string())
                    .unwrap_or_default();
                Ok(vec![EventLog::new(
                    "PaymentRecorded",
                    &call.contract,
                    json!({
                        "pool_id": p.pool_id,
                        "amount": p.amount.to_string(),
                        "payment_status": status,
                    }),
                )])
            }
            "distributeYield" => {
                let p: PoolIdParams = decode_params(&call.params)?;
                let payouts = pools
                    .distribute_yield(caller, &p.pool_id, usdc, shares)
                    .map_err(revert)?;
                let total: u128 = payouts.iter().map(|(_, amount)| amount).sum();
                Ok(vec![EventLog::new(
                    "YieldDistributed",
                    &call.contract,
                    json!({
                        "pool_id": p.pool_id,
                        "total_distributed": total.to_string(),
                        "holders_paid": payouts.len(),
                    }),
                )])
            }
            "markMatured" => {
                let p: PoolIdParams = decode_params(&call.params)?;
                pools.mark_matured(&p.pool_id, Utc::now()).map_err(revert)?;
                Ok(vec![EventLog::new(
                    "PoolMatured",
                    &call.contract,
                    json!({ "pool_id": p.pool_id }),
                )])
            }
            "markDefaulted" => {
                let p: PoolIdParams = decode_params(&call.params)?;
                pools
                    .mark_defaulted(caller, &p.pool_id, Utc::now())
                    .map_err(revert)?;
                Ok(vec![EventLog::new(
                    "PoolDefaulted",
                    &call.contract,
                    json!({ "pool_id": p.pool_id }),
                )])
            }
            method => unknown_method(&call.contract, method),
        }
    }

    fn execute_market(
        &self,
        state: &mut ChainState,
        caller: &str,
        call: &ContractCall,
    ) -> Result<Vec<EventLog>, ChainError> {
        let ChainState {
            pools,
            market,
            usdc,
            shares,
            ..
        } = state;
        match call.method.as_str() {
            "createListing" => {
                let p: CreateListingParams = decode_params(&call.params)?;
                // The pool and the seller's holding of record back every
                // later settlement; both are checked before the escrow
                // pull so a revert leaves the ledgers untouched.
                let pool = pools.get_pool(&p.pool_id).ok_or_else(|| {
                    ChainError::Revert(format!("pool not found: {}", p.pool_id))
                })?;
                let holding = pool.holders.get(caller).copied().unwrap_or(0);
                if holding < p.amount {
                    return Err(ChainError::Revert(format!(
                        "listing exceeds pool holding: holds {holding}, listing {}",
                        p.amount
                    )));
                }
                let listing_id = market
                    .create_listing(
                        caller,
                        &p.pool_id,
                        p.amount,
                        p.price_per_token,
                        p.min_purchase,
                        p.max_purchase,
                        p.deadline,
                        shares,
                    )
                    .map_err(revert)?;
                Ok(vec![EventLog::new(
                    "ListingCreated",
                    &call.contract,
                    json!({
                        "listing_id": listing_id,
                        "seller": caller,
                        "pool_id": p.pool_id,
                        "amount": p.amount.to_string(),
                    }),
                )])
            }
            "buyTokens" => {
                let p: BuyTokensParams = decode_params(&call.params)?;
                // The holder-of-record move must be guaranteed before the
                // ledgers change hands; a failure after the fill would
                // leave the buyer debited by a "reverted" transaction.
                if let Some(listing) = market.get_listing(&p.listing_id) {
                    let holding = pools
                        .get_pool(&listing.pool_id)
                        .and_then(|pool| pool.holders.get(&listing.seller).copied())
                        .unwrap_or(0);
                    if holding < p.amount {
                        return Err(ChainError::Revert(format!(
                            "seller holding out of sync for listing {}",
                            p.listing_id
                        )));
                    }
                }
                let fill = market
                    .buy(caller, &p.listing_id, p.amount, Utc::now(), usdc, shares)
                    .map_err(revert)?;
                // Settle holder-of-record accounting so distribution pays
                // the buyer, not the original investor.
                pools
                    .transfer_shares(&fill.pool_id, &fill.seller, caller, p.amount)
                    .map_err(revert)?;
                Ok(vec![EventLog::new(
                    "TokensPurchased",
                    &call.contract,
                    json!({
                        "listing_id": p.listing_id,
                        "buyer": caller,
                        "amount": p.amount.to_string(),
                        "cost": fill.cost.to_string(),
                        "sold_out": fill.sold_out,
                    }),
                )])
            }
            "cancelListing" => {
                let p: ListingIdParams = decode_params(&call.params)?;
                market
                    .cancel(caller, &p.listing_id, shares)
                    .map_err(revert)?;
                Ok(vec![EventLog::new(
                    "ListingCancelled",
                    &call.contract,
                    json!({ "listing_id": p.listing_id }),
                )])
            }
            method => unknown_method(&call.contract, method),
        }
    }

    fn token_kind(&self, contract: &str) -> Option<TokenKind> {
        if contract == self.addresses.usdc_token {
            Some(TokenKind::Usdc)
        } else if contract == self.addresses.pool_token {
            Some(TokenKind::PoolShare)
        } else if contract == self.addresses.nvx_token {
            Some(TokenKind::Nvx)
        } else {
            None
        }
    }
}

#[derive(Clone, Copy)]
enum TokenKind {
    Usdc,
    PoolShare,
    Nvx,
}

fn ledger<'s>(state: &'s mut ChainState, kind: TokenKind) -> &'s mut TokenLedger {
    match kind {
        TokenKind::Usdc => &mut state.usdc,
        TokenKind::PoolShare => &mut state.shares,
        TokenKind::Nvx => &mut state.nvx,
    }
}

fn execute_token(
    state: &mut ChainState,
    kind: TokenKind,
    contract: &str,
    caller: &str,
    call: &ContractCall,
) -> Result<Vec<EventLog>, ChainError> {
    match call.method.as_str() {
        "approve" => {
            let p: ApproveParams = decode_params(&call.params)?;
            ledger(state, kind).approve(caller, &p.spender, p.amount);
            Ok(vec![EventLog::new(
                "Approval",
                contract,
                json!({
                    "owner": caller,
                    "spender": p.spender,
                    "amount": p.amount.to_string(),
                }),
            )])
        }
        "transfer" => {
            // Pool shares move only through the marketplace so the
            // holder-of-record accounting stays consistent.
            if matches!(kind, TokenKind::PoolShare) {
                return Err(ChainError::Revert(
                    "pool shares trade via the marketplace".to_string(),
                ));
            }
            let p: TransferParams = decode_params(&call.params)?;
            ledger(state, kind)
                .transfer(caller, &p.to, p.amount)
                .map_err(revert)?;
            Ok(vec![EventLog::new(
                "Transfer",
                contract,
                json!({
                    "from": caller,
                    "to": p.to,
                    "amount": p.amount.to_string(),
                }),
            )])
        }
        "mint" => {
            let p: TransferParams = decode_params(&call.params)?;
            ledger(state, kind)
                .mint(caller, &p.to, p.amount)
                .map_err(revert)?;
            Ok(vec![EventLog::new(
                "Transfer",
                contract,
                json!({
                    "from": "0x0000000000000000000000000000000000000000",
                    "to": p.to,
                    "amount": p.amount.to_string(),
                }),
            )])
        }
        method => unknown_method(contract, method),
    }
}

#[async_trait]
impl ChainProvider for LocalChain {
    async fn submit(&self, call: ContractCall) -> Result<TransactionReceipt, ChainError> {
        let logs = self.execute(&call)?;
        let receipt = self.seal(logs);
        tracing::debug!(
            tx = %receipt.tx_hash,
            contract = %call.contract,
            method = %call.method,
            "transaction executed"
        );
        Ok(receipt)
    }

    async fn view(&self, call: ViewCall) -> Result<serde_json::Value, ChainError> {
        let state = self.state.read();
        let contract = call.contract.as_str();

        if contract == self.addresses.receivable_factory {
            return match call.method.as_str() {
                "getReceivable" => {
                    let p: ReceivableIdParams = decode_params(&call.params)?;
                    Ok(state
                        .factory
                        .get(&p.receivable_id)
                        .map(receivable_json)
                        .unwrap_or(serde_json::Value::Null))
                }
                "receivablesByExporter" => {
                    let p: ExporterParams = decode_params(&call.params)?;
                    let list: Vec<_> = state
                        .factory
                        .by_exporter(&p.exporter)
                        .into_iter()
                        .map(receivable_json)
                        .collect();
                    Ok(json!(list))
                }
                method => unknown_method(contract, method),
            };
        }
        if contract == self.addresses.pool_manager {
            return match call.method.as_str() {
                "getPool" => {
                    let p: PoolIdParams = decode_params(&call.params)?;
                    Ok(state
                        .pools
                        .get_pool(&p.pool_id)
                        .map(pool_json)
                        .unwrap_or(serde_json::Value::Null))
                }
                "allPools" => {
                    let p: PageParams = decode_params(&call.params)?;
                    let list: Vec<_> = state
                        .pools
                        .all_pools(p.start, p.limit)
                        .into_iter()
                        .map(pool_json)
                        .collect();
                    Ok(json!(list))
                }
                method => unknown_method(contract, method),
            };
        }
        if contract == self.addresses.marketplace {
            return match call.method.as_str() {
                "getListing" => {
                    let p: ListingIdParams = decode_params(&call.params)?;
                    Ok(state
                        .market
                        .get_listing(&p.listing_id)
                        .map(listing_json)
                        .unwrap_or(serde_json::Value::Null))
                }
                method => unknown_method(contract, method),
            };
        }
        if let Some(kind) = self.token_kind(contract) {
            let ledger = match kind {
                TokenKind::Usdc => &state.usdc,
                TokenKind::PoolShare => &state.shares,
                TokenKind::Nvx => &state.nvx,
            };
            return match call.method.as_str() {
                "balanceOf" => {
                    let p: AddressParams = decode_params(&call.params)?;
                    Ok(json!(ledger.balance_of(&p.address).to_string()))
                }
                "allowance" => {
                    let p: AllowanceParams = decode_params(&call.params)?;
                    Ok(json!(ledger.allowance(&p.owner, &p.spender).to_string()))
                }
                "totalSupply" => Ok(json!(ledger.total_supply.to_string())),
                method => unknown_method(contract, method),
            };
        }
        Err(ChainError::UnknownContract(contract.to_string()))
    }

    async fn chain_id_hex(&self) -> Result<String, ChainError> {
        Ok(CHAIN_ID_HEX.to_string())
    }
}

// ---------------------------------------------------------------------------
// Wire shapes
// ---------------------------------------------------------------------------

fn receivable_json(r: &Receivable) -> serde_json::Value {
    json!({
        "id": r.id,
        "exporter": r.exporter,
        "importer": r.importer,
        "amount_usd": r.amount_usd.to_string(),
        "due_date": r.due_date,
        "status": r.status.to_string(),
        "risk_score": r.risk_score,
        "apr_bps": r.apr_bps,
        "metadata_cid": r.metadata_cid,
    })
}

fn pool_json(p: &Pool) -> serde_json::Value {
    json!({
        "pool_id": p.pool_id,
        "receivable_id": p.receivable_id,
        "target_amount": p.target_amount.to_string(),
        "total_invested": p.total_invested.to_string(),
        "total_paid": p.total_paid.to_string(),
        "apr_bps": p.apr_bps,
        "maturity_date": p.maturity_date,
        "status": p.status.to_string(),
        "payment_status": p.payment_status.to_string(),
    })
}

fn listing_json(l: &Listing) -> serde_json::Value {
    json!({
        "listing_id": l.listing_id,
        "seller": l.seller,
        "pool_id": l.pool_id,
        "amount": l.amount.to_string(),
        "remaining": l.remaining.to_string(),
        "price_per_token": l.price_per_token.to_string(),
        "min_purchase": l.min_purchase.to_string(),
        "max_purchase": l.max_purchase.to_string(),
        "deadline": l.deadline,
        "active": l.active,
    })
}

// ---------------------------------------------------------------------------
// Param decoding
// ---------------------------------------------------------------------------

fn decode_params<T: serde::de::DeserializeOwned>(
    params: &serde_json::Value,
) -> Result<T, ChainError> {
    serde_json::from_value(params.clone()).map_err(|e| ChainError::BadParams(e.to_string()))
}

fn revert(e: impl std::fmt::Display) -> ChainError {
    ChainError::Revert(e.to_string())
}

fn unknown_method<T>(contract: &str, method: &str) -> Result<T, ChainError> {
    Err(ChainError::UnknownMethod {
        contract: contract.to_string(),
        method: method.to_string(),
    })
}

#[derive(Deserialize)]
struct CreateReceivableParams {
    importer: String,
    #[serde(with = "serde_raw")]
    amount_usd: u128,
    due_date: DateTime<Utc>,
    metadata_cid: String,
}

#[derive(Deserialize)]
struct VerifyReceivableParams {
    receivable_id: String,
    approved: bool,
    risk_score: u32,
    apr_bps: u64,
}

#[derive(Deserialize)]
struct CreatePoolParams {
    receivable_id: String,
    #[serde(with = "serde_raw")]
    target_amount: u128,
    apr_bps: u64,
    maturity_date: DateTime<Utc>,
}

#[derive(Deserialize)]
struct PoolAmountParams {
    pool_id: String,
    #[serde(with = "serde_raw")]
    amount: u128,
}

#[derive(Deserialize)]
struct PoolIdParams {
    pool_id: String,
}

#[derive(Deserialize)]
struct ReceivableIdParams {
    receivable_id: String,
}

#[derive(Deserialize)]
struct ExporterParams {
    exporter: String,
}

#[derive(Deserialize)]
struct CreateListingParams {
    pool_id: String,
    #[serde(with = "serde_raw")]
    amount: u128,
    #[serde(with = "serde_raw")]
    price_per_token: u128,
    #[serde(with = "serde_raw")]
    min_purchase: u128,
    #[serde(with = "serde_raw")]
    max_purchase: u128,
    deadline: DateTime<Utc>,
}

#[derive(Deserialize)]
struct BuyTokensParams {
    listing_id: String,
    #[serde(with = "serde_raw")]
    amount: u128,
}

#[derive(Deserialize)]
struct ListingIdParams {
    listing_id: String,
}

#[derive(Deserialize)]
struct PageParams {
    start: u64,
    limit: u64,
}

#[derive(Deserialize)]
struct AddressParams {
    address: String,
}

#[derive(Deserialize)]
struct AllowanceParams {
    owner: String,
    spender: String,
}

#[derive(Deserialize)]
struct ApproveParams {
    spender: String,
    #[serde(with = "serde_raw")]
    amount: u128,
}

#[derive(Deserialize)]
struct TransferParams {
    to: String,
    #[serde(with = "serde_raw")]
    amount: u128,
}
