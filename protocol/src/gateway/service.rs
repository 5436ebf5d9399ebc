//! # Contract Service
//!
//! The gateway proper: one method per on-chain operation, every write the
//! same shape. Build the call, submit it through the provider, wait for
//! the receipt, locate one named event log, extract the identifier the
//! contract generated. No local bookkeeping — the chain is the source of
//! truth and this service holds nothing but the last-used provider and
//! signer, both replaceable at any time via [`ContractService::initialize`].
//!
//! ERC-20 spending operations (invest, buy, list, record payment) run a
//! pre-flight allowance check against the relevant token and submit an
//! `approve` transaction first when the current allowance is short.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde_json::json;
use tokio::sync::RwLock;

use crate::chain::{ChainProvider, ContractCall, EventLog, TransactionReceipt, ViewCall};
use crate::config::READ_BATCH_SIZE;

use super::error::GatewayError;
use super::types::{
    CreatedListing, CreatedPool, CreatedReceivable, ListingView, PoolView, ReceivableView,
    TxOutcome,
};

/// One whole 18-decimal share token, the unit `price_per_token` prices.
const ONE_SHARE: u128 = 1_000_000_000_000_000_000;

// ---------------------------------------------------------------------------
// AddressBook
// ---------------------------------------------------------------------------

/// Deployed contract addresses for one environment.
#[derive(Debug, Clone)]
pub struct AddressBook {
    /// Real-world-asset factory.
    pub rwa_factory: String,
    /// Receivable factory.
    pub receivable_factory: String,
    /// Pool manager.
    pub pool_manager: String,
    /// Marketplace.
    pub marketplace: String,
    /// MockUSDC token (6 decimals).
    pub usdc_token: String,
    /// Pool share token (18 decimals).
    pub pool_token: String,
    /// NVX reward token (18 decimals).
    pub nvx_token: String,
}

impl AddressBook {
    /// The well-known devnet deployment used by `novax-node` and the
    /// integration suites.
    pub fn devnet() -> Self {
        Self {
            rwa_factory: "0x00000000000000000000000000000000000rwa01".into(),
            receivable_factory: "0x000000000000000000000000000000000recv01".into(),
            pool_manager: "0x000000000000000000000000000000000pool01".into(),
            marketplace: "0x00000000000000000000000000000000market1".into(),
            usdc_token: "0x000000000000000000000000000000000usdc01".into(),
            pool_token: "0x00000000000000000000000000000000shares1".into(),
            nvx_token: "0x0000000000000000000000000000000000nvx01".into(),
        }
    }
}

// ---------------------------------------------------------------------------
// ContractService
// ---------------------------------------------------------------------------

/// The contract gateway. Cheap to share behind an `Arc`.
pub struct ContractService {
    addresses: AddressBook,
    provider: RwLock<Option<Arc<dyn ChainProvider>>>,
    signer: RwLock<Option<String>>,
}

impl ContractService {
    /// Creates an uninitialized service for the given deployment.
    /// Reads work as soon as a provider is connected; writes additionally
    /// need a signer.
    pub fn new(addresses: AddressBook) -> Self {
        Self {
            addresses,
            provider: RwLock::new(None),
            signer: RwLock::new(None),
        }
    }

    /// The deployment this service talks to.
    pub fn addresses(&self) -> &AddressBook {
        &self.addresses
    }

    /// Sets (or replaces) the provider and signer in one step. Called on
    /// wallet connect and reconnect.
    pub async fn initialize(&self, provider: Arc<dyn ChainProvider>, signer: impl Into<String>) {
        let signer = signer.into();
        tracing::info!(signer = %signer, "gateway initialized");
        *self.provider.write().await = Some(provider);
        *self.signer.write().await = Some(signer);
    }

    /// Connects a provider without a signer — read-only mode, used before
    /// any wallet is connected.
    pub async fn connect_provider(&self, provider: Arc<dyn ChainProvider>) {
        *self.provider.write().await = Some(provider);
    }

    async fn read_session(&self) -> Result<Arc<dyn ChainProvider>, GatewayError> {
        self.provider
            .read()
            .await
            .clone()
            .ok_or(GatewayError::ProviderNotInitialized)
    }

    async fn write_session(&self) -> Result<(Arc<dyn ChainProvider>, String), GatewayError> {
        let provider = self.read_session().await?;
        let signer = self
            .signer
            .read()
            .await
            .clone()
            .ok_or(GatewayError::SignerNotInitialized)?;
        Ok((provider, signer))
    }

    // -----------------------------------------------------------------------
    // Receivable operations
    // -----------------------------------------------------------------------

    /// Tokenizes a trade receivable. Returns the hash-derived identifier
    /// from the `ReceivableCreated` event.
    pub async fn create_receivable(
        &self,
        importer: &str,
        amount_usd: u128,
        due_date: DateTime<Utc>,
        metadata_cid: &str,
    ) -> Result<CreatedReceivable, GatewayError> {
        let (provider, signer) = self.write_session().await?;
        let call = ContractCall::new(
            &self.addresses.receivable_factory,
            "createReceivable",
            &signer,
            json!({
                "importer": importer,
                "amount_usd": amount_usd.to_string(),
                "due_date": due_date,
                "metadata_cid": metadata_cid,
            }),
        );
        let receipt = provider.submit(call).await?;
        let id = event_str(&receipt, "ReceivableCreated", "receivable_id")?;
        tracing::info!(receivable_id = %id, tx = %receipt.tx_hash, "receivable created");
        Ok(CreatedReceivable {
            receivable_id: id,
            tx_hash: receipt.tx_hash,
        })
    }

    /// AMC verdict on a pending receivable: approve (with risk score and
    /// APR) or reject.
    pub async fn verify_receivable(
        &self,
        receivable_id: &str,
        approved: bool,
        risk_score: u32,
        apr_bps: u64,
    ) -> Result<TxOutcome, GatewayError> {
        let (provider, signer) = self.write_session().await?;
        let call = ContractCall::new(
            &self.addresses.receivable_factory,
            "verifyReceivable",
            &signer,
            json!({
                "receivable_id": receivable_id,
                "approved": approved,
                "risk_score": risk_score,
                "apr_bps": apr_bps,
            }),
        );
        let receipt = provider.submit(call).await?;
        require_event(&receipt, "ReceivableVerified")?;
        Ok(outcome(receipt))
    }

    /// Fetches a single receivable, or `None` if the ID is unknown.
    pub async fn get_receivable(
        &self,
        receivable_id: &str,
    ) -> Result<Option<ReceivableView>, GatewayError> {
        self.view_optional(
            &self.addresses.receivable_factory,
            "getReceivable",
            json!({ "receivable_id": receivable_id }),
        )
        .await
    }

    /// All receivables created by the given exporter.
    pub async fn get_exporter_receivables(
        &self,
        exporter: &str,
    ) -> Result<Vec<ReceivableView>, GatewayError> {
        let provider = self.read_session().await?;
        let value = provider
            .view(ViewCall::new(
                &self.addresses.receivable_factory,
                "receivablesByExporter",
                json!({ "exporter": exporter }),
            ))
            .await?;
        decode("receivablesByExporter", value)
    }

    // -----------------------------------------------------------------------
    // Pool operations
    // -----------------------------------------------------------------------

    /// AMC bundles a verified receivable into an investment pool.
    pub async fn create_pool(
        &self,
        receivable_id: &str,
        target_amount: u128,
        apr_bps: u64,
        maturity_date: DateTime<Utc>,
    ) -> Result<CreatedPool, GatewayError> {
        let (provider, signer) = self.write_session().await?;
        let call = ContractCall::new(
            &self.addresses.pool_manager,
            "createPool",
            &signer,
            json!({
                "receivable_id": receivable_id,
                "target_amount": target_amount.to_string(),
                "apr_bps": apr_bps,
                "maturity_date": maturity_date,
            }),
        );
        let receipt = provider.submit(call).await?;
        let id = event_str(&receipt, "PoolCreated", "pool_id")?;
        tracing::info!(pool_id = %id, tx = %receipt.tx_hash, "pool created");
        Ok(CreatedPool {
            pool_id: id,
            tx_hash: receipt.tx_hash,
        })
    }

    /// Invests USDC into an active pool. Pre-flights a USDC allowance
    /// check and approves the pool manager if the allowance is short.
    pub async fn invest(&self, pool_id: &str, amount: u128) -> Result<TxOutcome, GatewayError> {
        let (provider, signer) = self.write_session().await?;
        self.ensure_allowance(
            &provider,
            &signer,
            &self.addresses.usdc_token,
            &self.addresses.pool_manager,
            amount,
        )
        .await?;

        let call = ContractCall::new(
            &self.addresses.pool_manager,
            "invest",
            &signer,
            json!({ "pool_id": pool_id, "amount": amount.to_string() }),
        );
        let receipt = provider.submit(call).await?;
        require_event(&receipt, "Invested")?;
        Ok(outcome(receipt))
    }

    /// Withdraws a previous investment from a still-active pool.
    pub async fn withdraw(&self, pool_id: &str, amount: u128) -> Result<TxOutcome, GatewayError> {
        let (provider, signer) = self.write_session().await?;
        let call = ContractCall::new(
            &self.addresses.pool_manager,
            "withdraw",
            &signer,
            json!({ "pool_id": pool_id, "amount": amount.to_string() }),
        );
        let receipt = provider.submit(call).await?;
        require_event(&receipt, "Withdrawn")?;
        Ok(outcome(receipt))
    }

    /// AMC records an importer repayment against a pool. The USDC is
    /// pulled from the AMC's address, so this also pre-flights allowance.
    pub async fn record_payment(
        &self,
        pool_id: &str,
        amount: u128,
    ) -> Result<TxOutcome, GatewayError> {
        let (provider, signer) = self.write_session().await?;
        self.ensure_allowance(
            &provider,
            &signer,
            &self.addresses.usdc_token,
            &self.addresses.pool_manager,
            amount,
        )
        .await?;

        let call = ContractCall::new(
            &self.addresses.pool_manager,
            "recordPayment",
            &signer,
            json!({ "pool_id": pool_id, "amount": amount.to_string() }),
        );
        let receipt = provider.submit(call).await?;
        require_event(&receipt, "PaymentRecorded")?;
        Ok(outcome(receipt))
    }

    /// AMC distributes principal + yield to shareholders. The contract
    /// rejects this unless the pool's payment status is FULL.
    pub async fn distribute_yield(&self, pool_id: &str) -> Result<TxOutcome, GatewayError> {
        let (provider, signer) = self.write_session().await?;
        let call = ContractCall::new(
            &self.addresses.pool_manager,
            "distributeYield",
            &signer,
            json!({ "pool_id": pool_id }),
        );
        let receipt = provider.submit(call).await?;
        require_event(&receipt, "YieldDistributed")?;
        Ok(outcome(receipt))
    }

    /// Fetches a single pool, or `None` if the ID is unknown.
    pub async fn get_pool(&self, pool_id: &str) -> Result<Option<PoolView>, GatewayError> {
        self.view_optional(
            &self.addresses.pool_manager,
            "getPool",
            json!({ "pool_id": pool_id }),
        )
        .await
    }

    /// Fetches every pool, paging through results in fixed-size batches
    /// so no single view call is unbounded.
    pub async fn get_all_pools(&self) -> Result<Vec<PoolView>, GatewayError> {
        let provider = self.read_session().await?;
        let mut pools: Vec<PoolView> = Vec::new();
        let mut start: u64 = 0;
        loop {
            let value = provider
                .view(ViewCall::new(
                    &self.addresses.pool_manager,
                    "allPools",
                    json!({ "start": start, "limit": READ_BATCH_SIZE }),
                ))
                .await?;
            let batch: Vec<PoolView> = decode("allPools", value)?;
            let batch_len = batch.len() as u64;
            pools.extend(batch);
            if batch_len < READ_BATCH_SIZE {
                break;
            }
            start += batch_len;
        }
        Ok(pools)
    }

    // -----------------------------------------------------------------------
    // Marketplace operations
    // -----------------------------------------------------------------------

    /// Lists pool shares for sale. Escrows the shares, so the marketplace
    /// needs a pool-token allowance first.
    pub async fn create_listing(
        &self,
        pool_id: &str,
        amount: u128,
        price_per_token: u128,
        min_purchase: u128,
        max_purchase: u128,
        deadline: DateTime<Utc>,
    ) -> Result<CreatedListing, GatewayError> {
        let (provider, signer) = self.write_session().await?;
        self.ensure_allowance(
            &provider,
            &signer,
            &self.addresses.pool_token,
            &self.addresses.marketplace,
            amount,
        )
        .await?;

        let call = ContractCall::new(
            &self.addresses.marketplace,
            "createListing",
            &signer,
            json!({
                "pool_id": pool_id,
                "amount": amount.to_string(),
                "price_per_token": price_per_token.to_string(),
                "min_purchase": min_purchase.to_string(),
                "max_purchase": max_purchase.to_string(),
                "deadline": deadline,
            }),
        );
        let receipt = provider.submit(call).await?;
        let id = event_str(&receipt, "ListingCreated", "listing_id")?;
        Ok(CreatedListing {
            listing_id: id,
            tx_hash: receipt.tx_hash,
        })
    }

    /// Buys shares from a listing. Computes the USDC cost from the listed
    /// price and pre-flights the buyer's USDC allowance.
    pub async fn buy_tokens(
        &self,
        listing_id: &str,
        amount: u128,
    ) -> Result<TxOutcome, GatewayError> {
        let (provider, signer) = self.write_session().await?;

        let listing = self
            .get_listing(listing_id)
            .await?
            .ok_or_else(|| GatewayError::BadViewResponse {
                method: "getListing".into(),
                reason: format!("listing {listing_id} not found"),
            })?;
        let cost = amount
            .checked_mul(listing.price_per_token)
            .map(|c| c / ONE_SHARE)
            .ok_or(crate::amount::AmountError::Overflow)?;

        self.ensure_allowance(
            &provider,
            &signer,
            &self.addresses.usdc_token,
            &self.addresses.marketplace,
            cost,
        )
        .await?;

        let call = ContractCall::new(
            &self.addresses.marketplace,
            "buyTokens",
            &signer,
            json!({ "listing_id": listing_id, "amount": amount.to_string() }),
        );
        let receipt = provider.submit(call).await?;
        require_event(&receipt, "TokensPurchased")?;
        Ok(outcome(receipt))
    }

    /// Cancels a listing and reclaims the escrowed shares. Seller only.
    pub async fn cancel_listing(&self, listing_id: &str) -> Result<TxOutcome, GatewayError> {
        let (provider, signer) = self.write_session().await?;
        let call = ContractCall::new(
            &self.addresses.marketplace,
            "cancelListing",
            &signer,
            json!({ "listing_id": listing_id }),
        );
        let receipt = provider.submit(call).await?;
        require_event(&receipt, "ListingCancelled")?;
        Ok(outcome(receipt))
    }

    /// Fetches a single listing, or `None` if the ID is unknown.
    pub async fn get_listing(
        &self,
        listing_id: &str,
    ) -> Result<Option<ListingView>, GatewayError> {
        self.view_optional(
            &self.addresses.marketplace,
            "getListing",
            json!({ "listing_id": listing_id }),
        )
        .await
    }

    // -----------------------------------------------------------------------
    // Token helpers
    // -----------------------------------------------------------------------

    /// Reads an ERC-20 balance.
    pub async fn balance_of(&self, token: &str, address: &str) -> Result<u128, GatewayError> {
        let provider = self.read_session().await?;
        let value = provider
            .view(ViewCall::new(
                token,
                "balanceOf",
                json!({ "address": address }),
            ))
            .await?;
        decode_amount("balanceOf", &value)
    }

    /// Checks the owner → spender allowance on `token` and submits an
    /// `approve` transaction when it is below `required`.
    async fn ensure_allowance(
        &self,
        provider: &Arc<dyn ChainProvider>,
        owner: &str,
        token: &str,
        spender: &str,
        required: u128,
    ) -> Result<(), GatewayError> {
        let value = provider
            .view(ViewCall::new(
                token,
                "allowance",
                json!({ "owner": owner, "spender": spender }),
            ))
            .await?;
        let current = decode_amount("allowance", &value)?;
        if current >= required {
            return Ok(());
        }

        tracing::debug!(token, spender, required, current, "approving spender");
        let call = ContractCall::new(
            token,
            "approve",
            owner,
            json!({ "spender": spender, "amount": required.to_string() }),
        );
        let receipt = provider.submit(call).await?;
        require_event(&receipt, "Approval")?;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // View plumbing
    // -----------------------------------------------------------------------

    async fn view_optional<T: DeserializeOwned>(
        &self,
        contract: &str,
        method: &str,
        params: serde_json::Value,
    ) -> Result<Option<T>, GatewayError> {
        let provider = self.read_session().await?;
        let value = provider.view(ViewCall::new(contract, method, params)).await?;
        if value.is_null() {
            return Ok(None);
        }
        decode(method, value).map(Some)
    }
}

// ---------------------------------------------------------------------------
// Decode helpers
// ---------------------------------------------------------------------------

fn decode<T: DeserializeOwned>(method: &str, value: serde_json::Value) -> Result<T, GatewayError> {
    serde_json::from_value(value).map_err(|e| GatewayError::BadViewResponse {
        method: method.to_string(),
        reason: e.to_string(),
    })
}

fn decode_amount(method: &str, value: &serde_json::Value) -> Result<u128, GatewayError> {
    value
        .as_str()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| GatewayError::BadViewResponse {
            method: method.to_string(),
            reason: format!("expected string-encoded amount, got {value}"),
        })
}

fn require_event<'r>(
    receipt: &'r TransactionReceipt,
    name: &str,
) -> Result<&'r EventLog, GatewayError> {
    receipt
        .find_event(name)
        .ok_or_else(|| GatewayError::EventNotFound {
            event: name.to_string(),
        })
}

fn event_str(
    receipt: &TransactionReceipt,
    event: &str,
    field: &str,
) -> Result<String, GatewayError> {
    let log = require_event(receipt, event)?;
    log.str_field(field)
        .map(str::to_string)
        .ok_or_else(|| GatewayError::MalformedEvent {
            event: event.to_string(),
            field: field.to_string(),
        })
}

fn outcome(receipt: TransactionReceipt) -> TxOutcome {
    TxOutcome {
        tx_hash: receipt.tx_hash,
        block_height: receipt.block_height,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::ChainError;
    use async_trait::async_trait;
    use parking_lot::Mutex;

    /// A scripted provider: canned view responses by method name, canned
    /// receipts by method name, and a log of every submitted call.
    #[derive(Default)]
    struct StubProvider {
        views: Mutex<std::collections::HashMap<String, Vec<serde_json::Value>>>,
        receipts: Mutex<std::collections::HashMap<String, TransactionReceipt>>,
        submitted: Mutex<Vec<ContractCall>>,
    }

    impl StubProvider {
        fn with_view(self, method: &str, value: serde_json::Value) -> Self {
            self.views
                .lock()
                .entry(method.to_string())
                .or_default()
                .push(value);
            self
        }

        fn with_receipt(self, method: &str, logs: Vec<EventLog>) -> Self {
            self.receipts.lock().insert(
                method.to_string(),
                TransactionReceipt {
                    tx_hash: format!("0xtx_{method}"),
                    block_height: 7,
                    timestamp: 1_700_000_000_000,
                    logs,
                },
            );
            self
        }

        fn submitted_methods(&self) -> Vec<String> {
            self.submitted.lock().iter().map(|c| c.method.clone()).collect()
        }
    }

    #[async_trait]
    impl ChainProvider for StubProvider {
        async fn submit(&self, call: ContractCall) -> Result<TransactionReceipt, ChainError> {
            let receipt = self
                .receipts
                .lock()
                .get(&call.method)
                .cloned()
                .ok_or_else(|| ChainError::Revert(format!("no receipt scripted for {}", call.method)))?;
            self.submitted.lock().push(call);
            Ok(receipt)
        }

        async fn view(&self, call: ViewCall) -> Result<serde_json::Value, ChainError> {
            let mut views = self.views.lock();
            let queue = views
                .get_mut(&call.method)
                .ok_or_else(|| ChainError::Rpc(format!("no view scripted for {}", call.method)))?;
            if queue.len() > 1 {
                Ok(queue.remove(0))
            } else {
                Ok(queue[0].clone())
            }
        }

        async fn chain_id_hex(&self) -> Result<String, ChainError> {
            Ok(crate::config::CHAIN_ID_HEX.to_string())
        }
    }

    async fn service_with(provider: StubProvider) -> (ContractService, Arc<StubProvider>) {
        let provider = Arc::new(provider);
        let service = ContractService::new(AddressBook::devnet());
        service
            .initialize(provider.clone() as Arc<dyn ChainProvider>, "0xsigner")
            .await;
        (service, provider)
    }

    fn created_event() -> Vec<EventLog> {
        vec![EventLog::new(
            "ReceivableCreated",
            "0xfactory",
            json!({ "receivable_id": "0xrecv42" }),
        )]
    }

    #[tokio::test]
    async fn create_receivable_decodes_id_from_event() {
        let (service, _) =
            service_with(StubProvider::default().with_receipt("createReceivable", created_event()))
                .await;

        let created = service
            .create_receivable("0ximporter", 1_000_000, Utc::now(), "QmCid")
            .await
            .unwrap();
        assert_eq!(created.receivable_id, "0xrecv42");
        assert_eq!(created.tx_hash, "0xtx_createReceivable");
    }

    #[tokio::test]
    async fn missing_event_is_an_integration_error() {
        // Receipt confirms but carries no ReceivableCreated log.
        let (service, _) =
            service_with(StubProvider::default().with_receipt("createReceivable", vec![])).await;

        let err = service
            .create_receivable("0ximporter", 1_000_000, Utc::now(), "QmCid")
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::EventNotFound { event } if event == "ReceivableCreated"));
    }

    #[tokio::test]
    async fn writes_require_a_signer() {
        let service = ContractService::new(AddressBook::devnet());
        let provider = Arc::new(StubProvider::default());
        service
            .connect_provider(provider as Arc<dyn ChainProvider>)
            .await;

        let err = service.distribute_yield("0xpool").await.unwrap_err();
        assert!(matches!(err, GatewayError::SignerNotInitialized));
    }

    #[tokio::test]
    async fn reads_require_a_provider() {
        let service = ContractService::new(AddressBook::devnet());
        let err = service.get_pool("0xpool").await.unwrap_err();
        assert!(matches!(err, GatewayError::ProviderNotInitialized));
    }

    #[tokio::test]
    async fn invest_approves_when_allowance_short() {
        let provider = StubProvider::default()
            .with_view("allowance", json!("0"))
            .with_receipt(
                "approve",
                vec![EventLog::new("Approval", "0xusdc", json!({}))],
            )
            .with_receipt(
                "invest",
                vec![EventLog::new("Invested", "0xpool", json!({}))],
            );
        let (service, provider) = service_with(provider).await;

        service.invest("0xpool", 5_000_000).await.unwrap();
        assert_eq!(provider.submitted_methods(), vec!["approve", "invest"]);
    }

    #[tokio::test]
    async fn invest_skips_approval_when_allowance_sufficient() {
        let provider = StubProvider::default()
            .with_view("allowance", json!("10000000"))
            .with_receipt(
                "invest",
                vec![EventLog::new("Invested", "0xpool", json!({}))],
            );
        let (service, provider) = service_with(provider).await;

        service.invest("0xpool", 5_000_000).await.unwrap();
        assert_eq!(provider.submitted_methods(), vec!["invest"]);
    }

    #[tokio::test]
    async fn get_all_pools_pages_through_batches() {
        fn pool(i: usize) -> serde_json::Value {
            json!({
                "pool_id": format!("0xpool{i}"),
                "receivable_id": "0xrecv",
                "target_amount": "1000000",
                "total_invested": "0",
                "total_paid": "0",
                "apr_bps": 800,
                "maturity_date": "2026-12-31T00:00:00Z",
                "status": "Active",
                "payment_status": "Pending",
            })
        }
        let full: Vec<_> = (0..READ_BATCH_SIZE as usize).map(pool).collect();
        let partial: Vec<_> = (0..20).map(pool).collect();
        let provider = StubProvider::default()
            .with_view("allPools", json!(full))
            .with_view("allPools", json!(partial));
        let (service, _) = service_with(provider).await;

        let pools = service.get_all_pools().await.unwrap();
        assert_eq!(pools.len(), READ_BATCH_SIZE as usize + 20);
    }

    #[tokio::test]
    async fn missing_pool_reads_as_none() {
        let provider = StubProvider::default().with_view("getPool", serde_json::Value::Null);
        let (service, _) = service_with(provider).await;
        assert!(service.get_pool("0xnope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn buy_tokens_approves_cost_not_share_count() {
        let listing = json!({
            "listing_id": "0xlist1",
            "seller": "0xseller",
            "pool_id": "0xpool",
            "amount": "2000000000000000000",
            "remaining": "2000000000000000000",
            "price_per_token": "950000",
            "min_purchase": "0",
            "max_purchase": "2000000000000000000",
            "deadline": "2026-12-31T00:00:00Z",
            "active": true,
        });
        let provider = StubProvider::default()
            .with_view("getListing", listing)
            .with_view("allowance", json!("0"))
            .with_receipt(
                "approve",
                vec![EventLog::new("Approval", "0xusdc", json!({}))],
            )
            .with_receipt(
                "buyTokens",
                vec![EventLog::new("TokensPurchased", "0xmkt", json!({}))],
            );
        let (service, provider) = service_with(provider).await;

        // Two whole shares at 0.95 USDC each.
        service
            .buy_tokens("0xlist1", 2_000_000_000_000_000_000)
            .await
            .unwrap();

        let submitted = provider.submitted.lock();
        let approve = submitted.iter().find(|c| c.method == "approve").unwrap();
        assert_eq!(approve.params["amount"], "1900000");
    }

    #[tokio::test]
    async fn provider_is_replaceable_at_any_time() {
        let (service, _) =
            service_with(StubProvider::default().with_receipt("createReceivable", created_event()))
                .await;

        // Swap in a provider whose receipt carries a different ID.
        let replacement = Arc::new(StubProvider::default().with_receipt(
            "createReceivable",
            vec![EventLog::new(
                "ReceivableCreated",
                "0xfactory",
                json!({ "receivable_id": "0xother" }),
            )],
        ));
        service
            .initialize(replacement as Arc<dyn ChainProvider>, "0xnewsigner")
            .await;

        let created = service
            .create_receivable("0ximporter", 1, Utc::now(), "QmCid")
            .await
            .unwrap();
        assert_eq!(created.receivable_id, "0xother");
    }
}
