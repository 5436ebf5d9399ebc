//! Integration tests for the receivable → pool → yield lifecycle.
//!
//! These drive the contract gateway end to end over the local execution
//! environment, exactly as the node does: every operation goes through
//! `ContractService`, which submits transactions, decodes event logs,
//! and runs the allowance pre-flights. No contract state is touched
//! directly.

use std::sync::Arc;

use chrono::{Duration, Utc};
use novax_contracts::chain::LocalChain;
use novax_protocol::chain::{ChainError, ChainProvider};
use novax_protocol::gateway::{AddressBook, ContractService, GatewayError};

const AMC: &str = "0xamc";
const EXPORTER: &str = "0xexporter";
const IMPORTER: &str = "0ximporter";
const ALICE: &str = "0xalice";
const BOB: &str = "0xbob";

const HUNDRED_USDC: u128 = 100_000_000;
const THOUSAND_USDC: u128 = 1_000_000_000;

struct Harness {
    chain: Arc<LocalChain>,
    service: ContractService,
}

impl Harness {
    async fn new() -> Self {
        let chain = Arc::new(LocalChain::new(AddressBook::devnet(), AMC));
        for account in [ALICE, BOB, AMC] {
            chain.faucet_mint(account, THOUSAND_USDC).unwrap();
        }
        let service = ContractService::new(AddressBook::devnet());
        service
            .initialize(chain.clone() as Arc<dyn ChainProvider>, EXPORTER)
            .await;
        Harness { chain, service }
    }

    /// Re-signs the gateway as a different actor, the way the web app
    /// does on wallet account change.
    async fn sign_as(&self, actor: &str) {
        self.service
            .initialize(self.chain.clone() as Arc<dyn ChainProvider>, actor)
            .await;
    }

    /// Exporter creates, AMC verifies, AMC opens a pool. Returns
    /// (receivable_id, pool_id).
    async fn verified_pool(&self, apr_bps: u64) -> (String, String) {
        let created = self
            .service
            .create_receivable(
                IMPORTER,
                HUNDRED_USDC,
                Utc::now() + Duration::days(90),
                "QmInvoiceDocs",
            )
            .await
            .unwrap();

        self.sign_as(AMC).await;
        self.service
            .verify_receivable(&created.receivable_id, true, 30, apr_bps)
            .await
            .unwrap();
        let pool = self
            .service
            .create_pool(
                &created.receivable_id,
                HUNDRED_USDC,
                apr_bps,
                Utc::now() + Duration::days(90),
            )
            .await
            .unwrap();
        (created.receivable_id, pool.pool_id)
    }

    async fn usdc_balance(&self, address: &str) -> u128 {
        self.service
            .balance_of(&self.service.addresses().usdc_token, address)
            .await
            .unwrap()
    }
}

#[tokio::test]
async fn full_lifecycle_from_invoice_to_yield() {
    let h = Harness::new().await;

    // 1. Exporter tokenizes the invoice.
    let created = h
        .service
        .create_receivable(
            IMPORTER,
            HUNDRED_USDC,
            Utc::now() + Duration::days(90),
            "QmInvoiceDocs",
        )
        .await
        .unwrap();
    let receivable = h
        .service
        .get_receivable(&created.receivable_id)
        .await
        .unwrap()
        .expect("just created");
    assert_eq!(receivable.status, "Pending");
    assert_eq!(receivable.amount_usd, HUNDRED_USDC);
    assert_eq!(receivable.exporter, EXPORTER);

    // 2. AMC verifies with a risk score and APR.
    h.sign_as(AMC).await;
    h.service
        .verify_receivable(&created.receivable_id, true, 30, 800)
        .await
        .unwrap();
    let receivable = h
        .service
        .get_receivable(&created.receivable_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(receivable.status, "Verified");
    assert_eq!(receivable.risk_score, Some(30));
    assert_eq!(receivable.apr_bps, Some(800));

    // 3. AMC opens a pool at the invoice amount.
    let pool = h
        .service
        .create_pool(
            &created.receivable_id,
            HUNDRED_USDC,
            800,
            Utc::now() + Duration::days(90),
        )
        .await
        .unwrap();

    // 4. Two investors fund it. The gateway handles the USDC approvals.
    h.sign_as(ALICE).await;
    h.service.invest(&pool.pool_id, 60_000_000).await.unwrap();
    h.sign_as(BOB).await;
    h.service.invest(&pool.pool_id, 40_000_000).await.unwrap();

    let view = h.service.get_pool(&pool.pool_id).await.unwrap().unwrap();
    assert_eq!(view.status, "Funded");
    assert_eq!(view.total_invested, HUNDRED_USDC);

    // 5. AMC records the importer's repayment: principal plus 8%.
    h.sign_as(AMC).await;
    h.service
        .record_payment(&pool.pool_id, 108_000_000)
        .await
        .unwrap();
    let view = h.service.get_pool(&pool.pool_id).await.unwrap().unwrap();
    assert_eq!(view.payment_status, "Full");
    assert_eq!(view.status, "Paid");

    // Full repayment retires the underlying receivable.
    let receivable = h
        .service
        .get_receivable(&created.receivable_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(receivable.status, "Paid");

    // 6. Distribution pays principal + yield pro rata.
    let alice_before = h.usdc_balance(ALICE).await;
    let bob_before = h.usdc_balance(BOB).await;
    h.service.distribute_yield(&pool.pool_id).await.unwrap();

    assert_eq!(h.usdc_balance(ALICE).await - alice_before, 64_800_000);
    assert_eq!(h.usdc_balance(BOB).await - bob_before, 43_200_000);

    let view = h.service.get_pool(&pool.pool_id).await.unwrap().unwrap();
    assert_eq!(view.status, "Closed");
}

#[tokio::test]
async fn investor_can_withdraw_until_the_pool_funds() {
    let h = Harness::new().await;
    let (_, pool_id) = h.verified_pool(800).await;

    h.sign_as(ALICE).await;
    h.service.invest(&pool_id, 50_000_000).await.unwrap();

    let before = h.usdc_balance(ALICE).await;
    h.service.withdraw(&pool_id, 20_000_000).await.unwrap();
    assert_eq!(h.usdc_balance(ALICE).await - before, 20_000_000);

    // Fund to target; the remaining capital is committed.
    h.service.invest(&pool_id, 70_000_000).await.unwrap();
    let err = h.service.withdraw(&pool_id, 10_000_000).await.unwrap_err();
    assert!(
        matches!(err, GatewayError::Chain(ChainError::Revert(ref reason)) if reason.contains("withdraw")),
        "unexpected error: {err}"
    );
}

#[tokio::test]
async fn rejected_receivable_cannot_back_a_pool() {
    let h = Harness::new().await;
    let created = h
        .service
        .create_receivable(
            IMPORTER,
            HUNDRED_USDC,
            Utc::now() + Duration::days(90),
            "QmDocs",
        )
        .await
        .unwrap();

    h.sign_as(AMC).await;
    h.service
        .verify_receivable(&created.receivable_id, false, 0, 0)
        .await
        .unwrap();

    let err = h
        .service
        .create_pool(
            &created.receivable_id,
            HUNDRED_USDC,
            800,
            Utc::now() + Duration::days(90),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, GatewayError::Chain(ChainError::Revert(_))));
}

#[tokio::test]
async fn distribution_rejected_while_payments_partial() {
    let h = Harness::new().await;
    let (_, pool_id) = h.verified_pool(800).await;

    h.sign_as(ALICE).await;
    h.service.invest(&pool_id, HUNDRED_USDC).await.unwrap();

    h.sign_as(AMC).await;
    h.service.record_payment(&pool_id, 50_000_000).await.unwrap();
    let err = h.service.distribute_yield(&pool_id).await.unwrap_err();
    assert!(
        matches!(err, GatewayError::Chain(ChainError::Revert(ref reason)) if reason.contains("incomplete")),
        "unexpected error: {err}"
    );
}

#[tokio::test]
async fn non_amc_callers_cannot_verify_or_record() {
    let h = Harness::new().await;
    let created = h
        .service
        .create_receivable(
            IMPORTER,
            HUNDRED_USDC,
            Utc::now() + Duration::days(90),
            "QmDocs",
        )
        .await
        .unwrap();

    // Still signed as the exporter.
    let err = h
        .service
        .verify_receivable(&created.receivable_id, true, 10, 500)
        .await
        .unwrap_err();
    assert!(matches!(err, GatewayError::Chain(ChainError::Revert(_))));
}

#[tokio::test]
async fn exporter_index_tracks_their_receivables_only() {
    let h = Harness::new().await;
    for _ in 0..3 {
        h.service
            .create_receivable(
                IMPORTER,
                HUNDRED_USDC,
                Utc::now() + Duration::days(90),
                "QmDocs",
            )
            .await
            .unwrap();
    }

    let mine = h.service.get_exporter_receivables(EXPORTER).await.unwrap();
    assert_eq!(mine.len(), 3);
    assert!(mine.iter().all(|r| r.exporter == EXPORTER));

    let theirs = h.service.get_exporter_receivables(ALICE).await.unwrap();
    assert!(theirs.is_empty());
}

#[tokio::test]
async fn all_pools_view_lists_every_pool() {
    let h = Harness::new().await;
    let mut created_ids = Vec::new();
    for _ in 0..3 {
        h.sign_as(EXPORTER).await;
        let (_, pool_id) = h.verified_pool(500).await;
        created_ids.push(pool_id);
    }

    let pools = h.service.get_all_pools().await.unwrap();
    assert_eq!(pools.len(), 3);
    let listed: Vec<_> = pools.iter().map(|p| p.pool_id.clone()).collect();
    for id in created_ids {
        assert!(listed.contains(&id));
    }
}
