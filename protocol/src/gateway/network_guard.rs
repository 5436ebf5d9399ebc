//! # Network Guard
//!
//! Ensures a browser-injected wallet is pointed at the correct chain before
//! any signature is requested. The target network suffers a known
//! client-side quirk: the same network can be registered under two chain
//! IDs, and the wallet reports whichever entry it activated. Both IDs are
//! accepted, and both are tried when switching.
//!
//! The escalation ladder on a mismatch, each rung a fresh wallet prompt:
//!
//! 1. `wallet_switchEthereumChain` to the primary ID.
//! 2. `wallet_addEthereumChain` with the full network parameters.
//! 3. `wallet_switchEthereumChain` to the alternate ID.
//!
//! If all three fail, the caller gets one descriptive error asking the
//! user to switch manually. The guard never silently proceeds on the
//! wrong network for a write operation.
//!
//! ## Concurrency
//!
//! Multiple page components can demand the right network at once (connect
//! button, invest form, a polling loop). A single shared in-flight future
//! is the lock: the first mismatched caller starts the switch attempt and
//! every concurrent caller awaits that same future, so the wallet is never
//! prompted twice for one mismatch.

use futures::future::{BoxFuture, FutureExt, Shared};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;

use crate::config;

use super::wallet::{AddChainParams, WalletError, WalletProvider};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors from the network guard. Clone because the shared in-flight
/// future hands the same result to every awaiting caller.
#[derive(Debug, Clone, Error)]
pub enum NetworkGuardError {
    /// The wallet could not even report its chain ID.
    #[error("wallet unavailable: {0}")]
    WalletUnavailable(String),

    /// Every switch strategy failed. The message is user-facing.
    #[error("unable to switch to {network}: {reason}. Please switch your wallet to {network} manually and try again")]
    SwitchFailed {
        /// The network the user must switch to.
        network: String,
        /// Why the automatic attempts failed.
        reason: String,
    },
}

type SwitchFuture = Shared<BoxFuture<'static, Result<(), NetworkGuardError>>>;

// ---------------------------------------------------------------------------
// NetworkGuard
// ---------------------------------------------------------------------------

/// Guards write operations behind a chain-ID check with automatic
/// switch/add fallback.
pub struct NetworkGuard {
    wallet: Arc<dyn WalletProvider>,
    accepted: [String; 2],
    inflight: Mutex<Option<SwitchFuture>>,
}

impl NetworkGuard {
    /// Creates a guard over the given wallet, accepting the protocol's
    /// two known chain-ID representations.
    pub fn new(wallet: Arc<dyn WalletProvider>) -> Self {
        let [primary, alternate] = config::accepted_chain_ids();
        Self::with_accepted_ids(wallet, primary, alternate)
    }

    /// Creates a guard with explicit accepted IDs. Exposed for tests and
    /// non-default deployments.
    pub fn with_accepted_ids(
        wallet: Arc<dyn WalletProvider>,
        primary: impl Into<String>,
        alternate: impl Into<String>,
    ) -> Self {
        Self {
            wallet,
            accepted: [
                primary.into().to_ascii_lowercase(),
                alternate.into().to_ascii_lowercase(),
            ],
            inflight: Mutex::new(None),
        }
    }

    fn is_accepted(&self, chain_id_hex: &str) -> bool {
        let normalized = chain_id_hex.to_ascii_lowercase();
        self.accepted.iter().any(|id| *id == normalized)
    }

    /// Resolves once the wallet reports an accepted chain ID.
    ///
    /// Embedded wallets skip the check entirely — they are provisioned
    /// with the correct network and expose no switching UI. For injected
    /// wallets already on an accepted chain, resolves without prompting.
    pub async fn ensure_network(&self) -> Result<(), NetworkGuardError> {
        if self.wallet.is_embedded() {
            tracing::debug!("embedded wallet, skipping network check");
            return Ok(());
        }

        let current = self
            .wallet
            .chain_id_hex()
            .await
            .map_err(|e| NetworkGuardError::WalletUnavailable(e.to_string()))?;

        if self.is_accepted(&current) {
            return Ok(());
        }

        tracing::info!(
            current = %current,
            required = %self.accepted[0],
            "wallet on wrong network, attempting switch"
        );

        // Join an in-flight attempt if one exists; otherwise start one.
        let shared = {
            let mut slot = self.inflight.lock().await;
            match slot.as_ref() {
                Some(existing) => existing.clone(),
                None => {
                    let wallet = Arc::clone(&self.wallet);
                    let [primary, alternate] = self.accepted.clone();
                    let fut = attempt_switch(wallet, primary, alternate)
                        .boxed()
                        .shared();
                    *slot = Some(fut.clone());
                    fut
                }
            }
        };

        let result = shared.clone().await;

        // Clear the slot so the next mismatch starts fresh, but only if it
        // still holds *this* attempt — another caller may have raced ahead.
        let mut slot = self.inflight.lock().await;
        if slot.as_ref().is_some_and(|f| f.ptr_eq(&shared)) {
            *slot = None;
        }

        result
    }
}

/// The switch → add → alternate-switch ladder. Each step is a new wallet
/// UI prompt, so this runs at most once per mismatch (see the shared
/// in-flight future above).
async fn attempt_switch(
    wallet: Arc<dyn WalletProvider>,
    primary: String,
    alternate: String,
) -> Result<(), NetworkGuardError> {
    let first_err = match wallet.switch_chain(&primary).await {
        Ok(()) => return Ok(()),
        Err(e) => e,
    };
    tracing::warn!(error = %first_err, "switch to primary chain id failed, trying add");

    let add_err = match wallet.add_chain(&AddChainParams::target_network()).await {
        Ok(()) => return Ok(()),
        Err(e) => e,
    };
    tracing::warn!(error = %add_err, "add network failed, trying alternate chain id");

    match wallet.switch_chain(&alternate).await {
        Ok(()) => Ok(()),
        Err(last_err) => Err(NetworkGuardError::SwitchFailed {
            network: config::NETWORK_NAME.to_string(),
            reason: format!(
                "switch: {first_err}; add: {add_err}; alternate switch: {last_err}"
            ),
        }),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    /// A scriptable wallet: reports `chain_id`, counts prompts, and can be
    /// configured to fail each rung of the ladder.
    struct MockWallet {
        chain_id: parking_lot::Mutex<String>,
        embedded: bool,
        fail_switch_primary: bool,
        fail_add: bool,
        fail_switch_alternate: bool,
        switch_delay: Duration,
        switch_calls: AtomicU32,
        add_calls: AtomicU32,
        chain_id_reads: AtomicU32,
    }

    impl MockWallet {
        fn on_chain(id: &str) -> Self {
            Self {
                chain_id: parking_lot::Mutex::new(id.to_string()),
                embedded: false,
                fail_switch_primary: false,
                fail_add: false,
                fail_switch_alternate: false,
                switch_delay: Duration::ZERO,
                switch_calls: AtomicU32::new(0),
                add_calls: AtomicU32::new(0),
                chain_id_reads: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl WalletProvider for MockWallet {
        async fn chain_id_hex(&self) -> Result<String, WalletError> {
            self.chain_id_reads.fetch_add(1, Ordering::SeqCst);
            Ok(self.chain_id.lock().clone())
        }

        async fn switch_chain(&self, chain_id_hex: &str) -> Result<(), WalletError> {
            let nth = self.switch_calls.fetch_add(1, Ordering::SeqCst) + 1;
            tokio::time::sleep(self.switch_delay).await;
            if nth == 1 && self.fail_switch_primary {
                return Err(WalletError::UnrecognizedChain(chain_id_hex.to_string()));
            }
            if nth > 1 && self.fail_switch_alternate {
                return Err(WalletError::UserRejected);
            }
            *self.chain_id.lock() = chain_id_hex.to_string();
            Ok(())
        }

        async fn add_chain(&self, params: &AddChainParams) -> Result<(), WalletError> {
            self.add_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_add {
                return Err(WalletError::UserRejected);
            }
            *self.chain_id.lock() = params.chain_id_hex.clone();
            Ok(())
        }

        fn is_embedded(&self) -> bool {
            self.embedded
        }
    }

    fn guard(wallet: MockWallet) -> (NetworkGuard, Arc<MockWallet>) {
        let wallet = Arc::new(wallet);
        let guard =
            NetworkGuard::with_accepted_ids(wallet.clone() as Arc<dyn WalletProvider>, "0x1f47b", "0xa515");
        (guard, wallet)
    }

    #[tokio::test]
    async fn accepted_primary_id_resolves_without_prompting() {
        let (g, w) = guard(MockWallet::on_chain("0x1f47b"));
        g.ensure_network().await.unwrap();
        assert_eq!(w.switch_calls.load(Ordering::SeqCst), 0);
        assert_eq!(w.add_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn accepted_alternate_id_resolves_without_prompting() {
        let (g, w) = guard(MockWallet::on_chain("0xA515")); // uppercase quirk
        g.ensure_network().await.unwrap();
        assert_eq!(w.switch_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn embedded_wallet_skips_check_entirely() {
        let mut wallet = MockWallet::on_chain("0x1"); // wrong chain, doesn't matter
        wallet.embedded = true;
        let (g, w) = guard(wallet);
        g.ensure_network().await.unwrap();
        assert_eq!(w.chain_id_reads.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn mismatch_triggers_single_switch() {
        let (g, w) = guard(MockWallet::on_chain("0x1"));
        g.ensure_network().await.unwrap();
        assert_eq!(w.switch_calls.load(Ordering::SeqCst), 1);
        assert_eq!(w.add_calls.load(Ordering::SeqCst), 0);
        assert_eq!(*w.chain_id.lock(), "0x1f47b");
    }

    #[tokio::test]
    async fn switch_failure_falls_back_to_add() {
        let mut wallet = MockWallet::on_chain("0x1");
        wallet.fail_switch_primary = true;
        let (g, w) = guard(wallet);
        g.ensure_network().await.unwrap();
        assert_eq!(w.switch_calls.load(Ordering::SeqCst), 1);
        assert_eq!(w.add_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn add_failure_falls_back_to_alternate_switch() {
        let mut wallet = MockWallet::on_chain("0x1");
        wallet.fail_switch_primary = true;
        wallet.fail_add = true;
        let (g, w) = guard(wallet);
        g.ensure_network().await.unwrap();
        assert_eq!(w.switch_calls.load(Ordering::SeqCst), 2);
        assert_eq!(*w.chain_id.lock(), "0xa515");
    }

    #[tokio::test]
    async fn total_failure_yields_manual_switch_guidance() {
        let mut wallet = MockWallet::on_chain("0x1");
        wallet.fail_switch_primary = true;
        wallet.fail_add = true;
        wallet.fail_switch_alternate = true;
        let (g, _) = guard(wallet);
        let err = g.ensure_network().await.unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("manually"), "got: {msg}");
    }

    #[tokio::test]
    async fn concurrent_callers_share_one_switch_attempt() {
        let mut wallet = MockWallet::on_chain("0x1");
        wallet.switch_delay = Duration::from_millis(50);
        let wallet = Arc::new(wallet);
        let g = Arc::new(NetworkGuard::with_accepted_ids(
            wallet.clone() as Arc<dyn WalletProvider>,
            "0x1f47b",
            "0xa515",
        ));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let g = Arc::clone(&g);
            handles.push(tokio::spawn(async move { g.ensure_network().await }));
        }
        for h in handles {
            h.await.unwrap().unwrap();
        }

        // Eight callers, one wallet prompt.
        assert_eq!(wallet.switch_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn guard_recovers_after_failed_attempt() {
        let mut wallet = MockWallet::on_chain("0x1");
        wallet.fail_switch_primary = true;
        wallet.fail_add = true;
        wallet.fail_switch_alternate = true;
        let (g, w) = guard(wallet);

        assert!(g.ensure_network().await.is_err());

        // User fixes it manually; the guard must not be stuck on the old
        // failed attempt.
        *w.chain_id.lock() = "0x1f47b".to_string();
        g.ensure_network().await.unwrap();
    }
}
