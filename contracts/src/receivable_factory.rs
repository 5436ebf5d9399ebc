//! # Receivable Factory Contract
//!
//! Exporters tokenize trade invoices here. A receivable starts PENDING;
//! the asset management company (AMC) reviews the supporting documents
//! off-chain and either verifies it — assigning a risk score and an APR —
//! or rejects it. Verified receivables can back investment pools; once
//! the backing pool is fully repaid the receivable is marked PAID.
//!
//! Identifiers are content-addressed: a blake3 hash over the creator, the
//! obligor, and a per-exporter nonce, so two invoices from the same
//! exporter never collide and the id is stable across replays.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors from receivable factory operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReceivableError {
    /// The referenced receivable does not exist.
    #[error("receivable not found: {0}")]
    NotFound(String),

    /// The caller is not the AMC.
    #[error("unauthorized: only the AMC can verify receivables")]
    UnauthorizedVerify,

    /// Verification attempted on a receivable that is not PENDING.
    #[error("receivable {id} is {status}, not pending")]
    NotPending {
        /// The receivable in question.
        id: String,
        /// Its current status.
        status: ReceivableStatus,
    },

    /// The invoice amount is zero.
    #[error("invoice amount must be positive")]
    ZeroAmount,

    /// The due date is not in the future.
    #[error("due date must be in the future")]
    DueDatePassed,

    /// A risk score outside 0..=100.
    #[error("risk score {0} out of range (0-100)")]
    RiskScoreOutOfRange(u32),
}

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Lifecycle of a tokenized receivable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReceivableStatus {
    /// Created, awaiting AMC review.
    Pending,
    /// Approved by the AMC with a risk score and APR. Terminal for review,
    /// but moves to [`Paid`](Self::Paid) once the backing pool settles.
    Verified,
    /// Rejected by the AMC. Terminal.
    Rejected,
    /// The backing pool has been fully repaid. Terminal.
    Paid,
}

impl std::fmt::Display for ReceivableStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReceivableStatus::Pending => write!(f, "Pending"),
            ReceivableStatus::Verified => write!(f, "Verified"),
            ReceivableStatus::Rejected => write!(f, "Rejected"),
            ReceivableStatus::Paid => write!(f, "Paid"),
        }
    }
}

/// A tokenized trade receivable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Receivable {
    /// Hash-derived identifier.
    pub id: String,
    /// Exporter (creator) address.
    pub exporter: String,
    /// Importer (obligor) address.
    pub importer: String,
    /// Invoice amount in 6-decimal USDC units.
    pub amount_usd: u128,
    /// Invoice due date.
    pub due_date: DateTime<Utc>,
    /// Lifecycle status.
    pub status: ReceivableStatus,
    /// AMC-assigned risk score (0-100), present once verified.
    pub risk_score: Option<u32>,
    /// AMC-assigned APR in basis points, present once verified.
    pub apr_bps: Option<u64>,
    /// IPFS CID of the supporting documents.
    pub metadata_cid: String,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

/// The receivable factory.
///
/// In production this state lives in the deployed contract's storage; the
/// in-memory representation backs the local execution environment and the
/// contract test suites.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReceivableFactory {
    /// The AMC address allowed to verify.
    amc: String,
    /// Receivables keyed by id.
    receivables: HashMap<String, Receivable>,
    /// Per-exporter index, in creation order.
    by_exporter: HashMap<String, Vec<String>>,
    /// Per-exporter id-derivation nonce.
    nonces: HashMap<String, u64>,
}

impl ReceivableFactory {
    /// Creates an empty factory administered by the given AMC address.
    pub fn new(amc: impl Into<String>) -> Self {
        Self {
            amc: amc.into(),
            receivables: HashMap::new(),
            by_exporter: HashMap::new(),
            nonces: HashMap::new(),
        }
    }

    /// Tokenizes an invoice. Any address can create; the receivable
    /// starts PENDING. Returns the hash-derived id.
    pub fn create(
        &mut self,
        exporter: &str,
        importer: &str,
        amount_usd: u128,
        due_date: DateTime<Utc>,
        metadata_cid: &str,
    ) -> Result<String, ReceivableError> {
        if amount_usd == 0 {
            return Err(ReceivableError::ZeroAmount);
        }
        if due_date <= Utc::now() {
            return Err(ReceivableError::DueDatePassed);
        }

        let nonce = self.nonces.entry(exporter.to_string()).or_insert(0);
        let id = derive_id(b"receivable", &[exporter, importer], *nonce);
        *nonce += 1;

        let receivable = Receivable {
            id: id.clone(),
            exporter: exporter.to_string(),
            importer: importer.to_string(),
            amount_usd,
            due_date,
            status: ReceivableStatus::Pending,
            risk_score: None,
            apr_bps: None,
            metadata_cid: metadata_cid.to_string(),
            created_at: Utc::now(),
        };

        self.receivables.insert(id.clone(), receivable);
        self.by_exporter
            .entry(exporter.to_string())
            .or_default()
            .push(id.clone());

        Ok(id)
    }

    /// AMC verdict on a PENDING receivable. Approval records the risk
    /// score and APR; rejection is terminal.
    pub fn verify(
        &mut self,
        caller: &str,
        id: &str,
        approved: bool,
        risk_score: u32,
        apr_bps: u64,
    ) -> Result<(), ReceivableError> {
        if caller != self.amc {
            return Err(ReceivableError::UnauthorizedVerify);
        }
        if approved && risk_score > 100 {
            return Err(ReceivableError::RiskScoreOutOfRange(risk_score));
        }

        let receivable = self
            .receivables
            .get_mut(id)
            .ok_or_else(|| ReceivableError::NotFound(id.to_string()))?;

        if receivable.status != ReceivableStatus::Pending {
            return Err(ReceivableError::NotPending {
                id: id.to_string(),
                status: receivable.status,
            });
        }

        if approved {
            receivable.status = ReceivableStatus::Verified;
            receivable.risk_score = Some(risk_score);
            receivable.apr_bps = Some(apr_bps);
        } else {
            receivable.status = ReceivableStatus::Rejected;
        }
        Ok(())
    }

    /// Marks a receivable PAID. Called by the pool manager when the
    /// backing pool's repayments reach the funding target.
    pub fn mark_paid(&mut self, id: &str) -> Result<(), ReceivableError> {
        let receivable = self
            .receivables
            .get_mut(id)
            .ok_or_else(|| ReceivableError::NotFound(id.to_string()))?;
        receivable.status = ReceivableStatus::Paid;
        Ok(())
    }

    /// Returns a receivable by id.
    pub fn get(&self, id: &str) -> Option<&Receivable> {
        self.receivables.get(id)
    }

    /// All receivables created by `exporter`, in creation order.
    pub fn by_exporter(&self, exporter: &str) -> Vec<&Receivable> {
        self.by_exporter
            .get(exporter)
            .map(|ids| ids.iter().filter_map(|id| self.receivables.get(id)).collect())
            .unwrap_or_default()
    }
}

/// Derives a content-addressed identifier: blake3 over a domain tag, the
/// given fields (0x1f-separated), and a little-endian nonce.
pub(crate) fn derive_id(domain: &[u8], fields: &[&str], nonce: u64) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(domain);
    for field in fields {
        hasher.update(&[0x1f]);
        hasher.update(field.as_bytes());
    }
    hasher.update(&[0x1f]);
    hasher.update(&nonce.to_le_bytes());
    format!("0x{}", hex::encode(&hasher.finalize().as_bytes()[..20]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    const AMC: &str = "0xamc";

    fn create_one(factory: &mut ReceivableFactory) -> String {
        factory
            .create(
                "0xexporter",
                "0ximporter",
                50_000_000_000, // 50k USDC
                Utc::now() + Duration::days(90),
                "QmInvoiceDocs",
            )
            .unwrap()
    }

    #[test]
    fn create_assigns_distinct_ids_per_invoice() {
        let mut factory = ReceivableFactory::new(AMC);
        let id1 = create_one(&mut factory);
        let id2 = create_one(&mut factory);
        assert_ne!(id1, id2);
        assert!(id1.starts_with("0x"));
        assert_eq!(factory.by_exporter("0xexporter").len(), 2);
    }

    #[test]
    fn create_rejects_zero_amount_and_past_due_date() {
        let mut factory = ReceivableFactory::new(AMC);
        let future = Utc::now() + Duration::days(30);
        assert_eq!(
            factory.create("0xe", "0xi", 0, future, "cid"),
            Err(ReceivableError::ZeroAmount)
        );
        let past = Utc::now() - Duration::days(1);
        assert_eq!(
            factory.create("0xe", "0xi", 100, past, "cid"),
            Err(ReceivableError::DueDatePassed)
        );
    }

    #[test]
    fn verify_approval_records_score_and_apr() {
        let mut factory = ReceivableFactory::new(AMC);
        let id = create_one(&mut factory);

        factory.verify(AMC, &id, true, 35, 850).unwrap();
        let receivable = factory.get(&id).unwrap();
        assert_eq!(receivable.status, ReceivableStatus::Verified);
        assert_eq!(receivable.risk_score, Some(35));
        assert_eq!(receivable.apr_bps, Some(850));
    }

    #[test]
    fn rejection_is_terminal() {
        let mut factory = ReceivableFactory::new(AMC);
        let id = create_one(&mut factory);

        factory.verify(AMC, &id, false, 0, 0).unwrap();
        assert_eq!(factory.get(&id).unwrap().status, ReceivableStatus::Rejected);

        // A second verdict, either way, is rejected.
        let err = factory.verify(AMC, &id, true, 10, 500).unwrap_err();
        assert!(matches!(err, ReceivableError::NotPending { .. }));
    }

    #[test]
    fn verify_is_amc_gated() {
        let mut factory = ReceivableFactory::new(AMC);
        let id = create_one(&mut factory);
        let err = factory.verify("0xrando", &id, true, 10, 500).unwrap_err();
        assert_eq!(err, ReceivableError::UnauthorizedVerify);
    }

    #[test]
    fn risk_score_bounds_enforced() {
        let mut factory = ReceivableFactory::new(AMC);
        let id = create_one(&mut factory);
        let err = factory.verify(AMC, &id, true, 101, 500).unwrap_err();
        assert_eq!(err, ReceivableError::RiskScoreOutOfRange(101));
    }

    #[test]
    fn exporter_index_is_per_exporter() {
        let mut factory = ReceivableFactory::new(AMC);
        create_one(&mut factory);
        assert!(factory.by_exporter("0xsomeone_else").is_empty());
    }
}
