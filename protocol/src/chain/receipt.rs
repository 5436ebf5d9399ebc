//! Transaction receipts and event logs.
//!
//! After a write the gateway waits for the receipt and decodes exactly one
//! named event from it — the contract's way of returning generated
//! identifiers (receivable IDs, pool IDs, listing IDs). The log is located
//! by name; a missing expected log means the deployed contract and this
//! client disagree about the ABI, which is an integration bug and is
//! treated as one.

use serde::{Deserialize, Serialize};

/// A single decoded event emitted during transaction execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventLog {
    /// Event name as declared in the contract ABI (e.g. `ReceivableCreated`).
    pub name: String,
    /// Address of the contract that emitted the event.
    pub contract: String,
    /// Decoded event arguments as a JSON object.
    pub data: serde_json::Value,
}

impl EventLog {
    /// Creates an event log entry.
    pub fn new(
        name: impl Into<String>,
        contract: impl Into<String>,
        data: serde_json::Value,
    ) -> Self {
        Self {
            name: name.into(),
            contract: contract.into(),
            data,
        }
    }

    /// Extracts a string field from the event data.
    pub fn str_field(&self, key: &str) -> Option<&str> {
        self.data.get(key).and_then(|v| v.as_str())
    }
}

/// Receipt for a confirmed transaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionReceipt {
    /// Hex-encoded transaction hash.
    pub tx_hash: String,
    /// Block height where the transaction was included.
    pub block_height: u64,
    /// Unix timestamp (milliseconds) of the including block.
    pub timestamp: u64,
    /// Events emitted during execution, in emission order.
    pub logs: Vec<EventLog>,
}

impl TransactionReceipt {
    /// Locates the first event with the given name, if any.
    pub fn find_event(&self, name: &str) -> Option<&EventLog> {
        self.logs.iter().find(|log| log.name == name)
    }
}
