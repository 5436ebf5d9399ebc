//! Call envelopes for contract writes and reads.
//!
//! A [`ContractCall`] is a state-mutating transaction; a [`ViewCall`] is a
//! free read. Parameters travel as JSON — the provider translates them to
//! whatever the target chain actually wants.

use serde::{Deserialize, Serialize};

/// A state-mutating contract call, signed and submitted as a transaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContractCall {
    /// Address of the target contract.
    pub contract: String,
    /// Contract method name, as named in the ABI.
    pub method: String,
    /// Address of the signer submitting the transaction.
    pub caller: String,
    /// Method parameters as a JSON object.
    pub params: serde_json::Value,
}

impl ContractCall {
    /// Builds a call envelope.
    pub fn new(
        contract: impl Into<String>,
        method: impl Into<String>,
        caller: impl Into<String>,
        params: serde_json::Value,
    ) -> Self {
        Self {
            contract: contract.into(),
            method: method.into(),
            caller: caller.into(),
            params,
        }
    }
}

/// A read-only view call. No signer, no gas, no receipt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViewCall {
    /// Address of the target contract.
    pub contract: String,
    /// Contract method name.
    pub method: String,
    /// Method parameters as a JSON object.
    pub params: serde_json::Value,
}

impl ViewCall {
    /// Builds a view envelope.
    pub fn new(
        contract: impl Into<String>,
        method: impl Into<String>,
        params: serde_json::Value,
    ) -> Self {
        Self {
            contract: contract.into(),
            method: method.into(),
            params,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn call_serialization_roundtrip() {
        let call = ContractCall::new(
            "0xfactory",
            "createReceivable",
            "0xexporter",
            serde_json::json!({ "amountUSD": "1000000" }),
        );
        let json = serde_json::to_string(&call).expect("serialize");
        let back: ContractCall = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back.method, "createReceivable");
        assert_eq!(back.params["amountUSD"], "1000000");
    }
}
