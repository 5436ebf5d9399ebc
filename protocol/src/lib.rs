// Copyright (c) 2026 TrustBridge Labs. MIT License.
// See LICENSE for details.

//! # Novax Protocol — Core Library
//!
//! The on-chain interaction layer for Novax, TrustBridge's trade-receivable
//! financing network. Exporters tokenize invoices, the Asset Management
//! Company (AMC) verifies them and bundles them into investment pools, and
//! investors fund pools and collect yield — all through direct calls to the
//! deployed contracts.
//!
//! This crate is deliberately a *client*: the blockchain is the source of
//! truth, wallets hold the keys, and nothing here keeps an authoritative
//! copy of contract state. What it does own:
//!
//! - **amount** — fixed-point money. 6-decimal USDC, 18-decimal share
//!   tokens, zero floating point. If it touches money, it's an integer.
//! - **chain** — contract call envelopes, transaction receipts, event logs,
//!   and the [`ChainProvider`](chain::ChainProvider) seam the gateway
//!   speaks through (plus multi-endpoint fallback).
//! - **gateway** — the contract gateway itself: build parameters, submit,
//!   wait for the receipt, decode exactly one named event. Boring on
//!   purpose.
//! - **gateway::network_guard** — makes sure an injected wallet is pointed
//!   at the right chain before we ever ask it for a signature.
//! - **config** — protocol constants and network parameters.
//!
//! ## Design Philosophy
//!
//! 1. The contracts are the law; this crate only translates.
//! 2. A missing event in a receipt is an integration bug, never a business
//!    failure. It fails loud.
//! 3. Every public API is documented. Internal shame is documented too.
//! 4. If it touches money, it has tests. Plural.

pub mod amount;
pub mod chain;
pub mod config;
pub mod gateway;
