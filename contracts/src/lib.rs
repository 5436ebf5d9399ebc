// Copyright (c) 2026 TrustBridge Labs. MIT License.
// See LICENSE for details.

//! # Novax Receivables Contracts
//!
//! On-chain logic for the Novax trade-finance protocol. These contracts
//! implement the primitives that turn a trade receivable into an
//! investable, tradeable asset:
//!
//! - **Token Ledger** — ERC-20-style fungible balances for MockUSDC,
//!   pool share tokens, and the NVX reward token, with issuer-gated
//!   minting and allowance-based pulls.
//! - **Receivable Factory** — exporters tokenize invoices; the asset
//!   management company (AMC) verifies or rejects them with a risk score
//!   and an APR.
//! - **Pool Manager** — verified receivables become fixed-target
//!   investment pools; investors fund them in USDC and receive share
//!   tokens; repayments flow back through the AMC and are distributed
//!   pro rata with yield.
//! - **Marketplace** — secondary trading of pool shares with escrowed
//!   listings, partial fills, and purchase bounds.
//! - **Local Chain** — an in-process execution environment that hosts
//!   the four contracts behind the `ChainProvider` interface, producing
//!   transaction receipts with named event logs exactly like the
//!   deployed EVM contracts do.
//!
//! ## Design Principles
//!
//! 1. All monetary operations check for overflow — `checked_add` and
//!    `checked_sub` everywhere, because wrapping arithmetic and money do
//!    not mix.
//! 2. State transitions are explicit: enum variants, not boolean flags.
//! 3. Caller authorization gates every privileged operation.
//! 4. Every public type is serializable (serde) for wire transport.
//!
//! If it touches money, it has tests. Plural.

pub mod chain;
pub mod marketplace;
pub mod pool_manager;
pub mod receivable_factory;
pub mod tokens;
