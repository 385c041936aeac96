// SPDX-FileCopyrightText: 2026 Clubhouse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Pricing and the payment ledger for the Clubhouse session engine.
//!
//! This crate provides:
//! - **Pricing**: time-based cost calculation with two-decimal banker's rounding
//! - **Ledger**: balance mutation that always writes a matching payment row,
//!   top-ups, filtered payment listing, per-client totals, and reconciliation

pub mod ledger;
pub mod pricing;

pub use ledger::{CashSummary, Ledger, PaymentLink, Reconciliation};
pub use pricing::cost;
