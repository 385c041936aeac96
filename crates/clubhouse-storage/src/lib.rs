// SPDX-FileCopyrightText: 2026 Clubhouse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite persistence layer for the Clubhouse session engine.
//!
//! Provides WAL-mode SQLite storage with embedded migrations, a single-writer
//! concurrency model via `tokio-rusqlite`, an atomic unit of work, and typed
//! queries for clients, computers, tariffs, sessions, reservations, and the
//! payment ledger.

pub mod codec;
pub mod database;
pub mod migrations;
pub mod models;
pub mod queries;

pub use database::{sql_err, Database};
pub use models::*;
