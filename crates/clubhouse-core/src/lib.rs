// SPDX-FileCopyrightText: 2026 Clubhouse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for Clubhouse, the computer-club session engine.
//!
//! This crate provides the error taxonomy, the domain entities shared by the
//! storage, billing, and engine crates, and the [`Clock`] abstraction used
//! wherever the current time matters.

pub mod clock;
pub mod error;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use clock::{Clock, FakeClock, SystemClock};
pub use error::ClubError;
pub use types::{
    Client, ClientId, Computer, ComputerId, ComputerStatus, ComputerType, Money, Payment,
    PaymentId, PaymentType, Reservation, ReservationId, ReservationStatus, Session, SessionId,
    SessionStatus, Tariff, TariffId,
};
