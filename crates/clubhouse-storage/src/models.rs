// SPDX-FileCopyrightText: 2026 Clubhouse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Insert and filter shapes for storage entities.
//!
//! The persisted entities themselves live in `clubhouse-core::types`; these
//! types describe rows before the database assigns their ids.

use chrono::{DateTime, TimeDelta, Utc};
use clubhouse_core::{
    ClientId, ComputerId, Money, PaymentType, ReservationId, SessionId, TariffId,
};

pub use clubhouse_core::types::{Client, Computer, Payment, Reservation, Session, Tariff};

#[derive(Debug, Clone)]
pub struct NewSession {
    pub client_id: ClientId,
    pub computer_id: ComputerId,
    pub tariff_id: TariffId,
    pub reservation_id: Option<ReservationId>,
    pub started_at: DateTime<Utc>,
    pub planned_duration: TimeDelta,
}

#[derive(Debug, Clone)]
pub struct NewReservation {
    pub client_id: ClientId,
    pub computer_id: ComputerId,
    pub tariff_id: TariffId,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewPayment {
    pub client_id: ClientId,
    pub payment_type: PaymentType,
    pub amount: Money,
    pub created_at: DateTime<Utc>,
    pub session_id: Option<SessionId>,
    pub reservation_id: Option<ReservationId>,
}

/// Criteria for listing ledger entries. Empty fields match everything;
/// the date range is half-open `[from, to)`.
#[derive(Debug, Clone, Default)]
pub struct PaymentFilter {
    pub client_id: Option<ClientId>,
    pub payment_type: Option<PaymentType>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

impl PaymentFilter {
    pub fn for_client(client_id: ClientId) -> Self {
        Self {
            client_id: Some(client_id),
            ..Self::default()
        }
    }

    pub fn with_type(mut self, payment_type: PaymentType) -> Self {
        self.payment_type = Some(payment_type);
        self
    }

    pub fn between(mut self, from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        self.from = Some(from);
        self.to = Some(to);
        self
    }
}
