// SPDX-FileCopyrightText: 2026 Clubhouse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Domain types: identifiers, status vocabularies, and persisted entities.

use chrono::{DateTime, TimeDelta, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Monetary amount. Exact decimal, two fractional digits after pricing.
pub type Money = Decimal;

macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub i64);

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                std::fmt::Display::fmt(&self.0, f)
            }
        }
    };
}

entity_id!(
    /// Row id of a client account.
    ClientId
);
entity_id!(
    /// Row id of a computer.
    ComputerId
);
entity_id!(
    /// Row id of a tariff.
    TariffId
);
entity_id!(
    /// Row id of a rental session.
    SessionId
);
entity_id!(
    /// Row id of a reservation.
    ReservationId
);
entity_id!(
    /// Row id of a ledger entry.
    PaymentId
);

/// Hardware class of a computer, used to select its tariff.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Display, EnumString, Serialize, Deserialize,
)]
#[strum(ascii_case_insensitive)]
pub enum ComputerType {
    #[default]
    Unassigned,
    Economy,
    Standard,
    Premium,
    Vip,
}

/// Availability of a computer.
///
/// `Reserved` is normally a display status derived from a pending
/// reservation; see [`ComputerStatus::displayed`].
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Display, EnumString, Serialize, Deserialize,
)]
pub enum ComputerStatus {
    #[default]
    Available,
    Occupied,
    Reserved,
    OutOfService,
}

impl ComputerStatus {
    /// Status shown to operators: an available computer with a pending
    /// reservation is displayed as reserved.
    pub fn displayed(self, has_pending_reservation: bool) -> Self {
        match self {
            Self::Available if has_pending_reservation => Self::Reserved,
            other => other,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize)]
pub enum SessionStatus {
    Active,
    Completed,
    /// Produced only by the charge-at-close billing revision. Kept so rows
    /// written by it still decode; this engine never sets it.
    CancelledInsufficientFunds,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize)]
#[strum(ascii_case_insensitive)]
pub enum ReservationStatus {
    Pending,
    Active,
    Completed,
    Cancelled,
}

/// Kind of ledger entry. Charges carry negative amounts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize)]
#[strum(ascii_case_insensitive)]
pub enum PaymentType {
    TopUp,
    Charge,
    Refund,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Client {
    pub id: ClientId,
    pub full_name: String,
    pub phone: String,
    pub balance: Money,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Computer {
    pub id: ComputerId,
    pub computer_type: ComputerType,
    pub status: ComputerStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tariff {
    pub id: TariffId,
    pub name: String,
    pub price_per_hour: Money,
    pub computer_type: ComputerType,
}

/// A client's rental of one computer for a planned duration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    pub client_id: ClientId,
    pub computer_id: ComputerId,
    pub tariff_id: TariffId,
    /// Set when the session was started by the activation sweep.
    pub reservation_id: Option<ReservationId>,
    pub started_at: DateTime<Utc>,
    #[serde(with = "duration_ms")]
    pub planned_duration: TimeDelta,
    pub ended_at: Option<DateTime<Utc>>,
    pub total_cost: Option<Money>,
    pub status: SessionStatus,
}

impl Session {
    pub fn is_active(&self) -> bool {
        self.status == SessionStatus::Active
    }

    pub fn planned_end_at(&self) -> DateTime<Utc> {
        self.started_at + self.planned_duration
    }

    /// Time used so far, or the final duration of a finished session.
    pub fn elapsed(&self, now: DateTime<Utc>) -> TimeDelta {
        let end = self.ended_at.unwrap_or(now);
        (end - self.started_at).max(TimeDelta::zero())
    }

    /// Planned time left, never negative.
    pub fn remaining(&self, now: DateTime<Utc>) -> TimeDelta {
        (self.planned_duration - self.elapsed(now)).max(TimeDelta::zero())
    }

    /// How far an active session has run past its planned end.
    pub fn overtime(&self, now: DateTime<Utc>) -> Option<TimeDelta> {
        if !self.is_active() {
            return None;
        }
        let over = self.elapsed(now) - self.planned_duration;
        (over > TimeDelta::zero()).then_some(over)
    }

    pub fn is_overtime(&self, now: DateTime<Utc>) -> bool {
        self.overtime(now).is_some()
    }
}

/// An advance booking of a time window `[starts_at, ends_at)` on a computer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reservation {
    pub id: ReservationId,
    pub client_id: ClientId,
    pub computer_id: ComputerId,
    pub tariff_id: TariffId,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub status: ReservationStatus,
    pub created_at: DateTime<Utc>,
}

impl Reservation {
    pub fn duration(&self) -> TimeDelta {
        self.ends_at - self.starts_at
    }

    /// The whole window is in the past.
    pub fn has_elapsed(&self, now: DateTime<Utc>) -> bool {
        self.ends_at <= now
    }
}

/// One append-only ledger entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    pub id: PaymentId,
    pub client_id: ClientId,
    pub payment_type: PaymentType,
    pub amount: Money,
    pub created_at: DateTime<Utc>,
    pub session_id: Option<SessionId>,
    pub reservation_id: Option<ReservationId>,
}

/// Serializes a [`TimeDelta`] as integer milliseconds.
pub mod duration_ms {
    use chrono::TimeDelta;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &TimeDelta, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i64(value.num_milliseconds())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<TimeDelta, D::Error> {
        let ms = i64::deserialize(deserializer)?;
        Ok(TimeDelta::milliseconds(ms))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::str::FromStr;

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, h, m, 0).unwrap()
    }

    fn session(started_at: DateTime<Utc>, minutes: i64) -> Session {
        Session {
            id: SessionId(1),
            client_id: ClientId(1),
            computer_id: ComputerId(1),
            tariff_id: TariffId(1),
            reservation_id: None,
            started_at,
            planned_duration: TimeDelta::minutes(minutes),
            ended_at: None,
            total_cost: None,
            status: SessionStatus::Active,
        }
    }

    #[test]
    fn status_vocabularies_round_trip_through_strings() {
        for status in [
            ComputerStatus::Available,
            ComputerStatus::Occupied,
            ComputerStatus::Reserved,
            ComputerStatus::OutOfService,
        ] {
            assert_eq!(ComputerStatus::from_str(&status.to_string()).unwrap(), status);
        }
        assert_eq!(PaymentType::from_str("Refund").unwrap(), PaymentType::Refund);
        assert_eq!(ComputerType::Vip.to_string(), "Vip");
        assert!(SessionStatus::from_str("Paused").is_err());
    }

    #[test]
    fn available_with_pending_reservation_displays_reserved() {
        assert_eq!(
            ComputerStatus::Available.displayed(true),
            ComputerStatus::Reserved
        );
        assert_eq!(
            ComputerStatus::Occupied.displayed(true),
            ComputerStatus::Occupied
        );
        assert_eq!(
            ComputerStatus::Available.displayed(false),
            ComputerStatus::Available
        );
    }

    #[test]
    fn session_time_accounting() {
        let s = session(at(10, 0), 60);
        assert_eq!(s.planned_end_at(), at(11, 0));
        assert_eq!(s.elapsed(at(10, 15)), TimeDelta::minutes(15));
        assert_eq!(s.remaining(at(10, 15)), TimeDelta::minutes(45));
        assert!(!s.is_overtime(at(11, 0)));
        assert_eq!(s.overtime(at(11, 20)), Some(TimeDelta::minutes(20)));
        assert_eq!(s.remaining(at(11, 20)), TimeDelta::zero());
    }

    #[test]
    fn finished_session_is_never_overtime() {
        let mut s = session(at(10, 0), 30);
        s.ended_at = Some(at(11, 0));
        s.status = SessionStatus::Completed;
        assert_eq!(s.elapsed(at(15, 0)), TimeDelta::hours(1));
        assert!(!s.is_overtime(at(15, 0)));
    }

    #[test]
    fn reservation_window_elapses_at_its_end() {
        let r = Reservation {
            id: ReservationId(1),
            client_id: ClientId(1),
            computer_id: ComputerId(1),
            tariff_id: TariffId(1),
            starts_at: at(12, 0),
            ends_at: at(13, 0),
            status: ReservationStatus::Pending,
            created_at: at(9, 0),
        };
        assert!(!r.has_elapsed(at(12, 59)));
        assert!(r.has_elapsed(at(13, 0)));
        assert_eq!(r.duration(), TimeDelta::hours(1));
    }

    #[test]
    fn ids_serialize_transparently() {
        let json = serde_json::to_string(&ClientId(42)).unwrap();
        assert_eq!(json, "42");
        assert_eq!(ClientId(42).to_string(), "42");
    }
}
