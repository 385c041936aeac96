// SPDX-FileCopyrightText: 2026 Clubhouse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Advance bookings and their activation.
//!
//! A reservation is paid in full when it is booked. When its window starts,
//! the activation sweep turns it into a session: the part of the window
//! that already passed is refunded and the session runs until the window
//! ends. A window that passes entirely before activation is cancelled with
//! a full refund.

use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use clubhouse_billing::cost;
use clubhouse_billing::ledger::{PaymentLink, charge, credit};
use clubhouse_config::SessionConfig;
use clubhouse_core::{
    ClientId, Clock, ClubError, ComputerId, ComputerStatus, Money, PaymentType, Reservation,
    ReservationId, ReservationStatus, Session, TariffId,
};
use clubhouse_storage::queries::{clients, computers, reservations, sessions, tariffs};
use clubhouse_storage::{Database, NewReservation, NewSession};
use rusqlite::Connection;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::session::validate_duration;

/// Counts from one activation sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ActivationReport {
    /// Reservations turned into sessions.
    pub activated: usize,
    /// Reservations whose window passed before they could start.
    pub cancelled: usize,
    /// Reservations left Pending because their computer was busy.
    pub deferred: usize,
    /// Reservations whose unit of work failed.
    pub failed: usize,
}

impl ActivationReport {
    /// Whether the sweep changed or attempted anything.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

enum Activation {
    Started(Session),
    Cancelled(Money),
    Deferred(ComputerStatus),
    /// Someone else already moved the reservation out of Pending.
    Skipped,
}

fn reserve_in_tx(
    conn: &Connection,
    new: NewReservation,
) -> Result<(Reservation, Money), ClubError> {
    let client = clients::require_client(conn, new.client_id)?;
    let computer = computers::require_computer(conn, new.computer_id)?;
    let tariff = tariffs::require_tariff(conn, new.tariff_id)?;

    if computer.status == ComputerStatus::OutOfService {
        return Err(ClubError::Conflict(format!(
            "computer {} is out of service",
            computer.id
        )));
    }
    if let Some(existing) =
        reservations::overlapping_pending(conn, new.computer_id, new.starts_at, new.ends_at)?
            .first()
    {
        return Err(ClubError::Conflict(format!(
            "computer {} is already reserved from {} to {}",
            new.computer_id, existing.starts_at, existing.ends_at
        )));
    }

    let amount = cost(new.ends_at - new.starts_at, tariff.price_per_hour);
    if client.balance < amount {
        return Err(ClubError::InsufficientFunds {
            cost: amount,
            balance: client.balance,
        });
    }

    let reservation = reservations::insert_reservation(conn, &new)?;
    if amount > Money::ZERO {
        charge(
            conn,
            new.client_id,
            amount,
            PaymentLink::reservation(reservation.id),
            new.created_at,
        )?;
    }
    Ok((reservation, amount))
}

/// Cancel a Pending reservation and refund `cost(window)`.
fn cancel_in_tx(
    conn: &Connection,
    reservation: &Reservation,
    now: DateTime<Utc>,
) -> Result<Money, ClubError> {
    if !reservations::transition_status(
        conn,
        reservation.id,
        ReservationStatus::Pending,
        ReservationStatus::Cancelled,
    )? {
        return Err(ClubError::InvalidState(format!(
            "reservation {} is no longer pending",
            reservation.id
        )));
    }
    let tariff = tariffs::require_tariff(conn, reservation.tariff_id)?;
    let refund = cost(reservation.duration(), tariff.price_per_hour);
    if refund > Money::ZERO {
        credit(
            conn,
            reservation.client_id,
            PaymentType::Refund,
            refund,
            PaymentLink::reservation(reservation.id),
            now,
        )?;
    }
    Ok(refund)
}

/// `cost(window) - cost(remaining)`, never negative.
fn missed_prefix_refund(reservation: &Reservation, remaining: TimeDelta, price: Money) -> Money {
    let window = cost(reservation.duration(), price);
    (window - cost(remaining, price)).max(Money::ZERO)
}

fn activate_in_tx(
    conn: &Connection,
    id: ReservationId,
    now: DateTime<Utc>,
) -> Result<Activation, ClubError> {
    // Re-read inside the transaction; the listing may be stale.
    let reservation = reservations::require_reservation(conn, id)?;
    if reservation.status != ReservationStatus::Pending || reservation.starts_at > now {
        return Ok(Activation::Skipped);
    }

    if reservation.has_elapsed(now) {
        let refund = cancel_in_tx(conn, &reservation, now)?;
        return Ok(Activation::Cancelled(refund));
    }

    let computer_id = reservation.computer_id;
    if !computers::transition_status(
        conn,
        computer_id,
        &[ComputerStatus::Available, ComputerStatus::Reserved],
        ComputerStatus::Occupied,
    )? {
        let computer = computers::require_computer(conn, computer_id)?;
        return Ok(Activation::Deferred(computer.status));
    }

    if !reservations::transition_status(
        conn,
        id,
        ReservationStatus::Pending,
        ReservationStatus::Active,
    )? {
        return Err(ClubError::Internal(format!(
            "reservation {id} changed status during activation"
        )));
    }

    let remaining = reservation.ends_at - now;
    let session = sessions::insert_session(
        conn,
        &NewSession {
            client_id: reservation.client_id,
            computer_id,
            tariff_id: reservation.tariff_id,
            reservation_id: Some(id),
            started_at: now,
            planned_duration: remaining,
        },
    )?;

    // Close refunds against cost(remaining); both refunds together stay
    // within the window's charge.
    let tariff = tariffs::require_tariff(conn, reservation.tariff_id)?;
    let missed = missed_prefix_refund(&reservation, remaining, tariff.price_per_hour);
    if missed > Money::ZERO {
        credit(
            conn,
            reservation.client_id,
            PaymentType::Refund,
            missed,
            PaymentLink::reservation(id).with_session(session.id),
            now,
        )?;
    }
    Ok(Activation::Started(session))
}

/// Books reservations and activates them when their window starts.
#[derive(Clone)]
pub struct ReservationEngine {
    db: Database,
    clock: Arc<dyn Clock>,
    max_duration: TimeDelta,
}

impl ReservationEngine {
    pub fn new(db: Database, clock: Arc<dyn Clock>, max_duration: TimeDelta) -> Self {
        Self {
            db,
            clock,
            max_duration,
        }
    }

    pub fn from_config(db: Database, clock: Arc<dyn Clock>, config: &SessionConfig) -> Self {
        Self::new(db, clock, TimeDelta::hours(i64::from(config.max_planned_hours)))
    }

    /// Book `[starts_at, starts_at + duration)` and charge its full cost.
    pub async fn reserve(
        &self,
        client_id: ClientId,
        computer_id: ComputerId,
        tariff_id: TariffId,
        starts_at: DateTime<Utc>,
        duration: TimeDelta,
    ) -> Result<Reservation, ClubError> {
        validate_duration(duration, self.max_duration, "reservation")?;
        let now = self.clock.now();
        let ends_at = starts_at + duration;
        if ends_at <= now {
            return Err(ClubError::Validation(format!(
                "reservation window ending {ends_at} has already passed"
            )));
        }

        let new = NewReservation {
            client_id,
            computer_id,
            tariff_id,
            starts_at,
            ends_at,
            created_at: now,
        };
        let (reservation, amount) = self.db.unit_of_work(move |tx| reserve_in_tx(tx, new)).await?;
        info!(
            reservation_id = %reservation.id,
            client_id = %client_id,
            computer_id = %computer_id,
            starts_at = %reservation.starts_at,
            ends_at = %reservation.ends_at,
            cost = %amount,
            "reservation booked"
        );
        Ok(reservation)
    }

    /// Cancel a Pending reservation with a full refund.
    pub async fn cancel_reservation(&self, id: ReservationId) -> Result<Reservation, ClubError> {
        let now = self.clock.now();
        let (reservation, refund) = self
            .db
            .unit_of_work(move |tx| {
                let reservation = reservations::require_reservation(tx, id)?;
                if reservation.status != ReservationStatus::Pending {
                    return Err(ClubError::InvalidState(format!(
                        "reservation {id} is {}",
                        reservation.status
                    )));
                }
                let refund = cancel_in_tx(tx, &reservation, now)?;
                Ok((reservations::require_reservation(tx, id)?, refund))
            })
            .await?;
        info!(reservation_id = %id, refund = %refund, "reservation cancelled");
        Ok(reservation)
    }

    /// Start every Pending reservation whose window has begun.
    ///
    /// Each reservation is handled in its own unit of work. A busy computer
    /// defers the reservation to a later sweep. Failures are logged and
    /// counted; they do not stop the sweep. Only a failure to list the due
    /// reservations is returned as an error.
    pub async fn activate_reservations(&self) -> Result<ActivationReport, ClubError> {
        let now = self.clock.now();
        let due = self
            .db
            .call(move |conn| reservations::due_pending(conn, now))
            .await?;

        let mut report = ActivationReport::default();
        for reservation in due {
            let id = reservation.id;
            match self
                .db
                .unit_of_work(move |tx| activate_in_tx(tx, id, now))
                .await
            {
                Ok(Activation::Started(session)) => {
                    report.activated += 1;
                    info!(
                        reservation_id = %id,
                        session_id = %session.id,
                        computer_id = %session.computer_id,
                        planned_minutes = session.planned_duration.num_minutes(),
                        "reservation activated"
                    );
                }
                Ok(Activation::Cancelled(refund)) => {
                    report.cancelled += 1;
                    info!(reservation_id = %id, refund = %refund, "elapsed reservation cancelled");
                }
                Ok(Activation::Deferred(status)) => {
                    report.deferred += 1;
                    warn!(
                        reservation_id = %id,
                        computer_id = %reservation.computer_id,
                        computer_status = %status,
                        "computer not available, activation deferred"
                    );
                }
                Ok(Activation::Skipped) => {
                    debug!(reservation_id = %id, "reservation no longer pending");
                }
                Err(e) => {
                    report.failed += 1;
                    error!(reservation_id = %id, error = %e, "reservation activation failed");
                }
            }
        }
        if !report.is_empty() {
            debug!(?report, "activation sweep finished");
        }
        Ok(report)
    }

    pub async fn reservation(&self, id: ReservationId) -> Result<Reservation, ClubError> {
        self.db
            .call(move |conn| reservations::require_reservation(conn, id))
            .await
    }

    /// Reservations starting within `[from, to)`, optionally by status.
    pub async fn reservations_in_range(
        &self,
        status: Option<ReservationStatus>,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Reservation>, ClubError> {
        self.db
            .call(move |conn| reservations::list_in_range(conn, status, from, to))
            .await
    }
}
