// SPDX-FileCopyrightText: 2026 Clubhouse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Walk-in rental sessions.
//!
//! Billing is charge-at-open with refund: the full planned cost is deducted
//! when the session opens, and closing early refunds the unused part.
//! Closing late is never charged extra.

use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use clubhouse_billing::cost;
use clubhouse_billing::ledger::{PaymentLink, charge, credit};
use clubhouse_config::SessionConfig;
use clubhouse_core::{
    ClientId, Clock, ClubError, ComputerId, ComputerStatus, Money, PaymentType,
    ReservationStatus, Session, SessionId, SessionStatus, TariffId,
};
use clubhouse_storage::queries::{clients, computers, reservations, sessions, tariffs};
use clubhouse_storage::{Database, NewSession};
use rusqlite::Connection;
use tracing::{debug, info, warn};

use crate::registry;

/// Reject non-positive durations and durations above `max`.
pub(crate) fn validate_duration(
    duration: TimeDelta,
    max: TimeDelta,
    what: &str,
) -> Result<(), ClubError> {
    if duration <= TimeDelta::zero() {
        return Err(ClubError::Validation(format!(
            "{what} duration must be positive"
        )));
    }
    if duration > max {
        return Err(ClubError::Validation(format!(
            "{what} duration of {} minutes exceeds the maximum of {} hours",
            duration.num_minutes(),
            max.num_hours()
        )));
    }
    Ok(())
}

fn open_in_tx(
    conn: &Connection,
    client_id: ClientId,
    computer_id: ComputerId,
    tariff_id: TariffId,
    planned_duration: TimeDelta,
    now: DateTime<Utc>,
) -> Result<Session, ClubError> {
    let client = clients::require_client(conn, client_id)?;
    let computer = computers::require_computer(conn, computer_id)?;
    let tariff = tariffs::require_tariff(conn, tariff_id)?;

    if computer.status != ComputerStatus::Available {
        return Err(ClubError::Conflict(format!(
            "computer {computer_id} is {}",
            computer.status
        )));
    }

    let planned_cost = cost(planned_duration, tariff.price_per_hour);
    if client.balance < planned_cost {
        return Err(ClubError::InsufficientFunds {
            cost: planned_cost,
            balance: client.balance,
        });
    }

    registry::mark_occupied(conn, computer_id)?;
    let session = sessions::insert_session(
        conn,
        &NewSession {
            client_id,
            computer_id,
            tariff_id,
            reservation_id: None,
            started_at: now,
            planned_duration,
        },
    )?;
    if planned_cost > Money::ZERO {
        charge(conn, client_id, planned_cost, PaymentLink::session(session.id), now)?;
    }
    Ok(session)
}

/// Finish an Active session at `ended_at` and refund the unused planned time.
/// Returns the finished session and the refunded amount.
fn close_in_tx(
    conn: &Connection,
    id: SessionId,
    ended_at: DateTime<Utc>,
) -> Result<(Session, Money), ClubError> {
    let session = sessions::require_session(conn, id)?;
    if !session.is_active() {
        return Err(ClubError::InvalidState(format!(
            "session {id} is already finished"
        )));
    }
    let tariff = tariffs::require_tariff(conn, session.tariff_id)?;

    let ended_at = ended_at.max(session.started_at);
    let actual = cost(ended_at - session.started_at, tariff.price_per_hour);
    let planned = cost(session.planned_duration, tariff.price_per_hour);

    if !sessions::finish_session(conn, id, ended_at, actual, SessionStatus::Completed)? {
        return Err(ClubError::InvalidState(format!(
            "session {id} is already finished"
        )));
    }
    registry::mark_available(conn, session.computer_id)?;
    if let Some(reservation_id) = session.reservation_id
        && !reservations::transition_status(
            conn,
            reservation_id,
            ReservationStatus::Active,
            ReservationStatus::Completed,
        )?
    {
        warn!(
            session_id = %id,
            reservation_id = %reservation_id,
            "reservation behind closed session was not active, left unchanged"
        );
    }

    let refund = planned - actual;
    if refund > Money::ZERO {
        let link = PaymentLink {
            session_id: Some(id),
            reservation_id: session.reservation_id,
        };
        credit(conn, session.client_id, PaymentType::Refund, refund, link, ended_at)?;
    }
    Ok((sessions::require_session(conn, id)?, refund.max(Money::ZERO)))
}

/// Opens and closes rental sessions.
#[derive(Clone)]
pub struct SessionEngine {
    db: Database,
    clock: Arc<dyn Clock>,
    max_planned: TimeDelta,
}

impl SessionEngine {
    pub fn new(db: Database, clock: Arc<dyn Clock>, max_planned: TimeDelta) -> Self {
        Self {
            db,
            clock,
            max_planned,
        }
    }

    pub fn from_config(db: Database, clock: Arc<dyn Clock>, config: &SessionConfig) -> Self {
        Self::new(db, clock, TimeDelta::hours(i64::from(config.max_planned_hours)))
    }

    /// Start a session and charge its full planned cost up front.
    pub async fn open_session(
        &self,
        client_id: ClientId,
        computer_id: ComputerId,
        tariff_id: TariffId,
        planned_duration: TimeDelta,
    ) -> Result<Session, ClubError> {
        validate_duration(planned_duration, self.max_planned, "session")?;
        let now = self.clock.now();
        let session = self
            .db
            .unit_of_work(move |tx| {
                open_in_tx(tx, client_id, computer_id, tariff_id, planned_duration, now)
            })
            .await?;
        info!(
            session_id = %session.id,
            client_id = %client_id,
            computer_id = %computer_id,
            planned_minutes = planned_duration.num_minutes(),
            "session opened"
        );
        Ok(session)
    }

    /// Close a session now.
    pub async fn close_session(&self, id: SessionId) -> Result<Session, ClubError> {
        self.close_session_at(id, self.clock.now()).await
    }

    /// Close a session as of `ended_at`, which is clamped to its start.
    pub async fn close_session_at(
        &self,
        id: SessionId,
        ended_at: DateTime<Utc>,
    ) -> Result<Session, ClubError> {
        let (session, refund) = self
            .db
            .unit_of_work(move |tx| close_in_tx(tx, id, ended_at))
            .await?;
        info!(
            session_id = %id,
            computer_id = %session.computer_id,
            total_cost = %session.total_cost.unwrap_or_default(),
            refund = %refund,
            "session closed"
        );
        Ok(session)
    }

    /// Close every Active session that has run past its planned end.
    ///
    /// Each one is closed at its planned end, so it costs exactly what was
    /// charged at open. Sessions closed concurrently are skipped.
    pub async fn close_overtime(&self) -> Result<Vec<Session>, ClubError> {
        let now = self.clock.now();
        let overdue: Vec<Session> = self
            .active_sessions()
            .await?
            .into_iter()
            .filter(|s| s.is_overtime(now))
            .collect();

        let mut closed = Vec::with_capacity(overdue.len());
        for session in overdue {
            match self.close_session_at(session.id, session.planned_end_at()).await {
                Ok(s) => closed.push(s),
                Err(ClubError::InvalidState(reason)) => {
                    debug!(session_id = %session.id, %reason, "overtime session already closed");
                }
                Err(e) if e.is_storage() => return Err(e),
                Err(e) => warn!(session_id = %session.id, error = %e, "overtime auto-close failed"),
            }
        }
        Ok(closed)
    }

    pub async fn active_sessions(&self) -> Result<Vec<Session>, ClubError> {
        self.db.call(sessions::list_active_sessions).await
    }

    pub async fn session(&self, id: SessionId) -> Result<Session, ClubError> {
        self.db
            .call(move |conn| sessions::require_session(conn, id))
            .await
    }

    /// A client's sessions, newest first.
    pub async fn sessions_for_client(&self, client_id: ClientId) -> Result<Vec<Session>, ClubError> {
        self.db
            .call(move |conn| sessions::list_sessions_for_client(conn, client_id))
            .await
    }
}
