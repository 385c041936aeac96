// SPDX-FileCopyrightText: 2026 Clubhouse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Computer availability.
//!
//! The free functions are guarded status transitions meant to run inside a
//! caller's unit of work. Each one is a single compare-and-swap `UPDATE`, so
//! two writers racing for the same computer cannot both win.
//! [`ComputerRegistry`] wraps the operator-facing parts: out-of-service
//! toggling and the availability snapshot.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use clubhouse_core::{Clock, ClubError, Computer, ComputerId, ComputerStatus, Reservation, Session};
use clubhouse_storage::Database;
use clubhouse_storage::queries::{computers, reservations, sessions};
use rusqlite::Connection;
use serde::Serialize;
use tracing::info;

use ComputerStatus::{Available, Occupied, OutOfService, Reserved};

fn guarded(
    conn: &Connection,
    id: ComputerId,
    from: &[ComputerStatus],
    to: ComputerStatus,
) -> Result<(), ClubError> {
    if computers::transition_status(conn, id, from, to)? {
        return Ok(());
    }
    let computer = computers::require_computer(conn, id)?;
    Err(ClubError::InvalidState(format!(
        "computer {id} is {}, cannot become {to}",
        computer.status
    )))
}

/// Available or Reserved to Occupied.
pub fn mark_occupied(conn: &Connection, id: ComputerId) -> Result<(), ClubError> {
    guarded(conn, id, &[Available, Reserved], Occupied)
}

/// Occupied or Reserved to Available.
pub fn mark_available(conn: &Connection, id: ComputerId) -> Result<(), ClubError> {
    guarded(conn, id, &[Occupied, Reserved], Available)
}

/// Available to Reserved.
pub fn mark_reserved(conn: &Connection, id: ComputerId) -> Result<(), ClubError> {
    guarded(conn, id, &[Available], Reserved)
}

/// Take a computer out of service.
///
/// Refused with [`ClubError::Conflict`] while the computer is in use or
/// has a pending reservation, which counts as reserved even though the
/// stored status stays Available.
pub fn mark_out_of_service(conn: &Connection, id: ComputerId) -> Result<(), ClubError> {
    let computer = computers::require_computer(conn, id)?;
    match computer.status {
        Occupied | Reserved => {
            return Err(ClubError::Conflict(format!(
                "computer {id} is {}",
                computer.status
            )));
        }
        OutOfService => {
            return Err(ClubError::InvalidState(format!(
                "computer {id} is already out of service"
            )));
        }
        Available => {}
    }
    if reservations::has_pending_for_computer(conn, id)? {
        return Err(ClubError::Conflict(format!(
            "computer {id} has a pending reservation"
        )));
    }
    guarded(conn, id, &[Available], OutOfService)
}

/// Return an out-of-service computer to Available.
pub fn clear_out_of_service(conn: &Connection, id: ComputerId) -> Result<(), ClubError> {
    guarded(conn, id, &[OutOfService], Available)
}

/// One row of the availability snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComputerAvailability {
    pub computer: Computer,
    /// Stored status with pending reservations shown as Reserved.
    pub displayed_status: ComputerStatus,
    pub current_session: Option<Session>,
    /// Earliest pending reservation whose window has not ended.
    pub next_reservation: Option<Reservation>,
}

fn availability(
    conn: &Connection,
    computer: Computer,
    now: DateTime<Utc>,
) -> Result<ComputerAvailability, ClubError> {
    let has_pending = reservations::has_pending_for_computer(conn, computer.id)?;
    Ok(ComputerAvailability {
        displayed_status: computer.status.displayed(has_pending),
        current_session: sessions::active_session_for_computer(conn, computer.id)?,
        next_reservation: reservations::next_pending_for_computer(conn, computer.id, now)?,
        computer,
    })
}

/// Operator-facing view of the computers.
#[derive(Clone)]
pub struct ComputerRegistry {
    db: Database,
    clock: Arc<dyn Clock>,
}

impl ComputerRegistry {
    pub fn new(db: Database, clock: Arc<dyn Clock>) -> Self {
        Self { db, clock }
    }

    pub async fn set_out_of_service(&self, id: ComputerId) -> Result<Computer, ClubError> {
        let computer = self
            .db
            .unit_of_work(move |tx| {
                mark_out_of_service(tx, id)?;
                computers::require_computer(tx, id)
            })
            .await?;
        info!(computer_id = %id, "computer taken out of service");
        Ok(computer)
    }

    pub async fn clear_out_of_service(&self, id: ComputerId) -> Result<Computer, ClubError> {
        let computer = self
            .db
            .unit_of_work(move |tx| {
                clear_out_of_service(tx, id)?;
                computers::require_computer(tx, id)
            })
            .await?;
        info!(computer_id = %id, "computer back in service");
        Ok(computer)
    }

    /// Every computer with its displayed status, in id order.
    pub async fn snapshot(&self) -> Result<Vec<ComputerAvailability>, ClubError> {
        let now = self.clock.now();
        self.db
            .call(move |conn| {
                computers::list_computers(conn)?
                    .into_iter()
                    .map(|c| availability(conn, c, now))
                    .collect()
            })
            .await
    }

    pub async fn availability(&self, id: ComputerId) -> Result<ComputerAvailability, ClubError> {
        let now = self.clock.now();
        self.db
            .call(move |conn| {
                let computer = computers::require_computer(conn, id)?;
                availability(conn, computer, now)
            })
            .await
    }
}
