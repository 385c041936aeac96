// SPDX-FileCopyrightText: 2026 Clubhouse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Reservation rows and window lookups.
//!
//! Windows are half-open `[starts_at, ends_at)`; the fixed-width timestamp
//! encoding lets the overlap test run in SQL.

use chrono::{DateTime, Utc};
use clubhouse_core::{
    ClientId, ClubError, ComputerId, ReservationId, ReservationStatus, TariffId,
};
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::codec::{get_enum, get_ts, ts};
use crate::database::sql_err;
use crate::models::{NewReservation, Reservation};

const COLUMNS: &str =
    "id, client_id, computer_id, tariff_id, starts_at, ends_at, status, created_at";

fn from_row(row: &Row<'_>) -> rusqlite::Result<Reservation> {
    Ok(Reservation {
        id: ReservationId(row.get(0)?),
        client_id: ClientId(row.get(1)?),
        computer_id: ComputerId(row.get(2)?),
        tariff_id: TariffId(row.get(3)?),
        starts_at: get_ts(row, 4)?,
        ends_at: get_ts(row, 5)?,
        status: get_enum(row, 6)?,
        created_at: get_ts(row, 7)?,
    })
}

fn query_reservations(
    conn: &Connection,
    sql: &str,
    params: impl rusqlite::Params,
) -> Result<Vec<Reservation>, ClubError> {
    let mut stmt = conn.prepare(sql).map_err(sql_err)?;
    let rows = stmt.query_map(params, from_row).map_err(sql_err)?;
    rows.collect::<Result<Vec<_>, _>>().map_err(sql_err)
}

fn pending() -> String {
    ReservationStatus::Pending.to_string()
}

/// Insert a Pending reservation.
pub fn insert_reservation(
    conn: &Connection,
    new: &NewReservation,
) -> Result<Reservation, ClubError> {
    conn.execute(
        "INSERT INTO reservations (client_id, computer_id, tariff_id, starts_at, ends_at, status, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            new.client_id.0,
            new.computer_id.0,
            new.tariff_id.0,
            ts(new.starts_at),
            ts(new.ends_at),
            pending(),
            ts(new.created_at),
        ],
    )
    .map_err(sql_err)?;
    require_reservation(conn, ReservationId(conn.last_insert_rowid()))
}

pub fn get_reservation(
    conn: &Connection,
    id: ReservationId,
) -> Result<Option<Reservation>, ClubError> {
    conn.query_row(
        &format!("SELECT {COLUMNS} FROM reservations WHERE id = ?1"),
        params![id.0],
        from_row,
    )
    .optional()
    .map_err(sql_err)
}

pub fn require_reservation(conn: &Connection, id: ReservationId) -> Result<Reservation, ClubError> {
    get_reservation(conn, id)?.ok_or_else(|| ClubError::not_found("reservation", id.0))
}

/// Pending reservations on the computer whose window overlaps `[starts_at, ends_at)`.
pub fn overlapping_pending(
    conn: &Connection,
    computer_id: ComputerId,
    starts_at: DateTime<Utc>,
    ends_at: DateTime<Utc>,
) -> Result<Vec<Reservation>, ClubError> {
    query_reservations(
        conn,
        &format!(
            "SELECT {COLUMNS} FROM reservations
             WHERE computer_id = ?1 AND status = ?2 AND starts_at < ?3 AND ends_at > ?4
             ORDER BY starts_at"
        ),
        params![computer_id.0, pending(), ts(ends_at), ts(starts_at)],
    )
}

/// Pending reservations whose start time has arrived, oldest first.
pub fn due_pending(conn: &Connection, now: DateTime<Utc>) -> Result<Vec<Reservation>, ClubError> {
    query_reservations(
        conn,
        &format!(
            "SELECT {COLUMNS} FROM reservations
             WHERE status = ?1 AND starts_at <= ?2
             ORDER BY starts_at, id"
        ),
        params![pending(), ts(now)],
    )
}

pub fn has_pending_for_computer(
    conn: &Connection,
    computer_id: ComputerId,
) -> Result<bool, ClubError> {
    conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM reservations WHERE computer_id = ?1 AND status = ?2)",
        params![computer_id.0, pending()],
        |row| row.get(0),
    )
    .map_err(sql_err)
}

/// Earliest Pending reservation on the computer that has not yet ended.
pub fn next_pending_for_computer(
    conn: &Connection,
    computer_id: ComputerId,
    now: DateTime<Utc>,
) -> Result<Option<Reservation>, ClubError> {
    conn.query_row(
        &format!(
            "SELECT {COLUMNS} FROM reservations
             WHERE computer_id = ?1 AND status = ?2 AND ends_at > ?3
             ORDER BY starts_at LIMIT 1"
        ),
        params![computer_id.0, pending(), ts(now)],
        from_row,
    )
    .optional()
    .map_err(sql_err)
}

pub fn count_pending_for_tariff(conn: &Connection, tariff_id: TariffId) -> Result<i64, ClubError> {
    conn.query_row(
        "SELECT COUNT(*) FROM reservations WHERE tariff_id = ?1 AND status = ?2",
        params![tariff_id.0, pending()],
        |row| row.get(0),
    )
    .map_err(sql_err)
}

/// Reservations whose window starts within `[from, to)`, optionally by status.
pub fn list_in_range(
    conn: &Connection,
    status: Option<ReservationStatus>,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
) -> Result<Vec<Reservation>, ClubError> {
    match status {
        Some(status) => query_reservations(
            conn,
            &format!(
                "SELECT {COLUMNS} FROM reservations
                 WHERE status = ?1 AND starts_at >= ?2 AND starts_at < ?3
                 ORDER BY starts_at, id"
            ),
            params![status.to_string(), ts(from), ts(to)],
        ),
        None => query_reservations(
            conn,
            &format!(
                "SELECT {COLUMNS} FROM reservations
                 WHERE starts_at >= ?1 AND starts_at < ?2
                 ORDER BY starts_at, id"
            ),
            params![ts(from), ts(to)],
        ),
    }
}

/// Compare-and-swap the reservation status. Returns `false` if it was not in `from`.
pub fn transition_status(
    conn: &Connection,
    id: ReservationId,
    from: ReservationStatus,
    to: ReservationStatus,
) -> Result<bool, ClubError> {
    let changed = conn
        .execute(
            "UPDATE reservations SET status = ?1 WHERE id = ?2 AND status = ?3",
            params![to.to_string(), id.0, from.to_string()],
        )
        .map_err(sql_err)?;
    Ok(changed == 1)
}
