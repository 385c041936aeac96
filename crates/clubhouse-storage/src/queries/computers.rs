// SPDX-FileCopyrightText: 2026 Clubhouse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Computer rows and guarded status transitions.

use chrono::{DateTime, Utc};
use clubhouse_core::{ClubError, ComputerId, ComputerStatus, ComputerType};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};

use crate::codec::{get_enum, get_ts, ts};
use crate::database::sql_err;
use crate::models::Computer;

const COLUMNS: &str = "id, computer_type, status, created_at";

fn from_row(row: &Row<'_>) -> rusqlite::Result<Computer> {
    Ok(Computer {
        id: ComputerId(row.get(0)?),
        computer_type: get_enum(row, 1)?,
        status: get_enum(row, 2)?,
        created_at: get_ts(row, 3)?,
    })
}

pub fn insert_computer(
    conn: &Connection,
    computer_type: ComputerType,
    created_at: DateTime<Utc>,
) -> Result<Computer, ClubError> {
    conn.execute(
        "INSERT INTO computers (computer_type, status, created_at) VALUES (?1, ?2, ?3)",
        params![
            computer_type.to_string(),
            ComputerStatus::Available.to_string(),
            ts(created_at)
        ],
    )
    .map_err(sql_err)?;
    require_computer(conn, ComputerId(conn.last_insert_rowid()))
}

pub fn get_computer(conn: &Connection, id: ComputerId) -> Result<Option<Computer>, ClubError> {
    conn.query_row(
        &format!("SELECT {COLUMNS} FROM computers WHERE id = ?1"),
        params![id.0],
        from_row,
    )
    .optional()
    .map_err(sql_err)
}

pub fn require_computer(conn: &Connection, id: ComputerId) -> Result<Computer, ClubError> {
    get_computer(conn, id)?.ok_or_else(|| ClubError::not_found("computer", id.0))
}

pub fn list_computers(conn: &Connection) -> Result<Vec<Computer>, ClubError> {
    let mut stmt = conn
        .prepare(&format!("SELECT {COLUMNS} FROM computers ORDER BY id"))
        .map_err(sql_err)?;
    let rows = stmt.query_map([], from_row).map_err(sql_err)?;
    rows.collect::<Result<Vec<_>, _>>().map_err(sql_err)
}

/// Compare-and-swap the stored status.
///
/// Moves the computer to `to` only if its current status is one of `from`.
/// Returns `false` when no row matched, which means the computer is missing
/// or was in another state.
pub fn transition_status(
    conn: &Connection,
    id: ComputerId,
    from: &[ComputerStatus],
    to: ComputerStatus,
) -> Result<bool, ClubError> {
    if from.is_empty() {
        return Ok(false);
    }
    let placeholders = (0..from.len())
        .map(|i| format!("?{}", i + 3))
        .collect::<Vec<_>>()
        .join(", ");
    let sql = format!("UPDATE computers SET status = ?1 WHERE id = ?2 AND status IN ({placeholders})");

    let mut values: Vec<rusqlite::types::Value> = vec![to.to_string().into(), id.0.into()];
    values.extend(from.iter().map(|s| s.to_string().into()));

    let changed = conn
        .execute(&sql, params_from_iter(values))
        .map_err(sql_err)?;
    Ok(changed == 1)
}

/// Change the hardware class. Returns `false` if the computer does not exist.
pub fn set_computer_type(
    conn: &Connection,
    id: ComputerId,
    computer_type: ComputerType,
) -> Result<bool, ClubError> {
    let changed = conn
        .execute(
            "UPDATE computers SET computer_type = ?1 WHERE id = ?2",
            params![computer_type.to_string(), id.0],
        )
        .map_err(sql_err)?;
    Ok(changed == 1)
}

/// Delete the row if it is still Available. Returns whether a row was removed.
pub fn delete_available_computer(conn: &Connection, id: ComputerId) -> Result<bool, ClubError> {
    let changed = conn
        .execute(
            "DELETE FROM computers WHERE id = ?1 AND status = ?2",
            params![id.0, ComputerStatus::Available.to_string()],
        )
        .map_err(sql_err)?;
    Ok(changed == 1)
}
