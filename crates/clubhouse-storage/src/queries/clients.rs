// SPDX-FileCopyrightText: 2026 Clubhouse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Client accounts and balance updates.

use chrono::{DateTime, Utc};
use clubhouse_core::{ClientId, ClubError, Money};
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::codec::{get_money, get_ts, money, ts};
use crate::database::sql_err;
use crate::models::Client;

const COLUMNS: &str = "id, full_name, phone, balance, created_at";

fn from_row(row: &Row<'_>) -> rusqlite::Result<Client> {
    Ok(Client {
        id: ClientId(row.get(0)?),
        full_name: row.get(1)?,
        phone: row.get(2)?,
        balance: get_money(row, 3)?,
        created_at: get_ts(row, 4)?,
    })
}

/// Insert a client with a zero balance.
pub fn insert_client(
    conn: &Connection,
    full_name: &str,
    phone: &str,
    created_at: DateTime<Utc>,
) -> Result<Client, ClubError> {
    conn.execute(
        "INSERT INTO clients (full_name, phone, balance, created_at) VALUES (?1, ?2, '0', ?3)",
        params![full_name, phone, ts(created_at)],
    )
    .map_err(sql_err)?;
    let id = ClientId(conn.last_insert_rowid());
    require_client(conn, id)
}

pub fn get_client(conn: &Connection, id: ClientId) -> Result<Option<Client>, ClubError> {
    conn.query_row(
        &format!("SELECT {COLUMNS} FROM clients WHERE id = ?1"),
        params![id.0],
        from_row,
    )
    .optional()
    .map_err(sql_err)
}

/// Like [`get_client`], but a missing row is [`ClubError::NotFound`].
pub fn require_client(conn: &Connection, id: ClientId) -> Result<Client, ClubError> {
    get_client(conn, id)?.ok_or_else(|| ClubError::not_found("client", id.0))
}

pub fn list_clients(conn: &Connection) -> Result<Vec<Client>, ClubError> {
    let mut stmt = conn
        .prepare(&format!("SELECT {COLUMNS} FROM clients ORDER BY id"))
        .map_err(sql_err)?;
    let rows = stmt.query_map([], from_row).map_err(sql_err)?;
    rows.collect::<Result<Vec<_>, _>>().map_err(sql_err)
}

/// Overwrite a client's balance. Callers pair this with a payment row.
pub fn set_balance(conn: &Connection, id: ClientId, balance: Money) -> Result<(), ClubError> {
    let changed = conn
        .execute(
            "UPDATE clients SET balance = ?1 WHERE id = ?2",
            params![money(balance), id.0],
        )
        .map_err(sql_err)?;
    if changed == 0 {
        return Err(ClubError::not_found("client", id.0));
    }
    Ok(())
}
