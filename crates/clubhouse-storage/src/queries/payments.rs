// SPDX-FileCopyrightText: 2026 Clubhouse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Append-only payment ledger rows.

use clubhouse_core::{ClientId, ClubError, PaymentId, ReservationId, SessionId};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Row};

use crate::codec::{get_enum, get_money, get_ts, money, ts};
use crate::database::sql_err;
use crate::models::{NewPayment, Payment, PaymentFilter};

const COLUMNS: &str =
    "id, client_id, payment_type, amount, created_at, session_id, reservation_id";

fn from_row(row: &Row<'_>) -> rusqlite::Result<Payment> {
    Ok(Payment {
        id: PaymentId(row.get(0)?),
        client_id: ClientId(row.get(1)?),
        payment_type: get_enum(row, 2)?,
        amount: get_money(row, 3)?,
        created_at: get_ts(row, 4)?,
        session_id: row.get::<_, Option<i64>>(5)?.map(SessionId),
        reservation_id: row.get::<_, Option<i64>>(6)?.map(ReservationId),
    })
}

pub fn insert_payment(conn: &Connection, new: &NewPayment) -> Result<Payment, ClubError> {
    conn.execute(
        "INSERT INTO payments (client_id, payment_type, amount, created_at, session_id, reservation_id)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            new.client_id.0,
            new.payment_type.to_string(),
            money(new.amount),
            ts(new.created_at),
            new.session_id.map(|s| s.0),
            new.reservation_id.map(|r| r.0),
        ],
    )
    .map_err(sql_err)?;
    Ok(Payment {
        id: PaymentId(conn.last_insert_rowid()),
        client_id: new.client_id,
        payment_type: new.payment_type,
        amount: new.amount,
        created_at: new.created_at,
        session_id: new.session_id,
        reservation_id: new.reservation_id,
    })
}

/// List payments matching the filter, oldest first.
pub fn list_payments(conn: &Connection, filter: &PaymentFilter) -> Result<Vec<Payment>, ClubError> {
    let mut clauses = Vec::new();
    let mut values: Vec<Value> = Vec::new();

    if let Some(client_id) = filter.client_id {
        values.push(client_id.0.into());
        clauses.push(format!("client_id = ?{}", values.len()));
    }
    if let Some(payment_type) = filter.payment_type {
        values.push(payment_type.to_string().into());
        clauses.push(format!("payment_type = ?{}", values.len()));
    }
    if let Some(from) = filter.from {
        values.push(ts(from).into());
        clauses.push(format!("created_at >= ?{}", values.len()));
    }
    if let Some(to) = filter.to {
        values.push(ts(to).into());
        clauses.push(format!("created_at < ?{}", values.len()));
    }

    let mut sql = format!("SELECT {COLUMNS} FROM payments");
    if !clauses.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&clauses.join(" AND "));
    }
    sql.push_str(" ORDER BY created_at, id");

    let mut stmt = conn.prepare(&sql).map_err(sql_err)?;
    let rows = stmt
        .query_map(params_from_iter(values), from_row)
        .map_err(sql_err)?;
    rows.collect::<Result<Vec<_>, _>>().map_err(sql_err)
}
