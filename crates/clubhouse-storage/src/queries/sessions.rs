// SPDX-FileCopyrightText: 2026 Clubhouse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Rental session rows.

use chrono::{DateTime, TimeDelta, Utc};
use clubhouse_core::{
    ClientId, ClubError, ComputerId, Money, ReservationId, SessionId, SessionStatus, TariffId,
};
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::codec::{get_enum, get_opt_money, get_opt_ts, get_ts, millis, money, ts};
use crate::database::sql_err;
use crate::models::{NewSession, Session};

const COLUMNS: &str = "id, client_id, computer_id, tariff_id, reservation_id, started_at, \
                       planned_duration_ms, ended_at, total_cost, status";

fn from_row(row: &Row<'_>) -> rusqlite::Result<Session> {
    Ok(Session {
        id: SessionId(row.get(0)?),
        client_id: ClientId(row.get(1)?),
        computer_id: ComputerId(row.get(2)?),
        tariff_id: TariffId(row.get(3)?),
        reservation_id: row.get::<_, Option<i64>>(4)?.map(ReservationId),
        started_at: get_ts(row, 5)?,
        planned_duration: TimeDelta::milliseconds(row.get(6)?),
        ended_at: get_opt_ts(row, 7)?,
        total_cost: get_opt_money(row, 8)?,
        status: get_enum(row, 9)?,
    })
}

fn query_sessions(
    conn: &Connection,
    sql: &str,
    params: impl rusqlite::Params,
) -> Result<Vec<Session>, ClubError> {
    let mut stmt = conn.prepare(sql).map_err(sql_err)?;
    let rows = stmt.query_map(params, from_row).map_err(sql_err)?;
    rows.collect::<Result<Vec<_>, _>>().map_err(sql_err)
}

/// Insert an Active session.
pub fn insert_session(conn: &Connection, new: &NewSession) -> Result<Session, ClubError> {
    conn.execute(
        "INSERT INTO sessions (client_id, computer_id, tariff_id, reservation_id, started_at,
                               planned_duration_ms, status)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            new.client_id.0,
            new.computer_id.0,
            new.tariff_id.0,
            new.reservation_id.map(|r| r.0),
            ts(new.started_at),
            millis(new.planned_duration),
            SessionStatus::Active.to_string(),
        ],
    )
    .map_err(sql_err)?;
    require_session(conn, SessionId(conn.last_insert_rowid()))
}

pub fn get_session(conn: &Connection, id: SessionId) -> Result<Option<Session>, ClubError> {
    conn.query_row(
        &format!("SELECT {COLUMNS} FROM sessions WHERE id = ?1"),
        params![id.0],
        from_row,
    )
    .optional()
    .map_err(sql_err)
}

pub fn require_session(conn: &Connection, id: SessionId) -> Result<Session, ClubError> {
    get_session(conn, id)?.ok_or_else(|| ClubError::not_found("session", id.0))
}

pub fn list_active_sessions(conn: &Connection) -> Result<Vec<Session>, ClubError> {
    query_sessions(
        conn,
        &format!("SELECT {COLUMNS} FROM sessions WHERE status = ?1 ORDER BY started_at, id"),
        params![SessionStatus::Active.to_string()],
    )
}

pub fn active_session_for_computer(
    conn: &Connection,
    computer_id: ComputerId,
) -> Result<Option<Session>, ClubError> {
    conn.query_row(
        &format!("SELECT {COLUMNS} FROM sessions WHERE computer_id = ?1 AND status = ?2"),
        params![computer_id.0, SessionStatus::Active.to_string()],
        from_row,
    )
    .optional()
    .map_err(sql_err)
}

pub fn list_sessions_for_client(
    conn: &Connection,
    client_id: ClientId,
) -> Result<Vec<Session>, ClubError> {
    query_sessions(
        conn,
        &format!("SELECT {COLUMNS} FROM sessions WHERE client_id = ?1 ORDER BY started_at DESC, id DESC"),
        params![client_id.0],
    )
}

/// Number of Active sessions billed under the tariff.
pub fn count_active_for_tariff(conn: &Connection, tariff_id: TariffId) -> Result<i64, ClubError> {
    conn.query_row(
        "SELECT COUNT(*) FROM sessions WHERE tariff_id = ?1 AND status = ?2",
        params![tariff_id.0, SessionStatus::Active.to_string()],
        |row| row.get(0),
    )
    .map_err(sql_err)
}

/// Finish an Active session. Returns `false` if it was no longer Active.
pub fn finish_session(
    conn: &Connection,
    id: SessionId,
    ended_at: DateTime<Utc>,
    total_cost: Money,
    status: SessionStatus,
) -> Result<bool, ClubError> {
    let changed = conn
        .execute(
            "UPDATE sessions SET ended_at = ?1, total_cost = ?2, status = ?3
             WHERE id = ?4 AND status = ?5",
            params![
                ts(ended_at),
                money(total_cost),
                status.to_string(),
                id.0,
                SessionStatus::Active.to_string()
            ],
        )
        .map_err(sql_err)?;
    Ok(changed == 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::clients::insert_client;
    use crate::queries::computers::insert_computer;
    use crate::queries::fixtures::{at, setup_db};
    use crate::queries::tariffs::insert_tariff;
    use crate::Database;
    use clubhouse_core::ComputerType;
    use rust_decimal_macros::dec;

    async fn seed(db: &Database) -> NewSession {
        db.call(|conn| {
            let client = insert_client(conn, "Ada", "", at(8, 0))?;
            let pc = insert_computer(conn, ComputerType::Economy, at(8, 0))?;
            let tariff = insert_tariff(conn, "Eco", dec!(100), ComputerType::Economy)?;
            Ok(NewSession {
                client_id: client.id,
                computer_id: pc.id,
                tariff_id: tariff.id,
                reservation_id: None,
                started_at: at(10, 0),
                planned_duration: TimeDelta::hours(2),
            })
        })
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn insert_and_get_session_roundtrips() {
        let db = setup_db().await;
        let new = seed(&db).await;
        let session = db.call(move |conn| insert_session(conn, &new)).await.unwrap();

        assert_eq!(session.status, SessionStatus::Active);
        assert_eq!(session.started_at, at(10, 0));
        assert_eq!(session.planned_duration, TimeDelta::hours(2));
        assert!(session.ended_at.is_none());
        assert!(session.total_cost.is_none());

        let computer_id = session.computer_id;
        let active = db
            .call(move |conn| active_session_for_computer(conn, computer_id))
            .await
            .unwrap();
        assert_eq!(active, Some(session));
    }

    #[tokio::test]
    async fn finish_is_one_shot() {
        let db = setup_db().await;
        let new = seed(&db).await;
        let (first, second, finished) = db
            .call(move |conn| {
                let id = insert_session(conn, &new)?.id;
                let first =
                    finish_session(conn, id, at(11, 0), dec!(100.00), SessionStatus::Completed)?;
                let second =
                    finish_session(conn, id, at(12, 0), dec!(200.00), SessionStatus::Completed)?;
                Ok((first, second, require_session(conn, id)?))
            })
            .await
            .unwrap();
        assert!(first);
        assert!(!second);
        assert_eq!(finished.status, SessionStatus::Completed);
        assert_eq!(finished.ended_at, Some(at(11, 0)));
        assert_eq!(finished.total_cost, Some(dec!(100.00)));
        assert!(db.call(list_active_sessions).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn second_active_session_on_one_computer_is_rejected() {
        let db = setup_db().await;
        let new = seed(&db).await;
        let result = db
            .call(move |conn| {
                insert_session(conn, &new)?;
                insert_session(conn, &new)
            })
            .await;
        assert!(matches!(result, Err(ClubError::Storage { .. })));
    }

    #[tokio::test]
    async fn count_active_for_tariff_ignores_finished() {
        let db = setup_db().await;
        let new = seed(&db).await;
        let tariff_id = new.tariff_id;
        let counts = db
            .call(move |conn| {
                let id = insert_session(conn, &new)?.id;
                let before = count_active_for_tariff(conn, tariff_id)?;
                finish_session(conn, id, at(10, 30), dec!(50), SessionStatus::Completed)?;
                Ok((before, count_active_for_tariff(conn, tariff_id)?))
            })
            .await
            .unwrap();
        assert_eq!(counts, (1, 0));
    }
}
