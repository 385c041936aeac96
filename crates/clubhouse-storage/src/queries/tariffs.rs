// SPDX-FileCopyrightText: 2026 Clubhouse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Tariff rows. At most one tariff exists per computer type.

use clubhouse_core::{ClubError, ComputerType, Money, TariffId};
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Row};

use crate::codec::{get_enum, get_money, money};
use crate::database::sql_err;
use crate::models::Tariff;

const COLUMNS: &str = "id, name, price_per_hour, computer_type";

fn from_row(row: &Row<'_>) -> rusqlite::Result<Tariff> {
    Ok(Tariff {
        id: TariffId(row.get(0)?),
        name: row.get(1)?,
        price_per_hour: get_money(row, 2)?,
        computer_type: get_enum(row, 3)?,
    })
}

/// Insert a tariff. A second tariff for the same type is a [`ClubError::Conflict`].
pub fn insert_tariff(
    conn: &Connection,
    name: &str,
    price_per_hour: Money,
    computer_type: ComputerType,
) -> Result<Tariff, ClubError> {
    let result = conn.execute(
        "INSERT INTO tariffs (name, price_per_hour, computer_type) VALUES (?1, ?2, ?3)",
        params![name, money(price_per_hour), computer_type.to_string()],
    );
    match result {
        Ok(_) => require_tariff(conn, TariffId(conn.last_insert_rowid())),
        Err(rusqlite::Error::SqliteFailure(err, _))
            if err.code == ErrorCode::ConstraintViolation =>
        {
            Err(ClubError::Conflict(format!(
                "a tariff for {computer_type} computers already exists"
            )))
        }
        Err(e) => Err(sql_err(e)),
    }
}

pub fn get_tariff(conn: &Connection, id: TariffId) -> Result<Option<Tariff>, ClubError> {
    conn.query_row(
        &format!("SELECT {COLUMNS} FROM tariffs WHERE id = ?1"),
        params![id.0],
        from_row,
    )
    .optional()
    .map_err(sql_err)
}

pub fn require_tariff(conn: &Connection, id: TariffId) -> Result<Tariff, ClubError> {
    get_tariff(conn, id)?.ok_or_else(|| ClubError::not_found("tariff", id.0))
}

pub fn tariff_for_type(
    conn: &Connection,
    computer_type: ComputerType,
) -> Result<Option<Tariff>, ClubError> {
    conn.query_row(
        &format!("SELECT {COLUMNS} FROM tariffs WHERE computer_type = ?1"),
        params![computer_type.to_string()],
        from_row,
    )
    .optional()
    .map_err(sql_err)
}

pub fn list_tariffs(conn: &Connection) -> Result<Vec<Tariff>, ClubError> {
    let mut stmt = conn
        .prepare(&format!("SELECT {COLUMNS} FROM tariffs ORDER BY id"))
        .map_err(sql_err)?;
    let rows = stmt.query_map([], from_row).map_err(sql_err)?;
    rows.collect::<Result<Vec<_>, _>>().map_err(sql_err)
}

pub fn update_tariff(
    conn: &Connection,
    id: TariffId,
    name: &str,
    price_per_hour: Money,
) -> Result<Tariff, ClubError> {
    let changed = conn
        .execute(
            "UPDATE tariffs SET name = ?1, price_per_hour = ?2 WHERE id = ?3",
            params![name, money(price_per_hour), id.0],
        )
        .map_err(sql_err)?;
    if changed == 0 {
        return Err(ClubError::not_found("tariff", id.0));
    }
    require_tariff(conn, id)
}

pub fn delete_tariff(conn: &Connection, id: TariffId) -> Result<bool, ClubError> {
    let changed = conn
        .execute("DELETE FROM tariffs WHERE id = ?1", params![id.0])
        .map_err(sql_err)?;
    Ok(changed == 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::fixtures::setup_db;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn one_tariff_per_type() {
        let db = setup_db().await;
        let first = db
            .call(|conn| insert_tariff(conn, "Economy", dec!(100), ComputerType::Economy))
            .await
            .unwrap();
        assert_eq!(first.price_per_hour, dec!(100));

        let err = db
            .call(|conn| insert_tariff(conn, "Cheap", dec!(80), ComputerType::Economy))
            .await
            .unwrap_err();
        assert!(matches!(err, ClubError::Conflict(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn lookup_by_type() {
        let db = setup_db().await;
        db.call(|conn| insert_tariff(conn, "VIP", dec!(250.50), ComputerType::Vip))
            .await
            .unwrap();
        let vip = db
            .call(|conn| tariff_for_type(conn, ComputerType::Vip))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(vip.name, "VIP");
        assert_eq!(vip.price_per_hour, dec!(250.50));
        let none = db
            .call(|conn| tariff_for_type(conn, ComputerType::Standard))
            .await
            .unwrap();
        assert!(none.is_none());
    }

    #[tokio::test]
    async fn update_and_delete() {
        let db = setup_db().await;
        let id = db
            .call(|conn| insert_tariff(conn, "Std", dec!(120), ComputerType::Standard).map(|t| t.id))
            .await
            .unwrap();
        let updated = db
            .call(move |conn| update_tariff(conn, id, "Standard", dec!(130)))
            .await
            .unwrap();
        assert_eq!(updated.name, "Standard");
        assert_eq!(updated.price_per_hour, dec!(130));

        assert!(db.call(move |conn| delete_tariff(conn, id)).await.unwrap());
        assert!(db.call(list_tariffs).await.unwrap().is_empty());

        let err = db
            .call(move |conn| update_tariff(conn, id, "Gone", dec!(1)))
            .await
            .unwrap_err();
        assert!(matches!(err, ClubError::NotFound { entity: "tariff", .. }));
    }
}
