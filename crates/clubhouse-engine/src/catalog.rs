// SPDX-FileCopyrightText: 2026 Clubhouse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Administration of clients, computers, and tariffs.
//!
//! Only the edits that could break a running session or a booked
//! reservation are guarded here; everything else is a plain row write.

use std::sync::Arc;

use clubhouse_core::{
    Client, ClientId, Clock, ClubError, Computer, ComputerId, ComputerStatus, ComputerType, Money,
    Tariff, TariffId,
};
use clubhouse_storage::Database;
use clubhouse_storage::queries::{clients, computers, reservations, sessions, tariffs};
use rusqlite::Connection;
use tracing::info;

fn validate_tariff(name: &str, price_per_hour: Money) -> Result<(), ClubError> {
    if name.trim().is_empty() {
        return Err(ClubError::Validation("tariff name must not be empty".to_string()));
    }
    if price_per_hour <= Money::ZERO {
        return Err(ClubError::Validation(format!(
            "tariff price must be positive, got {price_per_hour}"
        )));
    }
    Ok(())
}

/// Refuse edits to a tariff that an active session or pending reservation
/// will still be refunded against.
fn ensure_tariff_unused(conn: &Connection, id: TariffId) -> Result<(), ClubError> {
    tariffs::require_tariff(conn, id)?;
    if sessions::count_active_for_tariff(conn, id)? > 0 {
        return Err(ClubError::Conflict(format!(
            "tariff {id} is used by an active session"
        )));
    }
    if reservations::count_pending_for_tariff(conn, id)? > 0 {
        return Err(ClubError::Conflict(format!(
            "tariff {id} is used by a pending reservation"
        )));
    }
    Ok(())
}

fn ensure_computer_idle(conn: &Connection, computer: &Computer) -> Result<(), ClubError> {
    if matches!(
        computer.status,
        ComputerStatus::Occupied | ComputerStatus::Reserved
    ) {
        return Err(ClubError::Conflict(format!(
            "computer {} is {}",
            computer.id, computer.status
        )));
    }
    if reservations::has_pending_for_computer(conn, computer.id)? {
        return Err(ClubError::Conflict(format!(
            "computer {} has a pending reservation",
            computer.id
        )));
    }
    Ok(())
}

#[derive(Clone)]
pub struct Catalog {
    db: Database,
    clock: Arc<dyn Clock>,
}

impl Catalog {
    pub fn new(db: Database, clock: Arc<dyn Clock>) -> Self {
        Self { db, clock }
    }

    /// Register a client with a zero balance.
    pub async fn add_client(&self, full_name: &str, phone: &str) -> Result<Client, ClubError> {
        let full_name = full_name.trim().to_string();
        if full_name.is_empty() {
            return Err(ClubError::Validation("client name must not be empty".to_string()));
        }
        let phone = phone.trim().to_string();
        let now = self.clock.now();
        let client = self
            .db
            .unit_of_work(move |tx| clients::insert_client(tx, &full_name, &phone, now))
            .await?;
        info!(client_id = %client.id, "client registered");
        Ok(client)
    }

    pub async fn client(&self, id: ClientId) -> Result<Client, ClubError> {
        self.db
            .call(move |conn| clients::require_client(conn, id))
            .await
    }

    pub async fn clients(&self) -> Result<Vec<Client>, ClubError> {
        self.db.call(clients::list_clients).await
    }

    pub async fn add_computer(&self, computer_type: ComputerType) -> Result<Computer, ClubError> {
        let now = self.clock.now();
        let computer = self
            .db
            .unit_of_work(move |tx| computers::insert_computer(tx, computer_type, now))
            .await?;
        info!(computer_id = %computer.id, computer_type = %computer_type, "computer added");
        Ok(computer)
    }

    pub async fn computers(&self) -> Result<Vec<Computer>, ClubError> {
        self.db.call(computers::list_computers).await
    }

    /// Delete a computer. It must be Available with no pending reservation.
    pub async fn remove_computer(&self, id: ComputerId) -> Result<(), ClubError> {
        self.db
            .unit_of_work(move |tx| {
                let computer = computers::require_computer(tx, id)?;
                if computer.status != ComputerStatus::Available {
                    return Err(ClubError::Conflict(format!(
                        "computer {id} is {}",
                        computer.status
                    )));
                }
                ensure_computer_idle(tx, &computer)?;
                if !computers::delete_available_computer(tx, id)? {
                    return Err(ClubError::Conflict(format!(
                        "computer {id} is no longer available"
                    )));
                }
                Ok(())
            })
            .await?;
        info!(computer_id = %id, "computer removed");
        Ok(())
    }

    /// Change a computer's hardware class. Refused while it is occupied or
    /// reserved.
    pub async fn set_computer_type(
        &self,
        id: ComputerId,
        computer_type: ComputerType,
    ) -> Result<Computer, ClubError> {
        let computer = self
            .db
            .unit_of_work(move |tx| {
                let computer = computers::require_computer(tx, id)?;
                ensure_computer_idle(tx, &computer)?;
                computers::set_computer_type(tx, id, computer_type)?;
                computers::require_computer(tx, id)
            })
            .await?;
        info!(computer_id = %id, computer_type = %computer_type, "computer type changed");
        Ok(computer)
    }

    /// Create the tariff for a computer type. Each type has at most one.
    pub async fn add_tariff(
        &self,
        name: &str,
        price_per_hour: Money,
        computer_type: ComputerType,
    ) -> Result<Tariff, ClubError> {
        validate_tariff(name, price_per_hour)?;
        if computer_type == ComputerType::Unassigned {
            return Err(ClubError::Validation(
                "tariffs must target an assigned computer type".to_string(),
            ));
        }
        let name = name.trim().to_string();
        let tariff = self
            .db
            .unit_of_work(move |tx| tariffs::insert_tariff(tx, &name, price_per_hour, computer_type))
            .await?;
        info!(tariff_id = %tariff.id, computer_type = %computer_type, price = %price_per_hour, "tariff created");
        Ok(tariff)
    }

    /// Rename or reprice a tariff that nothing is currently billed against.
    pub async fn update_tariff(
        &self,
        id: TariffId,
        name: &str,
        price_per_hour: Money,
    ) -> Result<Tariff, ClubError> {
        validate_tariff(name, price_per_hour)?;
        let name = name.trim().to_string();
        let tariff = self
            .db
            .unit_of_work(move |tx| {
                ensure_tariff_unused(tx, id)?;
                tariffs::update_tariff(tx, id, &name, price_per_hour)
            })
            .await?;
        info!(tariff_id = %id, price = %price_per_hour, "tariff updated");
        Ok(tariff)
    }

    pub async fn remove_tariff(&self, id: TariffId) -> Result<(), ClubError> {
        self.db
            .unit_of_work(move |tx| {
                ensure_tariff_unused(tx, id)?;
                if !tariffs::delete_tariff(tx, id)? {
                    return Err(ClubError::not_found("tariff", id.0));
                }
                Ok(())
            })
            .await?;
        info!(tariff_id = %id, "tariff removed");
        Ok(())
    }

    pub async fn tariff(&self, id: TariffId) -> Result<Tariff, ClubError> {
        self.db
            .call(move |conn| tariffs::require_tariff(conn, id))
            .await
    }

    pub async fn tariffs(&self) -> Result<Vec<Tariff>, ClubError> {
        self.db.call(tariffs::list_tariffs).await
    }

    pub async fn tariff_for_type(
        &self,
        computer_type: ComputerType,
    ) -> Result<Option<Tariff>, ClubError> {
        self.db
            .call(move |conn| tariffs::tariff_for_type(conn, computer_type))
            .await
    }
}
