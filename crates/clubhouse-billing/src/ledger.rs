// SPDX-FileCopyrightText: 2026 Clubhouse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The payment ledger.
//!
//! Every balance change goes through [`charge`] or [`credit`], which write
//! the new balance and the matching payment row on the same connection. The
//! engines call them inside their own unit of work; [`Ledger`] wraps the
//! operator-facing parts (top-ups, listings, totals, cash summaries and
//! reconciliation).

use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use clubhouse_core::{
    ClientId, Clock, ClubError, Money, Payment, PaymentType, ReservationId, SessionId,
};
use clubhouse_storage::queries::{clients, payments};
use clubhouse_storage::{Database, NewPayment, PaymentFilter};
use rusqlite::Connection;
use serde::Serialize;
use tracing::info;

/// What a payment row refers to besides the client.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PaymentLink {
    pub session_id: Option<SessionId>,
    pub reservation_id: Option<ReservationId>,
}

impl PaymentLink {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn session(id: SessionId) -> Self {
        Self {
            session_id: Some(id),
            reservation_id: None,
        }
    }

    pub fn reservation(id: ReservationId) -> Self {
        Self {
            session_id: None,
            reservation_id: Some(id),
        }
    }

    pub fn with_session(mut self, id: SessionId) -> Self {
        self.session_id = Some(id);
        self
    }
}

/// Deduct `amount` from the client's balance and append a negative Charge.
///
/// Fails with [`ClubError::InsufficientFunds`] if the balance does not cover
/// `amount`; nothing is written in that case.
pub fn charge(
    conn: &Connection,
    client_id: ClientId,
    amount: Money,
    link: PaymentLink,
    at: DateTime<Utc>,
) -> Result<Payment, ClubError> {
    if amount < Money::ZERO {
        return Err(ClubError::Validation(format!(
            "charge amount must not be negative, got {amount}"
        )));
    }
    let client = clients::require_client(conn, client_id)?;
    if client.balance < amount {
        return Err(ClubError::InsufficientFunds {
            cost: amount,
            balance: client.balance,
        });
    }
    clients::set_balance(conn, client_id, client.balance - amount)?;
    payments::insert_payment(
        conn,
        &NewPayment {
            client_id,
            payment_type: PaymentType::Charge,
            amount: -amount,
            created_at: at,
            session_id: link.session_id,
            reservation_id: link.reservation_id,
        },
    )
}

/// Add a positive `amount` to the client's balance as a TopUp or Refund.
pub fn credit(
    conn: &Connection,
    client_id: ClientId,
    payment_type: PaymentType,
    amount: Money,
    link: PaymentLink,
    at: DateTime<Utc>,
) -> Result<Payment, ClubError> {
    if payment_type == PaymentType::Charge {
        return Err(ClubError::Internal(
            "credit cannot record a charge".to_string(),
        ));
    }
    if amount <= Money::ZERO {
        return Err(ClubError::Validation(format!(
            "{payment_type} amount must be positive, got {amount}"
        )));
    }
    let client = clients::require_client(conn, client_id)?;
    clients::set_balance(conn, client_id, client.balance + amount)?;
    payments::insert_payment(
        conn,
        &NewPayment {
            client_id,
            payment_type,
            amount,
            created_at: at,
            session_id: link.session_id,
            reservation_id: link.reservation_id,
        },
    )
}

/// Comparison of a client's stored balance with the sum of their ledger.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reconciliation {
    pub client_id: ClientId,
    pub balance: Money,
    pub ledger_total: Money,
}

impl Reconciliation {
    pub fn is_consistent(&self) -> bool {
        self.balance == self.ledger_total
    }
}

fn reconcile_client(conn: &Connection, client_id: ClientId) -> Result<Reconciliation, ClubError> {
    let client = clients::require_client(conn, client_id)?;
    let ledger_total = payments::list_payments(conn, &PaymentFilter::for_client(client_id))?
        .iter()
        .map(|p| p.amount)
        .sum();
    Ok(Reconciliation {
        client_id,
        balance: client.balance,
        ledger_total,
    })
}

/// Signed payment totals over `[from, to)`, split by payment type.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CashSummary {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
    pub top_up: Money,
    /// Sum of Charge rows, so zero or negative.
    pub charge: Money,
    pub refund: Money,
    /// `top_up + charge + refund`.
    pub net: Money,
}

impl CashSummary {
    fn from_payments(from: DateTime<Utc>, to: DateTime<Utc>, rows: &[Payment]) -> Self {
        let total = |kind: PaymentType| -> Money {
            rows.iter()
                .filter(|p| p.payment_type == kind)
                .map(|p| p.amount)
                .sum()
        };
        let top_up = total(PaymentType::TopUp);
        let charge = total(PaymentType::Charge);
        let refund = total(PaymentType::Refund);
        Self {
            from,
            to,
            top_up,
            charge,
            refund,
            net: top_up + charge + refund,
        }
    }
}

/// Operator-facing ledger operations.
#[derive(Clone)]
pub struct Ledger {
    db: Database,
    clock: Arc<dyn Clock>,
}

impl Ledger {
    pub fn new(db: Database, clock: Arc<dyn Clock>) -> Self {
        Self { db, clock }
    }

    /// Credit a client's balance. `amount` must be positive.
    pub async fn top_up(&self, client_id: ClientId, amount: Money) -> Result<Payment, ClubError> {
        if amount <= Money::ZERO {
            return Err(ClubError::Validation(format!(
                "top-up amount must be positive, got {amount}"
            )));
        }
        let now = self.clock.now();
        let payment = self
            .db
            .unit_of_work(move |tx| {
                credit(tx, client_id, PaymentType::TopUp, amount, PaymentLink::none(), now)
            })
            .await?;
        info!(client_id = %client_id, amount = %amount, payment_id = %payment.id, "balance topped up");
        Ok(payment)
    }

    /// Payments matching `filter`, oldest first.
    pub async fn payments(&self, filter: PaymentFilter) -> Result<Vec<Payment>, ClubError> {
        self.db
            .call(move |conn| payments::list_payments(conn, &filter))
            .await
    }

    /// Sum of all top-ups the client has made.
    pub async fn total_top_up(&self, client_id: ClientId) -> Result<Money, ClubError> {
        let filter = PaymentFilter::for_client(client_id).with_type(PaymentType::TopUp);
        let rows = self.payments(filter).await?;
        Ok(rows.iter().map(|p| p.amount).sum())
    }

    /// Gross amount charged to the client, as a positive number. Refunds are
    /// not netted out.
    pub async fn total_spent(&self, client_id: ClientId) -> Result<Money, ClubError> {
        let filter = PaymentFilter::for_client(client_id).with_type(PaymentType::Charge);
        let rows = self.payments(filter).await?;
        Ok(-rows.iter().map(|p| p.amount).sum::<Money>())
    }

    /// Per-type totals for every payment created in `[from, to)`.
    pub async fn summary(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<CashSummary, ClubError> {
        if to <= from {
            return Err(ClubError::Validation(format!(
                "summary range must end after it starts, got {from} to {to}"
            )));
        }
        let rows = self.payments(PaymentFilter::default().between(from, to)).await?;
        Ok(CashSummary::from_payments(from, to, &rows))
    }

    /// [`Ledger::summary`] for the current UTC day.
    pub async fn summary_today(&self) -> Result<CashSummary, ClubError> {
        let from = self
            .clock
            .now()
            .date_naive()
            .and_time(chrono::NaiveTime::MIN)
            .and_utc();
        self.summary(from, from + TimeDelta::days(1)).await
    }

    pub async fn reconcile(&self, client_id: ClientId) -> Result<Reconciliation, ClubError> {
        self.db
            .call(move |conn| reconcile_client(conn, client_id))
            .await
    }

    /// Reconcile every client, in id order.
    pub async fn reconcile_all(&self) -> Result<Vec<Reconciliation>, ClubError> {
        self.db
            .call(|conn| {
                clients::list_clients(conn)?
                    .into_iter()
                    .map(|c| reconcile_client(conn, c.id))
                    .collect()
            })
            .await
    }
}
