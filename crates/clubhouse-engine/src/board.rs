// SPDX-FileCopyrightText: 2026 Clubhouse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Live display rows for active sessions.
//!
//! [`SessionBoard`] is a [`TickObserver`]: every tick it recomputes elapsed
//! time, remaining time, and running cost from the sessions it last loaded.
//! It never writes to storage. Call [`SessionBoard::reload`] after sessions
//! open or close; the engine sweep does so on every run.

use std::collections::HashSet;
use std::sync::{PoisonError, RwLock};

use chrono::{DateTime, TimeDelta, Utc};
use clubhouse_billing::cost;
use clubhouse_core::types::duration_ms;
use clubhouse_core::{ClientId, ClubError, ComputerId, Money, Session, SessionId};
use clubhouse_storage::Database;
use clubhouse_storage::queries::{sessions, tariffs};
use serde::{Serialize, Serializer};
use tracing::{debug, warn};

use crate::tick::TickObserver;

/// One active session as shown to operators.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BoardRow {
    pub session_id: SessionId,
    pub client_id: ClientId,
    pub computer_id: ComputerId,
    pub started_at: DateTime<Utc>,
    pub planned_end_at: DateTime<Utc>,
    #[serde(with = "duration_ms")]
    pub elapsed: TimeDelta,
    #[serde(with = "duration_ms")]
    pub remaining: TimeDelta,
    /// Cost of the time used so far at the session's tariff.
    pub running_cost: Money,
    /// How far the session has run past its planned end, if it has.
    #[serde(serialize_with = "overtime_ms")]
    pub overtime: Option<TimeDelta>,
}

fn overtime_ms<S: Serializer>(value: &Option<TimeDelta>, serializer: S) -> Result<S::Ok, S::Error> {
    match value {
        Some(overtime) => serializer.serialize_some(&overtime.num_milliseconds()),
        None => serializer.serialize_none(),
    }
}

impl BoardRow {
    fn compute(session: &Session, price_per_hour: Money, now: DateTime<Utc>) -> Self {
        let elapsed = session.elapsed(now);
        Self {
            session_id: session.id,
            client_id: session.client_id,
            computer_id: session.computer_id,
            started_at: session.started_at,
            planned_end_at: session.planned_end_at(),
            elapsed,
            remaining: session.remaining(now),
            running_cost: cost(elapsed, price_per_hour),
            overtime: session.overtime(now),
        }
    }
}

#[derive(Default)]
struct BoardState {
    sessions: Vec<(Session, Money)>,
    rows: Vec<BoardRow>,
    /// Sessions already reported as overtime.
    warned: HashSet<SessionId>,
}

pub struct SessionBoard {
    db: Database,
    state: RwLock<BoardState>,
}

impl SessionBoard {
    pub fn new(db: Database) -> Self {
        Self {
            db,
            state: RwLock::new(BoardState::default()),
        }
    }

    /// Reload active sessions and their tariff prices from storage.
    ///
    /// Rows refresh on the next tick. Returns the number of sessions loaded.
    pub async fn reload(&self) -> Result<usize, ClubError> {
        let loaded = self
            .db
            .call(|conn| {
                sessions::list_active_sessions(conn)?
                    .into_iter()
                    .map(|s| {
                        let price = tariffs::require_tariff(conn, s.tariff_id)?.price_per_hour;
                        Ok((s, price))
                    })
                    .collect::<Result<Vec<_>, ClubError>>()
            })
            .await?;
        let count = loaded.len();
        self.replace(loaded);
        debug!(sessions = count, "session board reloaded");
        Ok(count)
    }

    /// Replace the tracked sessions without touching storage.
    pub fn replace(&self, sessions: Vec<(Session, Money)>) {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        let live: HashSet<SessionId> = sessions.iter().map(|(s, _)| s.id).collect();
        state.warned.retain(|id| live.contains(id));
        state.rows.retain(|row| live.contains(&row.session_id));
        state.sessions = sessions;
    }

    /// Current rows, as of the last tick.
    pub fn rows(&self) -> Vec<BoardRow> {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .rows
            .clone()
    }

    fn refresh(&self, now: DateTime<Utc>) {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        let rows: Vec<BoardRow> = state
            .sessions
            .iter()
            .map(|(s, price)| BoardRow::compute(s, *price, now))
            .collect();
        for row in &rows {
            if let Some(over) = row.overtime {
                if state.warned.insert(row.session_id) {
                    warn!(
                        session_id = %row.session_id,
                        computer_id = %row.computer_id,
                        overtime_secs = over.num_seconds(),
                        "session is past its planned end"
                    );
                }
            }
        }
        state.rows = rows;
    }
}

impl TickObserver for SessionBoard {
    fn on_tick(&self, now: DateTime<Utc>) {
        self.refresh(now);
    }
}
