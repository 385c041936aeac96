// SPDX-FileCopyrightText: 2026 Clubhouse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Query modules for CRUD operations on storage entities.
//!
//! Every function is synchronous and takes a plain `&Connection`, so callers
//! compose several of them inside one [`Database::unit_of_work`] or
//! [`Database::call`]. A `&Transaction` derefs to `&Connection`.
//!
//! [`Database::unit_of_work`]: crate::Database::unit_of_work
//! [`Database::call`]: crate::Database::call

pub mod clients;
pub mod computers;
pub mod payments;
pub mod reservations;
pub mod sessions;
pub mod tariffs;
