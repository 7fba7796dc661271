//! # datumdb core
//!
//! An in-process, immutable-snapshot, attribute-value database.
//!
//! Data is modeled as datums: `(entity, attribute, value, transaction)`
//! tuples kept in four sorted indexes (EAV, AEV, AVE, VAE) built on
//! persistent copy-on-write B-trees. A single writer applies batches of
//! claims atomically; any number of concurrent readers take cheap
//! snapshots that stay internally consistent regardless of later writes.
//!
//! This crate provides:
//! - The value domain and datum model
//! - Typed and composite indexes with structural-sharing clones
//! - The schema cache and bootstrap system schema
//! - The transactor: reference resolution, uniqueness, cardinality,
//!   schema evolution, atomic commit
//! - Snapshots with exact and range lookups

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod claim;
mod config;
mod database;
mod datum;
mod error;
pub mod index;
mod iter;
mod schema;
mod snapshot;
pub mod sys;
mod value;

pub use claim::{ARef, Claim, ERef, LookupRef, Request, Response, TempId, VRef};
pub use config::Config;
pub use database::Database;
pub use datum::Datum;
pub use error::{DbError, DbResult};
pub use iter::Datums;
pub use schema::{Attr, Schema};
pub use snapshot::Snapshot;
pub use value::{Id, Ident, Value};
