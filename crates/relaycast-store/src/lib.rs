//! `relaycast-store` — the per-tenant Tenant Store (spec §4.1).
//!
//! One SQLite database per tenant, opened with WAL + NORMAL sync. Exposes
//! the transactional primitives the Slot Engine relies on for at-most-once
//! publication (`reserve_slot`/`commit_slot`/`release_slot`) and per-channel
//! dedup (`reserve_dedup`/`release_dedup`).

pub mod db;
pub mod error;
pub mod json;
pub mod tenant;
pub mod types;

pub use db::{open_tenant_db, tenant_db_path};
pub use error::{Result, StoreError};
pub use tenant::TenantStore;
pub use types::*;
