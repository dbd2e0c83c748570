//! `relaycast-core` — shared configuration, error taxonomy, and domain types.
//!
//! Every other crate in the workspace depends on this one; it carries no
//! storage or network code of its own.

pub mod config;
pub mod error;
pub mod types;

pub use config::RelayConfig;
pub use error::{RelayError, Result};
pub use types::{CandidatePost, ChannelRef, ContentKind, PublishPayload, SlotStatus};
