//! `relaycast-sessions` — the Session Pool (spec §4.2).
//!
//! Owns the live MTProto connections backing the Content Fetcher and the
//! RepostStream poller. Sessions are keyed by credential string and shared
//! process-wide; nothing outside this crate constructs a [`reader::GrammersSession`]
//! directly.

pub mod error;
pub mod manager;
pub mod reader;
pub mod types;

pub use error::{Result, SessionError};
pub use manager::SessionPool;
pub use reader::GrammersSession;
pub use types::{MediaRef, MediaRefInner, ReaderSession, ResolvedChat, UpstreamMedia, UpstreamMessage};
