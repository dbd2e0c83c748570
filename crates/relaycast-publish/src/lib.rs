//! `relaycast-publish` — the Publisher Gate (spec §4.5).

pub mod gate;

pub use gate::PublisherGate;
