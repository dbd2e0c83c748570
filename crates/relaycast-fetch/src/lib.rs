//! `relaycast-fetch` — the Content Fetcher and Fingerprinter (spec §4.3–§4.4).

pub mod fetcher;
pub mod fingerprint;
pub mod links;

pub use fetcher::fetch_random;
pub use fingerprint::{fingerprint, media_hash};
pub use links::clean_telegram_links;
