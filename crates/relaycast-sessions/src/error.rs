pub use relaycast_core::error::{RelayError as SessionError, Result};
