pub use relaycast_core::error::{RelayError as StoreError, Result};
