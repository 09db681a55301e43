//! Realtime event monitor.
//!
//! # Data Flow
//! ```text
//! CometBFT websocket
//!     → stream.rs (connect, subscribe, reconnect with backoff)
//!     → decode.rs (envelope → dedup → payload → contract filter)
//!     → mpsc channel of MonitorEvent (paint, contract tx, status)
//! ```

pub mod decode;
pub mod dedup;
pub mod stream;
pub mod types;

pub use decode::{
    decode_tx_payload, extract_tx_data, process_message, ContractFilter, DecodeError, TxData,
};
pub use dedup::DedupSet;
pub use stream::{MonitorHandle, RealtimeMonitor, SUBSCRIBE_MESSAGE};
pub use types::{ChainEvent, MonitorError, MonitorEvent, PaintEvent, StreamStatus};
