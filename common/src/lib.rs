pub mod board;
pub mod config;
pub mod cycle;
pub mod decode;
pub mod page;
pub mod ready;
pub mod registers;
pub mod report;
pub mod responder;
pub mod station;
pub mod types;

#[cfg(test)]
mod testing;

pub use board::{BoardError, SenseBoard};
pub use config::{
    ConfigError, DiagnosticsMode, NetworkConfig, NetworkMode, RuntimeConfig, SenseConfig,
};
pub use cycle::CyclePeriod;
pub use page::{PageError, PageOptions};
pub use ready::ReadySignal;
pub use responder::{Connections, TcpConnections};
pub use station::{Poll, Station, StationError, StationSettings};
pub use types::Readings;
