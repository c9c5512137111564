pub mod config;
pub mod errors;
pub mod message_types;
pub mod monitor;
pub mod server;

pub use config::CoordinatorConfig;
pub use errors::RpcStatus;
pub use monitor::{ChainBackend, ConfirmationStream, MockChain};
pub use server::TradeCoordinator;
