pub mod bridge;
pub mod config;
pub mod handler;
pub mod ipc;

pub use bridge::BridgeError;
pub use config::ConfigError;
pub use handler::HandlerError;
pub use ipc::IpcError;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Ipc(#[from] ipc::IpcError),

    #[error(transparent)]
    Bridge(#[from] bridge::BridgeError),

    #[error(transparent)]
    Config(#[from] config::ConfigError),

    #[error(transparent)]
    Handler(#[from] handler::HandlerError),
}
