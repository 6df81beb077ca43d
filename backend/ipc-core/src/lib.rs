pub mod bridge;
pub mod config;
pub mod error;
pub mod ipc;

#[cfg(test)]
mod tests;

pub const BRIDGE_BIND_HOST: &str = "127.0.0.1";
pub const BRIDGE_DEFAULT_PORT: u16 = 19876;
pub const BRIDGE_DEFAULT_URL: &str =
    const_format::concatcp!("ws://", BRIDGE_BIND_HOST, ":", BRIDGE_DEFAULT_PORT);
