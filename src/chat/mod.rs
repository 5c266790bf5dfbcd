//! Chat server core — registry, broadcast, session handling, acceptor.

pub mod broadcast;
pub mod codec;
pub mod config;
pub mod registry;
pub mod server;
pub mod session;
pub mod validate;

pub use broadcast::Broadcaster;
pub use config::ServerConfig;
pub use registry::{Registry, RegistryError, SessionHandle, SessionId};
pub use server::Server;
