//! charla — a minimal multi-client TCP chat server.
//!
//! A central listener accepts connections, assigns each a unique nickname
//! via a short handshake, and relays every chat message to all other
//! connected clients. The interactive terminal client is a separate
//! program; this crate is the server plus the validation rules that
//! client is expected to apply before putting anything on the wire.

pub mod chat;
