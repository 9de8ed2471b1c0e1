//! Sessions and servers on top of the chanmux multiplexer.
//!
//! This is the layer applications talk to:
//! - [`Client`] connects to an endpoint and hands out pooled [`Session`]s
//! - [`Server`] accepts connections and runs a [`Handler`] for every channel
//! - [`WireRead`]/[`WireWrite`] read and write length-prefixed values
//!   (integers, bytes, strings, JSON) on any session or channel

pub mod client;
pub mod error;
pub mod server;
pub mod wire;

pub use client::{Client, Session};
pub use error::{PeerError, Result};
pub use server::{Handler, Server};
pub use wire::{WireRead, WireWrite, DEFAULT_MAX_WIRE_LEN};
