//! Client side of the stormcast protocol.
//!
//! [`Client`] drives the two-step handshake (credentials, then key
//! confirmation) and the encrypted receive loop. Received alerts are pushed
//! into a [`Console`] sink so front ends only implement one method.

pub mod client;
pub mod console;

pub use client::{Client, ClientError};
pub use console::{Console, Severity, TracingConsole};
