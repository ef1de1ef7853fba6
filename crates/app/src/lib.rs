//! # presence-app
//!
//! Application layer: the event dispatcher and **port definitions** (traits).
//!
//! ## Responsibilities
//! - Define **port traits** that adapters must implement (driven/outbound ports):
//!   - `MessagePublisher`: fire-and-forget publish on the message bus
//! - Define the **inbound message type** the transport hands over
//! - Provide the `EventDispatcher`, which owns the rule registry, the device
//!   state cache and the override timers, and processes inbound messages
//!   strictly one at a time
//!
//! ## Dependency rule
//! Depends on `presence-domain` only (plus `tokio` for channels and timers).
//! Never imports adapter crates. Adapters depend on *this* crate, not the reverse.

pub mod dispatcher;
pub mod inbound;
pub mod ports;
