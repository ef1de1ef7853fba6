//! # presence-domain
//!
//! Pure domain model for the presence lighting controller.
//!
//! ## Responsibilities
//! - Foundational types: error conventions, timestamps, deadlines
//! - Define **Rules** (sensors, cancel switches, controllable devices)
//! - Hold the **Rule Registry** and its startup validation
//! - Hold the **Device State Cache** (last observed payload per device)
//! - Hold the **Override State** (sleep and suppression windows)
//! - Decode inbound payloads into typed values
//! - Translate a desired on/off state into outbound publishes
//!
//! ## Dependency rule
//! This crate has **no internal dependencies**.
//! It must never import anything from `app`, adapters, or external IO crates.
//! All IO boundaries are expressed as traits in the `app` crate (ports).

pub mod error;
pub mod time;

pub mod command;
pub mod device_state;
pub mod override_state;
pub mod payload;
pub mod registry;
pub mod rule;
