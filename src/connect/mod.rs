//! Connection core — pure decision logic, zero I/O.
//!
//! This module owns the printer's side of the cloud-management protocol:
//! which event to send next, when to fall back to telemetry, how to back off
//! after failures, and how inbound commands turn into outbound answers.
//! Everything external (printer control, the download engine, the transport
//! itself) is reached through **port traits** defined in [`ports`], keeping
//! the whole layer testable with mock adapters.

pub mod changes;
pub mod command;
pub mod event;
pub mod planner;
pub mod ports;
