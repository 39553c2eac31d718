//! Printlink firmware core.
//!
//! The hardware-agnostic heart of the printer's cloud link: the connection
//! [`Planner`](connect::planner::Planner) that decides what to say to the
//! server next, and the USB recovery machinery that keeps the flash drive
//! (and a print running from it) alive through bus glitches.
//!
//! All I/O flows through port traits; the transport loop, the printer
//! control layer, and the download engine live outside this crate.

#![deny(unused_must_use)]

pub mod buffer;
pub mod config;
pub mod connect;
pub mod hotplug;
pub mod time;
pub mod usb_power;
