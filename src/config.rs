//! Connection configuration.
//!
//! The values the link needs to reach its server. Loading (ini file, user
//! setup screens) and persistence live with the host; the printer port hands
//! the core a snapshot together with a "changed since last look" flag so the
//! planner can notice a server switch mid-flight.

use serde::{Deserialize, Serialize};

/// Longest accepted server hostname.
pub const HOST_MAX: usize = 64;
/// Longest accepted registration token.
pub const TOKEN_MAX: usize = 32;

/// One server endpoint, as configured by the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectConfig {
    pub host: heapless::String<HOST_MAX>,
    pub port: u16,
    pub token: heapless::String<TOKEN_MAX>,
    /// Whether the main connection uses TLS.
    pub tls: bool,
}

impl Default for ConnectConfig {
    fn default() -> Self {
        Self {
            host: heapless::String::new(),
            port: 80,
            token: heapless::String::new(),
            tls: false,
        }
    }
}
