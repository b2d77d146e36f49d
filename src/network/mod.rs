//! Network module: connect probing and reverse DNS

pub mod prober;
pub mod resolver;
pub mod socket;

use serde::{Deserialize, Serialize};

pub use prober::TargetProber;
pub use resolver::{NameCache, NoopResolver, SystemResolver};
pub use socket::TcpConnectScanner;

/// Server name reported when reverse DNS gives nothing useful
pub const UNRESOLVED_NAME: &str = "Unknown";

/// Server name to report for a lookup outcome
pub fn server_name(name: Option<&str>) -> String {
    name.unwrap_or(UNRESOLVED_NAME).to_string()
}

/// Reachability of one (address, port) pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProbeStatus {
    Open,
    Closed,
}

impl ProbeStatus {
    pub fn from_reachable(reachable: bool) -> Self {
        if reachable {
            ProbeStatus::Open
        } else {
            ProbeStatus::Closed
        }
    }

    pub fn is_open(&self) -> bool {
        matches!(self, ProbeStatus::Open)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ProbeStatus::Open => "Open",
            ProbeStatus::Closed => "Closed",
        }
    }
}

impl std::fmt::Display for ProbeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_wire_form() {
        assert_eq!(serde_json::to_string(&ProbeStatus::Open).unwrap(), "\"Open\"");
        assert_eq!(ProbeStatus::from_reachable(false).to_string(), "Closed");
    }
}
