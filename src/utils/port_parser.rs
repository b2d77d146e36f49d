//! Port list parsing

use crate::error::{ScanError, ScanResult};
use serde::{Deserialize, Serialize};

/// Handling of tokens that are not base-10 integers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PortPolicy {
    /// Drop the token and keep going
    #[default]
    Lenient,
    /// Fail the whole parse
    Strict,
}

/// Ordered port list, duplicates kept, plus the tokens dropped on the way
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PortSet {
    ports: Vec<u16>,
    discarded: Vec<String>,
}

impl PortSet {
    /// Parse a comma separated port list (e.g. "22, 80,443").
    ///
    /// Empty tokens are always skipped. Numbers above 65535 are rejected
    /// under either policy.
    pub fn parse(input: &str, policy: PortPolicy) -> ScanResult<Self> {
        let mut set = PortSet::default();

        for token in input.split(',') {
            let token = token.trim();
            if token.is_empty() {
                continue;
            }

            if !token.bytes().all(|b| b.is_ascii_digit()) {
                match policy {
                    PortPolicy::Lenient => {
                        set.discarded.push(token.to_string());
                        continue;
                    }
                    PortPolicy::Strict => return Err(ScanError::MalformedPortToken(token.to_string())),
                }
            }

            // All digits, so parsing can only fail on overflow
            let port = token
                .parse::<u64>()
                .ok()
                .and_then(|value| u16::try_from(value).ok())
                .ok_or_else(|| ScanError::InvalidPortNumber(token.to_string()))?;
            set.ports.push(port);
        }

        if !set.discarded.is_empty() {
            log::warn!("Ignoring malformed port tokens: {}", set.discarded.join(", "));
        }

        Ok(set)
    }

    pub fn ports(&self) -> &[u16] {
        &self.ports
    }

    /// Tokens skipped under the lenient policy
    pub fn discarded(&self) -> &[String] {
        &self.discarded
    }

    pub fn len(&self) -> usize {
        self.ports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ports.is_empty()
    }
}
