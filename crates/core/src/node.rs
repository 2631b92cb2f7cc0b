// SPDX-License-Identifier: MIT

//! Node identity: `NodeStatus` and `NodeInfo`.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Membership state of a node at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeStatus {
    Up,
    Down,
}

impl fmt::Display for NodeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeStatus::Up => write!(f, "NodeUp"),
            NodeStatus::Down => write!(f, "NodeDown"),
        }
    }
}

/// Identity of a backend node at one instant. Immutable once constructed —
/// an "update" is always a new `NodeInfo` replacing a book entry, never a
/// mutation in place.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeInfo {
    name: String,
    status: NodeStatus,
    host: String,
    port: u16,
}

impl NodeInfo {
    /// `name` must be non-empty — watchers and reactors are trusted
    /// internal collaborators (spec-level contract, not an I/O boundary),
    /// so violations are a programming error, not a recoverable `Result`.
    pub fn new(name: impl Into<String>, status: NodeStatus, host: impl Into<String>, port: u16) -> Self {
        let name = name.into();
        debug_assert!(!name.is_empty(), "NodeInfo::name must be non-empty");
        Self { name, status, host: host.into(), port }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn status(&self) -> NodeStatus {
        self.status
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// A copy of this node with a different status, same identity/address.
    pub fn with_status(&self, status: NodeStatus) -> Self {
        Self { status, ..self.clone() }
    }
}

impl fmt::Display for NodeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Name: {}, Status: {}, Host: {}, Port: {}", self.name, self.status, self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_matches_go_original_format() {
        let n = NodeInfo::new("web1", NodeStatus::Up, "10.0.0.1", 8080);
        assert_eq!(n.to_string(), "Name: web1, Status: NodeUp, Host: 10.0.0.1, Port: 8080");
    }

    #[test]
    fn with_status_preserves_identity() {
        let n = NodeInfo::new("web1", NodeStatus::Up, "10.0.0.1", 8080);
        let down = n.with_status(NodeStatus::Down);
        assert_eq!(down.name(), "web1");
        assert_eq!(down.host(), "10.0.0.1");
        assert_eq!(down.port(), 8080);
        assert_eq!(down.status(), NodeStatus::Down);
    }
}
