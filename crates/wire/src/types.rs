// SPDX-License-Identifier: MIT

//! Wire-shaped mirrors of `receptor_core::{NodeInfo, Event}`.
//!
//! These deliberately do not derive their serde shape from the in-process
//! types: the Go original's `pipe.NodeInfo` msgpack-encodes as a map with
//! capitalized field names and an integer `Status` (`NodeUp = 1`,
//! `NodeDown = 2`, matching its `iota`-based const block), which is a
//! different shape than what `receptor_core::NodeInfo`'s own serde impl
//! uses for config/debug purposes. Keeping the two separate means a
//! change to one never silently changes the other.

use std::collections::HashMap;

use receptor_core::{Event, NodeInfo, NodeStatus};
use serde::{Deserialize, Serialize};
use serde_repr::{Deserialize_repr, Serialize_repr};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize_repr, Deserialize_repr)]
#[repr(u8)]
pub enum WireNodeStatus {
    NodeUp = 1,
    NodeDown = 2,
}

impl From<NodeStatus> for WireNodeStatus {
    fn from(status: NodeStatus) -> Self {
        match status {
            NodeStatus::Up => WireNodeStatus::NodeUp,
            NodeStatus::Down => WireNodeStatus::NodeDown,
        }
    }
}

impl From<WireNodeStatus> for NodeStatus {
    fn from(status: WireNodeStatus) -> Self {
        match status {
            WireNodeStatus::NodeUp => NodeStatus::Up,
            WireNodeStatus::NodeDown => NodeStatus::Down,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct WireNodeInfo {
    pub name: String,
    pub status: WireNodeStatus,
    pub host: String,
    pub port: u16,
}

impl From<&NodeInfo> for WireNodeInfo {
    fn from(node: &NodeInfo) -> Self {
        Self {
            name: node.name().to_string(),
            status: node.status().into(),
            host: node.host().to_string(),
            port: node.port(),
        }
    }
}

impl From<&WireNodeInfo> for NodeInfo {
    fn from(wire: &WireNodeInfo) -> Self {
        NodeInfo::new(&wire.name, wire.status.into(), &wire.host, wire.port)
    }
}

/// A plugin-transport `Event`: a map from node name to its `WireNodeInfo`,
/// the same shape the Go original's `map[string]NodeInfo` msgpack-encodes
/// as.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WireEvent(pub HashMap<String, WireNodeInfo>);

impl From<&Event> for WireEvent {
    fn from(event: &Event) -> Self {
        Self(event.iter().map(|(name, node)| (name.to_string(), node.into())).collect())
    }
}

impl From<&WireEvent> for Event {
    fn from(wire: &WireEvent) -> Self {
        wire.0.values().map(NodeInfo::from).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use receptor_core::NodeStatus as CoreStatus;

    #[test]
    fn round_trips_a_node_through_the_wire_shape() {
        let node = NodeInfo::new("n1", CoreStatus::Up, "10.0.0.1", 8080);
        let wire = WireNodeInfo::from(&node);
        assert_eq!(wire.name, "n1");
        assert_eq!(wire.status, WireNodeStatus::NodeUp);
        let back = NodeInfo::from(&wire);
        assert_eq!(back, node);
    }

    #[test]
    fn round_trips_an_event_through_the_wire_shape() {
        let event = Event::with_node(NodeInfo::new("n1", CoreStatus::Down, "h", 1));
        let wire = WireEvent::from(&event);
        let back = Event::from(&wire);
        assert_eq!(back.get("n1"), event.get("n1"));
    }

    #[test]
    fn status_encodes_as_the_expected_integer() {
        // msgpack encodes small non-negative integers as a single fixint
        // byte equal to the value itself, so the wire bytes for `NodeUp`/
        // `NodeDown` must literally be `[1]`/`[2]`, not a variant name
        // string.
        assert_eq!(rmp_serde::to_vec(&WireNodeStatus::NodeUp).unwrap(), vec![1]);
        assert_eq!(rmp_serde::to_vec(&WireNodeStatus::NodeDown).unwrap(), vec![2]);

        let decoded: WireNodeStatus = rmp_serde::from_slice(&[1]).unwrap();
        assert_eq!(decoded, WireNodeStatus::NodeUp);
        let decoded: WireNodeStatus = rmp_serde::from_slice(&[2]).unwrap();
        assert_eq!(decoded, WireNodeStatus::NodeDown);
    }
}
