// SPDX-License-Identifier: MIT

//! `Book`: the authoritative, thread-safe ledger of currently-up nodes.
//!
//! Semantics are reproduced from `pipe.Book` in the original Go
//! implementation (`update_inc`/`update_full`/`full`), not re-derived —
//! see the inline comments on each branch.

use std::collections::HashMap;

use parking_lot::RwLock;

use crate::event::Event;
use crate::node::{NodeInfo, NodeStatus};

/// Thread-safe map from node name to its last-known `NodeInfo`. Created
/// empty, private to a single owning consumer.
#[derive(Default)]
pub struct Book {
    inner: RwLock<HashMap<String, NodeInfo>>,
}

impl Book {
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies an incremental update: `ev` carries only the nodes that
    /// changed. Returns the nodes whose observable state actually changed,
    /// or `None` if nothing did (the "null sentinel").
    pub fn update_inc(&self, ev: &Event) -> Option<Event> {
        let mut book = self.inner.write();
        let mut out = Event::new();
        for (_, node) in ev.iter() {
            match book.get(node.name()) {
                Some(known) if differs(known, node) => {
                    // Add/update if up, delete if down.
                    if node.status() == NodeStatus::Up {
                        book.insert(node.name().to_string(), node.clone());
                    } else {
                        book.remove(node.name());
                    }
                    out.insert(node.clone());
                }
                Some(_) => {
                    // Known and unchanged: nothing to emit.
                }
                None => {
                    // Unseen and going down: we never knew it was up, ignore.
                    if node.status() == NodeStatus::Down {
                        continue;
                    }
                    book.insert(node.name().to_string(), node.clone());
                    out.insert(node.clone());
                }
            }
        }
        if out.is_empty() {
            None
        } else {
            Some(out)
        }
    }

    /// Applies a full update: `ev` is the complete set of currently-up
    /// nodes. `Down` entries in `ev` are not a valid encoding here and are
    /// ignored. Any book entry missing from `ev` is synthesized as `Down`
    /// and removed. Returns the changes, or `None` if nothing changed.
    pub fn update_full(&self, ev: &Event) -> Option<Event> {
        let mut book = self.inner.write();
        let mut out = Event::new();
        let mut seen = std::collections::HashSet::new();

        for (_, node) in ev.iter() {
            if node.status() == NodeStatus::Down {
                continue;
            }
            match book.get(node.name()) {
                Some(known) if differs(known, node) => {
                    book.insert(node.name().to_string(), node.clone());
                    seen.insert(node.name().to_string());
                    out.insert(node.clone());
                }
                Some(_) => {
                    seen.insert(node.name().to_string());
                }
                None => {
                    seen.insert(node.name().to_string());
                    book.insert(node.name().to_string(), node.clone());
                    out.insert(node.clone());
                }
            }
        }

        let missing: Vec<NodeInfo> = book
            .iter()
            .filter(|(name, _)| !seen.contains(*name))
            .map(|(_, node)| node.with_status(NodeStatus::Down))
            .collect();
        for down in missing {
            book.remove(down.name());
            out.insert(down);
        }

        if out.is_empty() {
            None
        } else {
            Some(out)
        }
    }

    /// A current snapshot of every up node, as an `Event`.
    pub fn full(&self) -> Event {
        self.inner.read().values().cloned().collect()
    }
}

fn differs(known: &NodeInfo, incoming: &NodeInfo) -> bool {
    known.status() != incoming.status() || known.host() != incoming.host() || known.port() != incoming.port()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn up(name: &str, host: &str, port: u16) -> NodeInfo {
        NodeInfo::new(name, NodeStatus::Up, host, port)
    }

    fn down(name: &str, host: &str, port: u16) -> NodeInfo {
        NodeInfo::new(name, NodeStatus::Down, host, port)
    }

    fn event(nodes: Vec<NodeInfo>) -> Event {
        nodes.into_iter().collect()
    }

    /// Universal invariant 1: idempotence.
    #[test]
    fn update_inc_is_idempotent_for_known_up() {
        let book = Book::new();
        let ev = event(vec![up("n1", "h", 80)]);
        assert!(book.update_inc(&ev).is_some());
        assert!(book.update_inc(&ev).is_none());
    }

    #[test]
    fn update_inc_ignores_down_on_unknown_node() {
        let book = Book::new();
        let ev = event(vec![down("ghost", "h", 80)]);
        assert!(book.update_inc(&ev).is_none());
        assert!(book.full().is_empty());
    }

    /// S1: dedup of identical repeated incremental events.
    #[test]
    fn update_inc_dedups_identical_repeat() {
        let book = Book::new();
        let ev = event(vec![up("n1", "h", 80)]);
        let first = book.update_inc(&ev).unwrap();
        assert_eq!(first.len(), 1);
        assert!(book.update_inc(&ev).is_none());
    }

    #[test]
    fn update_inc_emits_on_changed_fields() {
        let book = Book::new();
        book.update_inc(&event(vec![up("n1", "h", 80)]));
        let out = book.update_inc(&event(vec![up("n1", "h", 81)])).unwrap();
        assert_eq!(out.get("n1").unwrap().port(), 81);
    }

    /// Table coverage of every `update_inc` branch: known+changed (both
    /// directions), known+unchanged, and unknown (both directions).
    #[yare::parameterized(
        known_up_to_down = { Some(up("n1", "h", 80)), down("n1", "h", 80), Some(NodeStatus::Down), false },
        known_changed_port = { Some(up("n1", "h", 80)), up("n1", "h", 81), Some(NodeStatus::Up), true },
        known_unchanged = { Some(up("n1", "h", 80)), up("n1", "h", 80), None, true },
        unknown_up = { None, up("n1", "h", 80), Some(NodeStatus::Up), true },
        unknown_down = { None, down("n1", "h", 80), None, false },
    )]
    fn update_inc_branches(prior: Option<NodeInfo>, incoming: NodeInfo, emitted: Option<NodeStatus>, stored: bool) {
        let book = Book::new();
        if let Some(prior) = prior {
            book.update_inc(&event(vec![prior]));
        }

        let out = book.update_inc(&event(vec![incoming]));
        match emitted {
            Some(status) => assert_eq!(out.unwrap().get("n1").unwrap().status(), status),
            None => assert!(out.is_none()),
        }
        assert_eq!(book.full().get("n1").is_some(), stored);
    }

    /// S2: synthesized down events on full update.
    #[test]
    fn update_full_synthesizes_down_for_missing_nodes() {
        let book = Book::new();
        book.update_full(&event(vec![up("n1", "h", 1), up("n2", "h", 2), up("n3", "h", 3)]));

        let out = book.update_full(&event(vec![up("n1", "h", 1), up("n2", "h", 2), up("n4", "h", 4)])).unwrap();

        assert_eq!(out.get("n3").unwrap().status(), NodeStatus::Down);
        assert_eq!(out.get("n4").unwrap().status(), NodeStatus::Up);
        assert!(out.get("n1").is_none());
        assert!(out.get("n2").is_none());
    }

    #[test]
    fn update_full_ignores_down_entries_in_input() {
        let book = Book::new();
        let out = book.update_full(&event(vec![down("n1", "h", 1)]));
        assert!(out.is_none());
        assert!(book.full().is_empty());
    }

    /// Universal invariant 2: Full() after two update_full calls equals the
    /// second event restricted to Up entries.
    #[test]
    fn full_after_two_update_full_equals_second_ups() {
        let book = Book::new();
        book.update_full(&event(vec![up("n1", "h", 1), up("n2", "h", 2)]));
        book.update_full(&event(vec![up("n2", "h", 2), up("n3", "h", 3), down("n9", "h", 9)]));

        let full = book.full();
        assert_eq!(full.len(), 2);
        assert!(full.get("n2").is_some());
        assert!(full.get("n3").is_some());
        assert!(full.get("n1").is_none());
    }
}

#[cfg(feature = "test-support")]
pub mod proptest_support {
    //! Property-style coverage for the universal Book invariants, gated
    //! behind `test-support` so downstream crates can reuse the strategies.
    use proptest::prelude::*;

    use super::*;

    pub fn arb_node_info(name: &'static str) -> impl Strategy<Value = NodeInfo> {
        (any::<bool>(), "[a-z]{1,8}", 1u16..=65535).prop_map(move |(up, host, port)| {
            NodeInfo::new(name, if up { NodeStatus::Up } else { NodeStatus::Down }, host, port)
        })
    }

    fn event(nodes: Vec<NodeInfo>) -> Event {
        nodes.into_iter().collect()
    }

    proptest! {
        #[test]
        fn update_inc_never_emits_down_for_node_never_seen(node in arb_node_info("n1")) {
            let book = Book::new();
            let out = book.update_inc(&event(vec![node.clone()]));
            if node.status() == NodeStatus::Down {
                prop_assert!(out.is_none());
            }
        }

        #[test]
        fn update_full_restricted_to_ups_matches_full(
            first in proptest::collection::vec(arb_node_info("n1"), 0..3),
            second in proptest::collection::vec(arb_node_info("n2"), 0..3),
        ) {
            let book = Book::new();
            book.update_full(&event(first));
            book.update_full(&event(second.clone()));
            let full = book.full();
            let expected_ups: std::collections::HashSet<_> =
                second.iter().filter(|n| n.status() == NodeStatus::Up).map(|n| n.name().to_string()).collect();
            let full_names: std::collections::HashSet<_> = full.iter().map(|(name, _)| name.clone()).collect();
            prop_assert_eq!(full_names, expected_ups);
        }
    }
}
