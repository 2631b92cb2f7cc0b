// SPDX-License-Identifier: MIT

//! `Event`: a named mapping from node name to `NodeInfo`, the atomic unit of
//! delivery through the pipeline.

use std::collections::HashMap;
use std::collections::hash_map::{IntoIter, Iter};

use serde::{Deserialize, Serialize};

use crate::node::NodeInfo;

/// A set of same-timestamp node changes. May be empty (a full snapshot with
/// nothing up is a meaningful, valid event).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Event {
    nodes: HashMap<String, NodeInfo>,
}

impl Event {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_node(node: NodeInfo) -> Self {
        let mut ev = Self::new();
        ev.insert(node);
        ev
    }

    /// Keys by `node.name()`, preserving the "value's name equals its key"
    /// invariant unconditionally.
    pub fn insert(&mut self, node: NodeInfo) {
        self.nodes.insert(node.name().to_string(), node);
    }

    pub fn get(&self, name: &str) -> Option<&NodeInfo> {
        self.nodes.get(name)
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn iter(&self) -> Iter<'_, String, NodeInfo> {
        self.nodes.iter()
    }

    /// Per-key last-writer-wins merge: every node in `newer` overwrites (or
    /// adds) the corresponding entry here. Nodes present only in `self` are
    /// left untouched — removal is expressed via an explicit `Down` entry,
    /// never by omission.
    pub fn update(&mut self, newer: &Event) {
        for (name, node) in &newer.nodes {
            self.nodes.insert(name.clone(), node.clone());
        }
    }
}

impl FromIterator<NodeInfo> for Event {
    fn from_iter<T: IntoIterator<Item = NodeInfo>>(iter: T) -> Self {
        let mut ev = Self::new();
        for node in iter {
            ev.insert(node);
        }
        ev
    }
}

impl IntoIterator for Event {
    type Item = (String, NodeInfo);
    type IntoIter = IntoIter<String, NodeInfo>;

    fn into_iter(self) -> Self::IntoIter {
        self.nodes.into_iter()
    }
}

impl<'a> IntoIterator for &'a Event {
    type Item = (&'a String, &'a NodeInfo);
    type IntoIter = Iter<'a, String, NodeInfo>;

    fn into_iter(self) -> Self::IntoIter {
        self.nodes.iter()
    }
}
