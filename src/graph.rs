//! Property graph interface used by the executor.
//!
//! The engine depends only on [`Graph`]. [`MemoryGraph`] is the in-memory
//! implementation used by tests and benchmarks.

use crate::ast::Direction;
use crate::value::{NodeId, RelationshipId, Value, ValueMap};
use smol_str::SmolStr;

#[derive(Debug, Clone, PartialEq, Default)]
pub struct NodeRecord {
    pub labels: Vec<SmolStr>,
    pub properties: ValueMap,
}

impl NodeRecord {
    pub fn has_label(&self, label: &str) -> bool {
        self.labels.iter().any(|l| l == label)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RelationshipRecord {
    pub rel_type: SmolStr,
    pub start: NodeId,
    pub end: NodeId,
    pub properties: ValueMap,
}

impl RelationshipRecord {
    /// The endpoint opposite `node`, if the relationship touches `node` in
    /// the given direction.
    pub fn other_end(&self, node: NodeId, direction: Direction) -> Option<NodeId> {
        match direction {
            Direction::Outgoing if self.start == node => Some(self.end),
            Direction::Incoming if self.end == node => Some(self.start),
            Direction::Either if self.start == node => Some(self.end),
            Direction::Either if self.end == node => Some(self.start),
            _ => None,
        }
    }
}

/// Storage seen by the executor.
pub trait Graph {
    fn node(&self, id: NodeId) -> Option<&NodeRecord>;

    fn relationship(&self, id: RelationshipId) -> Option<&RelationshipRecord>;

    /// Live node ids in ascending order.
    fn node_ids(&self) -> Vec<NodeId>;

    /// Live node ids carrying `label`, in ascending order.
    fn nodes_with_label(&self, label: &str) -> Vec<NodeId> {
        self.node_ids()
            .into_iter()
            .filter(|id| self.node(*id).is_some_and(|n| n.has_label(label)))
            .collect()
    }

    /// Relationships touching `node`, each reported once.
    fn relationships_of(&self, node: NodeId) -> Vec<RelationshipId>;

    fn node_count(&self) -> usize {
        self.node_ids().len()
    }

    fn create_node(&mut self, labels: Vec<SmolStr>, properties: ValueMap) -> NodeId;

    /// Returns `None` if either endpoint does not exist.
    fn create_relationship(
        &mut self,
        rel_type: SmolStr,
        start: NodeId,
        end: NodeId,
        properties: ValueMap,
    ) -> Option<RelationshipId>;

    /// Setting `Null` removes the property. Returns false for a missing node.
    fn set_node_property(&mut self, id: NodeId, key: SmolStr, value: Value) -> bool;

    fn set_relationship_property(&mut self, id: RelationshipId, key: SmolStr, value: Value)
    -> bool;

    /// Removes a node. Callers delete its relationships first.
    fn delete_node(&mut self, id: NodeId) -> bool;

    fn delete_relationship(&mut self, id: RelationshipId) -> bool;
}

/// Vector-backed graph. Ids are assigned sequentially from 0 and never
/// reused; deleted slots stay empty.
#[derive(Debug, Clone, Default)]
pub struct MemoryGraph {
    nodes: Vec<Option<NodeRecord>>,
    relationships: Vec<Option<RelationshipRecord>>,
    adjacency: Vec<Vec<RelationshipId>>,
}

impl MemoryGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Convenience for building fixtures.
    pub fn add_node<L, P, K, V>(&mut self, labels: L, properties: P) -> NodeId
    where
        L: IntoIterator,
        P: IntoIterator<Item = (K, V)>,
        L::Item: Into<SmolStr>,
        K: Into<SmolStr>,
        V: Into<Value>,
    {
        let labels = labels.into_iter().map(Into::into).collect();
        let properties = properties
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        self.create_node(labels, properties)
    }

    pub fn relationship_count(&self) -> usize {
        self.relationships.iter().flatten().count()
    }

    fn slot(id: u64) -> Option<usize> {
        usize::try_from(id).ok()
    }
}

impl Graph for MemoryGraph {
    fn node(&self, id: NodeId) -> Option<&NodeRecord> {
        self.nodes.get(Self::slot(id.0)?)?.as_ref()
    }

    fn relationship(&self, id: RelationshipId) -> Option<&RelationshipRecord> {
        self.relationships.get(Self::slot(id.0)?)?.as_ref()
    }

    fn node_ids(&self) -> Vec<NodeId> {
        self.nodes
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.is_some())
            .map(|(i, _)| NodeId(i as u64))
            .collect()
    }

    fn relationships_of(&self, node: NodeId) -> Vec<RelationshipId> {
        Self::slot(node.0)
            .and_then(|i| self.adjacency.get(i))
            .cloned()
            .unwrap_or_default()
    }

    fn create_node(&mut self, labels: Vec<SmolStr>, properties: ValueMap) -> NodeId {
        let id = NodeId(self.nodes.len() as u64);
        let properties = properties.into_iter().filter(|(_, v)| !v.is_null()).collect();
        self.nodes.push(Some(NodeRecord { labels, properties }));
        self.adjacency.push(Vec::new());
        id
    }

    fn create_relationship(
        &mut self,
        rel_type: SmolStr,
        start: NodeId,
        end: NodeId,
        properties: ValueMap,
    ) -> Option<RelationshipId> {
        self.node(start)?;
        self.node(end)?;
        let id = RelationshipId(self.relationships.len() as u64);
        let properties = properties.into_iter().filter(|(_, v)| !v.is_null()).collect();
        self.relationships.push(Some(RelationshipRecord {
            rel_type,
            start,
            end,
            properties,
        }));
        self.adjacency[Self::slot(start.0)?].push(id);
        if start != end {
            self.adjacency[Self::slot(end.0)?].push(id);
        }
        Some(id)
    }

    fn set_node_property(&mut self, id: NodeId, key: SmolStr, value: Value) -> bool {
        let Some(Some(node)) = Self::slot(id.0).and_then(|i| self.nodes.get_mut(i)) else {
            return false;
        };
        if value.is_null() {
            node.properties.shift_remove(&key);
        } else {
            node.properties.insert(key, value);
        }
        true
    }

    fn set_relationship_property(
        &mut self,
        id: RelationshipId,
        key: SmolStr,
        value: Value,
    ) -> bool {
        let Some(Some(rel)) = Self::slot(id.0).and_then(|i| self.relationships.get_mut(i)) else {
            return false;
        };
        if value.is_null() {
            rel.properties.shift_remove(&key);
        } else {
            rel.properties.insert(key, value);
        }
        true
    }

    fn delete_node(&mut self, id: NodeId) -> bool {
        Self::slot(id.0)
            .and_then(|i| self.nodes.get_mut(i))
            .and_then(Option::take)
            .is_some()
    }

    fn delete_relationship(&mut self, id: RelationshipId) -> bool {
        let Some(slot) = Self::slot(id.0) else {
            return false;
        };
        let Some(rel) = self.relationships.get_mut(slot).and_then(Option::take) else {
            return false;
        };
        for endpoint in [rel.start, rel.end] {
            if let Some(list) = Self::slot(endpoint.0).and_then(|i| self.adjacency.get_mut(i)) {
                list.retain(|r| *r != id);
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn people() -> MemoryGraph {
        let mut graph = MemoryGraph::new();
        graph.add_node(["Person"], [("name", "a")]);
        graph.add_node(["Person"], [("name", "b")]);
        graph.add_node(["NoPerson"], [("name", "a")]);
        graph
    }

    #[test]
    fn ids_start_at_zero_and_are_sequential() {
        let graph = people();
        assert_eq!(graph.node_ids(), [NodeId(0), NodeId(1), NodeId(2)]);
        assert_eq!(graph.nodes_with_label("Person"), [NodeId(0), NodeId(1)]);
        assert_eq!(
            graph.node(NodeId(2)).and_then(|n| n.properties.get("name")),
            Some(&Value::from("a"))
        );
    }

    #[test]
    fn relationships_are_indexed_on_both_ends() {
        let mut graph = people();
        let rel = graph
            .create_relationship("KNOWS".into(), NodeId(0), NodeId(1), ValueMap::new())
            .expect("endpoints exist");
        assert_eq!(graph.relationships_of(NodeId(0)), [rel]);
        assert_eq!(graph.relationships_of(NodeId(1)), [rel]);
        let record = graph.relationship(rel).expect("exists");
        assert_eq!(record.other_end(NodeId(1), Direction::Incoming), Some(NodeId(0)));
        assert_eq!(record.other_end(NodeId(1), Direction::Outgoing), None);
        assert!(graph
            .create_relationship("KNOWS".into(), NodeId(0), NodeId(9), ValueMap::new())
            .is_none());
    }

    #[test]
    fn self_loops_are_listed_once() {
        let mut graph = people();
        graph.create_relationship("SELF".into(), NodeId(0), NodeId(0), ValueMap::new());
        assert_eq!(graph.relationships_of(NodeId(0)).len(), 1);
    }

    #[test]
    fn deletion_leaves_ids_stable() {
        let mut graph = people();
        let rel = graph
            .create_relationship("KNOWS".into(), NodeId(0), NodeId(1), ValueMap::new())
            .expect("endpoints exist");
        assert!(graph.delete_relationship(rel));
        assert!(graph.relationships_of(NodeId(0)).is_empty());
        assert!(graph.delete_node(NodeId(0)));
        assert!(!graph.delete_node(NodeId(0)));
        assert_eq!(graph.node_ids(), [NodeId(1), NodeId(2)]);
        assert_eq!(graph.add_node(["Person"], [("name", "c")]), NodeId(3));
    }

    #[test]
    fn null_property_removes_key() {
        let mut graph = people();
        assert!(graph.set_node_property(NodeId(0), "age".into(), Value::Integer(3)));
        assert!(graph.set_node_property(NodeId(0), "name".into(), Value::Null));
        let node = graph.node(NodeId(0)).expect("exists");
        assert!(node.properties.get("name").is_none());
        assert_eq!(node.properties.get("age"), Some(&Value::Integer(3)));
        assert!(!graph.set_node_property(NodeId(7), "age".into(), Value::Null));
    }
}
