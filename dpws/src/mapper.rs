//! Lookup tables from configured ids to constructed AS indices.

use rustc_hash::FxHashMap;

/// Maps AS ids and placed node ids to the index of the owning AS in the
/// construction order. Duplicate insertions keep the first entry and are
/// logged; the run proceeds.
#[derive(Debug, Default)]
pub struct NodeLookupMapper {
    as_index_by_as_id: FxHashMap<String, usize>,
    as_index_by_node_id: FxHashMap<String, usize>,
}

impl NodeLookupMapper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_as(&mut self, as_id: &str, as_index: usize) {
        if self.as_index_by_as_id.contains_key(as_id) {
            tracing::warn!(as_id, "duplicate AS id in mapper, keeping first entry");
            return;
        }
        self.as_index_by_as_id.insert(as_id.to_string(), as_index);
    }

    pub fn insert_node(&mut self, node_id: &str, as_index: usize) {
        if self.as_index_by_node_id.contains_key(node_id) {
            tracing::warn!(node_id, "duplicate node id in mapper, keeping first entry");
            return;
        }
        self.as_index_by_node_id
            .insert(node_id.to_string(), as_index);
    }

    pub fn as_index_by_as_id(&self, as_id: &str) -> Option<usize> {
        self.as_index_by_as_id.get(as_id).copied()
    }

    pub fn as_index_by_node_id(&self, node_id: &str) -> Option<usize> {
        self.as_index_by_node_id.get(node_id).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicates_keep_the_first_entry() {
        let mut mapper = NodeLookupMapper::new();
        mapper.insert_as("as-1", 0);
        mapper.insert_as("as-1", 5);
        assert_eq!(mapper.as_index_by_as_id("as-1"), Some(0));

        mapper.insert_node("victim", 0);
        mapper.insert_node("victim", 3);
        assert_eq!(mapper.as_index_by_node_id("victim"), Some(0));
        assert_eq!(mapper.as_index_by_node_id("ghost"), None);
    }
}
