//! Hierarchy assembly for recursive self-relations.
//!
//! Flat rows become nested trees through an arena keyed by id plus a
//! parent-id index, assembled breadth-first into owned JSON arrays. There
//! are no shared references between parents and children, so parent loops
//! in the data cannot produce reference cycles here.

use crate::Entity;
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::collections::VecDeque;
use tracing::warn;

/// Builds parent/children trees from flat entities.
///
/// `id_field` and `parent_field` name logical fields on the entities;
/// children land under `children_field` as an array, in input order. Roots
/// are entities whose parent is null, missing, or not present in the input.
/// Entities only reachable through a parent loop are dropped (and counted
/// in a warning) rather than attached arbitrarily.
pub fn build_hierarchy(
    entities: Vec<Entity>,
    id_field: &str,
    parent_field: &str,
    children_field: &str,
) -> Vec<Entity> {
    // Arena: entities stay in their input slots; all structure lives in
    // index maps until assembly.
    let index_by_id: HashMap<String, usize> = entities
        .iter()
        .enumerate()
        .filter_map(|(i, e)| e.get(id_field).map(|id| (key_of(id), i)))
        .collect();

    let mut children_of: HashMap<usize, Vec<usize>> = HashMap::new();
    let mut roots: Vec<usize> = Vec::new();

    for (index, entity) in entities.iter().enumerate() {
        let parent_index = entity
            .get(parent_field)
            .filter(|v| !v.is_null())
            .and_then(|parent_id| index_by_id.get(&key_of(parent_id)).copied());
        match parent_index {
            Some(parent) if parent != index => {
                children_of.entry(parent).or_default().push(index)
            }
            // Self-parented rows count as roots rather than their own child.
            _ => roots.push(index),
        }
    }

    // Breadth-first over the parent index to find every reachable node and
    // the order in which levels nest.
    let mut visited = vec![false; entities.len()];
    let mut bfs_order: Vec<usize> = Vec::new();
    let mut queue: VecDeque<usize> = roots.iter().copied().collect();
    while let Some(index) = queue.pop_front() {
        if visited[index] {
            continue;
        }
        visited[index] = true;
        bfs_order.push(index);
        if let Some(children) = children_of.get(&index) {
            queue.extend(children.iter().copied());
        }
    }

    let unreachable = visited.iter().filter(|&&v| !v).count();
    if unreachable > 0 {
        warn!(
            count = unreachable,
            "hierarchy rows unreachable from any root (parent loop or dangling parent); dropped"
        );
    }

    // Assemble deepest-first: when a node is packed into its parent, its own
    // children array is already complete.
    let mut slots: Vec<Option<Entity>> = entities.into_iter().map(Some).collect();
    for &index in bfs_order.iter().rev() {
        let child_entities: Vec<JsonValue> = children_of
            .get(&index)
            .map(|children| {
                children
                    .iter()
                    .filter_map(|&child| slots[child].take())
                    .map(JsonValue::Object)
                    .collect()
            })
            .unwrap_or_default();
        if let Some(entity) = slots[index].as_mut() {
            entity.insert(children_field.to_string(), JsonValue::Array(child_entities));
        }
    }

    roots
        .into_iter()
        .filter_map(|index| slots[index].take())
        .collect()
}

fn key_of(value: &JsonValue) -> String {
    match value {
        JsonValue::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn entity(id: i64, parent: Option<i64>, name: &str) -> Entity {
        let mut e = Entity::new();
        e.insert("id".into(), json!(id));
        e.insert(
            "parent_id".into(),
            parent.map(|p| json!(p)).unwrap_or(JsonValue::Null),
        );
        e.insert("name".into(), json!(name));
        e
    }

    #[test]
    fn nests_children_under_parents() {
        let tree = build_hierarchy(
            vec![
                entity(1, None, "root"),
                entity(2, Some(1), "child"),
                entity(3, Some(2), "grandchild"),
                entity(4, Some(1), "second child"),
            ],
            "id",
            "parent_id",
            "children",
        );

        assert_eq!(tree.len(), 1);
        let children = tree[0].get("children").and_then(JsonValue::as_array).expect("children");
        assert_eq!(children.len(), 2);
        let grandchildren = children[0]
            .get("children")
            .and_then(JsonValue::as_array)
            .expect("grandchildren");
        assert_eq!(grandchildren.len(), 1);
        assert_eq!(grandchildren[0].get("name"), Some(&json!("grandchild")));
    }

    #[test]
    fn dangling_parent_becomes_a_root() {
        let tree = build_hierarchy(
            vec![entity(1, Some(99), "orphan")],
            "id",
            "parent_id",
            "children",
        );
        assert_eq!(tree.len(), 1);
        assert_eq!(tree[0].get("name"), Some(&json!("orphan")));
    }

    #[test]
    fn parent_loop_does_not_recurse_forever() {
        // 1 -> 2 -> 1: neither is reachable from a root; both are dropped.
        let tree = build_hierarchy(
            vec![entity(1, Some(2), "a"), entity(2, Some(1), "b"), entity(3, None, "root")],
            "id",
            "parent_id",
            "children",
        );
        assert_eq!(tree.len(), 1);
        assert_eq!(tree[0].get("name"), Some(&json!("root")));
    }
}
