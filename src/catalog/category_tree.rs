use std::collections::{HashMap, HashSet};

use crate::entities::CategoryModel;

/// In-memory view of the category hierarchy.
///
/// Stored data may be malformed; every walk stops at the first revisited id.
#[derive(Debug, Clone, Default)]
pub struct CategoryTree {
    nodes: HashMap<i32, CategoryModel>,
}

impl CategoryTree {
    pub fn from_models(categories: impl IntoIterator<Item = CategoryModel>) -> Self {
        Self {
            nodes: categories.into_iter().map(|c| (c.id, c)).collect(),
        }
    }

    pub fn get(&self, id: i32) -> Option<&CategoryModel> {
        self.nodes.get(&id)
    }

    /// Ids from `id` up to its root, `id` first
    fn ancestry(&self, id: i32) -> Vec<i32> {
        let mut chain = Vec::new();
        let mut seen = HashSet::new();
        let mut current = Some(id);

        while let Some(cid) = current {
            if !seen.insert(cid) {
                break;
            }
            let Some(node) = self.nodes.get(&cid) else {
                break;
            };
            chain.push(cid);
            current = node.parent_id;
        }

        chain
    }

    /// Breadcrumb names, root first
    pub fn path_names(&self, id: i32) -> Vec<String> {
        self.ancestry(id)
            .into_iter()
            .rev()
            .filter_map(|cid| self.nodes.get(&cid).map(|c| c.name.clone()))
            .collect()
    }

    /// Whether re-parenting `category_id` under `new_parent` would make it its own ancestor
    pub fn would_create_cycle(&self, category_id: i32, new_parent: Option<i32>) -> bool {
        match new_parent {
            None => false,
            Some(parent) if parent == category_id => true,
            Some(parent) => self.ancestry(parent).contains(&category_id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn category(id: i32, name: &str, parent_id: Option<i32>) -> CategoryModel {
        let now = Utc::now();
        CategoryModel {
            id,
            name: name.into(),
            slug: name.to_lowercase(),
            parent_id,
            description: None,
            active: true,
            created_at: now,
            updated_at: now,
        }
    }

    fn apparel() -> CategoryTree {
        CategoryTree::from_models([
            category(1, "Apparel", None),
            category(2, "Footwear", Some(1)),
            category(3, "Running", Some(2)),
            category(4, "Accessories", None),
        ])
    }

    #[test]
    fn breadcrumb_runs_root_to_leaf() {
        assert_eq!(
            apparel().path_names(3),
            vec!["Apparel", "Footwear", "Running"]
        );
        assert_eq!(apparel().path_names(4), vec!["Accessories"]);
        assert!(apparel().path_names(99).is_empty());
    }

    #[test]
    fn breadcrumb_terminates_on_cycle() {
        let tree = CategoryTree::from_models([
            category(1, "A", Some(2)),
            category(2, "B", Some(1)),
        ]);
        assert_eq!(tree.path_names(1), vec!["B", "A"]);
    }

    #[test]
    fn breadcrumb_stops_at_missing_parent() {
        let tree = CategoryTree::from_models([category(5, "Orphan", Some(42))]);
        assert_eq!(tree.path_names(5), vec!["Orphan"]);
    }

    #[test]
    fn detects_cycles_on_reparent() {
        let tree = apparel();
        assert!(tree.would_create_cycle(1, Some(1)));
        assert!(tree.would_create_cycle(1, Some(3)));
        assert!(tree.would_create_cycle(2, Some(3)));
        assert!(!tree.would_create_cycle(3, Some(4)));
        assert!(!tree.would_create_cycle(1, None));
        assert!(!tree.would_create_cycle(4, Some(3)));
    }
}
