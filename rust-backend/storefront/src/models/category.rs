use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::collections::{HashMap, HashSet};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Category {
    pub id: Uuid,
    pub parent_id: Option<Uuid>,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub sort_order: i32,
    pub is_active: bool,
    pub is_featured: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CategoryNode {
    #[serde(flatten)]
    pub category: Category,
    pub children: Vec<CategoryNode>,
}

/// Arranges a flat category list into a forest ordered by `sort_order`, then name.
///
/// Categories whose parent is missing from the list are treated as roots.
pub fn build_tree(categories: Vec<Category>) -> Vec<CategoryNode> {
    let ids: HashSet<Uuid> = categories.iter().map(|c| c.id).collect();
    let mut by_parent: HashMap<Option<Uuid>, Vec<Category>> = HashMap::new();

    for category in categories {
        let parent = category.parent_id.filter(|p| ids.contains(p) && *p != category.id);
        by_parent.entry(parent).or_default().push(category);
    }

    fn attach(parent: Option<Uuid>, by_parent: &mut HashMap<Option<Uuid>, Vec<Category>>) -> Vec<CategoryNode> {
        let mut level = by_parent.remove(&parent).unwrap_or_default();
        level.sort_by(|a, b| a.sort_order.cmp(&b.sort_order).then_with(|| a.name.cmp(&b.name)));
        level
            .into_iter()
            .map(|category| {
                let children = attach(Some(category.id), by_parent);
                CategoryNode { category, children }
            })
            .collect()
    }

    attach(None, &mut by_parent)
}

/// True when making `new_parent` the parent of `id` would close a loop.
///
/// `parents` maps every category id to its current parent.
pub fn creates_cycle(id: Uuid, new_parent: Uuid, parents: &HashMap<Uuid, Option<Uuid>>) -> bool {
    let mut cursor = Some(new_parent);
    let mut seen = HashSet::new();
    while let Some(current) = cursor {
        if current == id || !seen.insert(current) {
            return true;
        }
        cursor = parents.get(&current).copied().flatten();
    }
    false
}

#[derive(Debug, Serialize)]
pub struct CategoryWithProducts {
    #[serde(flatten)]
    pub category: Category,
    pub children: Vec<Category>,
    pub products: super::Paginated<super::PricedProduct>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateCategoryRequest {
    pub parent_id: Option<Uuid>,
    #[validate(length(min = 1, max = 120, message = "name is required"))]
    pub name: String,
    pub description: Option<String>,
    pub image_url: Option<String>,
    #[validate(nested)]
    pub image: Option<super::ImageUpload>,
    pub sort_order: Option<i32>,
    pub is_active: Option<bool>,
    pub is_featured: Option<bool>,
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateCategoryRequest {
    /// `Some(None)` detaches the category from its parent.
    #[serde(default, with = "super::double_option")]
    pub parent_id: Option<Option<Uuid>>,
    #[validate(length(min = 1, max = 120, message = "name must not be empty"))]
    pub name: Option<String>,
    pub description: Option<String>,
    pub image_url: Option<String>,
    #[validate(nested)]
    pub image: Option<super::ImageUpload>,
    pub sort_order: Option<i32>,
    pub is_active: Option<bool>,
    pub is_featured: Option<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn category(name: &str, parent: Option<Uuid>, sort_order: i32) -> Category {
        let now = Utc::now();
        Category {
            id: Uuid::new_v4(),
            parent_id: parent,
            name: name.to_string(),
            slug: crate::slug::slugify(name),
            description: None,
            image_url: None,
            sort_order,
            is_active: true,
            is_featured: false,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    #[test]
    fn tree_nests_children_under_parents() {
        let living = category("Living Room", None, 1);
        let bedroom = category("Bedroom", None, 0);
        let sofas = category("Sofas", Some(living.id), 0);
        let beds = category("Beds", Some(bedroom.id), 0);
        let tree = build_tree(vec![sofas, living.clone(), beds, bedroom.clone()]);

        assert_eq!(tree.len(), 2);
        assert_eq!(tree[0].category.name, "Bedroom");
        assert_eq!(tree[1].category.name, "Living Room");
        assert_eq!(tree[1].children.len(), 1);
        assert_eq!(tree[1].children[0].category.name, "Sofas");
    }

    #[test]
    fn orphans_become_roots() {
        let orphan = category("Lamps", Some(Uuid::new_v4()), 0);
        let tree = build_tree(vec![orphan]);
        assert_eq!(tree.len(), 1);
        assert!(tree[0].children.is_empty());
    }

    #[test]
    fn same_sort_order_falls_back_to_name() {
        let tree = build_tree(vec![
            category("Tables", None, 0),
            category("Chairs", None, 0),
        ]);
        let names: Vec<_> = tree.iter().map(|n| n.category.name.as_str()).collect();
        assert_eq!(names, vec!["Chairs", "Tables"]);
    }

    #[test]
    fn cycle_detection_walks_ancestors() {
        let root = Uuid::new_v4();
        let child = Uuid::new_v4();
        let grandchild = Uuid::new_v4();
        let parents: HashMap<Uuid, Option<Uuid>> = [
            (root, None),
            (child, Some(root)),
            (grandchild, Some(child)),
        ]
        .into_iter()
        .collect();

        assert!(creates_cycle(root, grandchild, &parents));
        assert!(creates_cycle(child, child, &parents));
        assert!(!creates_cycle(grandchild, root, &parents));
    }

    #[test]
    fn explicit_null_parent_detaches() {
        let req: UpdateCategoryRequest = serde_json::from_str(r#"{"parent_id": null}"#).unwrap();
        assert_eq!(req.parent_id, Some(None));

        let req: UpdateCategoryRequest = serde_json::from_str(r#"{"name": "Beds"}"#).unwrap();
        assert_eq!(req.parent_id, None);
    }
}
