//! Tree records built from directory and blueprint entities.
//!
//! Node ids carry a kind prefix so groups, vessels, categories and
//! templates can share one tree without id collisions.

use super::index::TreeNode;
use crate::model::blueprint::{CategoryId, GlobalCategory, TaskTemplate, TemplateId};
use crate::model::directory::{Group, GroupId, Yacht, YachtId};
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

/// Typed identity of one tree node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TreeKey {
    Group(GroupId),
    Yacht(YachtId),
    Category(CategoryId),
    Template(TemplateId),
}

impl TreeKey {
    fn prefix(&self) -> &'static str {
        match self {
            Self::Group(_) => "group",
            Self::Yacht(_) => "yacht",
            Self::Category(_) => "category",
            Self::Template(_) => "template",
        }
    }

    fn uuid(&self) -> Uuid {
        match self {
            Self::Group(id) | Self::Yacht(id) | Self::Category(id) | Self::Template(id) => *id,
        }
    }

    /// Node id used in [`TreeNode::id`].
    pub fn node_id(&self) -> String {
        format!("{}:{}", self.prefix(), self.uuid())
    }

    /// Parses a node id produced by [`TreeKey::node_id`].
    pub fn parse(node_id: &str) -> Option<Self> {
        let (prefix, raw) = node_id.split_once(':')?;
        let id = Uuid::parse_str(raw).ok()?;
        match prefix {
            "group" => Some(Self::Group(id)),
            "yacht" => Some(Self::Yacht(id)),
            "category" => Some(Self::Category(id)),
            "template" => Some(Self::Template(id)),
            _ => None,
        }
    }
}

/// Groups as a nested tree with vessels as leaves.
///
/// Without `include_archived`, archived groups hide their whole subtree and
/// archived vessels are dropped.
pub fn directory_nodes(groups: &[Group], yachts: &[Yacht], include_archived: bool) -> Vec<TreeNode> {
    let visible = visible_ids(
        groups,
        |group| group.id,
        |group| group.parent_id,
        |group| group.archived_at.is_some(),
        include_archived,
    );

    let known: HashSet<Uuid> = groups.iter().map(|group| group.id).collect();
    let group_nodes = groups
        .iter()
        .filter(|group| visible.contains(&group.id))
        .map(|group| TreeNode {
            id: TreeKey::Group(group.id).node_id(),
            parent_id: group.parent_id.map(|id| TreeKey::Group(id).node_id()),
            label: group.name.clone(),
        });

    let yacht_nodes = yachts
        .iter()
        .filter(|yacht| include_archived || yacht.archived_at.is_none())
        .filter(|yacht| include_archived || !hidden_parent(&visible, &known, yacht.group_id))
        .map(|yacht| TreeNode {
            id: TreeKey::Yacht(yacht.id).node_id(),
            parent_id: Some(TreeKey::Group(yacht.group_id).node_id()),
            label: yacht.name.clone(),
        });

    group_nodes.chain(yacht_nodes).collect()
}

/// Categories as a nested tree with templates as leaves.
///
/// Without `include_archived`, a category stays reachable only while its
/// whole ancestor path is non-archived; archived templates and templates in
/// hidden categories are dropped.
pub fn blueprint_nodes(
    categories: &[GlobalCategory],
    templates: &[TaskTemplate],
    include_archived: bool,
) -> Vec<TreeNode> {
    let visible = visible_ids(
        categories,
        |category| category.id,
        |category| category.parent_category_id,
        GlobalCategory::is_archived,
        include_archived,
    );

    let known: HashSet<Uuid> = categories.iter().map(|category| category.id).collect();
    let category_nodes = categories
        .iter()
        .filter(|category| visible.contains(&category.id))
        .map(|category| TreeNode {
            id: TreeKey::Category(category.id).node_id(),
            parent_id: category
                .parent_category_id
                .map(|id| TreeKey::Category(id).node_id()),
            label: category.name.clone(),
        });

    let template_nodes = templates
        .iter()
        .filter(|template| include_archived || !template.is_archived())
        .filter(|template| {
            include_archived || !hidden_parent(&visible, &known, template.global_category_id)
        })
        .map(|template| TreeNode {
            id: TreeKey::Template(template.id).node_id(),
            parent_id: Some(TreeKey::Category(template.global_category_id).node_id()),
            label: template.name.clone(),
        });

    category_nodes.chain(template_nodes).collect()
}

/// Whether `parent` is a known container that was filtered out.
fn hidden_parent(visible: &HashSet<Uuid>, known: &HashSet<Uuid>, parent: Uuid) -> bool {
    known.contains(&parent) && !visible.contains(&parent)
}

fn visible_ids<T>(
    items: &[T],
    id: impl Fn(&T) -> Uuid,
    parent: impl Fn(&T) -> Option<Uuid>,
    archived: impl Fn(&T) -> bool,
    include_archived: bool,
) -> HashSet<Uuid> {
    if include_archived {
        return items.iter().map(&id).collect();
    }

    let by_id: HashMap<Uuid, &T> = items.iter().map(|item| (id(item), item)).collect();
    items
        .iter()
        .filter(|item| {
            let mut seen = HashSet::new();
            let mut cursor = Some(*item);
            while let Some(current) = cursor {
                if archived(current) {
                    return false;
                }
                if !seen.insert(id(current)) {
                    // Cyclic chain; let the tree engine report it.
                    break;
                }
                cursor = parent(current).and_then(|parent_id| by_id.get(&parent_id).copied());
            }
            true
        })
        .map(&id)
        .collect()
}
