//! Permission-scoped menu tree construction.
//!
//! The stored menus are a flat, parent-linked forest. Building the visible tree
//! is a single pre-order walk over an explicit adjacency map:
//!
//! 1. index children by parent id, each sibling list sorted by
//!    `(order_num, id)`;
//! 2. walk from the roots with an explicit stack, evaluating visibility per
//!    node and never descending below a node that fails the check;
//! 3. assemble the surviving nodes bottom-up into owned `MenuNode`s.
//!
//! No recursion is involved, so pathological depth cannot overflow the stack,
//! and every node is visited at most once.

use std::collections::{HashMap, HashSet};

use mfgplan_core::{MenuId, PermissionId};

use crate::menu::{Menu, MenuNode};

/// Build the forest visible to a user holding `permission_ids`.
///
/// A node is visible iff `is_admin`, it has no required permission, or its
/// required permission is held. Invisible nodes are dropped with their whole
/// subtree.
pub fn build_menu_tree(
    menus: &[Menu],
    permission_ids: &HashSet<PermissionId>,
    is_admin: bool,
) -> Vec<MenuNode> {
    build_menu_tree_with(menus, |menu| {
        is_admin
            || match menu.required_permission_id {
                None => true,
                Some(required) => permission_ids.contains(&required),
            }
    })
}

/// Build the visible forest using an arbitrary per-node predicate.
///
/// `can_access` is called at most once per node and never for descendants of a
/// node it rejected. Nodes whose `parent_id` names no existing menu are not
/// reachable from any root and are not returned.
pub fn build_menu_tree_with<F>(menus: &[Menu], can_access: F) -> Vec<MenuNode>
where
    F: Fn(&Menu) -> bool,
{
    let mut children: HashMap<Option<MenuId>, Vec<usize>> = HashMap::new();
    for (idx, menu) in menus.iter().enumerate() {
        children.entry(menu.parent_id).or_default().push(idx);
    }
    for siblings in children.values_mut() {
        siblings.sort_by_key(|&idx| (menus[idx].order_num, menus[idx].id));
    }

    // (menu index, slot of the visible parent) in pre-order.
    let mut visible: Vec<(usize, Option<usize>)> = Vec::new();
    let mut stack: Vec<(usize, Option<usize>)> = children
        .get(&None)
        .map(|roots| roots.iter().rev().map(|&idx| (idx, None)).collect())
        .unwrap_or_default();

    while let Some((idx, parent_slot)) = stack.pop() {
        let menu = &menus[idx];
        if !can_access(menu) {
            continue;
        }
        let slot = visible.len();
        visible.push((idx, parent_slot));
        if let Some(kids) = children.get(&Some(menu.id)) {
            stack.extend(kids.iter().rev().map(|&child| (child, Some(slot))));
        }
    }

    // Descendants always occupy later slots than their parent, so walking the
    // slots backwards finishes every subtree before it is attached.
    let mut nodes: Vec<Option<MenuNode>> = visible
        .iter()
        .map(|&(idx, _)| Some(MenuNode::leaf(&menus[idx])))
        .collect();
    let mut forest = Vec::new();

    for slot in (0..visible.len()).rev() {
        let Some(mut node) = nodes[slot].take() else {
            continue;
        };
        node.children.reverse();
        match visible[slot].1 {
            Some(parent) => {
                if let Some(parent) = nodes[parent].as_mut() {
                    parent.children.push(node);
                }
            }
            None => forest.push(node),
        }
    }

    forest.reverse();
    forest
}
