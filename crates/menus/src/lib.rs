//! Navigation menus and the permission-scoped menu tree.
//!
//! This crate is pure: it takes already-loaded menu rows plus a visibility
//! rule and returns the forest a given user may see. The tree *is* the access
//! control, so there is no error path.

pub mod menu;
pub mod tree;

pub use menu::{Menu, MenuAccess, MenuNode};
pub use tree::{build_menu_tree, build_menu_tree_with};
