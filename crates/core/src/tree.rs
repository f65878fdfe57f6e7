//! Outline tree: an arena of nodes, each owning one fragment code.
//! 大綱樹：以 arena 保存節點，每個節點擁有一個片段代碼。
//!
//! Children are owned through `children`; `parent` is a plain index used only
//! for traversal, path resolution and dirty propagation, never for destruction.

use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::paths::FileKind;
use crate::store::{Code, ContentStore};

/// Prefix marking a node whose body is an invocable macro.
pub const MACRO_PREFIX: char = '@';

/// 大綱節點的識別碼。 / Handle of a node inside an [`OutlineTree`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(&self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One element of the outline.
/// 大綱中的單一節點。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutlineNode {
    pub name: String,
    /// `None` means the content only lives inside a container.
    pub path: Option<PathBuf>,
    pub code: Code,
    children: Vec<NodeId>,
    parent: Option<NodeId>,
}

impl OutlineNode {
    fn new(name: String, path: Option<PathBuf>, code: Code) -> Self {
        Self {
            name,
            path,
            code,
            children: Vec::new(),
            parent: None,
        }
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Macro name bound by this node, i.e. the name without its `@` prefix.
    pub fn macro_name(&self) -> Option<&str> {
        self.name
            .strip_prefix(MACRO_PREFIX)
            .filter(|name| !name.is_empty())
    }
}

/// Structural errors. Every check runs before the tree is touched.
/// 樹狀結構錯誤；所有檢查都在修改前完成。
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TreeError {
    #[error("node {0} not found")]
    NodeNotFound(NodeId),
    #[error("moving node {node} under {parent} would create a cycle")]
    Cycle { node: NodeId, parent: NodeId },
    #[error("root node {0} cannot be moved or duplicated")]
    RootMove(NodeId),
    #[error("node {0} has no parent")]
    NoParent(NodeId),
}

/// Arena holding every open project's outline.
/// 保存所有已開啟專案大綱的 arena。
#[derive(Debug, Default, Clone)]
pub struct OutlineTree {
    nodes: Vec<Option<OutlineNode>>,
    free: Vec<usize>,
    roots: Vec<NodeId>,
}

impl OutlineTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn node(&self, id: NodeId) -> Option<&OutlineNode> {
        self.nodes.get(id.0).and_then(Option::as_ref)
    }

    fn node_mut(&mut self, id: NodeId) -> Result<&mut OutlineNode, TreeError> {
        self.nodes
            .get_mut(id.0)
            .and_then(Option::as_mut)
            .ok_or(TreeError::NodeNotFound(id))
    }

    fn get(&self, id: NodeId) -> Result<&OutlineNode, TreeError> {
        self.node(id).ok_or(TreeError::NodeNotFound(id))
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.node(id).is_some()
    }

    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    pub fn len(&self) -> usize {
        self.nodes.iter().filter(|slot| slot.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.node(id).map_or(&[], |node| node.children())
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).and_then(|node| node.parent)
    }

    pub fn code(&self, id: NodeId) -> Result<Code, TreeError> {
        self.get(id).map(|node| node.code)
    }

    fn alloc(&mut self, node: OutlineNode) -> NodeId {
        if let Some(index) = self.free.pop() {
            self.nodes[index] = Some(node);
            NodeId(index)
        } else {
            self.nodes.push(Some(node));
            NodeId(self.nodes.len() - 1)
        }
    }

    /// Adds a new root (one per open project).
    /// 新增一個根節點（每個開啟的專案一個）。
    pub fn add_root(
        &mut self,
        name: impl Into<String>,
        path: Option<PathBuf>,
        code: Code,
    ) -> NodeId {
        let id = self.alloc(OutlineNode::new(name.into(), path, code));
        self.roots.push(id);
        id
    }

    /// Inserts a new node as child `index` of `parent` (clamped to the child count)
    /// and marks the owning root unsaved.
    pub fn insert_child(
        &mut self,
        parent: NodeId,
        index: usize,
        name: impl Into<String>,
        path: Option<PathBuf>,
        code: Code,
        store: &mut ContentStore,
    ) -> Result<NodeId, TreeError> {
        self.get(parent)?;
        let mut node = OutlineNode::new(name.into(), path, code);
        node.parent = Some(parent);
        let id = self.alloc(node);
        let siblings = &mut self.node_mut(parent)?.children;
        let index = index.min(siblings.len());
        siblings.insert(index, id);
        self.mark_unsaved(parent, store)?;
        Ok(id)
    }

    pub fn append_child(
        &mut self,
        parent: NodeId,
        name: impl Into<String>,
        path: Option<PathBuf>,
        code: Code,
        store: &mut ContentStore,
    ) -> Result<NodeId, TreeError> {
        self.insert_child(parent, usize::MAX, name, path, code, store)
    }

    /// Walks parent links up to the root.
    pub fn root_of(&self, id: NodeId) -> Result<NodeId, TreeError> {
        let mut current = id;
        self.get(current)?;
        while let Some(parent) = self.parent(current) {
            current = parent;
        }
        Ok(current)
    }

    /// `true` when `ancestor` is `node` or one of its ancestors.
    pub fn is_ancestor_or_self(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.parent(id);
        }
        false
    }

    /// Pre-order listing of `id` and its descendants.
    /// 以前序列出節點與其所有子孫。
    pub fn subtree(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            let Some(node) = self.node(current) else {
                continue;
            };
            out.push(current);
            stack.extend(node.children.iter().rev().copied());
        }
        out
    }

    /// Distinct codes referenced by the subtree.
    pub fn subtree_codes(&self, id: NodeId) -> BTreeSet<Code> {
        self.subtree(id)
            .into_iter()
            .filter_map(|node| self.node(node).map(|node| node.code))
            .collect()
    }

    /// Every live node currently bound to `code`.
    pub fn nodes_with_code(&self, code: Code) -> Vec<NodeId> {
        self.nodes
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| match slot {
                Some(node) if node.code == code => Some(NodeId(index)),
                _ => None,
            })
            .collect()
    }

    /// Renames a node. A name starting with `@` binds a macro to the node's code.
    /// 重新命名節點；以 `@` 開頭的名稱會綁定巨集。
    pub fn set_name(
        &mut self,
        id: NodeId,
        name: impl Into<String>,
        store: &mut ContentStore,
    ) -> Result<(), TreeError> {
        let name = name.into();
        let node = self.node_mut(id)?;
        if let Some(old) = node.macro_name() {
            if store.macro_code(old) == Some(node.code) {
                store.remove_macro(old);
            }
        }
        node.name = name;
        let code = node.code;
        if let Some(macro_name) = node.macro_name().map(str::to_owned) {
            // The node's code is live by construction; a dead code just skips the binding.
            let _ = store.add_macro(macro_name, code);
        }
        self.mark_unsaved(id, store)
    }

    pub fn set_path(
        &mut self,
        id: NodeId,
        path: Option<PathBuf>,
        store: &mut ContentStore,
    ) -> Result<(), TreeError> {
        self.node_mut(id)?.path = path;
        self.mark_unsaved(id, store)
    }

    /// Points a node at another code, freeing the old one when nothing else uses it.
    pub fn rebind_code(
        &mut self,
        id: NodeId,
        code: Code,
        store: &mut ContentStore,
    ) -> Result<(), TreeError> {
        let old = std::mem::replace(&mut self.node_mut(id)?.code, code);
        if old != code && self.nodes_with_code(old).is_empty() {
            store.delete(old);
        }
        Ok(())
    }

    /// Deletes a node and its subtree. Removing a root closes that project.
    /// 刪除節點與其子樹；刪除根節點即關閉該專案。
    ///
    /// Codes still aliased by surviving nodes stay live. The `@name` macro of
    /// a removed node is dropped unless a surviving `@name` node holds the
    /// same code.
    pub fn remove(&mut self, id: NodeId, store: &mut ContentStore) -> Result<(), TreeError> {
        let parent = self.get(id)?.parent;
        if let Some(parent) = parent {
            self.mark_unsaved(parent, store)?;
            self.node_mut(parent)?.children.retain(|child| *child != id);
        } else {
            self.roots.retain(|root| *root != id);
        }
        self.release(id, store);
        Ok(())
    }

    /// Removes every child subtree of `id`, keeping `id` itself.
    pub fn take_children(&mut self, id: NodeId, store: &mut ContentStore) -> Result<(), TreeError> {
        let children = std::mem::take(&mut self.node_mut(id)?.children);
        for child in children {
            self.release(child, store);
        }
        Ok(())
    }

    fn release(&mut self, id: NodeId, store: &mut ContentStore) {
        let doomed = self.subtree(id);
        let mut codes = BTreeSet::new();
        let mut macros = Vec::new();
        for node_id in &doomed {
            if let Some(node) = self.nodes[node_id.0].take() {
                if let Some(name) = node.macro_name() {
                    if store.macro_code(name) == Some(node.code) {
                        macros.push((name.to_owned(), node.code));
                    }
                }
                codes.insert(node.code);
            }
            self.free.push(node_id.0);
        }
        for (name, code) in macros {
            let still_held = self
                .nodes
                .iter()
                .flatten()
                .any(|node| node.code == code && node.macro_name() == Some(name.as_str()));
            if !still_held {
                store.remove_macro(&name);
            }
        }
        for code in codes {
            if self.nodes_with_code(code).is_empty() {
                store.delete(code);
            }
        }
    }

    /// Moves `id` (with its subtree) to child `index` of `new_parent`.
    /// 將節點連同子樹移到新的父節點下。
    ///
    /// Rejected with [`TreeError::Cycle`] before any mutation when `new_parent`
    /// is `id` itself or one of its descendants. Both the old and the new
    /// owning root are marked unsaved.
    pub fn reparent(
        &mut self,
        id: NodeId,
        new_parent: NodeId,
        index: usize,
        store: &mut ContentStore,
    ) -> Result<(), TreeError> {
        let old_parent = self.get(id)?.parent.ok_or(TreeError::RootMove(id))?;
        self.get(new_parent)?;
        if self.is_ancestor_or_self(id, new_parent) {
            return Err(TreeError::Cycle {
                node: id,
                parent: new_parent,
            });
        }
        self.mark_unsaved(old_parent, store)?;
        self.node_mut(old_parent)?.children.retain(|child| *child != id);
        let siblings = &mut self.node_mut(new_parent)?.children;
        let index = index.min(siblings.len());
        siblings.insert(index, id);
        self.node_mut(id)?.parent = Some(new_parent);
        self.mark_unsaved(new_parent, store)
    }

    fn position(&self, id: NodeId) -> Result<(NodeId, usize), TreeError> {
        let parent = self.get(id)?.parent.ok_or(TreeError::NoParent(id))?;
        let index = self
            .children(parent)
            .iter()
            .position(|child| *child == id)
            .ok_or(TreeError::NodeNotFound(id))?;
        Ok((parent, index))
    }

    /// Swaps a node with its previous sibling; `false` when already first.
    pub fn move_up(&mut self, id: NodeId, store: &mut ContentStore) -> Result<bool, TreeError> {
        let (parent, index) = self.position(id)?;
        if index == 0 {
            return Ok(false);
        }
        self.node_mut(parent)?.children.swap(index - 1, index);
        self.mark_unsaved(id, store)?;
        Ok(true)
    }

    /// Swaps a node with its next sibling; `false` when already last.
    pub fn move_down(&mut self, id: NodeId, store: &mut ContentStore) -> Result<bool, TreeError> {
        let (parent, index) = self.position(id)?;
        if index + 1 >= self.children(parent).len() {
            return Ok(false);
        }
        self.node_mut(parent)?.children.swap(index, index + 1);
        self.mark_unsaved(id, store)?;
        Ok(true)
    }

    /// Makes a node the last child of its previous sibling.
    pub fn indent(&mut self, id: NodeId, store: &mut ContentStore) -> Result<bool, TreeError> {
        let (parent, index) = self.position(id)?;
        if index == 0 {
            return Ok(false);
        }
        let target = self.children(parent)[index - 1];
        self.reparent(id, target, usize::MAX, store)?;
        Ok(true)
    }

    /// Makes a node the next sibling of its parent.
    pub fn outdent(&mut self, id: NodeId, store: &mut ContentStore) -> Result<bool, TreeError> {
        let (parent, _) = self.position(id)?;
        let Some(grand_parent) = self.parent(parent) else {
            return Ok(false);
        };
        let (_, parent_index) = self.position(parent)?;
        self.reparent(id, grand_parent, parent_index + 1, store)?;
        Ok(true)
    }

    /// Duplicates the subtree with fresh codes and copied text, inserted right after `id`.
    /// 深層複製：每個複本節點都配置新代碼並複製文字。
    pub fn deep_clone(&mut self, id: NodeId, store: &mut ContentStore) -> Result<NodeId, TreeError> {
        self.duplicate(id, store, Duplicate::Copy, true)
    }

    /// Duplicates only `id` (no children) with a fresh code.
    pub fn copy_node(&mut self, id: NodeId, store: &mut ContentStore) -> Result<NodeId, TreeError> {
        self.duplicate(id, store, Duplicate::Copy, false)
    }

    /// Duplicates the subtree structure, every copy sharing its source's code.
    /// 別名複製：複本與原節點共用同一代碼，編輯任一方都會影響另一方。
    pub fn alias_clone(&mut self, id: NodeId, store: &mut ContentStore) -> Result<NodeId, TreeError> {
        self.duplicate(id, store, Duplicate::Alias, true)
    }

    /// Duplicates only `id` (no children), sharing its code.
    pub fn clone_node(&mut self, id: NodeId, store: &mut ContentStore) -> Result<NodeId, TreeError> {
        self.duplicate(id, store, Duplicate::Alias, false)
    }

    fn duplicate(
        &mut self,
        id: NodeId,
        store: &mut ContentStore,
        mode: Duplicate,
        recursive: bool,
    ) -> Result<NodeId, TreeError> {
        let (parent, index) = match self.position(id) {
            Ok(found) => found,
            Err(TreeError::NoParent(_)) => return Err(TreeError::RootMove(id)),
            Err(err) => return Err(err),
        };
        let copy = self.copy_recursive(id, parent, store, mode, recursive)?;
        self.node_mut(parent)?.children.insert(index + 1, copy);
        self.mark_unsaved(parent, store)?;
        Ok(copy)
    }

    fn copy_recursive(
        &mut self,
        source: NodeId,
        parent: NodeId,
        store: &mut ContentStore,
        mode: Duplicate,
        recursive: bool,
    ) -> Result<NodeId, TreeError> {
        let original = self.get(source)?.clone();
        let code = match mode {
            Duplicate::Alias => original.code,
            Duplicate::Copy => {
                let code = store.new_num();
                let text = store.get(original.code).to_owned();
                store.set(code, text);
                code
            }
        };
        let mut node = OutlineNode::new(original.name, original.path, code);
        node.parent = Some(parent);
        let copy = self.alloc(node);
        // A copied `@name` only binds when the name is free; the source keeps its macro.
        if let (Duplicate::Copy, Some(name)) = (mode, self.get(copy)?.macro_name()) {
            if store.macro_code(name).is_none() {
                let name = name.to_owned();
                let _ = store.add_macro(name, code);
            }
        }
        if recursive {
            for child in original.children {
                let child_copy = self.copy_recursive(child, copy, store, mode, true)?;
                self.node_mut(copy)?.children.push(child_copy);
            }
        }
        Ok(copy)
    }

    /// Aggregate saved state: AND of every code's flag in the subtree.
    /// 子樹中所有代碼的儲存旗標做 AND。
    pub fn is_saved(&self, id: NodeId, store: &ContentStore) -> bool {
        self.subtree_codes(id)
            .into_iter()
            .all(|code| store.is_saved(code))
    }

    /// Marks every code of the subtree saved.
    pub fn save_subtree(&self, id: NodeId, store: &mut ContentStore) {
        for code in self.subtree_codes(id) {
            store.set_saved(code, true);
        }
    }

    /// Flags the owning root unsaved after a structural edit.
    pub fn mark_unsaved(&self, id: NodeId, store: &mut ContentStore) -> Result<(), TreeError> {
        let root = self.root_of(id)?;
        store.set_saved(self.get(root)?.code, false);
        Ok(())
    }

    /// Directory against which the children's relative paths resolve.
    /// 子節點相對路徑的基準資料夾。
    ///
    /// A root naming a project container resolves to the container's
    /// directory; any other node resolves to its own path joined onto its
    /// parent's base directory.
    pub fn base_dir(&self, id: NodeId) -> PathBuf {
        let Some(node) = self.node(id) else {
            return PathBuf::new();
        };
        let own = node.path.clone().unwrap_or_default();
        match node.parent {
            None => {
                if FileKind::from_path(&own) == Some(FileKind::Project) {
                    own.parent().map(Path::to_path_buf).unwrap_or_default()
                } else {
                    own
                }
            }
            Some(parent) => self.base_dir(parent).join(own),
        }
    }

    /// Resolved file path of a node, `None` when it has no path.
    /// 節點實際對應的檔案路徑；無路徑時回傳 `None`。
    pub fn resolved_path(&self, id: NodeId) -> Option<PathBuf> {
        let node = self.node(id)?;
        let own = node.path.as_ref()?;
        if own.as_os_str().is_empty() {
            return None;
        }
        Some(match node.parent {
            None => own.clone(),
            Some(parent) => self.base_dir(parent).join(own),
        })
    }

    /// `A->B->C` trail from the root down to `id`.
    pub fn breadcrumb(&self, id: NodeId) -> String {
        let mut names = Vec::new();
        let mut current = Some(id);
        while let Some(node_id) = current {
            let Some(node) = self.node(node_id) else {
                break;
            };
            names.push(node.name.as_str());
            current = node.parent;
        }
        names.reverse();
        names.join("->")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Duplicate {
    Copy,
    Alias,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture() -> (OutlineTree, ContentStore, NodeId, NodeId, NodeId) {
        let mut store = ContentStore::new();
        let mut tree = OutlineTree::new();
        let root_code = store.new_num();
        let root = tree.add_root("proj", Some(PathBuf::from("/tmp/proj.kmol")), root_code);
        let a_code = store.new_num();
        store.set(a_code, "alpha");
        let a = tree.append_child(root, "A", None, a_code, &mut store).unwrap();
        let b_code = store.new_num();
        store.set(b_code, "beta");
        let b = tree.append_child(a, "B", None, b_code, &mut store).unwrap();
        store.save_all();
        (tree, store, root, a, b)
    }

    #[test]
    fn reparent_rejects_cycles_without_mutation() {
        let (mut tree, mut store, root, a, b) = fixture();
        let before = tree.clone().subtree(root);
        let err = tree.reparent(a, b, 0, &mut store).unwrap_err();
        assert_eq!(err, TreeError::Cycle { node: a, parent: b });
        let err = tree.reparent(a, a, 0, &mut store).unwrap_err();
        assert_eq!(err, TreeError::Cycle { node: a, parent: a });
        assert_eq!(tree.subtree(root), before);
        assert_eq!(tree.parent(b), Some(a));
        assert!(tree.is_saved(root, &store));
    }

    #[test]
    fn reparent_moves_whole_subtree() {
        let (mut tree, mut store, root, a, b) = fixture();
        let c_code = store.new_num();
        let c = tree.append_child(b, "C", None, c_code, &mut store).unwrap();
        tree.reparent(b, root, 0, &mut store).unwrap();
        assert_eq!(tree.children(root), &[b, a]);
        assert_eq!(tree.children(b), &[c]);
        assert!(tree.children(a).is_empty());
        assert_eq!(tree.root_of(c).unwrap(), root);
        assert_eq!(
            tree.reparent(root, a, 0, &mut store),
            Err(TreeError::RootMove(root))
        );
    }

    #[test]
    fn reparent_and_insert_mark_owning_roots_unsaved() {
        let (mut tree, mut store, root, a, _b) = fixture();
        let c_code = store.new_num();
        let c = tree.append_child(root, "C", None, c_code, &mut store).unwrap();
        assert!(!tree.is_saved(root, &store));
        store.save_all();

        tree.reparent(c, a, 0, &mut store).unwrap();
        assert_eq!(tree.children(a)[0], c);
        assert!(!tree.is_saved(root, &store));

        let other_code = store.new_num();
        let other = tree.add_root("other", None, other_code);
        store.save_all();
        tree.reparent(c, other, 0, &mut store).unwrap();
        assert_eq!(tree.root_of(c).unwrap(), other);
        assert!(!store.is_saved(tree.code(root).unwrap()));
        assert!(!store.is_saved(other_code));

        store.save_all();
        let d_code = store.new_num();
        tree.insert_child(other, 0, "D", None, d_code, &mut store)
            .unwrap();
        assert!(!tree.is_saved(other, &store));
        assert!(tree.is_saved(root, &store));
    }

    #[test]
    fn deep_clone_gets_independent_codes() {
        let (mut tree, mut store, root, a, b) = fixture();
        let copy = tree.deep_clone(a, &mut store).unwrap();
        assert_eq!(tree.children(root), &[a, copy]);
        let copy_code = tree.code(copy).unwrap();
        assert_ne!(copy_code, tree.code(a).unwrap());
        assert_eq!(store.get(copy_code), "alpha");

        let copy_child = tree.children(copy)[0];
        let copy_child_code = tree.code(copy_child).unwrap();
        assert_ne!(copy_child_code, tree.code(b).unwrap());
        store.set(copy_child_code, "changed");
        assert_eq!(store.get(tree.code(b).unwrap()), "beta");
    }

    #[test]
    fn alias_clone_shares_fragments() {
        let (mut tree, mut store, root, a, b) = fixture();
        let alias = tree.alias_clone(a, &mut store).unwrap();
        assert_eq!(tree.code(alias).unwrap(), tree.code(a).unwrap());
        let alias_child = tree.children(alias)[0];
        assert_eq!(tree.code(alias_child).unwrap(), tree.code(b).unwrap());

        store.set(tree.code(alias_child).unwrap(), "edited through alias");
        assert_eq!(store.get(tree.code(b).unwrap()), "edited through alias");

        // Deleting one alias keeps the shared fragment alive for the other.
        tree.remove(alias, &mut store).unwrap();
        assert_eq!(store.get(tree.code(b).unwrap()), "edited through alias");
        assert_eq!(tree.children(root), &[a]);
    }

    #[test]
    fn single_node_copies_skip_children() {
        let (mut tree, mut store, _root, a, _b) = fixture();
        let copy = tree.copy_node(a, &mut store).unwrap();
        assert!(tree.children(copy).is_empty());
        let clone = tree.clone_node(a, &mut store).unwrap();
        assert!(tree.children(clone).is_empty());
        assert_eq!(tree.code(clone).unwrap(), tree.code(a).unwrap());
    }

    #[test]
    fn root_cannot_be_duplicated() {
        let (mut tree, mut store, root, _a, _b) = fixture();
        assert_eq!(
            tree.deep_clone(root, &mut store),
            Err(TreeError::RootMove(root))
        );
    }

    #[test]
    fn deleting_macro_node_removes_alias_and_text() {
        let (mut tree, mut store, root, _a, _b) = fixture();
        let code = store.new_num();
        store.set(code, "print('hi')");
        let node = tree.append_child(root, "New node", None, code, &mut store).unwrap();
        tree.set_name(node, "@foo", &mut store).unwrap();
        assert_eq!(store.macro_code("foo"), Some(code));

        tree.remove(node, &mut store).unwrap();
        assert_eq!(store.macro_code("foo"), None);
        assert_eq!(store.get(code), "");
        assert!(!tree.contains(node));
    }

    #[test]
    fn removing_an_alias_keeps_the_macro_of_the_original() {
        let (mut tree, mut store, _root, a, _b) = fixture();
        tree.set_name(a, "@foo", &mut store).unwrap();
        let code = tree.code(a).unwrap();
        let alias = tree.alias_clone(a, &mut store).unwrap();
        assert_eq!(store.macro_code("foo"), Some(code));

        tree.remove(alias, &mut store).unwrap();
        assert!(tree.contains(a));
        assert_eq!(store.macro_code("foo"), Some(code));
        assert_eq!(store.get(code), "alpha");
    }

    #[test]
    fn deep_clone_leaves_the_macro_on_the_original() {
        let (mut tree, mut store, _root, a, _b) = fixture();
        tree.set_name(a, "@foo", &mut store).unwrap();
        let code = tree.code(a).unwrap();
        let copy = tree.deep_clone(a, &mut store).unwrap();
        assert_eq!(store.macro_code("foo"), Some(code));

        assert_ne!(tree.code(copy).unwrap(), code);

        tree.remove(a, &mut store).unwrap();
        assert_eq!(store.macro_code("foo"), None);
    }

    #[test]
    fn renaming_away_from_macro_unbinds_it() {
        let (mut tree, mut store, _root, a, _b) = fixture();
        tree.set_name(a, "@run", &mut store).unwrap();
        assert!(store.macro_code("run").is_some());
        tree.set_name(a, "plain", &mut store).unwrap();
        assert!(store.macro_code("run").is_none());
    }

    #[test]
    fn dirty_descendant_flips_root_aggregate() {
        let (tree, mut store, root, _a, b) = fixture();
        assert!(tree.is_saved(root, &store));
        store.set(tree.code(b).unwrap(), "beta v2");
        assert!(!tree.is_saved(root, &store));
        tree.save_subtree(root, &mut store);
        assert!(tree.is_saved(root, &store));
    }

    #[test]
    fn structural_moves_mark_root_unsaved() {
        let (mut tree, mut store, root, a, _b) = fixture();
        let c_code = store.new_num();
        let c = tree.append_child(root, "C", None, c_code, &mut store).unwrap();
        store.save_all();

        assert!(tree.move_up(c, &mut store).unwrap());
        assert_eq!(tree.children(root), &[c, a]);
        assert!(!tree.is_saved(root, &store));
        assert!(!tree.move_up(c, &mut store).unwrap());

        assert!(tree.move_down(c, &mut store).unwrap());
        assert_eq!(tree.children(root), &[a, c]);

        assert!(tree.indent(c, &mut store).unwrap());
        assert_eq!(tree.parent(c), Some(a));
        assert_eq!(tree.children(a).last(), Some(&c));

        assert!(tree.outdent(c, &mut store).unwrap());
        assert_eq!(tree.children(root), &[a, c]);
        assert!(!tree.outdent(c, &mut store).unwrap());
    }

    #[test]
    fn paths_resolve_against_container_directory() {
        let (mut tree, mut store, root, a, _b) = fixture();
        tree.set_path(a, Some(PathBuf::from("docs")), &mut store)
            .unwrap();
        let code = store.new_num();
        let file = tree
            .append_child(a, "readme", Some(PathBuf::from("readme.md")), code, &mut store)
            .unwrap();
        assert_eq!(tree.base_dir(root), PathBuf::from("/tmp"));
        assert_eq!(tree.resolved_path(a), Some(PathBuf::from("/tmp/docs")));
        assert_eq!(
            tree.resolved_path(file),
            Some(PathBuf::from("/tmp/docs/readme.md"))
        );
        assert_eq!(tree.breadcrumb(file), "proj->A->readme");
    }

    #[test]
    fn take_children_frees_codes_and_slots() {
        let (mut tree, mut store, root, a, b) = fixture();
        let b_code = tree.code(b).unwrap();
        tree.take_children(root, &mut store).unwrap();
        assert!(tree.children(root).is_empty());
        assert!(!tree.contains(a));
        assert!(!store.contains(b_code));
        assert_eq!(tree.len(), 1);
    }
}
