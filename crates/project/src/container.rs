//! `.kmol` project container: the outline plus every embedded fragment, as JSON.
//! `.kmol` 專案容器：以 JSON 保存大綱結構與內嵌的文字片段。

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fs;
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};

use kmol_core::{
    Code, ContentStore, EventSink, FileKind, NodeId, OutlineEvent, OutlineTree, TreeError,
};
use log::info;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::util::write_atomic;

/// Highest container format version this build reads and the one it writes.
pub const CONTAINER_VERSION: u32 = 1;

/// Written into the `generator` field.
pub const GENERATOR: &str = concat!("kmol ", env!("CARGO_PKG_VERSION"));

/// One node descriptor. External file nodes carry no children.
/// 節點描述；外部檔案節點不含子節點。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeRecord {
    pub name: String,
    #[serde(
        default,
        with = "crate::serde_path::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub path: Option<PathBuf>,
    pub code: Code,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<NodeRecord>,
}

/// On-disk layout of a container.
/// 容器檔案的結構。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerFile {
    pub generator: String,
    pub version: u32,
    pub root_code: Code,
    #[serde(default)]
    pub nodes: Vec<NodeRecord>,
    #[serde(default)]
    pub data: BTreeMap<Code, String>,
}

/// Errors raised while reading or writing containers.
#[derive(Debug, Error)]
pub enum ContainerError {
    #[error("No such file or directory: '{}'", .0.display())]
    NotFound(PathBuf),
    #[error("container IO error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("invalid container {}: {message}", path.display())]
    Parse { path: PathBuf, message: String },
    #[error("failed to serialize container: {0}")]
    Serialize(String),
    #[error("unsupported container version {found} (this build reads up to {supported})")]
    UnsupportedVersion { found: u32, supported: u32 },
    #[error(transparent)]
    Tree(#[from] TreeError),
}

fn is_external(path: Option<&Path>) -> bool {
    path.and_then(FileKind::from_path).is_some()
}

/// Builds the container image of `node`'s subtree.
/// 建立節點子樹的容器映像。
pub fn snapshot(
    tree: &OutlineTree,
    store: &ContentStore,
    node: NodeId,
) -> Result<ContainerFile, TreeError> {
    let root_code = tree.code(node)?;
    let mut data = BTreeMap::new();
    data.insert(root_code, store.get(root_code).to_string());
    let nodes = tree
        .children(node)
        .iter()
        .map(|child| record(tree, store, *child, &mut data))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(ContainerFile {
        generator: GENERATOR.to_string(),
        version: CONTAINER_VERSION,
        root_code,
        nodes,
        data,
    })
}

fn record(
    tree: &OutlineTree,
    store: &ContentStore,
    id: NodeId,
    data: &mut BTreeMap<Code, String>,
) -> Result<NodeRecord, TreeError> {
    let node = tree.node(id).ok_or(TreeError::NodeNotFound(id))?;
    let mut out = NodeRecord {
        name: node.name.clone(),
        path: node.path.clone(),
        code: node.code,
        children: Vec::new(),
    };
    if is_external(node.path.as_deref()) {
        return Ok(out);
    }
    data.insert(node.code, store.get(node.code).to_string());
    for child in node.children() {
        out.children.push(record(tree, store, *child, data)?);
    }
    Ok(out)
}

/// Writes the container atomically and marks the embedded fragments saved.
/// 以原子方式寫入容器，完成後把內嵌的片段標記為已儲存。
///
/// External file nodes keep their own saved state, so a file whose write
/// failed stays unsaved.
pub fn write_container(
    tree: &OutlineTree,
    store: &mut ContentStore,
    node: NodeId,
    path: &Path,
    sink: &dyn EventSink,
) -> Result<(), ContainerError> {
    let image = snapshot(tree, store, node)?;
    let payload = serde_json::to_vec_pretty(&image)
        .map_err(|err| ContainerError::Serialize(err.to_string()))?;
    write_atomic(path, &payload).map_err(|source| ContainerError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let pending = unsaved_external_codes(tree, store, node);
    for code in image.data.keys().filter(|code| !pending.contains(code)) {
        store.set_saved(*code, true);
    }
    sink.emit(&OutlineEvent::Saved {
        path: path.to_path_buf(),
    });
    Ok(())
}

// Codes under external file nodes that still need writing.
fn unsaved_external_codes(
    tree: &OutlineTree,
    store: &ContentStore,
    node: NodeId,
) -> BTreeSet<Code> {
    let mut pending = BTreeSet::new();
    let mut stack = tree.children(node).to_vec();
    while let Some(id) = stack.pop() {
        let Some(child) = tree.node(id) else {
            continue;
        };
        if is_external(child.path.as_deref()) {
            if !tree.is_saved(id, store) {
                pending.extend(tree.subtree_codes(id));
            }
        } else {
            stack.extend(child.children().iter().copied());
        }
    }
    pending
}

/// Reads, parses and version-checks a container without touching any state.
/// 讀取並驗證容器，不修改任何狀態。
pub fn read_file(path: &Path) -> Result<ContainerFile, ContainerError> {
    let contents = fs::read_to_string(path).map_err(|source| match source.kind() {
        ErrorKind::NotFound => ContainerError::NotFound(path.to_path_buf()),
        _ => ContainerError::Io {
            path: path.to_path_buf(),
            source,
        },
    })?;
    let image: ContainerFile =
        serde_json::from_str(&contents).map_err(|err| ContainerError::Parse {
            path: path.to_path_buf(),
            message: err.to_string(),
        })?;
    if image.version > CONTAINER_VERSION {
        return Err(ContainerError::UnsupportedVersion {
            found: image.version,
            supported: CONTAINER_VERSION,
        });
    }
    Ok(image)
}

/// Rebuilds `node`'s subtree from a validated image.
/// 由已驗證的映像重建節點子樹。
///
/// Codes that are live elsewhere are remapped to fresh ones, shared codes
/// stay shared. Returns the external file nodes, which still need loading.
pub fn restore(
    tree: &mut OutlineTree,
    store: &mut ContentStore,
    node: NodeId,
    image: ContainerFile,
) -> Result<Vec<NodeId>, ContainerError> {
    let root_code = tree.code(node)?;
    tree.take_children(node, store)?;

    let mut restorer = Restorer {
        data: image.data,
        remap: HashMap::from([(image.root_code, root_code)]),
        external: Vec::new(),
    };
    let root_text = restorer.data.remove(&image.root_code).unwrap_or_default();
    store.set(root_code, root_text);
    for record in &image.nodes {
        restorer.build(tree, store, node, record)?;
    }
    tree.save_subtree(node, store);
    info!(
        "event=container_restored module=container nodes={} external={}",
        tree.subtree(node).len() - 1,
        restorer.external.len()
    );
    Ok(restorer.external)
}

struct Restorer {
    data: BTreeMap<Code, String>,
    remap: HashMap<Code, Code>,
    external: Vec<NodeId>,
}

impl Restorer {
    fn build(
        &mut self,
        tree: &mut OutlineTree,
        store: &mut ContentStore,
        parent: NodeId,
        record: &NodeRecord,
    ) -> Result<(), ContainerError> {
        let external = is_external(record.path.as_deref());
        let code = match self.remap.get(&record.code) {
            Some(code) => *code,
            None => {
                let code = if store.contains(record.code) {
                    store.new_num()
                } else {
                    record.code
                };
                let text = if external {
                    String::new()
                } else {
                    self.data.get(&record.code).cloned().unwrap_or_default()
                };
                store.set(code, text);
                self.remap.insert(record.code, code);
                code
            }
        };
        let id = tree.append_child(parent, record.name.clone(), record.path.clone(), code, store)?;
        if let Some(name) = tree.node(id).and_then(|node| node.macro_name()) {
            let _ = store.add_macro(name.to_owned(), code);
        }
        if external {
            self.external.push(id);
            return Ok(());
        }
        for child in &record.children {
            self.build(tree, store, id, child)?;
        }
        Ok(())
    }
}

/// [`read_file`] followed by [`restore`]; nothing changes when reading fails.
pub fn read_container(
    tree: &mut OutlineTree,
    store: &mut ContentStore,
    node: NodeId,
    path: &Path,
) -> Result<Vec<NodeId>, ContainerError> {
    let image = read_file(path)?;
    restore(tree, store, node, image)
}

#[cfg(test)]
mod tests {
    use super::*;
    use kmol_core::LogSink;
    use tempfile::tempdir;

    fn project(path: &Path) -> (OutlineTree, ContentStore, NodeId) {
        let mut tree = OutlineTree::new();
        let mut store = ContentStore::new();
        let root_code = store.new_num();
        store.set(root_code, "project notes");
        let root = tree.add_root("proj", Some(path.to_path_buf()), root_code);

        let folder_code = store.new_num();
        store.set(folder_code, "@others");
        let folder = tree
            .append_child(root, "folder", None, folder_code, &mut store)
            .unwrap();
        let macro_code = store.new_num();
        store.set(macro_code, "print(1)");
        let script = tree.append_child(folder, "tmp", None, macro_code, &mut store).unwrap();
        tree.set_name(script, "@hello", &mut store).unwrap();
        let doc_code = store.new_num();
        store.set(doc_code, "# not embedded");
        tree.append_child(root, "readme", Some(PathBuf::from("readme.md")), doc_code, &mut store)
            .unwrap();
        (tree, store, root)
    }

    #[test]
    fn external_nodes_are_not_embedded() {
        let (tree, store, root) = project(Path::new("/tmp/proj.kmol"));
        let image = snapshot(&tree, &store, root).unwrap();
        assert_eq!(image.nodes.len(), 2);
        let readme = &image.nodes[1];
        assert_eq!(readme.path, Some(PathBuf::from("readme.md")));
        assert!(!image.data.contains_key(&readme.code));
        assert_eq!(image.data.len(), 3);
        assert_eq!(image.data[&image.root_code], "project notes");
    }

    #[test]
    fn write_then_read_rebuilds_structure_and_macros() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("proj.kmol");
        let (mut tree, mut store, root) = project(&path);
        write_container(&tree, &mut store, root, &path, &LogSink).unwrap();
        let (folder, readme) = (tree.children(root)[0], tree.children(root)[1]);
        assert!(tree.is_saved(folder, &store));
        assert!(store.is_saved(tree.code(root).unwrap()));
        // The external file was never written.
        assert!(!tree.is_saved(readme, &store));

        let mut fresh_tree = OutlineTree::new();
        let mut fresh_store = ContentStore::new();
        let code = fresh_store.new_num();
        let reopened = fresh_tree.add_root("proj", Some(path.clone()), code);
        let external =
            read_container(&mut fresh_tree, &mut fresh_store, reopened, &path).unwrap();

        assert_eq!(external.len(), 1);
        assert_eq!(fresh_store.get(code), "project notes");
        let folder = fresh_tree.children(reopened)[0];
        let script = fresh_tree.children(folder)[0];
        assert_eq!(fresh_tree.node(script).unwrap().name, "@hello");
        let macro_code = fresh_store.macro_code("hello").unwrap();
        assert_eq!(fresh_store.get(macro_code), "print(1)");
        assert!(fresh_tree.is_saved(reopened, &fresh_store));

        // The second load into the original session must not steal live codes.
        let other_code = store.new_num();
        let other = tree.add_root("again", Some(path.clone()), other_code);
        read_container(&mut tree, &mut store, other, &path).unwrap();
        let original_folder = tree.children(root)[0];
        let copy_folder = tree.children(other)[0];
        assert_ne!(
            tree.code(original_folder).unwrap(),
            tree.code(copy_folder).unwrap()
        );
        assert_eq!(store.get(tree.code(copy_folder).unwrap()), "@others");
    }

    #[test]
    fn invalid_container_changes_nothing() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("broken.kmol");
        fs::write(&path, "{ not json").unwrap();
        let (mut tree, mut store, root) = project(Path::new("/tmp/proj.kmol"));
        let before = tree.subtree(root).len();
        let err = read_container(&mut tree, &mut store, root, &path).unwrap_err();
        assert!(matches!(err, ContainerError::Parse { .. }));
        assert_eq!(tree.subtree(root).len(), before);
    }

    #[test]
    fn newer_versions_are_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("future.kmol");
        fs::write(
            &path,
            r#"{"generator":"kmol 9","version":99,"root_code":0,"nodes":[],"data":{}}"#,
        )
        .unwrap();
        let err = read_file(&path).unwrap_err();
        assert!(matches!(
            err,
            ContainerError::UnsupportedVersion { found: 99, .. }
        ));
    }

    #[test]
    fn shared_codes_stay_shared() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("alias.kmol");
        fs::write(
            &path,
            r#"{
                "generator": "kmol",
                "version": 1,
                "root_code": 0,
                "nodes": [
                    {"name": "a", "code": 5},
                    {"name": "b", "code": 5}
                ],
                "data": {"0": "@others", "5": "shared"}
            }"#,
        )
        .unwrap();
        let mut tree = OutlineTree::new();
        let mut store = ContentStore::new();
        let code = store.new_num();
        let root = tree.add_root("alias", Some(path.clone()), code);
        read_container(&mut tree, &mut store, root, &path).unwrap();
        let children = tree.children(root).to_vec();
        assert_eq!(tree.code(children[0]).unwrap(), tree.code(children[1]).unwrap());
        assert_eq!(store.get(tree.code(children[0]).unwrap()), "shared");
    }
}
