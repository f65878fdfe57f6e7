//! Loading nodes from disk, dispatched on the file suffix.
//! 依副檔名從磁碟載入節點。

use std::path::Path;

use kmol_core::{read_text, FileKind, NodeId, OutlineEvent, TreeError};
use log::warn;
use thiserror::Error;

use crate::container::{self, ContainerError};
use crate::markdown;
use crate::outline::Outline;

/// Errors that abort a load. Missing or unreadable text files are not errors:
/// their message becomes the fragment text.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("node {0} has no file path")]
    NoPath(NodeId),
    #[error(transparent)]
    Container(#[from] ContainerError),
    #[error(transparent)]
    Tree(#[from] TreeError),
}

impl Outline {
    /// Opens a file as a new project root named after its stem.
    /// 以檔名（不含副檔名）為名開啟新的專案根節點。
    ///
    /// A container that cannot be read leaves no root behind.
    pub fn open_root(&mut self, path: impl AsRef<Path>) -> Result<NodeId, LoadError> {
        let path = path.as_ref().to_path_buf();
        let name = root_name(&path);
        let code = self.store.new_num();
        let root = self.tree.add_root(name, Some(path), code);
        if let Err(err) = self.parse_node(root) {
            self.tree.remove(root, &mut self.store)?;
            return Err(err);
        }
        Ok(root)
    }

    /// Reloads a node from its file, discarding its current children.
    /// 從檔案重新載入節點；原有子節點會被捨棄。
    ///
    /// The enclosing project keeps its saved state: rebuilding the children
    /// from disk is not an edit.
    pub fn parse_node(&mut self, id: NodeId) -> Result<(), LoadError> {
        let path = self.tree.resolved_path(id).ok_or(LoadError::NoPath(id))?;
        let root = self.tree.root_of(id)?;
        let root_code = self.tree.code(root)?;
        let root_saved = self.store.is_saved(root_code);
        match FileKind::from_path(&path) {
            Some(FileKind::Project) => {
                let external =
                    container::read_container(&mut self.tree, &mut self.store, id, &path)?;
                for node in external {
                    if let Err(err) = self.parse_node(node) {
                        warn!(
                            "event=load_failed module=load node={node} error={err}"
                        );
                        let code = self.tree.code(node)?;
                        self.store.set(code, err.to_string());
                    }
                }
            }
            kind => {
                self.tree.take_children(id, &mut self.store)?;
                let code = self.tree.code(id)?;
                match read_text(&path, self.options.read_encoding) {
                    Ok(text) if kind == Some(FileKind::Markdown) => {
                        markdown::parse_markdown(
                            &mut self.tree,
                            &mut self.store,
                            id,
                            &text,
                            &self.options.parser,
                        )?;
                    }
                    Ok(text) => self.store.set(code, text),
                    Err(err) => {
                        warn!(
                            "event=read_failed module=load path={} error={err}",
                            path.display()
                        );
                        self.store.set(code, err.to_string());
                    }
                }
            }
        }
        self.tree.save_subtree(id, &mut self.store);
        if root != id {
            self.store.set_saved(root_code, root_saved);
        }
        self.sink.emit(&OutlineEvent::Loaded { path });
        Ok(())
    }
}

fn root_name(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .filter(|stem| !stem.is_empty())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::outline::OutlineOptions;
    use kmol_core::EventLog;
    use std::fs;
    use std::sync::Arc;
    use tempfile::tempdir;

    #[test]
    fn missing_file_becomes_fragment_text() {
        let dir = tempdir().unwrap();
        let log = Arc::new(EventLog::new());
        let mut outline = Outline::with_sink(OutlineOptions::default(), log.clone());
        let root = outline.open_root(dir.path().join("absent.md")).unwrap();
        let code = outline.tree.code(root).unwrap();
        assert!(outline
            .store
            .get(code)
            .starts_with("No such file or directory"));
        assert!(outline.tree.is_saved(root, &outline.store));
        assert!(log
            .drain()
            .iter()
            .any(|event| matches!(event, OutlineEvent::Loaded { .. })));
    }

    #[test]
    fn markdown_root_is_parsed_into_sections() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("notes.md");
        fs::write(&path, "# A\ntext1\n## B\ntext2\n").unwrap();
        let mut outline = Outline::default();
        let root = outline.open_root(&path).unwrap();
        assert_eq!(outline.tree.node(root).unwrap().name, "notes");
        let a = outline.tree.children(root)[0];
        assert_eq!(outline.tree.children(a).len(), 1);
    }

    #[test]
    fn other_suffixes_load_verbatim() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("tool.py");
        fs::write(&path, "# comment, not a heading\nprint(1)\n").unwrap();
        let mut outline = Outline::default();
        let root = outline.open_root(&path).unwrap();
        assert!(outline.tree.children(root).is_empty());
        let code = outline.tree.code(root).unwrap();
        assert_eq!(
            outline.store.get(code),
            "# comment, not a heading\nprint(1)\n"
        );
    }

    #[test]
    fn unreadable_container_leaves_no_root() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("broken.kmol");
        fs::write(&path, "[]").unwrap();
        let mut outline = Outline::default();
        assert!(outline.open_root(&path).is_err());
        assert!(outline.tree.roots().is_empty());
        assert!(outline.store.is_empty());
    }

    #[test]
    fn reparse_discards_children() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("doc.md");
        fs::write(&path, "# One\n# Two\n").unwrap();
        let mut outline = Outline::default();
        let root = outline.open_root(&path).unwrap();
        assert_eq!(outline.tree.children(root).len(), 2);

        fs::write(&path, "# Only\n").unwrap();
        outline.parse_node(root).unwrap();
        assert_eq!(outline.tree.children(root).len(), 1);
        assert_eq!(outline.tree.len(), 2);
    }

    #[test]
    fn multi_dot_markdown_is_parsed_and_written_back() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("notes.v2.md");
        fs::write(&path, "# A\nold\n").unwrap();
        let mut outline = Outline::default();
        let root = outline.open_root(&path).unwrap();
        assert_eq!(outline.tree.node(root).unwrap().name, "notes.v2");
        let section = outline.tree.children(root)[0];
        let code = outline.tree.code(section).unwrap();
        assert_eq!(outline.store.get(code), "# A\nold\n");

        outline.store.set(code, "# A\nnew\n");
        let report = outline.save_root(root);
        assert_eq!(report.written, vec![path.clone()]);
        assert!(report.skipped.is_empty());
        assert_eq!(fs::read_to_string(&path).unwrap(), "# A\nnew\n");
    }

    #[test]
    fn reloading_a_child_file_keeps_the_project_saved() {
        let dir = tempdir().unwrap();
        let notes = dir.path().join("notes.md");
        fs::write(&notes, "# Intro\nbody\n").unwrap();
        let mut outline = Outline::default();
        let root_code = outline.store.new_num();
        let root = outline
            .tree
            .add_root("site", Some(dir.path().join("site.kmol")), root_code);
        let child_code = outline.store.new_num();
        let child = outline
            .tree
            .append_child(root, "notes", Some(notes.clone()), child_code, &mut outline.store)
            .unwrap();
        assert!(!outline.tree.is_saved(root, &outline.store));
        outline.store.save_all();

        fs::write(&notes, "# Intro\nchanged\n").unwrap();
        outline.parse_node(child).unwrap();
        assert_eq!(outline.tree.children(child).len(), 1);
        assert!(outline.tree.is_saved(root, &outline.store));
    }
}
