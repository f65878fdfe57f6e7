//! Tree serializer: expands `@others` placeholders bottom-up and writes dirty files.
//! 樹狀序列化：由下而上展開 `@others`，並寫回尚未儲存的檔案。

use std::path::{Path, PathBuf};

use kmol_core::{
    ensure_trailing_newline, file_suffix, write_text, ContentStore, EventSink, FileKind, NodeId,
    OutlineEvent, OutlineTree, TextEncoding,
};
use log::debug;
use serde::{Deserialize, Serialize};

use crate::container;
use crate::markdown::OTHERS_DIRECTIVE;

/// 子節點之間的分隔方式。 / Text placed between two spliced children.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ChildSeparator {
    /// One empty line between siblings.
    #[default]
    BlankLine,
    /// Siblings follow each other directly.
    Newline,
}

impl ChildSeparator {
    pub fn as_str(self) -> &'static str {
        match self {
            ChildSeparator::BlankLine => "\n\n",
            ChildSeparator::Newline => "\n",
        }
    }
}

/// 序列化選項。 / Serializer options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TangleOptions {
    pub separator: ChildSeparator,
    pub encoding: TextEncoding,
}

/// A write that did not go through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteFailure {
    pub path: PathBuf,
    pub message: String,
}

/// 一次儲存的結果摘要。 / Outcome of one save pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SaveReport {
    pub written: Vec<PathBuf>,
    pub skipped: Vec<PathBuf>,
    pub failed: Vec<WriteFailure>,
}

impl SaveReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn merge(&mut self, other: SaveReport) {
        self.written.extend(other.written);
        self.skipped.extend(other.skipped);
        self.failed.extend(other.failed);
    }
}

/// Expanded text of a node plus the aggregate saved flag observed before any write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tangled {
    pub text: String,
    pub saved: bool,
}

/// Replaces every line ending in `@others` by the children, each prefixed with
/// the text before the directive.
///
/// Lines are split with `str::lines`, so a single trailing newline of `own`
/// does not survive.
pub fn splice_children(own: &str, children: &[String], separator: ChildSeparator) -> String {
    let mut out: Vec<String> = Vec::new();
    for line in own.lines() {
        match line.strip_suffix(OTHERS_DIRECTIVE) {
            Some(prefix) => out.push(
                children
                    .iter()
                    .map(|child| format!("{prefix}{child}"))
                    .collect::<Vec<_>>()
                    .join(separator.as_str()),
            ),
            None => out.push(line.to_string()),
        }
    }
    out.join("\n")
}

/// Expands a subtree without touching the disk or the saved flags.
/// 展開子樹但不寫檔，供預覽使用。
pub fn render(
    tree: &OutlineTree,
    store: &ContentStore,
    node: NodeId,
    separator: ChildSeparator,
) -> String {
    let Some(current) = tree.node(node) else {
        return String::new();
    };
    let children: Vec<String> = current
        .children()
        .iter()
        .map(|child| render(tree, store, *child, separator))
        .collect();
    splice_children(store.get(current.code), &children, separator)
}

/// Post-order save of `node`: children first, then this node's own file.
/// 後序儲存：先處理子節點，再寫入本節點的檔案。
///
/// A node whose subtree was already saved is not written. Failures are
/// recorded in `report` and do not stop siblings.
pub fn tangle(
    tree: &OutlineTree,
    store: &mut ContentStore,
    node: NodeId,
    options: &TangleOptions,
    sink: &dyn EventSink,
    report: &mut SaveReport,
) -> Tangled {
    let Some(current) = tree.node(node) else {
        return Tangled {
            text: String::new(),
            saved: true,
        };
    };
    let code = current.code;
    let mut saved = store.is_saved(code);
    let mut children = Vec::with_capacity(current.children().len());
    for child in current.children() {
        let tangled = tangle(tree, store, *child, options, sink, report);
        saved &= tangled.saved;
        children.push(tangled.text);
    }
    let text = splice_children(store.get(code), &children, options.separator);
    if !saved {
        write_node(tree, store, node, &text, options, sink, report);
    }
    Tangled { text, saved }
}

fn write_node(
    tree: &OutlineTree,
    store: &mut ContentStore,
    node: NodeId,
    text: &str,
    options: &TangleOptions,
    sink: &dyn EventSink,
    report: &mut SaveReport,
) {
    let Some(path) = tree.resolved_path(node) else {
        return;
    };
    match FileKind::from_path(&path) {
        Some(FileKind::Project) => match container::write_container(tree, store, node, &path, sink)
        {
            Ok(()) => report.written.push(path),
            Err(err) => fail(sink, report, path, err.to_string()),
        },
        Some(_) => {
            let content = ensure_trailing_newline(text);
            match write_text(&path, &content, options.encoding) {
                Ok(created) => {
                    if created {
                        if let Some(parent) = path.parent() {
                            sink.emit(&OutlineEvent::FolderCreated {
                                path: parent.to_path_buf(),
                            });
                        }
                    }
                    tree.save_subtree(node, store);
                    sink.emit(&OutlineEvent::Saved { path: path.clone() });
                    report.written.push(path);
                }
                Err(err) => fail(sink, report, path, err.to_string()),
            }
        }
        None if has_suffix(&path) => {
            sink.emit(&OutlineEvent::Skipped { path: path.clone() });
            report.skipped.push(path);
        }
        None => debug!("event=tangle_directory module=tangle path={}", path.display()),
    }
}

fn has_suffix(path: &Path) -> bool {
    !file_suffix(path).is_empty()
}

fn fail(sink: &dyn EventSink, report: &mut SaveReport, path: PathBuf, message: String) {
    sink.emit(&OutlineEvent::WriteFailed {
        path: path.clone(),
        message: message.clone(),
    });
    report.failed.push(WriteFailure { path, message });
}

/// Tangles a whole project and, when every write succeeded, marks it saved.
/// 儲存整個專案；全部寫入成功後才標記為已儲存。
pub fn save_root(
    tree: &OutlineTree,
    store: &mut ContentStore,
    root: NodeId,
    options: &TangleOptions,
    sink: &dyn EventSink,
) -> SaveReport {
    let mut report = SaveReport::default();
    tangle(tree, store, root, options, sink, &mut report);
    if report.is_clean() {
        tree.save_subtree(root, store);
    }
    report
}
