//! Session state shared by every open project.
//! 所有已開啟專案共用的工作階段狀態。

use std::path::Path;
use std::sync::Arc;

use kmol_core::{
    ContentStore, LogSink, NodeId, OutlineTree, SharedSink, TextEncoding, TreeError,
};

use crate::find::{self, FindError, FindMatch, FindQuery};
use crate::markdown::ParserOptions;
use crate::tangle::{self, SaveReport, TangleOptions};

/// Tunables applied when loading and saving.
/// 載入與儲存時使用的設定。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OutlineOptions {
    pub parser: ParserOptions,
    pub tangle: TangleOptions,
    /// Decoding fallback for files that are not valid UTF-8; `None` lets the detector guess.
    pub read_encoding: Option<TextEncoding>,
}

/// The control-thread owner of the tree and the content store.
/// 由控制執行緒持有的大綱樹與內容儲存區。
pub struct Outline {
    pub tree: OutlineTree,
    pub store: ContentStore,
    pub options: OutlineOptions,
    pub(crate) sink: SharedSink,
}

impl Default for Outline {
    fn default() -> Self {
        Self::new(OutlineOptions::default())
    }
}

impl Outline {
    /// Events go to the `log` facade.
    pub fn new(options: OutlineOptions) -> Self {
        Self::with_sink(options, Arc::new(LogSink))
    }

    pub fn with_sink(options: OutlineOptions, sink: SharedSink) -> Self {
        Self {
            tree: OutlineTree::new(),
            store: ContentStore::with_sink(sink.clone()),
            options,
            sink,
        }
    }

    pub fn sink(&self) -> &SharedSink {
        &self.sink
    }

    /// Open root whose own path is `path`, if any.
    pub fn root_for_path(&self, path: &Path) -> Option<NodeId> {
        self.tree.roots().iter().copied().find(|root| {
            self.tree
                .node(*root)
                .and_then(|node| node.path.as_deref())
                .is_some_and(|own| own == path)
        })
    }

    /// Closes a project, releasing its fragments.
    pub fn close_root(&mut self, root: NodeId) -> Result<(), TreeError> {
        self.tree.remove(root, &mut self.store)
    }

    /// Expanded text of a node, for previews.
    pub fn render(&self, node: NodeId) -> String {
        tangle::render(&self.tree, &self.store, node, self.options.tangle.separator)
    }

    /// Saves one project.
    pub fn save_root(&mut self, root: NodeId) -> SaveReport {
        tangle::save_root(
            &self.tree,
            &mut self.store,
            root,
            &self.options.tangle,
            self.sink.as_ref(),
        )
    }

    /// Saves every open project.
    /// 儲存所有開啟中的專案。
    pub fn save_all(&mut self) -> SaveReport {
        let mut report = SaveReport::default();
        for root in self.tree.roots().to_vec() {
            report.merge(self.save_root(root));
        }
        report
    }

    pub fn find(&self, root: NodeId, query: &FindQuery) -> Result<Vec<FindMatch>, FindError> {
        find::find_in_project(&self.tree, &self.store, root, query)
    }

    pub fn replace(
        &mut self,
        root: NodeId,
        query: &FindQuery,
        replacement: &str,
    ) -> Result<usize, FindError> {
        find::replace_in_project(&self.tree, &mut self.store, root, query, replacement)
    }
}
