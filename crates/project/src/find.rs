//! Find and replace across every fragment of a project.
//! 在整個專案的所有片段中搜尋與取代。

use std::collections::BTreeSet;

use kmol_core::{Code, ContentStore, NodeId, OutlineTree};
use regex::{NoExpand, Regex, RegexBuilder};
use thiserror::Error;

/// Errors raised by project search.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FindError {
    #[error("search pattern cannot be empty")]
    EmptyPattern,
    #[error("invalid pattern: {0}")]
    InvalidPattern(String),
}

/// How the pattern is interpreted.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum FindMode {
    #[default]
    Plain,
    Regex,
}

/// 搜尋條件。 / Search options.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FindQuery {
    pub pattern: String,
    pub mode: FindMode,
    pub case_sensitive: bool,
    pub whole_word: bool,
}

impl FindQuery {
    pub fn new(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            mode: FindMode::Plain,
            case_sensitive: false,
            whole_word: false,
        }
    }

    fn build_regex(&self) -> Result<Regex, FindError> {
        if self.pattern.is_empty() {
            return Err(FindError::EmptyPattern);
        }
        let mut pattern = match self.mode {
            FindMode::Plain => regex::escape(&self.pattern),
            FindMode::Regex => self.pattern.clone(),
        };
        if self.whole_word {
            pattern = format!(r"\b(?:{pattern})\b");
        }
        RegexBuilder::new(&pattern)
            .case_insensitive(!self.case_sensitive)
            .multi_line(true)
            .build()
            .map_err(|err| FindError::InvalidPattern(err.to_string()))
    }
}

/// One hit inside a node's fragment.
/// 單一搜尋結果。
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FindMatch {
    pub node: NodeId,
    pub code: Code,
    /// `root->...->node` trail.
    pub breadcrumb: String,
    /// Byte span inside the fragment.
    pub start: usize,
    pub end: usize,
    /// One-based line number.
    pub line: usize,
    pub line_text: String,
}

/// Lists every match below `root` in pre-order. Aliased fragments are reported once per node.
/// 依前序列出 `root` 之下的所有符合項目。
pub fn find_in_project(
    tree: &OutlineTree,
    store: &ContentStore,
    root: NodeId,
    query: &FindQuery,
) -> Result<Vec<FindMatch>, FindError> {
    let regex = query.build_regex()?;
    let mut matches = Vec::new();
    for id in tree.subtree(root) {
        let Some(node) = tree.node(id) else {
            continue;
        };
        let text = store.get(node.code);
        let breadcrumb = tree.breadcrumb(id);
        for found in regex.find_iter(text) {
            let line_start = text[..found.start()].rfind('\n').map_or(0, |idx| idx + 1);
            let line_end = text[found.start()..]
                .find('\n')
                .map_or(text.len(), |idx| found.start() + idx);
            matches.push(FindMatch {
                node: id,
                code: node.code,
                breadcrumb: breadcrumb.clone(),
                start: found.start(),
                end: found.end(),
                line: text[..found.start()].matches('\n').count() + 1,
                line_text: text[line_start..line_end].to_string(),
            });
        }
    }
    Ok(matches)
}

/// Replaces every match below `root` and returns the number of replacements.
/// 取代 `root` 之下的所有符合項目並回傳取代次數。
///
/// Each distinct fragment is rewritten once through [`ContentStore::set`], so
/// changed fragments become unsaved. Regex replacements expand `$1`-style groups.
pub fn replace_in_project(
    tree: &OutlineTree,
    store: &mut ContentStore,
    root: NodeId,
    query: &FindQuery,
    replacement: &str,
) -> Result<usize, FindError> {
    let regex = query.build_regex()?;
    let codes: BTreeSet<Code> = tree.subtree_codes(root);
    let mut total = 0;
    for code in codes {
        let text = store.get(code);
        let count = regex.find_iter(text).count();
        if count == 0 {
            continue;
        }
        let replaced = match query.mode {
            FindMode::Regex => regex.replace_all(text, replacement).into_owned(),
            FindMode::Plain => regex.replace_all(text, NoExpand(replacement)).into_owned(),
        };
        store.set(code, replaced);
        total += count;
    }
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture() -> (OutlineTree, ContentStore, NodeId, NodeId) {
        let mut tree = OutlineTree::new();
        let mut store = ContentStore::new();
        let root_code = store.new_num();
        store.set(root_code, "@others");
        let root = tree.add_root("Proj", None, root_code);
        let a_code = store.new_num();
        store.set(a_code, "intro\nfoo bar\nFoo again");
        let a = tree.append_child(root, "A", None, a_code, &mut store).unwrap();
        let b_code = store.new_num();
        store.set(b_code, "food");
        let b = tree.append_child(a, "B", None, b_code, &mut store).unwrap();
        store.save_all();
        (tree, store, root, b)
    }

    #[test]
    fn matches_carry_breadcrumbs_and_lines() {
        let (tree, store, root, b) = fixture();
        let hits = find_in_project(&tree, &store, root, &FindQuery::new("foo")).unwrap();
        assert_eq!(hits.len(), 3);
        assert_eq!(hits[0].breadcrumb, "Proj->A");
        assert_eq!(hits[0].line, 2);
        assert_eq!(hits[0].line_text, "foo bar");
        assert_eq!(hits[1].line_text, "Foo again");
        assert_eq!(hits[2].node, b);
        assert_eq!(hits[2].breadcrumb, "Proj->A->B");
        assert_eq!((hits[2].start, hits[2].end), (0, 3));
    }

    #[test]
    fn case_and_whole_word_narrow_results() {
        let (tree, store, root, _) = fixture();
        let query = FindQuery {
            case_sensitive: true,
            whole_word: true,
            ..FindQuery::new("foo")
        };
        let hits = find_in_project(&tree, &store, root, &query).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].line_text, "foo bar");
    }

    #[test]
    fn invalid_queries_are_reported() {
        let (tree, store, root, _) = fixture();
        assert_eq!(
            find_in_project(&tree, &store, root, &FindQuery::new("")),
            Err(FindError::EmptyPattern)
        );
        let broken = FindQuery {
            mode: FindMode::Regex,
            ..FindQuery::new("(")
        };
        assert!(matches!(
            find_in_project(&tree, &store, root, &broken),
            Err(FindError::InvalidPattern(_))
        ));
    }

    #[test]
    fn replace_marks_project_unsaved() {
        let (tree, mut store, root, _) = fixture();
        assert!(tree.is_saved(root, &store));
        let query = FindQuery {
            mode: FindMode::Regex,
            ..FindQuery::new(r"(f)oo")
        };
        let count = replace_in_project(&tree, &mut store, root, &query, "${1}ee").unwrap();
        assert_eq!(count, 3);
        assert!(!tree.is_saved(root, &store));
        let hits = find_in_project(&tree, &store, root, &FindQuery::new("fee")).unwrap();
        assert_eq!(hits.len(), 3);
    }

    #[test]
    fn plain_replacement_is_literal() {
        let (tree, mut store, root, b) = fixture();
        let count =
            replace_in_project(&tree, &mut store, root, &FindQuery::new("food"), "$1").unwrap();
        assert_eq!(count, 1);
        assert_eq!(store.get(tree.code(b).unwrap()), "$1");
    }
}
