//! Markdown heading parser: turns one document into a subtree of sections.
//! Markdown 標題解析器：把單一文件切成章節子樹。

use kmol_core::{ContentStore, NodeId, OutlineTree, TreeError};
use serde::{Deserialize, Serialize};

/// Placeholder line expanded to the node's children on save.
pub const OTHERS_DIRECTIVE: &str = "@others";

const FENCE: &str = "```";

/// 底線式標題的縮排規則。 / How indented title lines of underlined headings are treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SetextPolicy {
    /// The title line must not start with whitespace.
    #[default]
    RequireUnindented,
    AllowIndented,
    /// Only `#` headings are recognised.
    Disabled,
}

/// 解析選項。 / Heading parser options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParserOptions {
    pub setext: SetextPolicy,
    /// Appends an `@others` line after a preamble so sections survive a save.
    pub preamble_placeholder: bool,
}

impl Default for ParserOptions {
    fn default() -> Self {
        Self {
            setext: SetextPolicy::default(),
            preamble_placeholder: true,
        }
    }
}

/// A heading found in a document. Levels share one scale: `#` and `===` are 1.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Heading {
    /// Zero-based index of the line that starts the section.
    pub line: usize,
    pub level: usize,
    pub title: String,
}

/// Scans `lines` for headings, skipping fenced code blocks.
/// 掃描標題；程式碼區塊內的內容不會被視為標題。
pub fn scan_headings(lines: &[&str], options: &ParserOptions) -> Vec<Heading> {
    let mut headings = Vec::new();
    let mut in_fence = false;
    let mut title_candidate: Option<usize> = None;

    for (index, line) in lines.iter().enumerate() {
        if line.starts_with(FENCE) {
            in_fence = !in_fence;
            title_candidate = None;
            continue;
        }
        if in_fence {
            continue;
        }
        if options.setext != SetextPolicy::Disabled {
            if let Some(level) = underline_level(line) {
                if let Some(title_line) = title_candidate.take() {
                    headings.push(Heading {
                        line: title_line,
                        level,
                        title: lines[title_line].trim().to_string(),
                    });
                }
                continue;
            }
        }
        if let Some((level, title)) = atx_heading(line) {
            headings.push(Heading {
                line: index,
                level,
                title,
            });
            title_candidate = None;
            continue;
        }
        title_candidate = is_title_line(line, options.setext).then_some(index);
    }
    headings
}

/// `# Title` style heading: the first token is only `#`, the line holds something else too.
fn atx_heading(line: &str) -> Option<(usize, String)> {
    let marker = line.split_whitespace().next()?;
    if !marker.chars().all(|ch| ch == '#') || line.trim().chars().all(|ch| ch == '#') {
        return None;
    }
    let rest = &line.trim_start()[marker.len()..];
    Some((marker.len(), rest.trim().to_string()))
}

/// `===` maps to level 1 and `---` to level 2; at least three characters.
fn underline_level(line: &str) -> Option<usize> {
    let mut chars = line.chars();
    let first = chars.next()?;
    let level = match first {
        '=' => 1,
        '-' => 2,
        _ => return None,
    };
    let count = 1 + chars.clone().count();
    (count >= 3 && chars.all(|ch| ch == first)).then_some(level)
}

fn is_title_line(line: &str, policy: SetextPolicy) -> bool {
    if line.trim().is_empty() {
        return false;
    }
    match policy {
        SetextPolicy::RequireUnindented => !line.starts_with(char::is_whitespace),
        SetextPolicy::AllowIndented => true,
        SetextPolicy::Disabled => false,
    }
}

/// Parses `text` into `node`: the node keeps the preamble, every heading becomes a child.
/// 將文件解析到節點下：前言留在節點本身，每個標題成為子節點。
///
/// A section whose next heading is deeper gets an `@others` line so its
/// subsections are spliced back in on save. Returns the created nodes in
/// document order.
pub fn parse_markdown(
    tree: &mut OutlineTree,
    store: &mut ContentStore,
    node: NodeId,
    text: &str,
    options: &ParserOptions,
) -> Result<Vec<NodeId>, TreeError> {
    let code = tree.code(node)?;
    let lines: Vec<&str> = text.split('\n').collect();
    let headings = scan_headings(&lines, options);
    let Some(first) = headings.first() else {
        store.set(code, text);
        return Ok(Vec::new());
    };

    let root_body = if first.line == 0 {
        OTHERS_DIRECTIVE.to_string()
    } else {
        let mut preamble = lines[..first.line].to_vec();
        if options.preamble_placeholder {
            preamble.push(OTHERS_DIRECTIVE);
        }
        preamble.join("\n")
    };
    store.set(code, root_body);

    let mut created: Vec<NodeId> = Vec::with_capacity(headings.len());
    for (index, heading) in headings.iter().enumerate() {
        let next = headings.get(index + 1);
        let end = next.map_or(lines.len(), |next| next.line);
        let mut body = lines[heading.line..end].to_vec();
        if next.is_some_and(|next| next.level > heading.level) {
            body.push(OTHERS_DIRECTIVE);
            body.push("");
        }

        let parent = headings[..index]
            .iter()
            .zip(&created)
            .rev()
            .find(|(previous, _)| previous.level < heading.level)
            .map_or(node, |(_, id)| *id);

        let child_code = store.new_num();
        store.set(child_code, body.join("\n"));
        let id = tree.append_child(parent, heading.title.clone(), None, child_code, store)?;
        if let Some(name) = tree.node(id).and_then(|child| child.macro_name()) {
            let _ = store.add_macro(name.to_owned(), child_code);
        }
        created.push(id);
    }
    Ok(created)
}
