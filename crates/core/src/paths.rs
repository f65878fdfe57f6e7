use std::path::Path;

/// Suffix of project container files.
pub const PROJECT_SUFFIX: &str = "kmol";

/// 依副檔名判斷的檔案種類。 / File kinds recognised by their last suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Project,
    Markdown,
    Html,
    Python,
    Latex,
    Text,
}

impl FileKind {
    pub const ALL: [FileKind; 6] = [
        FileKind::Project,
        FileKind::Markdown,
        FileKind::Html,
        FileKind::Python,
        FileKind::Latex,
        FileKind::Text,
    ];

    /// Classifies a path by its last suffix; `None` for unknown or missing suffixes.
    /// 依最後一段副檔名分類；未知或無副檔名時回傳 `None`。
    pub fn from_path(path: &Path) -> Option<Self> {
        Self::from_suffix(&file_suffix(path))
    }

    pub fn from_suffix(suffix: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.suffix() == suffix)
    }

    pub fn suffix(self) -> &'static str {
        match self {
            FileKind::Project => PROJECT_SUFFIX,
            FileKind::Markdown => "md",
            FileKind::Html => "html",
            FileKind::Python => "py",
            FileKind::Latex => "tex",
            FileKind::Text => "txt",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            FileKind::Project => "Kmol Project",
            FileKind::Markdown => "Markdown",
            FileKind::Html => "HTML",
            FileKind::Python => "Python script",
            FileKind::Latex => "Latex",
            FileKind::Text => "Text file",
        }
    }

    /// Plain-text kinds are written verbatim by the serializer.
    pub fn is_plain_text(self) -> bool {
        !matches!(self, FileKind::Project)
    }
}

/// Returns the text after the last `.` of the file name (`notes.v2.md` → `md`).
/// 回傳檔名最後一個 `.` 之後的副檔名。
///
/// Hidden files such as `.hidden` have no suffix.
pub fn file_suffix(path: &Path) -> String {
    path.extension()
        .map(|suffix| suffix.to_string_lossy().into_owned())
        .unwrap_or_default()
}
