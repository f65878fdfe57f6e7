use std::borrow::Cow;
use std::fs;
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};

use chardetng::EncodingDetector;
use encoding_rs::{Encoding as RsEncoding, BIG5, GBK, SHIFT_JIS, UTF_8, WINDOWS_1252};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 讀寫節點檔案時使用的文字編碼。 / Text encoding used when reading or writing node files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum TextEncoding {
    #[default]
    Utf8,
    Windows1252,
    ShiftJis,
    Gbk,
    Big5,
}

impl TextEncoding {
    pub fn name(self) -> &'static str {
        match self {
            TextEncoding::Utf8 => "utf-8",
            TextEncoding::Windows1252 => "windows-1252",
            TextEncoding::ShiftJis => "shift-jis",
            TextEncoding::Gbk => "gbk",
            TextEncoding::Big5 => "big5",
        }
    }

    /// Parses a label such as `utf-8` or `Shift_JIS`.
    pub fn from_label(label: &str) -> Option<Self> {
        let encoding = RsEncoding::for_label(label.trim().as_bytes())?;
        map_rs_encoding(encoding)
    }

    fn to_rs(self) -> &'static RsEncoding {
        match self {
            TextEncoding::Utf8 => UTF_8,
            TextEncoding::Windows1252 => WINDOWS_1252,
            TextEncoding::ShiftJis => SHIFT_JIS,
            TextEncoding::Gbk => GBK,
            TextEncoding::Big5 => BIG5,
        }
    }
}

/// 檔案讀寫錯誤。 / Errors raised while loading or writing node files.
#[derive(Debug, Error)]
pub enum TextIoError {
    #[error("No such file or directory: '{}'", .0.display())]
    NotFound(PathBuf),
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("{} is not valid text in any supported encoding", .0.display())]
    InvalidEncoding(PathBuf),
    #[error("text cannot be represented in target encoding {encoding}: {}", path.display())]
    Unrepresentable {
        path: PathBuf,
        encoding: &'static str,
    },
}

/// Reads a text file, normalising line endings to `\n`.
/// 讀取文字檔並將行尾正規化為 `\n`。
///
/// A UTF-8 BOM is stripped. Non-UTF-8 payloads are decoded with `fallback`
/// when given, otherwise with the encoding guessed by `chardetng`.
pub fn read_text(path: &Path, fallback: Option<TextEncoding>) -> Result<String, TextIoError> {
    let bytes = fs::read(path).map_err(|source| match source.kind() {
        ErrorKind::NotFound => TextIoError::NotFound(path.to_path_buf()),
        _ => TextIoError::Io {
            path: path.to_path_buf(),
            source,
        },
    })?;
    let text = decode_bytes(&bytes, fallback)
        .ok_or_else(|| TextIoError::InvalidEncoding(path.to_path_buf()))?;
    Ok(normalize_newlines(&text))
}

/// Writes `text` in `encoding`, creating missing parent directories.
/// 以指定編碼寫入文字，必要時建立上層資料夾。
///
/// Returns `true` when a directory had to be created. Nothing is written when
/// the text is unrepresentable in the target encoding.
pub fn write_text(path: &Path, text: &str, encoding: TextEncoding) -> Result<bool, TextIoError> {
    let bytes = encode_text(text, encoding).ok_or(TextIoError::Unrepresentable {
        path: path.to_path_buf(),
        encoding: encoding.name(),
    })?;
    let io_err = |source| TextIoError::Io {
        path: path.to_path_buf(),
        source,
    };
    let mut created = false;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        if !parent.exists() {
            fs::create_dir_all(parent).map_err(io_err)?;
            created = true;
        }
    }
    fs::write(path, bytes.as_ref()).map_err(io_err)?;
    Ok(created)
}

/// Appends `\n` unless the text already ends with exactly one; extra trailing
/// newlines are collapsed. Empty text stays empty.
pub fn ensure_trailing_newline(text: &str) -> String {
    let body = text.trim_end_matches('\n');
    if body.is_empty() && text.is_empty() {
        return String::new();
    }
    let mut out = String::with_capacity(body.len() + 1);
    out.push_str(body);
    out.push('\n');
    out
}

fn encode_text(text: &str, encoding: TextEncoding) -> Option<Cow<'_, [u8]>> {
    if encoding == TextEncoding::Utf8 {
        return Some(Cow::Borrowed(text.as_bytes()));
    }
    let (cow, _, had_errors) = encoding.to_rs().encode(text);
    if had_errors {
        return None;
    }
    Some(cow)
}

fn decode_bytes(bytes: &[u8], fallback: Option<TextEncoding>) -> Option<String> {
    if let Some(rest) = bytes.strip_prefix(b"\xEF\xBB\xBF") {
        return std::str::from_utf8(rest).ok().map(str::to_owned);
    }
    if let Ok(text) = std::str::from_utf8(bytes) {
        return Some(text.to_owned());
    }
    let encoding = fallback
        .filter(|encoding| *encoding != TextEncoding::Utf8)
        .or_else(|| detect_legacy_encoding(bytes))?;
    let (cow, had_errors) = encoding.to_rs().decode_without_bom_handling(bytes);
    if had_errors {
        return None;
    }
    Some(cow.into_owned())
}

fn detect_legacy_encoding(bytes: &[u8]) -> Option<TextEncoding> {
    if bytes.is_empty() {
        return None;
    }
    let mut detector = EncodingDetector::new();
    detector.feed(bytes, true);
    map_rs_encoding(detector.guess(None, true))
}

fn map_rs_encoding(encoding: &'static RsEncoding) -> Option<TextEncoding> {
    if encoding == UTF_8 {
        Some(TextEncoding::Utf8)
    } else if encoding == WINDOWS_1252 {
        Some(TextEncoding::Windows1252)
    } else if encoding == SHIFT_JIS {
        Some(TextEncoding::ShiftJis)
    } else if encoding == GBK {
        Some(TextEncoding::Gbk)
    } else if encoding == BIG5 {
        Some(TextEncoding::Big5)
    } else {
        None
    }
}

fn normalize_newlines(input: &str) -> String {
    // CRLF and lone CR both become LF.
    let mut result = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();
    while let Some(ch) = chars.next() {
        match ch {
            '\r' => {
                if matches!(chars.peek(), Some('\n')) {
                    chars.next();
                }
                result.push('\n');
            }
            _ => result.push(ch),
        }
    }
    result
}
