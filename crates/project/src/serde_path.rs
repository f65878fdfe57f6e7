//! Serde helpers for node paths stored in containers.
//!
//! UTF-8 paths are written as plain strings; anything else is written as
//! `b64:` followed by the raw OS bytes in base64.

use std::borrow::Cow;
use std::path::{Path, PathBuf};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Deserializer, Serializer};

const B64_PREFIX: &str = "b64:";

/// `#[serde(with = "serde_path::option")]` for `Option<PathBuf>` fields.
pub mod option {
    use super::*;

    pub fn serialize<S>(value: &Option<PathBuf>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(path) => serializer.serialize_some(&encode(path)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<PathBuf>, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Option::<String>::deserialize(deserializer)? {
            Some(text) if text.is_empty() => Ok(None),
            Some(text) => decode(&text).map(Some).map_err(serde::de::Error::custom),
            None => Ok(None),
        }
    }
}

/// 路徑轉為字串。 / Encodes a path as a container string.
pub fn encode(path: &Path) -> String {
    match path.to_str() {
        Some(text) => text.to_string(),
        None => format!("{B64_PREFIX}{}", BASE64.encode(path_to_bytes(path))),
    }
}

/// 字串還原為路徑。 / Decodes a string produced by [`encode`].
pub fn decode(text: &str) -> Result<PathBuf, String> {
    let Some(rest) = text.strip_prefix(B64_PREFIX) else {
        return Ok(PathBuf::from(text));
    };
    let bytes = BASE64
        .decode(rest.as_bytes())
        .map_err(|err| format!("invalid base64 path payload: {err}"))?;
    bytes_to_path(bytes)
}

fn path_to_bytes(path: &Path) -> Cow<'_, [u8]> {
    #[cfg(unix)]
    {
        use std::os::unix::ffi::OsStrExt;
        Cow::Borrowed(path.as_os_str().as_bytes())
    }

    #[cfg(not(unix))]
    {
        Cow::Owned(path.to_string_lossy().into_owned().into_bytes())
    }
}

fn bytes_to_path(bytes: Vec<u8>) -> Result<PathBuf, String> {
    #[cfg(unix)]
    {
        use std::ffi::OsString;
        use std::os::unix::ffi::OsStringExt;
        Ok(PathBuf::from(OsString::from_vec(bytes)))
    }

    #[cfg(not(unix))]
    {
        String::from_utf8(bytes)
            .map(PathBuf::from)
            .map_err(|err| format!("invalid path payload: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn utf8_paths_stay_readable() {
        assert_eq!(encode(Path::new("docs/readme.md")), "docs/readme.md");
        assert_eq!(
            decode("docs/readme.md").unwrap(),
            PathBuf::from("docs/readme.md")
        );
    }

    #[cfg(unix)]
    #[test]
    fn non_utf8_paths_use_base64() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;
        let path = Path::new(OsStr::from_bytes(b"bad\xffname.md"));
        let encoded = encode(path);
        assert!(encoded.starts_with(B64_PREFIX));
        assert_eq!(decode(&encoded).unwrap(), path);
    }

    #[test]
    fn broken_payload_is_rejected() {
        assert!(decode("b64:!!!").is_err());
    }
}
