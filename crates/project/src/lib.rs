//! Outline projects on top of `kmol_core`: heading parser, serializer, container codec,
//! loading and project-wide search.
//! 建立在 `kmol_core` 之上的大綱專案：標題解析、序列化、容器編解碼、載入與專案搜尋。

mod serde_path;
mod util;

pub mod container;
pub mod find;
pub mod load;
pub mod markdown;
pub mod outline;
pub mod tangle;

pub use container::{
    read_container, write_container, ContainerError, ContainerFile, NodeRecord, CONTAINER_VERSION,
};
pub use find::{find_in_project, replace_in_project, FindError, FindMatch, FindMode, FindQuery};
pub use load::LoadError;
pub use markdown::{parse_markdown, scan_headings, Heading, ParserOptions, SetextPolicy};
pub use outline::{Outline, OutlineOptions};
pub use tangle::{
    render, save_root, tangle, ChildSeparator, SaveReport, TangleOptions, Tangled, WriteFailure,
};
