pub mod events;
pub mod file_monitor;
pub mod paths;
pub mod store;
pub mod text_io;
pub mod tree;

pub use events::{EventLog, EventSink, LogSink, OutlineEvent, SharedSink};
pub use file_monitor::{FileChangeKind, FileEvent, FileKeeper, FileKeeperError, DEFAULT_POLL_INTERVAL};
pub use paths::{file_suffix, FileKind, PROJECT_SUFFIX};
pub use store::{Code, ContentStore, StoreError};
pub use text_io::{ensure_trailing_newline, read_text, write_text, TextEncoding, TextIoError};
pub use tree::{NodeId, OutlineNode, OutlineTree, TreeError, MACRO_PREFIX};
