use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver};
use std::time::Duration;

use notify::event::{EventKind, ModifyKind};
use notify::{Config, PollWatcher, RecursiveMode, Watcher};
use thiserror::Error;

use crate::events::{OutlineEvent, SharedSink};

/// Default interval between two modification-time polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(1000);

/// 檔案守護者可能回傳的錯誤。 / Errors raised by the [`FileKeeper`].
#[derive(Debug, Error)]
pub enum FileKeeperError {
    #[error("notify error: {0}")]
    Notify(#[from] notify::Error),
    #[error("keeper channel disconnected")]
    ChannelDisconnected,
}

/// 偵測到的變更種類。 / Classifies observed changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileChangeKind {
    Modified,
    Created,
    Removed,
    Other,
}

/// 一筆檔案變更。 / A change seen on a watched file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEvent {
    pub path: PathBuf,
    pub kind: FileChangeKind,
}

/// Polls node files for modification-time changes so open nodes can be reloaded.
/// 以輪詢修改時間的方式監看節點檔案，供重新載入使用。
pub struct FileKeeper {
    watcher: PollWatcher,
    rx: Receiver<FileEvent>,
    watched: Vec<PathBuf>,
}

impl FileKeeper {
    pub fn new(interval: Duration) -> Result<Self, FileKeeperError> {
        Self::with_sink(interval, None)
    }

    /// 建立會同時把變更轉送到 `sink` 的守護者。 / Also forwards every change to `sink`.
    pub fn with_sink(
        interval: Duration,
        sink: Option<SharedSink>,
    ) -> Result<Self, FileKeeperError> {
        let (tx, rx) = mpsc::channel();
        let watcher = PollWatcher::new(
            move |res: notify::Result<notify::Event>| {
                let Ok(event) = res else {
                    return;
                };
                let Some(mapped) = map_event(event) else {
                    return;
                };
                if let Some(sink) = &sink {
                    sink.emit(&OutlineEvent::FileChanged {
                        path: mapped.path.clone(),
                    });
                }
                let _ = tx.send(mapped);
            },
            Config::default().with_poll_interval(interval),
        )?;
        Ok(Self {
            watcher,
            rx,
            watched: Vec::new(),
        })
    }

    /// 開始監看檔案。 / Starts watching one file.
    pub fn watch(&mut self, path: impl AsRef<Path>) -> Result<(), FileKeeperError> {
        let path = path.as_ref();
        if self.watched.iter().any(|known| known == path) {
            return Ok(());
        }
        self.watcher.watch(path, RecursiveMode::NonRecursive)?;
        self.watched.push(path.to_path_buf());
        Ok(())
    }

    pub fn unwatch(&mut self, path: impl AsRef<Path>) -> Result<(), FileKeeperError> {
        let path = path.as_ref();
        self.watched.retain(|known| known != path);
        self.watcher.unwatch(path)?;
        Ok(())
    }

    pub fn watched(&self) -> &[PathBuf] {
        &self.watched
    }

    /// 非阻塞地取得下一個事件。 / Fetches the next event without blocking.
    pub fn try_next(&self) -> Option<FileEvent> {
        self.rx.try_recv().ok()
    }

    /// 在期限內等待事件，逾時回傳 `None`。 / Waits up to `timeout`, `None` on timeout.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<Option<FileEvent>, FileKeeperError> {
        match self.rx.recv_timeout(timeout) {
            Ok(event) => Ok(Some(event)),
            Err(mpsc::RecvTimeoutError::Timeout) => Ok(None),
            Err(mpsc::RecvTimeoutError::Disconnected) => Err(FileKeeperError::ChannelDisconnected),
        }
    }
}

fn map_event(event: notify::Event) -> Option<FileEvent> {
    let path = event.paths.into_iter().next()?;
    let kind = match event.kind {
        EventKind::Modify(ModifyKind::Name(_)) => FileChangeKind::Other,
        EventKind::Modify(_) => FileChangeKind::Modified,
        EventKind::Create(_) => FileChangeKind::Created,
        EventKind::Remove(_) => FileChangeKind::Removed,
        EventKind::Access(_) => return None,
        _ => FileChangeKind::Other,
    };
    Some(FileEvent { path, kind })
}
