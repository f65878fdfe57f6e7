use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use log::{info, warn};

use crate::store::Code;

/// 引擎對外發出的結構化事件。 / Structured notifications emitted by the outline engine.
///
/// The presentation layer subscribes through an [`EventSink`] instead of
/// scraping console output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutlineEvent {
    /// A fragment went from saved to unsaved.
    FragmentDirty { code: Code },
    /// A node was (re)loaded from disk.
    Loaded { path: PathBuf },
    /// A file or container was written.
    Saved { path: PathBuf },
    /// A missing directory was created before a write.
    FolderCreated { path: PathBuf },
    /// A node path with an unrecognized suffix was ignored on save.
    Skipped { path: PathBuf },
    /// A write failed; siblings continue.
    WriteFailed { path: PathBuf, message: String },
    /// The file keeper observed a change on disk.
    FileChanged { path: PathBuf },
}

/// 事件接收端。 / Receiver for [`OutlineEvent`]s.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: &OutlineEvent);
}

impl<F> EventSink for F
where
    F: Fn(&OutlineEvent) + Send + Sync,
{
    fn emit(&self, event: &OutlineEvent) {
        self(event)
    }
}

/// Shared handle used by the store, serializer and loader.
pub type SharedSink = Arc<dyn EventSink>;

/// 將事件轉寫到 `log`。 / Forwards every event to the `log` facade.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl EventSink for LogSink {
    fn emit(&self, event: &OutlineEvent) {
        match event {
            OutlineEvent::FragmentDirty { code } => {
                log::debug!("event=fragment_dirty module=store code={code}")
            }
            OutlineEvent::Loaded { path } => {
                info!("event=loaded module=load path={}", path.display())
            }
            OutlineEvent::Saved { path } => {
                info!("event=saved module=tangle path={}", path.display())
            }
            OutlineEvent::FolderCreated { path } => {
                info!("event=folder_created module=tangle path={}", path.display())
            }
            OutlineEvent::Skipped { path } => {
                warn!("event=ignored_file module=tangle path={}", path.display())
            }
            OutlineEvent::WriteFailed { path, message } => warn!(
                "event=write_failed module=tangle path={} error={message}",
                path.display()
            ),
            OutlineEvent::FileChanged { path } => {
                info!("event=file_changed module=keeper path={}", path.display())
            }
        }
    }
}

/// 收集事件供測試或 UI 批次讀取。 / Buffers events so callers can drain them later.
#[derive(Debug, Default)]
pub struct EventLog {
    events: Mutex<Vec<OutlineEvent>>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Removes and returns every buffered event.
    pub fn drain(&self) -> Vec<OutlineEvent> {
        match self.events.lock() {
            Ok(mut guard) => std::mem::take(&mut *guard),
            Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
        }
    }
}

impl EventSink for EventLog {
    fn emit(&self, event: &OutlineEvent) {
        match self.events.lock() {
            Ok(mut guard) => guard.push(event.clone()),
            Err(poisoned) => poisoned.into_inner().push(event.clone()),
        }
    }
}
