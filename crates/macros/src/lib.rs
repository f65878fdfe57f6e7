//! Macro script execution for outline nodes.
//! （為大綱節點執行巨集腳本。）
//!
//! A script is captured on the control thread as a [`ScriptSnapshot`]: the
//! script text plus the project variables (root name, root file and directory,
//! node file and directory). The snapshot is then handed to a worker thread by
//! [`ScriptRunner`], so the tree and the content store are never shared.
//! 腳本在控制執行緒上擷取為快照，再交給工作執行緒執行，
//! 大綱樹與內容儲存區不會跨執行緒共用。

use std::env;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use kmol_core::{ContentStore, NodeId, OutlineTree};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that may surface while capturing or executing a script.
/// （擷取或執行腳本時可能發生的錯誤。）
#[derive(Debug, Error)]
pub enum ScriptError {
    #[error("macro not found: {0}")]
    UnknownMacro(String),
    #[error("node {0} not found")]
    UnknownNode(NodeId),
    #[error("failed to spawn interpreter `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("interpreter stdin not available")]
    StdinUnavailable,
    #[error("failed to write script to interpreter: {0}")]
    Stdin(std::io::Error),
    #[error("failed to read interpreter output: {0}")]
    Output(std::io::Error),
    #[error("failed to poll interpreter status: {0}")]
    Poll(std::io::Error),
    #[error("failed to terminate interpreter: {0}")]
    Kill(std::io::Error),
    #[error("failed to start worker thread: {0}")]
    Worker(std::io::Error),
    #[error("script worker panicked")]
    WorkerPanicked,
}

/// Where the script text comes from.
/// （腳本內容的來源。）
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ScriptSource {
    /// A macro bound through an `@name` node.
    Macro(String),
    /// Text typed by the user, e.g. the current editor contents.
    Inline(String),
}

/// Project variables exposed to a script.
/// （提供給腳本的專案變數。）
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptVariables {
    pub root: Option<String>,
    pub root_file: Option<PathBuf>,
    pub root_path: Option<PathBuf>,
    pub node_file: Option<PathBuf>,
    pub node_path: Option<PathBuf>,
}

impl ScriptVariables {
    /// Collects the variables for `node`, resolved to absolute paths.
    /// （依節點收集變數，路徑轉為絕對路徑。）
    pub fn for_node(tree: &OutlineTree, node: NodeId) -> Result<Self, ScriptError> {
        let root = tree.root_of(node).map_err(|_| ScriptError::UnknownNode(node))?;
        let root_node = tree.node(root).ok_or(ScriptError::UnknownNode(root))?;
        let root_file = root_node.path.as_deref().map(absolutize);
        let node_file = tree.resolved_path(node).as_deref().map(absolutize);
        Ok(Self {
            root: Some(root_node.name.clone()),
            root_path: root_file.as_deref().and_then(parent_dir),
            root_file,
            node_path: node_file.as_deref().and_then(parent_dir),
            node_file,
        })
    }

    /// Environment variables handed to interpreter processes (`KMOL_*`).
    pub fn env_pairs(&self) -> Vec<(&'static str, String)> {
        let paths = [
            ("KMOL_ROOT_FILE", &self.root_file),
            ("KMOL_ROOT_PATH", &self.root_path),
            ("KMOL_NODE_FILE", &self.node_file),
            ("KMOL_NODE_PATH", &self.node_path),
        ];
        let mut pairs: Vec<(&'static str, String)> = self
            .root
            .iter()
            .map(|root| ("KMOL_ROOT", root.clone()))
            .collect();
        for (key, value) in paths {
            if let Some(path) = value {
                pairs.push((key, path.display().to_string()));
            }
        }
        pairs
    }
}

fn absolutize(path: &Path) -> PathBuf {
    if path.is_absolute() {
        return path.to_path_buf();
    }
    env::current_dir()
        .map(|cwd| cwd.join(path))
        .unwrap_or_else(|_| path.to_path_buf())
}

fn parent_dir(path: &Path) -> Option<PathBuf> {
    path.parent().map(Path::to_path_buf)
}

/// Resolves the `chdir` helper: a directory is used as is, a file yields its
/// parent directory, anything else yields `None`.
/// （目錄直接使用，檔案取其所在目錄，其餘回傳 `None`。）
pub fn chdir_target(path: &Path) -> Option<PathBuf> {
    if path.is_dir() {
        Some(path.to_path_buf())
    } else if path.is_file() {
        parent_dir(&absolutize(path))
    } else {
        None
    }
}

/// Everything a worker needs to run one script.
/// （工作執行緒執行腳本所需的一切資料。）
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScriptSnapshot {
    /// Macro name, or `inline` for editor text.
    pub name: String,
    pub script: String,
    pub variables: ScriptVariables,
}

impl ScriptSnapshot {
    /// Copies the script text and the variables of `node`, if one is selected.
    /// （複製腳本內容與目前節點的變數。）
    pub fn capture(
        tree: &OutlineTree,
        store: &ContentStore,
        node: Option<NodeId>,
        source: ScriptSource,
    ) -> Result<Self, ScriptError> {
        let (name, script) = match source {
            ScriptSource::Macro(name) => {
                let code = store
                    .macro_code(&name)
                    .ok_or_else(|| ScriptError::UnknownMacro(name.clone()))?;
                let script = store.get(code).to_string();
                (name, script)
            }
            ScriptSource::Inline(text) => ("inline".to_string(), text),
        };
        let variables = match node {
            Some(node) => ScriptVariables::for_node(tree, node)?,
            None => ScriptVariables::default(),
        };
        Ok(Self {
            name,
            script,
            variables,
        })
    }
}

/// Result information produced by a script execution.
/// （腳本執行完成後的結果資訊。）
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptOutput {
    pub exit_code: Option<i32>,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub duration_ms: u128,
    pub timed_out: bool,
}

impl ScriptOutput {
    /// （判斷腳本是否以 0 結束且未逾時。）
    pub fn success(&self) -> bool {
        !self.timed_out && matches!(self.exit_code, Some(0))
    }

    pub fn stdout_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    pub fn stderr_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stderr).into_owned()
    }
}

/// Runs a captured script. Implementations must be shareable across worker threads.
/// （執行已擷取的腳本；實作需可跨執行緒共用。）
pub trait ScriptExecutor: Send + Sync {
    fn execute(&self, snapshot: &ScriptSnapshot) -> Result<ScriptOutput, ScriptError>;
}

/// Pipes the script into an interpreter process.
/// （把腳本透過標準輸入送進直譯器程序。）
///
/// The variables are exported as `KMOL_*` environment variables. Without an
/// explicit working directory the process starts in the root's directory.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandExecutor {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub working_dir: Option<PathBuf>,
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

impl Default for CommandExecutor {
    fn default() -> Self {
        Self::new("python3").with_args(["-"])
    }
}

impl CommandExecutor {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            working_dir: None,
            timeout_ms: None,
        }
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn with_working_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(path.into());
        self
    }

    /// （設定逾時；逾時後強制終止程序。）
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        let millis = timeout.as_millis().clamp(1, u128::from(u64::MAX)) as u64;
        self.timeout_ms = Some(millis);
        self
    }

    fn working_dir_for(&self, snapshot: &ScriptSnapshot) -> Option<PathBuf> {
        self.working_dir.clone().or_else(|| {
            snapshot
                .variables
                .root_file
                .as_deref()
                .and_then(chdir_target)
        })
    }
}

impl ScriptExecutor for CommandExecutor {
    fn execute(&self, snapshot: &ScriptSnapshot) -> Result<ScriptOutput, ScriptError> {
        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        for (key, value) in snapshot.variables.env_pairs() {
            command.env(key, value);
        }
        if let Some(dir) = self.working_dir_for(snapshot) {
            command.current_dir(dir);
        }

        let start = Instant::now();
        let mut child = command.spawn().map_err(|source| ScriptError::Spawn {
            program: self.program.clone(),
            source,
        })?;
        {
            let mut stdin = child.stdin.take().ok_or(ScriptError::StdinUnavailable)?;
            stdin
                .write_all(snapshot.script.as_bytes())
                .map_err(ScriptError::Stdin)?;
            stdin.flush().map_err(ScriptError::Stdin)?;
        }

        let mut timed_out = false;
        let output = match self.timeout_ms.map(Duration::from_millis) {
            Some(timeout) => loop {
                if child.try_wait().map_err(ScriptError::Poll)?.is_some() {
                    break child.wait_with_output().map_err(ScriptError::Output)?;
                }
                if start.elapsed() >= timeout {
                    child.kill().map_err(ScriptError::Kill)?;
                    timed_out = true;
                    break child.wait_with_output().map_err(ScriptError::Output)?;
                }
                thread::sleep(Duration::from_millis(15));
            },
            None => child.wait_with_output().map_err(ScriptError::Output)?,
        };

        Ok(ScriptOutput {
            exit_code: output.status.code(),
            stdout: output.stdout,
            stderr: output.stderr,
            duration_ms: start.elapsed().as_millis(),
            timed_out,
        })
    }
}

/// Starts scripts on worker threads.
/// （在工作執行緒上啟動腳本。）
#[derive(Clone)]
pub struct ScriptRunner {
    executor: Arc<dyn ScriptExecutor>,
}

impl ScriptRunner {
    pub fn new(executor: impl ScriptExecutor + 'static) -> Self {
        Self {
            executor: Arc::new(executor),
        }
    }

    /// Runs the snapshot on a new named thread; the caller keeps control.
    pub fn spawn(&self, snapshot: ScriptSnapshot) -> Result<ScriptHandle, ScriptError> {
        let executor = Arc::clone(&self.executor);
        let name = snapshot.name.clone();
        let handle = thread::Builder::new()
            .name(format!("kmol-macro-{name}"))
            .spawn(move || {
                info!("event=script_started module=macros name={}", snapshot.name);
                let result = executor.execute(&snapshot);
                match &result {
                    Ok(output) => info!(
                        "event=script_finished module=macros name={} exit_code={:?} timed_out={}",
                        snapshot.name, output.exit_code, output.timed_out
                    ),
                    Err(err) => warn!(
                        "event=script_failed module=macros name={} error={err}",
                        snapshot.name
                    ),
                }
                result
            })
            .map_err(ScriptError::Worker)?;
        Ok(ScriptHandle { name, handle })
    }
}

/// Handle of a running script.
pub struct ScriptHandle {
    name: String,
    handle: JoinHandle<Result<ScriptOutput, ScriptError>>,
}

impl ScriptHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Waits for the worker and returns its result.
    pub fn join(self) -> Result<ScriptOutput, ScriptError> {
        self.handle
            .join()
            .map_err(|_| ScriptError::WorkerPanicked)?
    }
}
