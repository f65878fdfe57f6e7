use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::{anyhow, bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use flexi_logger::{Cleanup, Criterion, FileSpec, Logger, LoggerHandle, Naming, WriteMode};
use kmol_core::{FileChangeKind, FileKeeper, FileKind, NodeId, TextEncoding, PROJECT_SUFFIX};
use kmol_macros::{CommandExecutor, ScriptRunner, ScriptSnapshot, ScriptSource};
use kmol_project::{
    ChildSeparator, FindMode, FindQuery, Outline, OutlineOptions, SaveReport, SetextPolicy,
};
use kmol_settings::{Preferences, PreferencesStore};
use log::{debug, info, warn};

const LOG_FILE_BASENAME: &str = "kmol";
const MAX_LOG_FILE_SIZE_BYTES: u64 = 1024 * 1024;
const MAX_LOG_FILES: usize = 5;

#[derive(Parser)]
#[command(
    name = "kmol",
    about = "Outline tools for Kmol projects and Markdown documents",
    author,
    version
)]
struct Cli {
    /// 偏好設定檔；略過時使用預設值且不記錄最近專案。 / Preferences file; defaults are used and nothing is recorded when omitted.
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// 記錄層級，例如 `warn` 或 `kmol_project=debug`。 / Log level spec, e.g. `warn` or `kmol_project=debug`.
    #[arg(long, global = true, value_name = "LEVEL", default_value = "warn")]
    log_level: String,

    /// 將記錄寫入此資料夾而非標準錯誤。 / Write rotating log files to this directory instead of stderr.
    #[arg(long, global = true, value_name = "DIR")]
    log_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 顯示檔案的大綱結構。 / Print the outline of a file or project.
    Tree(TreeArgs),
    /// 展開大綱並輸出或寫回檔案。 / Expand an outline to stdout, or write it back.
    Tangle(TangleArgs),
    /// 將檔案打包為專案檔。 / Collect files into a new project container.
    Pack(PackArgs),
    /// 重新寫出專案描述的所有檔案。 / Rewrite every file a project describes.
    Unpack(UnpackArgs),
    /// 列出專案中的巨集。 / List the macros bound in a project.
    Macros(MacrosArgs),
    /// 在專案中搜尋與選用的取代。 / Find (and optionally replace) across a project.
    Find(FindArgs),
    /// 執行巨集或一段腳本。 / Run a macro or an inline script.
    Run(RunArgs),
    /// 監看專案檔案並於變更時重新載入。 / Watch project files and reload them on change.
    Watch(WatchArgs),
    /// 列出最近開啟的專案。 / List recently opened projects.
    Recent(RecentArgs),
}

#[derive(Args, Default)]
struct LayoutArgs {
    /// 同層段落之間的分隔方式。 / Separator placed between sibling sections.
    #[arg(long, value_name = "SEPARATOR")]
    separator: Option<SeparatorChoice>,

    /// 讀寫檔案使用的編碼。 / Encoding used to write files and to decode non UTF-8 input.
    #[arg(long, value_name = "ENCODING")]
    encoding: Option<EncodingChoice>,

    /// Setext 標題的處理方式。 / How setext (underlined) headings are recognised.
    #[arg(long, value_name = "POLICY")]
    setext: Option<SetextChoice>,
}

#[derive(Args)]
struct TreeArgs {
    /// 要開啟的檔案。 / File or project to open.
    #[arg(value_name = "FILE")]
    input: PathBuf,

    /// 顯示片段代碼（別名共用代碼）。 / Show fragment codes; aliased nodes share one.
    #[arg(long)]
    codes: bool,

    #[command(flatten)]
    layout: LayoutArgs,
}

#[derive(Args)]
struct TangleArgs {
    #[arg(value_name = "FILE")]
    input: PathBuf,

    /// 只展開此節點（名稱或 `A->B` 路徑）。 / Only expand this node, by name or `A->B` breadcrumb.
    #[arg(long, value_name = "NODE")]
    node: Option<String>,

    /// 寫回檔案而非輸出到標準輸出。 / Write the files back instead of printing.
    #[arg(long, conflicts_with = "node")]
    write: bool,

    #[command(flatten)]
    layout: LayoutArgs,
}

#[derive(Args)]
struct PackArgs {
    /// 輸出的專案檔（.kmol）。 / Project container to create.
    #[arg(value_name = "OUTPUT")]
    output: PathBuf,

    /// 要加入專案的檔案。 / Files to add to the project.
    #[arg(value_name = "FILE", required = true)]
    inputs: Vec<PathBuf>,

    /// 專案根節點的說明文字。 / Text stored in the project's root node.
    #[arg(long, value_name = "TEXT")]
    note: Option<String>,

    /// 覆寫已存在的專案檔。 / Overwrite an existing container.
    #[arg(long)]
    force: bool,

    #[command(flatten)]
    layout: LayoutArgs,
}

#[derive(Args)]
struct UnpackArgs {
    #[arg(value_name = "PROJECT")]
    input: PathBuf,

    #[command(flatten)]
    layout: LayoutArgs,
}

#[derive(Args)]
struct MacrosArgs {
    #[arg(value_name = "FILE")]
    input: PathBuf,
}

#[derive(Args)]
struct FindArgs {
    #[arg(value_name = "FILE")]
    input: PathBuf,

    /// 要搜尋的文字或正規表示式。 / Text or regular expression to look for.
    pattern: String,

    /// 將樣式視為正規表示式。 / Treat the pattern as a regular expression.
    #[arg(long)]
    regex: bool,

    /// 區分大小寫。 / Match case exactly.
    #[arg(long)]
    case_sensitive: bool,

    /// 僅比對完整單字。 / Only match whole words.
    #[arg(long)]
    whole_word: bool,

    /// 取代文字。 / Replacement text.
    #[arg(long, value_name = "TEXT")]
    replace: Option<String>,

    /// 套用取代並寫回檔案；否則僅預覽。 / Apply the replacement and save; otherwise only preview.
    #[arg(long, requires = "replace")]
    apply: bool,

    #[command(flatten)]
    layout: LayoutArgs,
}

#[derive(Args)]
struct RunArgs {
    #[arg(value_name = "FILE")]
    input: PathBuf,

    /// 巨集名稱（可省略 `@`）。 / Macro name, with or without the leading `@`.
    #[arg(value_name = "MACRO", required_unless_present = "inline")]
    name: Option<String>,

    /// 直接執行的腳本內容。 / Script text to run instead of a macro.
    #[arg(long, value_name = "SCRIPT", conflicts_with = "name")]
    inline: Option<String>,

    /// 提供變數的節點；預設為根節點。 / Node whose variables are exported; defaults to the root.
    #[arg(long, value_name = "NODE")]
    node: Option<String>,

    /// 直譯器程式。 / Interpreter program.
    #[arg(long, value_name = "PROGRAM")]
    interpreter: Option<String>,

    /// 直譯器參數，可重複。 / Interpreter argument; repeatable.
    #[arg(long = "arg", value_name = "ARG", allow_hyphen_values = true)]
    args: Vec<String>,

    /// 逾時秒數。 / Timeout in seconds.
    #[arg(long, value_name = "SECS")]
    timeout: Option<u64>,
}

#[derive(Args)]
struct WatchArgs {
    #[arg(value_name = "FILE")]
    input: PathBuf,

    /// 處理第一個變更後結束。 / Exit after the first change.
    #[arg(long)]
    once: bool,

    /// 最長監看秒數。 / Stop watching after this many seconds.
    #[arg(long, value_name = "SECS")]
    timeout: Option<u64>,

    #[command(flatten)]
    layout: LayoutArgs,
}

#[derive(Args)]
struct RecentArgs {
    /// 移除已不存在的專案。 / Drop entries whose file no longer exists.
    #[arg(long)]
    prune: bool,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum SeparatorChoice {
    #[value(name = "blank-line", aliases = ["blank", "blankline"])]
    BlankLine,
    #[value(alias = "line")]
    Newline,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum EncodingChoice {
    #[value(alias = "utf-8")]
    Utf8,
    #[value(name = "windows-1252", aliases = ["cp1252", "windows1252", "latin1"])]
    Windows1252,
    #[value(name = "shift-jis", aliases = ["shiftjis", "sjis"])]
    ShiftJis,
    #[value(name = "gbk", aliases = ["gb2312"])]
    Gbk,
    #[value(name = "big5")]
    Big5,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum SetextChoice {
    #[value(name = "unindented", alias = "strict")]
    RequireUnindented,
    #[value(name = "indented", alias = "loose")]
    AllowIndented,
    #[value(alias = "off")]
    Disabled,
}

impl From<SeparatorChoice> for ChildSeparator {
    fn from(choice: SeparatorChoice) -> Self {
        match choice {
            SeparatorChoice::BlankLine => ChildSeparator::BlankLine,
            SeparatorChoice::Newline => ChildSeparator::Newline,
        }
    }
}

impl From<EncodingChoice> for TextEncoding {
    fn from(choice: EncodingChoice) -> Self {
        match choice {
            EncodingChoice::Utf8 => TextEncoding::Utf8,
            EncodingChoice::Windows1252 => TextEncoding::Windows1252,
            EncodingChoice::ShiftJis => TextEncoding::ShiftJis,
            EncodingChoice::Gbk => TextEncoding::Gbk,
            EncodingChoice::Big5 => TextEncoding::Big5,
        }
    }
}

impl From<SetextChoice> for SetextPolicy {
    fn from(choice: SetextChoice) -> Self {
        match choice {
            SetextChoice::RequireUnindented => SetextPolicy::RequireUnindented,
            SetextChoice::AllowIndented => SetextPolicy::AllowIndented,
            SetextChoice::Disabled => SetextPolicy::Disabled,
        }
    }
}

impl LayoutArgs {
    fn apply(&self, mut options: OutlineOptions) -> OutlineOptions {
        if let Some(separator) = self.separator {
            options.tangle.separator = separator.into();
        }
        if let Some(encoding) = self.encoding {
            options.tangle.encoding = encoding.into();
            options.read_encoding = Some(encoding.into());
        }
        if let Some(setext) = self.setext {
            options.parser.setext = setext.into();
        }
        options
    }
}

/// 命令執行期間的偏好設定。 / Preferences for one invocation.
struct Session {
    store: Option<PreferencesStore>,
    defaults: Preferences,
}

impl Session {
    fn load(config: Option<&Path>) -> Result<Self> {
        let store = match config {
            Some(path) => {
                let path = resolve_input_path(path)?;
                let store = PreferencesStore::load(&path)
                    .with_context(|| format!("failed to load preferences {}", path.display()))?;
                Some(store)
            }
            None => None,
        };
        Ok(Self {
            store,
            defaults: Preferences::default(),
        })
    }

    fn preferences(&self) -> &Preferences {
        self.store
            .as_ref()
            .map(PreferencesStore::preferences)
            .unwrap_or(&self.defaults)
    }

    fn outline(&self, layout: &LayoutArgs) -> Outline {
        Outline::new(layout.apply(self.preferences().outline_options()))
    }

    /// Records `path` in the recent list when a preferences file is in use.
    fn remember(&mut self, path: &Path) -> Result<()> {
        let Some(store) = self.store.as_mut() else {
            return Ok(());
        };
        store
            .update(|prefs| prefs.recent.add(path))
            .with_context(|| format!("failed to save preferences {}", store.path().display()))
    }
}

fn main() {
    if let Err(err) = run() {
        eprintln!("Error: {err}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let Cli {
        config,
        log_level,
        log_dir,
        command,
    } = Cli::parse();
    let _logger = init_logging(&log_level, log_dir.as_deref())?;
    let mut session = Session::load(config.as_deref())?;
    match command {
        Commands::Tree(args) => execute_tree(&mut session, args),
        Commands::Tangle(args) => execute_tangle(&mut session, args),
        Commands::Pack(args) => execute_pack(&mut session, args),
        Commands::Unpack(args) => execute_unpack(&mut session, args),
        Commands::Macros(args) => execute_macros(&mut session, args),
        Commands::Find(args) => execute_find(&mut session, args),
        Commands::Run(args) => execute_run(&mut session, args),
        Commands::Watch(args) => execute_watch(&mut session, args),
        Commands::Recent(args) => execute_recent(&mut session, args),
    }
}

fn init_logging(level: &str, log_dir: Option<&Path>) -> Result<LoggerHandle> {
    let logger =
        Logger::try_with_str(level).with_context(|| format!("invalid log level `{level}`"))?;
    let logger = match log_dir {
        Some(dir) => logger
            .log_to_file(FileSpec::default().directory(dir).basename(LOG_FILE_BASENAME))
            .rotate(
                Criterion::Size(MAX_LOG_FILE_SIZE_BYTES),
                Naming::Numbers,
                Cleanup::KeepLogFiles(MAX_LOG_FILES),
            )
            .write_mode(WriteMode::BufferAndFlush)
            .append()
            .format_for_files(flexi_logger::detailed_format),
        None => logger.log_to_stderr(),
    };
    let handle = logger.start().context("failed to start logger")?;
    info!(
        "event=cli_start module=cli status=ok version={}",
        env!("CARGO_PKG_VERSION")
    );
    Ok(handle)
}

fn execute_tree(session: &mut Session, args: TreeArgs) -> Result<()> {
    let mut outline = session.outline(&args.layout);
    let root = open_project(session, &mut outline, &args.input)?;
    print_node(&outline, root, 0, args.codes);
    Ok(())
}

fn print_node(outline: &Outline, id: NodeId, depth: usize, codes: bool) {
    let Some(node) = outline.tree.node(id) else {
        return;
    };
    let mut line = format!("{}{}", "  ".repeat(depth), node.name);
    if let Some(path) = &node.path {
        line.push_str(&format!(" [{}]", path.display()));
    }
    if codes {
        line.push_str(&format!(" #{}", node.code.as_u64()));
    }
    println!("{line}");
    for child in node.children() {
        print_node(outline, *child, depth + 1, codes);
    }
}

fn execute_tangle(session: &mut Session, args: TangleArgs) -> Result<()> {
    let mut outline = session.outline(&args.layout);
    let root = open_project(session, &mut outline, &args.input)?;
    if !args.write {
        let node = match args.node.as_deref() {
            Some(selector) => select_node(&outline, root, selector)?,
            None => root,
        };
        print!("{}", outline.render(node));
        return Ok(());
    }

    outline.tree.mark_unsaved(root, &mut outline.store)?;
    let report = outline.save_root(root);
    print_save_report(&report)
}

fn execute_pack(session: &mut Session, args: PackArgs) -> Result<()> {
    let output = resolve_input_path(&args.output)?;
    if FileKind::from_path(&output) != Some(FileKind::Project) {
        bail!(
            "{} must use the .{PROJECT_SUFFIX} suffix",
            output.display()
        );
    }
    if output.exists() && !args.force {
        bail!(
            "{} already exists; pass --force to overwrite it",
            output.display()
        );
    }
    let base = output
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_default();

    let mut outline = session.outline(&args.layout);
    let root_code = outline.store.new_num();
    let root = outline
        .tree
        .add_root(node_name(&output), Some(output.clone()), root_code);
    if let Some(note) = args.note {
        outline.store.set(root_code, note);
    }

    for input in &args.inputs {
        let input = resolve_input_path(input)?;
        if !input.is_file() {
            bail!("{} is not a file", input.display());
        }
        let stored = input
            .strip_prefix(&base)
            .map(Path::to_path_buf)
            .unwrap_or_else(|_| input.clone());
        let code = outline.store.new_num();
        let child = outline
            .tree
            .append_child(root, node_name(&input), Some(stored), code, &mut outline.store)?;
        outline
            .parse_node(child)
            .with_context(|| format!("failed to load {}", input.display()))?;
        debug!(
            "event=pack_added module=cli path={} node={child}",
            input.display()
        );
    }

    outline.tree.mark_unsaved(root, &mut outline.store)?;
    let report = outline.save_root(root);
    print_save_report(&report)?;
    session.remember(&output)?;
    println!(
        "Packed {} files into {}",
        args.inputs.len(),
        output.display()
    );
    Ok(())
}

fn execute_unpack(session: &mut Session, args: UnpackArgs) -> Result<()> {
    if FileKind::from_path(&args.input) != Some(FileKind::Project) {
        bail!(
            "{} is not a .{PROJECT_SUFFIX} project",
            args.input.display()
        );
    }
    let mut outline = session.outline(&args.layout);
    let root = open_project(session, &mut outline, &args.input)?;
    for code in outline.tree.subtree_codes(root) {
        outline.store.set_saved(code, false);
    }
    let report = outline.save_root(root);
    print_save_report(&report)
}

fn execute_macros(session: &mut Session, args: MacrosArgs) -> Result<()> {
    let mut outline = session.outline(&LayoutArgs::default());
    let root = open_project(session, &mut outline, &args.input)?;
    let mut found = false;
    for (name, code) in outline.store.macros() {
        found = true;
        let location = outline
            .tree
            .nodes_with_code(code)
            .first()
            .map(|node| outline.tree.breadcrumb(*node))
            .unwrap_or_default();
        println!("@{name}\t{location}");
    }
    if !found {
        println!(
            "No macros defined in {}.",
            outline.tree.breadcrumb(root)
        );
    }
    Ok(())
}

fn execute_find(session: &mut Session, args: FindArgs) -> Result<()> {
    let mut outline = session.outline(&args.layout);
    let root = open_project(session, &mut outline, &args.input)?;

    let mut query = FindQuery::new(args.pattern);
    if args.regex {
        query.mode = FindMode::Regex;
    }
    query.case_sensitive = args.case_sensitive;
    query.whole_word = args.whole_word;

    let matches = outline.find(root, &query)?;
    if matches.is_empty() {
        println!("No matches found.");
        return Ok(());
    }
    println!("Find \"{}\" ({} hits)", query.pattern, matches.len());
    for hit in &matches {
        println!("  {}:{}: {}", hit.breadcrumb, hit.line, hit.line_text);
    }

    let Some(replacement) = args.replace else {
        return Ok(());
    };
    if !args.apply {
        println!("Dry run only; re-run with --apply to write changes.");
        return Ok(());
    }
    let replaced = outline.replace(root, &query, &replacement)?;
    let report = outline.save_root(root);
    print_save_report(&report)?;
    println!("Applied {replaced} replacements");
    Ok(())
}

fn execute_run(session: &mut Session, args: RunArgs) -> Result<()> {
    let mut outline = session.outline(&LayoutArgs::default());
    let root = open_project(session, &mut outline, &args.input)?;
    let node = match args.node.as_deref() {
        Some(selector) => select_node(&outline, root, selector)?,
        None => root,
    };
    let source = match (args.inline, args.name) {
        (Some(script), _) => ScriptSource::Inline(script),
        (None, Some(name)) => ScriptSource::Macro(name.trim_start_matches('@').to_string()),
        (None, None) => bail!("either a macro name or --inline is required"),
    };
    let snapshot = ScriptSnapshot::capture(&outline.tree, &outline.store, Some(node), source)?;

    let macros = &session.preferences().macros;
    let executor = match args.interpreter {
        Some(program) => CommandExecutor::new(program).with_args(args.args),
        None if args.args.is_empty() => {
            CommandExecutor::new(macros.interpreter.clone()).with_args(macros.args.clone())
        }
        None => CommandExecutor::new(macros.interpreter.clone()).with_args(args.args),
    };
    let executor = match args.timeout.or(macros.timeout_secs) {
        Some(secs) => executor.with_timeout(Duration::from_secs(secs)),
        None => executor,
    };

    let handle = ScriptRunner::new(executor).spawn(snapshot)?;
    let name = handle.name().to_string();
    let output = handle.join()?;
    print!("{}", output.stdout_lossy());
    eprint!("{}", output.stderr_lossy());
    if output.timed_out {
        bail!("macro {name} timed out");
    }
    if !output.success() {
        bail!(
            "macro {name} exited with status {}",
            output
                .exit_code
                .map(|code| code.to_string())
                .unwrap_or_else(|| "unknown".to_string())
        );
    }
    Ok(())
}

fn execute_watch(session: &mut Session, args: WatchArgs) -> Result<()> {
    let mut outline = session.outline(&args.layout);
    let root = open_project(session, &mut outline, &args.input)?;
    let interval = session.preferences().files.poll_interval();
    let mut keeper = FileKeeper::new(interval).context("failed to start file watcher")?;

    let files = watched_files(&outline, root);
    for path in &files {
        keeper
            .watch(path)
            .with_context(|| format!("failed to watch {}", path.display()))?;
    }
    println!("Watching {} files", files.len());

    let deadline = args
        .timeout
        .map(|secs| Instant::now() + Duration::from_secs(secs));
    loop {
        let wait = match deadline {
            Some(deadline) => {
                let now = Instant::now();
                if now >= deadline {
                    break;
                }
                deadline - now
            }
            None => interval,
        };
        let Some(event) = keeper.recv_timeout(wait)? else {
            continue;
        };
        let Some(node) = node_for_path(&outline, root, &event.path) else {
            debug!(
                "event=watch_unmatched module=cli path={}",
                event.path.display()
            );
            continue;
        };
        match event.kind {
            FileChangeKind::Removed => println!("Removed {}", event.path.display()),
            _ if !outline.tree.is_saved(node, &outline.store) => {
                println!("Kept unsaved changes for {}", event.path.display());
            }
            _ => match outline.parse_node(node) {
                Ok(()) => println!("Reloaded {}", event.path.display()),
                Err(err) => {
                    warn!(
                        "event=reload_failed module=cli path={} error={err}",
                        event.path.display()
                    );
                    eprintln!("warning: {}: {err}", event.path.display());
                }
            },
        }
        if args.once {
            break;
        }
    }
    Ok(())
}

fn execute_recent(session: &mut Session, args: RecentArgs) -> Result<()> {
    if args.prune {
        if let Some(store) = session.store.as_mut() {
            let mut removed = 0;
            store
                .update(|prefs| removed = prefs.recent.prune_missing())
                .with_context(|| format!("failed to save preferences {}", store.path().display()))?;
            println!("Removed {removed} missing projects");
        }
    }
    let recent = &session.preferences().recent;
    if recent.is_empty() {
        println!("No recent projects.");
        return Ok(());
    }
    for path in recent.iter() {
        println!("{}", path.display());
    }
    Ok(())
}

fn open_project(session: &mut Session, outline: &mut Outline, input: &Path) -> Result<NodeId> {
    let path = resolve_input_path(input)?;
    let root = outline
        .open_root(&path)
        .with_context(|| format!("failed to open {}", path.display()))?;
    session.remember(&path)?;
    Ok(root)
}

/// First node, in outline order, whose breadcrumb or name equals `selector`.
fn select_node(outline: &Outline, root: NodeId, selector: &str) -> Result<NodeId> {
    outline
        .tree
        .subtree(root)
        .into_iter()
        .find(|id| {
            outline.tree.breadcrumb(*id) == selector
                || outline
                    .tree
                    .node(*id)
                    .is_some_and(|node| node.name == selector)
        })
        .ok_or_else(|| anyhow!("no node named `{selector}`"))
}

fn watched_files(outline: &Outline, root: NodeId) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = Vec::new();
    for id in outline.tree.subtree(root) {
        let Some(path) = outline.tree.resolved_path(id) else {
            continue;
        };
        if FileKind::from_path(&path).is_some() && path.is_file() && !files.contains(&path) {
            files.push(path);
        }
    }
    files
}

fn node_for_path(outline: &Outline, root: NodeId, path: &Path) -> Option<NodeId> {
    outline
        .tree
        .subtree(root)
        .into_iter()
        .find(|id| outline.tree.resolved_path(*id).as_deref() == Some(path))
}

fn print_save_report(report: &SaveReport) -> Result<()> {
    for path in &report.written {
        println!("Wrote {}", path.display());
    }
    for path in &report.skipped {
        println!("Skipped {}", path.display());
    }
    for failure in &report.failed {
        eprintln!("Failed {}: {}", failure.path.display(), failure.message);
    }
    if !report.failed.is_empty() {
        bail!("{} files could not be written", report.failed.len());
    }
    Ok(())
}

fn node_name(path: &Path) -> String {
    path.file_stem()
        .or_else(|| path.file_name())
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn resolve_input_path(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(std::env::current_dir()
            .context("determine current directory")?
            .join(path))
    }
}
