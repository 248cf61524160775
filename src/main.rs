mod ui;

use clap::{error::ErrorKind, CommandFactory, Parser, Subcommand};
use crossterm::{
    event::{DisableMouseCapture, EnableMouseCapture, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    tty::IsTty,
};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    layout::Rect,
    Terminal,
};
use std::{
    error::Error,
    fs,
    io::{self, stdin, Write},
    path::{Path, PathBuf},
    time::Duration,
};
use itertools::Itertools;
use time_humanize::HumanTime;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use tracepad::{
    adaptation::Mood,
    app_dirs::AppDirs,
    config::{Config, ConfigStore, FileConfigStore},
    local_store::LocalSessionCache,
    mapper::{DisplayRect, LayoutSnapshot},
    persistence::{SessionSink, SqliteSessionSink},
    runtime::{
        CrosstermEventSource, FixedTicker, PointerInput, PointerKind, Runner, TraceEvent,
        TraceEventSource, Ticker,
    },
    template::BundledTemplates,
    SessionConfig, TemplateStore, TracingSession,
};

const TICK_RATE_MS: u64 = 100;

/// letter tracing pad with live guidance and accuracy scoring
#[derive(Parser, Debug, Clone)]
#[clap(version, about)]
pub struct Cli {
    #[clap(subcommand)]
    command: Option<Command>,

    /// log at debug level
    #[clap(short, long, global = true)]
    verbose: bool,

    /// config file to use instead of the default location
    #[clap(long, global = true)]
    config: Option<PathBuf>,

    /// user id recorded with each session
    #[clap(short, long, global = true)]
    user: Option<String>,

    /// per-axis grid-cell tolerance for matching the guide
    #[clap(short, long, global = true)]
    tolerance: Option<i32>,

    /// accuracy needed to submit, in [0, 1]
    #[clap(long, global = true)]
    threshold: Option<f64>,

    /// directory of <letter>.json template assets
    #[clap(long, global = true)]
    template_dir: Option<PathBuf>,

    /// persist the overrides above to the config file
    #[clap(long, global = true)]
    save_config: bool,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// trace letters interactively (default)
    Practice {
        /// letter to start with
        #[clap(short, long)]
        letter: Option<String>,
    },
    /// score a recorded pointer-event file
    Replay {
        /// JSON array of {kind, x, y, time} events in display space
        file: PathBuf,

        #[clap(short, long, default_value = "A")]
        letter: String,

        /// width of the display box the events were captured in
        #[clap(long)]
        display_width: Option<f64>,

        /// height of the display box the events were captured in
        #[clap(long)]
        display_height: Option<f64>,

        /// run the submission path after replaying
        #[clap(long)]
        submit: bool,
    },
    /// list locally cached sessions and the best stored accuracy per letter
    Sessions {
        #[clap(short, long)]
        letter: Option<String>,

        /// delete the local cache and every stored score
        #[clap(long)]
        clear: bool,
    },
    /// write every cached session into one combined CSV
    Export {
        /// output file, or - for stdout
        #[clap(short, long)]
        output: Option<PathBuf>,
    },
    /// list bundled letter templates
    Templates,
}

impl Cli {
    /// Apply command-line overrides on top of the stored config
    fn apply(&self, mut cfg: Config) -> Config {
        if let Some(u) = &self.user {
            cfg.user_id = u.clone();
        }
        if let Some(t) = self.tolerance {
            cfg.tolerance = t;
        }
        if let Some(t) = self.threshold {
            cfg.submit_threshold = t;
        }
        if let Some(d) = &self.template_dir {
            cfg.template_dir = Some(d.clone());
        }
        cfg
    }

    fn config_store(&self) -> FileConfigStore {
        match &self.config {
            Some(p) => FileConfigStore::with_path(p),
            None => FileConfigStore::new(),
        }
    }
}

/// Where submissions go
pub struct Storage {
    pub cache: LocalSessionCache,
    pub sink: Box<dyn SessionSink>,
    pub export_dir: Option<PathBuf>,
}

impl Storage {
    fn open(cfg: &Config) -> tracepad::Result<Self> {
        let cache = match AppDirs::local_cache_path() {
            Some(p) => LocalSessionCache::open(p, cfg.local_cache_capacity),
            None => LocalSessionCache::new(cfg.local_cache_capacity),
        };
        let db = AppDirs::db_path().unwrap_or_else(|| PathBuf::from("tracepad_sessions.db"));
        Ok(Self {
            cache,
            sink: Box::new(SqliteSessionSink::open(db)?),
            export_dir: AppDirs::exports_dir(),
        })
    }
}

pub struct App {
    pub config: Config,
    pub templates: TemplateStore,
    pub letter_idx: usize,
    pub session: TracingSession,
    pub storage: Storage,
    /// Canvas area from the last draw, in terminal cells
    pub canvas: Rect,
    pub status: Option<String>,
}

impl App {
    pub fn new(config: Config, mut templates: TemplateStore, storage: Storage, letter: Option<&str>) -> Self {
        let letter_idx = letter
            .and_then(|l| config.letters.iter().position(|x| x.eq_ignore_ascii_case(l)))
            .unwrap_or(0);
        let symbol = config.letters.get(letter_idx).cloned().unwrap_or_else(|| "A".into());
        let session = TracingSession::new(
            SessionConfig::from_config(&config, &symbol),
            templates.load(&symbol),
        );
        Self {
            config,
            templates,
            letter_idx,
            session,
            storage,
            canvas: Rect::default(),
            status: None,
        }
    }

    pub fn layout(&self) -> LayoutSnapshot {
        LayoutSnapshot::new(
            DisplayRect {
                left: self.canvas.x as f64,
                top: self.canvas.y as f64,
                width: self.canvas.width as f64,
                height: self.canvas.height as f64,
            },
            &self.config.grid(),
        )
    }

    fn inside_canvas(&self, p: &PointerInput) -> bool {
        p.x >= self.canvas.left() as f64
            && p.x < self.canvas.right() as f64
            && p.y >= self.canvas.top() as f64
            && p.y < self.canvas.bottom() as f64
    }

    /// Presses start on the canvas only. Dragging a mouse off it ends the
    /// stroke; touch input is captured by the surface and keeps drawing.
    pub fn on_pointer(&mut self, mut p: PointerInput) {
        match p.kind {
            PointerKind::Down if !self.inside_canvas(&p) => return,
            PointerKind::Move if !self.inside_canvas(&p) => {
                if !self.session.is_drawing() {
                    return;
                }
                if !p.prevent_default() {
                    p.kind = PointerKind::Leave;
                }
            }
            _ => {}
        }
        let layout = self.layout();
        self.session.handle(&p, &layout);
    }

    pub fn submit(&mut self, now: u64) {
        let hint = self.session.adaptation(Mood::default()).prompt();
        let Storage {
            cache,
            sink,
            export_dir,
        } = &mut self.storage;
        match self
            .session
            .submit(cache, export_dir.as_deref(), &**sink, now)
        {
            Ok(receipt) => {
                self.status = Some(match receipt.export_path {
                    Some(p) => format!("saved {}. {hint}", p.display()),
                    None => format!("saved {}. {hint}", receipt.session_id),
                });
            }
            Err(e) => {
                warn!(error = %e, "submit refused");
                self.status = Some(e.to_string());
            }
        }
    }

    pub fn try_again(&mut self) {
        if self.session.can_try_again() || self.session.is_drawing() {
            let hint = self.session.adaptation(Mood::default()).prompt();
            self.session.reset();
            self.status = Some(hint.to_string());
        }
    }

    pub fn next_letter(&mut self) {
        if self.config.letters.is_empty() {
            return;
        }
        self.letter_idx = (self.letter_idx + 1) % self.config.letters.len();
        let symbol = self.config.letters[self.letter_idx].clone();
        self.session = TracingSession::new(
            SessionConfig::from_config(&self.config, &symbol),
            self.templates.load(&symbol),
        );
        self.status = None;
    }
}

#[derive(Debug, PartialEq)]
enum ExitType {
    Quit,
    Continue,
}

fn on_key(app: &mut App, key: KeyEvent, now: u64) -> ExitType {
    if key.kind != KeyEventKind::Press {
        return ExitType::Continue;
    }
    match key.code {
        KeyCode::Esc => return ExitType::Quit,
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            return ExitType::Quit
        }
        KeyCode::Char('s') => app.submit(now),
        KeyCode::Char('r') => app.try_again(),
        KeyCode::Char('n') => app.next_letter(),
        _ => {}
    }
    ExitType::Continue
}

fn run_practice<B: Backend, E: TraceEventSource, T: Ticker>(
    terminal: &mut Terminal<B>,
    app: &mut App,
    runner: &Runner<E, T>,
    clock: impl Fn() -> u64,
) -> Result<(), Box<dyn Error>> {
    loop {
        terminal.draw(|f| {
            app.canvas = ui::canvas_rect(f.area());
            f.render_widget(&*app, f.area());
        })?;

        match runner.step() {
            TraceEvent::Tick => {
                app.session.tick(clock());
            }
            TraceEvent::Resize => {}
            TraceEvent::Pointer(p) => app.on_pointer(p),
            TraceEvent::Key(key) => {
                if on_key(app, key, clock()) == ExitType::Quit {
                    return Ok(());
                }
            }
        }
    }
}

/// The interactive pad logs to a file so the terminal UI stays intact
fn init_logging(verbose: bool, interactive: bool) {
    let level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    if !interactive {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(io::stderr)
            .init();
        return;
    }

    let file = AppDirs::log_path().and_then(|p| {
        if let Some(parent) = p.parent() {
            fs::create_dir_all(parent).ok()?;
        }
        fs::OpenOptions::new().create(true).append(true).open(p).ok()
    });

    match file {
        Some(f) => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_ansi(false)
            .with_writer(std::sync::Mutex::new(f))
            .init(),
        None => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(io::sink)
            .init(),
    }
}

fn practice(cfg: Config, letter: Option<String>) -> Result<(), Box<dyn Error>> {
    if !stdin().is_tty() {
        let mut cmd = Cli::command();
        cmd.error(ErrorKind::Io, "stdin must be a tty").exit();
    }

    let templates = TemplateStore::from_dir_or_bundled(cfg.template_dir.as_deref());
    let storage = Storage::open(&cfg)?;
    let mut app = App::new(cfg, templates, storage, letter.as_deref());

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let runner = Runner::new(
        CrosstermEventSource::new(),
        FixedTicker::new(Duration::from_millis(TICK_RATE_MS)),
    );
    let result = run_practice(&mut terminal, &mut app, &runner, || runner.source().now_ms());

    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        DisableMouseCapture,
        LeaveAlternateScreen
    )?;
    terminal.show_cursor()?;

    result
}

fn replay(
    cfg: Config,
    file: &Path,
    letter: &str,
    display: (Option<f64>, Option<f64>),
    submit: bool,
) -> Result<(), Box<dyn Error>> {
    let events: Vec<PointerInput> = serde_json::from_slice(&fs::read(file)?)?;
    let grid = cfg.grid();
    let layout = LayoutSnapshot::new(
        DisplayRect {
            left: 0.0,
            top: 0.0,
            width: display.0.unwrap_or_else(|| grid.canvas_width()),
            height: display.1.unwrap_or_else(|| grid.canvas_height()),
        },
        &grid,
    );

    let mut templates = TemplateStore::from_dir_or_bundled(cfg.template_dir.as_deref());
    let mut session = TracingSession::new(
        SessionConfig::from_config(&cfg, letter),
        templates.load(letter),
    );

    let mut last = 0;
    for ev in &events {
        session.handle(ev, &layout);
        last = ev.time;
    }
    if session.is_drawing() {
        session.pointer_up(last);
    }

    let mut out = io::stdout().lock();
    serde_json::to_writer_pretty(&mut out, session.metrics())?;
    writeln!(out)?;

    if submit {
        let mut storage = Storage::open(&cfg)?;
        let receipt = session.submit(
            &mut storage.cache,
            storage.export_dir.as_deref(),
            &*storage.sink,
            last,
        )?;
        writeln!(out, "submitted {} -> {}", receipt.session_id, receipt.locator)?;
    }
    Ok(())
}

fn list_sessions(cfg: &Config, letter: Option<&str>, clear: bool) -> Result<(), Box<dyn Error>> {
    let Some(path) = AppDirs::local_cache_path() else {
        return Ok(());
    };
    let mut cache = LocalSessionCache::open(path, cfg.local_cache_capacity);
    let db = AppDirs::db_path()
        .filter(|p| p.exists())
        .map(SqliteSessionSink::open)
        .transpose()?;

    if clear {
        cache.clear()?;
        if let Some(db) = &db {
            db.clear_all()?;
        }
        info!("cleared stored sessions");
        return Ok(());
    }

    let now = chrono::Local::now();
    let mut out = io::stdout().lock();

    for s in cache.sessions().filter(|s| letter.map_or(true, |l| s.letter == l)) {
        let age = s
            .saved_at()
            .map(|t| HumanTime::from_seconds(-(now - t).num_seconds()).to_string())
            .unwrap_or_else(|| s.timestamp.clone());
        let rows = s.csv_data.lines().count().saturating_sub(1);
        writeln!(out, "{}  {}  {:>5} points  {}", s.letter, s.id, rows, age)?;
    }

    let Some(db) = db else {
        return Ok(());
    };
    let letters: Vec<String> = match letter {
        Some(l) => vec![l.to_string()],
        None => db
            .all_scores()?
            .into_iter()
            .map(|r| r.summary.letter)
            .sorted()
            .dedup()
            .collect(),
    };
    for l in letters {
        let submitted = db.scores_for_letter(&l)?.len();
        if let Some(best) = db.best_accuracy(&l)? {
            writeln!(out, "best {}: {:.0}% over {} submitted", l, best * 100.0, submitted)?;
        }
    }
    Ok(())
}

fn export(cfg: &Config, output: Option<PathBuf>) -> Result<(), Box<dyn Error>> {
    let cache = match AppDirs::local_cache_path() {
        Some(p) => LocalSessionCache::open(p, cfg.local_cache_capacity),
        None => LocalSessionCache::new(cfg.local_cache_capacity),
    };
    let combined = cache.export_all()?;

    let target = output.or_else(|| {
        AppDirs::exports_dir().map(|d| {
            d.join(format!(
                "all_alphabet_sessions_{}.csv",
                chrono::Local::now().format("%Y%m%d_%H%M%S")
            ))
        })
    });

    match target {
        Some(p) if p.as_os_str() != "-" => {
            if let Some(parent) = p.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(&p, combined)?;
            info!(path = %p.display(), sessions = cache.len(), "export written");
            println!("{}", p.display());
        }
        _ => print!("{combined}"),
    }
    Ok(())
}

fn templates(cfg: &Config) -> Result<(), Box<dyn Error>> {
    let store = TemplateStore::from_dir_or_bundled(cfg.template_dir.as_deref());
    let mut symbols = BundledTemplates::symbols();
    for l in &cfg.letters {
        if !symbols.contains(l) {
            symbols.push(l.clone());
        }
    }

    let mut out = io::stdout().lock();
    for s in symbols {
        match store.try_load(&s) {
            Ok(t) => writeln!(
                out,
                "{s}  {} paths  {} cells",
                t.paths.len(),
                t.distinct_cells().len()
            )?,
            Err(e) => writeln!(out, "{s}  unavailable ({e})")?,
        }
    }
    Ok(())
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    let command = cli.command.clone().unwrap_or(Command::Practice { letter: None });

    init_logging(cli.verbose, matches!(command, Command::Practice { .. }));

    let store = cli.config_store();
    let cfg = cli.apply(store.load());
    cfg.validate()?;
    if cli.save_config {
        store.save(&cfg)?;
        info!(path = %store.path().display(), "config saved");
    }

    match command {
        Command::Practice { letter } => practice(cfg, letter),
        Command::Replay {
            file,
            letter,
            display_width,
            display_height,
            submit,
        } => replay(cfg, &file, &letter, (display_width, display_height), submit),
        Command::Sessions { letter, clear } => list_sessions(&cfg, letter.as_deref(), clear),
        Command::Export { output } => export(&cfg, output),
        Command::Templates => templates(&cfg),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratatui::backend::TestBackend;
    use std::sync::mpsc;
    use tracepad::persistence::MemorySessionSink;
    use tracepad::runtime::TestEventSource;

    fn test_app() -> App {
        let storage = Storage {
            cache: LocalSessionCache::new(5),
            sink: Box::new(MemorySessionSink::new()),
            export_dir: None,
        };
        let mut app = App::new(
            Config::default(),
            TemplateStore::new(BundledTemplates),
            storage,
            None,
        );
        // 40x40 grid shown in a 40x20 cell box at (1, 2)
        app.canvas = Rect::new(1, 2, 40, 20);
        app
    }

    fn key(c: char) -> KeyEvent {
        KeyEvent::new(KeyCode::Char(c), KeyModifiers::NONE)
    }

    #[test]
    fn test_cli_defaults_to_practice() {
        let cli = Cli::parse_from(["tracepad"]);
        assert_eq!(cli.command, None);
        assert!(!cli.verbose);
    }

    #[test]
    fn test_cli_replay_args() {
        let cli = Cli::parse_from([
            "tracepad",
            "replay",
            "events.json",
            "--letter",
            "B",
            "--display-width",
            "200",
            "--submit",
            "-t",
            "2",
        ]);
        assert_eq!(
            cli.command,
            Some(Command::Replay {
                file: PathBuf::from("events.json"),
                letter: "B".into(),
                display_width: Some(200.0),
                display_height: None,
                submit: true,
            })
        );
        assert_eq!(cli.apply(Config::default()).tolerance, 2);
    }

    #[test]
    fn test_overrides_apply_on_top_of_config() {
        let cli = Cli::parse_from(["tracepad", "--user", "kid", "--threshold", "0.7"]);
        let cfg = cli.apply(Config::default());
        assert_eq!(cfg.user_id, "kid");
        assert_eq!(cfg.submit_threshold, 0.7);
        assert_eq!(cfg.tolerance, 1);
    }

    #[test]
    fn test_app_starts_on_requested_letter() {
        let app = App::new(
            Config::default(),
            TemplateStore::new(BundledTemplates),
            test_app().storage,
            Some("b"),
        );
        assert_eq!(app.session.letter(), "B");
        assert!(app.session.template().is_some());
    }

    #[test]
    fn test_next_letter_wraps() {
        let mut app = test_app();
        app.next_letter();
        app.next_letter();
        assert_eq!(app.session.letter(), "C");
        app.next_letter();
        assert_eq!(app.session.letter(), "A");
    }

    #[test]
    fn test_drag_off_canvas_ends_stroke() {
        let mut app = test_app();
        app.on_pointer(PointerInput::new(PointerKind::Down, 10.5, 10.5, 0));
        app.on_pointer(PointerInput::new(PointerKind::Move, 11.5, 10.5, 20));
        assert!(app.session.is_drawing());

        app.on_pointer(PointerInput::new(PointerKind::Move, 60.5, 10.5, 40));
        assert!(!app.session.is_drawing());
        assert_eq!(app.session.strokes().len(), 1);
        assert_eq!(app.session.points().len(), 2);
    }

    #[test]
    fn test_touch_drag_off_canvas_keeps_stroke() {
        let mut app = test_app();
        app.on_pointer(PointerInput::touch(PointerKind::Down, 10.5, 10.5, 0));
        app.on_pointer(PointerInput::touch(PointerKind::Move, 60.5, 10.5, 20));
        assert!(app.session.is_drawing());
        assert_eq!(app.session.live_stroke().map(|s| s.len()), Some(2));

        app.on_pointer(PointerInput::touch(PointerKind::Up, 60.5, 10.5, 30));
        assert_eq!(app.session.strokes().len(), 1);
        assert_eq!(app.session.points().len(), 2);
    }

    #[test]
    fn test_press_outside_canvas_is_ignored() {
        let mut app = test_app();
        app.on_pointer(PointerInput::new(PointerKind::Down, 0.0, 0.0, 0));
        assert!(!app.session.is_drawing());
    }

    #[test]
    fn test_keys() {
        let mut app = test_app();
        app.on_pointer(PointerInput::new(PointerKind::Down, 10.5, 10.5, 0));
        app.on_pointer(PointerInput::new(PointerKind::Up, 10.5, 10.5, 10));
        assert!(app.session.can_try_again());

        assert_eq!(on_key(&mut app, key('r'), 20), ExitType::Continue);
        assert!(!app.session.can_try_again());

        // nothing to submit
        on_key(&mut app, key('s'), 30);
        assert!(app.status.is_some());

        assert_eq!(
            on_key(&mut app, KeyEvent::new(KeyCode::Esc, KeyModifiers::NONE), 40),
            ExitType::Quit
        );
        assert_eq!(
            on_key(
                &mut app,
                KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL),
                50
            ),
            ExitType::Quit
        );
    }

    #[test]
    fn test_render_shows_letter_and_metrics() {
        let mut app = test_app();
        let mut terminal = Terminal::new(TestBackend::new(80, 24)).unwrap();
        terminal
            .draw(|f| {
                app.canvas = ui::canvas_rect(f.area());
                f.render_widget(&app, f.area());
            })
            .unwrap();

        let content: String = terminal
            .backend()
            .buffer()
            .content
            .iter()
            .map(|c| c.symbol())
            .collect();
        assert!(content.contains("letter A"));
        assert!(content.contains("accuracy"));
        assert!(content.contains("░"));
    }

    #[test]
    fn test_practice_loop_quits_on_esc() {
        let mut app = test_app();
        let (tx, rx) = mpsc::channel();
        tx.send(TraceEvent::Pointer(PointerInput::new(PointerKind::Down, 5.5, 5.5, 0)))
            .unwrap();
        tx.send(TraceEvent::Pointer(PointerInput::new(PointerKind::Up, 5.5, 5.5, 10)))
            .unwrap();
        tx.send(TraceEvent::Key(KeyEvent::new(KeyCode::Esc, KeyModifiers::NONE)))
            .unwrap();

        let runner = Runner::new(
            TestEventSource::new(rx),
            FixedTicker::new(Duration::from_millis(5)),
        );
        let mut terminal = Terminal::new(TestBackend::new(80, 24)).unwrap();
        run_practice(&mut terminal, &mut app, &runner, || 100).unwrap();

        assert_eq!(app.session.strokes().len(), 1);
    }
}
