//! Line-oriented front-end for the interactive browser.

use std::io::{self, BufRead, Write};

use tokio::sync::mpsc;
use tracing::{debug, warn};

use walls_core::config::Config;
use walls_core::controller::{Controller, PreviewPane, Presenter, Services, UserAction};
use walls_core::session::{Phase, SessionState};

pub const HELP: &str = "\
Type a search query and press Enter.
  :n / :p      next / previous page (or cached wallpaper)
  :<number>    highlight a result
  :set         set the highlighted wallpaper
  :cache       toggle cached-wallpaper browsing
  :purity      cycle the purity filter
  :help        show this help
  :q           quit";

pub async fn run(config: &Config, services: Services) {
    let (tx, rx) = mpsc::channel(32);
    spawn_stdin_reader(tx);

    let mut presenter = LinePresenter::new(io::stdout());
    presenter.line(HELP);
    let controller = Controller::new(
        services,
        config.search.default_purity,
        config.purity_cycle(),
        presenter,
    );
    controller.run(rx).await;
}

/// Read stdin on a plain thread; the channel closes at EOF.
fn spawn_stdin_reader(tx: mpsc::Sender<UserAction>) {
    std::thread::spawn(move || {
        for line in io::stdin().lock().lines() {
            let line = match line {
                Ok(line) => line,
                Err(e) => {
                    warn!("stdin read failed: {e}");
                    break;
                }
            };
            let action = match parse_line(&line) {
                Ok(action) => action,
                Err(Unknown::Help) => {
                    println!("{HELP}");
                    continue;
                }
                Err(Unknown::Command(cmd)) => {
                    println!("unknown command :{cmd} (try :help)");
                    continue;
                }
            };
            let quit = action == UserAction::Quit;
            if tx.blocking_send(action).is_err() || quit {
                break;
            }
        }
        debug!("stdin reader finished");
    });
}

#[derive(Debug, PartialEq, Eq)]
pub enum Unknown {
    Help,
    Command(String),
}

/// Map one input line to an action. Lines starting with `:` are commands,
/// anything else is a search query.
pub fn parse_line(line: &str) -> Result<UserAction, Unknown> {
    let Some(command) = line.trim().strip_prefix(':') else {
        return Ok(UserAction::Submit(line.to_string()));
    };
    let command = command.trim();
    match command {
        "n" | "next" => Ok(UserAction::Next),
        "p" | "prev" => Ok(UserAction::Previous),
        "set" | "s" => Ok(UserAction::Activate),
        "cache" | "c" => Ok(UserAction::ToggleCacheMode),
        "purity" | "u" => Ok(UserAction::CyclePurity),
        "q" | "quit" => Ok(UserAction::Quit),
        "help" | "h" | "?" => Err(Unknown::Help),
        other => match other.parse::<usize>() {
            Ok(n) if n > 0 => Ok(UserAction::Highlight(n - 1)),
            _ => Err(Unknown::Command(other.to_string())),
        },
    }
}

/// Prints only what changed since the previous frame.
pub struct LinePresenter<W> {
    out: W,
    listing: Vec<String>,
    selection: Option<usize>,
    preview: PreviewPane,
    status: String,
}

impl<W: Write> LinePresenter<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            listing: Vec::new(),
            selection: None,
            preview: PreviewPane::default(),
            status: String::new(),
        }
    }

    fn line(&mut self, text: &str) {
        if let Err(e) = writeln!(self.out, "{text}") {
            warn!("failed to write output: {e}");
        }
    }

    fn draw(&mut self, session: &SessionState, preview: &PreviewPane) -> io::Result<()> {
        let entries = match session.phase() {
            Phase::CacheBrowsing { .. } => session.cached(),
            _ => session.results(),
        };
        let listing: Vec<String> = entries.iter().map(|w| w.summary()).collect();
        let selection = session.selection();

        if listing != self.listing || selection != self.selection {
            writeln!(self.out, "{}", header(session))?;
            for (i, entry) in listing.iter().enumerate() {
                let marker = if Some(i) == selection { '>' } else { ' ' };
                writeln!(self.out, "{marker} {:>3}. {entry}", i + 1)?;
            }
            self.listing = listing;
            self.selection = selection;
        }

        if *preview != self.preview {
            if let Some(image) = &preview.image {
                writeln!(self.out, "  image: {}", image.display())?;
            }
            for detail in preview.details.lines() {
                writeln!(self.out, "  {detail}")?;
            }
            self.preview = preview.clone();
        }

        if session.status() != self.status {
            writeln!(self.out, "-- {}", session.status())?;
            self.status = session.status().to_string();
        }
        self.out.flush()
    }
}

impl<W: Write + Send> Presenter for LinePresenter<W> {
    fn render(&mut self, session: &SessionState, preview: &PreviewPane) {
        if let Err(e) = self.draw(session, preview) {
            warn!("failed to draw: {e}");
        }
    }
}

fn header(session: &SessionState) -> String {
    match session.phase() {
        Phase::CacheBrowsing { index, count } => {
            let position = if count == 0 { 0 } else { index + 1 };
            format!("[cache {position}/{count}]")
        }
        Phase::NoQuery => format!("[no query | purity {}]", session.purity()),
        Phase::Searching => format!("[searching '{}' | purity {}]", session.query(), session.purity()),
        Phase::Browsing { page, last_page } => format!(
            "['{}' page {page}/{last_page} | purity {}]",
            session.query(),
            session.purity()
        ),
    }
}
