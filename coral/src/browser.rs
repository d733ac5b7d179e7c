//! Interactive list of search results.
//!
//! Entries are shown relative to the search root. Selecting one opens it in the text
//! viewer when its extension is text-like, otherwise with the desktop's default
//! handler. The list stays open until the user quits, and a failed open never ends it.
use std::io::{self, IsTerminal, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

use colored::Colorize;
use crossterm::{
    cursor::{Hide, MoveTo, Show},
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute, queue,
    style::Print,
    terminal::{
        self, disable_raw_mode, enable_raw_mode, Clear, ClearType, EnterAlternateScreen,
        LeaveAlternateScreen,
    },
};
use tracing::debug;

use crate::config::ViewerSettings;
use crate::errors::{SearchError, SearchResult};
use crate::results::ResultSet;

/// Lines used by the header and footer
const CHROME_LINES: u16 = 4;

/// Where an entry is opened
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewerTarget {
    TextViewer,
    DefaultHandler,
}

/// Opens result entries in an external program
#[derive(Debug, Clone)]
pub struct Viewer {
    text_command: String,
    text_extensions: Vec<String>,
}

impl Viewer {
    pub fn new(text_command: impl Into<String>, text_extensions: Vec<String>) -> Self {
        Self {
            text_command: text_command.into(),
            text_extensions: text_extensions
                .into_iter()
                .map(|e| e.trim_start_matches('.').to_lowercase())
                .collect(),
        }
    }

    pub fn from_settings(settings: &ViewerSettings) -> Self {
        Self::new(&settings.text_command, settings.text_extensions.clone())
    }

    pub fn target(&self, path: &Path) -> ViewerTarget {
        let is_text = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| self.text_extensions.iter().any(|t| t.eq_ignore_ascii_case(ext)));
        if is_text {
            ViewerTarget::TextViewer
        } else {
            ViewerTarget::DefaultHandler
        }
    }

    /// Launches the viewer for `path` without waiting for it to exit
    pub fn open(&self, path: &Path) -> SearchResult<()> {
        if !path.exists() {
            return Err(SearchError::open_failed(path, "no longer exists"));
        }

        match self.target(path) {
            ViewerTarget::TextViewer => {
                let mut parts = self.text_command.split_whitespace();
                let program = parts
                    .next()
                    .ok_or_else(|| SearchError::open_failed(path, "no text viewer configured"))?;
                Command::new(program)
                    .args(parts)
                    .arg(path)
                    .stdin(Stdio::null())
                    .stdout(Stdio::null())
                    .stderr(Stdio::null())
                    .spawn()
                    .map(drop)
                    .map_err(|e| SearchError::open_failed(path, format!("{}: {}", program, e)))
            }
            ViewerTarget::DefaultHandler => {
                opener::open(path).map_err(|e| SearchError::open_failed(path, e.to_string()))
            }
        }
    }
}

/// Actions available while browsing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrowserAction {
    Up,
    Down,
    Top,
    Bottom,
    Open,
    Quit,
    Unknown,
}

/// Convert a key event to a BrowserAction
pub fn convert_key_event(event: &KeyEvent) -> BrowserAction {
    match event.code {
        KeyCode::Char('c') if event.modifiers.contains(KeyModifiers::CONTROL) => {
            BrowserAction::Quit
        }
        KeyCode::Up | KeyCode::Char('k') => BrowserAction::Up,
        KeyCode::Down | KeyCode::Char('j') => BrowserAction::Down,
        KeyCode::Home | KeyCode::Char('g') => BrowserAction::Top,
        KeyCode::End | KeyCode::Char('G') => BrowserAction::Bottom,
        KeyCode::Enter | KeyCode::Char('o') => BrowserAction::Open,
        KeyCode::Esc | KeyCode::Char('q') | KeyCode::Char('Q') => BrowserAction::Quit,
        _ => BrowserAction::Unknown,
    }
}

/// `path` with the `root` prefix removed, or the full path if it lies elsewhere
pub fn relative_display(root: &Path, path: &Path) -> String {
    match path.strip_prefix(root) {
        Ok(rel) if !rel.as_os_str().is_empty() => rel.display().to_string(),
        _ => path.display().to_string(),
    }
}

/// First visible row so that `selected` stays inside a window of `height` rows
pub fn scroll_offset(offset: usize, selected: usize, height: usize) -> usize {
    let height = height.max(1);
    if selected < offset {
        selected
    } else if selected >= offset + height {
        selected + 1 - height
    } else {
        offset
    }
}

/// Lets the user pick results and open them, one after another
pub struct ResultBrowser<'a> {
    root: PathBuf,
    results: &'a ResultSet,
    viewer: Viewer,
    entries: Vec<String>,
}

impl<'a> ResultBrowser<'a> {
    pub fn new(root: &Path, results: &'a ResultSet, viewer: Viewer) -> Self {
        let entries = results
            .paths()
            .map(|p| relative_display(root, p))
            .collect();
        Self {
            root: root.to_path_buf(),
            results,
            viewer,
            entries,
        }
    }

    /// Relative paths in result order
    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    /// Writes the relative paths, one per line
    pub fn write_list<W: Write>(&self, out: &mut W) -> io::Result<()> {
        for entry in &self.entries {
            writeln!(out, "{}", entry)?;
        }
        Ok(())
    }

    /// Runs the interactive list, or prints it when stdout is not a terminal
    pub fn run(&self) -> SearchResult<()> {
        let mut stdout = io::stdout();
        if self.entries.is_empty() {
            println!("No matches found.");
            return Ok(());
        }
        if !stdout.is_terminal() {
            self.write_list(&mut stdout)?;
            return Ok(());
        }

        let _guard = TerminalGuard::enter()?;
        let mut selected = 0;
        let mut offset = 0;

        loop {
            let (_, rows) = terminal::size()?;
            let height = rows.saturating_sub(CHROME_LINES).max(1) as usize;
            offset = scroll_offset(offset, selected, height);
            self.draw(&mut stdout, selected, offset, height)?;

            match read_key_input()? {
                BrowserAction::Up => selected = selected.saturating_sub(1),
                BrowserAction::Down => selected = (selected + 1).min(self.entries.len() - 1),
                BrowserAction::Top => selected = 0,
                BrowserAction::Bottom => selected = self.entries.len() - 1,
                BrowserAction::Open => self.open(selected),
                BrowserAction::Quit => break,
                BrowserAction::Unknown => {}
            }
        }
        Ok(())
    }

    fn open(&self, index: usize) {
        let Some(hit) = self.results.iter().nth(index) else {
            return;
        };
        match self.viewer.open(&hit.path) {
            Ok(()) => debug!("Opened {}", hit.path.display()),
            Err(e) => debug!("{}", e),
        }
    }

    fn draw<W: Write>(
        &self,
        out: &mut W,
        selected: usize,
        offset: usize,
        height: usize,
    ) -> io::Result<()> {
        queue!(out, Clear(ClearType::All), MoveTo(0, 0))?;
        let header = format!(
            "{} results in {}",
            self.entries.len(),
            self.root.display()
        );
        queue!(out, Print(header.bold()), Print("\r\n\r\n"))?;

        for (i, entry) in self.entries.iter().enumerate().skip(offset).take(height) {
            let line = if i == selected {
                format!("> {}", entry).reversed().to_string()
            } else {
                format!("  {}", entry)
            };
            queue!(out, Print(line), Print("\r\n"))?;
        }

        let help = "↑/↓ or k/j: move, Enter/o: open, q/Esc: quit";
        queue!(out, Print("\r\n"), Print(help.dimmed()))?;
        out.flush()
    }
}

/// Raw mode and the alternate screen, restored on drop
struct TerminalGuard;

impl TerminalGuard {
    fn enter() -> io::Result<Self> {
        enable_raw_mode()?;
        if let Err(e) = execute!(io::stdout(), EnterAlternateScreen, Hide) {
            let _ = disable_raw_mode();
            return Err(e);
        }
        Ok(Self)
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        let _ = execute!(io::stdout(), Show, LeaveAlternateScreen);
        let _ = disable_raw_mode();
    }
}

/// Read exactly one key press and discard any extras
/// so a held key doesn't skip several entries at once
fn read_key_input() -> SearchResult<BrowserAction> {
    loop {
        if let Event::Key(key) = event::read()? {
            if key.kind != KeyEventKind::Press {
                continue;
            }
            let action = convert_key_event(&key);
            discard_extra_events()?;
            return Ok(action);
        }
    }
}

/// Discard all events in the queue for a short moment
fn discard_extra_events() -> SearchResult<()> {
    let t0 = Instant::now();
    let max_duration = Duration::from_millis(30);

    while t0.elapsed() < max_duration {
        if event::poll(Duration::from_millis(1))? {
            let _ = event::read();
        } else {
            break;
        }
    }
    Ok(())
}
