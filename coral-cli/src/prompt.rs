use std::io;
use std::process::{Command, Stdio};

use clap::ValueEnum;

/// Asks the user for a query
pub trait QueryPrompt {
    /// Returns the entered text, or `None` when the user cancelled or entered nothing
    fn ask(&self, message: &str) -> io::Result<Option<String>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum PromptKind {
    /// Read the query on the terminal
    Terminal,
    /// Show a zenity entry dialog
    Zenity,
}

impl PromptKind {
    pub fn prompt(self) -> Box<dyn QueryPrompt> {
        match self {
            PromptKind::Terminal => Box::new(TerminalPrompt),
            PromptKind::Zenity => Box::new(ZenityPrompt::default()),
        }
    }
}

pub struct TerminalPrompt;

impl QueryPrompt for TerminalPrompt {
    fn ask(&self, message: &str) -> io::Result<Option<String>> {
        let input = dialoguer::Input::<String>::new()
            .with_prompt(message)
            .allow_empty(true)
            .interact_text();
        terminal_answer(input)
    }
}

/// Ctrl-C at the terminal prompt surfaces as an interrupted read
fn terminal_answer(input: Result<String, dialoguer::Error>) -> io::Result<Option<String>> {
    match input {
        Ok(text) => Ok(non_empty(text)),
        Err(dialoguer::Error::IO(err)) if err.kind() == io::ErrorKind::Interrupted => Ok(None),
        Err(dialoguer::Error::IO(err)) => Err(err),
    }
}

/// `zenity --entry`; closing the dialog or pressing Cancel exits non-zero
pub struct ZenityPrompt {
    program: String,
    title: String,
}

impl Default for ZenityPrompt {
    fn default() -> Self {
        Self {
            program: "zenity".to_string(),
            title: "Search Files".to_string(),
        }
    }
}

impl QueryPrompt for ZenityPrompt {
    fn ask(&self, message: &str) -> io::Result<Option<String>> {
        let output = Command::new(&self.program)
            .arg("--entry")
            .arg(format!("--title={}", self.title))
            .arg(format!("--text={}", message))
            .arg("--modal")
            .arg("--width=600")
            .stdin(Stdio::null())
            .stderr(Stdio::null())
            .output()?;

        if !output.status.success() {
            return Ok(None);
        }
        Ok(non_empty(String::from_utf8_lossy(&output.stdout).into_owned()))
    }
}

fn non_empty(text: String) -> Option<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
