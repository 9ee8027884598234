use anyhow::Result;
use crossterm::{
    execute,
    style::{Color, Print, ResetColor, SetForegroundColor},
};
use std::io::{self, Write};

use vista_chat::{AttemptRecord, Reply, ReplySource};

struct Colors;

impl Colors {
    const USER_PROMPT: Color = Color::Green;
    const ASSISTANT_TEXT: Color = Color::Cyan;
    const CHART: Color = Color::Yellow;
    const ERROR: Color = Color::Red;
    const DIM: Color = Color::DarkGrey;
    const HEADER: Color = Color::Magenta;
}

/// Terminal I/O for the chat REPL.
pub struct Terminal;

impl Terminal {
    pub fn print_banner(&self, branches: usize, backends: &[String]) -> Result<()> {
        let mut stdout = io::stdout();
        let backends = if backends.is_empty() {
            "none (local answers)".to_string()
        } else {
            backends.join(" > ")
        };
        execute!(
            stdout,
            SetForegroundColor(Colors::HEADER),
            Print("vista chat"),
            ResetColor,
            Print(format!(" - {branches} branches loaded\n")),
            SetForegroundColor(Colors::DIM),
            Print(format!("Backends: {backends}\n")),
            Print("Ask about NPA, CASA, targets, zones or a branch. Type 'exit' to end.\n"),
            Print("---\n"),
            ResetColor,
        )?;
        stdout.flush()?;
        Ok(())
    }

    /// Read a line of user input. `None` when the user wants to leave.
    pub fn read_input(&self) -> Result<Option<String>> {
        let mut stdout = io::stdout();
        execute!(
            stdout,
            Print("\n"),
            SetForegroundColor(Colors::USER_PROMPT),
            Print("you> "),
            ResetColor,
        )?;
        stdout.flush()?;

        let mut input = String::new();
        if io::stdin().read_line(&mut input)? == 0 {
            return Ok(None);
        }
        let trimmed = input.trim();
        if matches!(trimmed, "exit" | "quit" | "/exit" | "/quit") {
            return Ok(None);
        }
        Ok(Some(trimmed.to_string()))
    }

    pub fn print_reply(&self, reply: &Reply, source: &ReplySource, attempts: &[AttemptRecord]) -> Result<()> {
        let mut stdout = io::stdout();
        execute!(
            stdout,
            SetForegroundColor(Colors::ASSISTANT_TEXT),
            Print(&reply.text),
            Print("\n"),
            ResetColor,
        )?;
        if let Some(chart) = &reply.chart {
            execute!(
                stdout,
                SetForegroundColor(Colors::CHART),
                Print(format!("[chart: {} ({} categories)]\n", chart.title, chart.categories.len())),
                ResetColor,
            )?;
        }

        let source = match source {
            ReplySource::Backend(name) => name.as_str(),
            ReplySource::Local => "local",
        };
        let trail: Vec<String> = attempts
            .iter()
            .map(|a| format!("{}:{:?}:{}ms", a.backend, a.outcome, a.elapsed_ms))
            .collect();
        execute!(
            stdout,
            SetForegroundColor(Colors::DIM),
            Print(format!("[{source}] {}\n", trail.join(" "))),
            ResetColor,
        )?;
        stdout.flush()?;
        Ok(())
    }

    pub fn print_info(&self, msg: &str) -> Result<()> {
        let mut stdout = io::stdout();
        execute!(stdout, SetForegroundColor(Colors::DIM), Print(msg), Print("\n"), ResetColor)?;
        Ok(())
    }

    pub fn print_error(&self, msg: &str) -> Result<()> {
        let mut stderr = io::stderr();
        execute!(
            stderr,
            SetForegroundColor(Colors::ERROR),
            Print(format!("Error: {msg}\n")),
            ResetColor,
        )?;
        Ok(())
    }
}
