//! Interactive prompt loop
//!
//! Reads lines from stdin, streams plain text through the controller and
//! dispatches slash commands. Ctrl-C cancels whatever is in flight; at the
//! prompt it exits.

use std::future::Future;
use std::io::{self, Write};
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::signal::unix::{signal, Signal, SignalKind};
use tracing::{debug, info, warn};

use coach_core::{CoachBackend, CoachError, HttpBackend, SessionOutcome, StreamController};

use crate::commands::{self, Command, GUIDES_TOP_K, HELP};
use crate::render::{Render, StreamRenderer};

/// Controller over the real coach API
pub type Controller = StreamController<HttpBackend>;

/// Terminal writer that knows whether a reply line is still open
///
/// The first write error closes it; later output is dropped so a closed
/// pipe ends the reply instead of failing every chunk.
struct Terminal<W: Write = io::Stdout> {
    out: W,
    line_open: bool,
    closed: bool,
}

impl Terminal {
    fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write> Terminal<W> {
    fn new(out: W) -> Self {
        Self {
            out,
            line_open: false,
            closed: false,
        }
    }

    fn is_closed(&self) -> bool {
        self.closed
    }

    fn emit(&mut self, renders: Vec<Render>) -> io::Result<()> {
        if self.closed {
            return Ok(());
        }
        let result = self.write_renders(renders);
        if result.is_err() {
            self.closed = true;
        }
        result
    }

    fn end_reply(&mut self) -> io::Result<()> {
        if self.closed {
            return Ok(());
        }
        let result = self.close_line().and_then(|()| self.out.flush());
        if result.is_err() {
            self.closed = true;
        }
        result
    }

    fn write_renders(&mut self, renders: Vec<Render>) -> io::Result<()> {
        for render in renders {
            match render {
                Render::Status(status) => {
                    self.close_line()?;
                    writeln!(self.out, "[{status}]")?;
                }
                Render::Append(text) => {
                    self.line_open = true;
                    write!(self.out, "{text}")?;
                }
                Render::Restart(text) => {
                    self.close_line()?;
                    self.line_open = true;
                    write!(self.out, "{text}")?;
                }
                Render::Note(note) => {
                    self.close_line()?;
                    writeln!(self.out, "{note}")?;
                }
            }
        }
        self.out.flush()
    }

    fn close_line(&mut self) -> io::Result<()> {
        if self.line_open {
            self.line_open = false;
            writeln!(self.out)?;
        }
        Ok(())
    }
}

/// The interactive session
pub struct Repl {
    controller: Arc<Controller>,
    interrupt: Signal,
    terminal: Terminal,
}

impl Repl {
    /// Create the prompt loop and install the Ctrl-C handler
    pub fn new(controller: Arc<Controller>) -> Result<Self> {
        let interrupt =
            signal(SignalKind::interrupt()).context("Failed to install SIGINT handler")?;
        Ok(Self {
            controller,
            interrupt,
            terminal: Terminal::stdout(),
        })
    }

    /// Stream a single message and return
    pub async fn send_once(&mut self, message: &str) -> Result<()> {
        let controller = Arc::clone(&self.controller);
        let outcome = self.drive(controller.send(message)).await?;
        if self.terminal.is_closed() {
            info!("Output closed before the reply finished");
            return Ok(());
        }
        if let SessionOutcome::TransportFailed(_) = outcome {
            anyhow::bail!("request to {} failed", controller.backend().base_url());
        }
        Ok(())
    }

    /// Run until `/quit`, end of input or Ctrl-C at the prompt
    pub async fn run(&mut self) -> Result<()> {
        println!(
            "Career coach at {} (/help for commands)",
            self.controller.backend().base_url()
        );
        let mut lines = BufReader::new(tokio::io::stdin()).lines();

        loop {
            print!("> ");
            let _ = std::io::stdout().flush();

            let line = tokio::select! {
                line = lines.next_line() => line.context("Failed to read input")?,
                _ = self.interrupt.recv() => {
                    println!();
                    info!("Interrupted at prompt");
                    return Ok(());
                }
            };
            let Some(line) = line else {
                println!();
                return Ok(());
            };

            match commands::parse(&line) {
                Ok(None) => {}
                Ok(Some(Command::Quit)) => return Ok(()),
                Ok(Some(command)) => {
                    if let Err(e) = self.execute(command).await {
                        let _ = self.terminal.end_reply();
                        eprintln!("error: {e:#}");
                    }
                }
                Err(e) => eprintln!("{e}"),
            }
        }
    }

    async fn execute(&mut self, command: Command) -> Result<()> {
        let controller = Arc::clone(&self.controller);
        let backend = controller.backend();

        match command {
            Command::Stream(message) => {
                self.drive(controller.send(&message)).await?;
            }
            Command::Chat(message) => {
                self.drive(controller.send_turn_based(&message)).await?;
            }
            Command::Resume(path) => {
                let text = tokio::fs::read_to_string(&path)
                    .await
                    .with_context(|| format!("Failed to read {}", path.display()))?;
                if let Some(analysis) = self.interruptible(backend.analyze_resume(&text)).await? {
                    println!(
                        "Resume feedback ({}, {} characters):",
                        analysis.analysis_type.as_deref().unwrap_or("unknown"),
                        analysis.resume_length.unwrap_or(text.chars().count() as u64)
                    );
                    println!("{}", analysis.feedback.to_text());
                }
            }
            Command::Interview(position) => {
                if let Some(questions) = self.interruptible(backend.mock_interview(&position)).await? {
                    println!(
                        "Interview questions for {}:",
                        questions.position.as_deref().unwrap_or(&position)
                    );
                    println!("{}", questions.questions.to_text());
                }
            }
            Command::Guides(query) => {
                if let Some(guides) = self
                    .interruptible(backend.featured_guides(&query, GUIDES_TOP_K))
                    .await?
                {
                    println!("{}", guides.tips.to_text());
                    if !guides.sources.is_empty() {
                        println!("Sources: {}", guides.sources.join(", "));
                    }
                }
            }
            Command::Format(format) => {
                controller.set_format_preference(format);
                println!("Reply format: {format}");
            }
            Command::Tools(enabled) => {
                controller.set_auto_tool_selection(enabled);
                println!(
                    "Automatic tool selection {}",
                    if enabled { "on" } else { "off" }
                );
            }
            Command::Clear => {
                controller.clear();
                println!("Conversation cleared.");
            }
            Command::Health => {
                if let Some(health) = self.interruptible(backend.health()).await? {
                    println!(
                        "Server: {} (language model {})",
                        health.status,
                        if health.llm_available { "available" } else { "unavailable" }
                    );
                }
            }
            Command::Help => println!("{HELP}"),
            Command::Quit => {}
        }

        Ok(())
    }

    /// Run a session to completion, rendering snapshots as they arrive
    async fn drive<F>(&mut self, session: F) -> Result<SessionOutcome>
    where
        F: Future<Output = Result<SessionOutcome, CoachError>>,
    {
        let mut updates = self.controller.subscribe();
        let mut renderer = StreamRenderer::new();
        tokio::pin!(session);

        let outcome = loop {
            tokio::select! {
                outcome = &mut session => break outcome?,
                changed = updates.changed() => {
                    if changed.is_ok() {
                        let snapshot = updates.borrow_and_update().clone();
                        let result = self.terminal.emit(renderer.observe(&snapshot));
                        self.check_output(result);
                    }
                }
                _ = self.interrupt.recv() => {
                    debug!("Ctrl-C during reply");
                    self.controller.cancel();
                }
            }
        };

        let mut closing = renderer.finish(&outcome);
        if let Some(turn) = outcome.turn() {
            if !turn.tools_used.is_empty() {
                closing.push(Render::Note(format!("  tools: {}", turn.tools_used.join(", "))));
            }
        }
        let result = self.terminal.emit(closing);
        self.check_output(result);
        let result = self.terminal.end_reply();
        self.check_output(result);

        Ok(outcome)
    }

    /// Cancel the reply once the terminal can no longer be written
    fn check_output(&mut self, result: io::Result<()>) {
        if let Err(e) = result {
            if e.kind() == io::ErrorKind::BrokenPipe {
                debug!("Output closed; cancelling reply");
            } else {
                warn!(error = %e, "Failed to write reply; cancelling");
            }
            self.controller.cancel();
        }
    }

    /// Await a collaborator call unless Ctrl-C comes first
    async fn interruptible<T, F>(&mut self, call: F) -> Result<Option<T>>
    where
        F: Future<Output = Result<T>>,
    {
        tokio::select! {
            result = call => result.map(Some),
            _ = self.interrupt.recv() => {
                println!("(cancelled)");
                Ok(None)
            }
        }
    }
}
