//! Interactive session shell.
//!
//! Reads one command per line from stdin and drives a [`Session`]. Caption
//! requests run as spawned tokio tasks; their results come back over an mpsc
//! channel, so the shell keeps reading commands (`reset`, `open`, `status`)
//! while a request is pending. The meme preview is re-rendered whenever the
//! image or caption changes.
//!
//! ```text
//! oogiri> open cat.png
//! State: idle
//! Image: cat.png (image/png, 1000x800)
//! ...
//! oogiri> generate
//! oogiri> save
//! Saved ./oogiri_meme_1700000000000.png (1000x800)
//! ```

use crate::caption::{CaptionError, CaptionSource};
use crate::compose::{CaptionStyle, RenderedArtifact, Typesetter, render_artifact};
use crate::config::OutputConfig;
use crate::ingest::SourceImage;
use crate::output;
use crate::session::{GenerationTicket, Resolution, Session};
use image::DynamicImage;
use std::io::{IsTerminal, Write};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// A parsed shell command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Open(Vec<PathBuf>),
    Paste(String),
    Model(Option<String>),
    /// `generate`, `regenerate` and `retry` are the same request.
    Generate,
    Reset,
    Save(Option<PathBuf>),
    Status,
    Help,
    Quit,
    Empty,
}

/// Parse one input line. Errors are user-facing messages.
pub fn parse_command(line: &str) -> Result<Command, String> {
    let line = line.trim();
    let (word, rest) = match line.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (line, ""),
    };
    let command = match word {
        "" => Command::Empty,
        "open" | "o" => {
            let paths: Vec<PathBuf> = rest.split_whitespace().map(PathBuf::from).collect();
            if paths.is_empty() {
                return Err("usage: open <path>...".to_string());
            }
            Command::Open(paths)
        }
        "paste" | "p" => {
            if rest.is_empty() {
                return Err("usage: paste <data-uri>".to_string());
            }
            Command::Paste(rest.to_string())
        }
        "model" | "m" => Command::Model((!rest.is_empty()).then(|| rest.to_string())),
        "generate" | "regenerate" | "retry" | "g" => Command::Generate,
        "reset" => Command::Reset,
        "save" | "s" => Command::Save((!rest.is_empty()).then(|| PathBuf::from(rest))),
        "status" => Command::Status,
        "help" | "?" => Command::Help,
        "quit" | "exit" | "q" => Command::Quit,
        other => return Err(format!("unknown command: {other} (try 'help')")),
    };
    Ok(command)
}

/// Whether the loop should keep going after a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

type Outcome = (u64, Result<String, CaptionError>);

pub struct Shell {
    session: Session,
    source: Arc<dyn CaptionSource>,
    typesetter: Arc<dyn Typesetter + Send + Sync>,
    style: CaptionStyle,
    output: OutputConfig,
    decoded: Option<DynamicImage>,
    preview: Option<RenderedArtifact>,
    results_tx: mpsc::UnboundedSender<Outcome>,
    results_rx: mpsc::UnboundedReceiver<Outcome>,
}

impl Shell {
    pub fn new(
        session: Session,
        source: Arc<dyn CaptionSource>,
        typesetter: Arc<dyn Typesetter + Send + Sync>,
        style: CaptionStyle,
        output: OutputConfig,
    ) -> Self {
        let (results_tx, results_rx) = mpsc::unbounded_channel();
        Self {
            session,
            source,
            typesetter,
            style,
            output,
            decoded: None,
            preview: None,
            results_tx,
            results_rx,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn preview(&self) -> Option<&RenderedArtifact> {
        self.preview.as_ref()
    }

    /// Run on stdin until `quit` or end of input.
    pub async fn run(mut self, initial: &[PathBuf]) -> std::io::Result<()> {
        let interactive = std::io::stdin().is_terminal();
        self.run_lines(initial, BufReader::new(tokio::io::stdin()), interactive)
            .await
    }

    /// Run on any line source. With `prompt`, `oogiri> ` is printed before
    /// each read.
    ///
    /// At end of input a pending request is awaited and reported before
    /// returning; `quit` returns immediately.
    pub async fn run_lines<R>(
        &mut self,
        initial: &[PathBuf],
        input: R,
        prompt: bool,
    ) -> std::io::Result<()>
    where
        R: AsyncBufRead + Unpin,
    {
        if !initial.is_empty() {
            self.execute(Command::Open(initial.to_vec()));
        } else {
            output::print_status(&self.session, None);
        }

        let mut lines = input.lines();

        loop {
            if prompt {
                print!("oogiri> ");
                std::io::stdout().flush()?;
            }
            tokio::select! {
                line = lines.next_line() => {
                    let Some(line) = line? else {
                        self.finish_pending().await;
                        break;
                    };
                    let flow = match parse_command(&line) {
                        Ok(command) => self.execute(command),
                        Err(message) => {
                            println!("{}", message);
                            Flow::Continue
                        }
                    };
                    if flow == Flow::Quit {
                        break;
                    }
                }
                Some((epoch, result)) = self.results_rx.recv() => {
                    if prompt {
                        println!();
                    }
                    self.on_resolved(epoch, result);
                }
            }
        }
        Ok(())
    }

    /// Wait out the in-flight request, skipping stale results on the way.
    async fn finish_pending(&mut self) {
        while self.session.is_generating() {
            debug!("end of input with a caption request pending; waiting for it");
            match self.results_rx.recv().await {
                Some((epoch, result)) => self.on_resolved(epoch, result),
                None => break,
            }
        }
    }

    /// Apply one command. Must be called within a tokio runtime.
    pub fn execute(&mut self, command: Command) -> Flow {
        match command {
            Command::Empty => {}
            Command::Open(paths) => match SourceImage::first_of(&paths) {
                Ok(Some(image)) => self.capture(image),
                Ok(None) => println!("usage: open <path>..."),
                Err(e) => println!("Error: {}", e),
            },
            Command::Paste(uri) => match SourceImage::from_data_uri(&uri) {
                Ok(image) => self.capture(image),
                Err(e) => println!("Error: {}", e),
            },
            Command::Model(None) => output::print_models(self.session.model()),
            Command::Model(Some(id)) => match self.session.select_model(&id) {
                Ok(()) => output::print_status(&self.session, self.preview.as_ref()),
                Err(e) => println!("Error: {}", e),
            },
            Command::Generate => match self.session.begin_generation() {
                Ok(ticket) => {
                    self.spawn_generation(ticket);
                    output::print_status(&self.session, self.preview.as_ref());
                }
                Err(e) => println!("{}", e),
            },
            Command::Reset => {
                self.session.reset();
                self.decoded = None;
                self.preview = None;
                output::print_status(&self.session, None);
            }
            Command::Save(path) => self.save(path),
            Command::Status => output::print_status(&self.session, self.preview.as_ref()),
            Command::Help => output::print_help(),
            Command::Quit => return Flow::Quit,
        }
        Flow::Continue
    }

    /// Hand a finished request back to the session.
    pub fn on_resolved(&mut self, epoch: u64, result: Result<String, CaptionError>) {
        if self.session.resolve(epoch, result) == Resolution::Applied {
            self.refresh_preview();
            output::print_status(&self.session, self.preview.as_ref());
        }
    }

    /// Decode up front so a broken file never becomes the session image.
    fn capture(&mut self, image: SourceImage) {
        match image.decode() {
            Ok(decoded) => {
                self.session.capture(image);
                self.decoded = Some(decoded);
                self.refresh_preview();
                output::print_status(&self.session, self.preview.as_ref());
            }
            Err(e) => println!("Error: {}", e),
        }
    }

    fn spawn_generation(&self, ticket: GenerationTicket) {
        let source = Arc::clone(&self.source);
        let tx = self.results_tx.clone();
        debug!(epoch = ticket.epoch, model = %ticket.model, "spawning caption request");
        tokio::spawn(async move {
            let result = source
                .generate_caption(ticket.image.bytes(), ticket.image.mime_type(), &ticket.model)
                .await;
            // The receiver lives as long as the shell.
            let _ = tx.send((ticket.epoch, result));
        });
    }

    /// Re-render the current image with the current caption.
    fn refresh_preview(&mut self) {
        self.preview = self.decoded.as_ref().and_then(|decoded| {
            let caption = self.session.caption().unwrap_or("");
            render_artifact(self.typesetter.as_ref(), decoded, caption, &self.style)
                .map_err(|e| warn!("preview render failed: {e}"))
                .ok()
        });
    }

    fn save(&self, path: Option<PathBuf>) {
        let Some(artifact) = &self.preview else {
            println!("Nothing to save. Open or paste an image first.");
            return;
        };
        let path = path.unwrap_or_else(|| {
            self.output
                .export_path(chrono::Utc::now().timestamp_millis())
        });
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            if let Err(e) = std::fs::create_dir_all(parent) {
                println!("Error: {}", e);
                return;
            }
        }
        match artifact.save(&path) {
            Ok(()) => output::print_export(&path, artifact, self.session.caption().unwrap_or("")),
            Err(e) => println!("Error: {}", e),
        }
    }
}
