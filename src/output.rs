//! CLI output formatting for the session shell and one-shot commands.
//!
//! # Output Format
//!
//! ## Status
//!
//! ```text
//! State: success
//! Image: cat.png (image/png, 1000x800)
//! Model: Gemini 3.0 Pro (gemini-3-pro-preview)
//! Caption: 猫也想上班
//!     Font: 64px, outline 16px
//! Controls: regenerate | reset
//! ```
//!
//! Failed generations show the error message verbatim on an `Error:` line.
//!
//! ## Models
//!
//! ```text
//! gemini-3-pro-preview  Gemini 3.0 Pro (default)
//! gemini-2.5-pro        Gemini 2.5 Pro
//! ```
//!
//! # Architecture
//!
//! Each view has a `format_*` function (returns `Vec<String>`) for testability
//! and a `print_*` wrapper that writes to stdout. Format functions are pure:
//! no I/O, no side effects.

use crate::caption::{MODELS, find_model};
use crate::compose::{CaptionLayout, RenderedArtifact};
use crate::session::{Control, Session, SessionState};
use std::path::Path;

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

/// Display name with identifier, falling back to the bare identifier.
fn model_label(id: &str) -> String {
    match find_model(id) {
        Some(m) => format!("{} ({})", m.name, m.id),
        None => id.to_string(),
    }
}

fn control_name(control: Control) -> &'static str {
    match control {
        Control::Generate => "generate",
        Control::Regenerate => "regenerate",
        Control::Retry => "retry",
        Control::Reset => "reset",
    }
}

/// Font line for a fitted caption.
///
/// ```text
/// Font: 64px, outline 16px
/// Font: 10px (scaled from 40px), outline 2.5px
/// ```
fn layout_line(layout: &CaptionLayout) -> String {
    let size = if layout.was_scaled() {
        format!("{}px (scaled from {}px)", layout.font_px, layout.baseline_px)
    } else {
        format!("{}px", layout.font_px)
    };
    format!("Font: {}, outline {}px", size, layout.stroke_width)
}

// ============================================================================
// Session status
// ============================================================================

/// Controls offered for the current state, e.g. `Controls: retry | reset`.
pub fn format_controls(controls: &[Control]) -> String {
    let names: Vec<&str> = controls.iter().map(|c| control_name(*c)).collect();
    format!("Controls: {}", names.join(" | "))
}

/// Format the whole session view, using the current render if there is one.
pub fn format_status(session: &Session, preview: Option<&RenderedArtifact>) -> Vec<String> {
    let mut lines = vec![format!("State: {}", session.state().label())];

    match (session.image(), preview) {
        (Some(image), Some(render)) => lines.push(format!(
            "Image: {} ({}, {}x{})",
            image.label(),
            image.mime_type(),
            render.image.width(),
            render.image.height()
        )),
        (Some(image), None) => lines.push(format!(
            "Image: {} ({})",
            image.label(),
            image.mime_type()
        )),
        (None, _) => lines.push("Image: none (open a file or paste a data URI)".to_string()),
    }

    lines.push(format!("Model: {}", model_label(session.model())));

    match session.state() {
        SessionState::Generating => lines.push("Caption: generating...".to_string()),
        SessionState::Success { caption } => {
            lines.push(format!("Caption: {}", caption));
            if let Some(layout) = preview.and_then(|p| p.layout.as_ref()) {
                lines.push(format!("{}{}", indent(1), layout_line(layout)));
            }
        }
        SessionState::Error { message } => lines.push(format!("Error: {}", message)),
        SessionState::Idle => {}
    }

    lines.push(format_controls(&session.controls()));
    lines
}

/// Print the session view to stdout.
pub fn print_status(session: &Session, preview: Option<&RenderedArtifact>) {
    for line in format_status(session, preview) {
        println!("{}", line);
    }
}

// ============================================================================
// Models
// ============================================================================

/// List the selectable models, marking `default_id`.
pub fn format_models(default_id: &str) -> Vec<String> {
    let width = MODELS.iter().map(|m| m.id.len()).max().unwrap_or(0);
    MODELS
        .iter()
        .map(|m| {
            let marker = if m.id == default_id { " (default)" } else { "" };
            format!("{:<width$}  {}{}", m.id, m.name, marker, width = width)
        })
        .collect()
}

pub fn print_models(default_id: &str) {
    for line in format_models(default_id) {
        println!("{}", line);
    }
}

// ============================================================================
// Export
// ============================================================================

/// Confirmation after writing a PNG.
///
/// ```text
/// Saved oogiri_meme_1700000000000.png (1000x800)
///     Caption: 猫也想上班
///     Font: 64px, outline 16px
/// ```
pub fn format_export(path: &Path, artifact: &RenderedArtifact, caption: &str) -> Vec<String> {
    let mut lines = vec![format!(
        "Saved {} ({}x{})",
        path.display(),
        artifact.image.width(),
        artifact.image.height()
    )];
    if caption.is_empty() {
        lines.push(format!("{}No caption", indent(1)));
    } else {
        lines.push(format!("{}Caption: {}", indent(1), caption));
        match &artifact.layout {
            Some(layout) => lines.push(format!("{}{}", indent(1), layout_line(layout))),
            None => lines.push(format!("{}Caption not drawn (no usable font)", indent(1))),
        }
    }
    lines
}

pub fn print_export(path: &Path, artifact: &RenderedArtifact, caption: &str) {
    for line in format_export(path, artifact, caption) {
        println!("{}", line);
    }
}

// ============================================================================
// Shell help
// ============================================================================

pub fn format_help() -> Vec<String> {
    [
        ("open <path>...", "Load an image (first path wins)"),
        ("paste <data-uri>", "Load a data:image/...;base64 URI"),
        ("model [id]", "Show or switch the caption model"),
        ("generate", "Ask for a caption (also: regenerate, retry)"),
        ("reset", "Discard image and caption"),
        ("save [path]", "Write the current meme as PNG"),
        ("status", "Show the session"),
        ("help", "Show this help"),
        ("quit", "Leave the session"),
    ]
    .iter()
    .map(|(cmd, what)| format!("{}{:<18}{}", indent(1), cmd, what))
    .collect()
}

pub fn print_help() {
    println!("Commands:");
    for line in format_help() {
        println!("{}", line);
    }
}
