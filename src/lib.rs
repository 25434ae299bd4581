//! # Oogiri
//!
//! Turns an image into a meme: a multimodal model invents one absurd
//! "boke" line for the picture (the punchline role in Oogiri, the Japanese
//! improv format of witty answers to a prompt), and the line is burned into
//! the bottom of the image in classic meme styling.
//!
//! # Flow
//!
//! ```text
//! file / stdin / data URI ──▶ SourceImage ──▶ Session ──generate──▶ CaptionSource
//!                                               │                      │
//!                                               ◀──── caption/error ───┘
//!                                               ▼
//!                                   compose: fit + outline + fill ──▶ PNG
//! ```
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`compose`] | Caption fitting and meme-text rendering onto a copy of the image |
//! | [`caption`] | [`caption::CaptionSource`] trait and the Gemini adapter |
//! | [`ingest`] | Files, stdin, dropped path lists and data URIs → [`ingest::SourceImage`] |
//! | [`session`] | Idle / Generating / Success / Error state machine with stale-result protection |
//! | [`shell`] | Interactive command loop around a session |
//! | [`config`] | `oogiri.toml` loading, merging over stock defaults, validation |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Fit by Shrinking, Never Wrapping
//!
//! A caption is always one line. It starts at 8% of the image height and is
//! only ever scaled down, to 90% of the width with a 5% safety margin. Long
//! answers get small rather than broken across lines; the prompt asks for at
//! most ten words so this stays rare.
//!
//! ## Measure With What You Draw
//!
//! Fitting and drawing go through the same [`compose::Typesetter`]. A bold
//! DejaVu face is compiled into the binary and chained behind the configured
//! font, so a caption is always drawn even on a host with no usable font
//! files; a warning is logged when it stands alone.
//!
//! ## Stale Results Are Dropped, Not Cancelled
//!
//! Caption requests are not cancellable. Instead every image change, reset
//! and new request advances the session epoch, and a result carrying an old
//! epoch is ignored. See [`session`].

pub mod caption;
pub mod compose;
pub mod config;
pub mod ingest;
pub mod output;
pub mod session;
pub mod shell;
