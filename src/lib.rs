#![deny(rust_2024_compatibility)]
// Specific pedantic lints enforced (not blanket allow):
#![deny(
    clippy::explicit_iter_loop,
    clippy::manual_let_else,
    clippy::semicolon_if_nothing_returned,
    clippy::inconsistent_struct_constructor
)]
// Noisy pedantic lints suppressed:
#![allow(
    clippy::cast_lossless,
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss,
    clippy::cast_sign_loss,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::doc_markdown
)]

pub mod app;
pub mod document;
pub mod domain;
pub mod reliability;
pub mod store;
pub mod worker;

pub use app::{App, Config};
pub use domain::{LogRecord, OnErrorPolicy, TypeHint, WriterError};
pub use worker::{Destination, DestinationSettings};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
