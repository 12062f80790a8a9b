//! Domain layer for rask-mongo-writer.
//!
//! Contains the canonical types shared across all modules:
//! - `LogRecord`: the unit of delivery, an ordered list of typed fields
//! - `TypeHint`: how a field's text is cast before it is stored
//! - `OnErrorPolicy`: what happens when a cast fails
//! - `WriterError`: Top-level error type

pub mod error;
pub mod on_error;
pub mod record;

pub use error::WriterError;
pub use on_error::{CastFailureAction, OnErrorPolicy, PolicyParseError};
pub use record::{Field, LogRecord, RenderedFields, TypeHint, TypeHintParseError};
