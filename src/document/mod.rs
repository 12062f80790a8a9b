//! Record-to-BSON serialization.
//!
//! A [`ValuePairsWalker`] turns a flat [`LogRecord`](crate::domain::LogRecord)
//! into start-group / scalar / end-group events and a [`FieldVisitor`]
//! consumes them. [`DocumentBuilder`] is the visitor that produces the BSON
//! document for one record, casting each scalar through [`coerce`].

pub mod builder;
pub mod coerce;
pub mod transform;
pub mod walker;

pub use builder::DocumentBuilder;
pub use coerce::{CoercionError, coerce};
pub use transform::{KeyTransform, KeyTransforms, ReplacePrefix};
pub use walker::{FieldSelection, ValuePairsWalker};

use crate::domain::TypeHint;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DocumentError {
    #[error("Field '{field}' rejected: {source}")]
    Coercion {
        field: String,
        #[source]
        source: CoercionError,
    },
    #[error("Group '{0}' closed without being opened")]
    UnbalancedGroup(String),
    #[error("{0} group(s) still open at the end of the record")]
    UnclosedGroups(usize),
    #[error("Field '{0}' appears more than once at the same level")]
    DuplicateField(String),
}

/// Receiver of a depth-first walk over a record's fields.
///
/// Groups are strictly nested: every `group_start` is matched by a
/// `group_end` with the same name before its parent closes. Returning an
/// error from any callback stops the walk.
pub trait FieldVisitor {
    fn group_start(&mut self, name: &str) -> Result<(), DocumentError>;

    fn scalar(&mut self, name: &str, type_hint: TypeHint, value: &str)
    -> Result<(), DocumentError>;

    fn group_end(&mut self, name: &str) -> Result<(), DocumentError>;
}
