use super::walker::ValuePairsWalker;
use super::{DocumentError, FieldVisitor, coerce};
use crate::domain::{CastFailureAction, LogRecord, OnErrorPolicy, TypeHint};
use bson::{Bson, Document};
use tracing::error;

/// Accumulates one record's document from walker events.
///
/// The root document and the stack of open groups are owned by the builder
/// and cleared, not reallocated, between records.
#[derive(Debug)]
pub struct DocumentBuilder {
    root: Document,
    open: Vec<(String, Document)>,
    policy: OnErrorPolicy,
}

impl DocumentBuilder {
    pub fn new(policy: OnErrorPolicy) -> Self {
        Self {
            root: Document::new(),
            open: Vec::with_capacity(8),
            policy,
        }
    }

    pub fn policy(&self) -> OnErrorPolicy {
        self.policy
    }

    /// Forgets everything from the previous record.
    pub fn reset(&mut self) {
        self.root.clear();
        self.open.clear();
    }

    /// Resets, walks `record` and returns the finished document.
    ///
    /// On error nothing of the partial document survives.
    pub fn build(
        &mut self,
        walker: &ValuePairsWalker,
        record: &LogRecord,
    ) -> Result<&Document, DocumentError> {
        self.reset();
        if let Err(e) = walker.walk(record, self) {
            self.reset();
            return Err(e);
        }
        if !self.open.is_empty() {
            let unclosed = self.open.len();
            self.reset();
            return Err(DocumentError::UnclosedGroups(unclosed));
        }
        Ok(&self.root)
    }

    pub fn document(&self) -> &Document {
        &self.root
    }

    pub fn depth(&self) -> usize {
        self.open.len()
    }

    fn current(&mut self) -> &mut Document {
        match self.open.last_mut() {
            Some((_, document)) => document,
            None => &mut self.root,
        }
    }
}

impl FieldVisitor for DocumentBuilder {
    fn group_start(&mut self, name: &str) -> Result<(), DocumentError> {
        self.open.push((name.to_string(), Document::new()));
        Ok(())
    }

    fn scalar(
        &mut self,
        name: &str,
        type_hint: TypeHint,
        value: &str,
    ) -> Result<(), DocumentError> {
        if self.current().contains_key(name) {
            return Err(DocumentError::DuplicateField(name.to_string()));
        }

        let bson = match coerce(value, type_hint) {
            Ok(bson) => bson,
            Err(source) => {
                if !self.policy.silent {
                    error!(field = name, value, type_hint = %type_hint, "Casting error");
                }
                match self.policy.on_failure() {
                    CastFailureAction::StoreAsString => Bson::String(value.to_string()),
                    CastFailureAction::SkipField => return Ok(()),
                    CastFailureAction::DropRecord => {
                        return Err(DocumentError::Coercion {
                            field: name.to_string(),
                            source,
                        });
                    }
                }
            }
        };

        self.current().insert(name, bson);
        Ok(())
    }

    fn group_end(&mut self, name: &str) -> Result<(), DocumentError> {
        match self.open.pop() {
            Some((open_name, document)) if open_name == name => {
                let parent = self.current();
                if parent.contains_key(&open_name) {
                    return Err(DocumentError::DuplicateField(open_name));
                }
                parent.insert(open_name, Bson::Document(document));
                Ok(())
            }
            _ => Err(DocumentError::UnbalancedGroup(name.to_string())),
        }
    }
}
