use super::transform::KeyTransforms;
use super::{DocumentError, FieldVisitor};
use crate::domain::{Field, LogRecord};
use std::borrow::Cow;

/// Exclusion rules applied to field names before the walk.
///
/// A pattern ending in `*` matches every name with that prefix, anything else
/// must match exactly.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldSelection {
    exclude: Vec<String>,
}

impl FieldSelection {
    pub fn new(exclude: Vec<String>) -> Self {
        Self { exclude }
    }

    pub fn is_selected(&self, name: &str) -> bool {
        !self.exclude.iter().any(|pattern| match pattern.strip_suffix('*') {
            Some(prefix) => name.starts_with(prefix),
            None => name == pattern.as_str(),
        })
    }
}

/// Drives a [`FieldVisitor`] over a record.
///
/// Names are rewritten by the configured transforms, split on `.`, and
/// ordered by path so that fields sharing a prefix end up in one group.
/// Fields with equal paths keep their record order.
#[derive(Debug)]
pub struct ValuePairsWalker {
    transforms: KeyTransforms,
    selection: FieldSelection,
}

impl Default for ValuePairsWalker {
    fn default() -> Self {
        Self::new(KeyTransforms::mongodb_defaults(), FieldSelection::default())
    }
}

impl ValuePairsWalker {
    pub fn new(transforms: KeyTransforms, selection: FieldSelection) -> Self {
        Self {
            transforms,
            selection,
        }
    }

    pub fn walk<V>(&self, record: &LogRecord, visitor: &mut V) -> Result<(), DocumentError>
    where
        V: FieldVisitor + ?Sized,
    {
        let names: Vec<(Cow<'_, str>, &Field)> = record
            .fields()
            .iter()
            .filter(|field| self.selection.is_selected(&field.name))
            .map(|field| (self.transforms.apply(&field.name), field))
            .collect();

        let mut paths: Vec<(Vec<&str>, &Field)> = names
            .iter()
            .map(|(name, field)| (name.split('.').collect(), *field))
            .collect();
        paths.sort_by(|a, b| a.0.cmp(&b.0));

        let mut open: Vec<&str> = Vec::new();
        for (path, field) in &paths {
            let Some((leaf, groups)) = path.split_last() else {
                continue;
            };

            let common = open
                .iter()
                .zip(groups.iter())
                .take_while(|(opened, wanted)| opened == wanted)
                .count();

            while open.len() > common {
                if let Some(name) = open.pop() {
                    visitor.group_end(name)?;
                }
            }
            for group in &groups[common..] {
                visitor.group_start(group)?;
                open.push(*group);
            }

            visitor.scalar(leaf, field.type_hint, &field.value)?;
        }

        while let Some(name) = open.pop() {
            visitor.group_end(name)?;
        }

        Ok(())
    }
}
