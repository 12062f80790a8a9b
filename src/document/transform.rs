use std::borrow::Cow;
use std::fmt;

/// Rewrites a field name before it reaches the document builder.
pub trait KeyTransform: Send + Sync + fmt::Debug {
    fn apply<'a>(&self, key: &'a str) -> Cow<'a, str>;
}

/// Replaces a leading `prefix` with `replacement`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplacePrefix {
    prefix: String,
    replacement: String,
}

impl ReplacePrefix {
    pub fn new(prefix: impl Into<String>, replacement: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            replacement: replacement.into(),
        }
    }
}

impl KeyTransform for ReplacePrefix {
    fn apply<'a>(&self, key: &'a str) -> Cow<'a, str> {
        match key.strip_prefix(self.prefix.as_str()) {
            Some(rest) if !self.prefix.is_empty() => {
                let mut rewritten = String::with_capacity(self.replacement.len() + rest.len());
                rewritten.push_str(&self.replacement);
                rewritten.push_str(rest);
                Cow::Owned(rewritten)
            }
            _ => Cow::Borrowed(key),
        }
    }
}

/// Ordered chain of key transforms.
#[derive(Debug, Default)]
pub struct KeyTransforms {
    transforms: Vec<Box<dyn KeyTransform>>,
}

impl KeyTransforms {
    pub fn new() -> Self {
        Self::default()
    }

    /// MongoDB rejects top-level keys starting with a dot, so a leading `.`
    /// always becomes `_`.
    pub fn mongodb_defaults() -> Self {
        Self::new().with(ReplacePrefix::new(".", "_"))
    }

    pub fn with(mut self, transform: impl KeyTransform + 'static) -> Self {
        self.transforms.push(Box::new(transform));
        self
    }

    pub fn len(&self) -> usize {
        self.transforms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transforms.is_empty()
    }

    pub fn apply<'a>(&self, key: &'a str) -> Cow<'a, str> {
        let mut current = Cow::Borrowed(key);
        for transform in &self.transforms {
            let rewritten = match transform.apply(&current) {
                Cow::Owned(rewritten) => Some(rewritten),
                Cow::Borrowed(_) => None,
            };
            if let Some(rewritten) = rewritten {
                current = Cow::Owned(rewritten);
            }
        }
        current
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_leading_dot_becomes_underscore() {
        let transforms = KeyTransforms::mongodb_defaults();

        assert_eq!(transforms.apply(".SDATA.meta.x"), "_SDATA.meta.x");
        assert_eq!(transforms.apply("HOST"), "HOST");
        assert!(matches!(transforms.apply("HOST"), Cow::Borrowed(_)));
    }

    #[test]
    fn test_only_the_first_prefix_is_replaced() {
        let transforms = KeyTransforms::mongodb_defaults();
        assert_eq!(transforms.apply("..a"), "_.a");
    }

    #[test]
    fn test_transforms_chain_in_order() {
        let transforms = KeyTransforms::new()
            .with(ReplacePrefix::new(".", "_"))
            .with(ReplacePrefix::new("_", "meta."));

        assert_eq!(transforms.len(), 2);
        assert_eq!(transforms.apply(".pid"), "meta.pid");
    }

    #[test]
    fn test_empty_prefix_is_a_no_op() {
        let transform = ReplacePrefix::new("", "x");
        assert_eq!(transform.apply("abc"), "abc");
    }
}
