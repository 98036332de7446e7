//! Label keys that drive service derivation.

/// Prefix used when no other is configured.
pub const DEFAULT_PREFIX: &str = "com.github.njasm.clerk.";

/// Immutable description of the reserved label namespace.
///
/// Every key clerk reads from a container lives under `prefix`. The schema is built
/// once at startup and handed to whoever derives services.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelSchema {
    prefix: String,
}

impl LabelSchema {
    pub const REGISTER: &'static str = "register";
    pub const NAME: &'static str = "name";
    pub const PORTS: &'static str = "ports";
    pub const TAGS: &'static str = "tags";
    pub const ATTRIBUTES: &'static str = "attributes";

    /// Builds a schema, normalizing the prefix the same way label keys are.
    pub fn new(prefix: impl Into<String>) -> Self {
        let mut prefix = normalize_key(&prefix.into());
        if !prefix.is_empty() && !prefix.ends_with('.') {
            prefix.push('.');
        }

        Self { prefix }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Full label key for `suffix`. Keys that already carry the prefix are returned as is.
    pub fn key(&self, suffix: &str) -> String {
        if suffix.starts_with(&self.prefix) {
            suffix.to_string()
        } else {
            format!("{}{}", self.prefix, suffix)
        }
    }

    /// Whether an already normalized key belongs to this namespace.
    pub fn owns(&self, normalized_key: &str) -> bool {
        normalized_key.starts_with(&self.prefix)
    }
}

impl Default for LabelSchema {
    fn default() -> Self {
        Self::new(DEFAULT_PREFIX)
    }
}

/// Lower-cases and trims surrounding spaces.
pub fn normalize_key(key: &str) -> String {
    key.to_lowercase().trim_matches(' ').to_string()
}

/// Truthiness used by every boolean label: `true`, any case, surrounding spaces ignored.
pub fn is_true(value: &str) -> bool {
    normalize_key(value) == "true"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefix_is_normalized_and_dotted() {
        let schema = LabelSchema::new(" Org.Example.Clerk ");
        assert_eq!(schema.prefix(), "org.example.clerk.");
        assert_eq!(schema.key("register"), "org.example.clerk.register");
    }

    #[test]
    fn key_does_not_double_prefix() {
        let schema = LabelSchema::default();
        let full = schema.key(LabelSchema::NAME);
        assert_eq!(schema.key(&full), full);
    }

    #[test]
    fn truthiness() {
        assert!(is_true("true"));
        assert!(is_true("  TRUE "));
        assert!(!is_true("yes"));
        assert!(!is_true(""));
    }
}
