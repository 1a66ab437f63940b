use indexmap::IndexMap;
use sha2::{Digest, Sha256};

/// A typed review suggestion extracted from a completion reply.
///
/// Immutable after creation; the refiner may discard a suggestion but never
/// mutates the fields its identity derives from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Suggestion {
    pub filename: String,
    pub description: String,
    /// Category tag, e.g. "security", "performance", "improvement".
    pub category: String,
    pub comment: String,
    /// The proposed replacement code.
    pub code: String,
}

impl Suggestion {
    /// Deterministic content-derived identity, used for deduplication.
    ///
    /// Fields are hashed with a separator byte so distinct tuples can never
    /// concatenate to the same input.
    pub fn identity(&self) -> String {
        let mut hasher = Sha256::new();
        for field in [
            &self.filename,
            &self.description,
            &self.category,
            &self.comment,
            &self.code,
        ] {
            hasher.update(field.as_bytes());
            hasher.update([0x1f]);
        }
        hex::encode(hasher.finalize())
    }
}

/// Deduplicate suggestions by identity. A later suggestion with a seen
/// identity replaces the earlier one; identical content makes the direction
/// unobservable.
pub fn dedup_suggestions(suggestions: Vec<Suggestion>) -> Vec<Suggestion> {
    let mut by_identity: IndexMap<String, Suggestion> = IndexMap::new();
    for s in suggestions {
        by_identity.insert(s.identity(), s);
    }
    by_identity.into_values().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(filename: &str, code: &str) -> Suggestion {
        Suggestion {
            filename: filename.into(),
            description: "desc".into(),
            category: "bug".into(),
            comment: "comment".into(),
            code: code.into(),
        }
    }

    #[test]
    fn test_identity_deterministic() {
        let a = sample("src/a.rs", "let x = 1;");
        let b = sample("src/a.rs", "let x = 1;");
        assert_eq!(a.identity(), b.identity());
    }

    #[test]
    fn test_identity_distinguishes_content() {
        let a = sample("src/a.rs", "let x = 1;");
        let b = sample("src/a.rs", "let x = 2;");
        let c = sample("src/b.rs", "let x = 1;");
        assert_ne!(a.identity(), b.identity());
        assert_ne!(a.identity(), c.identity());
    }

    #[test]
    fn test_identity_separator_prevents_field_bleed() {
        let mut a = sample("src/a.rs", "x");
        let mut b = sample("src/a.rs", "x");
        // "desc" + "bug" vs "descb" + "ug" must not collide
        a.description = "desc".into();
        a.category = "bug".into();
        b.description = "descb".into();
        b.category = "ug".into();
        assert_ne!(a.identity(), b.identity());
    }

    #[test]
    fn test_dedup_collapses_identical_pairs() {
        let list = vec![
            sample("src/a.rs", "x"),
            sample("src/b.rs", "y"),
            sample("src/a.rs", "x"),
        ];
        let deduped = dedup_suggestions(list);
        assert_eq!(deduped.len(), 2);
    }
}
