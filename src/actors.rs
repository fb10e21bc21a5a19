//! Actor set resolution.
//!
//! A target may be a registered account, an anonymous network address, or a
//! temporary account, optionally accompanied by the temporary accounts linked
//! to it. All of them are treated as opaque names and merged into one set.

use std::collections::BTreeSet;

/// Merge the primary actor with its linked actors.
///
/// Names are trimmed and blanks dropped. An empty result means "search all
/// actors", never "match nobody".
pub fn resolve<S: AsRef<str>>(primary: Option<&str>, linked: &[S]) -> BTreeSet<String> {
    primary
        .into_iter()
        .chain(linked.iter().map(|name| name.as_ref()))
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_primary_only() {
        let actors = resolve::<&str>(Some("Alice"), &[]);
        assert_eq!(actors, BTreeSet::from(["Alice".to_string()]));
    }

    #[test]
    fn test_merges_and_dedups_linked() {
        let actors = resolve(Some("127.0.0.1"), &["~2024-1", "~2024-2", "~2024-1"]);
        assert_eq!(actors.len(), 3);
        assert!(actors.contains("127.0.0.1"));
        assert!(actors.contains("~2024-2"));
    }

    #[test]
    fn test_empty_primary_with_linked() {
        let actors = resolve(Some("  "), &["~2024-1"]);
        assert_eq!(actors, BTreeSet::from(["~2024-1".to_string()]));
    }

    #[test]
    fn test_nothing_means_global() {
        assert!(resolve::<&str>(None, &[]).is_empty());
        assert!(resolve::<&str>(Some(""), &[]).is_empty());
    }
}
