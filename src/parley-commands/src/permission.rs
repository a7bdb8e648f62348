//! Group-based command permissions.

/// Whether a requester belonging to `requester` may see and invoke a command
/// restricted to `allowed`.
///
/// An empty `allowed` set means the command is unrestricted. Otherwise the
/// two sets must share at least one label, compared case-insensitively.
pub fn has_permission<S: AsRef<str>>(allowed: &[String], requester: &[S]) -> bool {
    if allowed.is_empty() {
        return true;
    }
    requester.iter().any(|group| {
        allowed
            .iter()
            .any(|label| eq_fold(label, group.as_ref()))
    })
}

/// Case-insensitive comparison used for command names, aliases and groups.
pub(crate) fn eq_fold(a: &str, b: &str) -> bool {
    if a.is_ascii() && b.is_ascii() {
        return a.eq_ignore_ascii_case(b);
    }
    a.to_lowercase() == b.to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn groups(labels: &[&str]) -> Vec<String> {
        labels.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_unrestricted() {
        assert!(has_permission::<&str>(&[], &[]));
        assert!(has_permission(&[], &["anyone"]));
    }

    #[test]
    fn test_intersection_case_insensitive() {
        let allowed = groups(&["mods", "admins"]);
        assert!(has_permission(&allowed, &["MODS"]));
        assert!(has_permission(&allowed, &["users", "Admins"]));
        assert!(!has_permission(&allowed, &["users"]));
        assert!(!has_permission::<&str>(&allowed, &[]));
    }

    #[test]
    fn test_eq_fold_unicode() {
        assert!(eq_fold("Ünïcode", "üNÏCODE"));
        assert!(!eq_fold("mods", "mod"));
    }

    #[test]
    fn test_eq_fold_is_symmetric() {
        // U+212A KELVIN SIGN lowercases to an ASCII 'k'.
        for (a, b) in [("kick", "\u{212A}ick"), ("Straße", "STRAßE"), ("mods", "MODS")] {
            assert!(eq_fold(a, b), "{a} / {b}");
            assert!(eq_fold(b, a), "{b} / {a}");
        }
        assert!(!eq_fold("kick", "\u{212A}ill"));
        assert!(!eq_fold("\u{212A}ill", "kick"));
    }
}
