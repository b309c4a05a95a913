//! `key=value` property files.
//!
//! The same format backs persisted overrides, module `system.prop` files and
//! the build property files that provide system defaults. Blank lines and
//! lines starting with `#` are ignored; surrounding whitespace is trimmed.

use std::collections::BTreeMap;

use super::PersistenceError;

/// Parses property lines. Later duplicates replace earlier ones and lines
/// without `=` are skipped.
pub(crate) fn parse(contents: &str) -> BTreeMap<String, String> {
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| line.split_once('='))
        .map(|(name, value)| (name.trim().to_owned(), value.trim().to_owned()))
        .filter(|(name, _)| !name.is_empty())
        .collect()
}

/// Renders entries in the format read by [`parse`].
pub(crate) fn render(entries: &BTreeMap<String, String>) -> String {
    let mut out = String::new();
    for (name, value) in entries {
        out.push_str(name);
        out.push('=');
        out.push_str(value);
        out.push('\n');
    }
    out
}

/// Rejects entries that would not survive a write and re-read.
pub(crate) fn validate(name: &str, value: &str) -> Result<(), PersistenceError> {
    let reason = if name.trim().is_empty() {
        Some("empty name")
    } else if name.trim() != name || name.starts_with('#') {
        Some("name has surrounding whitespace or a comment marker")
    } else if name.contains(['=', '\n', '\r']) {
        Some("name contains '=' or a line break")
    } else if value.contains(['\n', '\r']) {
        Some("value contains a line break")
    } else if value.trim() != value {
        Some("value has surrounding whitespace")
    } else {
        None
    };
    match reason {
        Some(reason) => Err(PersistenceError::Unrepresentable {
            name: name.to_owned(),
            reason,
        }),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[test]
    fn parse_skips_comments_and_noise() {
        let parsed = parse(
            "# build\nro.build.type=user\n\n  persist.a = 1 \nnot a property\nro.build.type=eng\n",
        );
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed.get("ro.build.type").map(String::as_str), Some("eng"));
        assert_eq!(parsed.get("persist.a").map(String::as_str), Some("1"));
    }

    #[test]
    fn values_may_contain_equals_signs() {
        let parsed = parse("ro.opts=a=b\n");
        assert_eq!(parsed.get("ro.opts").map(String::as_str), Some("a=b"));
    }

    #[test]
    fn rendered_entries_parse_back() {
        let mut entries = BTreeMap::new();
        entries.insert("a.b.c".to_owned(), "1".to_owned());
        entries.insert("empty".to_owned(), String::new());
        assert_eq!(parse(&render(&entries)), entries);
    }

    #[rstest]
    #[case("", "1")]
    #[case("a=b", "1")]
    #[case(" a", "1")]
    #[case("#a", "1")]
    #[case("a", "line\nbreak")]
    #[case("a", " padded")]
    fn unrepresentable_entries_are_rejected(#[case] name: &str, #[case] value: &str) {
        assert!(validate(name, value).is_err());
    }
}
