use anyhow::{Context, Result};
use std::fs;

/// Matches `text` against a shell-style wildcard `pattern` (`*` and `?`).
///
/// Used for idle-exempt command masks, bouncer lists and ident@ip rules.
pub fn wildcard_match(pattern: &str, text: &str, case_insensitive: bool) -> bool {
    let (pattern, text) = if case_insensitive {
        (pattern.to_lowercase(), text.to_lowercase())
    } else {
        (pattern.to_string(), text.to_string())
    };
    let p: Vec<char> = pattern.chars().collect();
    let t: Vec<char> = text.chars().collect();

    let (mut pi, mut ti) = (0usize, 0usize);
    let mut star: Option<(usize, usize)> = None;

    while ti < t.len() {
        if pi < p.len() && (p[pi] == '?' || p[pi] == t[ti]) {
            pi += 1;
            ti += 1;
        } else if pi < p.len() && p[pi] == '*' {
            star = Some((pi, ti));
            pi += 1;
        } else if let Some((sp, st)) = star {
            pi = sp + 1;
            ti = st + 1;
            star = Some((sp, st + 1));
        } else {
            return false;
        }
    }
    while pi < p.len() && p[pi] == '*' {
        pi += 1;
    }
    pi == p.len()
}

/// Collapses runs of whitespace into single spaces and trims the ends.
pub fn compress_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub fn load_file(path: &str) -> Result<String> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read file: {}", path))?;
    if contents.is_empty() {
        anyhow::bail!("File is empty: {}", path);
    }
    Ok(contents)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wildcard_basics() {
        assert!(wildcard_match("*", "anything", false));
        assert!(wildcard_match("SITE *", "SITE WHO", false));
        assert!(wildcard_match("site *", "SITE WHO", true));
        assert!(!wildcard_match("SITE *", "LIST", false));
        assert!(wildcard_match("no?p", "noop", false));
        assert!(wildcard_match("*@10.0.0.*", "ident@10.0.0.42", false));
        assert!(!wildcard_match("*@10.0.0.*", "ident@10.0.1.42", false));
    }

    #[test]
    fn wildcard_empty_pattern() {
        assert!(wildcard_match("", "", false));
        assert!(!wildcard_match("", "x", false));
    }

    #[test]
    fn whitespace_compression() {
        assert_eq!(compress_whitespace("  site   wipe  /pub "), "site wipe /pub");
    }
}
