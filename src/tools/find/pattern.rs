use std::ffi::OsStr;

use regex::Regex;

/// File-name glob: `*` matches any run of characters, `?` exactly one,
/// every other character is literal.
#[derive(Debug, Clone)]
pub struct NamePattern {
    source: String,
    regex: Regex,
}

impl NamePattern {
    pub fn new(pattern: &str) -> Result<Self, regex::Error> {
        let mut expression = String::with_capacity(pattern.len() + 8);
        expression.push_str("(?s)^");
        for ch in pattern.chars() {
            match ch {
                '*' => expression.push_str(".*"),
                '?' => expression.push('.'),
                other => expression.push_str(&regex::escape(&other.to_string())),
            }
        }
        expression.push('$');

        Ok(Self {
            source: pattern.to_string(),
            regex: Regex::new(&expression)?,
        })
    }

    pub fn matches(&self, name: &OsStr) -> bool {
        self.regex.is_match(&name.to_string_lossy())
    }

    /// The pattern as a `find -name` argument, when `find` would interpret it
    /// the same way. Bracket expressions and backslashes mean something else to
    /// `fnmatch`, and its `?` matches a single byte in the C locale, so those
    /// patterns are filtered in-process only.
    pub fn find_name_filter(&self) -> Option<&str> {
        if self.source.contains(['[', ']', '\\', '?']) {
            None
        } else {
            Some(&self.source)
        }
    }
}
