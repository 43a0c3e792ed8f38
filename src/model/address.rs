//! Author and recipient addresses as they appear in archived list traffic.

use serde::{Deserialize, Serialize};

/// A parsed mail address.
///
/// Archived mailing-list traffic uses three shapes:
/// - `"Jane Doe <jane@example.com>"` (RFC 5322 name-addr)
/// - `"jane@example.com (Jane Doe)"` (old-style comment)
/// - `"jane at example.com (Jane Doe)"` (Mailman pipermail obfuscation)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MailAddress {
    /// Human-readable name (may be empty).
    pub name: String,
    /// The bare address (`user@domain`), de-obfuscated.
    pub email: String,
}

impl MailAddress {
    /// Parse a single address from a decoded header value.
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Self::default();
        }

        // name-addr: "Name <address>"
        if let (Some(open), Some(close)) = (trimmed.rfind('<'), trimmed.rfind('>')) {
            if close > open {
                return Self {
                    name: unquote(&trimmed[..open]),
                    email: deobfuscate(&trimmed[open + 1..close]),
                };
            }
        }

        // comment form: "address (Name)"
        if let (Some(open), Some(close)) = (trimmed.find('('), trimmed.rfind(')')) {
            if close > open {
                return Self {
                    name: unquote(&trimmed[open + 1..close]),
                    email: deobfuscate(&trimmed[..open]),
                };
            }
        }

        Self {
            name: String::new(),
            email: deobfuscate(trimmed),
        }
    }

    /// Parse a comma-separated list, honouring quoted and bracketed commas.
    pub fn parse_list(raw: &str) -> Vec<Self> {
        let mut results = Vec::new();
        let mut current = String::new();
        let mut in_quotes = false;
        let mut depth = 0usize;

        for ch in raw.chars() {
            match ch {
                '"' => in_quotes = !in_quotes,
                '<' | '(' if !in_quotes => depth += 1,
                '>' | ')' if !in_quotes => depth = depth.saturating_sub(1),
                ',' if !in_quotes && depth == 0 => {
                    push_parsed(&mut results, &current);
                    current.clear();
                    continue;
                }
                _ => {}
            }
            current.push(ch);
        }
        push_parsed(&mut results, &current);

        results
    }

    /// `"Name <email>"`, or just the email when no name is known.
    pub fn display(&self) -> String {
        if self.name.is_empty() {
            self.email.clone()
        } else {
            format!("{} <{}>", self.name, self.email)
        }
    }
}

impl std::fmt::Display for MailAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.display())
    }
}

fn push_parsed(results: &mut Vec<MailAddress>, segment: &str) {
    let addr = MailAddress::parse(segment);
    if !addr.email.is_empty() {
        results.push(addr);
    }
}

/// Undo the pipermail `user at host` obfuscation.
fn deobfuscate(s: &str) -> String {
    let trimmed = s.trim();
    match trimmed.split_once(" at ") {
        Some((user, host)) if !user.contains(' ') && !host.trim().contains(' ') => {
            format!("{}@{}", user, host.trim())
        }
        _ => trimmed.to_string(),
    }
}

fn unquote(s: &str) -> String {
    s.trim().trim_matches('"').trim().to_string()
}
