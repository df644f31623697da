use regex::{Regex, RegexBuilder};

/// Characters with a meaning of their own in the `regex` crate syntax. An
/// escaped delimiter from this set keeps its backslash.
const REGEX_META: &str = "\\.+*?()|[]{}^$#&-~";

/// A compiled rule pattern.
#[derive(Debug, Clone)]
pub enum Matcher {
    /// PCRE-style delimited expression, searched (not anchored) in each value.
    Regex { source: String, regex: Regex },
    /// Literal value compared for equality.
    Exact(String),
}

impl Matcher {
    pub fn regex(pattern: &str) -> Result<Self, String> {
        Ok(Matcher::Regex {
            source: pattern.to_string(),
            regex: compile_delimited(pattern)?,
        })
    }

    pub fn exact(value: &str) -> Self {
        Matcher::Exact(value.to_string())
    }

    pub fn is_match(&self, value: &str) -> bool {
        match self {
            Matcher::Regex { regex, .. } => regex.is_match(value),
            Matcher::Exact(expected) => expected == value,
        }
    }

    /// The pattern as it was written in the policy.
    pub fn source(&self) -> &str {
        match self {
            Matcher::Regex { source, .. } => source,
            Matcher::Exact(expected) => expected,
        }
    }
}

/// Compile a delimited pattern such as `/^.*@example\.com$/i` or
/// `@urn:mace:.*@`.
pub fn compile_delimited(pattern: &str) -> Result<Regex, String> {
    let trimmed = pattern.trim_start();
    let open = trimmed
        .chars()
        .next()
        .ok_or_else(|| "empty regular expression".to_string())?;
    if open.is_alphanumeric() || open == '\\' {
        return Err("delimiter must not be alphanumeric or backslash".to_string());
    }

    let close = match open {
        '(' => ')',
        '[' => ']',
        '{' => '}',
        '<' => '>',
        c => c,
    };

    let rest = &trimmed[open.len_utf8()..];
    let end = closing_delimiter(rest, open, close)
        .ok_or_else(|| format!("no ending delimiter `{close}` found"))?;
    let body = unescape_delimiter(&rest[..end], open, close);
    let modifiers = &rest[end + close.len_utf8()..];

    let mut flags = Modifiers::default();
    for modifier in modifiers.chars() {
        match modifier {
            'i' => flags.case_insensitive = true,
            'm' => flags.multi_line = true,
            's' => flags.dot_all = true,
            'x' => flags.extended = true,
            'U' => flags.ungreedy = true,
            'D' => flags.dollar_end_only = true,
            // Unicode matching is always on here.
            'u' => {}
            c if c.is_whitespace() => {}
            other => return Err(format!("unknown modifier `{other}`")),
        }
    }

    // Without `m` or `D`, a PCRE `$` also matches before a final newline.
    let body = if flags.multi_line || flags.dollar_end_only {
        body
    } else {
        dollar_before_final_newline(&body)
    };

    RegexBuilder::new(&body)
        .case_insensitive(flags.case_insensitive)
        .multi_line(flags.multi_line)
        .dot_matches_new_line(flags.dot_all)
        .ignore_whitespace(flags.extended)
        .swap_greed(flags.ungreedy)
        .build()
        .map_err(|e| e.to_string())
}

#[derive(Default)]
struct Modifiers {
    case_insensitive: bool,
    multi_line: bool,
    dot_all: bool,
    extended: bool,
    ungreedy: bool,
    dollar_end_only: bool,
}

/// Offset of the delimiter ending the expression: the first unescaped
/// `close`, counting nested pairs when the delimiters are brackets.
fn closing_delimiter(rest: &str, open: char, close: char) -> Option<usize> {
    let mut depth = 0usize;
    let mut chars = rest.char_indices();
    while let Some((i, c)) = chars.next() {
        if c == '\\' {
            chars.next();
        } else if c == close {
            if depth == 0 {
                return Some(i);
            }
            depth -= 1;
        } else if c == open && open != close {
            depth += 1;
        }
    }
    None
}

/// Rewrite each `$` assertion outside a character class as `(?:\n?\z)`.
fn dollar_before_final_newline(body: &str) -> String {
    let mut out = String::with_capacity(body.len());
    let mut class_depth = 0usize;
    let mut chars = body.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                out.push(c);
                if let Some(next) = chars.next() {
                    out.push(next);
                }
            }
            '[' => {
                out.push(c);
                class_depth += 1;
                // a leading `]` (after an optional `^`) is a literal
                if chars.peek() == Some(&'^') {
                    out.push('^');
                    chars.next();
                }
                if chars.peek() == Some(&']') {
                    out.push(']');
                    chars.next();
                }
            }
            ']' if class_depth > 0 => {
                out.push(c);
                class_depth -= 1;
            }
            '$' if class_depth == 0 => out.push_str(r"(?:\n?\z)"),
            _ => out.push(c),
        }
    }
    out
}

fn unescape_delimiter(body: &str, open: char, close: char) -> String {
    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some(next) if (next == open || next == close) && !REGEX_META.contains(next) => {
                out.push(next);
            }
            Some(next) => {
                out.push('\\');
                out.push(next);
            }
            None => out.push('\\'),
        }
    }
    out
}
