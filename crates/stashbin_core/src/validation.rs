//! Checks applied to submissions before any slug is drawn.

use crate::error::AppError;

/// A lexer accepted by the renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Lexer {
    /// Identifier sent by clients and stored with the file.
    pub name: &'static str,
    /// Human-readable label.
    pub label: &'static str,
}

const fn lexer(name: &'static str, label: &'static str) -> Lexer {
    Lexer { name, label }
}

/// Every accepted lexer, sorted by name.
pub const KNOWN_LEXERS: &[Lexer] = &[
    lexer("bash", "Bash"),
    lexer("c", "C"),
    lexer("cpp", "C++"),
    lexer("csharp", "C#"),
    lexer("css", "CSS"),
    lexer("diff", "Diff"),
    lexer("dockerfile", "Dockerfile"),
    lexer("elixir", "Elixir"),
    lexer("go", "Go"),
    lexer("haskell", "Haskell"),
    lexer("html", "HTML"),
    lexer("ini", "INI"),
    lexer("java", "Java"),
    lexer("javascript", "JavaScript"),
    lexer("json", "JSON"),
    lexer("kotlin", "Kotlin"),
    lexer("lua", "Lua"),
    lexer("make", "Makefile"),
    lexer("markdown", "Markdown"),
    lexer("nginx", "Nginx configuration"),
    lexer("perl", "Perl"),
    lexer("php", "PHP"),
    lexer("python", "Python"),
    lexer("pytb", "Python traceback"),
    lexer("ruby", "Ruby"),
    lexer("rust", "Rust"),
    lexer("sql", "SQL"),
    lexer("swift", "Swift"),
    lexer("text", "Text only"),
    lexer("toml", "TOML"),
    lexer("typescript", "TypeScript"),
    lexer("xml", "XML"),
    lexer("yaml", "YAML"),
];

/// Whether `name` is an accepted lexer. Matching is exact.
pub fn is_known_lexer(name: &str) -> bool {
    KNOWN_LEXERS
        .binary_search_by(|candidate| candidate.name.cmp(name))
        .is_ok()
}

/// Resolve an optional client-supplied lexer, falling back to `default`.
///
/// # Errors
/// [`AppError::Validation`] when the lexer is not in [`KNOWN_LEXERS`].
pub fn resolve_lexer(requested: Option<&str>, default: &str) -> Result<String, AppError> {
    let name = match requested.map(str::trim) {
        Some(name) if !name.is_empty() => name,
        _ => default,
    };
    if !is_known_lexer(name) {
        tracing::info!("Rejected submission with unknown lexer '{}'", name);
        return Err(AppError::Validation(format!("invalid lexer '{}'", name)));
    }
    Ok(name.to_string())
}

/// Reject content that is empty or only whitespace.
///
/// # Errors
/// [`AppError::Validation`] for blank content.
pub fn require_content(content: &str) -> Result<(), AppError> {
    if content.trim().is_empty() {
        return Err(AppError::Validation("content is empty".to_string()));
    }
    Ok(())
}

/// Share of `text` (0-100, in characters) covered by links.
///
/// A link is a `http`, `ws`, `grpc` or `ftp` URL (optionally with `s`) whose
/// host is lowercase letters and dashes with a dotted suffix, running until
/// the next quote or whitespace.
pub fn spam_score(text: &str) -> u32 {
    let chars: Vec<char> = text.chars().collect();
    if chars.is_empty() {
        return 0;
    }

    let mut link_chars = 0usize;
    let mut index = 0;
    while index < chars.len() {
        match link_len_at(&chars, index) {
            Some(len) => {
                link_chars += len;
                index += len;
            }
            None => index += 1,
        }
    }

    let score = link_chars * 100 / chars.len();
    tracing::debug!("Spam score rated at {}", score);
    u32::try_from(score).unwrap_or(100)
}

/// Reject text whose [`spam_score`] is above `limit`.
///
/// # Errors
/// [`AppError::Spam`] with the computed score.
pub fn check_spam(text: &str, limit: u32) -> Result<(), AppError> {
    let score = spam_score(text);
    if score > limit {
        tracing::info!("Rejected submission with spam score {} (limit {})", score, limit);
        return Err(AppError::Spam { score, limit });
    }
    Ok(())
}

const SCHEMES: [&str; 4] = ["http", "ws", "grpc", "ftp"];

fn link_len_at(chars: &[char], start: usize) -> Option<usize> {
    let scheme = SCHEMES
        .iter()
        .find(|scheme| starts_with(chars, start, scheme))?;
    let after_scheme = start + scheme.len();

    // Secure variant first, then plain.
    let with_s = (chars.get(after_scheme) == Some(&'s'))
        .then(|| link_rest_len(chars, after_scheme + 1))
        .flatten();
    let end = with_s.or_else(|| link_rest_len(chars, after_scheme))?;
    Some(end - start)
}

/// Match `<any char>//host.tld<tail>` at `pos`, returning the end index.
fn link_rest_len(chars: &[char], pos: usize) -> Option<usize> {
    chars.get(pos)?;
    let mut cursor = pos + 1;
    if !starts_with(chars, cursor, "//") {
        return None;
    }
    cursor += 2;

    let host_start = cursor;
    while chars
        .get(cursor)
        .is_some_and(|ch| ch.is_ascii_lowercase() || *ch == '-')
    {
        cursor += 1;
    }
    if cursor == host_start || chars.get(cursor) != Some(&'.') {
        return None;
    }
    cursor += 1;

    // At least one lowercase letter of suffix, then at least one more character.
    if !chars.get(cursor).is_some_and(char::is_ascii_lowercase) {
        return None;
    }
    let suffix_start = cursor;
    while chars.get(cursor).is_some_and(|ch| !is_link_terminator(*ch)) {
        cursor += 1;
    }
    if cursor - suffix_start < 2 {
        return None;
    }
    Some(cursor)
}

fn is_link_terminator(ch: char) -> bool {
    matches!(ch, '"' | '\'' | ' ' | '\n' | '\r' | '\t' | '\x0b')
}

fn starts_with(chars: &[char], at: usize, needle: &str) -> bool {
    let mut index = at;
    for expected in needle.chars() {
        if chars.get(index) != Some(&expected) {
            return false;
        }
        index += 1;
    }
    true
}
