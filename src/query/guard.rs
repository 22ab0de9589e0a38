//! Read-only gate for free-text SQL coming from the tool-calling loop.
//!
//! The statement is lexed rather than substring-searched: comments and
//! quoted literals are skipped, keywords match whole words only, and
//! anything after a `;` other than more semicolons is refused.

use crate::error::RejectReason;

// ---

/// Words that mutate data or schema. Any of them as a bare word rejects the
/// statement.
pub const FORBIDDEN_KEYWORDS: [&str; 7] = [
    "drop", "delete", "update", "insert", "alter", "create", "truncate",
];

/// Row cap appended when the statement carries no `LIMIT` of its own.
pub const DEFAULT_ROW_LIMIT: u32 = 100;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    /// Lower-cased keyword or identifier.
    Word(String),
    /// Byte offset of the `;` in the source.
    Semicolon(usize),
    Other,
}

#[derive(Debug, Default)]
struct Lexed {
    tokens: Vec<Token>,
    /// The text ends inside a `--` comment, so anything appended on the
    /// same line would be commented out.
    ends_in_line_comment: bool,
}

/// Validate `query` and return the exact text to execute.
///
/// Gates, in order: non-empty, starts with `SELECT`, no forbidden keyword,
/// no `SELECT ... INTO`, a single statement. Statements without a `LIMIT`
/// get `LIMIT 100` appended to the trimmed input text.
pub fn prepare(query: &str) -> Result<String, RejectReason> {
    // ---
    let trimmed = query.trim();
    let lexed = lex(trimmed);

    let mut words = lexed.tokens.iter().filter_map(|t| match t {
        Token::Word(w) => Some(w.as_str()),
        _ => None,
    });

    match lexed.tokens.first() {
        None => return Err(RejectReason::Empty),
        Some(Token::Word(w)) if w == "select" => {}
        Some(_) => return Err(RejectReason::NotSelect),
    }

    if let Some(kw) = words
        .clone()
        .find_map(|w| FORBIDDEN_KEYWORDS.iter().copied().find(|kw| *kw == w))
    {
        return Err(RejectReason::ForbiddenKeyword(kw));
    }

    // SELECT ... INTO creates a table
    if words.clone().any(|w| w == "into") {
        return Err(RejectReason::ForbiddenKeyword("into"));
    }

    let first_semicolon = lexed.tokens.iter().enumerate().find_map(|(pos, t)| match t {
        Token::Semicolon(offset) => Some((pos, *offset)),
        _ => None,
    });
    let statement = match first_semicolon {
        Some((pos, offset)) => {
            let trailing_only = lexed.tokens[pos..]
                .iter()
                .all(|t| matches!(t, Token::Semicolon(_)));
            if !trailing_only {
                return Err(RejectReason::MultipleStatements);
            }
            trimmed[..offset].trim_end()
        }
        None => trimmed,
    };

    if words.any(|w| w == "limit") {
        return Ok(statement.to_string());
    }

    let separator = if lex(statement).ends_in_line_comment {
        "\n"
    } else {
        " "
    };
    Ok(format!("{statement}{separator}LIMIT {DEFAULT_ROW_LIMIT}"))
}

fn lex(sql: &str) -> Lexed {
    // ---
    let bytes = sql.as_bytes();
    let mut out = Lexed::default();
    let mut i = 0;

    while i < bytes.len() {
        let c = bytes[i];
        out.ends_in_line_comment = false;

        match c {
            b if b.is_ascii_whitespace() => i += 1,
            b'-' if bytes.get(i + 1) == Some(&b'-') => {
                while i < bytes.len() && bytes[i] != b'\n' {
                    i += 1;
                }
                out.ends_in_line_comment = i == bytes.len();
            }
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                i = skip_block_comment(bytes, i);
            }
            b'\'' | b'"' => {
                i = skip_quoted(bytes, i, c);
                out.tokens.push(Token::Other);
            }
            b'$' => match dollar_tag(bytes, i) {
                Some(tag_len) => {
                    i = skip_dollar_quoted(bytes, i, tag_len);
                    out.tokens.push(Token::Other);
                }
                None => {
                    i += 1;
                    out.tokens.push(Token::Other);
                }
            },
            b';' => {
                out.tokens.push(Token::Semicolon(i));
                i += 1;
            }
            b if b.is_ascii_alphabetic() || b == b'_' || b >= 0x80 => {
                let start = i;
                while i < bytes.len()
                    && (bytes[i].is_ascii_alphanumeric()
                        || bytes[i] == b'_'
                        || bytes[i] == b'$'
                        || bytes[i] >= 0x80)
                {
                    i += 1;
                }
                // `E'...'` is an escape string: `\'` does not close it
                if i - start == 1
                    && matches!(bytes[start], b'e' | b'E')
                    && bytes.get(i) == Some(&b'\'')
                {
                    i = skip_escape_string(bytes, i);
                    out.tokens.push(Token::Other);
                    continue;
                }
                out.tokens
                    .push(Token::Word(sql[start..i].to_ascii_lowercase()));
            }
            b if b.is_ascii_digit() => {
                while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'.') {
                    i += 1;
                }
                out.tokens.push(Token::Other);
            }
            _ => {
                i += 1;
                out.tokens.push(Token::Other);
            }
        }
    }

    out
}

/// Postgres block comments nest.
fn skip_block_comment(bytes: &[u8], mut i: usize) -> usize {
    let mut depth = 0usize;
    while i < bytes.len() {
        if bytes[i] == b'/' && bytes.get(i + 1) == Some(&b'*') {
            depth += 1;
            i += 2;
        } else if bytes[i] == b'*' && bytes.get(i + 1) == Some(&b'/') {
            depth -= 1;
            i += 2;
            if depth == 0 {
                return i;
            }
        } else {
            i += 1;
        }
    }
    i
}

/// Skip a `'...'` literal or `"..."` identifier; a doubled quote escapes.
fn skip_quoted(bytes: &[u8], mut i: usize, quote: u8) -> usize {
    i += 1;
    while i < bytes.len() {
        if bytes[i] == quote {
            if bytes.get(i + 1) == Some(&quote) {
                i += 2;
                continue;
            }
            return i + 1;
        }
        i += 1;
    }
    i
}

/// Skip an escape-string body starting at its opening `'`. A backslash
/// escapes the next byte; a doubled quote still escapes too.
fn skip_escape_string(bytes: &[u8], mut i: usize) -> usize {
    i += 1;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b'\'' if bytes.get(i + 1) == Some(&b'\'') => i += 2,
            b'\'' => return i + 1,
            _ => i += 1,
        }
    }
    bytes.len()
}

/// Length of a `$tag$` opener at `i`, if there is one.
fn dollar_tag(bytes: &[u8], i: usize) -> Option<usize> {
    let mut j = i + 1;
    while j < bytes.len() && (bytes[j].is_ascii_alphanumeric() || bytes[j] == b'_') {
        if j == i + 1 && bytes[j].is_ascii_digit() {
            // `$1` is a parameter, not a tag
            return None;
        }
        j += 1;
    }
    (bytes.get(j) == Some(&b'$')).then_some(j + 1 - i)
}

fn skip_dollar_quoted(bytes: &[u8], i: usize, tag_len: usize) -> usize {
    let tag = &bytes[i..i + tag_len];
    let body = i + tag_len;
    bytes[body..]
        .windows(tag_len)
        .position(|w| w == tag)
        .map_or(bytes.len(), |pos| body + pos + tag_len)
}
