//! Splits one logical input line into tokens: literal words and the fixed
//! set of operator lexemes (`|`, `<`, `>`, `>>`, `e>`, `e>>`, `&`).
//!
//! The quote-counting predicate used by the REPL's continuation logic lives
//! here too, since it has to run on raw, possibly-unterminated input before
//! the line is known to be a complete tokenizable unit.

const OPERATORS: &[&str] = &["|", "<", ">", ">>", "e>", "e>>", "&"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    Word(String),
    Pipe,
    Lt,
    Gt,
    GtGt,
    EGt,
    EGtGt,
    Amp,
}

impl Token {
    fn from_operator_lexeme(lexeme: &str) -> Option<Token> {
        match lexeme {
            "|" => Some(Token::Pipe),
            "<" => Some(Token::Lt),
            ">" => Some(Token::Gt),
            ">>" => Some(Token::GtGt),
            "e>" => Some(Token::EGt),
            "e>>" => Some(Token::EGtGt),
            "&" => Some(Token::Amp),
            _ => None,
        }
    }
}

/// Count of `"` characters in `line` that would toggle `tokenize()`'s
/// `in_quotes` state. Odd means the line still has an unterminated quoted
/// region and the REPL should read a continuation line.
///
/// Mirrors `tokenize()`'s escape rule exactly: each backslash is evaluated
/// on its own, independent of any backslashes before it, and only ever
/// escapes an immediately following `"` (never another backslash or
/// anything else). Pairing backslashes off two-at-a-time instead would
/// disagree with `tokenize()` on inputs like `\\"` (two backslashes then a
/// quote) and make this predicate classify a tokenizer-complete line as
/// needing continuation.
pub fn count_unescaped_quotes(line: &str) -> usize {
    let mut count = 0;
    let mut chars = line.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if chars.peek() == Some(&'"') {
                chars.next();
            }
            continue;
        }
        if c == '"' {
            count += 1;
        }
    }
    count
}

/// Tokenize one logical line (already joined across continuations).
///
/// Splitting on whitespace respects open double-quote regions; a chunk is
/// classified as an operator only when it was produced from wholly unquoted,
/// unescaped input and its literal text matches one of the fixed lexemes.
pub fn tokenize(line: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut chars = line.chars().peekable();

    loop {
        while matches!(chars.peek(), Some(c) if c.is_whitespace()) {
            chars.next();
        }
        if chars.peek().is_none() {
            break;
        }

        let mut text = String::new();
        let mut in_quotes = false;
        let mut saw_quote_or_escape = false;

        while let Some(&c) = chars.peek() {
            if !in_quotes && c.is_whitespace() {
                break;
            }

            chars.next();

            if c == '\\' {
                saw_quote_or_escape = true;
                if chars.peek() == Some(&'"') {
                    text.push('\\');
                    text.push('"');
                    chars.next();
                }
                // else: a backslash with no following `"` has no special
                // effect outside quote pairing, so it is simply dropped and
                // the next character (even whitespace) is left for the
                // outer loop to handle normally.
                continue;
            }

            if c == '"' {
                saw_quote_or_escape = true;
                in_quotes = !in_quotes;
                continue;
            }

            text.push(c);
        }

        if !saw_quote_or_escape {
            if let Some(token) = Token::from_operator_lexeme(&text) {
                tokens.push(token);
                continue;
            }
        }
        tokens.push(Token::Word(text));
    }

    tokens
}
