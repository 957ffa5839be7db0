//! Checks model-generated Cypher before it is executed.
//!
//! The generation pipeline hands back whatever the model wrote. Anything that
//! goes on to run against the database passes through [`CypherGuard::check`],
//! which only admits a single read-only statement and caps its result size.

use lazy_static::lazy_static;
use regex::Regex;
use thiserror::Error;
use tracing::debug;

const FORBIDDEN_CLAUSES: &[&str] = &[
    "CREATE", "MERGE", "DELETE", "DETACH", "SET", "REMOVE", "DROP", "LOAD", "FOREACH", "GRANT",
    "DENY", "REVOKE",
];

/// Procedures a statement may `CALL`, lowercased. Entries ending in `.` or `query`
/// admit every procedure under that prefix.
const READ_PROCEDURES: &[&str] = &[
    "db.labels",
    "db.relationshiptypes",
    "db.propertykeys",
    "db.index.vector.querynodes",
    "db.index.fulltext.query",
    "apoc.meta.",
];

lazy_static! {
    static ref CODE_FENCE: Regex = Regex::new(r"(?s)^\s*```[A-Za-z]*[ \t]*\r?\n?(.*?)\s*```\s*$").unwrap();
}


#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UnsafeCypher {
    #[error("empty statement")]
    Empty,

    #[error("more than one statement")]
    MultipleStatements,

    #[error("write or admin clause `{0}` is not allowed")]
    ForbiddenClause(String),

    #[error("procedure `{0}` is not allowed")]
    ForbiddenProcedure(String),

    #[error("unterminated {0}")]
    Unterminated(&'static str),

    #[error("LIMIT must be a single integer literal, got `{0}`")]
    NonLiteralLimit(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Kind {
    Word(String),
    Number,
    Symbol(char),
    QuotedIdentifier,
    StringLiteral,
}

#[derive(Debug, Clone)]
struct Token {
    kind: Kind,
    start: usize,
    end: usize,
}

impl Token {
    fn is_symbol(&self, c: char) -> bool {
        self.kind == Kind::Symbol(c)
    }

    fn keyword(&self) -> Option<String> {
        match &self.kind {
            Kind::Word(w) => Some(w.to_ascii_uppercase()),
            _ => None,
        }
    }
}

fn scan_until(bytes: &[u8], mut i: usize, quote: u8, backslash_escapes: bool) -> Option<usize> {
    while i < bytes.len() {
        let b = bytes[i];
        if backslash_escapes && b == b'\\' {
            i += 2;
            continue;
        }
        if b == quote {
            // A doubled backtick is a literal backtick inside the identifier.
            if !backslash_escapes && bytes.get(i + 1) == Some(&quote) {
                i += 2;
                continue;
            }
            return Some(i + 1);
        }
        i += 1;
    }
    None
}

/// Splits a statement into tokens, skipping whitespace and comments.
fn tokenize(statement: &str) -> Result<Vec<Token>, UnsafeCypher> {
    let bytes = statement.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        let b = bytes[i];
        let start = i;

        if b.is_ascii_whitespace() {
            i += 1;
            continue;
        }

        if b == b'/' && bytes.get(i + 1) == Some(&b'/') {
            while i < bytes.len() && bytes[i] != b'\n' {
                i += 1;
            }
            continue;
        }

        if b == b'/' && bytes.get(i + 1) == Some(&b'*') {
            let close = statement[i + 2..]
                .find("*/")
                .ok_or(UnsafeCypher::Unterminated("block comment"))?;
            i = i + 2 + close + 2;
            continue;
        }

        let kind = match b {
            b'\'' | b'"' => {
                i = scan_until(bytes, i + 1, b, true).ok_or(UnsafeCypher::Unterminated("string literal"))?;
                Kind::StringLiteral
            }
            b'`' => {
                i = scan_until(bytes, i + 1, b'`', false)
                    .ok_or(UnsafeCypher::Unterminated("quoted identifier"))?;
                Kind::QuotedIdentifier
            }
            b if b.is_ascii_alphabetic() || b == b'_' || b >= 0x80 => {
                while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_' || bytes[i] >= 0x80) {
                    i += 1;
                }
                Kind::Word(statement[start..i].to_string())
            }
            b if b.is_ascii_digit() => {
                while i < bytes.len() && bytes[i].is_ascii_digit() {
                    i += 1;
                }
                Kind::Number
            }
            other => {
                i += 1;
                Kind::Symbol(other as char)
            }
        };

        tokens.push(Token { kind, start, end: i });
    }

    Ok(tokens)
}

fn strip_code_fence(raw: &str) -> &str {
    match CODE_FENCE.captures(raw).and_then(|c| c.get(1)) {
        Some(inner) => inner.as_str(),
        None => raw,
    }
}

/// Dotted procedure name following `CALL` at `tokens[at]`, if any. Backtick
/// quoting is removed so `` `dbms`.`security` `` reads as `dbms.security`.
fn procedure_name(statement: &str, tokens: &[Token], at: usize) -> Option<String> {
    let mut name = String::new();
    let mut i = at;
    loop {
        let Some(token) = tokens.get(i) else { break };
        match &token.kind {
            Kind::Word(w) => name.push_str(w),
            Kind::QuotedIdentifier => {
                name.push_str(&statement[token.start + 1..token.end - 1].replace("``", "`"))
            }
            _ => break,
        }
        if tokens.get(i + 1).is_some_and(|t| t.is_symbol('.')) {
            name.push('.');
            i += 2;
        } else {
            break;
        }
    }
    (!name.is_empty()).then_some(name)
}

fn is_read_procedure(name: &str) -> bool {
    let lowered = name.to_ascii_lowercase();
    READ_PROCEDURES.iter().any(|allowed| {
        if allowed.ends_with('.') || allowed.ends_with("query") {
            lowered.starts_with(allowed)
        } else {
            lowered == *allowed
        }
    })
}


#[derive(Debug, Clone, Copy)]
pub struct CypherGuard {
    max_limit: usize,
}

impl CypherGuard {

    pub fn new(max_limit: usize) -> Self {
        Self { max_limit }
    }


    pub fn max_limit(&self) -> usize {
        self.max_limit
    }

    /// Returns the statement that may be executed, or why it may not.
    pub fn check(&self, raw: &str) -> Result<String, UnsafeCypher> {
        let mut statement = strip_code_fence(raw).trim().to_string();
        let mut tokens = tokenize(&statement)?;

        if let Some(last) = tokens.last().filter(|t| t.is_symbol(';')) {
            statement = statement[..last.start].trim_end().to_string();
            tokens = tokenize(&statement)?;
        }
        if tokens.is_empty() {
            return Err(UnsafeCypher::Empty);
        }
        if tokens.iter().any(|t| t.is_symbol(';')) {
            return Err(UnsafeCypher::MultipleStatements);
        }

        self.reject_writes(&statement, &tokens)?;
        let statement = self.enforce_limit(&statement, &tokens)?;

        debug!("Cypher accepted: {}", crate::utils::single_line(&statement));
        Ok(statement)
    }

    fn reject_writes(&self, statement: &str, tokens: &[Token]) -> Result<(), UnsafeCypher> {
        for (i, token) in tokens.iter().enumerate() {
            let Some(keyword) = token.keyword() else { continue };

            // Property keys, labels, relationship types and parameters are names, not clauses.
            let is_name = i > 0
                && matches!(tokens[i - 1].kind, Kind::Symbol('.') | Kind::Symbol(':') | Kind::Symbol('$'));
            if is_name {
                continue;
            }

            if FORBIDDEN_CLAUSES.contains(&keyword.as_str()) {
                return Err(UnsafeCypher::ForbiddenClause(keyword));
            }

            // `CALL {` and `CALL (x) {` are subqueries; their bodies are checked token by token.
            if keyword == "CALL" {
                if let Some(name) = procedure_name(statement, tokens, i + 1) {
                    if !is_read_procedure(&name) {
                        return Err(UnsafeCypher::ForbiddenProcedure(name));
                    }
                }
            }
        }
        Ok(())
    }

    /// Caps or appends the `LIMIT` of the final top-level `RETURN`.
    fn enforce_limit(&self, statement: &str, tokens: &[Token]) -> Result<String, UnsafeCypher> {
        let mut depth = 0i32;
        let mut last_return = None;
        let mut last_limit = None;

        for (i, token) in tokens.iter().enumerate() {
            match token.kind {
                Kind::Symbol('(') | Kind::Symbol('[') | Kind::Symbol('{') => depth += 1,
                Kind::Symbol(')') | Kind::Symbol(']') | Kind::Symbol('}') => depth -= 1,
                _ => {}
            }
            if depth != 0 {
                continue;
            }
            match token.keyword().as_deref() {
                Some("RETURN") => {
                    last_return = Some(i);
                    last_limit = None;
                }
                Some("LIMIT") if last_return.is_some() => last_limit = Some(i),
                _ => {}
            }
        }

        let Some(last) = tokens.last() else {
            return Ok(statement.to_string());
        };
        if last_return.is_none() {
            return Ok(statement.to_string());
        }

        let Some(limit) = last_limit else {
            // Inserted after the last token so a trailing comment cannot swallow it.
            return Ok(format!(
                "{} LIMIT {}{}",
                &statement[..last.end],
                self.max_limit,
                &statement[last.end..]
            ));
        };

        let value = match tokens.get(limit + 1) {
            Some(value) if value.kind == Kind::Number => value,
            other => {
                let found = other.map(|t| &statement[t.start..t.end]).unwrap_or("");
                return Err(UnsafeCypher::NonLiteralLimit(found.to_string()));
            }
        };
        // Only the end of the statement or a following clause may come after the number.
        if let Some(next) = tokens.get(limit + 2) {
            if next.keyword().is_none() {
                return Err(UnsafeCypher::NonLiteralLimit(
                    statement[value.start..last.end].to_string(),
                ));
            }
        }

        let requested = statement[value.start..value.end]
            .parse::<u64>()
            .unwrap_or(u64::MAX);
        if requested > self.max_limit as u64 {
            Ok(format!(
                "{}{}{}",
                &statement[..value.start],
                self.max_limit,
                &statement[value.end..]
            ))
        } else {
            Ok(statement.to_string())
        }
    }
}

impl Default for CypherGuard {
    fn default() -> Self {
        Self::new(crate::DEFAULT_CYPHER_MAX_LIMIT)
    }
}
