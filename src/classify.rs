//! Lexical statement classification
//! --------------------------------
//! Just enough inspection of submitted SQL text to route it: a
//! case-insensitive prefix match against an ordered keyword table, plus the
//! companion routines that pull a savepoint name or a procedure name out of
//! the text and rewrite `?` placeholders to the vendor's positional token.
//! No parsing beyond that happens here.

use crate::error::{DriverError, DriverResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
    Select,
    Insert,
    Update,
    Delete,
    Commit,
    Rollback,
    Open,
    Close,
    Connect,
    Disconnect,
    GetDbEvent,
    Savepoint,
    SetAutocommit,
    ExecuteProcedure,
    Call,
    Copy,
    Create,
    Alter,
    Drop,
    Grant,
    Revoke,
    Modify,
    Set,
    StartTransaction,
    RollbackWorkTo,
    RollbackTo,
    /// Unrecognized leading keyword; takes the generic execution path.
    Other,
}

/// Keyword table, matched in declaration order: first match wins. The two
/// ROLLBACK..TO forms sit at the end because a plain ROLLBACK match is
/// re-tested against them (see [`classify`]).
const SQL_COMMANDS: &[(&str, StatementKind)] = &[
    ("SELECT", StatementKind::Select),
    ("INSERT", StatementKind::Insert),
    ("UPDATE", StatementKind::Update),
    ("DELETE", StatementKind::Delete),
    ("COMMIT", StatementKind::Commit),
    ("ROLLBACK", StatementKind::Rollback),
    ("OPEN", StatementKind::Open),
    ("CLOSE", StatementKind::Close),
    ("CONNECT", StatementKind::Connect),
    ("DISCONNECT", StatementKind::Disconnect),
    ("GET DBEVENT", StatementKind::GetDbEvent),
    ("SAVEPOINT", StatementKind::Savepoint),
    ("SET AUTOCOMMIT", StatementKind::SetAutocommit),
    ("EXECUTE PROCEDURE", StatementKind::ExecuteProcedure),
    ("CALL", StatementKind::Call),
    ("COPY", StatementKind::Copy),
    ("CREATE", StatementKind::Create),
    ("ALTER", StatementKind::Alter),
    ("DROP", StatementKind::Drop),
    ("GRANT", StatementKind::Grant),
    ("REVOKE", StatementKind::Revoke),
    ("MODIFY", StatementKind::Modify),
    ("SET", StatementKind::Set),
    ("START TRANSACTION", StatementKind::StartTransaction),
    ("ROLLBACK WORK TO", StatementKind::RollbackWorkTo),
    ("ROLLBACK TO", StatementKind::RollbackTo),
];

fn starts_with_ci(text: &str, phrase: &str) -> bool {
    let t = text.as_bytes();
    let p = phrase.as_bytes();
    t.len() >= p.len() && t[..p.len()].eq_ignore_ascii_case(p)
}

/// Classify submitted SQL text by its leading keyword phrase.
pub fn classify(sql: &str) -> StatementKind {
    let s = sql.trim_start();
    for &(phrase, kind) in SQL_COMMANDS {
        if starts_with_ci(s, phrase) {
            if kind == StatementKind::Rollback && s.len() != phrase.len() {
                // ROLLBACK vs ROLLBACK [WORK] TO: only a bare ROLLBACK is a
                // whole-transaction rollback.
                if starts_with_ci(s, "ROLLBACK WORK TO") {
                    return StatementKind::RollbackWorkTo;
                }
                if starts_with_ci(s, "ROLLBACK TO") {
                    return StatementKind::RollbackTo;
                }
            }
            return kind;
        }
    }
    StatementKind::Other
}

fn phrase_for(kind: StatementKind) -> Option<&'static str> {
    SQL_COMMANDS.iter().find(|&&(_, k)| k == kind).map(|&(p, _)| p)
}

/// Extract the savepoint name from a SAVEPOINT or ROLLBACK..TO statement
/// previously classified as `kind`. The name is the maximal run of
/// alphanumerics, spaces, underscores and double quotes after the keyword
/// phrase; anything else in the statement is a hard parse error rather than
/// a silent truncation.
pub fn savepoint_name(kind: StatementKind, sql: &str) -> DriverResult<String> {
    let phrase = phrase_for(kind).ok_or_else(|| {
        DriverError::malformed(format!("statement kind {:?} carries no savepoint name", kind))
    })?;
    let s = sql.trim_start();
    let rest = s[phrase.len()..].trim_start();
    for ch in rest.chars() {
        if !(ch.is_ascii_alphanumeric() || ch == ' ' || ch == '_' || ch == '"') {
            return Err(DriverError::malformed(format!(
                "invalid character '{}' in savepoint name",
                ch
            )));
        }
    }
    Ok(rest.to_string())
}

/// Detect stored-procedure call syntax and return the procedure name.
///
/// Recognizes `{call name...}` and `{execute procedure name...}`; the name
/// ends at the nearest of `}`, space or `(`. A call with no closing `}` is
/// malformed.
pub fn procedure_name(sql: &str) -> DriverResult<Option<String>> {
    let start = ["{execute procedure", "{call"]
        .iter()
        .find(|p| sql.starts_with(*p))
        .map(|p| sql[p.len()..].trim_start_matches(' '));
    let rest = match start {
        Some(r) => r,
        None => return Ok(None),
    };
    if !rest.contains('}') {
        return Err(DriverError::malformed(
            "call to procedure not terminated with a '}'",
        ));
    }
    let end = rest
        .find(|c| c == '}' || c == ' ' || c == '(')
        .unwrap_or(rest.len());
    Ok(Some(rest[..end].to_string()))
}

/// The transport's native positional-parameter token.
pub const PARAM_TOKEN: &str = "~V";

/// Count `?` placeholders and rewrite each to the vendor token, in one
/// quote-aware pass: question marks inside single- or double-quoted
/// literals are left alone. The token is padded with a space on either
/// side only where the placeholder is not already adjacent to whitespace,
/// since an unpadded token reads as an invalid adjacent operator.
pub fn rewrite_placeholders(sql: &str) -> (String, usize) {
    let mut out = String::with_capacity(sql.len() + 8);
    let mut count = 0usize;
    let mut end_quote: Option<char> = None;
    let mut iter = sql.chars().peekable();

    while let Some(ch) = iter.next() {
        if let Some(q) = end_quote {
            out.push(ch);
            if ch == q {
                end_quote = None;
            }
            continue;
        }
        match ch {
            '\'' | '"' => {
                end_quote = Some(ch);
                out.push(ch);
            }
            '?' => {
                if out.chars().last().map_or(false, |p| !p.is_ascii_whitespace()) {
                    out.push(' ');
                }
                out.push_str(PARAM_TOKEN);
                if iter.peek().map_or(false, |n| !n.is_ascii_whitespace()) {
                    out.push(' ');
                }
                count += 1;
            }
            _ => out.push(ch),
        }
    }
    (out, count)
}
