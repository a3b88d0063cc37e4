//! Utility statement recognition
//!
//! SET/SHOW/RESET and ALTER SYSTEM are matched structurally over the
//! tokenizer output. Because matching works on whole tokens, words such as
//! `SETTINGS` or `RESETTING` never look like a lead keyword.
//!
//! Recognized shapes:
//!
//! - `SET [SESSION|LOCAL] name (=|TO) value [, value ...]`
//! - `SET [SESSION|LOCAL] TIME ZONE value|LOCAL|DEFAULT`
//! - `SET [SESSION|LOCAL] ROLE name`
//! - `SET [SESSION|LOCAL] SESSION AUTHORIZATION name|DEFAULT`
//! - `SET name FROM CURRENT`
//! - `SET [SESSION|LOCAL] TRANSACTION mode [, mode ...]|SNAPSHOT id`
//! - `SET SESSION CHARACTERISTICS AS TRANSACTION mode [, mode ...]`
//! - `SET CONSTRAINTS ALL|name [, name ...] DEFERRED|IMMEDIATE`
//! - `ALTER SYSTEM SET name (=|TO) value [, value ...]`
//! - `ALTER SYSTEM RESET name|ALL`
//! - `SHOW name|ALL|TIME ZONE|SESSION AUTHORIZATION|TRANSACTION ISOLATION LEVEL`
//! - `RESET name|ALL|TIME ZONE|SESSION AUTHORIZATION`

use crate::parser::{is_trivia, unquoted_word};
use pgparser_core::ParseError;
use serde::{Deserialize, Serialize};
use sqlparser::tokenizer::{Location, Token, TokenWithSpan};

/// Shape of a recognized utility statement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UtilityKind {
    Set,
    SetTimeZone,
    SetRole,
    SetSessionAuthorization,
    SetFromCurrent,
    SetTransaction,
    SetSessionCharacteristics,
    SetConstraints,
    AlterSystemSet,
    AlterSystemReset,
    Show,
    Reset,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SetScope {
    Session,
    Local,
}

/// A recognized utility statement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UtilityStatement {
    pub kind: UtilityKind,
    pub scope: Option<SetScope>,

    /// Parameter name; `ALL` for SHOW ALL / RESET ALL
    pub name: Option<String>,

    /// Assigned values; transaction modes for the transaction forms, and
    /// constraint names followed by DEFERRED or IMMEDIATE for SET CONSTRAINTS
    pub values: Vec<String>,
}

impl UtilityStatement {
    fn new(kind: UtilityKind) -> Self {
        Self {
            kind,
            scope: None,
            name: None,
            values: Vec::new(),
        }
    }
}

/// Recognize a utility statement. `tokens` starts at the lead keyword;
/// `eof` is the position reported when input runs out.
pub fn recognize(tokens: &[TokenWithSpan], eof: Location) -> Result<UtilityStatement, ParseError> {
    let mut cursor = Cursor::new(tokens, eof);

    let statement = if cursor.next_keyword("SET") {
        parse_set(&mut cursor)?
    } else if cursor.next_keyword("SHOW") {
        parse_show(&mut cursor)?
    } else if cursor.next_keyword("RESET") {
        parse_reset(&mut cursor, UtilityKind::Reset)?
    } else if cursor.next_keyword("ALTER") {
        cursor.expect_keyword("SYSTEM")?;
        parse_alter_system(&mut cursor)?
    } else {
        return Err(cursor.error("SET, SHOW, RESET or ALTER SYSTEM"));
    };

    cursor.expect_end()?;

    tracing::trace!(kind = ?statement.kind, name = ?statement.name, "recognized utility statement");
    Ok(statement)
}

fn parse_set(cursor: &mut Cursor<'_>) -> Result<UtilityStatement, ParseError> {
    if cursor.next_phrase(&["SESSION", "CHARACTERISTICS", "AS", "TRANSACTION"]) {
        let mut statement = UtilityStatement::new(UtilityKind::SetSessionCharacteristics);
        statement.name = Some("session_characteristics".to_string());
        statement.values = parse_transaction_modes(cursor)?;
        return Ok(statement);
    }

    if cursor.next_keyword("CONSTRAINTS") {
        let mut statement = UtilityStatement::new(UtilityKind::SetConstraints);
        statement.name = Some("constraints".to_string());
        statement.values = parse_constraints(cursor)?;
        return Ok(statement);
    }

    let mut scope = None;

    if !cursor.peek_phrase(&["SESSION", "AUTHORIZATION"]) {
        if cursor.next_keyword("SESSION") {
            scope = Some(SetScope::Session);
        } else if cursor.next_keyword("LOCAL") {
            scope = Some(SetScope::Local);
        }
    }

    // Only one scope modifier is allowed.
    if scope.is_some()
        && !cursor.peek_phrase(&["SESSION", "AUTHORIZATION"])
        && (cursor.peek_keyword("SESSION") || cursor.peek_keyword("LOCAL"))
    {
        return Err(cursor.error("parameter name"));
    }

    let mut statement = if cursor.next_keyword("TRANSACTION") {
        let mut statement = UtilityStatement::new(UtilityKind::SetTransaction);
        statement.name = Some("transaction".to_string());
        statement.values = if cursor.next_keyword("SNAPSHOT") {
            vec![cursor.parse_value("snapshot id")?]
        } else {
            parse_transaction_modes(cursor)?
        };
        statement
    } else if cursor.next_phrase(&["TIME", "ZONE"]) {
        let mut statement = UtilityStatement::new(UtilityKind::SetTimeZone);
        statement.name = Some("timezone".to_string());
        statement.values.push(cursor.parse_value("time zone value")?);
        statement
    } else if cursor.next_keyword("ROLE") {
        let mut statement = UtilityStatement::new(UtilityKind::SetRole);
        statement.name = Some("role".to_string());
        statement.values.push(cursor.parse_value("role name")?);
        statement
    } else if cursor.next_phrase(&["SESSION", "AUTHORIZATION"]) {
        let mut statement = UtilityStatement::new(UtilityKind::SetSessionAuthorization);
        statement.name = Some("session_authorization".to_string());
        statement.values.push(cursor.parse_value("user name")?);
        statement
    } else {
        let name = cursor.parse_name()?;

        if cursor.next_keyword("FROM") {
            cursor.expect_keyword("CURRENT")?;
            let mut statement = UtilityStatement::new(UtilityKind::SetFromCurrent);
            statement.name = Some(name);
            statement
        } else {
            let mut statement = UtilityStatement::new(UtilityKind::Set);
            statement.name = Some(name);
            statement.values = parse_assignment(cursor)?;
            statement
        }
    };

    statement.scope = scope;
    Ok(statement)
}

fn parse_alter_system(cursor: &mut Cursor<'_>) -> Result<UtilityStatement, ParseError> {
    if cursor.next_keyword("SET") {
        let mut statement = UtilityStatement::new(UtilityKind::AlterSystemSet);
        statement.name = Some(cursor.parse_name()?);
        statement.values = parse_assignment(cursor)?;
        Ok(statement)
    } else if cursor.next_keyword("RESET") {
        parse_reset(cursor, UtilityKind::AlterSystemReset)
    } else {
        Err(cursor.error("SET or RESET"))
    }
}

fn parse_show(cursor: &mut Cursor<'_>) -> Result<UtilityStatement, ParseError> {
    let mut statement = UtilityStatement::new(UtilityKind::Show);

    let name = if cursor.next_phrase(&["TIME", "ZONE"]) {
        "timezone".to_string()
    } else if cursor.next_phrase(&["SESSION", "AUTHORIZATION"]) {
        "session_authorization".to_string()
    } else if cursor.next_phrase(&["TRANSACTION", "ISOLATION", "LEVEL"]) {
        "transaction_isolation".to_string()
    } else if cursor.next_keyword("ALL") {
        "ALL".to_string()
    } else {
        cursor.parse_name()?
    };

    statement.name = Some(name);
    Ok(statement)
}

fn parse_reset(cursor: &mut Cursor<'_>, kind: UtilityKind) -> Result<UtilityStatement, ParseError> {
    let mut statement = UtilityStatement::new(kind);

    let name = if cursor.next_phrase(&["TIME", "ZONE"]) {
        "timezone".to_string()
    } else if cursor.next_phrase(&["SESSION", "AUTHORIZATION"]) {
        "session_authorization".to_string()
    } else if cursor.next_keyword("ALL") {
        "ALL".to_string()
    } else {
        cursor.parse_name()?
    };

    statement.name = Some(name);
    Ok(statement)
}

/// Transaction modes, separated by commas or just whitespace
fn parse_transaction_modes(cursor: &mut Cursor<'_>) -> Result<Vec<String>, ParseError> {
    let mut modes = Vec::new();

    loop {
        let mode = if cursor.next_phrase(&["ISOLATION", "LEVEL"]) {
            let level = if cursor.next_keyword("SERIALIZABLE") {
                "SERIALIZABLE"
            } else if cursor.next_phrase(&["REPEATABLE", "READ"]) {
                "REPEATABLE READ"
            } else if cursor.next_phrase(&["READ", "COMMITTED"]) {
                "READ COMMITTED"
            } else if cursor.next_phrase(&["READ", "UNCOMMITTED"]) {
                "READ UNCOMMITTED"
            } else {
                return Err(cursor.error("isolation level"));
            };
            format!("ISOLATION LEVEL {}", level)
        } else if cursor.next_phrase(&["READ", "WRITE"]) {
            "READ WRITE".to_string()
        } else if cursor.next_phrase(&["READ", "ONLY"]) {
            "READ ONLY".to_string()
        } else if cursor.next_keyword("DEFERRABLE") {
            "DEFERRABLE".to_string()
        } else if cursor.next_phrase(&["NOT", "DEFERRABLE"]) {
            "NOT DEFERRABLE".to_string()
        } else {
            return Err(cursor.error("transaction mode"));
        };
        modes.push(mode);

        let comma = cursor.next_token(&Token::Comma);
        if !comma && cursor.peek().is_none() {
            return Ok(modes);
        }
    }
}

/// `ALL|name [, name ...] DEFERRED|IMMEDIATE`
fn parse_constraints(cursor: &mut Cursor<'_>) -> Result<Vec<String>, ParseError> {
    let mut values = if cursor.next_keyword("ALL") {
        vec!["ALL".to_string()]
    } else {
        let mut names = vec![cursor.parse_name()?];
        while cursor.next_token(&Token::Comma) {
            names.push(cursor.parse_name()?);
        }
        names
    };

    if cursor.next_keyword("DEFERRED") {
        values.push("DEFERRED".to_string());
    } else if cursor.next_keyword("IMMEDIATE") {
        values.push("IMMEDIATE".to_string());
    } else {
        return Err(cursor.error("DEFERRED or IMMEDIATE"));
    }

    Ok(values)
}

/// `(=|TO) value [, value ...]`
fn parse_assignment(cursor: &mut Cursor<'_>) -> Result<Vec<String>, ParseError> {
    if !cursor.next_token(&Token::Eq) && !cursor.next_keyword("TO") {
        return Err(cursor.error("= or TO"));
    }

    let mut values = vec![cursor.parse_value("value")?];
    while cursor.next_token(&Token::Comma) {
        values.push(cursor.parse_value("value")?);
    }

    Ok(values)
}

/// Walks significant tokens; a `;` ends the statement.
struct Cursor<'a> {
    tokens: Vec<&'a TokenWithSpan>,
    pos: usize,

    /// What ends the statement (`;` or EOF) and where
    end: (String, Location),
}

impl<'a> Cursor<'a> {
    fn new(tokens: &'a [TokenWithSpan], eof: Location) -> Self {
        let significant = tokens
            .iter()
            .filter(|t| !is_trivia(&t.token) && t.token != Token::EOF);

        let mut body = Vec::new();
        let mut end = ("EOF".to_string(), eof);
        for t in significant {
            if t.token == Token::SemiColon {
                end = (t.token.to_string(), t.span.start);
                break;
            }
            body.push(t);
        }

        Self {
            tokens: body,
            pos: 0,
            end,
        }
    }

    fn peek(&self) -> Option<&'a Token> {
        self.peek_nth(0)
    }

    fn peek_nth(&self, n: usize) -> Option<&'a Token> {
        self.tokens.get(self.pos + n).map(|t| &t.token)
    }

    fn peek_keyword(&self, keyword: &str) -> bool {
        self.peek()
            .and_then(unquoted_word)
            .is_some_and(|w| w.eq_ignore_ascii_case(keyword))
    }

    fn peek_phrase(&self, phrase: &[&str]) -> bool {
        phrase.iter().enumerate().all(|(i, keyword)| {
            self.peek_nth(i)
                .and_then(unquoted_word)
                .is_some_and(|w| w.eq_ignore_ascii_case(keyword))
        })
    }

    fn next_keyword(&mut self, keyword: &str) -> bool {
        self.next_phrase(&[keyword])
    }

    fn next_phrase(&mut self, phrase: &[&str]) -> bool {
        if self.peek_phrase(phrase) {
            self.pos += phrase.len();
            true
        } else {
            false
        }
    }

    fn next_token(&mut self, token: &Token) -> bool {
        if self.peek() == Some(token) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect_keyword(&mut self, keyword: &str) -> Result<(), ParseError> {
        if self.next_keyword(keyword) {
            Ok(())
        } else {
            Err(self.error(keyword))
        }
    }

    fn expect_end(&self) -> Result<(), ParseError> {
        match self.peek() {
            None => Ok(()),
            Some(_) => Err(self.error("end of statement")),
        }
    }

    /// Possibly dotted parameter name
    fn parse_name(&mut self) -> Result<String, ParseError> {
        let mut name = match self.peek() {
            Some(Token::Word(w)) => w.value.clone(),
            _ => return Err(self.error("parameter name")),
        };
        self.pos += 1;

        while self.peek() == Some(&Token::Period) {
            match self.peek_nth(1) {
                Some(Token::Word(w)) => {
                    name.push('.');
                    name.push_str(&w.value);
                    self.pos += 2;
                }
                _ => {
                    self.pos += 1;
                    return Err(self.error("parameter name"));
                }
            }
        }

        Ok(name)
    }

    /// Identifier, keyword, optionally signed number, or quoted string
    fn parse_value(&mut self, expected: &str) -> Result<String, ParseError> {
        let value = match self.peek() {
            Some(Token::Minus) | Some(Token::Plus) => match self.peek_nth(1) {
                Some(number @ Token::Number(_, _)) => {
                    let sign = if self.peek() == Some(&Token::Minus) { "-" } else { "" };
                    self.pos += 1;
                    format!("{}{}", sign, number)
                }
                _ => {
                    self.pos += 1;
                    return Err(self.error("number"));
                }
            },
            Some(token @ Token::Word(_))
            | Some(token @ Token::Number(_, _))
            | Some(token @ Token::SingleQuotedString(_))
            | Some(token @ Token::EscapedStringLiteral(_))
            | Some(token @ Token::DollarQuotedString(_)) => token.to_string(),
            _ => return Err(self.error(expected)),
        };

        self.pos += 1;
        Ok(value)
    }

    fn error(&self, expected: &str) -> ParseError {
        match self.tokens.get(self.pos) {
            Some(t) => ParseError::syntax(
                format!("Expected: {}, found: {}", expected, t.token),
                t.span.start.line,
                t.span.start.column,
            ),
            None => {
                let (found, location) = &self.end;
                ParseError::syntax(
                    format!("Expected: {}, found: {}", expected, found),
                    location.line,
                    location.column,
                )
            }
        }
    }
}
