//! SQL parsing using sqlparser-rs (PostgreSQL dialect)
//!
//! Tokenizes the input once, normalizes `?` placeholders, and parses only
//! the first statement. Statements led by SET/SHOW/RESET or ALTER SYSTEM
//! are handed to the utility recognizer instead of the grammar.

use crate::utility::{self, UtilityStatement};
use pgparser_core::{ParseError, ParserOptions, SyntaxError};
use sqlparser::ast::Statement;
use sqlparser::dialect::PostgreSqlDialect;
use sqlparser::keywords::Keyword;
use sqlparser::parser::{Parser, ParserError};
use sqlparser::tokenizer::{Location, Token, TokenWithSpan, Tokenizer};

/// SQL parser for the PostgreSQL dialect
pub struct SqlParser {
    options: ParserOptions,
}

impl SqlParser {
    /// Create a parser with default options
    pub fn new() -> Self {
        Self {
            options: ParserOptions::default(),
        }
    }

    /// Create a parser with explicit options
    pub fn with_options(options: ParserOptions) -> Self {
        Self { options }
    }

    /// Parse the first statement of `sql`
    ///
    /// Anything after the first top-level `;` is ignored once it tokenizes.
    pub fn parse(&self, sql: &str) -> Result<ParsedSql, ParseError> {
        let mut tokens = tokenize(sql)?;

        if self.options.question_mark_placeholders {
            normalize_placeholders(&mut tokens);
        }

        let start = tokens
            .iter()
            .position(|t| !is_trivia(&t.token) && t.token != Token::SemiColon)
            .unwrap_or(tokens.len());
        let tokens: Vec<TokenWithSpan> = tokens.split_off(start);

        if is_utility_lead(&tokens) {
            let statement = utility::recognize(&tokens, end_of_input(sql))?;
            return Ok(ParsedSql {
                sql: sql.to_string(),
                tree: SyntaxTree::Utility(statement),
            });
        }

        let statement = self.parse_statement(tokens, sql)?;
        Ok(ParsedSql {
            sql: sql.to_string(),
            tree: SyntaxTree::Statement(Box::new(statement)),
        })
    }

    fn parse_statement(&self, tokens: Vec<TokenWithSpan>, sql: &str) -> Result<Statement, ParseError> {
        let dialect = PostgreSqlDialect {};
        let mut parser = Parser::new(&dialect)
            .with_recursion_limit(self.options.recursion_limit)
            .with_tokens_with_locations(tokens);

        let statement = match parser.parse_statement() {
            Ok(statement) => statement,
            Err(e) => {
                let fallback = parser.peek_token().span.start;
                return Err(syntax_error(e, fallback, sql));
            }
        };

        let next = parser.peek_token();
        match next.token {
            Token::EOF | Token::SemiColon => Ok(statement),
            other => Err(ParseError::syntax(
                format!("Expected: end of statement, found: {}", other),
                next.span.start.line,
                next.span.start.column,
            )),
        }
    }
}

impl Default for SqlParser {
    fn default() -> Self {
        Self::new()
    }
}

/// Syntax tree of the first statement
#[derive(Debug, Clone, PartialEq)]
pub enum SyntaxTree {
    /// A statement produced by the grammar
    Statement(Box<Statement>),

    /// A SET/SHOW/RESET shaped statement
    Utility(UtilityStatement),
}

/// Successfully parsed SQL
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedSql {
    /// Original SQL string
    pub sql: String,

    pub tree: SyntaxTree,
}

impl ParsedSql {
    /// Get the grammar statement, if this is not a utility statement
    pub fn statement(&self) -> Option<&Statement> {
        match &self.tree {
            SyntaxTree::Statement(statement) => Some(statement),
            SyntaxTree::Utility(_) => None,
        }
    }

    /// Check if this is a SELECT statement
    pub fn is_select(&self) -> bool {
        matches!(self.statement(), Some(Statement::Query(_)))
    }
}

/// Tokenize `sql` with the PostgreSQL dialect.
///
/// The dialect folds the character after a bare `?` into the `?` token, so
/// `(?,?)` would lose its commas. Each such `?` is cut back to one character
/// and tokenizing resumes right after it.
fn tokenize(sql: &str) -> Result<Vec<TokenWithSpan>, ParseError> {
    let dialect = PostgreSqlDialect {};
    let mut tokens = Vec::new();
    let mut rest = sql;
    let mut origin = Location { line: 1, column: 1 };

    loop {
        let mut chunk = Vec::new();
        let result = Tokenizer::new(&dialect, rest).tokenize_with_location_into_buf(&mut chunk);

        let cut = chunk.iter().position(swallows_next_char).and_then(|index| {
            let start = chunk[index].span.start;
            let offset = offset_of(rest, start)? + 1;
            Some((index, start, offset))
        });

        let Some((index, start, offset)) = cut else {
            tokens.extend(chunk.into_iter().map(|t| shift_token(t, origin)));
            return match result {
                Ok(()) => Ok(tokens),
                Err(e) => {
                    let at = shift(e.location, origin);
                    Err(ParseError::syntax(e.message, at.line, at.column))
                }
            };
        };

        let end = Location {
            line: start.line,
            column: start.column + 1,
        };
        chunk.truncate(index + 1);
        chunk[index].span.end = end;
        tokens.extend(chunk.into_iter().map(|t| shift_token(t, origin)));

        tracing::trace!(line = start.line, column = start.column, "re-tokenizing after ?");
        origin = shift(end, origin);
        rest = &rest[offset..];
    }
}

fn swallows_next_char(t: &TokenWithSpan) -> bool {
    t.token == Token::Question
        && (t.span.end.line != t.span.start.line || t.span.end.column != t.span.start.column + 1)
}

/// Map a location inside a chunk that starts at `origin` back to the input
fn shift(location: Location, origin: Location) -> Location {
    match location.line {
        0 => location,
        1 => Location {
            line: origin.line,
            column: location.column + origin.column - 1,
        },
        line => Location {
            line: line + origin.line - 1,
            column: location.column,
        },
    }
}

fn shift_token(mut t: TokenWithSpan, origin: Location) -> TokenWithSpan {
    t.span.start = shift(t.span.start, origin);
    t.span.end = shift(t.span.end, origin);
    t
}

pub(crate) fn is_trivia(token: &Token) -> bool {
    matches!(token, Token::Whitespace(_))
}

fn is_utility_lead(tokens: &[TokenWithSpan]) -> bool {
    let mut words = tokens.iter().filter(|t| !is_trivia(&t.token));

    match words.next().and_then(|t| unquoted_word(&t.token)) {
        Some(w) if ["SET", "SHOW", "RESET"].iter().any(|k| w.eq_ignore_ascii_case(k)) => true,
        Some(w) if w.eq_ignore_ascii_case("ALTER") => words
            .next()
            .and_then(|t| unquoted_word(&t.token))
            .is_some_and(|w| w.eq_ignore_ascii_case("SYSTEM")),
        _ => false,
    }
}

pub(crate) fn unquoted_word(token: &Token) -> Option<&str> {
    match token {
        Token::Word(w) if w.quote_style.is_none() => Some(&w.value),
        _ => None,
    }
}

/// Rewrite `?` into a positional placeholder unless it follows an operand,
/// where PostgreSQL reads it as the jsonb key-exists operator.
fn normalize_placeholders(tokens: &mut [TokenWithSpan]) {
    let mut after_operand = false;

    for t in tokens.iter_mut() {
        if is_trivia(&t.token) {
            continue;
        }

        if t.token == Token::Question && !after_operand {
            t.token = Token::Placeholder("?".to_string());
        }

        after_operand = ends_operand(&t.token);
    }
}

fn ends_operand(token: &Token) -> bool {
    match token {
        Token::Word(w) if w.quote_style.is_some() => true,
        Token::Word(w) => !matches!(
            w.keyword,
            Keyword::SELECT
                | Keyword::WHERE
                | Keyword::AND
                | Keyword::OR
                | Keyword::NOT
                | Keyword::ON
                | Keyword::SET
                | Keyword::VALUES
                | Keyword::BY
                | Keyword::LIMIT
                | Keyword::OFFSET
                | Keyword::WHEN
                | Keyword::THEN
                | Keyword::ELSE
                | Keyword::CASE
                | Keyword::IN
                | Keyword::IS
                | Keyword::LIKE
                | Keyword::ILIKE
                | Keyword::BETWEEN
                | Keyword::HAVING
                | Keyword::RETURNING
                | Keyword::DISTINCT
                | Keyword::ANY
                | Keyword::ALL
                | Keyword::SOME
                | Keyword::FETCH
                | Keyword::USING
        ),
        Token::Number(_, _)
        | Token::SingleQuotedString(_)
        | Token::DollarQuotedString(_)
        | Token::Placeholder(_)
        | Token::RParen
        | Token::RBracket => true,
        _ => false,
    }
}

/// Position just past the last character of the input
pub(crate) fn end_of_input(sql: &str) -> Location {
    let mut line = 1;
    let mut column = 1;

    for ch in sql.chars() {
        if ch == '\n' {
            line += 1;
            column = 1;
        } else {
            column += 1;
        }
    }

    Location { line, column }
}

/// Byte offset of a 1-based line/column position
pub(crate) fn offset_of(sql: &str, location: Location) -> Option<usize> {
    if location.line == 0 || location.column == 0 {
        return None;
    }

    let mut line = 1;
    let mut column = 1;
    for (offset, ch) in sql.char_indices() {
        if line == location.line && column == location.column {
            return Some(offset);
        }
        if ch == '\n' {
            line += 1;
            column = 1;
        } else {
            column += 1;
        }
    }

    (line == location.line && column == location.column).then_some(sql.len())
}

fn syntax_error(error: ParserError, fallback: Location, sql: &str) -> ParseError {
    let message = match error {
        ParserError::ParserError(msg) | ParserError::TokenizerError(msg) => msg,
        ParserError::RecursionLimitExceeded => "recursion limit exceeded".to_string(),
    };

    let (message, line, column) = match split_position(&message) {
        Some((text, line, column)) => (text.to_string(), line, column),
        None if fallback.line == 0 => {
            let end = end_of_input(sql);
            (message, end.line, end.column)
        }
        None => (message, fallback.line, fallback.column),
    };

    ParseError::Syntax(vec![SyntaxError::new(message, line, column)])
}

/// Split `"... at Line: 3, Column: 7"` into the message and its position
fn split_position(message: &str) -> Option<(&str, u64, u64)> {
    let idx = message.rfind(" at Line: ")?;
    let (text, position) = message.split_at(idx);
    let position = position.trim_start_matches(" at Line: ");

    let (line, column) = position.split_once(", Column: ")?;
    let line = line.trim().parse().ok()?;
    let column = column.trim().parse().ok()?;

    Some((text, line, column))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_select() {
        let parser = SqlParser::new();
        let parsed = parser.parse("SELECT id, name FROM users").unwrap();

        assert!(parsed.is_select());
        assert!(parsed.statement().is_some());
    }

    #[test]
    fn test_only_first_statement_is_parsed() {
        let parsed = SqlParser::new()
            .parse("SELECT 1; this is not sql at all")
            .unwrap();
        assert!(parsed.is_select());
    }

    #[test]
    fn test_leading_semicolons_skipped() {
        let parsed = SqlParser::new().parse(" ;; SELECT 1").unwrap();
        assert!(parsed.is_select());
    }

    #[test]
    fn test_empty_input_is_error() {
        assert!(SqlParser::new().parse("").is_err());
        assert!(SqlParser::new().parse("  ;  ").is_err());
    }

    #[test]
    fn test_invalid_sql_has_position() {
        let err = SqlParser::new()
            .parse("SELECT * FROM (SELECT 1")
            .unwrap_err();

        let first = &err.errors()[0];
        assert_eq!(first.line, 1);
        assert!(first.column > 0);
    }

    #[test]
    fn test_trailing_garbage_is_error() {
        assert!(SqlParser::new().parse("SELECT 1 2").is_err());
    }

    fn significant(sql: &str) -> Vec<Token> {
        tokenize(sql)
            .unwrap()
            .into_iter()
            .map(|t| t.token)
            .filter(|t| !is_trivia(t))
            .collect()
    }

    #[test]
    fn test_question_mark_placeholders() {
        let parsed = SqlParser::new()
            .parse("INSERT INTO t (a, b) VALUES (?, ?)")
            .unwrap();
        assert!(parsed.statement().is_some());

        let parsed = SqlParser::new()
            .parse("INSERT INTO t (a, b, c) VALUES (?,?,?)")
            .unwrap();
        assert!(parsed.statement().is_some());
    }

    #[test]
    fn test_question_mark_keeps_following_character() {
        assert_eq!(
            significant("(?,?)"),
            vec![
                Token::LParen,
                Token::Question,
                Token::Comma,
                Token::Question,
                Token::RParen
            ]
        );
        assert_eq!(
            significant("body ?'k'"),
            vec![
                Token::make_word("body", None),
                Token::Question,
                Token::SingleQuotedString("k".to_string())
            ]
        );
        assert_eq!(significant("a ?| b").len(), 3);
    }

    #[test]
    fn test_locations_after_question_mark() {
        let tokens = tokenize("SELECT ?\n, x").unwrap();

        let question = tokens.iter().find(|t| t.token == Token::Question).unwrap();
        assert_eq!((question.span.start.line, question.span.start.column), (1, 8));
        assert_eq!((question.span.end.line, question.span.end.column), (1, 9));

        let x = tokens.last().unwrap();
        assert_eq!(x.token, Token::make_word("x", None));
        assert_eq!((x.span.start.line, x.span.start.column), (2, 3));
    }

    #[test]
    fn test_tokenizer_error_after_question_mark_is_positioned() {
        let err = SqlParser::new()
            .parse("SELECT * FROM t WHERE a = ? AND b = 'open")
            .unwrap_err();

        let first = &err.errors()[0];
        assert_eq!(first.line, 1);
        assert_eq!(first.column, 37);
    }

    #[test]
    fn test_offsets_count_characters() {
        let sql = "SELECT 'é'\nFROM t";
        assert_eq!(offset_of(sql, Location { line: 2, column: 1 }), Some(12));
        assert_eq!(offset_of(sql, Location { line: 0, column: 0 }), None);
    }

    #[test]
    fn test_utility_lead_detection() {
        let parsed = SqlParser::new().parse("set search_path = public").unwrap();
        assert!(matches!(parsed.tree, SyntaxTree::Utility(_)));

        let parsed = SqlParser::new().parse("ALTER SYSTEM SET work_mem = '64MB'").unwrap();
        assert!(matches!(parsed.tree, SyntaxTree::Utility(_)));
    }

    #[test]
    fn test_split_position() {
        let (text, line, column) =
            split_position("Expected: an expression, found: EOF at Line: 2, Column: 14").unwrap();
        assert_eq!(text, "Expected: an expression, found: EOF");
        assert_eq!((line, column), (2, 14));

        assert!(split_position("no position here").is_none());
    }

    #[test]
    fn test_end_of_input() {
        let end = end_of_input("SET\n  x");
        assert_eq!((end.line, end.column), (2, 4));
    }
}
