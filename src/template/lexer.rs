//! Splits template source into text runs and tag tokens.
//!
//! Outside tags everything is literal text. Inside `{{ }}` and `{% %}` the
//! source is cut into names, literals and operators. `{# #}` comments are
//! dropped. A `-` right inside a delimiter (`{{-`, `-%}`) trims the whitespace
//! of the neighbouring text.

use crate::error::{WidgetError, WidgetResult};

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Tok {
    Text(String),
    VarStart,
    VarEnd,
    BlockStart,
    BlockEnd,
    Name(String),
    Str(String),
    Int(i64),
    Float(f64),
    Op(&'static str),
    Eof,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Token {
    pub tok: Tok,
    pub line: usize,
    pub column: usize,
}

const TWO_CHAR_OPS: &[&str] = &["==", "!=", "<=", ">="];
const ONE_CHAR_OPS: &[&str] = &[
    "<", ">", "+", "-", "*", "/", "%", "~", "|", ".", ",", "(", ")", "[", "]", ":", "=",
];

#[derive(Clone, Copy, PartialEq)]
enum TagKind {
    Var,
    Block,
}

impl TagKind {
    fn closer(self) -> &'static str {
        match self {
            TagKind::Var => "}}",
            TagKind::Block => "%}",
        }
    }
}

struct Lexer<'a> {
    src: &'a str,
    pos: usize,
    line: usize,
    column: usize,
    tokens: Vec<Token>,
    trim_next_text: bool,
}

pub(crate) fn tokenize(src: &str) -> WidgetResult<Vec<Token>> {
    let mut lexer = Lexer {
        src,
        pos: 0,
        line: 1,
        column: 1,
        tokens: Vec::new(),
        trim_next_text: false,
    };
    lexer.run()?;
    Ok(lexer.tokens)
}

impl<'a> Lexer<'a> {
    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn bump_str(&mut self, s: &str) {
        for _ in s.chars() {
            self.bump();
        }
    }

    fn error(&self, line: usize, column: usize, message: impl Into<String>) -> WidgetError {
        WidgetError::TemplateSyntax {
            line,
            column,
            message: message.into(),
        }
    }

    fn push(&mut self, tok: Tok, line: usize, column: usize) {
        self.tokens.push(Token { tok, line, column });
    }

    fn run(&mut self) -> WidgetResult<()> {
        while self.pos < self.src.len() {
            let next_tag = next_tag_offset(self.rest());

            let text_len = next_tag.unwrap_or(self.rest().len());
            let (line, column) = (self.line, self.column);
            let raw = &self.rest()[..text_len];
            self.bump_str(raw);
            let mut text = raw.to_string();

            if self.trim_next_text {
                text = text.trim_start().to_string();
                self.trim_next_text = false;
            }
            if next_tag.is_some() && self.rest()[2..].starts_with('-') {
                text = text.trim_end().to_string();
            }
            if !text.is_empty() {
                self.push(Tok::Text(text), line, column);
            }

            if next_tag.is_none() {
                break;
            }
            self.lex_tag()?;
        }

        self.push(Tok::Eof, self.line, self.column);
        Ok(())
    }

    fn lex_tag(&mut self) -> WidgetResult<()> {
        let (line, column) = (self.line, self.column);
        let opener = &self.rest()[..2];

        let kind = match opener {
            "{#" => return self.lex_comment(line, column),
            "{{" => TagKind::Var,
            _ => TagKind::Block,
        };

        self.bump_str(opener);
        if self.peek() == Some('-') {
            self.bump();
        }
        self.push(
            match kind {
                TagKind::Var => Tok::VarStart,
                TagKind::Block => Tok::BlockStart,
            },
            line,
            column,
        );

        loop {
            while self.peek().is_some_and(char::is_whitespace) {
                self.bump();
            }

            let closer = kind.closer();
            let (tok_line, tok_column) = (self.line, self.column);
            let rest = self.rest();

            if rest.is_empty() {
                return Err(self.error(line, column, format!("unclosed tag, expected '{}'", closer)));
            }
            if rest.starts_with('-') && rest[1..].starts_with(closer) {
                self.bump_str("-");
                self.bump_str(closer);
                self.trim_next_text = true;
                self.push(close_tok(kind), tok_line, tok_column);
                return Ok(());
            }
            if rest.starts_with(closer) {
                self.bump_str(closer);
                self.push(close_tok(kind), tok_line, tok_column);
                return Ok(());
            }

            let tok = self.lex_expression_token()?;
            self.push(tok, tok_line, tok_column);
        }
    }

    fn lex_comment(&mut self, line: usize, column: usize) -> WidgetResult<()> {
        let Some(end) = self.rest().find("#}") else {
            return Err(self.error(line, column, "unclosed comment, expected '#}'"));
        };
        let body = &self.rest()[..end];
        if body.ends_with('-') {
            self.trim_next_text = true;
        }
        self.bump_str(body);
        self.bump_str("#}");
        Ok(())
    }

    fn lex_expression_token(&mut self) -> WidgetResult<Tok> {
        let (line, column) = (self.line, self.column);
        let Some(c) = self.peek() else {
            return Err(self.error(line, column, "unexpected end of template"));
        };

        if c.is_ascii_digit() {
            return self.lex_number(line, column);
        }
        if c.is_ascii_alphabetic() || c == '_' {
            let start = self.pos;
            while self.peek().is_some_and(|c| c.is_ascii_alphanumeric() || c == '_') {
                self.bump();
            }
            return Ok(Tok::Name(self.src[start..self.pos].to_string()));
        }
        if c == '"' || c == '\'' {
            return self.lex_string(c, line, column);
        }

        let rest = self.rest();
        for op in TWO_CHAR_OPS.iter().chain(ONE_CHAR_OPS) {
            if rest.starts_with(*op) {
                self.bump_str(op);
                return Ok(Tok::Op(*op));
            }
        }

        Err(self.error(line, column, format!("unexpected character '{}'", c)))
    }

    fn lex_number(&mut self, line: usize, column: usize) -> WidgetResult<Tok> {
        let start = self.pos;
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.bump();
        }

        // `1.5` is a float, `items.0.name` keeps the dot as attribute access.
        let rest = self.rest();
        let is_float = rest.starts_with('.')
            && rest[1..].chars().next().is_some_and(|c| c.is_ascii_digit())
            && !self.follows_attribute_dot(start);
        if is_float {
            self.bump();
            while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                self.bump();
            }
            let text = &self.src[start..self.pos];
            return text
                .parse::<f64>()
                .map(Tok::Float)
                .map_err(|_| self.error(line, column, format!("invalid number '{}'", text)));
        }

        let text = &self.src[start..self.pos];
        text.parse::<i64>()
            .map(Tok::Int)
            .map_err(|_| self.error(line, column, format!("number '{}' is too large", text)))
    }

    /// True when the digits at `start` are themselves an attribute name (`a.0`).
    fn follows_attribute_dot(&self, start: usize) -> bool {
        matches!(self.tokens.last(), Some(Token { tok: Tok::Op("."), .. }))
            && self.src[..start].ends_with('.')
    }

    fn lex_string(&mut self, quote: char, line: usize, column: usize) -> WidgetResult<Tok> {
        self.bump();
        let mut value = String::new();
        loop {
            match self.bump() {
                None => return Err(self.error(line, column, "unterminated string literal")),
                Some(c) if c == quote => return Ok(Tok::Str(value)),
                Some('\\') => match self.bump() {
                    Some('n') => value.push('\n'),
                    Some('t') => value.push('\t'),
                    Some('r') => value.push('\r'),
                    Some(other) => value.push(other),
                    None => return Err(self.error(line, column, "unterminated string literal")),
                },
                Some(c) => value.push(c),
            }
        }
    }
}

/// Byte offset of the next `{{`, `{%` or `{#` in `text`, in one pass.
fn next_tag_offset(text: &str) -> Option<usize> {
    let bytes = text.as_bytes();
    (0..bytes.len().saturating_sub(1))
        .find(|&i| bytes[i] == b'{' && matches!(bytes[i + 1], b'{' | b'%' | b'#'))
}

fn close_tok(kind: TagKind) -> Tok {
    match kind {
        TagKind::Var => Tok::VarEnd,
        TagKind::Block => Tok::BlockEnd,
    }
}
