//! Tokenizer for the restricted SELECT dialect.
//! Positions are 1-based character offsets, as PostgreSQL reports them.

use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, PartialEq)]
pub enum TokKind {
    /// Identifier or keyword. `quoted` words are never keywords.
    Word { text: String, quoted: bool },
    Number(String),
    Str(String),
    /// `?` or `$n`
    Param(String),
    Star,
    Comma,
    Semicolon,
    LParen,
    RParen,
    Dot,
    Eq,
    /// Any other operator (`<`, `>=`, `<>`, `!=`, `-`, `+`, ...)
    Op(String),
    Eof,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokKind,
    pub pos: usize,
}

impl Token {
    /// Case-insensitive keyword match; quoted identifiers never match.
    pub fn is_kw(&self, kw: &str) -> bool {
        matches!(&self.kind, TokKind::Word { text, quoted: false } if text.eq_ignore_ascii_case(kw))
    }

    /// Source-like rendering used in "syntax error at or near" messages.
    pub fn display(&self) -> String {
        match &self.kind {
            TokKind::Word { text, quoted: false } => text.clone(),
            TokKind::Word { text, quoted: true } => format!("\"{}\"", text),
            TokKind::Number(n) => n.clone(),
            TokKind::Str(s) => format!("'{}'", s),
            TokKind::Param(p) => p.clone(),
            TokKind::Star => "*".into(),
            TokKind::Comma => ",".into(),
            TokKind::Semicolon => ";".into(),
            TokKind::LParen => "(".into(),
            TokKind::RParen => ")".into(),
            TokKind::Dot => ".".into(),
            TokKind::Eq => "=".into(),
            TokKind::Op(o) => o.clone(),
            TokKind::Eof => String::new(),
        }
    }
}

const OP_CHARS: &[char] = &['<', '>', '!', '-', '+', '/', '%', '^', '|', '&', '~', '#', '@', ':'];

pub fn tokenize(sql: &str) -> AppResult<Vec<Token>> {
    let chars: Vec<char> = sql.chars().collect();
    let mut out: Vec<Token> = Vec::new();
    let mut i = 0usize;
    while i < chars.len() {
        let c = chars[i];
        let pos = i + 1;
        if c.is_whitespace() { i += 1; continue; }
        // -- line comment
        if c == '-' && chars.get(i + 1) == Some(&'-') {
            while i < chars.len() && chars[i] != '\n' { i += 1; }
            continue;
        }
        // /* block comment */
        if c == '/' && chars.get(i + 1) == Some(&'*') {
            let mut j = i + 2;
            loop {
                if j + 1 >= chars.len() { return Err(AppError::syntax(pos, "unterminated /* comment")); }
                if chars[j] == '*' && chars[j + 1] == '/' { break; }
                j += 1;
            }
            i = j + 2;
            continue;
        }
        if c.is_ascii_alphabetic() || c == '_' {
            let start = i;
            while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '_' || chars[i] == '$') { i += 1; }
            out.push(Token { kind: TokKind::Word { text: chars[start..i].iter().collect(), quoted: false }, pos });
            continue;
        }
        if c.is_ascii_digit() || (c == '.' && chars.get(i + 1).map(|d| d.is_ascii_digit()).unwrap_or(false)) {
            let start = i;
            while i < chars.len() && chars[i].is_ascii_digit() { i += 1; }
            if i < chars.len() && chars[i] == '.' {
                i += 1;
                while i < chars.len() && chars[i].is_ascii_digit() { i += 1; }
            }
            if i < chars.len() && (chars[i] == 'e' || chars[i] == 'E') {
                let mut j = i + 1;
                if j < chars.len() && (chars[j] == '+' || chars[j] == '-') { j += 1; }
                if j < chars.len() && chars[j].is_ascii_digit() {
                    while j < chars.len() && chars[j].is_ascii_digit() { j += 1; }
                    i = j;
                }
            }
            if i < chars.len() && (chars[i].is_ascii_alphabetic() || chars[i] == '_') {
                return Err(AppError::syntax(i + 1, format!("trailing junk after numeric literal at or near \"{}\"", chars[start..=i].iter().collect::<String>())));
            }
            out.push(Token { kind: TokKind::Number(chars[start..i].iter().collect()), pos });
            continue;
        }
        match c {
            '\'' => {
                let mut s = String::new();
                let mut j = i + 1;
                loop {
                    if j >= chars.len() { return Err(AppError::syntax(pos, "unterminated quoted string")); }
                    if chars[j] == '\'' {
                        if chars.get(j + 1) == Some(&'\'') { s.push('\''); j += 2; continue; }
                        break;
                    }
                    s.push(chars[j]);
                    j += 1;
                }
                out.push(Token { kind: TokKind::Str(s), pos });
                i = j + 1;
            }
            '"' => {
                let mut s = String::new();
                let mut j = i + 1;
                loop {
                    if j >= chars.len() { return Err(AppError::syntax(pos, "unterminated quoted identifier")); }
                    if chars[j] == '"' {
                        if chars.get(j + 1) == Some(&'"') { s.push('"'); j += 2; continue; }
                        break;
                    }
                    s.push(chars[j]);
                    j += 1;
                }
                if s.is_empty() { return Err(AppError::syntax(pos, "zero-length delimited identifier")); }
                out.push(Token { kind: TokKind::Word { text: s, quoted: true }, pos });
                i = j + 1;
            }
            '?' => { out.push(Token { kind: TokKind::Param("?".into()), pos }); i += 1; }
            '$' => {
                let start = i;
                i += 1;
                while i < chars.len() && chars[i].is_ascii_digit() { i += 1; }
                out.push(Token { kind: TokKind::Param(chars[start..i].iter().collect()), pos });
            }
            '*' => { out.push(Token { kind: TokKind::Star, pos }); i += 1; }
            ',' => { out.push(Token { kind: TokKind::Comma, pos }); i += 1; }
            ';' => { out.push(Token { kind: TokKind::Semicolon, pos }); i += 1; }
            '(' => { out.push(Token { kind: TokKind::LParen, pos }); i += 1; }
            ')' => { out.push(Token { kind: TokKind::RParen, pos }); i += 1; }
            '.' => { out.push(Token { kind: TokKind::Dot, pos }); i += 1; }
            '=' => { out.push(Token { kind: TokKind::Eq, pos }); i += 1; }
            _ if OP_CHARS.contains(&c) => {
                let start = i;
                while i < chars.len() && (OP_CHARS.contains(&chars[i]) || chars[i] == '=') { i += 1; }
                out.push(Token { kind: TokKind::Op(chars[start..i].iter().collect()), pos });
            }
            other => return Err(AppError::syntax(pos, format!("syntax error at or near \"{}\"", other))),
        }
    }
    out.push(Token { kind: TokKind::Eof, pos: chars.len() + 1 });
    Ok(out)
}

/// Forward-only cursor over a token stream. The stream always ends with `Eof`.
pub struct TokenCursor {
    toks: Vec<Token>,
    i: usize,
}

impl TokenCursor {
    pub fn new(toks: Vec<Token>) -> Self { Self { toks, i: 0 } }

    pub fn peek(&self) -> &Token {
        let last = self.toks.len().saturating_sub(1);
        &self.toks[self.i.min(last)]
    }

    pub fn peek_at(&self, ahead: usize) -> &Token {
        let last = self.toks.len().saturating_sub(1);
        &self.toks[(self.i + ahead).min(last)]
    }

    pub fn next(&mut self) -> Token {
        let t = self.peek().clone();
        if !matches!(t.kind, TokKind::Eof) { self.i += 1; }
        t
    }

    pub fn eat_kw(&mut self, kw: &str) -> bool {
        if self.peek().is_kw(kw) { self.i += 1; true } else { false }
    }

    pub fn eat(&mut self, kind: &TokKind) -> bool {
        if &self.peek().kind == kind { self.i += 1; true } else { false }
    }

    pub fn expect_kw(&mut self, kw: &str) -> AppResult<()> {
        if self.eat_kw(kw) { Ok(()) } else { Err(self.unexpected()) }
    }

    /// `syntax error at or near "<tok>"` (or `at end of input`) at the current token.
    pub fn unexpected(&self) -> AppError {
        let t = self.peek();
        match t.kind {
            TokKind::Eof => AppError::syntax(t.pos, "syntax error at end of input"),
            _ => AppError::syntax(t.pos, format!("syntax error at or near \"{}\"", t.display())),
        }
    }

    /// Accept one optional trailing `;`, then require end of input.
    pub fn finish(&mut self) -> AppResult<()> {
        self.eat(&TokKind::Semicolon);
        if matches!(self.peek().kind, TokKind::Eof) { Ok(()) } else { Err(self.unexpected()) }
    }
}
