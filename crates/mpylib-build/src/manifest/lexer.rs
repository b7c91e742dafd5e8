//! Tokenizer for manifest descriptors
//!
//! Handles the slice of Python's lexical grammar that manifests use:
//! names, string and integer literals, brackets, and significant
//! indentation for `if` blocks.

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Name(String),
    Str(String),
    Int(i64),
    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
    Dot,
    Equals,
    Colon,
    Minus,
    Newline,
    Indent,
    Dedent,
    Eof,
}

impl std::fmt::Display for TokenKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Name(name) => write!(f, "'{}'", name),
            Self::Str(_) => write!(f, "string literal"),
            Self::Int(value) => write!(f, "{}", value),
            Self::LParen => write!(f, "'('"),
            Self::RParen => write!(f, "')'"),
            Self::LBracket => write!(f, "'['"),
            Self::RBracket => write!(f, "']'"),
            Self::Comma => write!(f, "','"),
            Self::Dot => write!(f, "'.'"),
            Self::Equals => write!(f, "'='"),
            Self::Colon => write!(f, "':'"),
            Self::Minus => write!(f, "'-'"),
            Self::Newline => write!(f, "end of line"),
            Self::Indent => write!(f, "indent"),
            Self::Dedent => write!(f, "dedent"),
            Self::Eof => write!(f, "end of file"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub line: usize,
}

/// Lexing failure: line and message
#[derive(Debug, Clone, PartialEq)]
pub struct LexError {
    pub line: usize,
    pub message: String,
}

pub struct Lexer {
    chars: Vec<char>,
    pos: usize,
    line: usize,
    depth: usize,
    at_line_start: bool,
    indents: Vec<usize>,
    tokens: Vec<Token>,
}

impl Lexer {
    pub fn new(source: &str) -> Self {
        Self {
            chars: source.chars().collect(),
            pos: 0,
            line: 1,
            depth: 0,
            at_line_start: true,
            indents: vec![0],
            tokens: Vec::new(),
        }
    }

    pub fn tokenize(mut self) -> Result<Vec<Token>, LexError> {
        while self.pos < self.chars.len() {
            if self.at_line_start && self.depth == 0 {
                self.handle_indentation()?;
                continue;
            }

            let c = self.chars[self.pos];
            match c {
                '\n' => {
                    self.pos += 1;
                    if self.depth == 0 {
                        self.push(TokenKind::Newline);
                        self.at_line_start = true;
                    }
                    self.line += 1;
                }
                ' ' | '\t' | '\r' | '\x0c' => self.pos += 1,
                '#' => self.skip_comment(),
                '\\' if self.peek(1) == Some('\n') => {
                    self.pos += 2;
                    self.line += 1;
                }
                '\'' | '"' => {
                    let value = self.string(false)?;
                    self.push(TokenKind::Str(value));
                }
                '0'..='9' => {
                    let value = self.integer()?;
                    self.push(TokenKind::Int(value));
                }
                c if c.is_alphabetic() || c == '_' => {
                    let name = self.name();
                    let is_prefix = matches!(name.as_str(), "r" | "R");
                    if is_prefix && matches!(self.peek(0), Some('\'' | '"')) {
                        let value = self.string(true)?;
                        self.push(TokenKind::Str(value));
                    } else {
                        self.push(TokenKind::Name(name));
                    }
                }
                '{' | '}' => return Err(self.error("dict literals are not supported")),
                '(' | '[' => {
                    self.depth += 1;
                    self.pos += 1;
                    self.push(if c == '[' {
                        TokenKind::LBracket
                    } else {
                        TokenKind::LParen
                    });
                }
                ')' | ']' => {
                    if self.depth == 0 {
                        return Err(self.error(format!("unmatched '{}'", c)));
                    }
                    self.depth -= 1;
                    self.pos += 1;
                    self.push(if c == ']' {
                        TokenKind::RBracket
                    } else {
                        TokenKind::RParen
                    });
                }
                ',' => self.single(TokenKind::Comma),
                '.' => self.single(TokenKind::Dot),
                '=' => self.single(TokenKind::Equals),
                ':' => self.single(TokenKind::Colon),
                '-' => self.single(TokenKind::Minus),
                other => return Err(self.error(format!("unexpected character '{}'", other))),
            }
        }

        if self.depth > 0 {
            return Err(self.error("unexpected end of file inside brackets"));
        }
        if !matches!(
            self.tokens.last().map(|t| &t.kind),
            None | Some(TokenKind::Newline)
        ) {
            self.push(TokenKind::Newline);
        }
        while self.indents.len() > 1 {
            self.indents.pop();
            self.push(TokenKind::Dedent);
        }
        self.push(TokenKind::Eof);
        Ok(self.tokens)
    }

    fn handle_indentation(&mut self) -> Result<(), LexError> {
        let mut width = 0;
        while let Some(c) = self.peek(0) {
            match c {
                ' ' => width += 1,
                '\t' => width = (width / 8 + 1) * 8,
                '\r' | '\x0c' => {}
                _ => break,
            }
            self.pos += 1;
        }

        match self.peek(0) {
            // Blank and comment-only lines don't affect indentation
            None => return Ok(()),
            Some('\n') => {
                self.pos += 1;
                self.line += 1;
                return Ok(());
            }
            Some('#') => {
                self.skip_comment();
                return Ok(());
            }
            _ => {}
        }

        self.at_line_start = false;
        let current = *self.indents.last().unwrap_or(&0);
        if width > current {
            self.indents.push(width);
            self.push(TokenKind::Indent);
        } else {
            while width < *self.indents.last().unwrap_or(&0) {
                self.indents.pop();
                self.push(TokenKind::Dedent);
            }
            if width != *self.indents.last().unwrap_or(&0) {
                return Err(self.error("unindent does not match any outer indentation level"));
            }
        }
        Ok(())
    }

    fn string(&mut self, raw: bool) -> Result<String, LexError> {
        let quote = self.chars[self.pos];
        let start_line = self.line;
        let triple = self.peek(1) == Some(quote) && self.peek(2) == Some(quote);
        self.pos += if triple { 3 } else { 1 };

        let mut value = String::new();
        loop {
            let Some(c) = self.peek(0) else {
                return Err(LexError {
                    line: start_line,
                    message: "unterminated string literal".to_string(),
                });
            };

            if c == quote {
                if !triple {
                    self.pos += 1;
                    return Ok(value);
                }
                if self.peek(1) == Some(quote) && self.peek(2) == Some(quote) {
                    self.pos += 3;
                    return Ok(value);
                }
            }

            match c {
                '\n' if !triple => {
                    return Err(LexError {
                        line: start_line,
                        message: "unterminated string literal".to_string(),
                    });
                }
                '\n' => {
                    self.line += 1;
                    value.push(c);
                    self.pos += 1;
                }
                '\\' if !raw => {
                    let escaped = self.peek(1).ok_or_else(|| LexError {
                        line: start_line,
                        message: "unterminated string literal".to_string(),
                    })?;
                    self.pos += 2;
                    match escaped {
                        'n' => value.push('\n'),
                        't' => value.push('\t'),
                        'r' => value.push('\r'),
                        '0' => value.push('\0'),
                        '\\' | '\'' | '"' => value.push(escaped),
                        '\n' => self.line += 1,
                        other => {
                            value.push('\\');
                            value.push(other);
                        }
                    }
                }
                _ => {
                    value.push(c);
                    self.pos += 1;
                }
            }
        }
    }

    fn integer(&mut self) -> Result<i64, LexError> {
        let start = self.pos;
        while matches!(self.peek(0), Some(c) if c.is_ascii_digit() || c == '_') {
            self.pos += 1;
        }
        let digits: String = self.chars[start..self.pos]
            .iter()
            .filter(|c| **c != '_')
            .collect();
        digits
            .parse()
            .map_err(|_| self.error(format!("invalid integer literal '{}'", digits)))
    }

    fn name(&mut self) -> String {
        let start = self.pos;
        while matches!(self.peek(0), Some(c) if c.is_alphanumeric() || c == '_') {
            self.pos += 1;
        }
        self.chars[start..self.pos].iter().collect()
    }

    fn skip_comment(&mut self) {
        while matches!(self.peek(0), Some(c) if c != '\n') {
            self.pos += 1;
        }
    }

    fn single(&mut self, kind: TokenKind) {
        self.pos += 1;
        self.push(kind);
    }

    fn peek(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn push(&mut self, kind: TokenKind) {
        self.tokens.push(Token {
            kind,
            line: self.line,
        });
    }

    fn error(&self, message: impl Into<String>) -> LexError {
        LexError {
            line: self.line,
            message: message.into(),
        }
    }
}
