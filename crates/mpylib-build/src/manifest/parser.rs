//! Statement parser for manifest descriptors

use super::lexer::{Token, TokenKind};

/// Literal argument value
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Str(String),
    Int(i64),
    Bool(bool),
    None,
    List(Vec<Value>),
}

impl Value {
    /// Python truthiness
    pub fn is_truthy(&self) -> bool {
        match self {
            Self::Str(s) => !s.is_empty(),
            Self::Int(i) => *i != 0,
            Self::Bool(b) => *b,
            Self::None => false,
            Self::List(items) => !items.is_empty(),
        }
    }

    /// Text form used for metadata values
    pub fn to_text(&self) -> Option<String> {
        match self {
            Self::Str(s) => Some(s.clone()),
            Self::Int(i) => Some(i.to_string()),
            Self::Bool(true) => Some("True".to_string()),
            Self::Bool(false) => Some("False".to_string()),
            Self::None => None,
            Self::List(items) => Some(
                items
                    .iter()
                    .filter_map(Value::to_text)
                    .collect::<Vec<_>>()
                    .join(", "),
            ),
        }
    }
}

/// `name(args...)` or `a.b(args...)`
#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    pub callee: String,
    pub args: Vec<Value>,
    pub kwargs: Vec<(String, Value)>,
    pub line: usize,
}

/// Condition of an `if` block: `[not] options.<name>`
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub negated: bool,
    pub option: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    Call(Call),
    If {
        condition: Condition,
        body: Vec<Stmt>,
        orelse: Vec<Stmt>,
    },
    Pass,
}

/// Parsing failure: line and message
#[derive(Debug, Clone, PartialEq)]
pub struct ParseError {
    pub line: usize,
    pub message: String,
}

type ParseResult<T> = Result<T, ParseError>;

pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Self { tokens, pos: 0 }
    }

    pub fn parse(mut self) -> ParseResult<Vec<Stmt>> {
        let mut statements = Vec::new();
        while !self.check(&TokenKind::Eof) {
            if self.eat(&TokenKind::Newline) {
                continue;
            }
            statements.push(self.statement()?);
        }
        Ok(statements)
    }

    fn statement(&mut self) -> ParseResult<Stmt> {
        if self.check_name("if") {
            return self.if_statement();
        }
        let stmt = self.simple_statement()?;
        self.expect(&TokenKind::Newline)?;
        Ok(stmt)
    }

    fn simple_statement(&mut self) -> ParseResult<Stmt> {
        if self.check_name("pass") {
            self.advance();
            return Ok(Stmt::Pass);
        }
        Ok(Stmt::Call(self.call()?))
    }

    fn if_statement(&mut self) -> ParseResult<Stmt> {
        // Consumes `if` or `elif`
        self.advance();
        let condition = self.condition()?;
        self.expect(&TokenKind::Colon)?;
        let body = self.block()?;

        let orelse = if self.check_name("elif") {
            vec![self.if_statement()?]
        } else if self.check_name("else") {
            self.advance();
            self.expect(&TokenKind::Colon)?;
            self.block()?
        } else {
            Vec::new()
        };

        Ok(Stmt::If {
            condition,
            body,
            orelse,
        })
    }

    fn block(&mut self) -> ParseResult<Vec<Stmt>> {
        if !self.eat(&TokenKind::Newline) {
            // Single-line body: `if options.x: module("a.py")`
            let stmt = self.simple_statement()?;
            self.expect(&TokenKind::Newline)?;
            return Ok(vec![stmt]);
        }

        self.expect(&TokenKind::Indent)?;
        let mut body = Vec::new();
        while !self.eat(&TokenKind::Dedent) {
            if self.check(&TokenKind::Eof) {
                return Err(self.error("unexpected end of file in block"));
            }
            body.push(self.statement()?);
        }
        Ok(body)
    }

    fn condition(&mut self) -> ParseResult<Condition> {
        let negated = if self.check_name("not") {
            self.advance();
            true
        } else {
            false
        };

        let path = self.dotted_name()?;
        match path.split_once('.') {
            Some(("options", option)) if !option.contains('.') => Ok(Condition {
                negated,
                option: option.to_string(),
            }),
            _ => Err(self.error(format!(
                "unsupported condition '{}': only options.<name> can be tested",
                path
            ))),
        }
    }

    fn call(&mut self) -> ParseResult<Call> {
        let line = self.current().line;
        let callee = self.dotted_name()?;
        self.expect(&TokenKind::LParen)?;

        let mut args = Vec::new();
        let mut kwargs = Vec::new();
        while !self.eat(&TokenKind::RParen) {
            if self.is_keyword_argument() {
                let name = self.name()?;
                self.expect(&TokenKind::Equals)?;
                kwargs.push((name, self.value()?));
            } else {
                if !kwargs.is_empty() {
                    return Err(self.error("positional argument follows keyword argument"));
                }
                args.push(self.value()?);
            }

            if !self.eat(&TokenKind::Comma) {
                self.expect(&TokenKind::RParen)?;
                break;
            }
        }

        Ok(Call {
            callee,
            args,
            kwargs,
            line,
        })
    }

    fn value(&mut self) -> ParseResult<Value> {
        let token = self.current().clone();
        match token.kind {
            TokenKind::Str(first) => {
                self.advance();
                let mut value = first;
                // Adjacent literals concatenate
                while let TokenKind::Str(next) = &self.current().kind {
                    value.push_str(next);
                    self.advance();
                }
                Ok(Value::Str(value))
            }
            TokenKind::Int(i) => {
                self.advance();
                Ok(Value::Int(i))
            }
            TokenKind::Minus => {
                self.advance();
                let operand = self.current().kind.clone();
                match operand {
                    TokenKind::Int(i) => {
                        self.advance();
                        Ok(Value::Int(-i))
                    }
                    _ => Err(self.error("expected integer after '-'")),
                }
            }
            TokenKind::Name(name) => {
                self.advance();
                match name.as_str() {
                    "True" => Ok(Value::Bool(true)),
                    "False" => Ok(Value::Bool(false)),
                    "None" => Ok(Value::None),
                    other => Err(ParseError {
                        line: token.line,
                        message: format!("unsupported expression '{}'", other),
                    }),
                }
            }
            TokenKind::LBracket => {
                self.advance();
                Ok(Value::List(self.sequence(&TokenKind::RBracket)?))
            }
            TokenKind::LParen => {
                self.advance();
                Ok(Value::List(self.sequence(&TokenKind::RParen)?))
            }
            other => Err(ParseError {
                line: token.line,
                message: format!("expected a value, found {}", other),
            }),
        }
    }

    fn sequence(&mut self, close: &TokenKind) -> ParseResult<Vec<Value>> {
        let mut items = Vec::new();
        while !self.eat(close) {
            items.push(self.value()?);
            if !self.eat(&TokenKind::Comma) {
                self.expect(close)?;
                break;
            }
        }
        Ok(items)
    }

    fn dotted_name(&mut self) -> ParseResult<String> {
        let mut path = self.name()?;
        while self.eat(&TokenKind::Dot) {
            path.push('.');
            path.push_str(&self.name()?);
        }
        Ok(path)
    }

    fn name(&mut self) -> ParseResult<String> {
        match &self.current().kind {
            TokenKind::Name(name) => {
                let name = name.clone();
                self.advance();
                Ok(name)
            }
            other => Err(self.error(format!("expected a name, found {}", other))),
        }
    }

    fn is_keyword_argument(&self) -> bool {
        matches!(self.current().kind, TokenKind::Name(_))
            && matches!(
                self.tokens.get(self.pos + 1).map(|t| &t.kind),
                Some(TokenKind::Equals)
            )
    }

    fn current(&self) -> &Token {
        // The lexer always terminates the stream with Eof
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn advance(&mut self) {
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
    }

    fn check(&self, kind: &TokenKind) -> bool {
        &self.current().kind == kind
    }

    fn check_name(&self, keyword: &str) -> bool {
        matches!(&self.current().kind, TokenKind::Name(name) if name == keyword)
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: &TokenKind) -> ParseResult<()> {
        if self.eat(kind) {
            Ok(())
        } else {
            Err(self.error(format!("expected {}, found {}", kind, self.current().kind)))
        }
    }

    fn error(&self, message: impl Into<String>) -> ParseError {
        ParseError {
            line: self.current().line,
            message: message.into(),
        }
    }
}
