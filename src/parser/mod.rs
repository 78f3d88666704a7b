use crate::ast::*;
use crate::lexer::Token;

/// Stop collecting after this many errors; later ones are usually cascades.
pub const MAX_ERRORS: usize = 20;

pub struct Parser {
    tokens: Vec<(Token, Span)>,
    pos: usize,
    /// Byte offset one past the last token; where "at end" errors point.
    eof: usize,
    errors: Vec<ParseError>,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{message}")]
pub struct ParseError {
    pub code: &'static str,
    pub span: Span,
    pub message: &'static str,
    /// The offending token is end of input.
    pub at_end: bool,
}

type Result<T> = std::result::Result<T, ParseError>;

impl Parser {
    pub fn new(tokens: Vec<(Token, Span)>, source_len: usize) -> Self {
        Parser { tokens, pos: 0, eof: source_len, errors: Vec::new() }
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(t, _)| t)
    }

    fn peek_span(&self) -> Span {
        self.tokens
            .get(self.pos)
            .map(|(_, s)| *s)
            .unwrap_or(Span::new(self.eof, self.eof))
    }

    fn advance(&mut self) -> Option<&Token> {
        let tok = self.tokens.get(self.pos).map(|(t, _)| t);
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    fn check(&self, expected: &Token) -> bool {
        self.peek() == Some(expected)
    }

    /// Consumes `expected` if it is next.
    fn eat(&mut self, expected: &Token) -> Option<Span> {
        if self.check(expected) {
            let span = self.peek_span();
            self.advance();
            Some(span)
        } else {
            None
        }
    }

    fn expect(&mut self, expected: &Token, code: &'static str, message: &'static str) -> Result<Span> {
        self.eat(expected).ok_or_else(|| self.error(code, message))
    }

    fn expect_ident(&mut self, code: &'static str, message: &'static str) -> Result<Spanned<String>> {
        match self.peek().cloned() {
            Some(Token::Ident(name)) => {
                let span = self.peek_span();
                self.advance();
                Ok(Spanned::new(name, span))
            }
            _ => Err(self.error(code, message)),
        }
    }

    /// Error at the current token.
    fn error(&self, code: &'static str, message: &'static str) -> ParseError {
        ParseError {
            code,
            span: self.peek_span(),
            message,
            at_end: self.at_end(),
        }
    }

    fn at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    // ---- Top-level parsing ----

    pub fn parse_program(&mut self) -> (Program, Vec<ParseError>) {
        let mut statements = Vec::new();

        while !self.at_end() && self.errors.len() < MAX_ERRORS {
            if let Some(stmt) = self.parse_declaration() {
                statements.push(stmt);
            }
        }

        let errors = std::mem::take(&mut self.errors);
        (Program { statements, source: None }, errors)
    }

    /// Parses one declaration. On error the error is recorded, the parser
    /// resynchronizes and `None` is returned.
    fn parse_declaration(&mut self) -> Option<Spanned<Stmt>> {
        let start = self.pos;
        let result = match self.peek() {
            Some(Token::Var) => self.parse_var(),
            _ => self.parse_statement(),
        };
        match result {
            Ok(stmt) => Some(stmt),
            Err(e) => {
                if self.errors.len() < MAX_ERRORS {
                    self.errors.push(e);
                }
                self.sync_to_statement_boundary();
                if self.pos == start {
                    // Always make progress, e.g. on a stray `}` at top level.
                    self.advance();
                }
                None
            }
        }
    }

    /// Skips tokens until just after a `;`, or just before a keyword that
    /// starts a statement. Nested `{…}` blocks are skipped whole, and an
    /// unmatched `}` is left for the enclosing block to consume.
    fn sync_to_statement_boundary(&mut self) {
        let mut depth: usize = 0;

        loop {
            match self.peek() {
                None => break,
                Some(Token::Semicolon) if depth == 0 => {
                    self.advance();
                    break;
                }
                Some(Token::LBrace) => {
                    depth += 1;
                    self.advance();
                }
                Some(Token::RBrace) => {
                    if depth == 0 {
                        break;
                    }
                    depth -= 1;
                    self.advance();
                }
                Some(tok) if depth == 0 && tok.starts_statement() => break,
                _ => {
                    self.advance();
                }
            }
        }
    }

    /// `var name (= expr)? ;`
    fn parse_var(&mut self) -> Result<Spanned<Stmt>> {
        let start = self.peek_span();
        self.advance();
        let name = self.expect_ident("LOX-P004", "Expect variable name.")?;
        let initializer = match self.eat(&Token::Eq) {
            Some(_) => Some(self.parse_expr()?),
            None => None,
        };
        let end = self.expect(&Token::Semicolon, "LOX-P005", "Expect ';' after variable declaration.")?;
        Ok(Spanned::new(Stmt::Var { name, initializer }, start.merge(end)))
    }

    fn parse_statement(&mut self) -> Result<Spanned<Stmt>> {
        match self.peek() {
            Some(Token::Print) => {
                let start = self.peek_span();
                self.advance();
                let value = self.parse_expr()?;
                let end = self.expect(&Token::Semicolon, "LOX-P002", "Expect ';' after value.")?;
                Ok(Spanned::new(Stmt::Print(value), start.merge(end)))
            }
            Some(Token::LBrace) => self.parse_block(),
            _ => {
                let expr = self.parse_expr()?;
                let end = self.expect(&Token::Semicolon, "LOX-P003", "Expect ';' after expression.")?;
                let span = expr.span.merge(end);
                Ok(Spanned::new(Stmt::Expr(expr), span))
            }
        }
    }

    /// `{ declaration* }`. Errors inside the block are recorded and parsing
    /// continues with the next declaration in the same block.
    fn parse_block(&mut self) -> Result<Spanned<Stmt>> {
        let start = self.peek_span();
        self.advance();
        let mut statements = Vec::new();
        while !self.at_end() && !self.check(&Token::RBrace) && self.errors.len() < MAX_ERRORS {
            if let Some(stmt) = self.parse_declaration() {
                statements.push(stmt);
            }
        }
        let close = self.expect(&Token::RBrace, "LOX-P007", "Expect '}' after block.")?;
        Ok(Spanned::new(Stmt::Block { statements, close }, start.merge(close)))
    }

    // ---- Expressions, lowest precedence first ----

    fn parse_expr(&mut self) -> Result<Spanned<Expr>> {
        self.parse_assignment()
    }

    /// Right-associative. The left side is parsed as an ordinary expression
    /// and only accepted afterwards if it names a variable.
    fn parse_assignment(&mut self) -> Result<Spanned<Expr>> {
        let target = self.parse_equality()?;
        let Some(eq_span) = self.eat(&Token::Eq) else {
            return Ok(target);
        };
        let value = self.parse_assignment()?;
        match target.node {
            Expr::Variable(name) => {
                let span = target.span.merge(value.span);
                Ok(Spanned::new(Expr::Assign { name, value: Box::new(value) }, span))
            }
            _ => Err(ParseError {
                code: "LOX-P008",
                span: eq_span,
                message: "Invalid assignment target.",
                at_end: false,
            }),
        }
    }

    fn parse_equality(&mut self) -> Result<Spanned<Expr>> {
        self.parse_binary_level(Self::parse_comparison, |tok| match tok {
            Token::EqEq => Some(BinaryOp::Equal),
            Token::BangEq => Some(BinaryOp::NotEqual),
            _ => None,
        })
    }

    fn parse_comparison(&mut self) -> Result<Spanned<Expr>> {
        self.parse_binary_level(Self::parse_term, |tok| match tok {
            Token::Greater => Some(BinaryOp::Greater),
            Token::GreaterEq => Some(BinaryOp::GreaterEqual),
            Token::Less => Some(BinaryOp::Less),
            Token::LessEq => Some(BinaryOp::LessEqual),
            _ => None,
        })
    }

    fn parse_term(&mut self) -> Result<Spanned<Expr>> {
        self.parse_binary_level(Self::parse_factor, |tok| match tok {
            Token::Plus => Some(BinaryOp::Add),
            Token::Minus => Some(BinaryOp::Subtract),
            _ => None,
        })
    }

    fn parse_factor(&mut self) -> Result<Spanned<Expr>> {
        self.parse_binary_level(Self::parse_unary, |tok| match tok {
            Token::Star => Some(BinaryOp::Multiply),
            Token::Slash => Some(BinaryOp::Divide),
            _ => None,
        })
    }

    /// One left-associative precedence level: `operand (op operand)*`.
    /// The whole run becomes a single flat [`Expr::Binary`].
    fn parse_binary_level(
        &mut self,
        operand: fn(&mut Self) -> Result<Spanned<Expr>>,
        op_for: fn(&Token) -> Option<BinaryOp>,
    ) -> Result<Spanned<Expr>> {
        let first = operand(self)?;
        let mut rest = Vec::new();
        while let Some(op) = self.peek().and_then(op_for) {
            let op_span = self.peek_span();
            self.advance();
            rest.push((Spanned::new(op, op_span), operand(self)?));
        }
        let Some((_, last)) = rest.last() else {
            return Ok(first);
        };
        let span = first.span.merge(last.span);
        Ok(Spanned::new(Expr::Binary { first: Box::new(first), rest }, span))
    }

    fn parse_unary(&mut self) -> Result<Spanned<Expr>> {
        let op = match self.peek() {
            Some(Token::Bang) => UnaryOp::Not,
            Some(Token::Minus) => UnaryOp::Negate,
            _ => return self.parse_primary(),
        };
        let op_span = self.peek_span();
        self.advance();
        let operand = self.parse_unary()?;
        let span = op_span.merge(operand.span);
        Ok(Spanned::new(
            Expr::Unary { op: Spanned::new(op, op_span), operand: Box::new(operand) },
            span,
        ))
    }

    fn parse_primary(&mut self) -> Result<Spanned<Expr>> {
        let span = self.peek_span();
        let expr = match self.peek().cloned() {
            Some(Token::Number(n)) => Expr::Literal(Literal::Number(n)),
            Some(Token::Str(s)) => Expr::Literal(Literal::String(s)),
            Some(Token::True) => Expr::Literal(Literal::Bool(true)),
            Some(Token::False) => Expr::Literal(Literal::Bool(false)),
            Some(Token::Nil) => Expr::Literal(Literal::Nil),
            Some(Token::Ident(name)) => Expr::Variable(name),
            Some(Token::LParen) => {
                self.advance();
                let inner = self.parse_expr()?;
                let close = self.expect(&Token::RParen, "LOX-P006", "Expect ')' after expression.")?;
                return Ok(Spanned::new(Expr::Grouping(Box::new(inner)), span.merge(close)));
            }
            _ => return Err(self.error("LOX-P001", "Expect expression.")),
        };
        self.advance();
        Ok(Spanned::new(expr, span))
    }
}

/// Parse a token stream into a program, collecting up to [`MAX_ERRORS`] errors.
pub fn parse(tokens: Vec<(Token, Span)>, source_len: usize) -> (Program, Vec<ParseError>) {
    let mut parser = Parser::new(tokens, source_len);
    parser.parse_program()
}
