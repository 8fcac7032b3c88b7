//! Recursive descent parser with precedence climbing for the JavaScript subset.

use crate::analysis::ast::*;
use crate::analysis::tokens::{Span, Token, TokenKind};
use thiserror::Error;

/// Default nesting limit; deeper input is rejected instead of exhausting the stack.
pub const DEFAULT_MAX_NESTING: usize = 256;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ParseError {
    #[error("unexpected token {found} at line {line}, col {col}; expected {expected}")]
    Unexpected { found: String, expected: String, line: usize, col: usize },
    #[error("invalid assignment target at line {line}, col {col}")]
    InvalidAssignmentTarget { line: usize, col: usize },
    #[error("nesting deeper than {limit} levels at line {line}, col {col}")]
    TooDeep { limit: usize, line: usize, col: usize },
}

pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    next_ident: u32,
    depth: usize,
    max_depth: usize,
    /// Cleared while parsing a `for` head so `in` is not read as an operator
    allow_in: bool,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Self::with_max_depth(tokens, DEFAULT_MAX_NESTING)
    }

    pub fn with_max_depth(mut tokens: Vec<Token>, max_depth: usize) -> Self {
        if !matches!(tokens.last().map(|t| &t.kind), Some(TokenKind::Eof)) {
            let end = tokens.last().map(|t| t.span).unwrap_or_else(Span::dummy);
            tokens.push(Token::new(TokenKind::Eof, Span::new(end.end, end.end, end.line, end.col)));
        }
        Self { tokens, pos: 0, next_ident: 0, depth: 0, max_depth, allow_in: true }
    }

    fn current(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn peek_kind(&self) -> &TokenKind { &self.current().kind }

    fn nth_kind(&self, n: usize) -> &TokenKind {
        let idx = (self.pos + n).min(self.tokens.len() - 1);
        &self.tokens[idx].kind
    }

    fn advance(&mut self) -> Token {
        let tok = self.current().clone();
        if self.pos < self.tokens.len() - 1 { self.pos += 1; }
        tok
    }

    fn prev_span(&self) -> Span {
        self.tokens[self.pos.saturating_sub(1)].span
    }

    fn span_from(&self, start: Span) -> Span {
        start.merge(self.prev_span())
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.peek_kind() == kind { self.advance(); true } else { false }
    }

    fn is_word(&self, word: &str) -> bool {
        matches!(self.peek_kind(), TokenKind::Ident(s) if s == word)
    }

    fn unexpected(&self, expected: &str) -> ParseError {
        let tok = self.current();
        ParseError::Unexpected {
            found: format!("{}", tok.kind), expected: expected.to_string(),
            line: tok.span.line, col: tok.span.col,
        }
    }

    fn expect(&mut self, kind: &TokenKind) -> Result<Token, ParseError> {
        if self.peek_kind() == kind {
            Ok(self.advance())
        } else {
            Err(self.unexpected(&kind.to_string()))
        }
    }

    fn make_ident(&mut self, name: String, span: Span) -> Ident {
        let id = IdentId(self.next_ident);
        self.next_ident += 1;
        Ident { name, id, span }
    }

    fn expect_ident(&mut self) -> Result<Ident, ParseError> {
        match self.peek_kind().clone() {
            TokenKind::Ident(name) => {
                let span = self.advance().span;
                Ok(self.make_ident(name, span))
            }
            _ => Err(self.unexpected("identifier")),
        }
    }

    /// Automatic semicolon insertion, reduced to the common cases.
    fn consume_semicolon(&mut self) -> Result<(), ParseError> {
        if self.eat(&TokenKind::Semi) { return Ok(()); }
        if matches!(self.peek_kind(), TokenKind::RBrace | TokenKind::Eof) || self.current().newline_before {
            return Ok(());
        }
        Err(self.unexpected(";"))
    }

    fn descend(&mut self) -> Result<(), ParseError> {
        if self.depth >= self.max_depth {
            let span = self.current().span;
            return Err(ParseError::TooDeep { limit: self.max_depth, line: span.line, col: span.col });
        }
        self.depth += 1;
        Ok(())
    }

    fn with_in<T>(&mut self, allow: bool, f: impl FnOnce(&mut Self) -> Result<T, ParseError>) -> Result<T, ParseError> {
        let saved = std::mem::replace(&mut self.allow_in, allow);
        let result = f(self);
        self.allow_in = saved;
        result
    }

    // ── Top-level parsing ──

    pub fn parse_program(&mut self) -> Result<Program, ParseError> {
        let start = self.current().span;
        let mut body = Vec::new();
        while !matches!(self.peek_kind(), TokenKind::Eof) {
            body.push(self.parse_stmt()?);
        }
        let span = if body.is_empty() { start } else { self.span_from(start) };
        Ok(Program { body, span, ident_count: self.next_ident })
    }

    // ── Statements ──

    fn parse_stmt(&mut self) -> Result<Stmt, ParseError> {
        self.descend()?;
        let result = self.parse_stmt_inner();
        self.depth -= 1;
        result
    }

    fn parse_stmt_inner(&mut self) -> Result<Stmt, ParseError> {
        match self.peek_kind() {
            TokenKind::LBrace => Ok(Stmt::Block(self.parse_block()?)),
            TokenKind::Var | TokenKind::Let | TokenKind::Const => {
                let decl = self.parse_var_decl()?;
                self.consume_semicolon()?;
                Ok(Stmt::Var(VarDecl { span: self.span_from(decl.span), ..decl }))
            }
            TokenKind::Function => Ok(Stmt::Function(self.parse_function(false)?)),
            TokenKind::Ident(s) if s == "async"
                && matches!(self.nth_kind(1), TokenKind::Function)
                && !self.tokens[(self.pos + 1).min(self.tokens.len() - 1)].newline_before =>
            {
                self.advance();
                Ok(Stmt::Function(self.parse_function(true)?))
            }
            TokenKind::Class => Ok(Stmt::Class(self.parse_class()?)),
            TokenKind::If => self.parse_if(),
            TokenKind::For => self.parse_for(),
            TokenKind::While => {
                let start = self.advance().span;
                self.expect(&TokenKind::LParen)?;
                let test = self.with_in(true, |p| p.parse_expr())?;
                self.expect(&TokenKind::RParen)?;
                let body = Box::new(self.parse_stmt()?);
                Ok(Stmt::While(WhileStmt { test, body, span: self.span_from(start) }))
            }
            TokenKind::Do => {
                let start = self.advance().span;
                let body = Box::new(self.parse_stmt()?);
                self.expect(&TokenKind::While)?;
                self.expect(&TokenKind::LParen)?;
                let test = self.with_in(true, |p| p.parse_expr())?;
                self.expect(&TokenKind::RParen)?;
                self.eat(&TokenKind::Semi);
                Ok(Stmt::DoWhile(DoWhileStmt { body, test, span: self.span_from(start) }))
            }
            TokenKind::Switch => self.parse_switch(),
            TokenKind::Try => self.parse_try(),
            TokenKind::Return => {
                let start = self.advance().span;
                let arg = if self.at_statement_end() { None } else { Some(self.parse_expr()?) };
                self.consume_semicolon()?;
                Ok(Stmt::Return(ReturnStmt { arg, span: self.span_from(start) }))
            }
            TokenKind::Throw => {
                let start = self.advance().span;
                let arg = self.parse_expr()?;
                self.consume_semicolon()?;
                Ok(Stmt::Throw(ThrowStmt { arg, span: self.span_from(start) }))
            }
            TokenKind::Break | TokenKind::Continue => {
                let tok = self.advance();
                let label = match self.peek_kind() {
                    TokenKind::Ident(name) if !self.current().newline_before => {
                        let name = name.clone();
                        self.advance();
                        Some(name)
                    }
                    _ => None,
                };
                self.consume_semicolon()?;
                let jump = JumpStmt { label, span: self.span_from(tok.span) };
                if tok.kind == TokenKind::Break { Ok(Stmt::Break(jump)) } else { Ok(Stmt::Continue(jump)) }
            }
            TokenKind::Semi => Ok(Stmt::Empty(self.advance().span)),
            TokenKind::Import if !matches!(self.nth_kind(1), TokenKind::LParen | TokenKind::Dot) => {
                self.skip_module_clause()
            }
            TokenKind::Export => self.parse_export(),
            TokenKind::Ident(label) if matches!(self.nth_kind(1), TokenKind::Colon) => {
                let label = label.clone();
                let start = self.advance().span;
                self.advance(); // ':'
                let body = Box::new(self.parse_stmt()?);
                Ok(Stmt::Labeled(LabeledStmt { label, body, span: self.span_from(start) }))
            }
            _ => {
                let start = self.current().span;
                let expr = self.parse_expr()?;
                self.consume_semicolon()?;
                Ok(Stmt::Expr(ExprStmt { expr, span: self.span_from(start) }))
            }
        }
    }

    fn at_statement_end(&self) -> bool {
        matches!(self.peek_kind(), TokenKind::Semi | TokenKind::RBrace | TokenKind::Eof)
            || self.current().newline_before
    }

    fn parse_block(&mut self) -> Result<Block, ParseError> {
        let start = self.expect(&TokenKind::LBrace)?.span;
        let mut body = Vec::new();
        while !matches!(self.peek_kind(), TokenKind::RBrace | TokenKind::Eof) {
            body.push(self.parse_stmt()?);
        }
        self.expect(&TokenKind::RBrace)?;
        Ok(Block { body, span: self.span_from(start) })
    }

    fn parse_var_decl(&mut self) -> Result<VarDecl, ParseError> {
        let tok = self.advance();
        let kind = match tok.kind {
            TokenKind::Var => VarKind::Var,
            TokenKind::Let => VarKind::Let,
            _ => VarKind::Const,
        };
        let mut declarators = Vec::new();
        loop {
            let pattern = self.parse_binding_pattern()?;
            let init = if self.eat(&TokenKind::Assign) { Some(self.parse_assign()?) } else { None };
            let span = self.span_from(pattern.span());
            declarators.push(Declarator { pattern, init, span });
            if !self.eat(&TokenKind::Comma) { break; }
        }
        Ok(VarDecl { kind, declarators, span: self.span_from(tok.span) })
    }

    fn parse_if(&mut self) -> Result<Stmt, ParseError> {
        let start = self.expect(&TokenKind::If)?.span;
        self.expect(&TokenKind::LParen)?;
        let test = self.with_in(true, |p| p.parse_expr())?;
        self.expect(&TokenKind::RParen)?;
        let consequent = Box::new(self.parse_stmt()?);
        let alternate = if self.eat(&TokenKind::Else) { Some(Box::new(self.parse_stmt()?)) } else { None };
        Ok(Stmt::If(IfStmt { test, consequent, alternate, span: self.span_from(start) }))
    }

    fn parse_for(&mut self) -> Result<Stmt, ParseError> {
        let start = self.expect(&TokenKind::For)?.span;
        if self.is_word("await") { self.advance(); }
        self.expect(&TokenKind::LParen)?;
        let init = match self.peek_kind() {
            TokenKind::Semi => None,
            TokenKind::Var | TokenKind::Let | TokenKind::Const => {
                Some(ForInit::Var(self.with_in(false, |p| p.parse_var_decl())?))
            }
            _ => Some(ForInit::Expr(self.with_in(false, |p| p.parse_expr())?)),
        };
        if let Some(left) = init {
            let is_of = self.is_word("of");
            if is_of || matches!(self.peek_kind(), TokenKind::In) {
                self.advance();
                let right = self.with_in(true, |p| if is_of { p.parse_assign() } else { p.parse_expr() })?;
                self.expect(&TokenKind::RParen)?;
                let body = Box::new(self.parse_stmt()?);
                return Ok(Stmt::ForIn(ForInStmt { left, right, body, is_of, span: self.span_from(start) }));
            }
            return self.finish_classic_for(start, Some(left));
        }
        self.finish_classic_for(start, None)
    }

    fn finish_classic_for(&mut self, start: Span, init: Option<ForInit>) -> Result<Stmt, ParseError> {
        self.expect(&TokenKind::Semi)?;
        let test = if matches!(self.peek_kind(), TokenKind::Semi) { None } else { Some(self.with_in(true, |p| p.parse_expr())?) };
        self.expect(&TokenKind::Semi)?;
        let update = if matches!(self.peek_kind(), TokenKind::RParen) { None } else { Some(self.with_in(true, |p| p.parse_expr())?) };
        self.expect(&TokenKind::RParen)?;
        let body = Box::new(self.parse_stmt()?);
        Ok(Stmt::For(ForStmt { init, test, update, body, span: self.span_from(start) }))
    }

    fn parse_switch(&mut self) -> Result<Stmt, ParseError> {
        let start = self.expect(&TokenKind::Switch)?.span;
        self.expect(&TokenKind::LParen)?;
        let discriminant = self.with_in(true, |p| p.parse_expr())?;
        self.expect(&TokenKind::RParen)?;
        self.expect(&TokenKind::LBrace)?;
        let mut cases = Vec::new();
        while !matches!(self.peek_kind(), TokenKind::RBrace | TokenKind::Eof) {
            let case_start = self.current().span;
            let test = match self.peek_kind() {
                TokenKind::Case => { self.advance(); Some(self.parse_expr()?) }
                TokenKind::Default => { self.advance(); None }
                _ => return Err(self.unexpected("case or default")),
            };
            self.expect(&TokenKind::Colon)?;
            let mut body = Vec::new();
            while !matches!(self.peek_kind(), TokenKind::Case | TokenKind::Default | TokenKind::RBrace | TokenKind::Eof) {
                body.push(self.parse_stmt()?);
            }
            cases.push(SwitchCase { test, body, span: self.span_from(case_start) });
        }
        self.expect(&TokenKind::RBrace)?;
        Ok(Stmt::Switch(SwitchStmt { discriminant, cases, span: self.span_from(start) }))
    }

    fn parse_try(&mut self) -> Result<Stmt, ParseError> {
        let start = self.expect(&TokenKind::Try)?.span;
        let block = self.parse_block()?;
        let handler = if matches!(self.peek_kind(), TokenKind::Catch) {
            let catch_start = self.advance().span;
            let param = if self.eat(&TokenKind::LParen) {
                let p = self.parse_binding_pattern()?;
                self.expect(&TokenKind::RParen)?;
                Some(p)
            } else { None };
            let body = self.parse_block()?;
            Some(CatchClause { param, body, span: self.span_from(catch_start) })
        } else { None };
        let finalizer = if self.eat(&TokenKind::Finally) { Some(self.parse_block()?) } else { None };
        if handler.is_none() && finalizer.is_none() {
            return Err(self.unexpected("catch or finally"));
        }
        Ok(Stmt::Try(TryStmt { block, handler, finalizer, span: self.span_from(start) }))
    }

    /// `import ...` and `export { ... } from ...` clauses carry no analyzable code.
    fn skip_module_clause(&mut self) -> Result<Stmt, ParseError> {
        let start = self.advance().span;
        loop {
            match self.peek_kind() {
                TokenKind::Eof => break,
                TokenKind::Str(_) => { self.advance(); break; }
                TokenKind::RBrace => {
                    self.advance();
                    if !self.is_word("from") { break; }
                }
                _ => { self.advance(); }
            }
        }
        self.consume_semicolon()?;
        Ok(Stmt::Empty(self.span_from(start)))
    }

    fn parse_export(&mut self) -> Result<Stmt, ParseError> {
        match self.nth_kind(1) {
            TokenKind::Default => {
                self.advance();
                self.advance();
                match self.peek_kind() {
                    TokenKind::Function => Ok(Stmt::Function(self.parse_function(false)?)),
                    TokenKind::Class => Ok(Stmt::Class(self.parse_class()?)),
                    _ if self.is_word("async") && matches!(self.nth_kind(1), TokenKind::Function) => {
                        self.advance();
                        Ok(Stmt::Function(self.parse_function(true)?))
                    }
                    _ => {
                        let start = self.current().span;
                        let expr = self.parse_assign()?;
                        self.consume_semicolon()?;
                        Ok(Stmt::Expr(ExprStmt { expr, span: self.span_from(start) }))
                    }
                }
            }
            TokenKind::LBrace | TokenKind::Star => self.skip_module_clause(),
            _ => {
                self.advance();
                self.parse_stmt()
            }
        }
    }

    // ── Functions and classes ──

    fn parse_function(&mut self, is_async: bool) -> Result<Function, ParseError> {
        let start = self.expect(&TokenKind::Function)?.span;
        self.eat(&TokenKind::Star);
        let name = if matches!(self.peek_kind(), TokenKind::Ident(_)) { Some(self.expect_ident()?) } else { None };
        let params = self.parse_params()?;
        let body = self.with_in(true, |p| p.parse_block())?;
        Ok(Function { name, params, body: FunctionBody::Block(body), is_arrow: false, is_async, span: self.span_from(start) })
    }

    fn parse_params(&mut self) -> Result<Vec<Pattern>, ParseError> {
        self.expect(&TokenKind::LParen)?;
        let mut params = Vec::new();
        while !matches!(self.peek_kind(), TokenKind::RParen) {
            if matches!(self.peek_kind(), TokenKind::Ellipsis) {
                let start = self.advance().span;
                let arg = Box::new(self.parse_binding_pattern()?);
                params.push(Pattern::Rest { arg, span: self.span_from(start) });
            } else {
                params.push(self.parse_binding_element()?);
            }
            if !self.eat(&TokenKind::Comma) { break; }
        }
        self.expect(&TokenKind::RParen)?;
        Ok(params)
    }

    fn parse_arrow_body(&mut self, start: Span, params: Vec<Pattern>, is_async: bool) -> Result<Expr, ParseError> {
        self.expect(&TokenKind::Arrow)?;
        let body = if matches!(self.peek_kind(), TokenKind::LBrace) {
            FunctionBody::Block(self.with_in(true, |p| p.parse_block())?)
        } else {
            FunctionBody::Expr(Box::new(self.parse_assign()?))
        };
        Ok(Expr::Function(Box::new(Function {
            name: None, params, body, is_arrow: true, is_async, span: self.span_from(start),
        })))
    }

    /// From a `(`, scan to its matching `)` and report whether `=>` follows.
    fn is_arrow_ahead(&self, from: usize) -> bool {
        let mut depth = 0usize;
        let mut i = from;
        while let Some(tok) = self.tokens.get(i) {
            match tok.kind {
                TokenKind::LParen | TokenKind::LBracket | TokenKind::LBrace => depth += 1,
                TokenKind::RParen | TokenKind::RBracket | TokenKind::RBrace => {
                    depth = depth.saturating_sub(1);
                    if depth == 0 {
                        return matches!(self.tokens.get(i + 1).map(|t| &t.kind), Some(TokenKind::Arrow));
                    }
                }
                TokenKind::Eof => return false,
                _ => {}
            }
            i += 1;
        }
        false
    }

    fn parse_class(&mut self) -> Result<Class, ParseError> {
        let start = self.expect(&TokenKind::Class)?.span;
        let name = if matches!(self.peek_kind(), TokenKind::Ident(_)) { Some(self.expect_ident()?) } else { None };
        let super_class = if self.eat(&TokenKind::Extends) { Some(Box::new(self.parse_call_member()?)) } else { None };
        self.expect(&TokenKind::LBrace)?;
        let mut members = Vec::new();
        while !matches!(self.peek_kind(), TokenKind::RBrace | TokenKind::Eof) {
            if self.eat(&TokenKind::Semi) { continue; }
            let member_start = self.current().span;
            let is_static = self.is_word("static") && !self.modifier_is_key(1);
            if is_static { self.advance(); }
            let is_async = self.skip_method_modifiers();
            let key = self.parse_prop_key()?;
            if matches!(self.peek_kind(), TokenKind::LParen) {
                let func = self.parse_method(member_start, is_async)?;
                members.push(ClassMember::Method { key, func, is_static });
            } else {
                let value = if self.eat(&TokenKind::Assign) { Some(self.with_in(true, |p| p.parse_assign())?) } else { None };
                self.consume_semicolon()?;
                members.push(ClassMember::Field { key, value, is_static, span: self.span_from(member_start) });
            }
        }
        self.expect(&TokenKind::RBrace)?;
        Ok(Class { name, super_class, members, span: self.span_from(start) })
    }

    /// Whether the token `n` ahead ends a member key, which makes the current
    /// word (`static`, `get`, `async`...) the key itself rather than a modifier.
    fn modifier_is_key(&self, n: usize) -> bool {
        matches!(
            self.nth_kind(n),
            TokenKind::LParen | TokenKind::Assign | TokenKind::Semi | TokenKind::RBrace
                | TokenKind::Colon | TokenKind::Comma
        )
    }

    /// Skips `async`, `get`, `set` and `*` prefixes; reports whether `async` was seen.
    fn skip_method_modifiers(&mut self) -> bool {
        let mut is_async = false;
        loop {
            if (self.is_word("async") || self.is_word("get") || self.is_word("set")) && !self.modifier_is_key(1) {
                is_async |= self.is_word("async");
                self.advance();
            } else if self.eat(&TokenKind::Star) {
                continue;
            } else {
                return is_async;
            }
        }
    }

    fn parse_method(&mut self, start: Span, is_async: bool) -> Result<Function, ParseError> {
        let params = self.parse_params()?;
        let body = self.with_in(true, |p| p.parse_block())?;
        Ok(Function { name: None, params, body: FunctionBody::Block(body), is_arrow: false, is_async, span: self.span_from(start) })
    }

    fn parse_prop_key(&mut self) -> Result<PropKey, ParseError> {
        let tok = self.current().clone();
        match &tok.kind {
            TokenKind::Str(s) => { self.advance(); Ok(PropKey::Named(s.clone(), tok.span)) }
            TokenKind::Number(n) => { self.advance(); Ok(PropKey::Named(n.to_string(), tok.span)) }
            TokenKind::LBracket => {
                self.advance();
                let expr = self.with_in(true, |p| p.parse_assign())?;
                self.expect(&TokenKind::RBracket)?;
                Ok(PropKey::Computed(Box::new(expr)))
            }
            kind => match kind.property_name() {
                Some(name) => { self.advance(); Ok(PropKey::Named(name, tok.span)) }
                None => Err(self.unexpected("property name")),
            },
        }
    }

    // ── Patterns ──

    fn parse_binding_pattern(&mut self) -> Result<Pattern, ParseError> {
        match self.peek_kind() {
            TokenKind::Ident(_) => Ok(Pattern::Ident(self.expect_ident()?)),
            TokenKind::LBracket => {
                let start = self.advance().span;
                let mut elems = Vec::new();
                while !matches!(self.peek_kind(), TokenKind::RBracket) {
                    if self.eat(&TokenKind::Comma) { elems.push(None); continue; }
                    if matches!(self.peek_kind(), TokenKind::Ellipsis) {
                        let rest_start = self.advance().span;
                        let arg = Box::new(self.parse_binding_pattern()?);
                        elems.push(Some(Pattern::Rest { arg, span: self.span_from(rest_start) }));
                    } else {
                        elems.push(Some(self.parse_binding_element()?));
                    }
                    if !self.eat(&TokenKind::Comma) { break; }
                }
                self.expect(&TokenKind::RBracket)?;
                Ok(Pattern::Array { elems, span: self.span_from(start) })
            }
            TokenKind::LBrace => {
                let start = self.advance().span;
                let mut props = Vec::new();
                while !matches!(self.peek_kind(), TokenKind::RBrace) {
                    let prop_start = self.current().span;
                    if self.eat(&TokenKind::Ellipsis) {
                        let arg = Box::new(self.parse_binding_pattern()?);
                        let span = self.span_from(prop_start);
                        props.push(PatternProp { key: None, value: Pattern::Rest { arg, span }, span });
                    } else {
                        let shorthand = match self.peek_kind() {
                            TokenKind::Ident(name) => Some(name.clone()),
                            _ => None,
                        };
                        let key = self.parse_prop_key()?;
                        let value = if self.eat(&TokenKind::Colon) {
                            self.parse_binding_element()?
                        } else {
                            let name = shorthand.ok_or_else(|| self.unexpected(":"))?;
                            let ident = self.make_ident(name, prop_start);
                            self.finish_default(Pattern::Ident(ident))?
                        };
                        props.push(PatternProp { key: Some(key), value, span: self.span_from(prop_start) });
                    }
                    if !self.eat(&TokenKind::Comma) { break; }
                }
                self.expect(&TokenKind::RBrace)?;
                Ok(Pattern::Object { props, span: self.span_from(start) })
            }
            _ => Err(self.unexpected("binding pattern")),
        }
    }

    fn parse_binding_element(&mut self) -> Result<Pattern, ParseError> {
        let target = self.parse_binding_pattern()?;
        self.finish_default(target)
    }

    fn finish_default(&mut self, target: Pattern) -> Result<Pattern, ParseError> {
        if !self.eat(&TokenKind::Assign) { return Ok(target); }
        let value = Box::new(self.with_in(true, |p| p.parse_assign())?);
        let span = self.span_from(target.span());
        Ok(Pattern::Assign { target: Box::new(target), value, span })
    }

    /// Reinterpret an already parsed expression as a destructuring target.
    fn expr_to_pattern(&self, expr: Expr) -> Result<Pattern, ParseError> {
        let invalid = |span: Span| ParseError::InvalidAssignmentTarget { line: span.line, col: span.col };
        match expr {
            Expr::Ident(i) => Ok(Pattern::Ident(i)),
            Expr::Array(items, span) => {
                let mut elems = Vec::new();
                for item in items {
                    elems.push(match item {
                        None => None,
                        Some(Expr::Spread(arg, s)) => Some(Pattern::Rest { arg: Box::new(self.expr_to_pattern(*arg)?), span: s }),
                        Some(e) => Some(self.expr_to_pattern(e)?),
                    });
                }
                Ok(Pattern::Array { elems, span })
            }
            Expr::Object(items, span) => {
                let mut props = Vec::new();
                for item in items {
                    props.push(match item {
                        ObjectProp::KeyValue { key, value, span } => PatternProp { key: Some(key), value: self.expr_to_pattern(value)?, span },
                        ObjectProp::Shorthand(i) => {
                            let span = i.span;
                            PatternProp { key: Some(PropKey::Named(i.name.clone(), span)), value: Pattern::Ident(i), span }
                        }
                        ObjectProp::Spread(e, s) => {
                            let arg = Box::new(self.expr_to_pattern(e)?);
                            PatternProp { key: None, value: Pattern::Rest { arg, span: s }, span: s }
                        }
                        ObjectProp::Method { func, .. } => return Err(invalid(func.span)),
                    });
                }
                Ok(Pattern::Object { props, span })
            }
            Expr::Assign(AssignExpr { op, target: AssignTarget::Pattern(target), value, span }) if op == "=" => {
                Ok(Pattern::Assign { target: Box::new(target), value, span })
            }
            other => Err(invalid(other.span())),
        }
    }

    // ── Expressions ──

    pub fn parse_expr(&mut self) -> Result<Expr, ParseError> {
        let first = self.parse_assign()?;
        if !matches!(self.peek_kind(), TokenKind::Comma) { return Ok(first); }
        let start = first.span();
        let mut exprs = vec![first];
        while self.eat(&TokenKind::Comma) {
            exprs.push(self.parse_assign()?);
        }
        Ok(Expr::Sequence(exprs, self.span_from(start)))
    }

    fn parse_assign(&mut self) -> Result<Expr, ParseError> {
        self.descend()?;
        let result = self.parse_assign_inner();
        self.depth -= 1;
        result
    }

    fn parse_assign_inner(&mut self) -> Result<Expr, ParseError> {
        let start = self.current().span;
        // Arrow functions: `x =>`, `(a, b) =>`, `async x =>`, `async (a) =>`
        match self.peek_kind() {
            TokenKind::Ident(_) if matches!(self.nth_kind(1), TokenKind::Arrow) => {
                let param = Pattern::Ident(self.expect_ident()?);
                return self.parse_arrow_body(start, vec![param], false);
            }
            TokenKind::Ident(s) if s == "async" && !self.tokens[(self.pos + 1).min(self.tokens.len() - 1)].newline_before => {
                if matches!(self.nth_kind(1), TokenKind::Ident(_)) && matches!(self.nth_kind(2), TokenKind::Arrow) {
                    self.advance();
                    let param = Pattern::Ident(self.expect_ident()?);
                    return self.parse_arrow_body(start, vec![param], true);
                }
                if matches!(self.nth_kind(1), TokenKind::LParen) && self.is_arrow_ahead(self.pos + 1) {
                    self.advance();
                    let params = self.parse_params()?;
                    return self.parse_arrow_body(start, params, true);
                }
            }
            TokenKind::LParen if self.is_arrow_ahead(self.pos) => {
                let params = self.parse_params()?;
                return self.parse_arrow_body(start, params, false);
            }
            _ => {}
        }

        let left = self.parse_conditional()?;
        let op = match self.peek_kind() {
            TokenKind::Assign => "=".to_string(),
            TokenKind::CompoundAssign(op) => op.clone(),
            _ => return Ok(left),
        };
        let op_span = self.advance().span;
        let target = match left {
            Expr::Member(_) | Expr::Index(_) => AssignTarget::Expr(Box::new(left)),
            Expr::Ident(i) => AssignTarget::Pattern(Pattern::Ident(i)),
            e @ (Expr::Array(..) | Expr::Object(..)) if op == "=" => AssignTarget::Pattern(self.expr_to_pattern(e)?),
            _ => return Err(ParseError::InvalidAssignmentTarget { line: op_span.line, col: op_span.col }),
        };
        let value = Box::new(self.parse_assign()?);
        Ok(Expr::Assign(AssignExpr { op, target, value, span: self.span_from(start) }))
    }

    fn parse_conditional(&mut self) -> Result<Expr, ParseError> {
        let test = self.parse_binary(0)?;
        if !self.eat(&TokenKind::Question) { return Ok(test); }
        let consequent = self.with_in(true, |p| p.parse_assign())?;
        self.expect(&TokenKind::Colon)?;
        let alternate = self.parse_assign()?;
        let span = self.span_from(test.span());
        Ok(Expr::Conditional(ConditionalExpr {
            test: Box::new(test), consequent: Box::new(consequent), alternate: Box::new(alternate), span,
        }))
    }

    /// Binding power of the binary operator at the cursor: (precedence, right-associative)
    fn binary_op(&self) -> Option<(u8, bool)> {
        let info = match self.peek_kind() {
            TokenKind::Nullish => (1, false),
            TokenKind::OrOr => (2, false),
            TokenKind::AndAnd => (3, false),
            TokenKind::Pipe => (4, false),
            TokenKind::Caret => (5, false),
            TokenKind::Amp => (6, false),
            TokenKind::EqEq | TokenKind::NotEq | TokenKind::EqEqEq | TokenKind::NotEqEq => (7, false),
            TokenKind::Lt | TokenKind::LtEq | TokenKind::Gt | TokenKind::GtEq | TokenKind::Instanceof => (8, false),
            TokenKind::In if self.allow_in => (8, false),
            TokenKind::Shl | TokenKind::Shr | TokenKind::UShr => (9, false),
            TokenKind::Plus | TokenKind::Minus => (10, false),
            TokenKind::Star | TokenKind::Slash | TokenKind::Percent => (11, false),
            TokenKind::StarStar => (12, true),
            _ => return None,
        };
        Some(info)
    }

    fn parse_binary(&mut self, min_prec: u8) -> Result<Expr, ParseError> {
        let depth = self.depth;
        let result = self.parse_binary_fold(min_prec);
        self.depth = depth;
        result
    }

    /// Each folded operator nests the tree one level, so it counts against the limit.
    fn parse_binary_fold(&mut self, min_prec: u8) -> Result<Expr, ParseError> {
        let mut left = self.parse_unary()?;
        while let Some((prec, right_assoc)) = self.binary_op() {
            if prec < min_prec { break; }
            self.descend()?;
            let op = self.advance().kind.to_string();
            let right = self.parse_binary(if right_assoc { prec } else { prec + 1 })?;
            let span = left.span().merge(right.span());
            left = Expr::Binary(BinaryExpr { op, left: Box::new(left), right: Box::new(right), span });
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expr, ParseError> {
        self.descend()?;
        let result = self.parse_unary_inner();
        self.depth -= 1;
        result
    }

    fn parse_unary_inner(&mut self) -> Result<Expr, ParseError> {
        let start = self.current().span;
        match self.peek_kind() {
            TokenKind::Bang | TokenKind::Minus | TokenKind::Plus | TokenKind::Tilde
            | TokenKind::Typeof | TokenKind::Void | TokenKind::Delete => {
                let op = self.advance().kind.to_string();
                let arg = Box::new(self.parse_unary()?);
                Ok(Expr::Unary(UnaryExpr { op, arg, span: self.span_from(start) }))
            }
            TokenKind::Ident(s) if s == "await" && self.starts_operand(1) => {
                self.advance();
                let arg = Box::new(self.parse_unary()?);
                Ok(Expr::Unary(UnaryExpr { op: "await".into(), arg, span: self.span_from(start) }))
            }
            TokenKind::PlusPlus | TokenKind::MinusMinus => {
                let op = self.advance().kind.to_string();
                let arg = Box::new(self.parse_unary()?);
                Ok(Expr::Update(UpdateExpr { op, prefix: true, arg, span: self.span_from(start) }))
            }
            _ => {
                let expr = self.parse_call_member()?;
                if matches!(self.peek_kind(), TokenKind::PlusPlus | TokenKind::MinusMinus) && !self.current().newline_before {
                    let op = self.advance().kind.to_string();
                    return Ok(Expr::Update(UpdateExpr { op, prefix: false, arg: Box::new(expr), span: self.span_from(start) }));
                }
                Ok(expr)
            }
        }
    }

    /// Whether the token `n` ahead can begin an operand (used for contextual `await`).
    fn starts_operand(&self, n: usize) -> bool {
        matches!(
            self.nth_kind(n),
            TokenKind::Ident(_) | TokenKind::Number(_) | TokenKind::Str(_) | TokenKind::Template(_)
                | TokenKind::LParen | TokenKind::LBracket | TokenKind::New | TokenKind::This
                | TokenKind::Function | TokenKind::True | TokenKind::False | TokenKind::Null
                | TokenKind::Bang | TokenKind::Typeof | TokenKind::Class | TokenKind::Super
        )
    }

    fn parse_call_member(&mut self) -> Result<Expr, ParseError> {
        let expr = if matches!(self.peek_kind(), TokenKind::New) { self.parse_new()? } else { self.parse_primary()? };
        let depth = self.depth;
        let result = self.parse_postfix(expr);
        self.depth = depth;
        result
    }

    /// Member, index and call suffixes; every suffix wraps the tree one level deeper.
    fn parse_postfix(&mut self, mut expr: Expr) -> Result<Expr, ParseError> {
        loop {
            let start = expr.span();
            if matches!(
                self.peek_kind(),
                TokenKind::Dot | TokenKind::QuestionDot | TokenKind::LBracket | TokenKind::LParen | TokenKind::Template(_)
            ) {
                self.descend()?;
            }
            match self.peek_kind() {
                TokenKind::Dot => {
                    self.advance();
                    let (property, property_span) = self.parse_member_name()?;
                    expr = Expr::Member(MemberExpr { object: Box::new(expr), property, property_span, optional: false, span: self.span_from(start) });
                }
                TokenKind::QuestionDot => {
                    self.advance();
                    match self.peek_kind() {
                        TokenKind::LParen => {
                            let args = self.parse_args()?;
                            expr = Expr::Call(CallExpr { callee: Box::new(expr), args, optional: true, span: self.span_from(start) });
                        }
                        TokenKind::LBracket => {
                            self.advance();
                            let index = Box::new(self.with_in(true, |p| p.parse_expr())?);
                            self.expect(&TokenKind::RBracket)?;
                            expr = Expr::Index(IndexExpr { object: Box::new(expr), index, optional: true, span: self.span_from(start) });
                        }
                        _ => {
                            let (property, property_span) = self.parse_member_name()?;
                            expr = Expr::Member(MemberExpr { object: Box::new(expr), property, property_span, optional: true, span: self.span_from(start) });
                        }
                    }
                }
                TokenKind::LBracket => {
                    self.advance();
                    let index = Box::new(self.with_in(true, |p| p.parse_expr())?);
                    self.expect(&TokenKind::RBracket)?;
                    expr = Expr::Index(IndexExpr { object: Box::new(expr), index, optional: false, span: self.span_from(start) });
                }
                TokenKind::LParen => {
                    let args = self.parse_args()?;
                    expr = Expr::Call(CallExpr { callee: Box::new(expr), args, optional: false, span: self.span_from(start) });
                }
                TokenKind::Template(raw) => {
                    // tagged template
                    let tok_span = self.current().span;
                    let arg = Expr::Template(raw.clone(), tok_span);
                    self.advance();
                    expr = Expr::Call(CallExpr { callee: Box::new(expr), args: vec![arg], optional: false, span: self.span_from(start) });
                }
                _ => return Ok(expr),
            }
        }
    }

    fn parse_member_name(&mut self) -> Result<(String, Span), ParseError> {
        let tok = self.current().clone();
        match tok.kind.property_name() {
            Some(name) => { self.advance(); Ok((name, tok.span)) }
            None => Err(self.unexpected("property name")),
        }
    }

    fn parse_new(&mut self) -> Result<Expr, ParseError> {
        let depth = self.depth;
        let result = self.parse_new_inner();
        self.depth = depth;
        result
    }

    fn parse_new_inner(&mut self) -> Result<Expr, ParseError> {
        self.descend()?;
        let start = self.expect(&TokenKind::New)?.span;
        let mut callee = if matches!(self.peek_kind(), TokenKind::New) { self.parse_new()? } else { self.parse_primary()? };
        loop {
            let callee_start = callee.span();
            if matches!(self.peek_kind(), TokenKind::Dot | TokenKind::LBracket) {
                self.descend()?;
            }
            match self.peek_kind() {
                TokenKind::Dot => {
                    self.advance();
                    let (property, property_span) = self.parse_member_name()?;
                    callee = Expr::Member(MemberExpr { object: Box::new(callee), property, property_span, optional: false, span: self.span_from(callee_start) });
                }
                TokenKind::LBracket => {
                    self.advance();
                    let index = Box::new(self.with_in(true, |p| p.parse_expr())?);
                    self.expect(&TokenKind::RBracket)?;
                    callee = Expr::Index(IndexExpr { object: Box::new(callee), index, optional: false, span: self.span_from(callee_start) });
                }
                _ => break,
            }
        }
        let args = if matches!(self.peek_kind(), TokenKind::LParen) { self.parse_args()? } else { Vec::new() };
        Ok(Expr::New(NewExpr { callee: Box::new(callee), args, span: self.span_from(start) }))
    }

    fn parse_args(&mut self) -> Result<Vec<Expr>, ParseError> {
        self.expect(&TokenKind::LParen)?;
        let mut args = Vec::new();
        self.with_in(true, |p| {
            while !matches!(p.peek_kind(), TokenKind::RParen) {
                if matches!(p.peek_kind(), TokenKind::Ellipsis) {
                    let start = p.advance().span;
                    let arg = Box::new(p.parse_assign()?);
                    args.push(Expr::Spread(arg, p.span_from(start)));
                } else {
                    args.push(p.parse_assign()?);
                }
                if !p.eat(&TokenKind::Comma) { break; }
            }
            Ok(())
        })?;
        self.expect(&TokenKind::RParen)?;
        Ok(args)
    }

    fn parse_primary(&mut self) -> Result<Expr, ParseError> {
        let tok = self.current().clone();
        match tok.kind {
            TokenKind::Ident(ref s) if s == "async"
                && matches!(self.nth_kind(1), TokenKind::Function)
                && !self.tokens[(self.pos + 1).min(self.tokens.len() - 1)].newline_before =>
            {
                self.advance();
                Ok(Expr::Function(Box::new(self.parse_function(true)?)))
            }
            TokenKind::Ident(_) => Ok(Expr::Ident(self.expect_ident()?)),
            TokenKind::Number(n) => { self.advance(); Ok(Expr::Number(n, tok.span)) }
            TokenKind::Str(s) => { self.advance(); Ok(Expr::Str(s, tok.span)) }
            TokenKind::Template(s) => { self.advance(); Ok(Expr::Template(s, tok.span)) }
            TokenKind::True => { self.advance(); Ok(Expr::Bool(true, tok.span)) }
            TokenKind::False => { self.advance(); Ok(Expr::Bool(false, tok.span)) }
            TokenKind::Null => { self.advance(); Ok(Expr::Null(tok.span)) }
            TokenKind::This => { self.advance(); Ok(Expr::This(tok.span)) }
            TokenKind::Super => { self.advance(); Ok(Expr::Super(tok.span)) }
            TokenKind::Import => {
                // dynamic `import(...)` and `import.meta`; resolves like any undeclared global
                self.advance();
                Ok(Expr::Ident(self.make_ident("import".to_string(), tok.span)))
            }
            TokenKind::LParen => {
                self.advance();
                let inner = self.with_in(true, |p| p.parse_expr())?;
                self.expect(&TokenKind::RParen)?;
                Ok(inner)
            }
            TokenKind::LBracket => self.parse_array_literal(),
            TokenKind::LBrace => self.parse_object_literal(),
            TokenKind::Function => Ok(Expr::Function(Box::new(self.parse_function(false)?))),
            TokenKind::Class => Ok(Expr::Class(Box::new(self.parse_class()?))),
            _ => Err(self.unexpected("expression")),
        }
    }

    fn parse_array_literal(&mut self) -> Result<Expr, ParseError> {
        let start = self.expect(&TokenKind::LBracket)?.span;
        let mut items = Vec::new();
        self.with_in(true, |p| {
            while !matches!(p.peek_kind(), TokenKind::RBracket) {
                if p.eat(&TokenKind::Comma) { items.push(None); continue; }
                if matches!(p.peek_kind(), TokenKind::Ellipsis) {
                    let s = p.advance().span;
                    let arg = Box::new(p.parse_assign()?);
                    items.push(Some(Expr::Spread(arg, p.span_from(s))));
                } else {
                    items.push(Some(p.parse_assign()?));
                }
                if !p.eat(&TokenKind::Comma) { break; }
            }
            Ok(())
        })?;
        self.expect(&TokenKind::RBracket)?;
        Ok(Expr::Array(items, self.span_from(start)))
    }

    fn parse_object_literal(&mut self) -> Result<Expr, ParseError> {
        let start = self.expect(&TokenKind::LBrace)?.span;
        let mut props = Vec::new();
        self.with_in(true, |p| {
            while !matches!(p.peek_kind(), TokenKind::RBrace) {
                let prop_start = p.current().span;
                if p.eat(&TokenKind::Ellipsis) {
                    let value = p.parse_assign()?;
                    props.push(ObjectProp::Spread(value, p.span_from(prop_start)));
                } else {
                    let is_async = p.skip_method_modifiers();
                    let shorthand = match p.peek_kind() {
                        TokenKind::Ident(name) => Some(name.clone()),
                        _ => None,
                    };
                    let key = p.parse_prop_key()?;
                    if matches!(p.peek_kind(), TokenKind::LParen) {
                        let func = p.parse_method(prop_start, is_async)?;
                        props.push(ObjectProp::Method { key, func });
                    } else if p.eat(&TokenKind::Colon) {
                        let value = p.parse_assign()?;
                        props.push(ObjectProp::KeyValue { key, value, span: p.span_from(prop_start) });
                    } else {
                        let name = shorthand.ok_or_else(|| p.unexpected(":"))?;
                        props.push(ObjectProp::Shorthand(p.make_ident(name, prop_start)));
                    }
                }
                if !p.eat(&TokenKind::Comma) { break; }
            }
            Ok(())
        })?;
        self.expect(&TokenKind::RBrace)?;
        Ok(Expr::Object(props, self.span_from(start)))
    }
}
