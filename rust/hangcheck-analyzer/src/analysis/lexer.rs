//! Lexer for the supported JavaScript subset.

use crate::analysis::tokens::{Span, Token, TokenKind};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum LexError {
    #[error("unexpected character '{ch}' at line {line}, col {col}")]
    UnexpectedChar { ch: char, line: usize, col: usize },
    #[error("unterminated string at line {line}, col {col}")]
    UnterminatedString { line: usize, col: usize },
    #[error("unterminated template literal at line {line}, col {col}")]
    UnterminatedTemplate { line: usize, col: usize },
    #[error("unterminated block comment at line {line}, col {col}")]
    UnterminatedComment { line: usize, col: usize },
    #[error("invalid number at line {line}, col {col}")]
    InvalidNumber { line: usize, col: usize },
}

/// Punctuators, longest first so that a prefix never wins over its extension.
const PUNCTUATORS: &[(&str, fn() -> TokenKind)] = &[
    (">>>=", || TokenKind::CompoundAssign(">>>=".into())),
    ("...", || TokenKind::Ellipsis),
    ("===", || TokenKind::EqEqEq),
    ("!==", || TokenKind::NotEqEq),
    (">>>", || TokenKind::UShr),
    ("**=", || TokenKind::CompoundAssign("**=".into())),
    ("<<=", || TokenKind::CompoundAssign("<<=".into())),
    (">>=", || TokenKind::CompoundAssign(">>=".into())),
    ("&&=", || TokenKind::CompoundAssign("&&=".into())),
    ("||=", || TokenKind::CompoundAssign("||=".into())),
    ("??=", || TokenKind::CompoundAssign("??=".into())),
    ("=>", || TokenKind::Arrow),
    ("==", || TokenKind::EqEq),
    ("!=", || TokenKind::NotEq),
    ("<=", || TokenKind::LtEq),
    (">=", || TokenKind::GtEq),
    ("<<", || TokenKind::Shl),
    (">>", || TokenKind::Shr),
    ("**", || TokenKind::StarStar),
    ("&&", || TokenKind::AndAnd),
    ("||", || TokenKind::OrOr),
    ("??", || TokenKind::Nullish),
    ("?.", || TokenKind::QuestionDot),
    ("++", || TokenKind::PlusPlus),
    ("--", || TokenKind::MinusMinus),
    ("+=", || TokenKind::CompoundAssign("+=".into())),
    ("-=", || TokenKind::CompoundAssign("-=".into())),
    ("*=", || TokenKind::CompoundAssign("*=".into())),
    ("/=", || TokenKind::CompoundAssign("/=".into())),
    ("%=", || TokenKind::CompoundAssign("%=".into())),
    ("&=", || TokenKind::CompoundAssign("&=".into())),
    ("|=", || TokenKind::CompoundAssign("|=".into())),
    ("^=", || TokenKind::CompoundAssign("^=".into())),
    ("=", || TokenKind::Assign),
    ("+", || TokenKind::Plus),
    ("-", || TokenKind::Minus),
    ("*", || TokenKind::Star),
    ("/", || TokenKind::Slash),
    ("%", || TokenKind::Percent),
    ("<", || TokenKind::Lt),
    (">", || TokenKind::Gt),
    ("&", || TokenKind::Amp),
    ("|", || TokenKind::Pipe),
    ("^", || TokenKind::Caret),
    ("~", || TokenKind::Tilde),
    ("!", || TokenKind::Bang),
    ("?", || TokenKind::Question),
    (":", || TokenKind::Colon),
    (";", || TokenKind::Semi),
    (",", || TokenKind::Comma),
    (".", || TokenKind::Dot),
    ("(", || TokenKind::LParen),
    (")", || TokenKind::RParen),
    ("[", || TokenKind::LBracket),
    ("]", || TokenKind::RBracket),
    ("{", || TokenKind::LBrace),
    ("}", || TokenKind::RBrace),
];

pub struct Lexer {
    source: Vec<char>,
    pos: usize,
    line: usize,
    col: usize,
    byte_offset: usize,
    newline_pending: bool,
}

impl Lexer {
    pub fn new(source: &str) -> Self {
        Self {
            source: source.chars().collect(),
            pos: 0, line: 1, col: 1, byte_offset: 0,
            newline_pending: false,
        }
    }

    fn current(&self) -> Option<char> { self.source.get(self.pos).copied() }
    fn peek(&self) -> Option<char> { self.source.get(self.pos + 1).copied() }
    fn peek_at(&self, n: usize) -> Option<char> { self.source.get(self.pos + n).copied() }

    fn advance(&mut self) -> Option<char> {
        let ch = self.source.get(self.pos).copied()?;
        self.pos += 1;
        self.byte_offset += ch.len_utf8();
        if ch == '\n' { self.line += 1; self.col = 1; self.newline_pending = true; }
        else { self.col += 1; }
        Some(ch)
    }

    fn span_from(&self, so: usize, sl: usize, sc: usize) -> Span {
        Span::new(so, self.byte_offset, sl, sc)
    }

    fn push(&mut self, tokens: &mut Vec<Token>, kind: TokenKind, span: Span) {
        let mut tok = Token::new(kind, span);
        tok.newline_before = std::mem::take(&mut self.newline_pending);
        tokens.push(tok);
    }

    fn skip_trivia(&mut self) -> Result<(), LexError> {
        loop {
            match (self.current(), self.peek()) {
                (Some(c), _) if c.is_whitespace() => { self.advance(); }
                (Some('/'), Some('/')) => {
                    while matches!(self.current(), Some(c) if c != '\n') { self.advance(); }
                }
                (Some('/'), Some('*')) => {
                    let (line, col) = (self.line, self.col);
                    self.advance(); self.advance();
                    loop {
                        match (self.current(), self.peek()) {
                            (None, _) => return Err(LexError::UnterminatedComment { line, col }),
                            (Some('*'), Some('/')) => { self.advance(); self.advance(); break; }
                            _ => { self.advance(); }
                        }
                    }
                }
                _ => return Ok(()),
            }
        }
    }

    fn read_string(&mut self, quote: char) -> Result<TokenKind, LexError> {
        let (sl, sc) = (self.line, self.col);
        self.advance(); // opening quote
        let mut s = String::new();
        loop {
            match self.current() {
                None | Some('\n') => return Err(LexError::UnterminatedString { line: sl, col: sc }),
                Some('\\') => {
                    self.advance();
                    match self.advance() {
                        Some('n') => s.push('\n'),
                        Some('t') => s.push('\t'),
                        Some('r') => s.push('\r'),
                        Some('0') => s.push('\0'),
                        Some('\n') => {} // line continuation
                        Some(c) => s.push(c),
                        None => return Err(LexError::UnterminatedString { line: sl, col: sc }),
                    }
                }
                Some(c) if c == quote => { self.advance(); break; }
                Some(c) => { s.push(c); self.advance(); }
            }
        }
        Ok(TokenKind::Str(s))
    }

    /// Template literals are kept as raw text; `${...}` nesting is tracked only
    /// to find the closing backtick.
    fn read_template(&mut self) -> Result<TokenKind, LexError> {
        let (sl, sc) = (self.line, self.col);
        self.advance(); // opening backtick
        let mut raw = String::new();
        let mut depth = 0usize;
        loop {
            match self.current() {
                None => return Err(LexError::UnterminatedTemplate { line: sl, col: sc }),
                Some('\\') => {
                    raw.push('\\');
                    self.advance();
                    if let Some(c) = self.advance() { raw.push(c); }
                }
                Some('`') if depth == 0 => { self.advance(); break; }
                Some('$') if self.peek() == Some('{') => {
                    depth += 1;
                    raw.push_str("${");
                    self.advance(); self.advance();
                }
                Some('{') if depth > 0 => { depth += 1; raw.push('{'); self.advance(); }
                Some('}') if depth > 0 => { depth -= 1; raw.push('}'); self.advance(); }
                Some(c) => { raw.push(c); self.advance(); }
            }
        }
        Ok(TokenKind::Template(raw))
    }

    fn read_number(&mut self) -> Result<TokenKind, LexError> {
        let (sl, sc) = (self.line, self.col);
        let invalid = || LexError::InvalidNumber { line: sl, col: sc };
        if self.current() == Some('0') {
            let radix = match self.peek() {
                Some('x' | 'X') => Some(16),
                Some('b' | 'B') => Some(2),
                Some('o' | 'O') => Some(8),
                _ => None,
            };
            if let Some(radix) = radix {
                self.advance(); self.advance();
                let mut digits = String::new();
                while let Some(ch) = self.current() {
                    if ch.is_digit(radix) { digits.push(ch); self.advance(); }
                    else if ch == '_' { self.advance(); }
                    else { break; }
                }
                if self.current() == Some('n') { self.advance(); }
                return u64::from_str_radix(&digits, radix)
                    .map(|n| TokenKind::Number(n as f64))
                    .map_err(|_| invalid());
            }
        }
        let mut ns = String::new();
        let mut seen_dot = false;
        let mut seen_exp = false;
        while let Some(ch) = self.current() {
            if ch.is_ascii_digit() { ns.push(ch); self.advance(); }
            else if ch == '_' { self.advance(); }
            else if ch == '.' && !seen_dot && !seen_exp { seen_dot = true; ns.push(ch); self.advance(); }
            else if matches!(ch, 'e' | 'E') && !seen_exp {
                seen_exp = true;
                ns.push(ch);
                self.advance();
                if let Some(sign @ ('+' | '-')) = self.current() { ns.push(sign); self.advance(); }
            }
            else { break; }
        }
        if self.current() == Some('n') { self.advance(); }
        ns.parse::<f64>().map(TokenKind::Number).map_err(|_| invalid())
    }

    fn read_word(&mut self) -> TokenKind {
        let mut id = String::new();
        while let Some(ch) = self.current() {
            if ch.is_alphanumeric() || ch == '_' || ch == '$' { id.push(ch); self.advance(); } else { break; }
        }
        TokenKind::keyword(&id).unwrap_or(TokenKind::Ident(id))
    }

    fn read_punctuator(&mut self) -> Option<TokenKind> {
        for (text, make) in PUNCTUATORS {
            let matches = text.chars().enumerate().all(|(i, c)| self.peek_at(i) == Some(c));
            if !matches { continue; }
            // `a?.5:b` is a conditional, not optional chaining
            if *text == "?." && matches!(self.peek_at(2), Some(d) if d.is_ascii_digit()) { continue; }
            for _ in 0..text.chars().count() { self.advance(); }
            return Some(make());
        }
        None
    }

    pub fn tokenize(&mut self) -> Result<Vec<Token>, LexError> {
        let mut tokens = Vec::new();
        loop {
            self.skip_trivia()?;
            let ch = match self.current() { Some(c) => c, None => break };
            let (so, sl, sc) = (self.byte_offset, self.line, self.col);
            let kind = match ch {
                '"' | '\'' => self.read_string(ch)?,
                '`' => self.read_template()?,
                '0'..='9' => self.read_number()?,
                '.' if matches!(self.peek(), Some(d) if d.is_ascii_digit()) => self.read_number()?,
                c if c.is_alphabetic() || c == '_' || c == '$' => self.read_word(),
                _ => match self.read_punctuator() {
                    Some(kind) => kind,
                    None => return Err(LexError::UnexpectedChar { ch, line: sl, col: sc }),
                },
            };
            let span = self.span_from(so, sl, sc);
            self.push(&mut tokens, kind, span);
        }
        let end = Span::new(self.byte_offset, self.byte_offset, self.line, self.col);
        self.push(&mut tokens, TokenKind::Eof, end);
        Ok(tokens)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<TokenKind> {
        Lexer::new(src).tokenize().unwrap().into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn test_lex_new_promise() {
        let toks = kinds("new Promise((resolve, reject) => {})");
        assert_eq!(toks[0], TokenKind::New);
        assert!(matches!(&toks[1], TokenKind::Ident(s) if s == "Promise"));
        assert!(toks.contains(&TokenKind::Arrow));
        assert_eq!(toks.last(), Some(&TokenKind::Eof));
    }

    #[test]
    fn test_lex_longest_operator_wins() {
        let toks = kinds("a === b !== c >>>= d ?? e");
        assert!(toks.contains(&TokenKind::EqEqEq));
        assert!(toks.contains(&TokenKind::NotEqEq));
        assert!(toks.contains(&TokenKind::CompoundAssign(">>>=".into())));
        assert!(toks.contains(&TokenKind::Nullish));
    }

    #[test]
    fn test_lex_strings_and_comments() {
        let toks = kinds("// line\n'a\\'b' /* block */ \"c\"");
        assert_eq!(toks[0], TokenKind::Str("a'b".into()));
        assert_eq!(toks[1], TokenKind::Str("c".into()));
    }

    #[test]
    fn test_lex_template_with_nested_braces() {
        let toks = kinds("`x ${ {a: 1}.a } y` + 1");
        assert!(matches!(&toks[0], TokenKind::Template(s) if s.contains("{a: 1}")));
        assert_eq!(toks[1], TokenKind::Plus);
    }

    #[test]
    fn test_lex_numbers() {
        let toks = kinds("0x1F 1_000 .5 2e3 10n");
        assert_eq!(toks[0], TokenKind::Number(31.0));
        assert_eq!(toks[1], TokenKind::Number(1000.0));
        assert_eq!(toks[2], TokenKind::Number(0.5));
        assert_eq!(toks[3], TokenKind::Number(2000.0));
        assert_eq!(toks[4], TokenKind::Number(10.0));
    }

    #[test]
    fn test_lex_spans_and_newlines() {
        let toks = Lexer::new("a\n  bc").tokenize().unwrap();
        assert_eq!(toks[1].span, Span::new(4, 6, 2, 3));
        assert!(toks[1].newline_before);
        assert!(!toks[0].newline_before);
    }

    #[test]
    fn test_lex_dollar_identifiers() {
        let toks = kinds("$.Deferred()");
        assert!(matches!(&toks[0], TokenKind::Ident(s) if s == "$"));
        assert_eq!(toks[1], TokenKind::Dot);
    }

    #[test]
    fn test_lex_unterminated_comment() {
        let err = Lexer::new("/* never closed").tokenize().unwrap_err();
        assert!(matches!(err, LexError::UnterminatedComment { line: 1, col: 1 }));
    }
}
