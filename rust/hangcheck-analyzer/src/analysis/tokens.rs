use serde::{Deserialize, Serialize};
use std::fmt;

/// Source location in the analyzed file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    /// Byte offset of the start in the source
    pub start: usize,
    /// Byte offset of the end (exclusive) in the source
    pub end: usize,
    /// 1-based line number
    pub line: usize,
    /// 1-based column number
    pub col: usize,
}

impl Span {
    pub fn new(start: usize, end: usize, line: usize, col: usize) -> Self {
        Self { start, end, line, col }
    }

    pub fn dummy() -> Self {
        Self { start: 0, end: 0, line: 0, col: 0 }
    }

    pub fn merge(self, other: Span) -> Span {
        let (line, col) = if (self.line, self.col) <= (other.line, other.col) {
            (self.line, self.col)
        } else {
            (other.line, other.col)
        };
        Span { start: self.start.min(other.start), end: self.end.max(other.end), line, col }
    }

    pub fn width(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    /// The exact source text covered by this span, if it lies on char boundaries.
    pub fn text<'s>(&self, source: &'s str) -> Option<&'s str> {
        source.get(self.start..self.end)
    }
}

/// Token types for the supported JavaScript subset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TokenKind {
    // Literals
    Number(f64),
    Str(String),
    /// Template literal, kept opaque (interpolations are not evaluated)
    Template(String),

    Ident(String),

    // Keywords
    Var,
    Let,
    Const,
    Function,
    Class,
    Extends,
    New,
    If,
    Else,
    Return,
    For,
    In,
    While,
    Do,
    Switch,
    Case,
    Default,
    Try,
    Catch,
    Finally,
    Throw,
    Break,
    Continue,
    True,
    False,
    Null,
    This,
    Super,
    Typeof,
    Void,
    Delete,
    Instanceof,
    Import,
    Export,

    // Operators
    Plus,
    Minus,
    Star,
    StarStar,
    Slash,
    Percent,
    EqEq,       // ==
    EqEqEq,     // ===
    NotEq,      // !=
    NotEqEq,    // !==
    Lt,
    LtEq,
    Gt,
    GtEq,
    Shl,        // <<
    Shr,        // >>
    UShr,       // >>>
    Amp,
    Pipe,
    Caret,
    Tilde,
    Bang,
    AndAnd,
    OrOr,
    Nullish,    // ??
    PlusPlus,
    MinusMinus,
    Assign,
    /// Compound assignment such as `+=` or `??=`, carrying the operator text
    CompoundAssign(String),
    Arrow,      // =>

    // Punctuation
    Dot,
    QuestionDot, // ?.
    Ellipsis,
    Question,
    Colon,
    Semi,
    Comma,
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,

    Eof,
}

impl TokenKind {
    pub fn keyword(word: &str) -> Option<TokenKind> {
        let kind = match word {
            "var" => TokenKind::Var, "let" => TokenKind::Let, "const" => TokenKind::Const,
            "function" => TokenKind::Function, "class" => TokenKind::Class, "extends" => TokenKind::Extends,
            "new" => TokenKind::New, "if" => TokenKind::If, "else" => TokenKind::Else,
            "return" => TokenKind::Return, "for" => TokenKind::For, "in" => TokenKind::In,
            "while" => TokenKind::While, "do" => TokenKind::Do, "switch" => TokenKind::Switch,
            "case" => TokenKind::Case, "default" => TokenKind::Default, "try" => TokenKind::Try,
            "catch" => TokenKind::Catch, "finally" => TokenKind::Finally, "throw" => TokenKind::Throw,
            "break" => TokenKind::Break, "continue" => TokenKind::Continue, "true" => TokenKind::True,
            "false" => TokenKind::False, "null" => TokenKind::Null, "this" => TokenKind::This,
            "super" => TokenKind::Super, "typeof" => TokenKind::Typeof, "void" => TokenKind::Void,
            "delete" => TokenKind::Delete, "instanceof" => TokenKind::Instanceof,
            "import" => TokenKind::Import, "export" => TokenKind::Export,
            _ => return None,
        };
        Some(kind)
    }

    /// Name usable as a property key after `.` or inside an object literal.
    /// Keywords are valid property names in JavaScript.
    pub fn property_name(&self) -> Option<String> {
        match self {
            TokenKind::Ident(s) => Some(s.clone()),
            TokenKind::Number(_) | TokenKind::Str(_) | TokenKind::Template(_) => None,
            other if other.is_keyword() => Some(other.to_string()),
            _ => None,
        }
    }

    pub fn is_keyword(&self) -> bool {
        matches!(
            self,
            TokenKind::Var | TokenKind::Let | TokenKind::Const | TokenKind::Function
                | TokenKind::Class | TokenKind::Extends | TokenKind::New | TokenKind::If
                | TokenKind::Else | TokenKind::Return | TokenKind::For | TokenKind::In
                | TokenKind::While | TokenKind::Do | TokenKind::Switch | TokenKind::Case
                | TokenKind::Default | TokenKind::Try | TokenKind::Catch | TokenKind::Finally
                | TokenKind::Throw | TokenKind::Break | TokenKind::Continue | TokenKind::True
                | TokenKind::False | TokenKind::Null | TokenKind::This | TokenKind::Super
                | TokenKind::Typeof | TokenKind::Void | TokenKind::Delete | TokenKind::Instanceof
                | TokenKind::Import | TokenKind::Export
        )
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TokenKind::Number(n) => return write!(f, "{}", n),
            TokenKind::Str(s) => return write!(f, "\"{}\"", s),
            TokenKind::Template(s) => return write!(f, "`{}`", s),
            TokenKind::Ident(s) => return write!(f, "{}", s),
            TokenKind::CompoundAssign(op) => return write!(f, "{}", op),
            TokenKind::Var => "var",
            TokenKind::Let => "let",
            TokenKind::Const => "const",
            TokenKind::Function => "function",
            TokenKind::Class => "class",
            TokenKind::Extends => "extends",
            TokenKind::New => "new",
            TokenKind::If => "if",
            TokenKind::Else => "else",
            TokenKind::Return => "return",
            TokenKind::For => "for",
            TokenKind::In => "in",
            TokenKind::While => "while",
            TokenKind::Do => "do",
            TokenKind::Switch => "switch",
            TokenKind::Case => "case",
            TokenKind::Default => "default",
            TokenKind::Try => "try",
            TokenKind::Catch => "catch",
            TokenKind::Finally => "finally",
            TokenKind::Throw => "throw",
            TokenKind::Break => "break",
            TokenKind::Continue => "continue",
            TokenKind::True => "true",
            TokenKind::False => "false",
            TokenKind::Null => "null",
            TokenKind::This => "this",
            TokenKind::Super => "super",
            TokenKind::Typeof => "typeof",
            TokenKind::Void => "void",
            TokenKind::Delete => "delete",
            TokenKind::Instanceof => "instanceof",
            TokenKind::Import => "import",
            TokenKind::Export => "export",
            TokenKind::Plus => "+",
            TokenKind::Minus => "-",
            TokenKind::Star => "*",
            TokenKind::StarStar => "**",
            TokenKind::Slash => "/",
            TokenKind::Percent => "%",
            TokenKind::EqEq => "==",
            TokenKind::EqEqEq => "===",
            TokenKind::NotEq => "!=",
            TokenKind::NotEqEq => "!==",
            TokenKind::Lt => "<",
            TokenKind::LtEq => "<=",
            TokenKind::Gt => ">",
            TokenKind::GtEq => ">=",
            TokenKind::Shl => "<<",
            TokenKind::Shr => ">>",
            TokenKind::UShr => ">>>",
            TokenKind::Amp => "&",
            TokenKind::Pipe => "|",
            TokenKind::Caret => "^",
            TokenKind::Tilde => "~",
            TokenKind::Bang => "!",
            TokenKind::AndAnd => "&&",
            TokenKind::OrOr => "||",
            TokenKind::Nullish => "??",
            TokenKind::PlusPlus => "++",
            TokenKind::MinusMinus => "--",
            TokenKind::Assign => "=",
            TokenKind::Arrow => "=>",
            TokenKind::Dot => ".",
            TokenKind::QuestionDot => "?.",
            TokenKind::Ellipsis => "...",
            TokenKind::Question => "?",
            TokenKind::Colon => ":",
            TokenKind::Semi => ";",
            TokenKind::Comma => ",",
            TokenKind::LParen => "(",
            TokenKind::RParen => ")",
            TokenKind::LBracket => "[",
            TokenKind::RBracket => "]",
            TokenKind::LBrace => "{",
            TokenKind::RBrace => "}",
            TokenKind::Eof => "end of input",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
    /// A line terminator appeared between the previous token and this one
    pub newline_before: bool,
}

impl Token {
    pub fn new(kind: TokenKind, span: Span) -> Self {
        Self { kind, span, newline_before: false }
    }
}
