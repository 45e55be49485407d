//! Token types for query lexing.

use crate::ast::Span;
use smol_str::SmolStr;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TokenKind {
    // Keywords
    Cypher,
    Match,
    Where,
    Return,
    With,
    Unwind,
    Create,
    Set,
    Delete,
    Detach,
    As,
    Order,
    By,
    Asc,
    Desc,
    Skip,
    Limit,
    Distinct,
    And,
    Or,
    Xor,
    Not,
    Is,
    In,
    Null,
    True,
    False,

    // Literals and names
    Identifier(SmolStr),
    /// `$name`, without the dollar sign.
    Parameter(SmolStr),
    IntegerLiteral(SmolStr),
    FloatLiteral(SmolStr),
    /// Unescaped string contents.
    StringLiteral(SmolStr),

    // Punctuation
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    Comma,
    Dot,
    Colon,
    Semicolon,

    // Operators
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Caret,
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    /// `->`
    Arrow,
    /// `<-`
    LeftArrow,

    Eof,
}

impl TokenKind {
    pub fn is_keyword(&self) -> bool {
        matches!(
            self,
            TokenKind::Cypher
                | TokenKind::Match
                | TokenKind::Where
                | TokenKind::Return
                | TokenKind::With
                | TokenKind::Unwind
                | TokenKind::Create
                | TokenKind::Set
                | TokenKind::Delete
                | TokenKind::Detach
                | TokenKind::As
                | TokenKind::Order
                | TokenKind::By
                | TokenKind::Asc
                | TokenKind::Desc
                | TokenKind::Skip
                | TokenKind::Limit
                | TokenKind::Distinct
                | TokenKind::And
                | TokenKind::Or
                | TokenKind::Xor
                | TokenKind::Not
                | TokenKind::Is
                | TokenKind::In
                | TokenKind::Null
                | TokenKind::True
                | TokenKind::False
        )
    }

    /// True for keywords that open a body clause.
    pub fn starts_clause(&self) -> bool {
        matches!(
            self,
            TokenKind::Match
                | TokenKind::Unwind
                | TokenKind::Create
                | TokenKind::Set
                | TokenKind::Delete
                | TokenKind::Detach
                | TokenKind::With
                | TokenKind::Return
        )
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            TokenKind::Cypher => "CYPHER",
            TokenKind::Match => "MATCH",
            TokenKind::Where => "WHERE",
            TokenKind::Return => "RETURN",
            TokenKind::With => "WITH",
            TokenKind::Unwind => "UNWIND",
            TokenKind::Create => "CREATE",
            TokenKind::Set => "SET",
            TokenKind::Delete => "DELETE",
            TokenKind::Detach => "DETACH",
            TokenKind::As => "AS",
            TokenKind::Order => "ORDER",
            TokenKind::By => "BY",
            TokenKind::Asc => "ASC",
            TokenKind::Desc => "DESC",
            TokenKind::Skip => "SKIP",
            TokenKind::Limit => "LIMIT",
            TokenKind::Distinct => "DISTINCT",
            TokenKind::And => "AND",
            TokenKind::Or => "OR",
            TokenKind::Xor => "XOR",
            TokenKind::Not => "NOT",
            TokenKind::Is => "IS",
            TokenKind::In => "IN",
            TokenKind::Null => "NULL",
            TokenKind::True => "TRUE",
            TokenKind::False => "FALSE",
            TokenKind::Identifier(name) => return write!(f, "identifier '{name}'"),
            TokenKind::Parameter(name) => return write!(f, "parameter '${name}'"),
            TokenKind::IntegerLiteral(text) | TokenKind::FloatLiteral(text) => {
                return write!(f, "number {text}");
            }
            TokenKind::StringLiteral(_) => "string literal",
            TokenKind::LParen => "'('",
            TokenKind::RParen => "')'",
            TokenKind::LBracket => "'['",
            TokenKind::RBracket => "']'",
            TokenKind::LBrace => "'{'",
            TokenKind::RBrace => "'}'",
            TokenKind::Comma => "','",
            TokenKind::Dot => "'.'",
            TokenKind::Colon => "':'",
            TokenKind::Semicolon => "';'",
            TokenKind::Plus => "'+'",
            TokenKind::Minus => "'-'",
            TokenKind::Star => "'*'",
            TokenKind::Slash => "'/'",
            TokenKind::Percent => "'%'",
            TokenKind::Caret => "'^'",
            TokenKind::Eq => "'='",
            TokenKind::NotEq => "'<>'",
            TokenKind::Lt => "'<'",
            TokenKind::LtEq => "'<='",
            TokenKind::Gt => "'>'",
            TokenKind::GtEq => "'>='",
            TokenKind::Arrow => "'->'",
            TokenKind::LeftArrow => "'<-'",
            TokenKind::Eof => "end of input",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

impl Token {
    pub fn new(kind: TokenKind, span: Span) -> Self {
        Self { kind, span }
    }

    /// Returns the source slice covered by this token.
    pub fn slice<'a>(&self, source: &'a str) -> &'a str {
        &source[self.span.clone()]
    }
}
