//! Token types produced by the lexer

use cqlsql_diagnostics::SourceLocation;
use std::fmt;

/// Reserved words, matched case-insensitively
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Keyword {
    Library,
    Version,
    Using,
    Include,
    Called,
    Parameter,
    Default,
    Define,
    Context,
    Valueset,
    Codesystem,
    Code,
    From,
    Display,
    Where,
    With,
    Without,
    Such,
    That,
    Return,
    And,
    Or,
    Not,
    Exists,
    During,
    Before,
    After,
    Overlaps,
    On,
    Starts,
    Ends,
    Start,
    End,
    Of,
    In,
    Is,
    Null,
    True,
    False,
    Interval,
    Union,
    Except,
    Intersect,
}

impl Keyword {
    const ALL: [Keyword; 43] = [
        Self::Library,
        Self::Version,
        Self::Using,
        Self::Include,
        Self::Called,
        Self::Parameter,
        Self::Default,
        Self::Define,
        Self::Context,
        Self::Valueset,
        Self::Codesystem,
        Self::Code,
        Self::From,
        Self::Display,
        Self::Where,
        Self::With,
        Self::Without,
        Self::Such,
        Self::That,
        Self::Return,
        Self::And,
        Self::Or,
        Self::Not,
        Self::Exists,
        Self::During,
        Self::Before,
        Self::After,
        Self::Overlaps,
        Self::On,
        Self::Starts,
        Self::Ends,
        Self::Start,
        Self::End,
        Self::Of,
        Self::In,
        Self::Is,
        Self::Null,
        Self::True,
        Self::False,
        Self::Interval,
        Self::Union,
        Self::Except,
        Self::Intersect,
    ];

    /// Look up a keyword after lower-casing `word`
    pub fn lookup(word: &str) -> Option<Self> {
        let lower = word.to_ascii_lowercase();
        Self::ALL.into_iter().find(|kw| kw.as_str() == lower)
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Library => "library",
            Self::Version => "version",
            Self::Using => "using",
            Self::Include => "include",
            Self::Called => "called",
            Self::Parameter => "parameter",
            Self::Default => "default",
            Self::Define => "define",
            Self::Context => "context",
            Self::Valueset => "valueset",
            Self::Codesystem => "codesystem",
            Self::Code => "code",
            Self::From => "from",
            Self::Display => "display",
            Self::Where => "where",
            Self::With => "with",
            Self::Without => "without",
            Self::Such => "such",
            Self::That => "that",
            Self::Return => "return",
            Self::And => "and",
            Self::Or => "or",
            Self::Not => "not",
            Self::Exists => "exists",
            Self::During => "during",
            Self::Before => "before",
            Self::After => "after",
            Self::Overlaps => "overlaps",
            Self::On => "on",
            Self::Starts => "starts",
            Self::Ends => "ends",
            Self::Start => "start",
            Self::End => "end",
            Self::Of => "of",
            Self::In => "in",
            Self::Is => "is",
            Self::Null => "null",
            Self::True => "true",
            Self::False => "false",
            Self::Interval => "interval",
            Self::Union => "union",
            Self::Except => "except",
            Self::Intersect => "intersect",
        }
    }

    /// Keywords that start a library-level statement
    pub const fn starts_statement(&self) -> bool {
        matches!(
            self,
            Self::Library
                | Self::Using
                | Self::Include
                | Self::Parameter
                | Self::Define
                | Self::Context
                | Self::Valueset
                | Self::Codesystem
                | Self::Code
        )
    }

    /// Keywords that turn a preceding source into a query
    pub const fn starts_query_clause(&self) -> bool {
        matches!(self, Self::Where | Self::With | Self::Without | Self::Return)
    }
}

impl fmt::Display for Keyword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of a token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    // === Names ===
    Identifier,
    /// Double-quoted identifier (`"Measurement Period"`)
    QuotedIdentifier,
    Keyword(Keyword),

    // === Literals ===
    /// Single-quoted string
    String,
    Integer,
    Decimal,
    Date,
    DateTime,
    Time,

    // === Operators ===
    Eq,
    NotEq,
    Less,
    Greater,
    LessEq,
    GreaterEq,
    Tilde,
    Plus,
    Minus,
    Star,
    Slash,
    Ampersand,

    // === Punctuation ===
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    Colon,
    Comma,
    Dot,

    /// Unrecognised character or unterminated string
    Unknown,
    /// Synthetic end-of-input marker
    Eof,
}

impl TokenKind {
    /// Source spelling for fixed tokens, or a category name
    pub fn describe(&self) -> String {
        let s = match self {
            Self::Identifier => "identifier",
            Self::QuotedIdentifier => "quoted identifier",
            Self::Keyword(kw) => return format!("'{kw}'"),
            Self::String => "string",
            Self::Integer => "integer",
            Self::Decimal => "decimal",
            Self::Date => "date",
            Self::DateTime => "datetime",
            Self::Time => "time",
            Self::Eq => "'='",
            Self::NotEq => "'!='",
            Self::Less => "'<'",
            Self::Greater => "'>'",
            Self::LessEq => "'<='",
            Self::GreaterEq => "'>='",
            Self::Tilde => "'~'",
            Self::Plus => "'+'",
            Self::Minus => "'-'",
            Self::Star => "'*'",
            Self::Slash => "'/'",
            Self::Ampersand => "'&'",
            Self::LParen => "'('",
            Self::RParen => "')'",
            Self::LBracket => "'['",
            Self::RBracket => "']'",
            Self::LBrace => "'{'",
            Self::RBrace => "'}'",
            Self::Colon => "':'",
            Self::Comma => "','",
            Self::Dot => "'.'",
            Self::Unknown => "unknown character",
            Self::Eof => "end of input",
        };
        s.to_string()
    }
}

/// A lexed token
///
/// `literal_text` holds the token's value: strings and quoted identifiers
/// without quotes and with escapes resolved, temporal literals without
/// the `@`, everything else exactly as written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub literal_text: String,
    pub line: usize,
    pub column: usize,
}

impl Token {
    pub fn new(kind: TokenKind, literal_text: impl Into<String>, location: SourceLocation) -> Self {
        Self {
            kind,
            literal_text: literal_text.into(),
            line: location.line,
            column: location.column,
        }
    }

    pub fn location(&self) -> SourceLocation {
        SourceLocation::new(self.line, self.column)
    }

    pub fn is_keyword(&self, keyword: Keyword) -> bool {
        self.kind == TokenKind::Keyword(keyword)
    }

    pub fn is_eof(&self) -> bool {
        self.kind == TokenKind::Eof
    }

    /// Description used as the `found` part of syntax errors
    pub fn describe(&self) -> String {
        match self.kind {
            TokenKind::Identifier | TokenKind::Integer | TokenKind::Decimal => {
                format!("{} '{}'", self.kind.describe(), self.literal_text)
            }
            TokenKind::QuotedIdentifier => format!("\"{}\"", self.literal_text),
            TokenKind::String => format!("string '{}'", self.literal_text),
            TokenKind::Unknown => format!("unknown '{}'", self.literal_text),
            _ => self.kind.describe(),
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at {}:{}", self.describe(), self.line, self.column)
    }
}
