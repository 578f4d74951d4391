//! Surface tokens of the query language.

use dwq_core::{Constant, Span};

/// Built-in verbs and selectors.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum Word {
    Swap,
    Dup,
    Over,
    Rot,
    Drop,
    If,
    Else,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Parent,
    Child,
    Attribute,
    Prev,
    Next,
    Type,
    Offset,
    Name,
    Tag,
    Form,
    Value,
    Pos,
    Count,
    Each,
    Universe,
    Section,
    Unit,
    Winfo,
}

impl Word {
    /// Look a bare identifier up in the verb table.
    pub fn from_ident(ident: &str) -> Option<Word> {
        Some(match ident {
            "swap" => Word::Swap,
            "dup" => Word::Dup,
            "over" => Word::Over,
            "rot" => Word::Rot,
            "drop" => Word::Drop,
            "if" => Word::If,
            "else" => Word::Else,
            "add" => Word::Add,
            "sub" => Word::Sub,
            "mul" => Word::Mul,
            "div" => Word::Div,
            "mod" => Word::Mod,
            "parent" => Word::Parent,
            "child" => Word::Child,
            "attribute" => Word::Attribute,
            "prev" => Word::Prev,
            "next" => Word::Next,
            "type" => Word::Type,
            "offset" => Word::Offset,
            "name" => Word::Name,
            "tag" => Word::Tag,
            "form" => Word::Form,
            "value" => Word::Value,
            "pos" => Word::Pos,
            "count" => Word::Count,
            "each" => Word::Each,
            "universe" => Word::Universe,
            "section" => Word::Section,
            "unit" => Word::Unit,
            "winfo" => Word::Winfo,
            _ => return None,
        })
    }
}

/// What follows a `?`/`!` sigil.
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum PredKind {
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
    Match,
    Find,
    Root,
    Empty,
    /// `?compile_unit` and friends: a known tag suffix.
    Tag(Constant),
    /// `?@name`: attribute presence.
    At(Constant),
}

impl PredKind {
    pub fn from_ident(ident: &str) -> Option<PredKind> {
        Some(match ident {
            "eq" => PredKind::Eq,
            "ne" => PredKind::Ne,
            "lt" => PredKind::Lt,
            "gt" => PredKind::Gt,
            "le" => PredKind::Le,
            "ge" => PredKind::Ge,
            "match" => PredKind::Match,
            "find" => PredKind::Find,
            "root" => PredKind::Root,
            "empty" => PredKind::Empty,
            _ => return None,
        })
    }
}

/// One piece of a string literal.
#[derive(Clone, PartialEq, Debug)]
pub enum StrSeg {
    /// Literal bytes, escapes already processed.
    Lit(String),
    /// A `%( … %)` splice, recursively lexed. `%s` is an empty splice.
    Splice(Vec<Token>),
}

#[derive(Clone, PartialEq, Debug)]
pub enum Tok {
    Word(Word),
    /// Integer literal or spelled-out DWARF constant.
    Const(Constant),
    /// String literal, segmented into literals and splices. Segments
    /// always alternate starting and ending with a literal.
    Str(Vec<StrSeg>),
    /// `@name`: the attribute constant.
    At(Constant),
    /// `?kind` / `!kind` assertion.
    Pred { negate: bool, kind: PredKind },
    /// `?(` / `!(`: sub-expression assertion; the `(` follows as its own
    /// token.
    PredSub { negate: bool },
    Minus,
    Slash,
    Comma,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Star,
    Plus,
    Quest,
}

#[derive(Clone, PartialEq, Debug)]
pub struct Token {
    pub tok: Tok,
    pub span: Span,
}

impl Token {
    pub fn new(tok: Tok, span: Span) -> Self {
        Self { tok, span }
    }
}
