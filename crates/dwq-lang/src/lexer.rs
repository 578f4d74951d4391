//! Byte-level scanner for query source.

use num_bigint::BigInt;

use dwq_core::domain::{AT_DOM, DEC_DOM, HEX_DOM, OCT_DOM, TAG_DOM};
use dwq_core::{known_constant, Constant, Domain, Pos, QueryError, Result, Span};

use crate::token::{PredKind, StrSeg, Tok, Token, Word};

/// Tokenize a whole query.
pub fn lex(input: &str) -> Result<Vec<Token>> {
    let mut lexer = Lexer::new(input.as_bytes());
    let tokens = lexer.run(false)?;
    if lexer.pos < lexer.bytes.len() {
        return Err(lexer.error("end of input"));
    }
    Ok(tokens)
}

struct Lexer<'a> {
    bytes: &'a [u8],
    pos: usize,
}

fn is_ident_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_'
}

fn is_ident_char(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

impl<'a> Lexer<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn error(&self, expected: impl Into<String>) -> QueryError {
        QueryError::parse(Pos::new(self.pos as u32), expected)
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn peek_at(&self, ahead: usize) -> Option<u8> {
        self.bytes.get(self.pos + ahead).copied()
    }

    fn bump(&mut self) -> Option<u8> {
        let b = self.peek()?;
        self.pos += 1;
        Some(b)
    }

    fn skip_whitespace(&mut self) {
        while matches!(self.peek(), Some(b' ' | b'\t' | b'\r' | b'\n')) {
            self.pos += 1;
        }
    }

    fn span_from(&self, start: usize) -> Span {
        Span::new(Pos::new(start as u32), Pos::new(self.pos as u32))
    }

    /// Tokenize until end of input, or until a `%)` splice terminator
    /// when `in_splice` is set (the terminator is consumed).
    fn run(&mut self, in_splice: bool) -> Result<Vec<Token>> {
        let mut tokens = Vec::new();
        loop {
            self.skip_whitespace();
            let start = self.pos;
            let Some(b) = self.peek() else {
                if in_splice {
                    return Err(self.error("%) closing the splice"));
                }
                return Ok(tokens);
            };

            let tok = match b {
                b'%' if in_splice && self.peek_at(1) == Some(b')') => {
                    self.pos += 2;
                    return Ok(tokens);
                }
                b'(' => {
                    self.pos += 1;
                    Tok::LParen
                }
                b')' => {
                    self.pos += 1;
                    Tok::RParen
                }
                b'[' => {
                    self.pos += 1;
                    Tok::LBracket
                }
                b']' => {
                    self.pos += 1;
                    Tok::RBracket
                }
                b',' => {
                    self.pos += 1;
                    Tok::Comma
                }
                b'/' => {
                    self.pos += 1;
                    Tok::Slash
                }
                b'*' => {
                    self.pos += 1;
                    Tok::Star
                }
                b'+' => {
                    self.pos += 1;
                    Tok::Plus
                }
                b'-' => {
                    self.pos += 1;
                    Tok::Minus
                }
                b'?' | b'!' => self.lex_sigil()?,
                b'@' => {
                    self.pos += 1;
                    Tok::At(self.lex_attr_name()?)
                }
                b'"' => {
                    self.pos += 1;
                    Tok::Str(self.lex_string(false)?)
                }
                b'0'..=b'9' => Tok::Const(self.lex_number()?),
                _ if is_ident_start(b) => self.lex_ident()?,
                _ => return Err(self.error("a query token")),
            };
            tokens.push(Token::new(tok, self.span_from(start)));
        }
    }

    /// `?`/`!` is a predicate sigil when glued to a word, `@` or `(`;
    /// a bare `?` is the optional-closure postfix.
    fn lex_sigil(&mut self) -> Result<Tok> {
        let sigil = self.bump().unwrap();
        let negate = sigil == b'!';
        match self.peek() {
            Some(b'(') => Ok(Tok::PredSub { negate }),
            Some(b'@') => {
                self.pos += 1;
                Ok(Tok::Pred {
                    negate,
                    kind: PredKind::At(self.lex_attr_name()?),
                })
            }
            Some(b) if is_ident_start(b) => {
                let ident = self.lex_ident_text();
                if let Some(kind) = PredKind::from_ident(&ident) {
                    return Ok(Tok::Pred { negate, kind });
                }
                let tag_name = format!("DW_TAG_{ident}");
                match TAG_DOM.code_by_name(&tag_name) {
                    Some(code) => Ok(Tok::Pred {
                        negate,
                        kind: PredKind::Tag(Constant::new(BigInt::from(code), &TAG_DOM)),
                    }),
                    None => Err(self.error(format!("a predicate name, got {ident:?}"))),
                }
            }
            _ if negate => Err(self.error("a predicate after !")),
            _ => Ok(Tok::Quest),
        }
    }

    fn lex_ident_text(&mut self) -> String {
        let start = self.pos;
        while matches!(self.peek(), Some(b) if is_ident_char(b)) {
            self.pos += 1;
        }
        String::from_utf8_lossy(&self.bytes[start..self.pos]).into_owned()
    }

    fn lex_attr_name(&mut self) -> Result<Constant> {
        if !matches!(self.peek(), Some(b) if is_ident_start(b)) {
            return Err(self.error("an attribute name after @"));
        }
        let ident = self.lex_ident_text();
        let at_name = format!("DW_AT_{ident}");
        match AT_DOM.code_by_name(&at_name) {
            Some(code) => Ok(Constant::new(BigInt::from(code), &AT_DOM)),
            None => Err(self.error(format!("a known attribute, got @{ident}"))),
        }
    }

    fn lex_ident(&mut self) -> Result<Tok> {
        let ident = self.lex_ident_text();

        // r"…" is the raw string form.
        if ident == "r" && self.peek() == Some(b'"') {
            self.pos += 1;
            return Ok(Tok::Str(self.lex_string(true)?));
        }

        if ident.starts_with("DW_") {
            return match known_constant(&ident) {
                Some(cst) => Ok(Tok::Const(cst)),
                None => Err(self.error(format!("a known DWARF constant, got {ident}"))),
            };
        }

        match Word::from_ident(&ident) {
            Some(word) => Ok(Tok::Word(word)),
            None => Err(self.error(format!("a known word, got {ident:?}"))),
        }
    }

    fn lex_number(&mut self) -> Result<Constant> {
        let start = self.pos;
        let (value, dom): (Option<BigInt>, &'static dyn Domain) = if self.peek() == Some(b'0')
            && matches!(self.peek_at(1), Some(b'x' | b'X'))
        {
            self.pos += 2;
            let digits = self.take_digits(|b| b.is_ascii_hexdigit());
            if digits.is_empty() {
                return Err(self.error("hexadecimal digits after 0x"));
            }
            (BigInt::parse_bytes(digits, 16), &HEX_DOM)
        } else if self.peek() == Some(b'0')
            && matches!(self.peek_at(1), Some(b) if b.is_ascii_digit())
        {
            self.pos += 1;
            let digits = self.take_digits(|b| (b'0'..=b'7').contains(&b));
            if digits.is_empty() {
                return Err(self.error("octal digits after 0"));
            }
            (BigInt::parse_bytes(digits, 8), &OCT_DOM)
        } else {
            let digits = self.take_digits(|b| b.is_ascii_digit());
            (BigInt::parse_bytes(digits, 10), &DEC_DOM)
        };

        if matches!(self.peek(), Some(b) if is_ident_char(b)) {
            return Err(self.error("a well-formed number"));
        }

        match value {
            Some(v) => Ok(Constant::new(v, dom)),
            None => {
                self.pos = start;
                Err(self.error("a well-formed number"))
            }
        }
    }

    fn take_digits(&mut self, good: impl Fn(u8) -> bool) -> &'a [u8] {
        let start = self.pos;
        while matches!(self.peek(), Some(b) if good(b)) {
            self.pos += 1;
        }
        &self.bytes[start..self.pos]
    }

    /// Scan a string body (opening quote already consumed) into literal
    /// and splice segments. Escapes are processed unless `raw`.
    fn lex_string(&mut self, raw: bool) -> Result<Vec<StrSeg>> {
        let mut segments = Vec::new();
        let mut cur: Vec<u8> = Vec::new();
        loop {
            match self.bump() {
                None => return Err(self.error("a closing quote")),
                Some(b'"') => {
                    segments.push(StrSeg::Lit(
                        String::from_utf8_lossy(&cur).into_owned(),
                    ));
                    return Ok(segments);
                }
                Some(b'\\') => {
                    let Some(c) = self.bump() else {
                        return Err(self.error("an escaped character"));
                    };
                    if raw {
                        cur.push(b'\\');
                        cur.push(c);
                    } else {
                        cur.push(unescape(c));
                    }
                }
                Some(b'%') => match self.peek() {
                    Some(b'(') => {
                        self.pos += 1;
                        segments.push(StrSeg::Lit(
                            String::from_utf8_lossy(&cur).into_owned(),
                        ));
                        cur = Vec::new();
                        segments.push(StrSeg::Splice(self.run(true)?));
                    }
                    Some(b's') => {
                        self.pos += 1;
                        segments.push(StrSeg::Lit(
                            String::from_utf8_lossy(&cur).into_owned(),
                        ));
                        cur = Vec::new();
                        segments.push(StrSeg::Splice(Vec::new()));
                    }
                    _ => cur.push(b'%'),
                },
                Some(b) => cur.push(b),
            }
        }
    }
}

fn unescape(c: u8) -> u8 {
    match c {
        b'a' => 0x07,
        b'b' => 0x08,
        b'f' => 0x0c,
        b'n' => b'\n',
        b'r' => b'\r',
        b't' => b'\t',
        b'v' => 0x0b,
        b'0' => 0,
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dwq_core::Brevity;

    fn toks(input: &str) -> Vec<Tok> {
        lex(input).unwrap().into_iter().map(|t| t.tok).collect()
    }

    #[test]
    fn words_and_punctuation() {
        assert_eq!(
            toks("dup swap (child)*"),
            vec![
                Tok::Word(Word::Dup),
                Tok::Word(Word::Swap),
                Tok::LParen,
                Tok::Word(Word::Child),
                Tok::RParen,
                Tok::Star,
            ]
        );
    }

    #[test]
    fn numbers_remember_their_base() {
        let ts = toks("17 0x17 017");
        let shown: Vec<String> = ts
            .iter()
            .map(|t| match t {
                Tok::Const(c) => c.show(Brevity::Full),
                _ => panic!("expected constant"),
            })
            .collect();
        assert_eq!(shown, ["17", "0x17", "017"]);
    }

    #[test]
    fn dwarf_constants() {
        match &toks("DW_TAG_compile_unit")[0] {
            Tok::Const(c) => assert_eq!(c.show(Brevity::Full), "DW_TAG_compile_unit"),
            other => panic!("unexpected {other:?}"),
        }
        assert!(lex("DW_TAG_bogus").is_err());
    }

    #[test]
    fn sigils_versus_postfix() {
        assert_eq!(
            toks("child? ?eq"),
            vec![
                Tok::Word(Word::Child),
                Tok::Quest,
                Tok::Pred {
                    negate: false,
                    kind: PredKind::Eq
                },
            ]
        );
    }

    #[test]
    fn tag_predicate() {
        match &toks("?compile_unit")[0] {
            Tok::Pred {
                negate: false,
                kind: PredKind::Tag(c),
            } => assert_eq!(c.show(Brevity::Full), "DW_TAG_compile_unit"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn escapes_and_raw_strings() {
        match &toks("\"r\\aw\"")[0] {
            Tok::Str(segs) => assert_eq!(segs, &[StrSeg::Lit("r\u{7}w".into())]),
            other => panic!("unexpected {other:?}"),
        }
        match &toks("r\"r\\aw\"")[0] {
            Tok::Str(segs) => assert_eq!(segs, &[StrSeg::Lit("r\\aw".into())]),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn string_splices() {
        match &toks("\"abc%sdef\"")[0] {
            Tok::Str(segs) => {
                assert_eq!(segs.len(), 3);
                assert_eq!(segs[0], StrSeg::Lit("abc".into()));
                assert_eq!(segs[1], StrSeg::Splice(Vec::new()));
                assert_eq!(segs[2], StrSeg::Lit("def".into()));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn unterminated_string() {
        assert!(lex("\"abc").is_err());
        assert!(lex("\"abc%( def").is_err());
    }
}
