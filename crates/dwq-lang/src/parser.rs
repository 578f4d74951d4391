//! Recursive-descent parser: tokens to syntax tree.
//!
//! Alternation binds loosest; concatenation next; postfix closures bind
//! to the preceding factor. Nested CAT and ALT nodes are flattened and
//! singletons degenerate to their child, so the tree the analysis sees is
//! already in normal form.

use dwq_core::{Pos, QueryError, Result};

use crate::lexer::lex;
use crate::token::{PredKind, StrSeg, Tok, Token, Word};
use crate::tree::{Tree, TreeKind};

/// Parse a query string into its syntax tree.
pub fn parse_query(input: &str) -> Result<Tree> {
    let tokens = lex(input)?;
    parse_tokens(&tokens, Pos::new(input.len() as u32))
}

fn parse_tokens(tokens: &[Token], end: Pos) -> Result<Tree> {
    let mut parser = Parser {
        tokens,
        idx: 0,
        end,
    };
    let tree = parser.parse_expr()?;
    if parser.idx < tokens.len() {
        return Err(parser.error_here("end of query"));
    }
    Ok(tree)
}

struct Parser<'a> {
    tokens: &'a [Token],
    idx: usize,
    end: Pos,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<&'a Tok> {
        self.tokens.get(self.idx).map(|t| &t.tok)
    }

    fn bump(&mut self) -> Option<&'a Token> {
        let t = self.tokens.get(self.idx)?;
        self.idx += 1;
        Some(t)
    }

    fn here(&self) -> Pos {
        self.tokens
            .get(self.idx)
            .map(|t| t.span.start())
            .unwrap_or(self.end)
    }

    fn error_here(&self, expected: impl Into<String>) -> QueryError {
        QueryError::parse(self.here(), expected)
    }

    fn eat(&mut self, want: &Tok) -> bool {
        if self.peek() == Some(want) {
            self.idx += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, want: &Tok, what: &str) -> Result<()> {
        if self.eat(want) {
            Ok(())
        } else {
            Err(self.error_here(what))
        }
    }

    /// Alternation list. An absent branch is a NOP; a branch that is
    /// itself an ALT (from parentheses) is spliced in.
    fn parse_expr(&mut self) -> Result<Tree> {
        let mut branches = vec![self.parse_cat()?];
        let mut saw_comma = false;
        while self.eat(&Tok::Comma) {
            saw_comma = true;
            branches.push(self.parse_cat()?);
        }
        if !saw_comma {
            return Ok(branches.pop().unwrap());
        }
        let mut flat = Vec::with_capacity(branches.len());
        for branch in branches {
            if branch.kind == TreeKind::Alt {
                flat.extend(branch.children);
            } else {
                flat.push(branch);
            }
        }
        Ok(Tree::internal(TreeKind::Alt, flat))
    }

    /// Concatenation of factors; empty concatenation is a NOP.
    fn parse_cat(&mut self) -> Result<Tree> {
        let mut factors: Vec<Tree> = Vec::new();
        while self.at_factor_start() {
            let factor = self.parse_factor()?;
            if factor.kind == TreeKind::Cat {
                factors.extend(factor.children);
            } else {
                factors.push(factor);
            }
        }
        Ok(match factors.len() {
            0 => Tree::nop(),
            1 => factors.pop().unwrap(),
            _ => Tree::internal(TreeKind::Cat, factors),
        })
    }

    fn at_factor_start(&self) -> bool {
        matches!(
            self.peek(),
            Some(
                Tok::Word(_)
                    | Tok::Const(_)
                    | Tok::Str(_)
                    | Tok::At(_)
                    | Tok::Pred { .. }
                    | Tok::PredSub { .. }
                    | Tok::Minus
                    | Tok::LParen
                    | Tok::LBracket
            )
        )
    }

    fn parse_factor(&mut self) -> Result<Tree> {
        let Some(token) = self.bump() else {
            return Err(self.error_here("a factor"));
        };

        let mut base = match &token.tok {
            Tok::Minus => {
                // Protect absorbs the whole following factor, closures
                // included.
                return Ok(Tree::internal(TreeKind::Protect, vec![self.parse_factor()?]));
            }
            Tok::Word(word) => word_tree(*word),
            Tok::Const(cst) => {
                if self.eat(&Tok::Slash) {
                    let body = self.parse_factor()?;
                    Tree::internal(
                        TreeKind::Transform,
                        vec![Tree::with_cst(TreeKind::Const, cst.clone()), body],
                    )
                } else {
                    Tree::with_cst(TreeKind::Const, cst.clone())
                }
            }
            Tok::Str(segments) => self.format_tree(segments)?,
            Tok::At(cst) => Tree::internal(
                TreeKind::Cat,
                vec![
                    Tree::with_cst(TreeKind::FAttrNamed, cst.clone()),
                    Tree::leaf(TreeKind::FValue),
                ],
            ),
            Tok::Pred { negate, kind } => assert_tree(*negate, pred_tree(kind)),
            Tok::PredSub { negate } => {
                let negate = *negate;
                self.expect(&Tok::LParen, "( after the predicate sigil")?;
                let body = self.parse_expr()?;
                self.expect(&Tok::RParen, "closing parenthesis")?;
                assert_tree(
                    negate,
                    Tree::internal(TreeKind::PredSubxAny, vec![body]),
                )
            }
            Tok::LParen => {
                let body = self.parse_expr()?;
                self.expect(&Tok::RParen, "closing parenthesis")?;
                body
            }
            Tok::LBracket => {
                if self.eat(&Tok::RBracket) {
                    Tree::leaf(TreeKind::EmptyList)
                } else {
                    let body = self.parse_expr()?;
                    self.expect(&Tok::RBracket, "closing bracket")?;
                    Tree::internal(TreeKind::Capture, vec![body])
                }
            }
            _ => return Err(QueryError::parse(token.span.start(), "a factor")),
        };

        loop {
            base = match self.peek() {
                Some(Tok::Star) => {
                    self.idx += 1;
                    Tree::internal(TreeKind::CloseStar, vec![base])
                }
                Some(Tok::Plus) => {
                    self.idx += 1;
                    Tree::internal(TreeKind::ClosePlus, vec![base])
                }
                Some(Tok::Quest) => {
                    self.idx += 1;
                    Tree::internal(TreeKind::Maybe, vec![base])
                }
                _ => break,
            };
        }
        Ok(base)
    }

    /// A string literal becomes a FORMAT node whose children alternate
    /// STR segments and splice expressions.
    fn format_tree(&self, segments: &[StrSeg]) -> Result<Tree> {
        let mut children = Vec::with_capacity(segments.len());
        for segment in segments {
            children.push(match segment {
                StrSeg::Lit(text) => Tree::str(text.clone()),
                StrSeg::Splice(tokens) if tokens.is_empty() => Tree::nop(),
                StrSeg::Splice(tokens) => {
                    let end = tokens.last().map(|t| t.span.end()).unwrap_or(self.end);
                    parse_tokens(tokens, end)?
                }
            });
        }
        Ok(Tree::internal(TreeKind::Format, children))
    }
}

fn word_tree(word: Word) -> Tree {
    let kind = match word {
        Word::Swap => TreeKind::ShfSwap,
        Word::Dup => TreeKind::ShfDup,
        Word::Over => TreeKind::ShfOver,
        Word::Rot => TreeKind::ShfRot,
        Word::Drop => TreeKind::ShfDrop,
        Word::Add => TreeKind::FAdd,
        Word::Sub => TreeKind::FSub,
        Word::Mul => TreeKind::FMul,
        Word::Div => TreeKind::FDiv,
        Word::Mod => TreeKind::FMod,
        Word::Parent => TreeKind::FParent,
        Word::Child => TreeKind::FChild,
        Word::Attribute => TreeKind::FAttribute,
        Word::Prev => TreeKind::FPrev,
        Word::Next => TreeKind::FNext,
        Word::Type => TreeKind::FType,
        Word::Offset => TreeKind::FOffset,
        Word::Name => TreeKind::FName,
        Word::Tag => TreeKind::FTag,
        Word::Form => TreeKind::FForm,
        Word::Value => TreeKind::FValue,
        Word::Pos => TreeKind::FPos,
        Word::Count => TreeKind::FCount,
        Word::Each => TreeKind::FEach,
        Word::Universe => TreeKind::SelUniverse,
        Word::Section => TreeKind::SelSection,
        Word::Unit => TreeKind::SelUnit,
        Word::Winfo => TreeKind::SelWinfo,
        // `if` keeps sequences that produced something, `else` the ones
        // that did not; both consume the inspected sequence.
        Word::If => {
            return Tree::internal(
                TreeKind::Cat,
                vec![
                    assert_tree(true, Tree::leaf(TreeKind::PredEmpty)),
                    Tree::leaf(TreeKind::ShfDrop),
                ],
            );
        }
        Word::Else => {
            return Tree::internal(
                TreeKind::Cat,
                vec![
                    assert_tree(false, Tree::leaf(TreeKind::PredEmpty)),
                    Tree::leaf(TreeKind::ShfDrop),
                ],
            );
        }
    };
    Tree::leaf(kind)
}

fn pred_tree(kind: &PredKind) -> Tree {
    match kind {
        PredKind::Eq => Tree::leaf(TreeKind::PredEq),
        PredKind::Ne => Tree::leaf(TreeKind::PredNe),
        PredKind::Lt => Tree::leaf(TreeKind::PredLt),
        PredKind::Gt => Tree::leaf(TreeKind::PredGt),
        PredKind::Le => Tree::leaf(TreeKind::PredLe),
        PredKind::Ge => Tree::leaf(TreeKind::PredGe),
        PredKind::Match => Tree::leaf(TreeKind::PredMatch),
        PredKind::Find => Tree::leaf(TreeKind::PredFind),
        PredKind::Root => Tree::leaf(TreeKind::PredRoot),
        PredKind::Empty => Tree::leaf(TreeKind::PredEmpty),
        PredKind::Tag(cst) => Tree::with_cst(TreeKind::PredTag, cst.clone()),
        PredKind::At(cst) => Tree::with_cst(TreeKind::PredAt, cst.clone()),
    }
}

fn assert_tree(negate: bool, pred: Tree) -> Tree {
    let pred = if negate {
        Tree::internal(TreeKind::PredNot, vec![pred])
    } else {
        pred
    };
    Tree::internal(TreeKind::Assert, vec![pred])
}
