//! The syntactic tree of a query.
//!
//! Internal nodes are tagged by kind; after stack-effect analysis each
//! node additionally carries its slot binding. The `Display` impl is the
//! fully parenthesized dump used by the test suite:
//! `(KIND<payload> [a=…;dst=…;] child…)`.

use std::fmt;

use dwq_core::{Brevity, Constant};

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum TreeKind {
    Cat,
    Alt,
    Capture,
    EmptyList,
    Transform,
    Protect,
    Nop,
    Assert,
    CloseStar,
    ClosePlus,
    Maybe,
    Const,
    Str,
    Format,
    FAdd,
    FSub,
    FMul,
    FDiv,
    FMod,
    FParent,
    FChild,
    FAttribute,
    FPrev,
    FNext,
    FType,
    FOffset,
    FName,
    FTag,
    FForm,
    FValue,
    FPos,
    FCount,
    FEach,
    FAttrNamed,
    SelUniverse,
    SelSection,
    SelUnit,
    SelWinfo,
    ShfSwap,
    ShfDup,
    ShfOver,
    ShfRot,
    ShfDrop,
    PredAt,
    PredTag,
    PredEq,
    PredNe,
    PredLt,
    PredGt,
    PredLe,
    PredGe,
    PredFind,
    PredMatch,
    PredEmpty,
    PredRoot,
    PredNot,
    PredAnd,
    PredOr,
    PredSubxAny,
}

impl TreeKind {
    pub fn dump_name(self) -> &'static str {
        match self {
            TreeKind::Cat => "CAT",
            TreeKind::Alt => "ALT",
            TreeKind::Capture => "CAPTURE",
            TreeKind::EmptyList => "EMPTY_LIST",
            TreeKind::Transform => "TRANSFORM",
            TreeKind::Protect => "PROTECT",
            TreeKind::Nop => "NOP",
            TreeKind::Assert => "ASSERT",
            TreeKind::CloseStar => "CLOSE_STAR",
            TreeKind::ClosePlus => "CLOSE_PLUS",
            TreeKind::Maybe => "MAYBE",
            TreeKind::Const => "CONST",
            TreeKind::Str => "STR",
            TreeKind::Format => "FORMAT",
            TreeKind::FAdd => "F_ADD",
            TreeKind::FSub => "F_SUB",
            TreeKind::FMul => "F_MUL",
            TreeKind::FDiv => "F_DIV",
            TreeKind::FMod => "F_MOD",
            TreeKind::FParent => "F_PARENT",
            TreeKind::FChild => "F_CHILD",
            TreeKind::FAttribute => "F_ATTRIBUTE",
            TreeKind::FPrev => "F_PREV",
            TreeKind::FNext => "F_NEXT",
            TreeKind::FType => "F_TYPE",
            TreeKind::FOffset => "F_OFFSET",
            TreeKind::FName => "F_NAME",
            TreeKind::FTag => "F_TAG",
            TreeKind::FForm => "F_FORM",
            TreeKind::FValue => "F_VALUE",
            TreeKind::FPos => "F_POS",
            TreeKind::FCount => "F_COUNT",
            TreeKind::FEach => "F_EACH",
            TreeKind::FAttrNamed => "F_ATTR_NAMED",
            TreeKind::SelUniverse => "SEL_UNIVERSE",
            TreeKind::SelSection => "SEL_SECTION",
            TreeKind::SelUnit => "SEL_UNIT",
            TreeKind::SelWinfo => "SEL_WINFO",
            TreeKind::ShfSwap => "SHF_SWAP",
            TreeKind::ShfDup => "SHF_DUP",
            TreeKind::ShfOver => "SHF_OVER",
            TreeKind::ShfRot => "SHF_ROT",
            TreeKind::ShfDrop => "SHF_DROP",
            TreeKind::PredAt => "PRED_AT",
            TreeKind::PredTag => "PRED_TAG",
            TreeKind::PredEq => "PRED_EQ",
            TreeKind::PredNe => "PRED_NE",
            TreeKind::PredLt => "PRED_LT",
            TreeKind::PredGt => "PRED_GT",
            TreeKind::PredLe => "PRED_LE",
            TreeKind::PredGe => "PRED_GE",
            TreeKind::PredFind => "PRED_FIND",
            TreeKind::PredMatch => "PRED_MATCH",
            TreeKind::PredEmpty => "PRED_EMPTY",
            TreeKind::PredRoot => "PRED_ROOT",
            TreeKind::PredNot => "PRED_NOT",
            TreeKind::PredAnd => "PRED_AND",
            TreeKind::PredOr => "PRED_OR",
            TreeKind::PredSubxAny => "PRED_SUBX_ANY",
        }
    }
}

/// Slot indices assigned by stack-effect analysis. Unassigned before the
/// analysis runs.
#[derive(Clone, Default, PartialEq, Eq, Debug)]
pub struct Slots {
    pub a: Option<usize>,
    pub b: Option<usize>,
    pub dst: Option<usize>,
}

impl Slots {
    pub fn is_empty(&self) -> bool {
        self.a.is_none() && self.b.is_none() && self.dst.is_none()
    }
}

#[derive(Clone, Debug)]
pub struct Tree {
    pub kind: TreeKind,
    pub children: Vec<Tree>,
    /// Payload of CONST, F_ATTR_NAMED, PRED_AT and PRED_TAG nodes.
    pub cst: Option<Constant>,
    /// Payload of STR nodes, escapes already processed.
    pub text: Option<String>,
    pub slots: Slots,
    /// Slot-bound body copies of a TRANSFORM node, one per transformed
    /// slot, filled in by the analysis.
    pub expansion: Vec<Tree>,
}

impl Tree {
    pub fn leaf(kind: TreeKind) -> Tree {
        Tree {
            kind,
            children: Vec::new(),
            cst: None,
            text: None,
            slots: Slots::default(),
            expansion: Vec::new(),
        }
    }

    pub fn internal(kind: TreeKind, children: Vec<Tree>) -> Tree {
        Tree {
            children,
            ..Tree::leaf(kind)
        }
    }

    pub fn with_cst(kind: TreeKind, cst: Constant) -> Tree {
        Tree {
            cst: Some(cst),
            ..Tree::leaf(kind)
        }
    }

    pub fn with_cst_children(kind: TreeKind, cst: Constant, children: Vec<Tree>) -> Tree {
        Tree {
            cst: Some(cst),
            children,
            ..Tree::leaf(kind)
        }
    }

    pub fn str(text: String) -> Tree {
        Tree {
            text: Some(text),
            ..Tree::leaf(TreeKind::Str)
        }
    }

    pub fn nop() -> Tree {
        Tree::leaf(TreeKind::Nop)
    }

    pub fn take_children(&mut self) -> Vec<Tree> {
        std::mem::take(&mut self.children)
    }
}

impl fmt::Display for Tree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}", self.kind.dump_name())?;
        if let Some(cst) = &self.cst {
            write!(f, "<{}>", cst.show(Brevity::Full))?;
        }
        if let Some(text) = &self.text {
            write!(f, "<{text}>")?;
        }
        if !self.slots.is_empty() {
            write!(f, " [")?;
            if let Some(a) = self.slots.a {
                write!(f, "a={a};")?;
            }
            if let Some(b) = self.slots.b {
                write!(f, "b={b};")?;
            }
            if let Some(dst) = self.slots.dst {
                write!(f, "dst={dst};")?;
            }
            write!(f, "]")?;
        }
        for child in &self.children {
            write!(f, " {child}")?;
        }
        write!(f, ")")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dwq_core::Constant;

    #[test]
    fn dump_leaf_and_payload() {
        assert_eq!(Tree::leaf(TreeKind::ShfDup).to_string(), "(SHF_DUP)");
        assert_eq!(
            Tree::with_cst(TreeKind::Const, Constant::dec(17)).to_string(),
            "(CONST<17>)"
        );
    }

    #[test]
    fn dump_children_and_slots() {
        let mut dup = Tree::leaf(TreeKind::ShfDup);
        dup.slots.a = Some(0);
        dup.slots.dst = Some(1);
        let cat = Tree::internal(TreeKind::Cat, vec![dup, Tree::leaf(TreeKind::FChild)]);
        assert_eq!(cat.to_string(), "(CAT (SHF_DUP [a=0;dst=1;]) (F_CHILD))");
    }
}
