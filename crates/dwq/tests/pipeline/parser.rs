//! Tree-dump tests for the parser, one scenario table per surface form.

use super::parsed;

#[test]
fn known_constants_parse_in_their_domains() {
    for name in [
        "DW_TAG_compile_unit",
        "DW_TAG_subprogram",
        "DW_AT_name",
        "DW_AT_location",
        "DW_FORM_strp",
        "DW_FORM_data1",
        "DW_LANG_C99",
        "DW_INL_inlined",
        "DW_ATE_signed",
        "DW_ACCESS_public",
        "DW_VIS_local",
        "DW_VIRTUALITY_virtual",
        "DW_ID_case_sensitive",
        "DW_CC_normal",
        "DW_ORD_row_major",
        "DW_DSC_label",
        "DW_DS_unsigned",
        "DW_OP_plus",
        "DW_END_big",
        "DW_ADDR_none",
    ] {
        assert_eq!(parsed(name), format!("(CONST<{name}>)"));
    }
}

#[test]
fn integer_literals_remember_their_base() {
    assert_eq!(parsed("17"), "(CONST<17>)");
    assert_eq!(parsed("0x17"), "(CONST<0x17>)");
    assert_eq!(parsed("017"), "(CONST<017>)");
}

#[test]
fn string_literals() {
    assert_eq!(parsed("\"string\""), "(FORMAT (STR<string>))");
    assert_eq!(parsed("\"r\\aw\""), "(FORMAT (STR<r\u{7}w>))");
    assert_eq!(parsed("r\"r\\aw\""), "(FORMAT (STR<r\\aw>))");
}

#[test]
fn words() {
    assert_eq!(parsed("swap"), "(SHF_SWAP)");
    assert_eq!(parsed("dup"), "(SHF_DUP)");
    assert_eq!(parsed("over"), "(SHF_OVER)");
    assert_eq!(parsed("rot"), "(SHF_ROT)");
    assert_eq!(parsed("drop"), "(SHF_DROP)");
    assert_eq!(
        parsed("if"),
        "(CAT (ASSERT (PRED_NOT (PRED_EMPTY))) (SHF_DROP))"
    );
    assert_eq!(parsed("else"), "(CAT (ASSERT (PRED_EMPTY)) (SHF_DROP))");

    assert_eq!(parsed("add"), "(F_ADD)");
    assert_eq!(parsed("sub"), "(F_SUB)");
    assert_eq!(parsed("mul"), "(F_MUL)");
    assert_eq!(parsed("div"), "(F_DIV)");
    assert_eq!(parsed("mod"), "(F_MOD)");
    assert_eq!(parsed("parent"), "(F_PARENT)");
    assert_eq!(parsed("child"), "(F_CHILD)");
    assert_eq!(parsed("attribute"), "(F_ATTRIBUTE)");
    assert_eq!(parsed("prev"), "(F_PREV)");
    assert_eq!(parsed("next"), "(F_NEXT)");
    assert_eq!(parsed("type"), "(F_TYPE)");
    assert_eq!(parsed("offset"), "(F_OFFSET)");
    assert_eq!(parsed("name"), "(F_NAME)");
    assert_eq!(parsed("tag"), "(F_TAG)");
    assert_eq!(parsed("form"), "(F_FORM)");
    assert_eq!(parsed("value"), "(F_VALUE)");
    assert_eq!(parsed("pos"), "(F_POS)");
    assert_eq!(parsed("count"), "(F_COUNT)");
    assert_eq!(parsed("each"), "(F_EACH)");
    assert_eq!(parsed("universe"), "(SEL_UNIVERSE)");
    assert_eq!(parsed("section"), "(SEL_SECTION)");
    assert_eq!(parsed("unit"), "(SEL_UNIT)");
    assert_eq!(parsed("winfo"), "(SEL_WINFO)");
}

#[test]
fn comparison_assertions() {
    assert_eq!(parsed("?eq"), "(ASSERT (PRED_EQ))");
    assert_eq!(parsed("!eq"), "(ASSERT (PRED_NOT (PRED_EQ)))");
    assert_eq!(parsed("?ne"), "(ASSERT (PRED_NE))");
    assert_eq!(parsed("!ne"), "(ASSERT (PRED_NOT (PRED_NE)))");
    assert_eq!(parsed("?lt"), "(ASSERT (PRED_LT))");
    assert_eq!(parsed("!lt"), "(ASSERT (PRED_NOT (PRED_LT)))");
    assert_eq!(parsed("?gt"), "(ASSERT (PRED_GT))");
    assert_eq!(parsed("!gt"), "(ASSERT (PRED_NOT (PRED_GT)))");
    assert_eq!(parsed("?le"), "(ASSERT (PRED_LE))");
    assert_eq!(parsed("!le"), "(ASSERT (PRED_NOT (PRED_LE)))");
    assert_eq!(parsed("?ge"), "(ASSERT (PRED_GE))");
    assert_eq!(parsed("!ge"), "(ASSERT (PRED_NOT (PRED_GE)))");
}

#[test]
fn string_and_shape_assertions() {
    assert_eq!(parsed("?match"), "(ASSERT (PRED_MATCH))");
    assert_eq!(parsed("!match"), "(ASSERT (PRED_NOT (PRED_MATCH)))");
    assert_eq!(parsed("?find"), "(ASSERT (PRED_FIND))");
    assert_eq!(parsed("!find"), "(ASSERT (PRED_NOT (PRED_FIND)))");
    assert_eq!(parsed("?root"), "(ASSERT (PRED_ROOT))");
    assert_eq!(parsed("!root"), "(ASSERT (PRED_NOT (PRED_ROOT)))");
    assert_eq!(parsed("?empty"), "(ASSERT (PRED_EMPTY))");
    assert_eq!(parsed("!empty"), "(ASSERT (PRED_NOT (PRED_EMPTY)))");
}

#[test]
fn tag_assertions() {
    assert_eq!(
        parsed("?compile_unit"),
        "(ASSERT (PRED_TAG<DW_TAG_compile_unit>))"
    );
    assert_eq!(
        parsed("!compile_unit"),
        "(ASSERT (PRED_NOT (PRED_TAG<DW_TAG_compile_unit>)))"
    );
    assert_eq!(
        parsed("?subprogram"),
        "(ASSERT (PRED_TAG<DW_TAG_subprogram>))"
    );
}

#[test]
fn attribute_shorthand() {
    assert_eq!(
        parsed("@name"),
        "(CAT (F_ATTR_NAMED<DW_AT_name>) (F_VALUE))"
    );
    assert_eq!(
        parsed("-@name"),
        "(PROTECT (CAT (F_ATTR_NAMED<DW_AT_name>) (F_VALUE)))"
    );
    assert_eq!(parsed("?@name"), "(ASSERT (PRED_AT<DW_AT_name>))");
    assert_eq!(
        parsed("!@name"),
        "(ASSERT (PRED_NOT (PRED_AT<DW_AT_name>)))"
    );
}

#[test]
fn sub_expression_assertions() {
    assert_eq!(
        parsed("?(child next)"),
        "(ASSERT (PRED_SUBX_ANY (CAT (F_CHILD) (F_NEXT))))"
    );
    assert_eq!(
        parsed("!(child)"),
        "(ASSERT (PRED_NOT (PRED_SUBX_ANY (F_CHILD))))"
    );
}

#[test]
fn protect_forms() {
    assert_eq!(parsed("-add"), "(PROTECT (F_ADD))");
    assert_eq!(parsed("-child"), "(PROTECT (F_CHILD))");
    assert_eq!(parsed("-offset"), "(PROTECT (F_OFFSET))");
    assert_eq!(parsed("-universe"), "(PROTECT (SEL_UNIVERSE))");
    assert_eq!(parsed("-\"foo\""), "(PROTECT (FORMAT (STR<foo>)))");
}

#[test]
fn closures() {
    assert_eq!(parsed("child*"), "(CLOSE_STAR (F_CHILD))");
    assert_eq!(parsed("child+"), "(CLOSE_PLUS (F_CHILD))");
    assert_eq!(parsed("child?"), "(MAYBE (F_CHILD))");
    assert_eq!(parsed("swap*"), "(CLOSE_STAR (SHF_SWAP))");
    assert_eq!(parsed("swap+"), "(CLOSE_PLUS (SHF_SWAP))");
    assert_eq!(parsed("swap?"), "(MAYBE (SHF_SWAP))");
}

#[test]
fn concatenation_and_closures() {
    assert_eq!(parsed("child next"), "(CAT (F_CHILD) (F_NEXT))");
    assert_eq!(
        parsed("child next*"),
        "(CAT (F_CHILD) (CLOSE_STAR (F_NEXT)))"
    );
    assert_eq!(
        parsed("child* next"),
        "(CAT (CLOSE_STAR (F_CHILD)) (F_NEXT))"
    );
    assert_eq!(
        parsed("child+ next"),
        "(CAT (CLOSE_PLUS (F_CHILD)) (F_NEXT))"
    );
    assert_eq!(
        parsed("child -next"),
        "(CAT (F_CHILD) (PROTECT (F_NEXT)))"
    );
    assert_eq!(
        parsed("child+ -next"),
        "(CAT (CLOSE_PLUS (F_CHILD)) (PROTECT (F_NEXT)))"
    );
    assert_eq!(
        parsed("dup swap child"),
        "(CAT (SHF_DUP) (SHF_SWAP) (F_CHILD))"
    );
    assert_eq!(
        parsed("dup swap child next"),
        "(CAT (SHF_DUP) (SHF_SWAP) (F_CHILD) (F_NEXT))"
    );
}

#[test]
fn transform() {
    assert_eq!(parsed("2/child"), "(TRANSFORM (CONST<2>) (F_CHILD))");
    assert_eq!(
        parsed("2/child next"),
        "(CAT (TRANSFORM (CONST<2>) (F_CHILD)) (F_NEXT))"
    );
    assert_eq!(
        parsed("2/(child next)"),
        "(TRANSFORM (CONST<2>) (CAT (F_CHILD) (F_NEXT)))"
    );
    assert_eq!(
        parsed("2/child 2/next"),
        "(CAT (TRANSFORM (CONST<2>) (F_CHILD)) (TRANSFORM (CONST<2>) (F_NEXT)))"
    );
}

#[test]
fn parentheses_group_transparently() {
    assert_eq!(parsed("(child next)"), "(CAT (F_CHILD) (F_NEXT))");
    assert_eq!(parsed("((child next))"), "(CAT (F_CHILD) (F_NEXT))");
    assert_eq!(parsed("(child (next))"), "(CAT (F_CHILD) (F_NEXT))");
    assert_eq!(
        parsed("(dup) swap child next"),
        "(CAT (SHF_DUP) (SHF_SWAP) (F_CHILD) (F_NEXT))"
    );
    assert_eq!(
        parsed("dup (swap) child next"),
        "(CAT (SHF_DUP) (SHF_SWAP) (F_CHILD) (F_NEXT))"
    );
    assert_eq!(
        parsed("dup swap child (next)"),
        "(CAT (SHF_DUP) (SHF_SWAP) (F_CHILD) (F_NEXT))"
    );
    assert_eq!(
        parsed("dup (swap (child (next)))"),
        "(CAT (SHF_DUP) (SHF_SWAP) (F_CHILD) (F_NEXT))"
    );
    assert_eq!(
        parsed("((((dup) swap) child) next)"),
        "(CAT (SHF_DUP) (SHF_SWAP) (F_CHILD) (F_NEXT))"
    );
    assert_eq!(
        parsed("((((dup) swap)) (child next))"),
        "(CAT (SHF_DUP) (SHF_SWAP) (F_CHILD) (F_NEXT))"
    );
}

#[test]
fn alternation() {
    assert_eq!(parsed("dup, over"), "(ALT (SHF_DUP) (SHF_OVER))");
    assert_eq!(
        parsed("dup, over, -child"),
        "(ALT (SHF_DUP) (SHF_OVER) (PROTECT (F_CHILD)))"
    );
    assert_eq!(parsed("swap,"), "(ALT (SHF_SWAP) (NOP))");
    assert_eq!(
        parsed("swap dup, over"),
        "(ALT (CAT (SHF_SWAP) (SHF_DUP)) (SHF_OVER))"
    );
    assert_eq!(
        parsed("swap dup, over next, parent dup"),
        "(ALT (CAT (SHF_SWAP) (SHF_DUP)) (CAT (SHF_OVER) (F_NEXT)) \
         (CAT (F_PARENT) (SHF_DUP)))"
    );
    assert_eq!(
        parsed("(swap dup, (over next, (parent dup)))"),
        "(ALT (CAT (SHF_SWAP) (SHF_DUP)) (CAT (SHF_OVER) (F_NEXT)) \
         (CAT (F_PARENT) (SHF_DUP)))"
    );
    assert_eq!(
        parsed("2/next, 2/prev"),
        "(ALT (TRANSFORM (CONST<2>) (F_NEXT)) (TRANSFORM (CONST<2>) (F_PREV)))"
    );
    assert_eq!(
        parsed("next, prev*"),
        "(ALT (F_NEXT) (CLOSE_STAR (F_PREV)))"
    );
    assert_eq!(
        parsed("((1, 2), (3, 4))"),
        "(ALT (CONST<1>) (CONST<2>) (CONST<3>) (CONST<4>))"
    );
}

#[test]
fn captures() {
    assert_eq!(parsed("[]"), "(EMPTY_LIST)");
    assert_eq!(parsed("[()]"), "(CAPTURE (NOP))");
    assert_eq!(parsed("[child]"), "(CAPTURE (F_CHILD))");
    assert_eq!(parsed("[,]"), "(CAPTURE (ALT (NOP) (NOP)))");
    assert_eq!(parsed("[,,]"), "(CAPTURE (ALT (NOP) (NOP) (NOP)))");
    assert_eq!(
        parsed("[1,,2,]"),
        "(CAPTURE (ALT (CONST<1>) (NOP) (CONST<2>) (NOP)))"
    );
}

#[test]
fn format_splicing() {
    assert_eq!(
        parsed("\"a%( \")%( [@name] %)(\" %)b\""),
        "(FORMAT (STR<a>) (FORMAT (STR<)>) \
         (CAPTURE (CAT (F_ATTR_NAMED<DW_AT_name>) (F_VALUE))) \
         (STR<(>)) (STR<b>))"
    );
    assert_eq!(
        parsed("\"abc%sdef\""),
        "(FORMAT (STR<abc>) (NOP) (STR<def>))"
    );
    assert_eq!(parsed("-\"foo\""), "(PROTECT (FORMAT (STR<foo>)))");
}

#[test]
fn parse_errors() {
    for bad in [
        "1 (",
        "[1",
        "\"unterminated",
        "\"open splice %( dup",
        "frobnicate",
        "DW_TAG_no_such_tag",
        "@no_such_attribute",
        "?no_such_predicate",
        "0x",
        "!",
    ] {
        assert!(
            matches!(dwq::parse_query(bad), Err(dwq::QueryError::Parse { .. })),
            "expected parse error for {bad:?}"
        );
    }
}
