//! Stack-effect analysis: slot binding, closure rewrites, and the
//! unbalanced/underrun diagnostics.

use super::{analysis_error, analyzed};

#[test]
fn selector_and_predicate_slots() {
    assert_eq!(
        analyzed("winfo ?root", false),
        "(CAT (SEL_WINFO [dst=0;]) (ASSERT (PRED_ROOT [a=0;])))"
    );
    assert_eq!(
        analyzed("winfo ?compile_unit !root", false),
        concat!(
            "(CAT (SEL_WINFO [dst=0;])",
            " (ASSERT (PRED_TAG<DW_TAG_compile_unit> [a=0;]))",
            " (ASSERT (PRED_NOT (PRED_ROOT [a=0;]))))"
        )
    );
}

#[test]
fn lone_comma_is_two_empty_branches() {
    assert_eq!(analyzed(",", false), "(ALT (NOP) (NOP))");
}

#[test]
fn alternation_branches_share_slots() {
    assert_eq!(
        analyzed("winfo dup (swap,)", false),
        concat!(
            "(CAT (SEL_WINFO [dst=0;]) (SHF_DUP [a=0;dst=1;])",
            " (ALT (SHF_SWAP [a=0;dst=1;]) (NOP)))"
        )
    );
    assert_eq!(
        analyzed("winfo dup (,swap)", false),
        concat!(
            "(CAT (SEL_WINFO [dst=0;]) (SHF_DUP [a=0;dst=1;])",
            " (ALT (NOP) (SHF_SWAP [a=0;dst=1;])))"
        )
    );
    assert_eq!(
        analyzed("winfo (drop,drop)", false),
        concat!(
            "(CAT (SEL_WINFO [dst=0;])",
            " (ALT (SHF_DROP [dst=0;]) (SHF_DROP [dst=0;])))"
        )
    );
    assert_eq!(
        analyzed("winfo (,drop 1)", false),
        concat!(
            "(CAT (SEL_WINFO [dst=0;])",
            " (ALT (NOP) (CAT (SHF_DROP [dst=0;]) (CONST<1> [dst=0;]))))"
        )
    );
    assert_eq!(
        analyzed("winfo (drop 1,)", false),
        concat!(
            "(CAT (SEL_WINFO [dst=0;])",
            " (ALT (CAT (SHF_DROP [dst=0;]) (CONST<1> [dst=0;])) (NOP)))"
        )
    );
}

#[test]
fn unbalanced_alternation_is_rejected() {
    let err = analysis_error("winfo (,drop)");
    assert!(err.to_string().contains("unbalanced"), "got: {err}");
}

#[test]
fn format_writes_the_top_slot() {
    assert_eq!(
        analyzed("winfo drop \"foo\"", false),
        concat!(
            "(CAT (SEL_WINFO [dst=0;])",
            " (SHF_DROP [dst=0;]) (FORMAT [dst=0;] (STR<foo>)))"
        )
    );
}

#[test]
fn format_splice_reading_an_empty_stack_is_underrun() {
    let err = analysis_error("drop \"%s\"");
    assert!(err.to_string().contains("underrun"), "got: {err}");
}

#[test]
fn format_splices_bind_render_slots() {
    assert_eq!(
        analyzed("winfo \"%( -offset %): %( @name %)\"", true),
        concat!(
            "(CAT (SEL_WINFO [dst=0;])",
            " (FORMAT [dst=0;] (STR<>)",
            " (PROTECT [a=0;dst=1;] (F_OFFSET [a=0;dst=0;])) (STR<: >)",
            " (CAT [dst=0;] (F_ATTR_NAMED<DW_AT_name> [a=0;dst=0;])",
            " (F_VALUE [a=0;dst=0;])) (STR<>)))"
        )
    );
}

#[test]
fn maybe_rewrites_to_alternation() {
    assert_eq!(
        analyzed("winfo child?", false),
        "(CAT (SEL_WINFO [dst=0;]) (ALT (F_CHILD [a=0;dst=0;]) (NOP)))"
    );
}

#[test]
fn plus_rewrites_to_body_then_star() {
    assert_eq!(
        analyzed("winfo child+", false),
        concat!(
            "(CAT (SEL_WINFO [dst=0;])",
            " (CAT (F_CHILD [a=0;dst=0;]) (CLOSE_STAR (F_CHILD [a=0;dst=0;]))))"
        )
    );
}

#[test]
fn closure_bodies_must_be_net_zero() {
    let err = analysis_error("winfo dup*");
    assert!(err.to_string().contains("unbalanced"), "got: {err}");
}

#[test]
fn protect_bodies_must_be_net_zero() {
    let err = analysis_error("winfo -dup");
    assert!(err.to_string().contains("unbalanced"), "got: {err}");
}

#[test]
fn nested_alternations_flatten_before_analysis() {
    assert_eq!(
        analyzed("((1, 2), (3, 4))", false),
        concat!(
            "(ALT (CONST<1> [dst=0;]) (CONST<2> [dst=0;])",
            " (CONST<3> [dst=0;]) (CONST<4> [dst=0;]))"
        )
    );
}

#[test]
fn plain_underruns() {
    assert!(analysis_error("drop").to_string().contains("underrun"));
    assert!(analysis_error("swap").to_string().contains("underrun"));
    assert!(analysis_error("1 ?eq").to_string().contains("underrun"));
}
