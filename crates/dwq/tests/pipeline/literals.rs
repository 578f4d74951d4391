//! Execution of literal and format pipelines.

use super::rows;

#[test]
fn constants_render_in_their_base() {
    assert_eq!(rows("1 2 3"), ["1\t2\t3"]);
    assert_eq!(rows("0x17 017 17"), ["0x17\t017\t17"]);
    assert_eq!(rows("DW_TAG_compile_unit"), ["DW_TAG_compile_unit"]);
}

#[test]
fn arithmetic_is_arbitrary_precision() {
    // 2^64 does not fit a machine word; 18446744073709551616 * 4.
    assert_eq!(
        rows("18446744073709551616 4 mul"),
        ["73786976294838206464"]
    );
    assert_eq!(rows("7 3 div"), ["2"]);
    assert_eq!(rows("7 3 mod"), ["1"]);
}

#[test]
fn arithmetic_keeps_plain_left_domains() {
    assert_eq!(rows("0x10 1 add"), ["0x11"]);
    assert_eq!(rows("10 1 add"), ["11"]);
}

#[test]
fn string_literal_pushes() {
    assert_eq!(rows("\"foo\""), ["foo"]);
    assert_eq!(rows("\"a\\tb\""), ["a\tb".to_string()]);
}

#[test]
fn format_consumes_the_top() {
    assert_eq!(rows("1 2 \"got %s\""), ["1\tgot 2"]);
}

#[test]
fn splices_render_every_output() {
    assert_eq!(rows("1 2 \"%( swap %)+%s\""), ["1\t1+2"]);
    assert_eq!(rows("1 2 \"%((swap,)%)\""), ["1\t12"]);
}

#[test]
fn escapes_versus_raw() {
    assert_eq!(rows("\"r\\aw\""), ["r\u{7}w".to_string()]);
    assert_eq!(rows("r\"r\\aw\""), ["r\\aw".to_string()]);
}

#[test]
fn type_tags() {
    assert_eq!(rows("17 type"), ["T_CONST"]);
    assert_eq!(rows("\"x\" type"), ["T_STR"]);
    assert_eq!(rows("[] type"), ["T_SEQ"]);
}
