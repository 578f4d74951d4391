//! Execution of stack shuffles and the protect operator.

use super::rows;

#[test]
fn dup() {
    assert_eq!(rows("5 dup add"), ["10"]);
}

#[test]
fn swap() {
    assert_eq!(rows("3 4 swap sub"), ["1"]);
}

#[test]
fn over() {
    assert_eq!(rows("5 6 over add add"), ["16"]);
}

#[test]
fn rot() {
    assert_eq!(rows("1 2 3 rot"), ["2\t3\t1"]);
}

#[test]
fn drop() {
    assert_eq!(rows("1 2 3 drop"), ["1\t2"]);
}

#[test]
fn protect_restores_the_protected_slot() {
    assert_eq!(rows("5 -(drop 7)"), ["5"]);
    assert_eq!(rows("5 -type"), ["5"]);
}

#[test]
fn transform_rebinds_the_top_window() {
    // The string literal lands on the dup'd slot, leaving two values
    // for the transform window.
    assert_eq!(rows("1 dup \"x\" 2/type"), ["T_CONST\tT_STR"]);
}
