// src/tests/bytescan_tests.rs

#![allow(non_snake_case)]

use crate::readers::bytescan::{
    is_closing_r_tag,
    is_space,
    next_token,
    parse_f64,
    rfind_non_space,
    scan_attributes,
    skip_space_fwd,
};

extern crate test_case;
use test_case::test_case;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[test_case(b' ', true; "space")]
#[test_case(b'\t', true; "tab")]
#[test_case(b'\n', true; "newline")]
#[test_case(b'\r', true; "carriage return")]
#[test_case(0x0B, true; "vertical tab")]
#[test_case(0x0C, true; "form feed")]
#[test_case(b'a', false; "letter")]
#[test_case(b'<', false; "angle bracket")]
#[test_case(b'0', false; "digit")]
fn test_is_space(byte: u8, expect: bool) {
    assert_eq!(is_space(byte), expect);
}

#[test_case(b"   abc", 0, 3; "leading spaces")]
#[test_case(b"abc", 0, 0; "no spaces")]
#[test_case(b"  \t\n", 0, 4; "all spaces hits end")]
#[test_case(b"a  b", 1, 3; "from mid")]
fn test_skip_space_fwd(buf: &[u8], at: usize, expect: usize) {
    assert_eq!(skip_space_fwd(buf, at, buf.len()), expect);
}

#[test]
fn test_rfind_non_space_found() {
    assert_eq!(rfind_non_space(b"ab   ", 0, 5), Some(1));
}

#[test]
fn test_rfind_non_space_all_space() {
    assert_eq!(rfind_non_space(b"  \n\t ", 0, 5), None);
}

#[test]
fn test_rfind_non_space_empty_range() {
    assert_eq!(rfind_non_space(b"abc", 1, 1), None);
}

#[test]
fn test_rfind_non_space_respects_start() {
    assert_eq!(rfind_non_space(b"a    ", 1, 5), None);
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[test]
fn test_next_token_number() {
    let buf = b"  1.25 -0.5";
    assert_eq!(next_token(buf, 0, buf.len()), Some((2, 6)));
    assert_eq!(next_token(buf, 6, buf.len()), Some((7, 11)));
}

#[test]
fn test_next_token_whitespace_only() {
    let buf = b"   \n";
    assert_eq!(next_token(buf, 0, buf.len()), None);
}

#[test]
fn test_next_token_stops_at_tag() {
    // a '<' terminates a number token
    let buf = b"0.5</r>";
    assert_eq!(next_token(buf, 0, buf.len()), Some((0, 3)));
}

#[test]
fn test_next_token_tag_runs_to_gt() {
    let buf = b" </r> ";
    assert_eq!(next_token(buf, 0, buf.len()), Some((1, 5)));
}

#[test]
fn test_next_token_unterminated_tag_runs_to_end() {
    let buf = b"</r";
    assert_eq!(next_token(buf, 0, buf.len()), Some((0, 3)));
}

#[test_case(b"1.5", 1.5; "positive")]
#[test_case(b"-0.25", -0.25; "negative")]
#[test_case(b"1e-3", 0.001; "exponent")]
#[test_case(b"0", 0.0; "zero")]
fn test_parse_f64_ok(token: &[u8], expect: f64) {
    assert_eq!(parse_f64(token).unwrap(), expect);
}

#[test_case(b"abc"; "letters")]
#[test_case(b"1.5x"; "trailing letter")]
#[test_case(b""; "empty")]
#[test_case(b"\xff\xfe"; "not utf8")]
fn test_parse_f64_err(token: &[u8]) {
    assert!(parse_f64(token).is_err());
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[test_case(b"</r>", true; "plain")]
#[test_case(b"</R>", true; "upper tag letter")]
#[test_case(b"</ r >", true; "interior whitespace")]
#[test_case(b"< / r>", true; "spaced solidus")]
#[test_case(b"</x>", false; "wrong letter")]
#[test_case(b"<r>", false; "opening tag")]
#[test_case(b"</r", false; "unterminated")]
fn test_is_closing_r_tag(token: &[u8], expect: bool) {
    let mut scratch: Vec<u8> = Vec::new();
    assert_eq!(is_closing_r_tag(token, 0, token.len(), &mut scratch), expect);
}

#[test]
fn test_scan_attributes_empty() {
    let attrs = scan_attributes(b"   ", 0, 3).unwrap();
    assert!(attrs.is_empty());
}

#[test]
fn test_scan_attributes_one() {
    let buf = br#" s="a" "#;
    let attrs = scan_attributes(buf, 0, buf.len()).unwrap();
    assert_eq!(attrs, vec![(String::from("s"), String::from("a"))]);
}

#[test]
fn test_scan_attributes_spacing_tolerant() {
    let buf = br#"  s  =  "r"  "#;
    let attrs = scan_attributes(buf, 0, buf.len()).unwrap();
    assert_eq!(attrs, vec![(String::from("s"), String::from("r"))]);
}

#[test]
fn test_scan_attributes_many_preserve_order() {
    let buf = br#"id="7" s="a""#;
    let attrs = scan_attributes(buf, 0, buf.len()).unwrap();
    assert_eq!(
        attrs,
        vec![
            (String::from("id"), String::from("7")),
            (String::from("s"), String::from("a")),
        ]
    );
}

#[test_case(br#"s"#; "name only")]
#[test_case(br#"s="#; "no value")]
#[test_case(br#"s="a"#; "no closing quote")]
#[test_case(br#"s=a""#; "no opening quote")]
#[test_case(br#"="a""#; "no name")]
fn test_scan_attributes_malformed(buf: &[u8]) {
    assert!(scan_attributes(buf, 0, buf.len()).is_err());
}
