//! Pattern hygiene tests, from chord to search.
//!
//! Tests that targets typed next to a chord are treated the way the chord
//! says: as a regex for `proj:all` (and then checked for ReDoS), as a
//! literal everywhere else.

mod common;

use chordfind::chord;
use chordfind::protocol::Response;
use common::{error_code, matched_lines, TestEnv};
use tokio_util::sync::CancellationToken;

fn run_chord(env: &TestEnv, chord_text: &str, target: &str) -> Response {
    let request = chord::translate(chord_text, target).unwrap();
    env.dispatcher()
        .handle(&env.projects(), &request, &CancellationToken::new())
}

fn setup() -> TestEnv {
    let env = TestEnv::new();
    env.write_file(
        "root/calc.py",
        "total = price * (1 + rate)\ntotal = price - (1 + rate)\nx = a+b\n",
    );
    env
}

#[test]
fn test_language_chord_searches_literally() {
    let env = setup();
    let resp = run_chord(&env, "p:python:all", "price * (1 + rate)");
    assert_eq!(matched_lines(&env, &resp), vec![("root/calc.py".to_string(), 1)]);
}

#[test]
fn test_location_chord_searches_literally() {
    let env = setup();
    let chord_text = format!("p:loc:{}", env.root().display());
    let resp = run_chord(&env, &chord_text, "a+b");
    assert_eq!(matched_lines(&env, &resp), vec![("root/calc.py".to_string(), 3)]);
}

#[test]
fn test_project_chord_uses_regex() {
    let env = setup();
    let resp = run_chord(&env, "p:all", r"price [*-] \(");
    assert_eq!(
        matched_lines(&env, &resp),
        vec![("root/calc.py".to_string(), 1), ("root/calc.py".to_string(), 2)]
    );
}

#[test]
fn test_project_chord_rejects_redos_patterns() {
    let env = setup();
    for pattern in ["(a+)+", "(.*)*", "(.+)+", r"(\w+)+"] {
        let resp = run_chord(&env, "p:all", pattern);
        assert_eq!(error_code(&resp), "INVALID_PATTERN", "{pattern}");
    }
}

#[test]
fn test_escaped_redos_text_is_harmless() {
    let env = setup();
    // Escaped, the same text is a plain literal and simply does not match
    let resp = run_chord(&env, "p:python:all", "(a+)+");
    assert!(matches!(resp, Response::Matches { matches, .. } if matches.is_empty()));
}

#[test]
fn test_overlong_pattern_rejected() {
    let env = setup();
    let resp = run_chord(&env, "p:all", &"a".repeat(501));
    assert_eq!(error_code(&resp), "INVALID_PATTERN");
}
