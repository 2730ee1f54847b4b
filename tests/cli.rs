/// Black-box integration tests driven directly against the `lined` binary,
/// via `assert_cmd`, replacing the Docker-based differential harness this
/// suite used to run against a GNU ed container. The `common` module's
/// `TestCase`/`TestSuite` scaffolding and per-command suite files are kept
/// and reused here for their command/input fixtures; each test below
/// asserts the resulting file content directly rather than diffing against
/// a second binary.
mod common;

use std::fs;
use std::io::Write;

use assert_cmd::Command;
use predicates::prelude::*;

use common::TestCase;

/// Run `lined <path>` feeding `commands` on stdin, returning the
/// `assert_cmd::assert::Assert` so callers can chain `predicates`
/// assertions over stdout/stderr/exit code.
fn run_ed(path: &std::path::Path, commands: &str) -> assert_cmd::assert::Assert {
    Command::cargo_bin("lined")
        .unwrap()
        .arg(path)
        .write_stdin(commands)
        .assert()
}

fn with_fixture(input: &str) -> tempfile::NamedTempFile {
    let mut f = tempfile::NamedTempFile::new().unwrap();
    f.write_all(input.as_bytes()).unwrap();
    f.flush().unwrap();
    f
}

fn run_case(case: &TestCase) -> (String, assert_cmd::assert::Assert) {
    let file = with_fixture(&case.input_text);
    let assert = run_ed(file.path(), &case.commands);
    let final_text = fs::read_to_string(file.path()).unwrap_or_default();
    (final_text, assert)
}

#[test]
fn delete_single_line_removes_it_and_keeps_rest() {
    let suite = common::suites::cmd_delete::get_test_suite();
    let case = suite.test_cases.iter().find(|c| c.name == "delete_single_line").unwrap();
    let (final_text, assert) = run_case(case);
    assert.success();
    assert_eq!(final_text, "line to keep\n");
}

#[test]
fn delete_range_removes_both_lines() {
    let suite = common::suites::cmd_delete::get_test_suite();
    let case = suite.test_cases.iter().find(|c| c.name == "delete_range").unwrap();
    let (final_text, assert) = run_case(case);
    assert.success();
    assert_eq!(final_text, "keep this\n");
}

#[test]
fn delete_all_lines_leaves_an_empty_file() {
    let suite = common::suites::cmd_delete::get_test_suite();
    let case = suite.test_cases.iter().find(|c| c.name == "delete_all_lines").unwrap();
    let (final_text, assert) = run_case(case);
    assert.success();
    assert_eq!(final_text, "");
}

#[test]
fn delete_current_line_with_no_address() {
    let suite = common::suites::cmd_delete::get_test_suite();
    let case = suite.test_cases.iter().find(|c| c.name == "delete_current_line").unwrap();
    let (final_text, assert) = run_case(case);
    assert.success();
    assert_eq!(final_text, "line 1\nline 3\n");
}

#[test]
fn delete_marked_line_via_mark_address() {
    let suite = common::suites::cmd_delete::get_test_suite();
    let case = suite.test_cases.iter().find(|c| c.name == "delete_marked_line").unwrap();
    let (final_text, assert) = run_case(case);
    assert.success();
    assert_eq!(final_text, "line 1\nline 3\n");
}

#[test]
fn append_inserts_new_lines_after_addr() {
    let file = with_fixture("first\nlast\n");
    run_ed(file.path(), "1a\nmiddle\n.\nw\nq\n").success();
    assert_eq!(fs::read_to_string(file.path()).unwrap(), "first\nmiddle\nlast\n");
}

#[test]
fn insert_places_new_lines_before_addr() {
    let file = with_fixture("first\nlast\n");
    run_ed(file.path(), "2i\nmiddle\n.\nw\nq\n").success();
    assert_eq!(fs::read_to_string(file.path()).unwrap(), "first\nmiddle\nlast\n");
}

#[test]
fn change_replaces_a_line() {
    let file = with_fixture("one\ntwo\nthree\n");
    run_ed(file.path(), "2c\nTWO\n.\nw\nq\n").success();
    assert_eq!(fs::read_to_string(file.path()).unwrap(), "one\nTWO\nthree\n");
}

#[test]
fn substitute_replaces_first_match_on_each_addressed_line() {
    let file = with_fixture("foo bar foo\n");
    run_ed(file.path(), "1s/foo/baz/\nw\nq\n").success();
    assert_eq!(fs::read_to_string(file.path()).unwrap(), "baz bar foo\n");
}

#[test]
fn substitute_global_flag_replaces_every_match() {
    let file = with_fixture("foo bar foo\n");
    run_ed(file.path(), "1s/foo/baz/g\nw\nq\n").success();
    assert_eq!(fs::read_to_string(file.path()).unwrap(), "baz bar baz\n");
}

#[test]
fn global_command_runs_substitution_on_every_matching_line() {
    let file = with_fixture("apple\nbanana\napricot\n");
    run_ed(file.path(), "g/^a/s/a/A/\nw\nq\n").success();
    assert_eq!(fs::read_to_string(file.path()).unwrap(), "Apple\nbanana\nApricot\n");
}

#[test]
fn move_relocates_a_line_range() {
    let file = with_fixture("a\nb\nc\nd\n");
    run_ed(file.path(), "1m3\nw\nq\n").success();
    assert_eq!(fs::read_to_string(file.path()).unwrap(), "b\nc\na\nd\n");
}

#[test]
fn transfer_copies_a_line_range() {
    let file = with_fixture("a\nb\n");
    run_ed(file.path(), "1,2t$\nw\nq\n").success();
    assert_eq!(fs::read_to_string(file.path()).unwrap(), "a\nb\na\nb\n");
}

#[test]
fn yank_and_put_duplicates_a_line() {
    let file = with_fixture("only\n");
    run_ed(file.path(), "1y\n1x\nw\nq\n").success();
    assert_eq!(fs::read_to_string(file.path()).unwrap(), "only\nonly\n");
}

#[test]
fn undo_restores_a_deleted_line() {
    let file = with_fixture("one\ntwo\n");
    run_ed(file.path(), "1d\nu\nw\nq\n").success();
    assert_eq!(fs::read_to_string(file.path()).unwrap(), "one\ntwo\n");
}

#[test]
fn quit_with_unsaved_changes_is_refused_once_then_allowed() {
    let file = with_fixture("one\n");
    run_ed(file.path(), "2a\ntwo\n.\nq\nq\n")
        .success()
        .stdout(predicate::str::contains("?"));
    // the file is untouched: neither q nor the refused q wrote it
    assert_eq!(fs::read_to_string(file.path()).unwrap(), "one\n");
}

#[test]
fn unknown_command_prints_a_question_mark_and_keeps_going() {
    let file = with_fixture("one\n");
    run_ed(file.path(), "Z\n1p\nq\n")
        .failure()
        .code(1)
        .stdout(predicate::str::contains("?").and(predicate::str::contains("one")));
}

#[test]
fn loose_exit_status_flag_forces_zero_on_error() {
    let file = with_fixture("one\n");
    Command::cargo_bin("lined")
        .unwrap()
        .arg("-l")
        .arg(file.path())
        .write_stdin("Z\nq\n")
        .assert()
        .success();
}

#[test]
fn print_line_number_with_equals() {
    let file = with_fixture("a\nb\nc\n");
    run_ed(file.path(), "$=\nq\n")
        .success()
        .stdout(predicate::str::contains("3\n"));
}

#[test]
fn starting_at_a_numeric_plus_address_sets_current_line() {
    let file = with_fixture("a\nb\nc\n");
    Command::cargo_bin("lined")
        .unwrap()
        .arg("+2")
        .arg(file.path())
        .write_stdin(".p\nq\n")
        .assert()
        .success()
        .stdout(predicate::eq("b\n"));
}

#[test]
fn script_mode_suppresses_write_byte_count() {
    let file = with_fixture("one\ntwo\n");
    Command::cargo_bin("lined")
        .unwrap()
        .arg("-s")
        .arg(file.path())
        .write_stdin("w\nq\n")
        .assert()
        .success()
        .stdout(predicate::str::is_empty());
}
