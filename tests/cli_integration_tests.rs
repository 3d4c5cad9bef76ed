use assert_cmd::prelude::*;
use assert_fs::prelude::*;
use predicates::prelude::*;
use std::process::Command;

#[test]
fn compiles_to_stdout() {
  let dir = assert_fs::TempDir::new().unwrap();
  let input = dir.child("test.gss");
  input.write_str("@def BG rgb(235,239,249); body{background:BG;}").unwrap();

  Command::cargo_bin("gssc")
    .unwrap()
    .arg(input.path())
    .assert()
    .success()
    .stdout(predicate::eq("body{background:#ebeff9}"));
}

#[test]
fn unknown_function_exits_nonzero_with_a_diagnostic() {
  let dir = assert_fs::TempDir::new().unwrap();
  let input = dir.child("bad.gss");
  input.write_str(".logo{background-image:urel('x');}").unwrap();

  Command::cargo_bin("gssc")
    .unwrap()
    .arg(input.path())
    .assert()
    .failure()
    .code(1)
    .stderr(predicate::str::contains("Unknown function \"urel\""))
    .stderr(predicate::str::contains("1 error(s)"));
}

#[test]
fn writes_renaming_map_to_a_file() {
  let dir = assert_fs::TempDir::new().unwrap();
  let input = dir.child("rename.gss");
  input
    .write_str(".dialog-content{padding:10px;} .dialog-title{font-weight:bold;}")
    .unwrap();
  let map = dir.child("renaming.json");
  let out = dir.child("out.css");

  Command::cargo_bin("gssc")
    .unwrap()
    .arg(input.path())
    .arg("--rename")
    .arg("closure")
    .arg("--output-renaming-map-format")
    .arg("closure-compiled-split-hyphens")
    .arg("--output-renaming-map")
    .arg(map.path())
    .arg("-o")
    .arg(out.path())
    .assert()
    .success();

  out.assert(predicate::str::contains(".a-b{padding:10px}"));
  map.assert(predicate::str::contains("goog.setCssNameMapping({"));
  map.assert(predicate::str::contains("\"dialog\": \"a\""));
}

#[test]
fn true_conditions_select_a_branch() {
  let dir = assert_fs::TempDir::new().unwrap();
  let input = dir.child("cond.gss");
  input
    .write_str("@if COND { .a{color:red;} } @else { .a{color:blue;} }")
    .unwrap();

  Command::cargo_bin("gssc")
    .unwrap()
    .arg(input.path())
    .arg("--true-condition")
    .arg("COND")
    .assert()
    .success()
    .stdout(predicate::eq(".a{color:red}"));
}
