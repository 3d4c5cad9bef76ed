use gss::compiler::{compile, serialize_tree, Compiler};
use gss::diagnostics::ErrorManager;
use gss::job::{JobDescription, Orientation, OutputFormat, RenamingType};
use gss::location::{SourceFile, SourceId};
use gss::parser::builder::TreeBuilder;
use gss::parser::{parse_source, ParseOptions};
use gss::renaming::format::OutputRenamingMapFormat;
use gss::tree::Tree;
use indoc::indoc;
use pretty_assertions::assert_eq;

fn job_for(source: &str) -> JobDescription {
  JobDescription {
    inputs: vec![SourceFile::new("test.gss", source)],
    ..JobDescription::default()
  }
}

fn compile_compressed(source: &str) -> String {
  compile(job_for(source)).expect("compilation failed").css
}

#[test]
fn definitions_and_color_functions_fold_in_compressed_output() {
  let css = compile_compressed("@def BG rgb(235,239,249); body{background:BG;}");
  assert_eq!(css, "body{background:#ebeff9}");
}

#[test]
fn arithmetic_folds_in_pretty_output() {
  let job = JobDescription {
    output_format: OutputFormat::Pretty,
    ..job_for("@def W 180px; @def P 3px; .x{margin-left:add(P,W,P);}")
  };
  let css = compile(job).expect("compilation failed").css;
  assert_eq!(
    css,
    indoc! {"
      .x {
        margin-left: 186px;
      }
    "}
  );
}

#[test]
fn conditionals_collapse_under_the_true_condition_set() {
  let job = JobDescription {
    true_condition_names: vec!["COND".into()],
    ..job_for("@if COND { .a{color:red;} } @else { .a{color:blue;} }")
  };
  let css = compile(job).expect("compilation failed").css;
  assert_eq!(css, ".a{color:red}");
}

#[test]
fn rtl_compilation_flips_sides_and_honors_noflip() {
  let source = ".logo{margin-left:10px;} .x{/* @noflip */direction:ltr;border-right:2px solid #ccc;padding:0 2px 0 4px;}";
  let job = JobDescription {
    output_orientation: Orientation::Rtl,
    ..job_for(source)
  };
  let css = compile(job).expect("compilation failed").css;
  assert!(css.contains("margin-right:10px"));
  assert!(css.contains("direction:ltr"));
  assert!(css.contains("border-left:2px solid #ccc"));
  assert!(css.contains("padding:0 4px 0 2px"));
}

#[test]
fn minimal_renaming_with_hyphen_split_map() {
  let job = JobDescription {
    renaming: RenamingType::Closure,
    output_renaming_map_format: OutputRenamingMapFormat::ClosureCompiledSplitHyphens,
    ..job_for(".dialog-content{padding:10px;} .dialog-title{font-weight:bold;}")
  };
  let result = compile(job).expect("compilation failed");
  assert!(result.css.contains(".a-b{padding:10px}"));
  assert!(result.css.contains(".a-c{font-weight:bold}"));

  let map = result.renaming_map.expect("no renaming map");
  let read = OutputRenamingMapFormat::ClosureCompiledSplitHyphens.read(&map).unwrap();
  assert_eq!(read.0.get("dialog").unwrap(), "a");
  assert_eq!(read.0.get("content").unwrap(), "b");
  assert_eq!(read.0.get("title").unwrap(), "c");
}

#[test]
fn unknown_function_fails_the_compilation() {
  let failure = compile(job_for(".logo{background-image:urel('x');}")).unwrap_err();
  assert_eq!(failure.error_count, 1);
  assert!(failure.diagnostics.iter().any(|d| d.contains("Unknown function \"urel\"")));
  // The failure output carries file, line, column, and a caret line.
  assert!(failure.diagnostics[0].starts_with("test.gss:1:"));
  assert!(failure.diagnostics[0].contains('^'));
  assert!(failure.to_string().contains("1 error(s), 0 warning(s)"));
}

#[test]
fn mixins_loops_and_media_compile_together() {
  let source = indoc! {"
    @defmixin size(W, H) { width: W; height: H; }
    @media print {
      .card { @mixin size(200px, mult(10px, 4)); }
    }
    @for $i from 1 to 3 {
      .z { z-index: $i; }
    }
  "};
  let css = compile_compressed(source);
  assert!(css.contains("@media print{.card{width:200px;height:40px}}"));
  assert!(css.contains("z-index:1"));
  assert!(css.contains("z-index:2"));
  assert!(css.contains("z-index:3"));
}

#[test]
fn inputs_concatenate_into_one_compilation_unit() {
  let job = JobDescription {
    inputs: vec![
      SourceFile::new("defs.gss", "@def BRAND #336699;"),
      SourceFile::new("styles.gss", ".header{color:BRAND;}"),
    ],
    ..JobDescription::default()
  };
  let css = compile(job).expect("compilation failed").css;
  assert_eq!(css, ".header{color:#336699}");
}

#[test]
fn keyframes_and_font_face_pass_through() {
  let source = indoc! {"
    @keyframes fade {
      from { opacity: 0; }
      50% { opacity: 0.5; }
      to { opacity: 1; }
    }
    @font-face { font-family: 'Branding'; src: url('brand.woff'); }
  "};
  let css = compile_compressed(source);
  assert!(css.contains("@keyframes fade{from{opacity:0}50%{opacity:.5}to{opacity:1}}"));
  assert!(css.contains("@font-face{font-family:\"Branding\";src:url(\"brand.woff\")}"));
}

#[test]
fn provide_require_linkage_is_checked() {
  let failure = compile(job_for("@require \"missing.ns\"; .a{color:red;}")).unwrap_err();
  assert!(failure.diagnostics.iter().any(|d| d.contains("never provided")));

  let css = compile_compressed("@provide \"ns\"; @require \"ns\"; .a{color:red;}");
  assert_eq!(css, ".a{color:red}");
}

#[test]
fn components_inline_their_rules() {
  let css = compile_compressed("@abstract_component base { .b{color:red;} } @component dialog { .title{font-weight:bold;} }");
  assert_eq!(css, ".title{font-weight:bold}");
}

#[test]
fn parse_errors_recover_and_report() {
  let failure = compile(job_for(".a{color:red;;bogus!;margin:0;} .b{color:blue;}")).unwrap_err();
  assert!(failure.error_count >= 1);

  // Recovery keeps the surrounding rules; with leniency the same input
  // minus the bad declaration compiles.
  let css = compile_compressed(".a{color:red;margin:0;} .b{color:blue;}");
  assert_eq!(css, ".a{color:red;margin:0}.b{color:blue}");
}

#[test]
fn important_comments_survive_compressed_output() {
  let css = compile_compressed("/*! (c) example */ .a{color:red;}");
  assert!(css.contains("/*! (c) example */"));

  let css = compile_compressed("/* plain note */ .a{color:red;}");
  assert!(!css.contains("plain note"));
}

#[test]
fn debug_output_keeps_comments() {
  let job = JobDescription {
    output_format: OutputFormat::Debug,
    ..job_for("/* header note */ .a{color:red;}")
  };
  let css = compile(job).expect("compilation failed").css;
  assert!(css.contains("/* header note */"));
}

#[test]
fn duplicate_declarations_warn_and_collapse() {
  let result = compile(job_for(".a{color:red;color:red;}")).expect("compilation failed");
  assert_eq!(result.css, ".a{color:red}");
  assert!(result.warnings.iter().any(|w| w.contains("Duplicate declaration")));
}

fn parse_to_tree(source: &str) -> Tree {
  let mut tree = Tree::new();
  let mut errors = ErrorManager::new();
  let mut builder = TreeBuilder::new(&mut tree);
  parse_source(SourceId(0), source, &ParseOptions::default(), &mut builder, &mut errors);
  builder.finish();
  assert!(!errors.has_errors(), "parse failed");
  tree
}

#[test]
fn pretty_serialization_round_trips() {
  let sources = [
    "div > p.note, #main li:hover { color: #ff0000; margin: 0 2px !important; }",
    "@def SIZE 10px; @if A && !B { .a { width: SIZE; } } @else { .a { width: calc(100% - 4px); } }",
    "@defmixin m(A) { padding: A; } .x { @mixin m(2px); font: 12px/1.5 serif; }",
    "@media screen and (max-width: 500px) { .a:not(.b) { float: left; } }",
    "@for $i from 1 to 3 step 1 { .c { top: $i; } }",
    "@keyframes k { from { opacity: 0; } to { opacity: 1; } }",
  ];
  for source in sources {
    let first = serialize_tree(&parse_to_tree(source), OutputFormat::Pretty);
    let second = serialize_tree(&parse_to_tree(&first), OutputFormat::Pretty);
    assert_eq!(first, second, "round trip diverged for {:?}", source);
  }
}

#[test]
fn empty_input_produces_empty_output() {
  let css = compile_compressed("");
  assert_eq!(css, "");
}

#[test]
fn charset_is_kept_once() {
  let job = JobDescription {
    inputs: vec![
      SourceFile::new("a.gss", "@charset \"UTF-8\"; .a{color:red;}"),
      SourceFile::new("b.gss", "@charset \"UTF-8\"; .b{color:blue;}"),
    ],
    output_format: OutputFormat::Pretty,
    ..JobDescription::default()
  };
  let css = compile(job).expect("compilation failed").css;
  assert_eq!(css.matches("@charset").count(), 1);
}

#[test]
fn compiler_reuse_is_deterministic() {
  let compiler = Compiler::new(job_for("@def C #abcdef; .a{color:C;}"));
  let first = compiler.compile().expect("compilation failed").css;
  let second = compiler.compile().expect("compilation failed").css;
  assert_eq!(first, second);
  assert_eq!(first, ".a{color:#abcdef}");
}
