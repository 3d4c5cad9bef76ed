//! GSS function folding.
//!
//! Built-in arithmetic and color functions fold to plain values once their
//! arguments are concrete (leave hooks run after the argument subtree, so
//! inner calls fold first). Custom functions resolve through the process
//! registry and memoize their result; unknown functions are diagnosed
//! unless the job tolerates them.

use crate::controller::{VisitContext, VisitController};
use crate::diagnostics::ErrorManager;
use crate::functions::{self, ArgValue};
use crate::location::SourceLocation;
use crate::passes::{Pass, PassContext};
use crate::tree::{FunctionTag, NodeId, NodeKind, Tree};
use crate::visitor::TreeVisitor;

pub struct EvaluateFunctions;

struct Evaluate<'a> {
  allowed_non_standard: &'a [String],
  allow_unrecognized: bool,
  errors: &'a mut ErrorManager,
}

fn extract_arg(tree: &Tree, id: NodeId) -> Option<ArgValue> {
  match &tree[id].kind {
    NodeKind::Numeric { value, unit } => Some(ArgValue::Number {
      value: *value,
      unit: unit.clone(),
    }),
    NodeKind::HexColor { hex } => Some(ArgValue::Color(hex.clone())),
    NodeKind::StringValue { value } => Some(ArgValue::Str(value.clone())),
    NodeKind::Literal { text } => Some(ArgValue::Ident(text.clone())),
    _ => None,
  }
}

fn value_to_node(tree: &mut Tree, value: ArgValue, loc: SourceLocation) -> NodeId {
  let kind = match value {
    ArgValue::Number { value, unit } => NodeKind::Numeric { value, unit },
    ArgValue::Color(hex) => NodeKind::HexColor { hex },
    ArgValue::Str(value) => NodeKind::StringValue { value },
    ArgValue::Ident(text) => NodeKind::Literal { text },
  };
  tree.alloc(kind, loc)
}

impl<'a> Evaluate<'a> {
  fn extract_args(&mut self, tree: &Tree, name: &str, args: &[NodeId], loc: SourceLocation) -> Option<Vec<ArgValue>> {
    let mut out = Vec::with_capacity(args.len());
    for &arg in args {
      match extract_arg(tree, arg) {
        Some(value) => out.push(value),
        None => {
          self
            .errors
            .report_error(format!("\"{}\" requires plain value arguments", name), loc);
          return None;
        }
      }
    }
    Some(out)
  }
}

impl<'a> TreeVisitor for Evaluate<'a> {
  fn leave_function(&mut self, cx: &mut VisitContext) {
    let (tag, args) = match cx.kind() {
      NodeKind::Function { tag, args } => (*tag, args.clone()),
      _ => unreachable!(),
    };
    // calc() and url() pass through to the output.
    let evaluator: fn(&[ArgValue]) -> Result<ArgValue, functions::FunctionError> = match tag {
      FunctionTag::Calc | FunctionTag::Url => return,
      FunctionTag::Add => functions::add,
      FunctionTag::Sub => functions::sub,
      FunctionTag::Mult => functions::mult,
      FunctionTag::Divide => functions::divide,
      FunctionTag::Min => functions::min,
      FunctionTag::Max => functions::max,
      FunctionTag::Rgb => functions::rgb,
      FunctionTag::Rgba => functions::rgba,
      FunctionTag::Concat => functions::concat,
    };
    let loc = cx.tree[cx.node].loc;
    let values = match self.extract_args(cx.tree, tag.name(), &args, loc) {
      Some(values) => values,
      None => return,
    };
    match evaluator(&values) {
      Ok(result) => {
        let node = value_to_node(cx.tree, result, loc);
        cx.replace_current_block_child_with(vec![node], false);
      }
      Err(err) => self.errors.report_error(err.message(), loc),
    }
  }

  fn leave_custom_function(&mut self, cx: &mut VisitContext) {
    let (name, args) = match cx.kind() {
      NodeKind::CustomFunction { name, args, .. } => (name.clone(), args.clone()),
      _ => unreachable!(),
    };
    let loc = cx.tree[cx.node].loc;
    if let Some(evaluator) = functions::lookup(&name) {
      let values = match self.extract_args(cx.tree, &name, &args, loc) {
        Some(values) => values,
        None => return,
      };
      match evaluator(&values) {
        Ok(result) => {
          if let NodeKind::CustomFunction { cached, .. } = cx.kind_mut() {
            *cached = Some(result.to_string());
          }
          let node = value_to_node(cx.tree, result, loc);
          cx.replace_current_block_child_with(vec![node], false);
        }
        Err(err) => self.errors.report_error(err.message(), loc),
      }
      return;
    }
    let allowed = self.allow_unrecognized || self.allowed_non_standard.iter().any(|f| f == &name);
    if !allowed {
      self.errors.report_error(format!("Unknown function \"{}\"", name), loc);
    }
  }
}

impl Pass for EvaluateFunctions {
  fn name(&self) -> &'static str {
    "evaluate-functions"
  }

  fn run(&mut self, cx: &mut PassContext) {
    let mut visitor = Evaluate {
      allowed_non_standard: &cx.job.allowed_non_standard_functions,
      allow_unrecognized: cx.job.allow_unrecognized_functions,
      errors: &mut *cx.errors,
    };
    let mut controller = VisitController::new();
    controller.start_mutating_visit(cx.tree, &mut visitor);
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::compiler::test_util::{parse_tree, pretty};
  use crate::job::JobDescription;

  fn run_with(source: &str, job: JobDescription) -> (String, ErrorManager) {
    let (mut tree, mut errors) = parse_tree(source);
    assert!(!errors.has_errors());
    let mut pass = EvaluateFunctions;
    pass.run(&mut PassContext {
      tree: &mut tree,
      job: &job,
      errors: &mut errors,
      substitution_map: None,
    });
    (pretty(&tree), errors)
  }

  fn run(source: &str) -> (String, ErrorManager) {
    run_with(source, JobDescription::default())
  }

  #[test]
  fn arithmetic_folds_with_units() {
    let (out, errors) = run(".x { margin-left: add(3px, 180px, 3px); }");
    assert!(!errors.has_errors());
    assert!(out.contains("margin-left: 186px"));
  }

  #[test]
  fn rgb_folds_to_a_hex_color() {
    let (out, errors) = run("body { background: rgb(235, 239, 249); }");
    assert!(!errors.has_errors());
    assert!(out.contains("background: #ebeff9"));
  }

  #[test]
  fn nested_calls_fold_inside_out() {
    let (out, errors) = run(".x { width: add(mult(10px, 3), 5px); }");
    assert!(!errors.has_errors());
    assert!(out.contains("width: 35px"));
  }

  #[test]
  fn mismatched_units_are_a_semantic_error() {
    let (_, errors) = run(".x { width: add(10px, 2em); }");
    assert!(errors.has_errors());
    assert!(errors.errors().any(|d| d.message.contains("cannot combine")));
  }

  #[test]
  fn calc_passes_through() {
    let (out, errors) = run(".x { width: calc(100% - 10px); }");
    assert!(!errors.has_errors());
    assert!(out.contains("calc(100% - 10px)"));
  }

  #[test]
  fn unknown_function_is_diagnosed() {
    let (_, errors) = run(".logo { background-image: urel('x'); }");
    assert!(errors.has_errors());
    assert!(errors.errors().any(|d| d.message == "Unknown function \"urel\""));
  }

  #[test]
  fn unknown_functions_can_be_allowed_by_name() {
    let job = JobDescription {
      allowed_non_standard_functions: vec!["urel".into()],
      ..JobDescription::default()
    };
    let (out, errors) = run_with(".logo { background-image: urel('x'); }", job);
    assert!(!errors.has_errors());
    assert!(out.contains("urel(\"x\")"));
  }

  #[test]
  fn registered_custom_functions_evaluate() {
    let (out, errors) = run(".x { float: selectFrom('left right', 1); }");
    assert!(!errors.has_errors());
    assert!(out.contains("float: right"));
  }
}
