//! `@for` loop unrolling.
//!
//! Bounds must be numeric by the time this pass runs (constant replacement
//! comes first). The body is copied once per iteration with the loop
//! variable substituted; copies are revisited so nested loops unroll in the
//! same pass.

use crate::controller::{VisitContext, VisitController};
use crate::diagnostics::ErrorManager;
use crate::passes::{Pass, PassContext};
use crate::tree::{NodeId, NodeKind, Tree};
use crate::visitor::TreeVisitor;

/// An unrolling cap; a loop this large is a mistake, not a stylesheet.
const MAX_ITERATIONS: usize = 10_000;

pub struct EvaluateLoops;

struct Unroll<'a> {
  errors: &'a mut ErrorManager,
}

fn numeric_value(tree: &Tree, id: NodeId) -> Option<f64> {
  match &tree[id].kind {
    NodeKind::Numeric { value, unit } if unit.is_empty() => Some(*value),
    _ => None,
  }
}

/// Replaces `$variable` inside a detached copy. An inner loop that rebinds
/// the same variable shadows it, so its subtree is left alone.
fn substitute_loop_variable(tree: &mut Tree, node: NodeId, variable: &str, value: f64) {
  if let NodeKind::ForLoop { variable: inner, .. } = &tree[node].kind {
    if inner == variable {
      return;
    }
  }
  let mut i = 0;
  loop {
    let children = tree.children(node);
    if i >= children.len() {
      return;
    }
    let child = children[i];
    let matches_var = matches!(&tree[child].kind, NodeKind::LoopVariable { name } if name == variable);
    if matches_var {
      let loc = tree[child].loc;
      let replacement = tree.alloc(
        NodeKind::Numeric {
          value,
          unit: String::new(),
        },
        loc,
      );
      let index = tree
        .list_index_of(node, child)
        .expect("loop variable outside a value list");
      tree.splice_list_children(node, index, &[replacement]);
    } else {
      substitute_loop_variable(tree, child, variable, value);
    }
    i += 1;
  }
}

impl<'a> TreeVisitor for Unroll<'a> {
  fn enter_for_loop(&mut self, cx: &mut VisitContext) -> bool {
    let (variable, from, to, step, block) = match cx.kind() {
      NodeKind::ForLoop {
        variable, from, to, step, block, ..
      } => (variable.clone(), *from, *to, *step, *block),
      _ => unreachable!(),
    };
    let loc = cx.tree[cx.node].loc;

    let from = numeric_value(cx.tree, from);
    let to = numeric_value(cx.tree, to);
    let step = match step {
      None => Some(1.0),
      Some(id) => numeric_value(cx.tree, id),
    };
    let (from, to, step) = match (from, to, step) {
      (Some(from), Some(to), Some(step)) => (from, to, step),
      _ => {
        self
          .errors
          .report_error("@for bounds must be unitless numbers", loc);
        cx.remove_current_node();
        return false;
      }
    };
    if step <= 0.0 {
      self.errors.report_error("@for step must be positive", loc);
      cx.remove_current_node();
      return false;
    }

    let body = cx.tree.children(block);
    let mut out = Vec::new();
    let mut value = from;
    let mut iterations = 0;
    while value <= to {
      iterations += 1;
      if iterations > MAX_ITERATIONS {
        self
          .errors
          .report_error(format!("@for loop exceeds {} iterations", MAX_ITERATIONS), loc);
        cx.remove_current_node();
        return false;
      }
      for &child in &body {
        let copy = cx.tree.deep_copy(child);
        substitute_loop_variable(cx.tree, copy, &variable, value);
        out.push(copy);
      }
      value += step;
    }
    cx.replace_current_block_child_with(out, true);
    false
  }

  fn enter_loop_variable(&mut self, cx: &mut VisitContext) -> bool {
    // Anything still here is outside every loop that binds it.
    if let NodeKind::LoopVariable { name } = cx.kind() {
      let loc = cx.tree[cx.node].loc;
      let message = format!("Loop variable \"${}\" used outside @for", name);
      self.errors.report_error(message, loc);
    }
    false
  }
}

impl Pass for EvaluateLoops {
  fn name(&self) -> &'static str {
    "evaluate-loops"
  }

  fn run(&mut self, cx: &mut PassContext) {
    let mut visitor = Unroll { errors: &mut *cx.errors };
    let mut controller = VisitController::new();
    controller.start_mutating_visit(cx.tree, &mut visitor);
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::compiler::test_util::{parse_tree, pretty};
  use crate::job::JobDescription;

  fn run(source: &str) -> (String, ErrorManager) {
    let (mut tree, mut errors) = parse_tree(source);
    assert!(!errors.has_errors());
    let job = JobDescription::default();
    let mut pass = EvaluateLoops;
    pass.run(&mut PassContext {
      tree: &mut tree,
      job: &job,
      errors: &mut errors,
      substitution_map: None,
    });
    (pretty(&tree), errors)
  }

  #[test]
  fn loops_unroll_inclusively_with_substitution() {
    let (out, errors) = run("@for $i from 1 to 3 { .col { z-index: $i; } }");
    assert!(!errors.has_errors());
    assert!(out.contains("z-index: 1"));
    assert!(out.contains("z-index: 2"));
    assert!(out.contains("z-index: 3"));
    assert!(!out.contains("@for"));
  }

  #[test]
  fn step_controls_the_stride() {
    let (out, errors) = run("@for $i from 0 to 4 step 2 { .col { z-index: $i; } }");
    assert!(!errors.has_errors());
    assert!(out.contains("z-index: 0"));
    assert!(out.contains("z-index: 2"));
    assert!(out.contains("z-index: 4"));
    assert!(!out.contains("z-index: 1"));
  }

  #[test]
  fn loop_variables_feed_function_arguments() {
    let (out, errors) = run("@for $i from 1 to 2 { .col { width: mult(10px, $i); } }");
    assert!(!errors.has_errors());
    assert!(out.contains("width: mult(10px, 1)"));
    assert!(out.contains("width: mult(10px, 2)"));
  }

  #[test]
  fn non_numeric_bounds_are_an_error() {
    let (_, errors) = run("@for $i from 1 to UNRESOLVED { .x { color: red; } }");
    assert!(errors.has_errors());
    assert!(errors.errors().any(|d| d.message.contains("unitless numbers")));
  }

  #[test]
  fn stray_loop_variable_is_an_error() {
    let (_, errors) = run(".x { z-index: $i; }");
    assert!(errors.has_errors());
    assert!(errors.errors().any(|d| d.message.contains("outside @for")));
  }
}
