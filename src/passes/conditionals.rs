//! Compile-time conditional evaluation.
//!
//! Each `@if`/`@elseif`/`@else` chain collapses to the body of its first arm
//! whose condition holds under the job's true-condition set, or to nothing.
//! The winning body is revisited, so nested conditionals collapse in the
//! same pass.

use crate::controller::{VisitContext, VisitController};
use crate::passes::{Pass, PassContext};
use crate::tree::{BoolOperator, NodeId, NodeKind, Tree};
use crate::visitor::TreeVisitor;
use ahash::AHashSet;

pub struct EvaluateConditionals;

struct Evaluate {
  truths: AHashSet<String>,
}

fn eval_bool(tree: &Tree, id: NodeId, truths: &AHashSet<String>) -> bool {
  match &tree[id].kind {
    NodeKind::BoolConstant { name } => truths.contains(name),
    NodeKind::BoolNot { operand } => !eval_bool(tree, *operand, truths),
    NodeKind::BoolBinary { operator, left, right } => match operator {
      BoolOperator::And => eval_bool(tree, *left, truths) && eval_bool(tree, *right, truths),
      BoolOperator::Or => eval_bool(tree, *left, truths) || eval_bool(tree, *right, truths),
    },
    kind => panic!("not a boolean expression: {:?}", kind.tag()),
  }
}

impl TreeVisitor for Evaluate {
  fn enter_conditional_block(&mut self, cx: &mut VisitContext) -> bool {
    let arms = match cx.kind() {
      NodeKind::ConditionalBlock { arms } => arms.clone(),
      _ => unreachable!(),
    };

    let mut winner = None;
    for arm in arms {
      let (condition, block) = match &cx.tree[arm].kind {
        NodeKind::ConditionalRule { condition, block, .. } => (*condition, *block),
        kind => panic!("conditional arm is not a ConditionalRule: {:?}", kind.tag()),
      };
      let holds = match condition {
        Some(condition) => eval_bool(cx.tree, condition, &self.truths),
        None => true,
      };
      if holds {
        winner = Some(block);
        break;
      }
    }

    match winner {
      Some(block) => {
        let children = cx.tree.take_list_children(block);
        cx.replace_current_block_child_with(children, true);
      }
      None => cx.remove_current_node(),
    }
    false
  }
}

impl Pass for EvaluateConditionals {
  fn name(&self) -> &'static str {
    "evaluate-conditionals"
  }

  fn run(&mut self, cx: &mut PassContext) {
    let mut visitor = Evaluate {
      truths: cx.job.true_condition_names.iter().cloned().collect(),
    };
    let mut controller = VisitController::new();
    controller.start_mutating_visit(cx.tree, &mut visitor);
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::compiler::test_util::{parse_tree, pretty};
  use crate::diagnostics::ErrorManager;
  use crate::job::JobDescription;

  fn run(source: &str, truths: &[&str]) -> String {
    let (mut tree, mut errors) = parse_tree(source);
    assert!(!errors.has_errors(), "parse failed: {:?}", errors.errors().collect::<Vec<_>>());
    let job = JobDescription {
      true_condition_names: truths.iter().map(|s| s.to_string()).collect(),
      ..JobDescription::default()
    };
    let mut pass = EvaluateConditionals;
    pass.run(&mut PassContext {
      tree: &mut tree,
      job: &job,
      errors: &mut errors,
      substitution_map: None,
    });
    pretty(&tree)
  }

  #[test]
  fn true_arm_wins() {
    let out = run("@if COND { .a { color: red; } } @else { .a { color: blue; } }", &["COND"]);
    assert!(out.contains("color: red"));
    assert!(!out.contains("color: blue"));
  }

  #[test]
  fn else_arm_wins_when_no_condition_holds() {
    let out = run("@if COND { .a { color: red; } } @else { .a { color: blue; } }", &[]);
    assert!(out.contains("color: blue"));
  }

  #[test]
  fn chain_without_else_can_collapse_to_nothing() {
    let out = run("@if COND { .a { color: red; } }", &[]);
    assert!(!out.contains("color"));
  }

  #[test]
  fn boolean_operators_combine() {
    let out = run("@if A && !B { .a { color: red; } } @elseif A || B { .a { color: green; } }", &["B"]);
    assert!(out.contains("color: green"));
  }

  #[test]
  fn nested_conditionals_collapse_in_one_pass() {
    let out = run(
      "@if OUTER { @if INNER { .a { color: red; } } @else { .a { color: blue; } } }",
      &["OUTER"],
    );
    assert!(out.contains("color: blue"));
    assert!(!out.contains("@if"));
  }
}
