//! Dead style elimination.
//!
//! Runs at `safe` optimization and above: true duplicate declarations
//! (same property, same value) keep only their last occurrence, and rules
//! left with nothing to say are removed.

use crate::controller::{VisitContext, VisitController};
use crate::passes::{Pass, PassContext};
use crate::printer::Printer;
use crate::tree::{NodeId, NodeKind, Tree};
use crate::visitor::TreeVisitor;

pub struct EliminateDeadStyles;

struct Eliminate;

fn serialize_value(tree: &Tree, id: NodeId) -> String {
  let mut out = String::new();
  let mut printer = Printer::new(&mut out, true);
  let _ = crate::output::write_node(tree, id, &mut printer);
  out
}

impl TreeVisitor for Eliminate {
  fn enter_declaration_block(&mut self, cx: &mut VisitContext) -> bool {
    // Keep the last of each identical property/value pair.
    let children = cx.tree.children(cx.node);
    let mut rendered: Vec<Option<(String, String)>> = Vec::with_capacity(children.len());
    for &child in &children {
      match &cx.tree[child].kind {
        NodeKind::Declaration { property, value, .. } => {
          let name = match &cx.tree[*property].kind {
            NodeKind::Property { name } => name.clone(),
            _ => unreachable!(),
          };
          rendered.push(Some((name, serialize_value(cx.tree, *value))));
        }
        _ => rendered.push(None),
      }
    }
    let mut remove = Vec::new();
    for (i, entry) in rendered.iter().enumerate() {
      if let Some(pair) = entry {
        if rendered[i + 1..].iter().flatten().any(|later| later == pair) {
          remove.push(i);
        }
      }
    }
    for &index in remove.iter().rev() {
      cx.tree.remove_list_child(cx.node, index);
    }
    true
  }

  fn leave_ruleset(&mut self, cx: &mut VisitContext) {
    let declarations = match cx.kind() {
      NodeKind::Ruleset { declarations, .. } => *declarations,
      _ => unreachable!(),
    };
    if cx.tree.list_len(declarations) == 0 {
      cx.remove_current_node();
    }
  }

  fn leave_media(&mut self, cx: &mut VisitContext) {
    let block = match cx.kind() {
      NodeKind::Media { block, .. } => *block,
      _ => unreachable!(),
    };
    if cx.tree.list_len(block) == 0 {
      cx.remove_current_node();
    }
  }
}

impl Pass for EliminateDeadStyles {
  fn name(&self) -> &'static str {
    "eliminate-dead-styles"
  }

  fn run(&mut self, cx: &mut PassContext) {
    let mut controller = VisitController::new();
    controller.start_mutating_visit(cx.tree, &mut Eliminate);
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::compiler::test_util::{parse_tree, pretty};
  use crate::job::JobDescription;

  fn run(source: &str) -> String {
    let (mut tree, mut errors) = parse_tree(source);
    assert!(!errors.has_errors());
    let job = JobDescription::default();
    let mut pass = EliminateDeadStyles;
    pass.run(&mut PassContext {
      tree: &mut tree,
      job: &job,
      errors: &mut errors,
      substitution_map: None,
    });
    pretty(&tree)
  }

  #[test]
  fn exact_duplicates_keep_the_last_occurrence() {
    let out = run(".x { color: red; margin: 0; color: red; }");
    assert_eq!(out.matches("color: red").count(), 1);
    assert!(out.contains("margin: 0"));
  }

  #[test]
  fn value_fallbacks_survive() {
    let out = run(".x { background: #fff; background: rgba(255, 255, 255, 0.5); }");
    assert!(out.contains("#fff"));
    assert!(out.contains("rgba"));
  }

  #[test]
  fn empty_rulesets_are_removed() {
    let out = run(".x { }\n.y { color: red; }");
    assert!(!out.contains(".x"));
    assert!(out.contains(".y"));
  }

  #[test]
  fn empty_media_rules_are_removed() {
    let out = run("@media screen { .x { } }");
    assert!(!out.contains("@media"));
  }
}
