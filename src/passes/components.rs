//! Component elaboration.
//!
//! Abstract components exist only to be extended and produce no output.
//! Concrete components contribute their body rules in place; the component
//! wrapper itself never serializes. Body rules keep the component name as
//! their chunk id so a later output stage can partition by component.

use crate::controller::{VisitContext, VisitController};
use crate::passes::{Pass, PassContext};
use crate::tree::NodeKind;
use crate::visitor::TreeVisitor;

pub struct ElaborateComponents;

struct Elaborate;

impl TreeVisitor for Elaborate {
  fn enter_component(&mut self, cx: &mut VisitContext) -> bool {
    let (name, block, is_abstract) = match cx.kind() {
      NodeKind::Component { name, block, is_abstract, .. } => (name.clone(), *block, *is_abstract),
      _ => unreachable!(),
    };
    if is_abstract {
      cx.remove_current_node();
      return false;
    }
    let children = cx.tree.take_list_children(block);
    for &child in &children {
      cx.tree.set_chunk(child, name.clone());
    }
    cx.replace_current_block_child_with(children, true);
    false
  }
}

impl Pass for ElaborateComponents {
  fn name(&self) -> &'static str {
    "elaborate-components"
  }

  fn run(&mut self, cx: &mut PassContext) {
    let mut controller = VisitController::new();
    controller.start_mutating_visit(cx.tree, &mut Elaborate);
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::compiler::test_util::parse_tree;
  use crate::diagnostics::ErrorManager;
  use crate::job::JobDescription;
  use crate::tree::NodeTag;

  fn run(source: &str) -> (crate::tree::Tree, ErrorManager) {
    let (mut tree, mut errors) = parse_tree(source);
    let job = JobDescription::default();
    let mut pass = ElaborateComponents;
    pass.run(&mut PassContext {
      tree: &mut tree,
      job: &job,
      errors: &mut errors,
      substitution_map: None,
    });
    (tree, errors)
  }

  #[test]
  fn concrete_components_inline_their_rules_with_a_chunk() {
    let (tree, errors) = run("@component dialog { .title { font-weight: bold; } }");
    assert!(!errors.has_errors());
    let body = tree.body();
    let children = tree.children(body);
    assert_eq!(children.len(), 1);
    assert_eq!(tree[children[0]].kind.tag(), NodeTag::Ruleset);
    assert_eq!(tree[children[0]].chunk.as_deref(), Some("dialog"));
  }

  #[test]
  fn abstract_components_are_dropped() {
    let (tree, errors) = run("@abstract_component base { .x { color: red; } }");
    assert!(!errors.has_errors());
    assert_eq!(tree.children(tree.body()).len(), 0);
  }
}
