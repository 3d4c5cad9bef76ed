//! `@provide` / `@require` linkage.
//!
//! Every required namespace must be provided exactly once across the
//! compilation unit. Both rule kinds are stripped afterwards; they carry no
//! output.

use crate::controller::{VisitContext, VisitController};
use crate::location::SourceLocation;
use crate::passes::{Pass, PassContext};
use crate::tree::NodeKind;
use crate::visitor::TreeVisitor;

pub struct CheckProvides;

#[derive(Default)]
struct Collector {
  provides: Vec<(String, SourceLocation)>,
  requires: Vec<(String, SourceLocation)>,
}

impl TreeVisitor for Collector {
  fn enter_provide(&mut self, cx: &mut VisitContext) -> bool {
    if let NodeKind::Provide { name } = cx.kind() {
      self.provides.push((name.clone(), cx.tree[cx.node].loc));
    }
    false
  }

  fn enter_require(&mut self, cx: &mut VisitContext) -> bool {
    if let NodeKind::Require { name } = cx.kind() {
      self.requires.push((name.clone(), cx.tree[cx.node].loc));
    }
    false
  }
}

struct Strip;

impl TreeVisitor for Strip {
  fn enter_provide(&mut self, cx: &mut VisitContext) -> bool {
    cx.remove_current_node();
    false
  }

  fn enter_require(&mut self, cx: &mut VisitContext) -> bool {
    cx.remove_current_node();
    false
  }
}

impl Pass for CheckProvides {
  fn name(&self) -> &'static str {
    "check-provides"
  }

  fn run(&mut self, cx: &mut PassContext) {
    let mut collector = Collector::default();
    let mut controller = VisitController::new();
    controller.start_visit(cx.tree, &mut collector);

    for (i, (name, loc)) in collector.provides.iter().enumerate() {
      if collector.provides[..i].iter().any(|(earlier, _)| earlier == name) {
        cx.errors.report_error(format!("Duplicate @provide of \"{}\"", name), *loc);
      }
    }
    for (name, loc) in &collector.requires {
      if !collector.provides.iter().any(|(provided, _)| provided == name) {
        cx.errors
          .report_error(format!("Required namespace \"{}\" is never provided", name), *loc);
      }
    }

    controller.start_mutating_visit(cx.tree, &mut Strip);
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
    let mut pass = CheckProvides;
    pass.run(&mut PassContext {
      tree: &mut tree,
      job: &job,
      errors: &mut errors,
      substitution_map: None,
    });
    (tree, errors)
  }

  #[test]
  fn satisfied_require_passes_and_both_are_stripped() {
    let (tree, errors) = run("@provide \"ns.buttons\";\n@require \"ns.buttons\";\n.a { color: red; }");
    assert!(!errors.has_errors());
    let body = tree.body();
    for child in tree.children(body) {
      assert!(!matches!(tree[child].kind.tag(), NodeTag::Provide | NodeTag::Require));
    }
  }

  #[test]
  fn unsatisfied_require_is_an_error() {
    let (_, errors) = run("@require \"ns.missing\";");
    assert!(errors.has_errors());
    assert!(errors.errors().any(|d| d.message.contains("never provided")));
  }

  #[test]
  fn duplicate_provide_is_an_error() {
    let (_, errors) = run("@provide \"ns\";\n@provide \"ns\";");
    assert!(errors.has_errors());
    assert!(errors.errors().any(|d| d.message.contains("Duplicate @provide")));
  }
}
