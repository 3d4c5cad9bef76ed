//! Declaration-level checks: unrecognized properties and duplicate
//! declarations.

use crate::controller::{VisitContext, VisitController};
use crate::diagnostics::ErrorManager;
use crate::passes::{Pass, PassContext};
use crate::printer::Printer;
use crate::properties;
use crate::tree::{NodeId, NodeKind, Tree};
use crate::visitor::TreeVisitor;

pub struct CheckProperties;

struct Check<'a> {
  allowed_properties: &'a [String],
  allow_unrecognized: bool,
  allow_duplicates: bool,
  errors: &'a mut ErrorManager,
}

fn serialize_value(tree: &Tree, id: NodeId) -> String {
  let mut out = String::new();
  let mut printer = Printer::new(&mut out, true);
  let _ = crate::output::write_node(tree, id, &mut printer);
  out
}

impl<'a> TreeVisitor for Check<'a> {
  fn enter_declaration_block(&mut self, cx: &mut VisitContext) -> bool {
    if self.allow_duplicates {
      return true;
    }
    // An identical property/value pair repeated in one block is a mistake;
    // differing values are left alone as deliberate browser fallbacks.
    let children = cx.tree.children(cx.node);
    let mut seen: Vec<(String, String, NodeId)> = Vec::new();
    for &child in &children {
      let (property, value) = match &cx.tree[child].kind {
        NodeKind::Declaration { property, value, .. } => (*property, *value),
        _ => continue,
      };
      let name = match &cx.tree[property].kind {
        NodeKind::Property { name } => name.clone(),
        _ => continue,
      };
      let rendered = serialize_value(cx.tree, value);
      if seen.iter().any(|(n, v, _)| *n == name && *v == rendered) {
        self.errors.report_warning(
          format!("Duplicate declaration of \"{}\"", name),
          cx.tree[child].loc,
        );
      } else {
        seen.push((name, rendered, child));
      }
    }
    true
  }

  fn enter_property(&mut self, cx: &mut VisitContext) -> bool {
    let name = match cx.kind() {
      NodeKind::Property { name } => name.clone(),
      _ => unreachable!(),
    };
    if !properties::is_recognized(&name)
      && !self.allow_unrecognized
      && !self.allowed_properties.iter().any(|p| p == &name)
    {
      self
        .errors
        .report_error(format!("Unknown property \"{}\"", name), cx.tree[cx.node].loc);
    }
    false
  }
}

impl Pass for CheckProperties {
  fn name(&self) -> &'static str {
    "check-properties"
  }

  fn run(&mut self, cx: &mut PassContext) {
    let mut visitor = Check {
      allowed_properties: &cx.job.allowed_unrecognized_properties,
      allow_unrecognized: cx.job.allow_unrecognized_properties,
      allow_duplicates: cx.job.allow_duplicate_declarations,
      errors: &mut *cx.errors,
    };
    let mut controller = VisitController::new();
    controller.start_visit(cx.tree, &mut visitor);
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::compiler::test_util::parse_tree;
  use crate::job::JobDescription;

  fn run_with(source: &str, job: JobDescription) -> ErrorManager {
    let (mut tree, mut errors) = parse_tree(source);
    assert!(!errors.has_errors());
    let mut pass = CheckProperties;
    pass.run(&mut PassContext {
      tree: &mut tree,
      job: &job,
      errors: &mut errors,
      substitution_map: None,
    });
    errors
  }

  #[test]
  fn recognized_properties_pass() {
    let errors = run_with(".x { margin-left: 10px; -webkit-box-shadow: none; --custom: red; }", JobDescription::default());
    assert!(!errors.has_errors());
  }

  #[test]
  fn unknown_property_is_an_error() {
    let errors = run_with(".x { marginn: 10px; }", JobDescription::default());
    assert!(errors.has_errors());
    assert!(errors.errors().any(|d| d.message == "Unknown property \"marginn\""));
  }

  #[test]
  fn allowed_unrecognized_properties_pass() {
    let job = JobDescription {
      allowed_unrecognized_properties: vec!["marginn".into()],
      ..JobDescription::default()
    };
    assert!(!run_with(".x { marginn: 10px; }", job).has_errors());

    let job = JobDescription {
      allow_unrecognized_properties: true,
      ..JobDescription::default()
    };
    assert!(!run_with(".x { anything-at-all: 10px; }", job).has_errors());
  }

  #[test]
  fn exact_duplicates_warn_but_fallbacks_do_not() {
    let errors = run_with(".x { color: red; color: red; }", JobDescription::default());
    assert!(!errors.has_errors());
    assert!(errors.warnings().any(|d| d.message.contains("Duplicate declaration")));

    let errors = run_with(".x { background: #fff; background: rgba(255, 255, 255, 0.5); }", JobDescription::default());
    assert!(errors.warnings().count() == 0);
  }

  #[test]
  fn duplicates_can_be_allowed() {
    let job = JobDescription {
      allow_duplicate_declarations: true,
      ..JobDescription::default()
    };
    let errors = run_with(".x { color: red; color: red; }", job);
    assert_eq!(errors.warnings().count(), 0);
  }
}
