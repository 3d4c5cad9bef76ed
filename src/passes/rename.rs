//! Class renaming.
//!
//! Rewrites every class refiner through the job's substitution map chain.
//! Excluded classes keep their names and stay out of the recorded map.

use crate::controller::{VisitContext, VisitController};
use crate::passes::{Pass, PassContext};
use crate::renaming::{RecordingSubstitutionMap, SubstitutionMap};
use crate::tree::NodeKind;
use crate::visitor::TreeVisitor;

pub struct RenameClasses;

struct Rename<'a> {
  map: &'a mut RecordingSubstitutionMap,
  excluded: &'a [String],
}

impl<'a> TreeVisitor for Rename<'a> {
  fn enter_class_refiner(&mut self, cx: &mut VisitContext) -> bool {
    let name = match cx.kind() {
      NodeKind::ClassRefiner { name } => name.clone(),
      _ => unreachable!(),
    };
    if self.excluded.iter().any(|e| e == &name) {
      return false;
    }
    let renamed = self.map.get(&name);
    if let NodeKind::ClassRefiner { name: slot } = cx.kind_mut() {
      *slot = renamed;
    }
    false
  }
}

impl Pass for RenameClasses {
  fn name(&self) -> &'static str {
    "rename-classes"
  }

  fn run(&mut self, cx: &mut PassContext) {
    let map = match cx.substitution_map.as_deref_mut() {
      Some(map) => map,
      None => return,
    };
    let mut visitor = Rename {
      map,
      excluded: &cx.job.excluded_classes_from_renaming,
    };
    let mut controller = VisitController::new();
    controller.start_visit(cx.tree, &mut visitor);
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::compiler::test_util::{parse_tree, pretty};
  use crate::job::{JobDescription, RenamingType};

  fn run(source: &str, job: JobDescription) -> (String, RecordingSubstitutionMap) {
    let (mut tree, mut errors) = parse_tree(source);
    assert!(!errors.has_errors());
    let mut map = job.substitution_map().unwrap();
    let mut pass = RenameClasses;
    pass.run(&mut PassContext {
      tree: &mut tree,
      job: &job,
      errors: &mut errors,
      substitution_map: Some(&mut map),
    });
    (pretty(&tree), map)
  }

  #[test]
  fn classes_rename_hyphen_wise_in_first_use_order() {
    let job = JobDescription {
      renaming: RenamingType::Closure,
      ..JobDescription::default()
    };
    let (out, map) = run(".dialog-content { padding: 10px; }\n.dialog-title { font-weight: bold; }", job);
    assert!(out.contains(".a-b"));
    assert!(out.contains(".a-c"));
    assert_eq!(map.mappings().get("dialog-content").unwrap(), "a-b");
    assert_eq!(map.mappings().get("dialog-title").unwrap(), "a-c");
  }

  #[test]
  fn excluded_classes_keep_their_names() {
    let job = JobDescription {
      renaming: RenamingType::Closure,
      excluded_classes_from_renaming: vec!["keep".into()],
      ..JobDescription::default()
    };
    let (out, map) = run(".keep { color: red; }\n.rename-me { color: blue; }", job);
    assert!(out.contains(".keep"));
    assert!(out.contains(".a-b"));
    assert!(map.mappings().get("keep").is_none());
  }

  #[test]
  fn debug_renaming_appends_underscores() {
    let job = JobDescription {
      renaming: RenamingType::Debug,
      ..JobDescription::default()
    };
    let (out, _) = run(".dialog { color: red; }", job);
    assert!(out.contains(".dialog_"));
  }
}
