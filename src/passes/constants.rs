//! Constant definition collection and reference replacement.
//!
//! `@def` rules are collected (a later definition of the same name wins) and
//! stripped; every remaining constant reference is replaced by a deep copy
//! of the definition's value list, resolved transitively. Cycles and
//! undefined names are semantic errors; the job's compile-time constants
//! back any name without a `@def`.

use crate::controller::{VisitContext, VisitController};
use crate::diagnostics::ErrorManager;
use crate::location::SourceLocation;
use crate::passes::{Pass, PassContext};
use crate::tree::{NodeId, NodeKind, Tree};
use crate::visitor::TreeVisitor;
use ahash::AHashMap;

pub struct ReplaceConstants;

#[derive(Default)]
struct Collect {
  definitions: AHashMap<String, NodeId>,
}

impl TreeVisitor for Collect {
  fn enter_definition(&mut self, cx: &mut VisitContext) -> bool {
    if let NodeKind::Definition { name, .. } = cx.kind() {
      // Later definitions override earlier ones.
      self.definitions.insert(name.clone(), cx.node);
    }
    cx.remove_current_node();
    false
  }
}

enum ResolveFail {
  Undefined,
  Reported,
}

struct Substitute<'a> {
  definitions: &'a AHashMap<String, NodeId>,
  compile_constants: &'a AHashMap<String, i32>,
  allow_undefined: bool,
  errors: &'a mut ErrorManager,
}

impl<'a> Substitute<'a> {
  /// Fully resolved, detached copies of the values `name` stands for.
  fn resolve(
    &mut self,
    tree: &mut Tree,
    name: &str,
    loc: SourceLocation,
    visiting: &mut Vec<String>,
  ) -> Result<Vec<NodeId>, ResolveFail> {
    if visiting.iter().any(|n| n == name) {
      self
        .errors
        .report_error(format!("Cyclic @def reference \"{}\"", name), loc);
      return Err(ResolveFail::Reported);
    }
    if let Some(&definition) = self.definitions.get(name) {
      visiting.push(name.to_string());
      let values = tree.children(definition);
      let mut out = Vec::new();
      for value in values {
        match tree[value].kind.clone() {
          NodeKind::ConstantRef { name: inner } => {
            let inner_loc = tree[value].loc;
            let resolved = self.resolve(tree, &inner, inner_loc, visiting);
            match resolved {
              Ok(nodes) => out.extend(nodes),
              Err(ResolveFail::Undefined) => {
                self
                  .errors
                  .report_error(format!("Undefined constant \"{}\"", inner), inner_loc);
                visiting.pop();
                return Err(ResolveFail::Reported);
              }
              Err(ResolveFail::Reported) => {
                visiting.pop();
                return Err(ResolveFail::Reported);
              }
            }
          }
          _ => {
            let copy = tree.deep_copy(value);
            if self.resolve_within(tree, copy, visiting).is_err() {
              visiting.pop();
              return Err(ResolveFail::Reported);
            }
            out.push(copy);
          }
        }
      }
      visiting.pop();
      return Ok(out);
    }
    if let Some(&value) = self.compile_constants.get(name) {
      let node = tree.alloc(
        NodeKind::Numeric {
          value: value as f64,
          unit: String::new(),
        },
        loc,
      );
      return Ok(vec![node]);
    }
    Err(ResolveFail::Undefined)
  }

  /// Resolves constant references nested inside a detached copy (composite
  /// values, function arguments).
  fn resolve_within(&mut self, tree: &mut Tree, node: NodeId, visiting: &mut Vec<String>) -> Result<(), ()> {
    let mut i = 0;
    loop {
      let children = tree.children(node);
      if i >= children.len() {
        return Ok(());
      }
      let child = children[i];
      match tree[child].kind.clone() {
        NodeKind::ConstantRef { name } => {
          let loc = tree[child].loc;
          match self.resolve(tree, &name, loc, visiting) {
            Ok(nodes) => {
              let index = tree
                .list_index_of(node, child)
                .expect("constant reference outside a value list");
              tree.splice_list_children(node, index, &nodes);
              i += nodes.len();
            }
            Err(ResolveFail::Undefined) => {
              if self.allow_undefined {
                i += 1;
              } else {
                self.errors.report_error(format!("Undefined constant \"{}\"", name), loc);
                return Err(());
              }
            }
            Err(ResolveFail::Reported) => return Err(()),
          }
        }
        _ => {
          self.resolve_within(tree, child, visiting)?;
          i += 1;
        }
      }
    }
  }
}

impl<'a> TreeVisitor for Substitute<'a> {
  fn enter_constant_ref(&mut self, cx: &mut VisitContext) -> bool {
    let name = match cx.kind() {
      NodeKind::ConstantRef { name } => name.clone(),
      _ => unreachable!(),
    };
    let loc = cx.tree[cx.node].loc;
    let mut visiting = Vec::new();
    match self.resolve(cx.tree, &name, loc, &mut visiting) {
      Ok(nodes) => cx.replace_current_block_child_with(nodes, false),
      Err(ResolveFail::Undefined) => {
        if !self.allow_undefined {
          self.errors.report_error(format!("Undefined constant \"{}\"", name), loc);
        }
      }
      Err(ResolveFail::Reported) => {}
    }
    false
  }
}

impl Pass for ReplaceConstants {
  fn name(&self) -> &'static str {
    "replace-constants"
  }

  fn run(&mut self, cx: &mut PassContext) {
    let mut collect = Collect::default();
    let mut controller = VisitController::new();
    controller.start_mutating_visit(cx.tree, &mut collect);

    let mut substitute = Substitute {
      definitions: &collect.definitions,
      compile_constants: &cx.job.compile_constants,
      allow_undefined: cx.job.allow_undefined_constants,
      errors: &mut *cx.errors,
    };
    controller.start_mutating_visit(cx.tree, &mut substitute);
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
    let mut pass = ReplaceConstants;
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
  fn references_are_replaced_and_definitions_stripped() {
    let (out, errors) = run("@def BG #ebeff9;\nbody { background: BG; }");
    assert!(!errors.has_errors());
    assert!(out.contains("background: #ebeff9"));
    assert!(!out.contains("@def"));
  }

  #[test]
  fn multi_value_definitions_splice_into_the_value_list() {
    let (out, errors) = run("@def MARGIN 0 2px;\n.x { margin: MARGIN; }");
    assert!(!errors.has_errors());
    assert!(out.contains("margin: 0 2px"));
  }

  #[test]
  fn definitions_resolve_transitively() {
    let (out, errors) = run("@def A 10px;\n@def B A;\n.x { width: B; }");
    assert!(!errors.has_errors());
    assert!(out.contains("width: 10px"));
  }

  #[test]
  fn references_inside_function_arguments_resolve() {
    let (out, errors) = run("@def P 3px;\n@def W 180px;\n.x { margin-left: add(P, W, P); }");
    assert!(!errors.has_errors());
    assert!(out.contains("margin-left: add(3px, 180px, 3px)"));
  }

  #[test]
  fn later_definition_wins() {
    let (out, errors) = run("@def C red;\n@def C blue;\n.x { color: C; }");
    assert!(!errors.has_errors());
    assert!(out.contains("color: blue"));
  }

  #[test]
  fn undefined_constant_is_an_error() {
    let (_, errors) = run(".x { color: MISSING; }");
    assert!(errors.has_errors());
    assert!(errors.errors().any(|d| d.message.contains("Undefined constant \"MISSING\"")));
  }

  #[test]
  fn undefined_constants_can_be_tolerated() {
    let job = JobDescription {
      allow_undefined_constants: true,
      ..JobDescription::default()
    };
    let (out, errors) = run_with(".x { color: MISSING; }", job);
    assert!(!errors.has_errors());
    assert!(out.contains("color: MISSING"));
  }

  #[test]
  fn self_reference_is_an_error() {
    let (_, errors) = run("@def A A;\n.x { color: A; }");
    assert!(errors.has_errors());
    assert!(errors.errors().any(|d| d.message.contains("Cyclic @def reference")));
  }

  #[test]
  fn compile_constants_back_plain_names() {
    let mut compile_constants = AHashMap::new();
    compile_constants.insert("COLUMNS".to_string(), 12);
    let job = JobDescription {
      compile_constants,
      ..JobDescription::default()
    };
    let (out, errors) = run_with(".x { z-index: COLUMNS; }", job);
    assert!(!errors.has_errors());
    assert!(out.contains("z-index: 12"));
  }
}
