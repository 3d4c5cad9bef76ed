//! Mixin expansion.
//!
//! `@defmixin` definitions are collected and stripped; each `@mixin`
//! reference is replaced by a deep copy of the definition's declarations
//! with formal parameters substituted by the call's arguments. Nested mixin
//! references inside a definition expand recursively, with cycle detection.

use crate::controller::{VisitContext, VisitController};
use crate::diagnostics::ErrorManager;
use crate::location::SourceLocation;
use crate::passes::{Pass, PassContext};
use crate::tree::{NodeId, NodeKind, Tree};
use crate::visitor::TreeVisitor;
use ahash::AHashMap;

pub struct ExpandMixins;

#[derive(Default)]
struct Collect {
  definitions: AHashMap<String, NodeId>,
  duplicates: Vec<(String, SourceLocation)>,
}

impl TreeVisitor for Collect {
  fn enter_mixin_definition(&mut self, cx: &mut VisitContext) -> bool {
    if let NodeKind::MixinDefinition { name, .. } = cx.kind() {
      let name = name.clone();
      if self.definitions.contains_key(&name) {
        self.duplicates.push((name, cx.tree[cx.node].loc));
      } else {
        self.definitions.insert(name, cx.node);
      }
    }
    // The definition is detached but stays in the arena for copying.
    cx.remove_current_node();
    false
  }
}

struct Expand<'a> {
  definitions: &'a AHashMap<String, NodeId>,
  errors: &'a mut ErrorManager,
}

impl<'a> Expand<'a> {
  /// Produces the declarations `@mixin name(args)` expands to. `args` are
  /// borrowed as substitution sources and deep-copied per use.
  fn expand(
    &mut self,
    tree: &mut Tree,
    name: &str,
    args: &[NodeId],
    loc: SourceLocation,
    stack: &mut Vec<String>,
  ) -> Result<Vec<NodeId>, ()> {
    if stack.iter().any(|n| n == name) {
      self.errors.report_error(format!("Cyclic @mixin reference \"{}\"", name), loc);
      return Err(());
    }
    let definition = match self.definitions.get(name) {
      Some(id) => *id,
      None => {
        self.errors.report_error(format!("Undefined mixin \"{}\"", name), loc);
        return Err(());
      }
    };
    let (params, block) = match &tree[definition].kind {
      NodeKind::MixinDefinition { params, block, .. } => (params.clone(), *block),
      _ => unreachable!(),
    };
    if params.len() != args.len() {
      self.errors.report_error(
        format!("Mixin \"{}\" expects {} arguments, got {}", name, params.len(), args.len()),
        loc,
      );
      return Err(());
    }
    let env: AHashMap<String, NodeId> = params.into_iter().zip(args.iter().copied()).collect();

    stack.push(name.to_string());
    let mut out = Vec::new();
    for child in tree.children(block) {
      match tree[child].kind.clone() {
        NodeKind::Mixin { name: inner, args: inner_args } => {
          // Arguments of a nested reference may mention the formal
          // parameters; substitute into copies before expanding.
          let mut copied_args = Vec::with_capacity(inner_args.len());
          for arg in inner_args {
            let copy = tree.deep_copy(arg);
            let copy = substitute_node(tree, copy, &env);
            copied_args.push(copy);
          }
          let inner_loc = tree[child].loc;
          let expanded = self.expand(tree, &inner, &copied_args, inner_loc, stack)?;
          out.extend(expanded);
        }
        _ => {
          let copy = tree.deep_copy(child);
          substitute_children(tree, copy, &env);
          out.push(copy);
        }
      }
    }
    stack.pop();
    Ok(out)
  }
}

/// Replaces constant references matching a formal parameter inside the
/// (detached) subtree rooted at `node`.
fn substitute_children(tree: &mut Tree, node: NodeId, env: &AHashMap<String, NodeId>) {
  let mut i = 0;
  loop {
    let children = tree.children(node);
    if i >= children.len() {
      break;
    }
    let child = children[i];
    let replacement = match &tree[child].kind {
      NodeKind::ConstantRef { name } => env.get(name).copied(),
      _ => None,
    };
    match replacement {
      Some(source) => {
        let copy = tree.deep_copy(source);
        let index = tree
          .list_index_of(node, child)
          .expect("constant reference outside a value list");
        tree.splice_list_children(node, index, &[copy]);
      }
      None => substitute_children(tree, child, env),
    }
    i += 1;
  }
}

/// Like [`substitute_children`], but also substitutes when the node itself
/// is a matching reference.
fn substitute_node(tree: &mut Tree, node: NodeId, env: &AHashMap<String, NodeId>) -> NodeId {
  if let NodeKind::ConstantRef { name } = &tree[node].kind {
    if let Some(source) = env.get(name) {
      return tree.deep_copy(*source);
    }
  }
  substitute_children(tree, node, env);
  node
}

impl<'a> TreeVisitor for Expand<'a> {
  fn enter_mixin(&mut self, cx: &mut VisitContext) -> bool {
    let (name, args) = match cx.kind() {
      NodeKind::Mixin { name, args } => (name.clone(), args.clone()),
      _ => unreachable!(),
    };
    let loc = cx.tree[cx.node].loc;
    let mut stack = Vec::new();
    match self.expand(cx.tree, &name, &args, loc, &mut stack) {
      Ok(declarations) => cx.replace_current_block_child_with(declarations, false),
      Err(()) => cx.remove_current_node(),
    }
    false
  }
}

impl Pass for ExpandMixins {
  fn name(&self) -> &'static str {
    "expand-mixins"
  }

  fn run(&mut self, cx: &mut PassContext) {
    let mut collect = Collect::default();
    let mut controller = VisitController::new();
    controller.start_mutating_visit(cx.tree, &mut collect);
    for (name, loc) in &collect.duplicates {
      cx.errors.report_error(format!("Duplicate @defmixin \"{}\"", name), *loc);
    }
    let mut expand = Expand {
      definitions: &collect.definitions,
      errors: &mut *cx.errors,
    };
    controller.start_mutating_visit(cx.tree, &mut expand);
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
    let mut pass = ExpandMixins;
    pass.run(&mut PassContext {
      tree: &mut tree,
      job: &job,
      errors: &mut errors,
      substitution_map: None,
    });
    (pretty(&tree), errors)
  }

  #[test]
  fn mixin_expands_with_parameter_substitution() {
    let (out, errors) = run(
      "@defmixin size(W, H) { width: W; height: H; }\n.box { @mixin size(100px, 30px); color: red; }",
    );
    assert!(!errors.has_errors());
    assert!(out.contains("width: 100px"));
    assert!(out.contains("height: 30px"));
    assert!(out.contains("color: red"));
    assert!(!out.contains("@defmixin"));
    assert!(!out.contains("@mixin"));
  }

  #[test]
  fn parameters_substitute_inside_function_arguments() {
    let (out, errors) = run("@defmixin pad(P) { padding: add(P, 2px); }\n.x { @mixin pad(3px); }");
    assert!(!errors.has_errors());
    assert!(out.contains("padding: add(3px, 2px)"));
  }

  #[test]
  fn nested_mixins_expand_recursively() {
    let (out, errors) = run(
      "@defmixin inner(C) { color: C; }\n@defmixin outer(C) { @mixin inner(C); margin: 0; }\n.x { @mixin outer(red); }",
    );
    assert!(!errors.has_errors());
    assert!(out.contains("color: red"));
    assert!(out.contains("margin: 0"));
  }

  #[test]
  fn undefined_mixin_is_an_error() {
    let (_, errors) = run(".x { @mixin missing(1px); }");
    assert!(errors.has_errors());
    assert!(errors.errors().any(|d| d.message.contains("Undefined mixin \"missing\"")));
  }

  #[test]
  fn arity_mismatch_is_an_error() {
    let (_, errors) = run("@defmixin pad(A, B) { padding: A B; }\n.x { @mixin pad(1px); }");
    assert!(errors.has_errors());
    assert!(errors.errors().any(|d| d.message.contains("expects 2 arguments, got 1")));
  }

  #[test]
  fn cyclic_mixins_are_an_error() {
    let (_, errors) = run(
      "@defmixin a() { @mixin b(); }\n@defmixin b() { @mixin a(); }\n.x { @mixin a(); }",
    );
    assert!(errors.has_errors());
    assert!(errors.errors().any(|d| d.message.contains("Cyclic @mixin")));
  }
}
