//! The visit controller.
//!
//! Drives a [`TreeVisitor`] over a [`Tree`] with an explicit frame stack.
//! In mutating mode the visitor may, from inside a hook, request that the
//! current node be removed or replaced by a sequence of nodes; the request
//! is pended on the current frame and resolved after the hook returns.
//!
//! Removal and replacement target the innermost list-bearing ancestor of the
//! current node. After a removal the ancestor's iteration resumes at the
//! former successor, and the removed node's leave hook never fires. After a
//! replacement, iteration either re-enters the first replacement node
//! (`revisit = true`) or skips past all of them (`revisit = false`).

use crate::tree::{CompositeOperator, NodeId, NodeKind, Tree};
use crate::visitor::{dispatch_enter, dispatch_leave, TreeVisitor};
use smallvec::SmallVec;

enum Action {
  Remove,
  Replace { nodes: Vec<NodeId>, revisit: bool },
  Stop,
}

struct PendingActions {
  mutating: bool,
  action: Option<Action>,
}

impl PendingActions {
  fn new(mutating: bool) -> PendingActions {
    PendingActions { mutating, action: None }
  }

  fn set(&mut self, action: Action) {
    assert!(
      self.mutating || matches!(action, Action::Stop),
      "structural mutation requested during a read-only visit"
    );
    assert!(self.action.is_none(), "conflicting mutation requests from one visitor hook");
    self.action = Some(action);
  }
}

/// What a visitor hook sees: the tree, the node whose hook is running, and
/// the channel for mutation requests.
pub struct VisitContext<'a> {
  pub tree: &'a mut Tree,
  pub node: NodeId,
  actions: &'a mut PendingActions,
}

impl<'a> VisitContext<'a> {
  pub fn kind(&self) -> &NodeKind {
    &self.tree[self.node].kind
  }

  pub fn kind_mut(&mut self) -> &mut NodeKind {
    let node = self.node;
    &mut self.tree[node].kind
  }

  /// Detaches the current node. Its leave hook will not fire; traversal
  /// resumes at its former successor in the innermost list-bearing ancestor.
  pub fn remove_current_node(&mut self) {
    self.actions.set(Action::Remove);
  }

  /// Replaces the current node (as a child of its innermost list-bearing
  /// ancestor) with `nodes`. With `revisit` the first replacement node is
  /// entered next; otherwise traversal advances past all of them.
  pub fn replace_current_block_child_with(&mut self, nodes: Vec<NodeId>, revisit: bool) {
    self.actions.set(Action::Replace { nodes, revisit });
  }

  /// Abandons the traversal. The controller unwinds cooperatively and
  /// returns normally.
  pub fn stop_visit(&mut self) {
    self.actions.set(Action::Stop);
  }
}

#[derive(Debug, Clone, Copy)]
enum Phase {
  Enter,
  /// Next child index to descend into.
  Child(usize),
  Leave,
}

#[derive(Debug, Clone, Copy)]
struct Frame {
  node: NodeId,
  phase: Phase,
}

#[derive(Default)]
pub struct VisitController {
  stack: SmallVec<[Frame; 16]>,
}

impl VisitController {
  pub fn new() -> VisitController {
    VisitController::default()
  }

  /// Drives `visitor` over the whole tree. Structural mutation requests
  /// panic; payload edits through the context are allowed.
  pub fn start_visit<V: TreeVisitor + ?Sized>(&mut self, tree: &mut Tree, visitor: &mut V) {
    let root = tree.root();
    self.visit(tree, root, visitor, false);
  }

  /// Drives `visitor` over the whole tree, honoring mutation requests.
  pub fn start_mutating_visit<V: TreeVisitor + ?Sized>(&mut self, tree: &mut Tree, visitor: &mut V) {
    let root = tree.root();
    self.visit(tree, root, visitor, true);
  }

  /// Drives `visitor` over the subtree rooted at `node`.
  pub fn start_mutating_visit_at<V: TreeVisitor + ?Sized>(&mut self, tree: &mut Tree, node: NodeId, visitor: &mut V) {
    self.visit(tree, node, visitor, true);
  }

  fn visit<V: TreeVisitor + ?Sized>(&mut self, tree: &mut Tree, root: NodeId, visitor: &mut V, mutating: bool) {
    self.stack.clear();
    self.stack.push(Frame {
      node: root,
      phase: Phase::Enter,
    });

    while let Some(&Frame { node, phase }) = self.stack.last() {
      match phase {
        Phase::Enter => {
          let mut actions = PendingActions::new(mutating);
          let descend = {
            let mut cx = VisitContext {
              tree,
              node,
              actions: &mut actions,
            };
            dispatch_enter(visitor, &mut cx)
          };
          match actions.action {
            None => {
              let top = self.stack.last_mut().unwrap();
              top.phase = if descend { Phase::Child(0) } else { Phase::Leave };
            }
            Some(Action::Stop) => {
              self.stack.clear();
              return;
            }
            Some(Action::Remove) => self.remove_current(tree),
            Some(Action::Replace { nodes, revisit }) => self.replace_current(tree, nodes, revisit),
          }
        }
        Phase::Child(index) => {
          // Children are re-read from the tree on every step, so insertion
          // during iteration is observed.
          let children = tree.children(node);
          if index < children.len() {
            self.stack.last_mut().unwrap().phase = Phase::Child(index + 1);
            self.stack.push(Frame {
              node: children[index],
              phase: Phase::Enter,
            });
          } else {
            self.stack.last_mut().unwrap().phase = Phase::Leave;
          }
        }
        Phase::Leave => {
          let mut actions = PendingActions::new(mutating);
          {
            let mut cx = VisitContext {
              tree,
              node,
              actions: &mut actions,
            };
            dispatch_leave(visitor, &mut cx);
          }
          match actions.action {
            None => {
              self.stack.pop();
            }
            Some(Action::Stop) => {
              self.stack.clear();
              return;
            }
            Some(Action::Remove) => self.remove_current(tree),
            Some(Action::Replace { nodes, revisit }) => self.replace_current(tree, nodes, revisit),
          }
        }
      }
    }
  }

  /// Detaches the current node from the innermost list-bearing ancestor on
  /// the stack and repositions that ancestor's iteration at the former
  /// successor. Frames between the ancestor and the current node are
  /// discarded without their leave hooks.
  fn remove_current(&mut self, tree: &mut Tree) {
    let mut level = self.stack.len() - 1;
    while level > 0 {
      let parent = self.stack[level - 1].node;
      let child = self.stack[level].node;
      if let Some(index) = tree.list_index_of(parent, child) {
        tree.remove_list_child(parent, index);
        self.stack.truncate(level);
        self.stack[level - 1].phase = Phase::Child(index);
        return;
      }
      level -= 1;
    }
    panic!("remove_current_node: the current node has no list-bearing ancestor");
  }

  fn replace_current(&mut self, tree: &mut Tree, nodes: Vec<NodeId>, revisit: bool) {
    let mut level = self.stack.len() - 1;
    while level > 0 {
      let parent = self.stack[level - 1].node;
      let child = self.stack[level].node;
      if let Some(index) = tree.list_index_of(parent, child) {
        let replacement = flatten_replacement(tree, parent, nodes);
        tree.splice_list_children(parent, index, &replacement);
        self.stack.truncate(level);
        self.stack[level - 1].phase = Phase::Child(if revisit { index } else { index + replacement.len() });
        return;
      }
      level -= 1;
    }
    panic!("replace_current_block_child_with: the current node has no list-bearing ancestor");
  }
}

/// When a single composite replaces a child of a list whose natural separator
/// matches the composite's operator, its children are grafted in place of the
/// composite itself, avoiding a nested group in the output.
fn flatten_replacement(tree: &mut Tree, parent: NodeId, nodes: Vec<NodeId>) -> Vec<NodeId> {
  if nodes.len() == 1 {
    if let NodeKind::Composite {
      operator,
      parenthesized: false,
      ..
    } = tree[nodes[0]].kind
    {
      let natural = match &tree[parent].kind {
        NodeKind::PropertyValue { .. } => Some(CompositeOperator::Space),
        NodeKind::Composite { operator: parent_op, .. } => Some(*parent_op),
        _ => None,
      };
      if natural == Some(operator) {
        return tree.take_list_children(nodes[0]);
      }
    }
  }
  nodes
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::location::SourceLocation;
  use crate::tree::{NodeKind, NodeTag};

  fn loc() -> SourceLocation {
    SourceLocation::unknown()
  }

  /// Records enter/leave events for literal values and runs a configurable
  /// action the first time a matching literal is entered.
  #[derive(Default)]
  struct LiteralVisitor {
    events: Vec<String>,
    target: String,
    action: Option<TestAction>,
  }

  enum TestAction {
    Remove,
    Replace(Vec<&'static str>, bool),
    ReplaceWithComposite(CompositeOperator, Vec<&'static str>, bool),
    Stop,
  }

  impl TreeVisitor for LiteralVisitor {
    fn enter_literal(&mut self, cx: &mut VisitContext) -> bool {
      let text = match cx.kind() {
        NodeKind::Literal { text } => text.clone(),
        _ => unreachable!(),
      };
      self.events.push(format!("enter {}", text));
      if text == self.target {
        match self.action.take() {
          Some(TestAction::Remove) => cx.remove_current_node(),
          Some(TestAction::Replace(texts, revisit)) => {
            let nodes = texts
              .iter()
              .map(|t| cx.tree.alloc(NodeKind::Literal { text: (*t).into() }, SourceLocation::unknown()))
              .collect();
            cx.replace_current_block_child_with(nodes, revisit);
          }
          Some(TestAction::ReplaceWithComposite(operator, texts, revisit)) => {
            let values = texts
              .iter()
              .map(|t| cx.tree.alloc(NodeKind::Literal { text: (*t).into() }, SourceLocation::unknown()))
              .collect();
            let composite = cx.tree.alloc(
              NodeKind::Composite {
                operator,
                values,
                parenthesized: false,
              },
              SourceLocation::unknown(),
            );
            cx.replace_current_block_child_with(vec![composite], revisit);
          }
          Some(TestAction::Stop) => cx.stop_visit(),
          None => {}
        }
      }
      true
    }

    fn leave_literal(&mut self, cx: &mut VisitContext) {
      if let NodeKind::Literal { text } = cx.kind() {
        self.events.push(format!("leave {}", text));
      }
    }
  }

  fn value_list(tree: &mut Tree, texts: &[&str]) -> NodeId {
    let values = texts
      .iter()
      .map(|t| tree.alloc(NodeKind::Literal { text: (*t).into() }, loc()))
      .collect();
    tree.alloc(NodeKind::PropertyValue { values }, loc())
  }

  fn run(tree: &mut Tree, node: NodeId, visitor: &mut LiteralVisitor) {
    let mut controller = VisitController::new();
    controller.start_mutating_visit_at(tree, node, visitor);
  }

  #[test]
  fn removing_the_current_node_skips_its_leave_and_visits_the_successor() {
    let mut tree = Tree::new();
    let value = value_list(&mut tree, &["a", "b", "c"]);
    let mut visitor = LiteralVisitor {
      target: "b".into(),
      action: Some(TestAction::Remove),
      ..Default::default()
    };
    run(&mut tree, value, &mut visitor);
    assert_eq!(
      visitor.events,
      vec!["enter a", "leave a", "enter b", "enter c", "leave c"]
    );
    assert_eq!(tree.list_len(value), 2);
  }

  #[test]
  fn replacement_with_revisit_enters_the_first_replacement_next() {
    let mut tree = Tree::new();
    let value = value_list(&mut tree, &["a", "b", "c"]);
    let mut visitor = LiteralVisitor {
      target: "b".into(),
      action: Some(TestAction::Replace(vec!["x", "y"], true)),
      ..Default::default()
    };
    run(&mut tree, value, &mut visitor);
    assert_eq!(
      visitor.events,
      vec![
        "enter a", "leave a", "enter b", "enter x", "leave x", "enter y", "leave y", "enter c", "leave c"
      ]
    );
  }

  #[test]
  fn replacement_without_revisit_skips_the_replacement_nodes() {
    let mut tree = Tree::new();
    let value = value_list(&mut tree, &["a", "b", "c"]);
    let mut visitor = LiteralVisitor {
      target: "b".into(),
      action: Some(TestAction::Replace(vec!["x", "y"], false)),
      ..Default::default()
    };
    run(&mut tree, value, &mut visitor);
    assert_eq!(
      visitor.events,
      vec!["enter a", "leave a", "enter b", "enter c", "leave c"]
    );
    assert_eq!(tree.list_len(value), 4);
  }

  #[test]
  fn space_composite_replacement_is_flattened_into_a_property_value() {
    let mut tree = Tree::new();
    let value = value_list(&mut tree, &["a", "b"]);
    let mut visitor = LiteralVisitor {
      target: "a".into(),
      action: Some(TestAction::ReplaceWithComposite(CompositeOperator::Space, vec!["x", "y"], false)),
      ..Default::default()
    };
    run(&mut tree, value, &mut visitor);
    // The composite itself must not appear as a child.
    let children = tree.children(value);
    assert_eq!(children.len(), 3);
    for child in children {
      assert_eq!(tree[child].kind.tag(), NodeTag::Literal);
    }
  }

  #[test]
  fn comma_composite_is_not_flattened_into_a_property_value() {
    let mut tree = Tree::new();
    let value = value_list(&mut tree, &["a"]);
    let mut visitor = LiteralVisitor {
      target: "a".into(),
      action: Some(TestAction::ReplaceWithComposite(CompositeOperator::Comma, vec!["x", "y"], false)),
      ..Default::default()
    };
    run(&mut tree, value, &mut visitor);
    let children = tree.children(value);
    assert_eq!(children.len(), 1);
    assert_eq!(tree[children[0]].kind.tag(), NodeTag::Composite);
  }

  #[test]
  fn stop_visit_abandons_the_traversal() {
    let mut tree = Tree::new();
    let value = value_list(&mut tree, &["a", "b", "c"]);
    let mut visitor = LiteralVisitor {
      target: "a".into(),
      action: Some(TestAction::Stop),
      ..Default::default()
    };
    run(&mut tree, value, &mut visitor);
    assert_eq!(visitor.events, vec!["enter a"]);
  }

  #[test]
  #[should_panic(expected = "read-only visit")]
  fn structural_mutation_in_read_only_mode_panics() {
    let mut tree = Tree::new();
    let value = value_list(&mut tree, &["a"]);
    let body = tree.body();

    struct Bad;
    impl TreeVisitor for Bad {
      fn enter_literal(&mut self, cx: &mut VisitContext) -> bool {
        cx.remove_current_node();
        true
      }
    }

    // Literals are unreachable from the root here, so hang the value off a
    // ruleset to make the traversal see it.
    let prop = tree.alloc(NodeKind::Property { name: "color".into() }, loc());
    let decl = tree.alloc(
      NodeKind::Declaration {
        property: prop,
        value,
        star_hack: false,
      },
      loc(),
    );
    let decls = tree.alloc(NodeKind::DeclarationBlock { children: vec![decl] }, loc());
    let selectors = tree.alloc(NodeKind::SelectorList { selectors: vec![] }, loc());
    let ruleset = tree.alloc(
      NodeKind::Ruleset {
        selectors,
        declarations: decls,
      },
      loc(),
    );
    tree.append_child(body, ruleset);

    let mut controller = VisitController::new();
    controller.start_visit(&mut tree, &mut Bad);
  }

  #[test]
  fn removal_propagates_to_the_innermost_list_bearing_ancestor() {
    // Removing the Property of a declaration must remove the whole
    // declaration from its declaration block.
    let mut tree = Tree::new();
    let value = value_list(&mut tree, &["red"]);
    let prop = tree.alloc(NodeKind::Property { name: "color".into() }, loc());
    let decl = tree.alloc(
      NodeKind::Declaration {
        property: prop,
        value,
        star_hack: false,
      },
      loc(),
    );
    let other_value = value_list(&mut tree, &["10px"]);
    let other_prop = tree.alloc(NodeKind::Property { name: "width".into() }, loc());
    let other = tree.alloc(
      NodeKind::Declaration {
        property: other_prop,
        value: other_value,
        star_hack: false,
      },
      loc(),
    );
    let decls = tree.alloc(
      NodeKind::DeclarationBlock {
        children: vec![decl, other],
      },
      loc(),
    );

    struct RemoveProperty {
      visited_after: Vec<String>,
    }
    impl TreeVisitor for RemoveProperty {
      fn enter_property(&mut self, cx: &mut VisitContext) -> bool {
        if matches!(cx.kind(), NodeKind::Property { name } if name == "color") {
          cx.remove_current_node();
        }
        true
      }

      fn enter_declaration(&mut self, cx: &mut VisitContext) -> bool {
        if let NodeKind::Declaration { property, .. } = cx.kind() {
          if let NodeKind::Property { name } = &cx.tree[*property].kind {
            self.visited_after.push(name.clone());
          }
        }
        true
      }
    }

    let mut visitor = RemoveProperty { visited_after: vec![] };
    let mut controller = VisitController::new();
    controller.start_mutating_visit_at(&mut tree, decls, &mut visitor);
    assert_eq!(visitor.visited_after, vec!["color", "width"]);
    assert_eq!(tree.list_len(decls), 1);
    assert_eq!(tree.parent(decl), None);
  }
}
