//! Selector specificity.
//!
//! Specificity is the `(b, c, d)` triple of CSS2.1 §6.4.3: id selectors
//! count into `b`, classes/attributes/pseudo-classes into `c`, and type
//! selectors/pseudo-elements into `d`. `:not(...)` contributes its inner
//! selector's specificity. Comparison is lexicographic.

use crate::tree::{NodeId, NodeKind, Tree};
use std::ops::Add;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Specificity {
  pub b: u32,
  pub c: u32,
  pub d: u32,
}

impl Specificity {
  pub const ZERO: Specificity = Specificity { b: 0, c: 0, d: 0 };

  pub const fn new(b: u32, c: u32, d: u32) -> Specificity {
    Specificity { b, c, d }
  }
}

impl Add for Specificity {
  type Output = Specificity;

  fn add(self, other: Specificity) -> Specificity {
    Specificity {
      b: self.b + other.b,
      c: self.c + other.c,
      d: self.d + other.d,
    }
  }
}

/// The specificity of the selector chain rooted at `selector` (a
/// [`NodeKind::Selector`] node), including everything reached through
/// combinators.
pub fn specificity(tree: &Tree, selector: NodeId) -> Specificity {
  let (name, refiners, combinator) = match &tree[selector].kind {
    NodeKind::Selector { name, refiners, combinator } => (name, *refiners, *combinator),
    kind => panic!("specificity of a non-selector node {:?}", kind.tag()),
  };

  let mut total = Specificity::ZERO;
  // The universal selector and an omitted element name contribute nothing.
  if !name.is_empty() && name != "*" {
    total.d += 1;
  }

  if let NodeKind::RefinerList { refiners } = &tree[refiners].kind {
    for &refiner in refiners {
      total = total + refiner_specificity(tree, refiner);
    }
  }

  if let Some(combinator) = combinator {
    if let NodeKind::Combinator { selector, .. } = &tree[combinator].kind {
      total = total + specificity(tree, *selector);
    }
  }

  total
}

fn refiner_specificity(tree: &Tree, refiner: NodeId) -> Specificity {
  match &tree[refiner].kind {
    NodeKind::IdRefiner { .. } => Specificity::new(1, 0, 0),
    NodeKind::ClassRefiner { .. } | NodeKind::AttributeRefiner { .. } => Specificity::new(0, 1, 0),
    NodeKind::PseudoClassRefiner { not_selector, .. } => match not_selector {
      // :not() itself does not count, its argument does.
      Some(inner) => specificity(tree, *inner),
      None => Specificity::new(0, 1, 0),
    },
    NodeKind::PseudoElementRefiner { .. } => Specificity::new(0, 0, 1),
    kind => panic!("specificity of a non-refiner node {:?}", kind.tag()),
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::location::SourceLocation;
  use crate::tree::{AttrOperator, CombinatorKind};

  fn loc() -> SourceLocation {
    SourceLocation::unknown()
  }

  struct SelectorBuilder<'a> {
    tree: &'a mut Tree,
  }

  impl<'a> SelectorBuilder<'a> {
    fn selector(&mut self, name: &str, refiners: Vec<NodeId>, combinator: Option<NodeId>) -> NodeId {
      let list = self.tree.alloc(NodeKind::RefinerList { refiners }, loc());
      self.tree.alloc(
        NodeKind::Selector {
          name: name.into(),
          refiners: list,
          combinator,
        },
        loc(),
      )
    }

    fn class(&mut self, name: &str) -> NodeId {
      self.tree.alloc(NodeKind::ClassRefiner { name: name.into() }, loc())
    }

    fn id(&mut self, name: &str) -> NodeId {
      self.tree.alloc(NodeKind::IdRefiner { name: name.into() }, loc())
    }
  }

  #[test]
  fn per_css21_examples() {
    let mut tree = Tree::new();
    let mut b = SelectorBuilder { tree: &mut tree };

    // li.red.level -> (0,2,1)
    let red = b.class("red");
    let level = b.class("level");
    let s = b.selector("li", vec![red, level], None);
    assert_eq!(specificity(b.tree, s), Specificity::new(0, 2, 1));

    // #x34y -> (1,0,0)
    let idr = b.id("x34y");
    let s = b.selector("", vec![idr], None);
    assert_eq!(specificity(b.tree, s), Specificity::new(1, 0, 0));

    // * -> (0,0,0)
    let s = b.selector("*", vec![], None);
    assert_eq!(specificity(b.tree, s), Specificity::ZERO);
  }

  #[test]
  fn combinators_sum_chain_parts() {
    let mut tree = Tree::new();
    let mut b = SelectorBuilder { tree: &mut tree };

    // ul ol li -> (0,0,3)
    let li = b.selector("li", vec![], None);
    let c2 = b.tree.alloc(
      NodeKind::Combinator {
        kind: CombinatorKind::Descendant,
        selector: li,
      },
      loc(),
    );
    let ol = b.selector("ol", vec![], Some(c2));
    let c1 = b.tree.alloc(
      NodeKind::Combinator {
        kind: CombinatorKind::Descendant,
        selector: ol,
      },
      loc(),
    );
    let ul = b.selector("ul", vec![], Some(c1));
    assert_eq!(specificity(b.tree, ul), Specificity::new(0, 0, 3));
  }

  #[test]
  fn not_contributes_its_argument() {
    let mut tree = Tree::new();
    let mut b = SelectorBuilder { tree: &mut tree };

    // div:not(.hidden) -> (0,1,1)
    let hidden = b.class("hidden");
    let inner = b.selector("", vec![hidden], None);
    let not = b.tree.alloc(
      NodeKind::PseudoClassRefiner {
        name: "not".into(),
        argument: None,
        not_selector: Some(inner),
      },
      loc(),
    );
    let s = b.selector("div", vec![not], None);
    assert_eq!(specificity(b.tree, s), Specificity::new(0, 1, 1));
  }

  #[test]
  fn attributes_and_pseudo_classes_count_as_classes() {
    let mut tree = Tree::new();
    let mut b = SelectorBuilder { tree: &mut tree };

    // input[type=text]:hover -> (0,2,1)
    let attr = b.tree.alloc(
      NodeKind::AttributeRefiner {
        name: "type".into(),
        operator: Some(AttrOperator::Equals),
        value: Some("text".into()),
      },
      loc(),
    );
    let hover = b.tree.alloc(
      NodeKind::PseudoClassRefiner {
        name: "hover".into(),
        argument: None,
        not_selector: None,
      },
      loc(),
    );
    let s = b.selector("input", vec![attr, hover], None);
    assert_eq!(specificity(b.tree, s), Specificity::new(0, 2, 1));
  }

  #[test]
  fn ordering_is_lexicographic() {
    assert!(Specificity::new(1, 0, 0) > Specificity::new(0, 9, 9));
    assert!(Specificity::new(0, 1, 0) > Specificity::new(0, 0, 9));
  }
}
