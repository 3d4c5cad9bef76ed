//! Bidirectional (LTR/RTL) flipping.
//!
//! Property names swap their `left`/`right` segments, direction-sensitive
//! keyword values swap sides, and four-value positional shorthands swap
//! their 2nd and 4th values. A `/* @noflip */` comment on a declaration or
//! its ruleset suppresses flipping for that subtree.

use crate::controller::{VisitContext, VisitController};
use crate::passes::{Pass, PassContext};
use crate::properties;
use crate::tree::{FunctionTag, NodeId, NodeKind, NodeTag, Tree};
use crate::visitor::TreeVisitor;

pub struct FlipRtl;

struct Flip {
  swap_ltr_rtl_in_url: bool,
  swap_left_right_in_url: bool,
}

fn has_noflip(tree: &Tree, id: NodeId) -> bool {
  tree[id].comments.iter().any(|c| c.has_annotation("noflip"))
}

fn flip_segment(segment: &str) -> &str {
  match segment {
    "left" => "right",
    "right" => "left",
    other => other,
  }
}

fn flip_property_name(name: &str) -> String {
  name.split('-').map(flip_segment).collect::<Vec<_>>().join("-")
}

/// Properties whose keyword values swap sides.
fn flips_keyword_values(base: &str) -> bool {
  matches!(
    base,
    "float" | "clear" | "text-align" | "caption-side" | "background" | "background-position"
  )
}

fn flip_keyword(tree: &mut Tree, id: NodeId, from: &str, to: &str) {
  if let NodeKind::Literal { text } = &mut tree[id].kind {
    if text == from {
      *text = to.to_string();
    } else if text == to {
      *text = from.to_string();
    }
  }
}

fn swap_in_string(value: &str, a: &str, b: &str) -> String {
  // Two-way swap without double substitution.
  let marker = '\u{0}';
  let tmp: String = value.replace(a, &format!("{}{}", marker, a));
  tmp
    .replace(b, a)
    .replace(&format!("{}{}", marker, a), b)
}

impl Flip {
  fn flip_urls(&self, tree: &mut Tree, node: NodeId) {
    let children = tree.children(node);
    for child in children {
      if let NodeKind::Function { tag: FunctionTag::Url, args } = &tree[child].kind {
        if let Some(&arg) = args.first() {
          if let NodeKind::StringValue { value } = &tree[arg].kind {
            let mut value = value.clone();
            if self.swap_ltr_rtl_in_url {
              value = swap_in_string(&value, "ltr", "rtl");
            }
            if self.swap_left_right_in_url {
              value = swap_in_string(&value, "left", "right");
            }
            if let NodeKind::StringValue { value: slot } = &mut tree[arg].kind {
              *slot = value;
            }
          }
        }
      } else {
        self.flip_urls(tree, child);
      }
    }
  }
}

impl TreeVisitor for Flip {
  fn enter_ruleset(&mut self, cx: &mut VisitContext) -> bool {
    !has_noflip(cx.tree, cx.node)
  }

  fn enter_declaration(&mut self, cx: &mut VisitContext) -> bool {
    if has_noflip(cx.tree, cx.node) {
      return false;
    }
    let (property, value) = match cx.kind() {
      NodeKind::Declaration { property, value, .. } => (*property, *value),
      _ => unreachable!(),
    };
    let name = match &cx.tree[property].kind {
      NodeKind::Property { name } => name.clone(),
      _ => unreachable!(),
    };

    let flipped = flip_property_name(&name);
    if flipped != name {
      if let NodeKind::Property { name: slot } = &mut cx.tree[property].kind {
        *slot = flipped.clone();
      }
    }

    let base = properties::lookup_prefixed(&name).map(|(_, info)| info.name).unwrap_or(&name);
    let values = cx.tree.children(value);

    if base == "direction" {
      for &v in &values {
        flip_keyword(cx.tree, v, "ltr", "rtl");
      }
    } else if flips_keyword_values(base) {
      for &v in &values {
        flip_keyword(cx.tree, v, "left", "right");
      }
    }

    // Four-value box syntax: top right bottom left -> top left bottom right.
    if properties::lookup_prefixed(&name).map_or(false, |(_, info)| info.has_positional_values()) {
      let positional: Vec<usize> = values
        .iter()
        .enumerate()
        .filter(|(_, &v)| cx.tree[v].kind.tag() != NodeTag::Priority)
        .map(|(i, _)| i)
        .collect();
      if positional.len() == 4 {
        cx.tree.swap_list_children(value, positional[1], positional[3]);
      }
    }

    if self.swap_ltr_rtl_in_url || self.swap_left_right_in_url {
      self.flip_urls(cx.tree, value);
    }
    false
  }
}

impl Pass for FlipRtl {
  fn name(&self) -> &'static str {
    "flip-rtl"
  }

  fn run(&mut self, cx: &mut PassContext) {
    let mut visitor = Flip {
      swap_ltr_rtl_in_url: cx.job.swap_ltr_rtl_in_url && cx.job.use_internal_bidi_flipper,
      swap_left_right_in_url: cx.job.swap_left_right_in_url && cx.job.use_internal_bidi_flipper,
    };
    let mut controller = VisitController::new();
    controller.start_mutating_visit(cx.tree, &mut visitor);
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::compiler::test_util::{parse_tree, pretty};
  use crate::job::JobDescription;

  fn run_with(source: &str, job: JobDescription) -> String {
    let (mut tree, mut errors) = parse_tree(source);
    assert!(!errors.has_errors());
    let mut pass = FlipRtl;
    pass.run(&mut PassContext {
      tree: &mut tree,
      job: &job,
      errors: &mut errors,
      substitution_map: None,
    });
    pretty(&tree)
  }

  fn run(source: &str) -> String {
    run_with(source, JobDescription::default())
  }

  #[test]
  fn sided_property_names_swap() {
    let out = run(".logo { margin-left: 10px; }");
    assert!(out.contains("margin-right: 10px"));
    let out = run(".x { border-right: 2px solid #ccc; }");
    assert!(out.contains("border-left: 2px solid #ccc"));
  }

  #[test]
  fn four_value_positional_shorthands_swap_sides() {
    let out = run(".x { padding: 0 2px 0 4px; }");
    assert!(out.contains("padding: 0 4px 0 2px"));
  }

  #[test]
  fn two_value_shorthands_are_untouched() {
    let out = run(".x { padding: 0 2px; }");
    assert!(out.contains("padding: 0 2px"));
  }

  #[test]
  fn direction_and_keyword_values_swap() {
    assert!(run(".x { direction: ltr; }").contains("direction: rtl"));
    assert!(run(".x { float: left; }").contains("float: right"));
    assert!(run(".x { text-align: right; }").contains("text-align: left"));
  }

  #[test]
  fn noflip_comment_pins_a_declaration() {
    let out = run(".x { /* @noflip */ direction: ltr; margin-left: 2px; }");
    assert!(out.contains("direction: ltr"));
    assert!(out.contains("margin-right: 2px"));
  }

  #[test]
  fn noflip_comment_pins_a_whole_ruleset() {
    let out = run("/* @noflip */ .x { margin-left: 2px; }");
    assert!(out.contains("margin-left: 2px"));
  }

  #[test]
  fn url_swapping_is_gated_on_the_internal_flipper() {
    let job = JobDescription {
      swap_ltr_rtl_in_url: true,
      ..JobDescription::default()
    };
    let out = run_with(".x { background: url('sprite-ltr.png'); }", job);
    assert!(out.contains("sprite-rtl.png"));

    let job = JobDescription {
      swap_ltr_rtl_in_url: true,
      use_internal_bidi_flipper: false,
      ..JobDescription::default()
    };
    let out = run_with(".x { background: url('sprite-ltr.png'); }", job);
    assert!(out.contains("sprite-ltr.png"));
  }
}
