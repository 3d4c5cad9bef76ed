//! Vendor filtering.
//!
//! With a target vendor set, declarations and at-rules carrying a different
//! vendor's prefix are dropped; unprefixed ones always stay.

use crate::controller::{VisitContext, VisitController};
use crate::passes::{Pass, PassContext};
use crate::tree::NodeKind;
use crate::vendor_prefix::VendorPrefix;
use crate::visitor::TreeVisitor;

pub struct FilterVendor;

struct Filter {
  keep: VendorPrefix,
}

impl Filter {
  fn keeps(&self, prefix: VendorPrefix) -> bool {
    prefix == VendorPrefix::None || prefix == self.keep
  }
}

impl TreeVisitor for Filter {
  fn enter_declaration(&mut self, cx: &mut VisitContext) -> bool {
    let property = match cx.kind() {
      NodeKind::Declaration { property, .. } => *property,
      _ => unreachable!(),
    };
    if let NodeKind::Property { name } = &cx.tree[property].kind {
      let (prefix, _) = VendorPrefix::strip(name);
      if !self.keeps(prefix) {
        cx.remove_current_node();
      }
    }
    false
  }

  fn enter_keyframes(&mut self, cx: &mut VisitContext) -> bool {
    if let NodeKind::Keyframes { prefix, .. } = cx.kind() {
      if !self.keeps(*prefix) {
        cx.remove_current_node();
        return false;
      }
    }
    true
  }
}

impl Pass for FilterVendor {
  fn name(&self) -> &'static str {
    "filter-vendor"
  }

  fn run(&mut self, cx: &mut PassContext) {
    let vendor = match cx.job.vendor {
      Some(vendor) => vendor,
      None => return,
    };
    let mut visitor = Filter { keep: vendor.prefix() };
    let mut controller = VisitController::new();
    controller.start_mutating_visit(cx.tree, &mut visitor);
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::compiler::test_util::{parse_tree, pretty};
  use crate::job::{JobDescription, Vendor};

  fn run(source: &str, vendor: Vendor) -> String {
    let (mut tree, mut errors) = parse_tree(source);
    assert!(!errors.has_errors());
    let job = JobDescription {
      vendor: Some(vendor),
      ..JobDescription::default()
    };
    let mut pass = FilterVendor;
    pass.run(&mut PassContext {
      tree: &mut tree,
      job: &job,
      errors: &mut errors,
      substitution_map: None,
    });
    pretty(&tree)
  }

  #[test]
  fn other_vendors_declarations_are_dropped() {
    let out = run(
      ".x { -moz-border-radius: 2px; -webkit-box-shadow: none; border-radius: 2px; }",
      Vendor::Webkit,
    );
    assert!(!out.contains("-moz-border-radius"));
    assert!(out.contains("-webkit-box-shadow"));
    assert!(out.contains("border-radius: 2px"));
  }

  #[test]
  fn prefixed_keyframes_follow_the_same_rule() {
    let out = run(
      "@-webkit-keyframes spin { from { opacity: 0; } }\n@keyframes spin { from { opacity: 0; } }",
      Vendor::Mozilla,
    );
    assert!(!out.contains("-webkit-keyframes"));
    assert!(out.contains("@keyframes spin"));
  }
}
