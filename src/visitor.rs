//! The tree visitor interface.
//!
//! A visitor gets one enter and one leave hook per node kind. Enter hooks
//! return whether to descend into the node's children. All hooks are
//! defaulted, so a pass only implements the kinds it cares about.
//!
//! Hooks receive a [`VisitContext`], which gives mutable access to the tree
//! and carries the mutation requests ([`VisitContext::remove_current_node`],
//! [`VisitContext::replace_current_block_child_with`],
//! [`VisitContext::stop_visit`]) back to the controller.

use crate::controller::VisitContext;
use crate::tree::{for_each_node_kind, NodeTag};

macro_rules! declare_tree_visitor {
  ($($variant:ident, $enter:ident, $leave:ident;)+) => {
    pub trait TreeVisitor {
      $(
        fn $enter(&mut self, cx: &mut VisitContext) -> bool {
          let _ = cx;
          true
        }

        fn $leave(&mut self, cx: &mut VisitContext) {
          let _ = cx;
        }
      )+
    }

    pub(crate) fn dispatch_enter<V: TreeVisitor + ?Sized>(visitor: &mut V, cx: &mut VisitContext) -> bool {
      match cx.tree[cx.node].kind.tag() {
        $(NodeTag::$variant => visitor.$enter(cx),)+
      }
    }

    pub(crate) fn dispatch_leave<V: TreeVisitor + ?Sized>(visitor: &mut V, cx: &mut VisitContext) {
      match cx.tree[cx.node].kind.tag() {
        $(NodeTag::$variant => visitor.$leave(cx),)+
      }
    }
  };
}
for_each_node_kind!(declare_tree_visitor);
