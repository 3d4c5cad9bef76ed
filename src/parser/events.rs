//! The event interfaces between the parser and the tree builder.
//!
//! The parser recognizes constructs and fires these handler methods; it never
//! touches the tree. The indirection lets the error-recovery path abandon a
//! partially recognized construct without leaving a partial subtree behind.

use crate::location::{SourceId, SourceLocation};
use crate::tree::{AttrOperator, CombinatorKind, CompositeOperator, ConditionalKind, KeyframeKey};
use crate::vendor_prefix::VendorPrefix;

/// A recognized simple value, before it becomes a tree node.
#[derive(Debug, Clone, PartialEq)]
pub enum ValueToken {
  Literal(String),
  Numeric { value: f64, unit: String },
  HexColor(String),
  String(String),
  UnicodeRange(String),
  ConstantRef(String),
  LoopVariable(String),
  Priority,
}

/// A recognized boolean condition. Built once by the parser; never mutated.
#[derive(Debug, Clone, PartialEq)]
pub enum CondExpr {
  Constant(String),
  Not(Box<CondExpr>),
  And(Box<CondExpr>, Box<CondExpr>),
  Or(Box<CondExpr>, Box<CondExpr>),
}

/// A recognized selector refiner.
#[derive(Debug, Clone, PartialEq)]
pub enum RefinerEvent {
  Class(String),
  Id(String),
  PseudoClass { name: String, argument: Option<String> },
  PseudoElement(String),
  Attribute {
    name: String,
    operator: Option<AttrOperator>,
    value: Option<String>,
  },
}

pub trait DocumentEvents {
  fn on_document_start(&mut self, source: SourceId);
  fn on_document_end(&mut self);
  fn on_charset(&mut self, charset: String, loc: SourceLocation);
  fn on_comment(&mut self, text: String, loc: SourceLocation);
}

pub trait RuleEvents {
  fn on_ruleset_start(&mut self, loc: SourceLocation);
  /// One compound selector begins. `name` is the element name, empty for an
  /// implicit universal part (`.foo`), `*` for an explicit one.
  fn on_selector_part(&mut self, name: String, loc: SourceLocation);
  fn on_refiner(&mut self, refiner: RefinerEvent, loc: SourceLocation);
  fn on_pseudo_not_start(&mut self, loc: SourceLocation);
  fn on_pseudo_not_end(&mut self);
  fn on_combinator(&mut self, kind: CombinatorKind);
  /// The current comma-separated selector chain is complete.
  fn on_selector_end(&mut self);
  fn on_declarations_start(&mut self, loc: SourceLocation);
  fn on_declaration_start(&mut self, property: String, star_hack: bool, loc: SourceLocation);
  fn on_declaration_end(&mut self, loc: SourceLocation);
  /// The declaration being assembled is malformed; drop it.
  fn on_declaration_abandon(&mut self);
  fn on_declarations_end(&mut self);
  fn on_ruleset_end(&mut self, loc: SourceLocation);
  /// The ruleset being assembled is malformed; drop it.
  fn on_ruleset_abandon(&mut self);
}

pub trait ValueEvents {
  fn on_value(&mut self, value: ValueToken, loc: SourceLocation);
  /// An infix operator between values. Space is a separator, never an
  /// operator, and does not arrive here.
  fn on_operator(&mut self, operator: CompositeOperator, loc: SourceLocation);
  fn on_function_start(&mut self, name: String, loc: SourceLocation);
  fn on_function_end(&mut self, loc: SourceLocation);
  /// A parenthesized value group (e.g. inside `calc`).
  fn on_group_start(&mut self, loc: SourceLocation);
  fn on_group_end(&mut self, loc: SourceLocation);
}

pub trait AtRuleEvents {
  fn on_import_start(&mut self, loc: SourceLocation);
  fn on_import_end(&mut self, loc: SourceLocation);
  /// The import being assembled is malformed; drop it.
  fn on_import_abandon(&mut self);
  fn on_definition_start(&mut self, name: String, loc: SourceLocation);
  fn on_definition_end(&mut self, loc: SourceLocation);
  /// The definition being assembled is malformed; drop it.
  fn on_definition_abandon(&mut self);
  fn on_media_start(&mut self, prelude: String, loc: SourceLocation);
  fn on_media_end(&mut self, loc: SourceLocation);
  fn on_page_start(&mut self, pseudo: Option<String>, loc: SourceLocation);
  fn on_page_end(&mut self, loc: SourceLocation);
  fn on_font_face_start(&mut self, loc: SourceLocation);
  fn on_font_face_end(&mut self, loc: SourceLocation);
  fn on_conditional_block_start(&mut self, loc: SourceLocation);
  fn on_conditional_rule_start(&mut self, kind: ConditionalKind, condition: Option<CondExpr>, loc: SourceLocation);
  fn on_conditional_rule_end(&mut self);
  fn on_conditional_block_end(&mut self);
  fn on_mixin_definition_start(&mut self, name: String, params: Vec<String>, loc: SourceLocation);
  fn on_mixin_definition_end(&mut self, loc: SourceLocation);
  fn on_mixin_start(&mut self, name: String, loc: SourceLocation);
  fn on_mixin_end(&mut self, loc: SourceLocation);
  /// The mixin reference being assembled is malformed; drop it.
  fn on_mixin_abandon(&mut self);
  fn on_keyframes_start(&mut self, prefix: VendorPrefix, name: String, loc: SourceLocation);
  fn on_keyframe_ruleset_start(&mut self, keys: Vec<KeyframeKey>, loc: SourceLocation);
  fn on_keyframe_ruleset_end(&mut self);
  fn on_keyframes_end(&mut self, loc: SourceLocation);
  fn on_component_start(&mut self, name: String, parent: Option<String>, is_abstract: bool, loc: SourceLocation);
  fn on_component_end(&mut self, loc: SourceLocation);
  fn on_for_loop_start(
    &mut self,
    variable: String,
    from: ValueToken,
    to: ValueToken,
    step: Option<ValueToken>,
    loc: SourceLocation,
  );
  fn on_for_loop_end(&mut self, loc: SourceLocation);
  fn on_provide(&mut self, name: String, loc: SourceLocation);
  fn on_require(&mut self, name: String, loc: SourceLocation);
  fn on_unknown_at_rule_start(&mut self, name: String, prelude: String, has_block: bool, loc: SourceLocation);
  fn on_unknown_at_rule_end(&mut self, loc: SourceLocation);
}

/// Everything a tree builder implements.
pub trait BuildHandler: DocumentEvents + RuleEvents + ValueEvents + AtRuleEvents {}

impl<T: DocumentEvents + RuleEvents + ValueEvents + AtRuleEvents> BuildHandler for T {}
