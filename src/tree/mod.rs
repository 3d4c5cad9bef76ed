//! The GSS abstract syntax tree.
//!
//! All nodes of a compilation live in one [`Tree`] arena and reference each
//! other by [`NodeId`]. Every node except the root has exactly one parent;
//! attaching an already-owned node is an internal invariant violation and
//! panics. [`NodeKind`] is a closed union over the full node catalog, so
//! passes dispatch by pattern matching rather than downcasting.

pub mod selector;

use crate::location::SourceLocation;
use crate::vendor_prefix::VendorPrefix;
use smallvec::SmallVec;

/// A stable index into the arena of a [`Tree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub(crate) u32);

impl NodeId {
  #[inline]
  fn index(self) -> usize {
    self.0 as usize
  }
}

/// A comment attached to a node. Attachments survive deep copy and every
/// transformation that does not explicitly strip them.
#[derive(Debug, Clone, PartialEq)]
pub struct Comment {
  pub text: String,
  pub loc: SourceLocation,
}

impl Comment {
  /// True if the comment carries an `@name` annotation (e.g. `@noflip`).
  pub fn has_annotation(&self, name: &str) -> bool {
    self
      .text
      .split(|c: char| c.is_whitespace() || c == '*')
      .any(|word| word.strip_prefix('@') == Some(name))
  }

  /// Comments kept even in compressed output when `preserve_important_comments`
  /// is set: `/*! ... */` and license/preserve annotations.
  pub fn is_important(&self) -> bool {
    self.text.starts_with('!') || self.has_annotation("license") || self.has_annotation("preserve")
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CombinatorKind {
  Descendant,
  Child,
  AdjacentSibling,
  GeneralSibling,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttrOperator {
  Equals,
  Includes,
  DashMatch,
  Prefix,
  Suffix,
  Substring,
}

impl AttrOperator {
  pub fn as_str(&self) -> &'static str {
    match self {
      AttrOperator::Equals => "=",
      AttrOperator::Includes => "~=",
      AttrOperator::DashMatch => "|=",
      AttrOperator::Prefix => "^=",
      AttrOperator::Suffix => "$=",
      AttrOperator::Substring => "*=",
    }
  }
}

/// The operator joining the children of a [`NodeKind::Composite`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompositeOperator {
  Space,
  Comma,
  Slash,
  Equals,
  Plus,
  Minus,
  Mul,
  Div,
  Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConditionalKind {
  If,
  ElseIf,
  Else,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BoolOperator {
  And,
  Or,
}

/// Built-in functions recognized at parse time. Anything else becomes a
/// [`NodeKind::CustomFunction`] and is resolved through the function registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FunctionTag {
  Calc,
  Url,
  Add,
  Sub,
  Mult,
  Divide,
  Min,
  Max,
  Rgb,
  Rgba,
  Concat,
}

impl FunctionTag {
  pub fn from_name(name: &str) -> Option<FunctionTag> {
    Some(match name {
      "calc" => FunctionTag::Calc,
      "url" => FunctionTag::Url,
      "add" => FunctionTag::Add,
      "sub" => FunctionTag::Sub,
      "mult" => FunctionTag::Mult,
      "divide" => FunctionTag::Divide,
      "min" => FunctionTag::Min,
      "max" => FunctionTag::Max,
      "rgb" => FunctionTag::Rgb,
      "rgba" => FunctionTag::Rgba,
      "concat" => FunctionTag::Concat,
      _ => return None,
    })
  }

  pub fn name(&self) -> &'static str {
    match self {
      FunctionTag::Calc => "calc",
      FunctionTag::Url => "url",
      FunctionTag::Add => "add",
      FunctionTag::Sub => "sub",
      FunctionTag::Mult => "mult",
      FunctionTag::Divide => "divide",
      FunctionTag::Min => "min",
      FunctionTag::Max => "max",
      FunctionTag::Rgb => "rgb",
      FunctionTag::Rgba => "rgba",
      FunctionTag::Concat => "concat",
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum KeyframeKey {
  From,
  To,
  Percentage(f64),
}

/// Invokes a macro once with the full `Variant, enter_hook, leave_hook` list.
/// This is the single source of truth for the node catalog: the visitor trait,
/// the controller dispatch, and [`NodeTag`] are all generated from it.
macro_rules! for_each_node_kind {
  ($mac:ident) => {
    $mac! {
      Root, enter_root, leave_root;
      ImportBlock, enter_import_block, leave_import_block;
      Block, enter_block, leave_block;
      DeclarationBlock, enter_declaration_block, leave_declaration_block;
      Ruleset, enter_ruleset, leave_ruleset;
      SelectorList, enter_selector_list, leave_selector_list;
      Selector, enter_selector, leave_selector;
      RefinerList, enter_refiner_list, leave_refiner_list;
      ClassRefiner, enter_class_refiner, leave_class_refiner;
      IdRefiner, enter_id_refiner, leave_id_refiner;
      PseudoClassRefiner, enter_pseudo_class_refiner, leave_pseudo_class_refiner;
      PseudoElementRefiner, enter_pseudo_element_refiner, leave_pseudo_element_refiner;
      AttributeRefiner, enter_attribute_refiner, leave_attribute_refiner;
      Combinator, enter_combinator, leave_combinator;
      Declaration, enter_declaration, leave_declaration;
      Property, enter_property, leave_property;
      PropertyValue, enter_property_value, leave_property_value;
      Literal, enter_literal, leave_literal;
      Numeric, enter_numeric, leave_numeric;
      HexColor, enter_hex_color, leave_hex_color;
      StringValue, enter_string_value, leave_string_value;
      UnicodeRange, enter_unicode_range, leave_unicode_range;
      ConstantRef, enter_constant_ref, leave_constant_ref;
      LoopVariable, enter_loop_variable, leave_loop_variable;
      Function, enter_function, leave_function;
      CustomFunction, enter_custom_function, leave_custom_function;
      Composite, enter_composite, leave_composite;
      Priority, enter_priority, leave_priority;
      ConditionalBlock, enter_conditional_block, leave_conditional_block;
      ConditionalRule, enter_conditional_rule, leave_conditional_rule;
      BoolConstant, enter_bool_constant, leave_bool_constant;
      BoolNot, enter_bool_not, leave_bool_not;
      BoolBinary, enter_bool_binary, leave_bool_binary;
      Definition, enter_definition, leave_definition;
      MixinDefinition, enter_mixin_definition, leave_mixin_definition;
      Mixin, enter_mixin, leave_mixin;
      Media, enter_media, leave_media;
      Page, enter_page, leave_page;
      FontFace, enter_font_face, leave_font_face;
      Keyframes, enter_keyframes, leave_keyframes;
      KeyframeRuleset, enter_keyframe_ruleset, leave_keyframe_ruleset;
      KeyList, enter_key_list, leave_key_list;
      Key, enter_key, leave_key;
      Component, enter_component, leave_component;
      ForLoop, enter_for_loop, leave_for_loop;
      Provide, enter_provide, leave_provide;
      Require, enter_require, leave_require;
      Import, enter_import, leave_import;
      UnknownAtRule, enter_unknown_at_rule, leave_unknown_at_rule;
    }
  };
}
pub(crate) use for_each_node_kind;

/// The closed set of node kinds. Child links are [`NodeId`]s into the same
/// [`Tree`]; fields that are not `NodeId`/`Vec<NodeId>` are plain payload.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
  Root { charset: Option<String>, imports: NodeId, body: NodeId },
  ImportBlock { imports: Vec<NodeId> },
  Block { children: Vec<NodeId> },
  DeclarationBlock { children: Vec<NodeId> },
  Ruleset { selectors: NodeId, declarations: NodeId },
  SelectorList { selectors: Vec<NodeId> },
  Selector { name: String, refiners: NodeId, combinator: Option<NodeId> },
  RefinerList { refiners: Vec<NodeId> },
  ClassRefiner { name: String },
  IdRefiner { name: String },
  PseudoClassRefiner { name: String, argument: Option<String>, not_selector: Option<NodeId> },
  PseudoElementRefiner { name: String },
  AttributeRefiner { name: String, operator: Option<AttrOperator>, value: Option<String> },
  Combinator { kind: CombinatorKind, selector: NodeId },
  Declaration { property: NodeId, value: NodeId, star_hack: bool },
  Property { name: String },
  PropertyValue { values: Vec<NodeId> },
  Literal { text: String },
  Numeric { value: f64, unit: String },
  HexColor { hex: String },
  StringValue { value: String },
  UnicodeRange { range: String },
  ConstantRef { name: String },
  LoopVariable { name: String },
  Function { tag: FunctionTag, args: Vec<NodeId> },
  CustomFunction { name: String, args: Vec<NodeId>, cached: Option<String> },
  Composite { operator: CompositeOperator, values: Vec<NodeId>, parenthesized: bool },
  Priority {},
  ConditionalBlock { arms: Vec<NodeId> },
  ConditionalRule { kind: ConditionalKind, condition: Option<NodeId>, block: NodeId },
  BoolConstant { name: String },
  BoolNot { operand: NodeId },
  BoolBinary { operator: BoolOperator, left: NodeId, right: NodeId },
  Definition { name: String, values: Vec<NodeId> },
  MixinDefinition { name: String, params: Vec<String>, block: NodeId },
  Mixin { name: String, args: Vec<NodeId> },
  Media { params: Vec<NodeId>, block: NodeId },
  Page { pseudo: Option<String>, block: NodeId },
  FontFace { block: NodeId },
  Keyframes { prefix: VendorPrefix, name: String, block: NodeId },
  KeyframeRuleset { keys: NodeId, block: NodeId },
  KeyList { keys: Vec<NodeId> },
  Key { key: KeyframeKey },
  Component { name: String, parent: Option<String>, is_abstract: bool, block: NodeId },
  ForLoop { variable: String, from: NodeId, to: NodeId, step: Option<NodeId>, block: NodeId, loop_id: u32 },
  Provide { name: String },
  Require { name: String },
  Import { params: Vec<NodeId> },
  UnknownAtRule { name: String, params: Vec<NodeId>, block: Option<NodeId> },
}

macro_rules! declare_node_tag {
  ($($variant:ident, $enter:ident, $leave:ident;)+) => {
    /// The fieldless discriminant of a [`NodeKind`].
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub enum NodeTag {
      $($variant,)+
    }

    impl NodeKind {
      pub fn tag(&self) -> NodeTag {
        match self {
          $(NodeKind::$variant { .. } => NodeTag::$variant,)+
        }
      }
    }
  };
}
for_each_node_kind!(declare_node_tag);

impl NodeTag {
  /// At-rule kinds, as permitted inside blocks and declaration blocks.
  pub fn is_at_rule(self) -> bool {
    matches!(
      self,
      NodeTag::Definition
        | NodeTag::MixinDefinition
        | NodeTag::Mixin
        | NodeTag::Media
        | NodeTag::Page
        | NodeTag::FontFace
        | NodeTag::Keyframes
        | NodeTag::Component
        | NodeTag::ForLoop
        | NodeTag::Provide
        | NodeTag::Require
        | NodeTag::UnknownAtRule
    )
  }

  pub fn is_value(self) -> bool {
    matches!(
      self,
      NodeTag::Literal
        | NodeTag::Numeric
        | NodeTag::HexColor
        | NodeTag::StringValue
        | NodeTag::UnicodeRange
        | NodeTag::ConstantRef
        | NodeTag::LoopVariable
        | NodeTag::Function
        | NodeTag::CustomFunction
        | NodeTag::Composite
        | NodeTag::Priority
    )
  }

  pub fn is_refiner(self) -> bool {
    matches!(
      self,
      NodeTag::ClassRefiner
        | NodeTag::IdRefiner
        | NodeTag::PseudoClassRefiner
        | NodeTag::PseudoElementRefiner
        | NodeTag::AttributeRefiner
    )
  }
}

/// All child ids of a kind, in visitation order. For kinds that own a child
/// list, the list occupies the leading positions; fixed slots follow. The
/// controller's list mutations rely on that alignment.
pub(crate) fn kind_children(kind: &NodeKind) -> SmallVec<[NodeId; 8]> {
  let mut out = SmallVec::new();
  match kind {
    NodeKind::Root { imports, body, .. } => {
      out.push(*imports);
      out.push(*body);
    }
    NodeKind::ImportBlock { imports } => out.extend(imports.iter().copied()),
    NodeKind::Block { children } | NodeKind::DeclarationBlock { children } => out.extend(children.iter().copied()),
    NodeKind::Ruleset { selectors, declarations } => {
      out.push(*selectors);
      out.push(*declarations);
    }
    NodeKind::SelectorList { selectors } => out.extend(selectors.iter().copied()),
    NodeKind::Selector { refiners, combinator, .. } => {
      out.push(*refiners);
      if let Some(c) = combinator {
        out.push(*c);
      }
    }
    NodeKind::RefinerList { refiners } => out.extend(refiners.iter().copied()),
    NodeKind::PseudoClassRefiner { not_selector, .. } => {
      if let Some(s) = not_selector {
        out.push(*s);
      }
    }
    NodeKind::Combinator { selector, .. } => out.push(*selector),
    NodeKind::Declaration { property, value, .. } => {
      out.push(*property);
      out.push(*value);
    }
    NodeKind::PropertyValue { values } | NodeKind::Composite { values, .. } => out.extend(values.iter().copied()),
    NodeKind::Function { args, .. } | NodeKind::CustomFunction { args, .. } | NodeKind::Mixin { args, .. } => {
      out.extend(args.iter().copied())
    }
    NodeKind::ConditionalBlock { arms } => out.extend(arms.iter().copied()),
    NodeKind::ConditionalRule { condition, block, .. } => {
      if let Some(c) = condition {
        out.push(*c);
      }
      out.push(*block);
    }
    NodeKind::BoolNot { operand } => out.push(*operand),
    NodeKind::BoolBinary { left, right, .. } => {
      out.push(*left);
      out.push(*right);
    }
    NodeKind::Definition { values, .. } => out.extend(values.iter().copied()),
    NodeKind::MixinDefinition { block, .. }
    | NodeKind::Page { block, .. }
    | NodeKind::FontFace { block }
    | NodeKind::Keyframes { block, .. }
    | NodeKind::Component { block, .. } => out.push(*block),
    NodeKind::Media { params, block } => {
      out.extend(params.iter().copied());
      out.push(*block);
    }
    NodeKind::KeyframeRuleset { keys, block } => {
      out.push(*keys);
      out.push(*block);
    }
    NodeKind::KeyList { keys } => out.extend(keys.iter().copied()),
    NodeKind::ForLoop { from, to, step, block, .. } => {
      out.push(*from);
      out.push(*to);
      if let Some(s) = step {
        out.push(*s);
      }
      out.push(*block);
    }
    NodeKind::Import { params } => out.extend(params.iter().copied()),
    NodeKind::UnknownAtRule { params, block, .. } => {
      out.extend(params.iter().copied());
      if let Some(b) = block {
        out.push(*b);
      }
    }
    NodeKind::ClassRefiner { .. }
    | NodeKind::IdRefiner { .. }
    | NodeKind::PseudoElementRefiner { .. }
    | NodeKind::AttributeRefiner { .. }
    | NodeKind::Property { .. }
    | NodeKind::Literal { .. }
    | NodeKind::Numeric { .. }
    | NodeKind::HexColor { .. }
    | NodeKind::StringValue { .. }
    | NodeKind::UnicodeRange { .. }
    | NodeKind::ConstantRef { .. }
    | NodeKind::LoopVariable { .. }
    | NodeKind::Priority {}
    | NodeKind::BoolConstant { .. }
    | NodeKind::Key { .. }
    | NodeKind::Provide { .. }
    | NodeKind::Require { .. } => {}
  }
  out
}

/// Rewrites every child id of `kind` through `f`, preserving structure.
fn map_kind_children(kind: NodeKind, f: &mut impl FnMut(NodeId) -> NodeId) -> NodeKind {
  let map_vec = |v: Vec<NodeId>, f: &mut dyn FnMut(NodeId) -> NodeId| -> Vec<NodeId> { v.into_iter().map(|c| f(c)).collect() };
  match kind {
    NodeKind::Root { charset, imports, body } => NodeKind::Root {
      charset,
      imports: f(imports),
      body: f(body),
    },
    NodeKind::ImportBlock { imports } => NodeKind::ImportBlock { imports: map_vec(imports, f) },
    NodeKind::Block { children } => NodeKind::Block { children: map_vec(children, f) },
    NodeKind::DeclarationBlock { children } => NodeKind::DeclarationBlock { children: map_vec(children, f) },
    NodeKind::Ruleset { selectors, declarations } => NodeKind::Ruleset {
      selectors: f(selectors),
      declarations: f(declarations),
    },
    NodeKind::SelectorList { selectors } => NodeKind::SelectorList { selectors: map_vec(selectors, f) },
    NodeKind::Selector { name, refiners, combinator } => NodeKind::Selector {
      name,
      refiners: f(refiners),
      combinator: combinator.map(|c| f(c)),
    },
    NodeKind::RefinerList { refiners } => NodeKind::RefinerList { refiners: map_vec(refiners, f) },
    NodeKind::PseudoClassRefiner { name, argument, not_selector } => NodeKind::PseudoClassRefiner {
      name,
      argument,
      not_selector: not_selector.map(|s| f(s)),
    },
    NodeKind::Combinator { kind, selector } => NodeKind::Combinator { kind, selector: f(selector) },
    NodeKind::Declaration { property, value, star_hack } => NodeKind::Declaration {
      property: f(property),
      value: f(value),
      star_hack,
    },
    NodeKind::PropertyValue { values } => NodeKind::PropertyValue { values: map_vec(values, f) },
    NodeKind::Composite { operator, values, parenthesized } => NodeKind::Composite {
      operator,
      values: map_vec(values, f),
      parenthesized,
    },
    NodeKind::Function { tag, args } => NodeKind::Function { tag, args: map_vec(args, f) },
    NodeKind::CustomFunction { name, args, cached } => NodeKind::CustomFunction {
      name,
      args: map_vec(args, f),
      cached,
    },
    NodeKind::Mixin { name, args } => NodeKind::Mixin { name, args: map_vec(args, f) },
    NodeKind::ConditionalBlock { arms } => NodeKind::ConditionalBlock { arms: map_vec(arms, f) },
    NodeKind::ConditionalRule { kind, condition, block } => NodeKind::ConditionalRule {
      kind,
      condition: condition.map(|c| f(c)),
      block: f(block),
    },
    NodeKind::BoolNot { operand } => NodeKind::BoolNot { operand: f(operand) },
    NodeKind::BoolBinary { operator, left, right } => NodeKind::BoolBinary {
      operator,
      left: f(left),
      right: f(right),
    },
    NodeKind::Definition { name, values } => NodeKind::Definition { name, values: map_vec(values, f) },
    NodeKind::MixinDefinition { name, params, block } => NodeKind::MixinDefinition {
      name,
      params,
      block: f(block),
    },
    NodeKind::Media { params, block } => NodeKind::Media {
      params: map_vec(params, f),
      block: f(block),
    },
    NodeKind::Page { pseudo, block } => NodeKind::Page { pseudo, block: f(block) },
    NodeKind::FontFace { block } => NodeKind::FontFace { block: f(block) },
    NodeKind::Keyframes { prefix, name, block } => NodeKind::Keyframes {
      prefix,
      name,
      block: f(block),
    },
    NodeKind::KeyframeRuleset { keys, block } => NodeKind::KeyframeRuleset {
      keys: f(keys),
      block: f(block),
    },
    NodeKind::KeyList { keys } => NodeKind::KeyList { keys: map_vec(keys, f) },
    NodeKind::Component { name, parent, is_abstract, block } => NodeKind::Component {
      name,
      parent,
      is_abstract,
      block: f(block),
    },
    NodeKind::ForLoop { variable, from, to, step, block, loop_id } => NodeKind::ForLoop {
      variable,
      from: f(from),
      to: f(to),
      step: step.map(|s| f(s)),
      block: f(block),
      loop_id,
    },
    NodeKind::Import { params } => NodeKind::Import { params: map_vec(params, f) },
    NodeKind::UnknownAtRule { name, params, block } => NodeKind::UnknownAtRule {
      name,
      params: map_vec(params, f),
      block: block.map(|b| f(b)),
    },
    leaf => leaf,
  }
}

/// The single child list of a list-bearing kind.
fn primary_list(kind: &NodeKind) -> Option<&Vec<NodeId>> {
  match kind {
    NodeKind::ImportBlock { imports } => Some(imports),
    NodeKind::Block { children } | NodeKind::DeclarationBlock { children } => Some(children),
    NodeKind::SelectorList { selectors } => Some(selectors),
    NodeKind::RefinerList { refiners } => Some(refiners),
    NodeKind::PropertyValue { values } | NodeKind::Composite { values, .. } => Some(values),
    NodeKind::Function { args, .. } | NodeKind::CustomFunction { args, .. } | NodeKind::Mixin { args, .. } => Some(args),
    NodeKind::ConditionalBlock { arms } => Some(arms),
    NodeKind::Definition { values, .. } => Some(values),
    NodeKind::Media { params, .. } | NodeKind::Import { params } | NodeKind::UnknownAtRule { params, .. } => Some(params),
    NodeKind::KeyList { keys } => Some(keys),
    _ => None,
  }
}

fn primary_list_mut(kind: &mut NodeKind) -> Option<&mut Vec<NodeId>> {
  match kind {
    NodeKind::ImportBlock { imports } => Some(imports),
    NodeKind::Block { children } | NodeKind::DeclarationBlock { children } => Some(children),
    NodeKind::SelectorList { selectors } => Some(selectors),
    NodeKind::RefinerList { refiners } => Some(refiners),
    NodeKind::PropertyValue { values } | NodeKind::Composite { values, .. } => Some(values),
    NodeKind::Function { args, .. } | NodeKind::CustomFunction { args, .. } | NodeKind::Mixin { args, .. } => Some(args),
    NodeKind::ConditionalBlock { arms } => Some(arms),
    NodeKind::Definition { values, .. } => Some(values),
    NodeKind::Media { params, .. } | NodeKind::Import { params } | NodeKind::UnknownAtRule { params, .. } => Some(params),
    NodeKind::KeyList { keys } => Some(keys),
    _ => None,
  }
}

#[derive(Debug, Clone)]
pub struct Node {
  pub kind: NodeKind,
  pub parent: Option<NodeId>,
  pub loc: SourceLocation,
  pub comments: Vec<Comment>,
  /// Opaque output-partition id. Survives deep copy and transformation.
  pub chunk: Option<String>,
}

/// The arena. Detached nodes stay in the arena until the tree is dropped;
/// there is no per-node reclamation within a compilation.
#[derive(Debug)]
pub struct Tree {
  nodes: Vec<Node>,
  root: NodeId,
}

impl std::ops::Index<NodeId> for Tree {
  type Output = Node;

  #[inline]
  fn index(&self, id: NodeId) -> &Node {
    &self.nodes[id.index()]
  }
}

impl std::ops::IndexMut<NodeId> for Tree {
  #[inline]
  fn index_mut(&mut self, id: NodeId) -> &mut Node {
    &mut self.nodes[id.index()]
  }
}

impl Tree {
  /// An empty document: a root holding an import block and a body block.
  pub fn new() -> Tree {
    let mut tree = Tree {
      nodes: Vec::new(),
      root: NodeId(0),
    };
    let imports = tree.alloc(NodeKind::ImportBlock { imports: Vec::new() }, SourceLocation::unknown());
    let body = tree.alloc(NodeKind::Block { children: Vec::new() }, SourceLocation::unknown());
    let root = tree.alloc(
      NodeKind::Root {
        charset: None,
        imports,
        body,
      },
      SourceLocation::unknown(),
    );
    tree.root = root;
    tree
  }

  pub fn root(&self) -> NodeId {
    self.root
  }

  pub fn body(&self) -> NodeId {
    match self[self.root].kind {
      NodeKind::Root { body, .. } => body,
      _ => unreachable!("root node is not a Root"),
    }
  }

  pub fn import_block(&self) -> NodeId {
    match self[self.root].kind {
      NodeKind::Root { imports, .. } => imports,
      _ => unreachable!("root node is not a Root"),
    }
  }

  pub fn node(&self, id: NodeId) -> &Node {
    &self[id]
  }

  pub fn len(&self) -> usize {
    self.nodes.len()
  }

  pub fn is_empty(&self) -> bool {
    self.nodes.is_empty()
  }

  /// Creates a node. Children referenced by `kind` must be unowned; they
  /// become owned by the new node.
  pub fn alloc(&mut self, kind: NodeKind, loc: SourceLocation) -> NodeId {
    let id = NodeId(self.nodes.len() as u32);
    let children = kind_children(&kind);
    self.nodes.push(Node {
      kind,
      parent: None,
      loc,
      comments: Vec::new(),
      chunk: None,
    });
    for child in children {
      let node = &mut self.nodes[child.index()];
      assert!(node.parent.is_none(), "node {:?} is already owned by another parent", child);
      node.parent = Some(id);
    }
    id
  }

  pub fn parent(&self, id: NodeId) -> Option<NodeId> {
    self[id].parent
  }

  /// All children of `id` in visitation order.
  pub fn children(&self, id: NodeId) -> SmallVec<[NodeId; 8]> {
    kind_children(&self[id].kind)
  }

  pub fn add_comment(&mut self, id: NodeId, comment: Comment) {
    self[id].comments.push(comment);
  }

  pub fn set_chunk(&mut self, id: NodeId, chunk: impl Into<String>) {
    self[id].chunk = Some(chunk.into());
  }

  fn check_child_kind(&self, parent: NodeId, child: NodeId) {
    let parent_tag = self[parent].kind.tag();
    let child_tag = self[child].kind.tag();
    let ok = match parent_tag {
      NodeTag::Block => {
        matches!(child_tag, NodeTag::Ruleset | NodeTag::ConditionalBlock | NodeTag::KeyframeRuleset) || child_tag.is_at_rule()
      }
      NodeTag::DeclarationBlock => child_tag == NodeTag::Declaration || child_tag.is_at_rule(),
      NodeTag::ImportBlock => child_tag == NodeTag::Import,
      NodeTag::SelectorList => child_tag == NodeTag::Selector,
      NodeTag::RefinerList => child_tag.is_refiner(),
      NodeTag::ConditionalBlock => child_tag == NodeTag::ConditionalRule,
      NodeTag::KeyList => child_tag == NodeTag::Key,
      NodeTag::PropertyValue
      | NodeTag::Composite
      | NodeTag::Function
      | NodeTag::CustomFunction
      | NodeTag::Mixin
      | NodeTag::Definition
      | NodeTag::Media
      | NodeTag::Import
      | NodeTag::UnknownAtRule => child_tag.is_value(),
      _ => panic!("node kind {:?} has no child list", parent_tag),
    };
    assert!(ok, "cannot add a {:?} child to a {:?} node", child_tag, parent_tag);
  }

  /// Appends `child` to the child list of `parent`. Panics on a kind
  /// violation or if `child` is already owned.
  pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
    let len = primary_list(&self[parent].kind).expect("node kind has no child list").len();
    self.insert_child(parent, len, child);
  }

  pub fn insert_child(&mut self, parent: NodeId, index: usize, child: NodeId) {
    self.check_child_kind(parent, child);
    {
      let node = &mut self.nodes[child.index()];
      assert!(node.parent.is_none(), "node {:?} is already owned by another parent", child);
      node.parent = Some(parent);
    }
    let list = primary_list_mut(&mut self.nodes[parent.index()].kind).expect("node kind has no child list");
    list.insert(index, child);
    self.invalidate_cache(parent);
  }

  /// Position of `child` in the child list of `parent`, if `parent` is a
  /// list-bearing kind and `child` sits in its list.
  pub fn list_index_of(&self, parent: NodeId, child: NodeId) -> Option<usize> {
    primary_list(&self[parent].kind).and_then(|list| list.iter().position(|&c| c == child))
  }

  pub fn list_len(&self, parent: NodeId) -> usize {
    primary_list(&self[parent].kind).map_or(0, |l| l.len())
  }

  /// Removes and detaches the list child of `parent` at `index`.
  pub fn remove_list_child(&mut self, parent: NodeId, index: usize) -> NodeId {
    let list = primary_list_mut(&mut self.nodes[parent.index()].kind).expect("node kind has no child list");
    let child = list.remove(index);
    self.nodes[child.index()].parent = None;
    self.invalidate_cache(parent);
    child
  }

  /// Replaces the list child of `parent` at `index` with `replacement`.
  /// The outgoing child is detached; the replacement nodes must be unowned.
  /// Returns the removed child.
  pub fn splice_list_children(&mut self, parent: NodeId, index: usize, replacement: &[NodeId]) -> NodeId {
    for &node in replacement {
      self.check_child_kind(parent, node);
      assert!(
        self[node].parent.is_none(),
        "replacement node {:?} is already owned by another parent",
        node
      );
    }
    let removed = {
      let list = primary_list_mut(&mut self.nodes[parent.index()].kind).expect("node kind has no child list");
      let removed = list[index];
      list.splice(index..index + 1, replacement.iter().copied());
      removed
    };
    self.nodes[removed.index()].parent = None;
    for &node in replacement {
      self.nodes[node.index()].parent = Some(parent);
    }
    self.invalidate_cache(parent);
    removed
  }

  /// Swaps two list children of `parent` in place.
  pub fn swap_list_children(&mut self, parent: NodeId, a: usize, b: usize) {
    let list = primary_list_mut(&mut self.nodes[parent.index()].kind).expect("node kind has no child list");
    list.swap(a, b);
  }

  /// Detaches and returns all list children of `parent`.
  pub fn take_list_children(&mut self, parent: NodeId) -> Vec<NodeId> {
    let list = primary_list_mut(&mut self.nodes[parent.index()].kind).expect("node kind has no child list");
    let children = std::mem::take(list);
    for &child in &children {
      self.nodes[child.index()].parent = None;
    }
    self.invalidate_cache(parent);
    children
  }

  /// Replaces the entire child list of `parent`, detaching the outgoing
  /// children first.
  pub fn replace_list_children(&mut self, parent: NodeId, new_children: Vec<NodeId>) {
    let old = self.take_list_children(parent);
    debug_assert!(old.iter().all(|&c| self[c].parent.is_none()));
    for child in new_children {
      self.append_child(parent, child);
    }
  }

  /// A custom function's memoized result is only valid for the arguments it
  /// was computed from.
  fn invalidate_cache(&mut self, id: NodeId) {
    if let NodeKind::CustomFunction { cached, .. } = &mut self.nodes[id.index()].kind {
      *cached = None;
    }
  }

  /// Recursively copies the subtree at `id`. The copy is detached, shares no
  /// node with the original, and duplicates comments, locations, and chunk
  /// ids.
  pub fn deep_copy(&mut self, id: NodeId) -> NodeId {
    let node = &self.nodes[id.index()];
    let kind = node.kind.clone();
    let loc = node.loc;
    let comments = node.comments.clone();
    let chunk = node.chunk.clone();
    let new_kind = map_kind_children(kind, &mut |child| self.deep_copy(child));
    let copy = self.alloc(new_kind, loc);
    self.nodes[copy.index()].comments = comments;
    self.nodes[copy.index()].chunk = chunk;
    copy
  }
}

impl Default for Tree {
  fn default() -> Tree {
    Tree::new()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::location::SourceLocation;

  fn loc() -> SourceLocation {
    SourceLocation::unknown()
  }

  fn literal(tree: &mut Tree, text: &str) -> NodeId {
    tree.alloc(
      NodeKind::Literal { text: text.into() },
      loc(),
    )
  }

  #[test]
  fn alloc_sets_parent_links() {
    let mut tree = Tree::new();
    let a = literal(&mut tree, "a");
    let b = literal(&mut tree, "b");
    let value = tree.alloc(NodeKind::PropertyValue { values: vec![a, b] }, loc());
    assert_eq!(tree.parent(a), Some(value));
    assert_eq!(tree.parent(b), Some(value));
    assert_eq!(tree.children(value).as_slice(), &[a, b]);
  }

  #[test]
  fn parent_link_is_consistent_for_every_reachable_node() {
    let mut tree = Tree::new();
    let a = literal(&mut tree, "a");
    let value = tree.alloc(NodeKind::PropertyValue { values: vec![a] }, loc());
    let prop = tree.alloc(NodeKind::Property { name: "color".into() }, loc());
    let decl = tree.alloc(
      NodeKind::Declaration {
        property: prop,
        value,
        star_hack: false,
      },
      loc(),
    );
    let block = tree.alloc(NodeKind::DeclarationBlock { children: vec![] }, loc());
    tree.append_child(block, decl);

    let mut stack = vec![block];
    while let Some(id) = stack.pop() {
      for child in tree.children(id) {
        assert_eq!(tree.parent(child), Some(id));
        let occurrences = tree.children(id).iter().filter(|&&c| c == child).count();
        assert_eq!(occurrences, 1);
        stack.push(child);
      }
    }
  }

  #[test]
  #[should_panic(expected = "already owned")]
  fn attaching_an_owned_node_panics() {
    let mut tree = Tree::new();
    let a = literal(&mut tree, "a");
    let _value = tree.alloc(NodeKind::PropertyValue { values: vec![a] }, loc());
    let other = tree.alloc(NodeKind::PropertyValue { values: vec![] }, loc());
    tree.append_child(other, a);
  }

  #[test]
  #[should_panic(expected = "cannot add")]
  fn kind_violations_fail_fast() {
    let mut tree = Tree::new();
    let lit = literal(&mut tree, "a");
    let body = tree.body();
    tree.append_child(body, lit);
  }

  #[test]
  fn deep_copy_shares_nothing() {
    let mut tree = Tree::new();
    let a = literal(&mut tree, "red");
    let value = tree.alloc(NodeKind::PropertyValue { values: vec![a] }, loc());
    tree.add_comment(value, Comment {
      text: " keep ".into(),
      loc: loc(),
    });

    let copy = tree.deep_copy(value);
    assert_ne!(copy, value);
    assert_eq!(tree[copy].comments, tree[value].comments);
    let copied_child = tree.children(copy)[0];
    assert_ne!(copied_child, a);

    // Mutating the copy must not affect the original.
    if let NodeKind::Literal { text } = &mut tree[copied_child].kind {
      *text = "blue".into();
    }
    assert_eq!(tree[a].kind, NodeKind::Literal { text: "red".into() });
  }

  #[test]
  fn detaching_clears_the_parent_link() {
    let mut tree = Tree::new();
    let a = literal(&mut tree, "a");
    let b = literal(&mut tree, "b");
    let value = tree.alloc(NodeKind::PropertyValue { values: vec![a, b] }, loc());
    let removed = tree.remove_list_child(value, 0);
    assert_eq!(removed, a);
    assert_eq!(tree.parent(a), None);
    assert_eq!(tree.children(value).as_slice(), &[b]);
  }

  #[test]
  fn splice_detaches_outgoing_and_attaches_incoming() {
    let mut tree = Tree::new();
    let a = literal(&mut tree, "a");
    let value = tree.alloc(NodeKind::PropertyValue { values: vec![a] }, loc());
    let x = literal(&mut tree, "x");
    let y = literal(&mut tree, "y");
    let removed = tree.splice_list_children(value, 0, &[x, y]);
    assert_eq!(removed, a);
    assert_eq!(tree.parent(a), None);
    assert_eq!(tree.parent(x), Some(value));
    assert_eq!(tree.children(value).as_slice(), &[x, y]);
  }

  #[test]
  fn replacing_custom_function_args_invalidates_the_cache() {
    let mut tree = Tree::new();
    let a = literal(&mut tree, "a");
    let call = tree.alloc(
      NodeKind::CustomFunction {
        name: "selectFrom".into(),
        args: vec![a],
        cached: None,
      },
      loc(),
    );
    if let NodeKind::CustomFunction { cached, .. } = &mut tree[call].kind {
      *cached = Some("a".into());
    }
    let b = literal(&mut tree, "b");
    tree.splice_list_children(call, 0, &[b]);
    match &tree[call].kind {
      NodeKind::CustomFunction { cached, .. } => assert_eq!(*cached, None),
      _ => unreachable!(),
    }
  }

  #[test]
  fn comment_annotations() {
    let c = Comment {
      text: " @noflip ".into(),
      loc: loc(),
    };
    assert!(c.has_annotation("noflip"));
    assert!(!c.has_annotation("license"));
    assert!(!c.is_important());
    let lic = Comment {
      text: "! (c) 2024 ".into(),
      loc: loc(),
    };
    assert!(lic.is_important());
  }
}
