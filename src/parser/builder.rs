//! The tree builder.
//!
//! Implements the parser's event interfaces and assembles the [`Tree`].
//! The builder validates every event against its state stack; an event that
//! fires in a state where it is not allowed is a parser bug and panics.
//! User-facing syntax problems never reach this point: the parser reports
//! them as diagnostics and abandons the construct instead.

use crate::location::{SourceId, SourceLocation};
use crate::parser::events::{
  AtRuleEvents, CondExpr, DocumentEvents, RefinerEvent, RuleEvents, ValueEvents, ValueToken,
};
use crate::tree::{
  Comment, CombinatorKind, CompositeOperator, ConditionalKind, FunctionTag, KeyframeKey, NodeId, NodeKind, Tree,
};
use crate::vendor_prefix::VendorPrefix;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
  BeforeDocument,
  /// After the document start: `@charset` and `@import` are still allowed.
  BeforeBody,
  InsideMain,
  InsideMedia,
  /// A generic rule-bearing block: conditional arm, component, loop body,
  /// keyframes body, allowed unknown at-rule body.
  InsideBlock,
  InsideDeclarationBlock,
  InsidePropertyExpression,
  InsideExpressionAfterOperator,
  InsideConditionalBlock,
  InsideDefinition,
  Done,
}

/// What a value sink belongs to. Function-like sinks treat the comma
/// operator as a structural argument separator.
enum SinkKind {
  Declaration,
  Definition,
  Import,
  Function { name: String },
  Mixin,
  Group,
}

struct ValueSink {
  kind: SinkKind,
  items: Vec<NodeId>,
  current_arg: Vec<NodeId>,
  pending_op: Option<CompositeOperator>,
}

impl ValueSink {
  fn new(kind: SinkKind) -> ValueSink {
    ValueSink {
      kind,
      items: Vec::new(),
      current_arg: Vec::new(),
      pending_op: None,
    }
  }

  fn is_function_like(&self) -> bool {
    matches!(self.kind, SinkKind::Function { .. } | SinkKind::Mixin)
  }
}

struct SelectorPart {
  name: String,
  refiners: NodeId,
  combinator_after: Option<CombinatorKind>,
  loc: SourceLocation,
}

struct SelectorAccum {
  /// The selector list being filled; absent inside a `:not(...)` argument.
  list: Option<NodeId>,
  parts: Vec<SelectorPart>,
}

pub struct TreeBuilder<'a> {
  tree: &'a mut Tree,
  states: Vec<State>,
  /// Innermost container receiving completed rules and declarations.
  open_blocks: Vec<NodeId>,
  open_conditionals: Vec<NodeId>,
  pending_conditional_rules: Vec<(ConditionalKind, Option<NodeId>, SourceLocation)>,
  selector_stack: Vec<SelectorAccum>,
  value_stack: Vec<ValueSink>,
  pending_ruleset: Option<(SourceLocation, Vec<Comment>)>,
  pending_declaration: Option<(String, bool, SourceLocation, Vec<Comment>)>,
  pending_definition: Option<(String, Vec<Comment>)>,
  pending_import: Option<Vec<Comment>>,
  pending_media: Vec<(String, Vec<Comment>)>,
  pending_page: Vec<(Option<String>, Vec<Comment>)>,
  pending_font_face: Vec<Vec<Comment>>,
  pending_mixin_definition: Vec<(String, Vec<String>, Vec<Comment>)>,
  pending_mixin: Option<(String, Vec<Comment>)>,
  pending_keyframes: Vec<(VendorPrefix, String, Vec<Comment>)>,
  pending_keyframe_rulesets: Vec<(NodeId, Vec<Comment>)>,
  pending_components: Vec<(String, Option<String>, bool, Vec<Comment>)>,
  pending_loops: Vec<(String, NodeId, NodeId, Option<NodeId>, u32, Vec<Comment>)>,
  pending_unknown: Vec<(String, Vec<NodeId>, Option<NodeId>, Vec<Comment>)>,
  /// The declaration block most recently closed by `on_declarations_end`.
  last_closed_block: Option<NodeId>,
  pending_comments: Vec<Comment>,
  next_loop_id: u32,
}

impl<'a> TreeBuilder<'a> {
  pub fn new(tree: &'a mut Tree) -> TreeBuilder<'a> {
    TreeBuilder {
      tree,
      states: vec![State::BeforeDocument],
      open_blocks: Vec::new(),
      open_conditionals: Vec::new(),
      pending_conditional_rules: Vec::new(),
      selector_stack: Vec::new(),
      value_stack: Vec::new(),
      pending_ruleset: None,
      pending_declaration: None,
      pending_definition: None,
      pending_import: None,
      pending_media: Vec::new(),
      pending_page: Vec::new(),
      pending_font_face: Vec::new(),
      pending_mixin_definition: Vec::new(),
      pending_mixin: None,
      pending_keyframes: Vec::new(),
      pending_keyframe_rulesets: Vec::new(),
      pending_components: Vec::new(),
      pending_loops: Vec::new(),
      pending_unknown: Vec::new(),
      last_closed_block: None,
      pending_comments: Vec::new(),
      next_loop_id: 0,
    }
  }

  /// Seals the builder. Trailing comments attach to the root.
  pub fn finish(mut self) {
    assert_eq!(self.top(), State::BeforeDocument, "finish called mid-document");
    assert!(self.open_blocks.is_empty(), "finish with open blocks");
    assert!(self.value_stack.is_empty(), "finish with open value expressions");
    let root = self.tree.root();
    for comment in self.pending_comments.drain(..) {
      self.tree.add_comment(root, comment);
    }
    *self.states.last_mut().unwrap() = State::Done;
  }

  fn top(&self) -> State {
    *self.states.last().expect("empty state stack")
  }

  fn expect_state(&self, event: &str, allowed: &[State]) {
    let top = self.top();
    assert!(allowed.contains(&top), "{} fired in state {:?}", event, top);
  }

  fn push_state(&mut self, state: State) {
    self.states.push(state);
  }

  fn pop_state(&mut self, event: &str, expected: State) {
    let top = self.states.pop().expect("empty state stack");
    assert_eq!(top, expected, "{} closed state {:?}", event, top);
  }

  /// The first construct after the import section moves the document into
  /// its main body.
  fn enter_main(&mut self) {
    if self.top() == State::BeforeBody {
      *self.states.last_mut().unwrap() = State::InsideMain;
    }
  }

  fn in_rule_context(&self) -> bool {
    matches!(self.top(), State::InsideMain | State::InsideMedia | State::InsideBlock)
  }

  fn current_block(&self) -> NodeId {
    *self.open_blocks.last().expect("no open container block")
  }

  fn take_comments(&mut self) -> Vec<Comment> {
    std::mem::take(&mut self.pending_comments)
  }

  fn attach_comments(&mut self, node: NodeId, comments: Vec<Comment>) {
    for comment in comments {
      self.tree.add_comment(node, comment);
    }
  }

  // ---- value expression machinery ----

  fn value_node(&mut self, token: ValueToken, loc: SourceLocation) -> NodeId {
    let kind = match token {
      ValueToken::Literal(text) => NodeKind::Literal { text },
      ValueToken::Numeric { value, unit } => NodeKind::Numeric { value, unit },
      ValueToken::HexColor(hex) => NodeKind::HexColor { hex },
      ValueToken::String(value) => NodeKind::StringValue { value },
      ValueToken::UnicodeRange(range) => NodeKind::UnicodeRange { range },
      ValueToken::ConstantRef(name) => NodeKind::ConstantRef { name },
      ValueToken::LoopVariable(name) => NodeKind::LoopVariable { name },
      ValueToken::Priority => NodeKind::Priority {},
    };
    self.tree.alloc(kind, loc)
  }

  /// Appends a completed value to the innermost sink, folding a pending
  /// infix operator: if the last value is already a composite with the same
  /// operator, the new value joins it; otherwise a fresh composite wraps the
  /// two operands.
  fn append_value(&mut self, node: NodeId) {
    let sink = self.value_stack.last_mut().expect("value outside an expression");
    let pending = sink.pending_op.take();
    let function_like = sink.is_function_like();
    let list: &mut Vec<NodeId> = if function_like { &mut sink.current_arg } else { &mut sink.items };

    match pending {
      None => list.push(node),
      Some(op) => {
        let last = list.pop().expect("operator with no left operand");
        let join_existing = matches!(
          &self.tree[last].kind,
          NodeKind::Composite { operator, parenthesized: false, .. } if *operator == op
        );
        if join_existing {
          self.tree.append_child(last, node);
          // Reborrow: the sink reference above was invalidated by tree access.
          let sink = self.value_stack.last_mut().unwrap();
          let list = if function_like { &mut sink.current_arg } else { &mut sink.items };
          list.push(last);
        } else {
          let loc = SourceLocation::merge(self.tree[last].loc, self.tree[node].loc);
          let composite = self.tree.alloc(
            NodeKind::Composite {
              operator: op,
              values: vec![last, node],
              parenthesized: false,
            },
            loc,
          );
          let sink = self.value_stack.last_mut().unwrap();
          let list = if function_like { &mut sink.current_arg } else { &mut sink.items };
          list.push(composite);
        }
      }
    }
  }

  /// Closes the argument a function-like sink is accumulating. Multi-value
  /// arguments become a space composite.
  fn finalize_argument(&mut self, sink_index: usize) {
    let arg = std::mem::take(&mut self.value_stack[sink_index].current_arg);
    match arg.len() {
      0 => {}
      1 => self.value_stack[sink_index].items.push(arg[0]),
      _ => {
        let loc = SourceLocation::merge(self.tree[arg[0]].loc, self.tree[*arg.last().unwrap()].loc);
        let composite = self.tree.alloc(
          NodeKind::Composite {
            operator: CompositeOperator::Space,
            values: arg,
            parenthesized: false,
          },
          loc,
        );
        self.value_stack[sink_index].items.push(composite);
      }
    }
  }

  fn pop_sink(&mut self) -> ValueSink {
    let index = self.value_stack.len() - 1;
    if self.value_stack[index].is_function_like() {
      self.finalize_argument(index);
    }
    let sink = self.value_stack.pop().unwrap();
    assert!(sink.pending_op.is_none(), "expression ended after an operator");
    sink
  }

  fn value_expression_states(&self) -> [State; 3] {
    [State::InsidePropertyExpression, State::InsideExpressionAfterOperator, State::InsideDefinition]
  }

  // ---- selector machinery ----

  fn fold_selector_chain(&mut self, accum_parts: Vec<SelectorPart>) -> NodeId {
    assert!(!accum_parts.is_empty(), "selector chain with no parts");
    let mut tail: Option<NodeId> = None;
    for part in accum_parts.into_iter().rev() {
      let combinator = match (tail, part.combinator_after) {
        (Some(next), Some(kind)) => Some(self.tree.alloc(NodeKind::Combinator { kind, selector: next }, part.loc)),
        (None, None) => None,
        _ => panic!("combinator count does not match selector parts"),
      };
      tail = Some(self.tree.alloc(
        NodeKind::Selector {
          name: part.name,
          refiners: part.refiners,
          combinator,
        },
        part.loc,
      ));
    }
    tail.unwrap()
  }
}

impl<'a> DocumentEvents for TreeBuilder<'a> {
  fn on_document_start(&mut self, _source: SourceId) {
    self.expect_state("on_document_start", &[State::BeforeDocument]);
    *self.states.last_mut().unwrap() = State::BeforeBody;
    let body = self.tree.body();
    self.open_blocks.push(body);
  }

  fn on_document_end(&mut self) {
    self.expect_state("on_document_end", &[State::BeforeBody, State::InsideMain]);
    *self.states.last_mut().unwrap() = State::BeforeDocument;
    self.open_blocks.pop().expect("document end with no open body");
  }

  fn on_charset(&mut self, charset: String, _loc: SourceLocation) {
    self.expect_state("on_charset", &[State::BeforeBody]);
    let root = self.tree.root();
    if let NodeKind::Root { charset: slot, .. } = &mut self.tree[root].kind {
      // Only the first @charset counts; concatenated inputs often carry more.
      if slot.is_none() {
        *slot = Some(charset);
      }
    }
  }

  fn on_comment(&mut self, text: String, loc: SourceLocation) {
    self.pending_comments.push(Comment { text, loc });
  }
}

impl<'a> RuleEvents for TreeBuilder<'a> {
  fn on_ruleset_start(&mut self, loc: SourceLocation) {
    self.enter_main();
    assert!(self.in_rule_context(), "on_ruleset_start in state {:?}", self.top());
    let list = self.tree.alloc(NodeKind::SelectorList { selectors: Vec::new() }, loc);
    self.selector_stack.push(SelectorAccum {
      list: Some(list),
      parts: Vec::new(),
    });
    let comments = self.take_comments();
    self.pending_ruleset = Some((loc, comments));
  }

  fn on_selector_part(&mut self, name: String, loc: SourceLocation) {
    let refiners = self.tree.alloc(NodeKind::RefinerList { refiners: Vec::new() }, loc);
    let accum = self.selector_stack.last_mut().expect("selector part outside a selector");
    accum.parts.push(SelectorPart {
      name,
      refiners,
      combinator_after: None,
      loc,
    });
  }

  fn on_refiner(&mut self, refiner: RefinerEvent, loc: SourceLocation) {
    let kind = match refiner {
      RefinerEvent::Class(name) => NodeKind::ClassRefiner { name },
      RefinerEvent::Id(name) => NodeKind::IdRefiner { name },
      RefinerEvent::PseudoClass { name, argument } => NodeKind::PseudoClassRefiner {
        name,
        argument,
        not_selector: None,
      },
      RefinerEvent::PseudoElement(name) => NodeKind::PseudoElementRefiner { name },
      RefinerEvent::Attribute { name, operator, value } => NodeKind::AttributeRefiner { name, operator, value },
    };
    let node = self.tree.alloc(kind, loc);
    let accum = self.selector_stack.last().expect("refiner outside a selector");
    let part = accum.parts.last().expect("refiner before any selector part");
    self.tree.append_child(part.refiners, node);
  }

  fn on_pseudo_not_start(&mut self, _loc: SourceLocation) {
    self.selector_stack.push(SelectorAccum {
      list: None,
      parts: Vec::new(),
    });
  }

  fn on_pseudo_not_end(&mut self) {
    let accum = self.selector_stack.pop().expect("unbalanced :not");
    assert!(accum.list.is_none(), "on_pseudo_not_end closed a selector list");
    let inner = self.fold_selector_chain(accum.parts);
    let loc = self.tree[inner].loc;
    let refiner = self.tree.alloc(
      NodeKind::PseudoClassRefiner {
        name: "not".into(),
        argument: None,
        not_selector: Some(inner),
      },
      loc,
    );
    let outer = self.selector_stack.last().expect(":not outside a selector");
    let part = outer.parts.last().expect(":not before any selector part");
    self.tree.append_child(part.refiners, refiner);
  }

  fn on_combinator(&mut self, kind: CombinatorKind) {
    let accum = self.selector_stack.last_mut().expect("combinator outside a selector");
    let part = accum.parts.last_mut().expect("combinator before any selector part");
    assert!(part.combinator_after.is_none(), "two combinators after one selector part");
    part.combinator_after = Some(kind);
  }

  fn on_selector_end(&mut self) {
    let accum = self.selector_stack.last_mut().expect("selector end outside a selector");
    let parts = std::mem::take(&mut accum.parts);
    let list = accum.list.expect("selector end inside :not");
    let head = self.fold_selector_chain(parts);
    self.tree.append_child(list, head);
  }

  fn on_declarations_start(&mut self, loc: SourceLocation) {
    self.push_state(State::InsideDeclarationBlock);
    let block = self.tree.alloc(NodeKind::DeclarationBlock { children: Vec::new() }, loc);
    self.open_blocks.push(block);
  }

  fn on_declaration_start(&mut self, property: String, star_hack: bool, loc: SourceLocation) {
    self.expect_state("on_declaration_start", &[State::InsideDeclarationBlock]);
    self.push_state(State::InsidePropertyExpression);
    let comments = self.take_comments();
    self.pending_declaration = Some((property, star_hack, loc, comments));
    self.value_stack.push(ValueSink::new(SinkKind::Declaration));
  }

  fn on_declaration_end(&mut self, loc: SourceLocation) {
    self.pop_state("on_declaration_end", State::InsidePropertyExpression);
    let sink = self.pop_sink();
    assert!(matches!(sink.kind, SinkKind::Declaration), "declaration end closed a non-declaration sink");
    let (name, star_hack, start_loc, comments) = self.pending_declaration.take().expect("declaration end without start");
    let property = self.tree.alloc(NodeKind::Property { name: name.to_ascii_lowercase() }, start_loc);
    let value = self.tree.alloc(NodeKind::PropertyValue { values: sink.items }, loc);
    let declaration = self.tree.alloc(
      NodeKind::Declaration {
        property,
        value,
        star_hack,
      },
      SourceLocation::merge(start_loc, loc),
    );
    self.attach_comments(declaration, comments);
    let block = self.current_block();
    self.tree.append_child(block, declaration);
  }

  fn on_declaration_abandon(&mut self) {
    // Unwind every expression state and sink the malformed declaration left
    // open; the nodes stay detached in the arena and drop with the tree.
    while matches!(self.top(), State::InsidePropertyExpression | State::InsideExpressionAfterOperator) {
      self.states.pop();
    }
    while let Some(sink) = self.value_stack.pop() {
      if matches!(sink.kind, SinkKind::Declaration) {
        break;
      }
    }
    self.pending_declaration = None;
  }

  fn on_declarations_end(&mut self) {
    self.pop_state("on_declarations_end", State::InsideDeclarationBlock);
    let block = self.open_blocks.pop().expect("declarations end with no open block");
    self.last_closed_block = Some(block);
  }

  fn on_ruleset_end(&mut self, loc: SourceLocation) {
    assert!(self.in_rule_context(), "on_ruleset_end in state {:?}", self.top());
    let accum = self.selector_stack.pop().expect("ruleset end without selectors");
    let selectors = accum.list.expect("ruleset end inside :not");
    let declarations = self.last_closed_block.take().expect("ruleset end without declarations");
    let (start_loc, comments) = self.pending_ruleset.take().expect("ruleset end without start");
    let ruleset = self.tree.alloc(
      NodeKind::Ruleset { selectors, declarations },
      SourceLocation::merge(start_loc, loc),
    );
    self.attach_comments(ruleset, comments);
    let block = self.current_block();
    self.tree.append_child(block, ruleset);
  }

  fn on_ruleset_abandon(&mut self) {
    // Drop whatever was recognized so far. If the declaration block was
    // already open, close it as well, and unwind any :not accumulator the
    // selector error left behind.
    if self.top() == State::InsideDeclarationBlock {
      self.states.pop();
      self.open_blocks.pop();
    }
    while let Some(accum) = self.selector_stack.pop() {
      if accum.list.is_some() {
        break;
      }
    }
    self.pending_ruleset = None;
    self.last_closed_block = None;
    self.pending_comments.clear();
  }
}

impl<'a> ValueEvents for TreeBuilder<'a> {
  fn on_value(&mut self, value: ValueToken, loc: SourceLocation) {
    self.expect_state("on_value", &self.value_expression_states());
    if self.top() == State::InsideExpressionAfterOperator {
      self.states.pop();
    }
    let node = self.value_node(value, loc);
    self.append_value(node);
  }

  fn on_operator(&mut self, operator: CompositeOperator, loc: SourceLocation) {
    let _ = loc;
    self.expect_state("on_operator", &[State::InsidePropertyExpression, State::InsideDefinition]);
    let sink = self.value_stack.last_mut().expect("operator outside an expression");
    if sink.is_function_like() && operator == CompositeOperator::Comma {
      // Commas inside function arguments are structural separators.
      let index = self.value_stack.len() - 1;
      self.finalize_argument(index);
      return;
    }
    assert!(sink.pending_op.is_none(), "two operators in a row");
    let has_operand = if sink.is_function_like() { !sink.current_arg.is_empty() } else { !sink.items.is_empty() };
    assert!(has_operand, "operator with no left operand");
    sink.pending_op = Some(operator);
    self.push_state(State::InsideExpressionAfterOperator);
  }

  fn on_function_start(&mut self, name: String, loc: SourceLocation) {
    let _ = loc;
    self.expect_state("on_function_start", &self.value_expression_states());
    if self.top() == State::InsideExpressionAfterOperator {
      self.states.pop();
      // The function value will satisfy the pending operator when it closes.
      self.push_state(State::InsideExpressionAfterOperator);
    }
    self.push_state(State::InsidePropertyExpression);
    self.value_stack.push(ValueSink::new(SinkKind::Function { name }));
  }

  fn on_function_end(&mut self, loc: SourceLocation) {
    self.pop_state("on_function_end", State::InsidePropertyExpression);
    let sink = self.pop_sink();
    let name = match sink.kind {
      SinkKind::Function { name } => name,
      _ => panic!("function end closed a non-function sink"),
    };
    let node = match FunctionTag::from_name(&name) {
      Some(tag) => self.tree.alloc(NodeKind::Function { tag, args: sink.items }, loc),
      None => self.tree.alloc(
        NodeKind::CustomFunction {
          name,
          args: sink.items,
          cached: None,
        },
        loc,
      ),
    };
    if self.top() == State::InsideExpressionAfterOperator {
      self.states.pop();
    }
    self.append_value(node);
  }

  fn on_group_start(&mut self, loc: SourceLocation) {
    let _ = loc;
    self.expect_state("on_group_start", &self.value_expression_states());
    if self.top() == State::InsideExpressionAfterOperator {
      self.states.pop();
      self.push_state(State::InsideExpressionAfterOperator);
    }
    self.push_state(State::InsidePropertyExpression);
    self.value_stack.push(ValueSink::new(SinkKind::Group));
  }

  fn on_group_end(&mut self, loc: SourceLocation) {
    self.pop_state("on_group_end", State::InsidePropertyExpression);
    let sink = self.pop_sink();
    assert!(matches!(sink.kind, SinkKind::Group), "group end closed a non-group sink");
    let node = match sink.items.len() {
      0 => self.tree.alloc(
        NodeKind::Composite {
          operator: CompositeOperator::Space,
          values: Vec::new(),
          parenthesized: true,
        },
        loc,
      ),
      1 => {
        let only = sink.items[0];
        if let NodeKind::Composite { parenthesized, .. } = &mut self.tree[only].kind {
          *parenthesized = true;
        }
        only
      }
      _ => self.tree.alloc(
        NodeKind::Composite {
          operator: CompositeOperator::Space,
          values: sink.items,
          parenthesized: true,
        },
        loc,
      ),
    };
    if self.top() == State::InsideExpressionAfterOperator {
      self.states.pop();
    }
    self.append_value(node);
  }
}

impl<'a> AtRuleEvents for TreeBuilder<'a> {
  fn on_import_start(&mut self, _loc: SourceLocation) {
    self.expect_state("on_import_start", &[State::BeforeBody]);
    self.push_state(State::InsidePropertyExpression);
    self.pending_import = Some(self.take_comments());
    self.value_stack.push(ValueSink::new(SinkKind::Import));
  }

  fn on_import_end(&mut self, loc: SourceLocation) {
    self.pop_state("on_import_end", State::InsidePropertyExpression);
    let sink = self.pop_sink();
    assert!(matches!(sink.kind, SinkKind::Import), "import end closed a non-import sink");
    let comments = self.pending_import.take().expect("import end without start");
    let import = self.tree.alloc(NodeKind::Import { params: sink.items }, loc);
    self.attach_comments(import, comments);
    let block = self.tree.import_block();
    self.tree.append_child(block, import);
  }

  fn on_import_abandon(&mut self) {
    while matches!(self.top(), State::InsidePropertyExpression | State::InsideExpressionAfterOperator) {
      self.states.pop();
    }
    while let Some(sink) = self.value_stack.pop() {
      if matches!(sink.kind, SinkKind::Import) {
        break;
      }
    }
    self.pending_import = None;
  }

  fn on_definition_start(&mut self, name: String, _loc: SourceLocation) {
    self.enter_main();
    assert!(
      self.in_rule_context() || self.top() == State::InsideDeclarationBlock,
      "on_definition_start in state {:?}",
      self.top()
    );
    self.push_state(State::InsideDefinition);
    let comments = self.take_comments();
    self.pending_definition = Some((name, comments));
    self.value_stack.push(ValueSink::new(SinkKind::Definition));
  }

  fn on_definition_end(&mut self, loc: SourceLocation) {
    self.pop_state("on_definition_end", State::InsideDefinition);
    let sink = self.pop_sink();
    assert!(matches!(sink.kind, SinkKind::Definition), "definition end closed a non-definition sink");
    let (name, comments) = self.pending_definition.take().expect("definition end without start");
    let definition = self.tree.alloc(NodeKind::Definition { name, values: sink.items }, loc);
    self.attach_comments(definition, comments);
    let block = self.current_block();
    self.tree.append_child(block, definition);
  }

  fn on_definition_abandon(&mut self) {
    while matches!(
      self.top(),
      State::InsidePropertyExpression | State::InsideExpressionAfterOperator | State::InsideDefinition
    ) {
      self.states.pop();
    }
    while let Some(sink) = self.value_stack.pop() {
      if matches!(sink.kind, SinkKind::Definition) {
        break;
      }
    }
    self.pending_definition = None;
  }

  fn on_media_start(&mut self, prelude: String, loc: SourceLocation) {
    self.enter_main();
    self.expect_state("on_media_start", &[State::InsideMain, State::InsideMedia, State::InsideBlock]);
    self.push_state(State::InsideMedia);
    let comments = self.take_comments();
    self.pending_media.push((prelude, comments));
    let block = self.tree.alloc(NodeKind::Block { children: Vec::new() }, loc);
    self.open_blocks.push(block);
  }

  fn on_media_end(&mut self, loc: SourceLocation) {
    self.pop_state("on_media_end", State::InsideMedia);
    let block = self.open_blocks.pop().expect("media end with no open block");
    let (prelude, comments) = self.pending_media.pop().expect("media end without start");
    let params = if prelude.is_empty() {
      Vec::new()
    } else {
      vec![self.tree.alloc(NodeKind::Literal { text: prelude }, loc)]
    };
    let media = self.tree.alloc(NodeKind::Media { params, block }, loc);
    self.attach_comments(media, comments);
    let outer = self.current_block();
    self.tree.append_child(outer, media);
  }

  fn on_page_start(&mut self, pseudo: Option<String>, _loc: SourceLocation) {
    self.enter_main();
    assert!(self.in_rule_context(), "on_page_start in state {:?}", self.top());
    let comments = self.take_comments();
    self.pending_page.push((pseudo, comments));
  }

  fn on_page_end(&mut self, loc: SourceLocation) {
    let (pseudo, comments) = self.pending_page.pop().expect("page end without start");
    let block = self.last_closed_block.take().expect("page end without declarations");
    let page = self.tree.alloc(NodeKind::Page { pseudo, block }, loc);
    self.attach_comments(page, comments);
    let outer = self.current_block();
    self.tree.append_child(outer, page);
  }

  fn on_font_face_start(&mut self, _loc: SourceLocation) {
    self.enter_main();
    assert!(self.in_rule_context(), "on_font_face_start in state {:?}", self.top());
    let comments = self.take_comments();
    self.pending_font_face.push(comments);
  }

  fn on_font_face_end(&mut self, loc: SourceLocation) {
    let comments = self.pending_font_face.pop().expect("font-face end without start");
    let block = self.last_closed_block.take().expect("font-face end without declarations");
    let font_face = self.tree.alloc(NodeKind::FontFace { block }, loc);
    self.attach_comments(font_face, comments);
    let outer = self.current_block();
    self.tree.append_child(outer, font_face);
  }

  fn on_conditional_block_start(&mut self, loc: SourceLocation) {
    self.enter_main();
    assert!(self.in_rule_context(), "on_conditional_block_start in state {:?}", self.top());
    self.push_state(State::InsideConditionalBlock);
    let comments = self.take_comments();
    let block = self.tree.alloc(NodeKind::ConditionalBlock { arms: Vec::new() }, loc);
    self.attach_comments(block, comments);
    self.open_conditionals.push(block);
  }

  fn on_conditional_rule_start(&mut self, kind: ConditionalKind, condition: Option<CondExpr>, loc: SourceLocation) {
    self.expect_state("on_conditional_rule_start", &[State::InsideConditionalBlock]);
    assert_eq!(kind == ConditionalKind::Else, condition.is_none(), "condition does not match arm kind");
    self.push_state(State::InsideBlock);
    let condition = condition.map(|c| self.build_bool_expr(c, loc));
    self.pending_conditional_rules.push((kind, condition, loc));
    let block = self.tree.alloc(NodeKind::Block { children: Vec::new() }, loc);
    self.open_blocks.push(block);
  }

  fn on_conditional_rule_end(&mut self) {
    self.pop_state("on_conditional_rule_end", State::InsideBlock);
    let block = self.open_blocks.pop().expect("conditional rule end with no open block");
    let (kind, condition, loc) = self.pending_conditional_rules.pop().expect("conditional rule end without start");
    let rule = self.tree.alloc(NodeKind::ConditionalRule { kind, condition, block }, loc);
    let conditional = *self.open_conditionals.last().expect("conditional rule outside a conditional block");
    self.tree.append_child(conditional, rule);
  }

  fn on_conditional_block_end(&mut self) {
    self.pop_state("on_conditional_block_end", State::InsideConditionalBlock);
    let conditional = self.open_conditionals.pop().expect("conditional block end without start");
    let outer = self.current_block();
    self.tree.append_child(outer, conditional);
  }

  fn on_mixin_definition_start(&mut self, name: String, params: Vec<String>, _loc: SourceLocation) {
    self.enter_main();
    self.expect_state("on_mixin_definition_start", &[State::InsideMain, State::InsideBlock]);
    let comments = self.take_comments();
    self.pending_mixin_definition.push((name, params, comments));
  }

  fn on_mixin_definition_end(&mut self, loc: SourceLocation) {
    let (name, params, comments) = self.pending_mixin_definition.pop().expect("mixin definition end without start");
    let block = self.last_closed_block.take().expect("mixin definition end without declarations");
    let definition = self.tree.alloc(NodeKind::MixinDefinition { name, params, block }, loc);
    self.attach_comments(definition, comments);
    let outer = self.current_block();
    self.tree.append_child(outer, definition);
  }

  fn on_mixin_start(&mut self, name: String, _loc: SourceLocation) {
    self.expect_state("on_mixin_start", &[State::InsideDeclarationBlock]);
    self.push_state(State::InsidePropertyExpression);
    let comments = self.take_comments();
    self.pending_mixin = Some((name, comments));
    self.value_stack.push(ValueSink::new(SinkKind::Mixin));
  }

  fn on_mixin_end(&mut self, loc: SourceLocation) {
    self.pop_state("on_mixin_end", State::InsidePropertyExpression);
    let sink = self.pop_sink();
    assert!(matches!(sink.kind, SinkKind::Mixin), "mixin end closed a non-mixin sink");
    let (name, comments) = self.pending_mixin.take().expect("mixin end without start");
    let mixin = self.tree.alloc(NodeKind::Mixin { name, args: sink.items }, loc);
    self.attach_comments(mixin, comments);
    let block = self.current_block();
    self.tree.append_child(block, mixin);
  }

  fn on_mixin_abandon(&mut self) {
    while matches!(self.top(), State::InsidePropertyExpression | State::InsideExpressionAfterOperator) {
      self.states.pop();
    }
    while let Some(sink) = self.value_stack.pop() {
      if matches!(sink.kind, SinkKind::Mixin) {
        break;
      }
    }
    self.pending_mixin = None;
  }

  fn on_keyframes_start(&mut self, prefix: VendorPrefix, name: String, loc: SourceLocation) {
    self.enter_main();
    self.expect_state("on_keyframes_start", &[State::InsideMain, State::InsideMedia, State::InsideBlock]);
    self.push_state(State::InsideBlock);
    let comments = self.take_comments();
    self.pending_keyframes.push((prefix, name, comments));
    let block = self.tree.alloc(NodeKind::Block { children: Vec::new() }, loc);
    self.open_blocks.push(block);
  }

  fn on_keyframe_ruleset_start(&mut self, keys: Vec<KeyframeKey>, loc: SourceLocation) {
    self.expect_state("on_keyframe_ruleset_start", &[State::InsideBlock]);
    let key_nodes = keys
      .into_iter()
      .map(|key| self.tree.alloc(NodeKind::Key { key }, loc))
      .collect();
    let list = self.tree.alloc(NodeKind::KeyList { keys: key_nodes }, loc);
    let comments = self.take_comments();
    self.pending_keyframe_rulesets.push((list, comments));
  }

  fn on_keyframe_ruleset_end(&mut self) {
    let (keys, comments) = self.pending_keyframe_rulesets.pop().expect("keyframe ruleset end without start");
    let block = self.last_closed_block.take().expect("keyframe ruleset end without declarations");
    let loc = self.tree[keys].loc;
    let ruleset = self.tree.alloc(NodeKind::KeyframeRuleset { keys, block }, loc);
    self.attach_comments(ruleset, comments);
    let outer = self.current_block();
    self.tree.append_child(outer, ruleset);
  }

  fn on_keyframes_end(&mut self, loc: SourceLocation) {
    self.pop_state("on_keyframes_end", State::InsideBlock);
    let block = self.open_blocks.pop().expect("keyframes end with no open block");
    let (prefix, name, comments) = self.pending_keyframes.pop().expect("keyframes end without start");
    let keyframes = self.tree.alloc(NodeKind::Keyframes { prefix, name, block }, loc);
    self.attach_comments(keyframes, comments);
    let outer = self.current_block();
    self.tree.append_child(outer, keyframes);
  }

  fn on_component_start(&mut self, name: String, parent: Option<String>, is_abstract: bool, loc: SourceLocation) {
    self.enter_main();
    self.expect_state("on_component_start", &[State::InsideMain]);
    self.push_state(State::InsideBlock);
    let comments = self.take_comments();
    self.pending_components.push((name, parent, is_abstract, comments));
    let block = self.tree.alloc(NodeKind::Block { children: Vec::new() }, loc);
    self.open_blocks.push(block);
  }

  fn on_component_end(&mut self, loc: SourceLocation) {
    self.pop_state("on_component_end", State::InsideBlock);
    let block = self.open_blocks.pop().expect("component end with no open block");
    let (name, parent, is_abstract, comments) = self.pending_components.pop().expect("component end without start");
    let component = self.tree.alloc(
      NodeKind::Component {
        name,
        parent,
        is_abstract,
        block,
      },
      loc,
    );
    self.attach_comments(component, comments);
    let outer = self.current_block();
    self.tree.append_child(outer, component);
  }

  fn on_for_loop_start(
    &mut self,
    variable: String,
    from: ValueToken,
    to: ValueToken,
    step: Option<ValueToken>,
    loc: SourceLocation,
  ) {
    self.enter_main();
    self.expect_state("on_for_loop_start", &[State::InsideMain, State::InsideMedia, State::InsideBlock]);
    self.push_state(State::InsideBlock);
    let comments = self.take_comments();
    let from = self.value_node(from, loc);
    let to = self.value_node(to, loc);
    let step = step.map(|s| self.value_node(s, loc));
    let loop_id = self.next_loop_id;
    self.next_loop_id += 1;
    self.pending_loops.push((variable, from, to, step, loop_id, comments));
    let block = self.tree.alloc(NodeKind::Block { children: Vec::new() }, loc);
    self.open_blocks.push(block);
  }

  fn on_for_loop_end(&mut self, loc: SourceLocation) {
    self.pop_state("on_for_loop_end", State::InsideBlock);
    let block = self.open_blocks.pop().expect("for loop end with no open block");
    let (variable, from, to, step, loop_id, comments) = self.pending_loops.pop().expect("for loop end without start");
    let for_loop = self.tree.alloc(
      NodeKind::ForLoop {
        variable,
        from,
        to,
        step,
        block,
        loop_id,
      },
      loc,
    );
    self.attach_comments(for_loop, comments);
    let outer = self.current_block();
    self.tree.append_child(outer, for_loop);
  }

  fn on_provide(&mut self, name: String, loc: SourceLocation) {
    self.enter_main();
    assert!(self.in_rule_context(), "on_provide in state {:?}", self.top());
    let comments = self.take_comments();
    let provide = self.tree.alloc(NodeKind::Provide { name }, loc);
    self.attach_comments(provide, comments);
    let block = self.current_block();
    self.tree.append_child(block, provide);
  }

  fn on_require(&mut self, name: String, loc: SourceLocation) {
    self.enter_main();
    assert!(self.in_rule_context(), "on_require in state {:?}", self.top());
    let comments = self.take_comments();
    let require = self.tree.alloc(NodeKind::Require { name }, loc);
    self.attach_comments(require, comments);
    let block = self.current_block();
    self.tree.append_child(block, require);
  }

  fn on_unknown_at_rule_start(&mut self, name: String, prelude: String, has_block: bool, loc: SourceLocation) {
    self.enter_main();
    assert!(
      self.in_rule_context() || self.top() == State::InsideDeclarationBlock,
      "on_unknown_at_rule_start in state {:?}",
      self.top()
    );
    let params = if prelude.is_empty() {
      Vec::new()
    } else {
      vec![self.tree.alloc(NodeKind::Literal { text: prelude }, loc)]
    };
    let comments = self.take_comments();
    if has_block {
      self.push_state(State::InsideBlock);
      let block = self.tree.alloc(NodeKind::Block { children: Vec::new() }, loc);
      self.open_blocks.push(block);
      self.pending_unknown.push((name, params, Some(block), comments));
    } else {
      self.pending_unknown.push((name, params, None, comments));
    }
  }

  fn on_unknown_at_rule_end(&mut self, loc: SourceLocation) {
    let (name, params, block, comments) = self.pending_unknown.pop().expect("unknown at-rule end without start");
    if block.is_some() {
      self.pop_state("on_unknown_at_rule_end", State::InsideBlock);
      self.open_blocks.pop().expect("unknown at-rule end with no open block");
    }
    let rule = self.tree.alloc(NodeKind::UnknownAtRule { name, params, block }, loc);
    self.attach_comments(rule, comments);
    let outer = self.current_block();
    self.tree.append_child(outer, rule);
  }
}

impl<'a> TreeBuilder<'a> {
  fn build_bool_expr(&mut self, expr: CondExpr, loc: SourceLocation) -> NodeId {
    match expr {
      CondExpr::Constant(name) => self.tree.alloc(NodeKind::BoolConstant { name }, loc),
      CondExpr::Not(operand) => {
        let operand = self.build_bool_expr(*operand, loc);
        self.tree.alloc(NodeKind::BoolNot { operand }, loc)
      }
      CondExpr::And(left, right) => {
        let left = self.build_bool_expr(*left, loc);
        let right = self.build_bool_expr(*right, loc);
        self.tree.alloc(
          NodeKind::BoolBinary {
            operator: crate::tree::BoolOperator::And,
            left,
            right,
          },
          loc,
        )
      }
      CondExpr::Or(left, right) => {
        let left = self.build_bool_expr(*left, loc);
        let right = self.build_bool_expr(*right, loc);
        self.tree.alloc(
          NodeKind::BoolBinary {
            operator: crate::tree::BoolOperator::Or,
            left,
            right,
          },
          loc,
        )
      }
    }
  }
}
