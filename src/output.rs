//! Tree-to-CSS serialization.
//!
//! Writes any tree, processed or not: GSS constructs that survive until
//! serialization (`@def`, `@if`, `@mixin`, ...) print in source form, which
//! is what the debug output format is for. Re-parsing a pretty print yields
//! a structurally equivalent tree.

use crate::error::PrinterError;
use crate::printer::Printer;
use crate::tree::{
  BoolOperator, CombinatorKind, CompositeOperator, ConditionalKind, KeyframeKey, NodeId, NodeKind, NodeTag, Tree,
};
use cssparser::{serialize_identifier, serialize_string};
use std::fmt::Write;

pub(crate) fn write_root<W: Write>(tree: &Tree, dest: &mut Printer<W>) -> Result<(), PrinterError> {
  let root = tree.root();
  let (charset, imports, body) = match &tree[root].kind {
    NodeKind::Root { charset, imports, body } => (charset.clone(), *imports, *body),
    _ => unreachable!("root node is not a Root"),
  };

  let mut first = true;
  if let Some(charset) = charset {
    dest.write_str("@charset ")?;
    serialize_string(&charset, dest)?;
    dest.write_char(';')?;
    dest.newline()?;
    first = false;
  }

  write_comments(tree, root, dest)?;
  for import in tree.children(imports) {
    if !first {
      dest.newline()?;
    }
    first = false;
    write_comments(tree, import, dest)?;
    write_node(tree, import, dest)?;
    dest.newline()?;
  }
  for rule in tree.children(body) {
    if !first {
      dest.newline()?;
    }
    first = false;
    write_comments(tree, rule, dest)?;
    write_node(tree, rule, dest)?;
    dest.newline()?;
  }
  Ok(())
}

fn write_comments<W: Write>(tree: &Tree, id: NodeId, dest: &mut Printer<W>) -> Result<(), PrinterError> {
  for comment in &tree[id].comments {
    if dest.preserve_comments || (dest.preserve_important_comments && comment.is_important()) {
      dest.write_str("/*")?;
      dest.write_str(&comment.text)?;
      dest.write_str("*/")?;
      if dest.preserve_comments {
        dest.newline()?;
      }
    }
  }
  Ok(())
}

/// Writes the rules of a block, one per line.
fn write_rules<W: Write>(tree: &Tree, block: NodeId, dest: &mut Printer<W>) -> Result<(), PrinterError> {
  let children = tree.children(block);
  for (i, &rule) in children.iter().enumerate() {
    if i > 0 {
      dest.newline()?;
    }
    write_comments(tree, rule, dest)?;
    write_node(tree, rule, dest)?;
  }
  Ok(())
}

fn write_braced_rules<W: Write>(tree: &Tree, block: NodeId, dest: &mut Printer<W>) -> Result<(), PrinterError> {
  dest.whitespace()?;
  dest.write_char('{')?;
  dest.indent();
  dest.newline()?;
  write_rules(tree, block, dest)?;
  dest.dedent();
  dest.newline()?;
  dest.write_char('}')
}

fn write_declaration_block<W: Write>(tree: &Tree, block: NodeId, dest: &mut Printer<W>) -> Result<(), PrinterError> {
  dest.whitespace()?;
  dest.write_char('{')?;
  dest.indent();
  dest.newline()?;
  let children = tree.children(block);
  for (i, &decl) in children.iter().enumerate() {
    if i > 0 {
      dest.newline()?;
    }
    write_comments(tree, decl, dest)?;
    write_node(tree, decl, dest)?;
    // At-rules other than @mixin terminate themselves.
    let needs_semicolon = matches!(tree[decl].kind.tag(), NodeTag::Declaration | NodeTag::Mixin);
    if needs_semicolon && !(dest.minify && i + 1 == children.len()) {
      dest.write_char(';')?;
    }
  }
  dest.dedent();
  dest.newline()?;
  dest.write_char('}')
}

fn write_values<W: Write>(tree: &Tree, values: &[NodeId], dest: &mut Printer<W>) -> Result<(), PrinterError> {
  for (i, &value) in values.iter().enumerate() {
    if i > 0 {
      // No space is needed ahead of `!important` in minified output.
      if !(dest.minify && tree[value].kind.tag() == NodeTag::Priority) {
        dest.write_char(' ')?;
      }
    }
    write_node(tree, value, dest)?;
  }
  Ok(())
}

fn write_arguments<W: Write>(tree: &Tree, args: &[NodeId], dest: &mut Printer<W>) -> Result<(), PrinterError> {
  for (i, &arg) in args.iter().enumerate() {
    if i > 0 {
      dest.delim(',', false)?;
    }
    write_node(tree, arg, dest)?;
  }
  Ok(())
}

fn write_number<W: Write>(value: f64, dest: &mut Printer<W>) -> Result<(), PrinterError> {
  if value == 0.0 {
    return dest.write_char('0');
  }
  if value.fract() == 0.0 && value.abs() < 1e15 {
    return dest.write_str(&format!("{}", value as i64));
  }
  let mut s = format!("{}", value);
  if let Some(stripped) = s.strip_prefix("0.") {
    s = format!(".{}", stripped);
  } else if let Some(stripped) = s.strip_prefix("-0.") {
    s = format!("-.{}", stripped);
  }
  dest.write_str(&s)
}

fn write_bool_expr<W: Write>(tree: &Tree, id: NodeId, dest: &mut Printer<W>) -> Result<(), PrinterError> {
  match &tree[id].kind {
    NodeKind::BoolConstant { name } => dest.write_str(name),
    NodeKind::BoolNot { operand } => {
      dest.write_char('!')?;
      write_bool_operand(tree, *operand, dest)
    }
    NodeKind::BoolBinary { operator, left, right } => {
      write_bool_operand(tree, *left, dest)?;
      dest.write_str(match operator {
        BoolOperator::And => " && ",
        BoolOperator::Or => " || ",
      })?;
      write_bool_operand(tree, *right, dest)
    }
    kind => panic!("not a boolean expression: {:?}", kind.tag()),
  }
}

fn write_bool_operand<W: Write>(tree: &Tree, id: NodeId, dest: &mut Printer<W>) -> Result<(), PrinterError> {
  if tree[id].kind.tag() == NodeTag::BoolBinary {
    dest.write_char('(')?;
    write_bool_expr(tree, id, dest)?;
    dest.write_char(')')
  } else {
    write_bool_expr(tree, id, dest)
  }
}

pub(crate) fn write_node<W: Write>(tree: &Tree, id: NodeId, dest: &mut Printer<W>) -> Result<(), PrinterError> {
  let node = &tree[id];
  match &node.kind {
    NodeKind::Root { .. } => write_root(tree, dest),
    NodeKind::ImportBlock { .. } | NodeKind::Block { .. } => write_rules(tree, id, dest),
    NodeKind::DeclarationBlock { .. } => write_declaration_block(tree, id, dest),

    NodeKind::Import { params } => {
      dest.add_mapping(&node.loc);
      dest.write_str("@import ")?;
      write_values(tree, params, dest)?;
      dest.write_char(';')
    }

    NodeKind::Ruleset { selectors, declarations } => {
      dest.add_mapping(&node.loc);
      write_node(tree, *selectors, dest)?;
      write_declaration_block(tree, *declarations, dest)
    }

    NodeKind::SelectorList { selectors } => {
      for (i, &selector) in selectors.iter().enumerate() {
        if i > 0 {
          dest.delim(',', false)?;
        }
        write_node(tree, selector, dest)?;
      }
      Ok(())
    }

    NodeKind::Selector { name, refiners, combinator } => {
      dest.write_str(name)?;
      write_node(tree, *refiners, dest)?;
      if let Some(combinator) = combinator {
        write_node(tree, *combinator, dest)?;
      }
      Ok(())
    }

    NodeKind::RefinerList { refiners } => {
      for &refiner in refiners {
        write_node(tree, refiner, dest)?;
      }
      Ok(())
    }

    NodeKind::ClassRefiner { name } => {
      dest.write_char('.')?;
      serialize_identifier(name, dest)?;
      Ok(())
    }

    NodeKind::IdRefiner { name } => {
      dest.write_char('#')?;
      serialize_identifier(name, dest)?;
      Ok(())
    }

    NodeKind::PseudoClassRefiner { name, argument, not_selector } => {
      dest.write_char(':')?;
      dest.write_str(name)?;
      if let Some(inner) = not_selector {
        dest.write_char('(')?;
        write_node(tree, *inner, dest)?;
        dest.write_char(')')?;
      } else if let Some(argument) = argument {
        dest.write_char('(')?;
        dest.write_str(argument)?;
        dest.write_char(')')?;
      }
      Ok(())
    }

    NodeKind::PseudoElementRefiner { name } => {
      dest.write_str("::")?;
      dest.write_str(name)
    }

    NodeKind::AttributeRefiner { name, operator, value } => {
      dest.write_char('[')?;
      serialize_identifier(name, dest)?;
      if let (Some(operator), Some(value)) = (operator, value) {
        dest.write_str(operator.as_str())?;
        serialize_string(value, dest)?;
      }
      dest.write_char(']')
    }

    NodeKind::Combinator { kind, selector } => {
      match kind {
        CombinatorKind::Descendant => dest.write_char(' ')?,
        CombinatorKind::Child => dest.delim('>', true)?,
        CombinatorKind::AdjacentSibling => dest.delim('+', true)?,
        CombinatorKind::GeneralSibling => dest.delim('~', true)?,
      }
      write_node(tree, *selector, dest)
    }

    NodeKind::Declaration { property, value, star_hack } => {
      dest.add_mapping(&node.loc);
      if *star_hack {
        dest.write_char('*')?;
      }
      write_node(tree, *property, dest)?;
      dest.write_char(':')?;
      dest.whitespace()?;
      write_node(tree, *value, dest)
    }

    NodeKind::Property { name } => dest.write_str(name),

    NodeKind::PropertyValue { values } => write_values(tree, values, dest),

    NodeKind::Literal { text } => dest.write_str(text),

    NodeKind::Numeric { value, unit } => {
      write_number(*value, dest)?;
      dest.write_str(unit)
    }

    NodeKind::HexColor { hex } => {
      dest.write_char('#')?;
      dest.write_str(&hex.to_ascii_lowercase())
    }

    NodeKind::StringValue { value } => {
      serialize_string(value, dest)?;
      Ok(())
    }

    NodeKind::UnicodeRange { range } => dest.write_str(range),

    NodeKind::ConstantRef { name } => dest.write_str(name),

    NodeKind::LoopVariable { name } => {
      dest.write_char('$')?;
      dest.write_str(name)
    }

    NodeKind::Function { tag, args } => {
      dest.write_str(tag.name())?;
      dest.write_char('(')?;
      write_arguments(tree, args, dest)?;
      dest.write_char(')')
    }

    NodeKind::CustomFunction { name, args, .. } => {
      dest.write_str(name)?;
      dest.write_char('(')?;
      write_arguments(tree, args, dest)?;
      dest.write_char(')')
    }

    NodeKind::Composite { operator, values, parenthesized } => {
      if *parenthesized {
        dest.write_char('(')?;
      }
      for (i, &value) in values.iter().enumerate() {
        if i > 0 {
          match operator {
            CompositeOperator::Space | CompositeOperator::Unknown => dest.write_char(' ')?,
            CompositeOperator::Comma => dest.delim(',', false)?,
            CompositeOperator::Slash => dest.write_char('/')?,
            CompositeOperator::Equals => dest.write_char('=')?,
            // The CSS grammar requires whitespace around additive operators.
            CompositeOperator::Plus => dest.write_str(" + ")?,
            CompositeOperator::Minus => dest.write_str(" - ")?,
            CompositeOperator::Mul => dest.delim('*', true)?,
            CompositeOperator::Div => dest.delim('/', true)?,
          }
        }
        write_node(tree, value, dest)?;
      }
      if *parenthesized {
        dest.write_char(')')?;
      }
      Ok(())
    }

    NodeKind::Priority {} => dest.write_str("!important"),

    NodeKind::ConditionalBlock { arms } => {
      for (i, &arm) in arms.iter().enumerate() {
        if i > 0 {
          dest.whitespace()?;
        }
        write_node(tree, arm, dest)?;
      }
      Ok(())
    }

    NodeKind::ConditionalRule { kind, condition, block } => {
      dest.add_mapping(&node.loc);
      dest.write_str(match kind {
        ConditionalKind::If => "@if ",
        ConditionalKind::ElseIf => "@elseif ",
        ConditionalKind::Else => "@else",
      })?;
      if let Some(condition) = condition {
        write_bool_expr(tree, *condition, dest)?;
      }
      write_braced_rules(tree, *block, dest)
    }

    NodeKind::BoolConstant { .. } | NodeKind::BoolNot { .. } | NodeKind::BoolBinary { .. } => {
      write_bool_expr(tree, id, dest)
    }

    NodeKind::Definition { name, values } => {
      dest.add_mapping(&node.loc);
      dest.write_str("@def ")?;
      dest.write_str(name)?;
      dest.write_char(' ')?;
      write_values(tree, values, dest)?;
      dest.write_char(';')
    }

    NodeKind::MixinDefinition { name, params, block } => {
      dest.add_mapping(&node.loc);
      dest.write_str("@defmixin ")?;
      dest.write_str(name)?;
      dest.write_char('(')?;
      for (i, param) in params.iter().enumerate() {
        if i > 0 {
          dest.delim(',', false)?;
        }
        dest.write_str(param)?;
      }
      dest.write_char(')')?;
      write_declaration_block(tree, *block, dest)
    }

    NodeKind::Mixin { name, args } => {
      dest.add_mapping(&node.loc);
      dest.write_str("@mixin ")?;
      dest.write_str(name)?;
      dest.write_char('(')?;
      write_arguments(tree, args, dest)?;
      dest.write_char(')')
    }

    NodeKind::Media { params, block } => {
      dest.add_mapping(&node.loc);
      dest.write_str("@media ")?;
      write_values(tree, params, dest)?;
      write_braced_rules(tree, *block, dest)
    }

    NodeKind::Page { pseudo, block } => {
      dest.add_mapping(&node.loc);
      dest.write_str("@page")?;
      if let Some(pseudo) = pseudo {
        dest.write_str(" :")?;
        dest.write_str(pseudo)?;
      }
      write_declaration_block(tree, *block, dest)
    }

    NodeKind::FontFace { block } => {
      dest.add_mapping(&node.loc);
      dest.write_str("@font-face")?;
      write_declaration_block(tree, *block, dest)
    }

    NodeKind::Keyframes { prefix, name, block } => {
      dest.add_mapping(&node.loc);
      dest.write_char('@')?;
      dest.write_str(prefix.as_str())?;
      dest.write_str("keyframes ")?;
      serialize_identifier(name, dest)?;
      write_braced_rules(tree, *block, dest)
    }

    NodeKind::KeyframeRuleset { keys, block } => {
      write_node(tree, *keys, dest)?;
      write_declaration_block(tree, *block, dest)
    }

    NodeKind::KeyList { keys } => {
      for (i, &key) in keys.iter().enumerate() {
        if i > 0 {
          dest.delim(',', false)?;
        }
        write_node(tree, key, dest)?;
      }
      Ok(())
    }

    NodeKind::Key { key } => match key {
      KeyframeKey::From => dest.write_str("from"),
      KeyframeKey::To => dest.write_str("to"),
      KeyframeKey::Percentage(value) => {
        write_number(*value, dest)?;
        dest.write_char('%')
      }
    },

    NodeKind::Component { name, parent, is_abstract, block } => {
      dest.add_mapping(&node.loc);
      dest.write_str(if *is_abstract { "@abstract_component " } else { "@component " })?;
      dest.write_str(name)?;
      if let Some(parent) = parent {
        dest.write_str(" extends ")?;
        dest.write_str(parent)?;
      }
      write_braced_rules(tree, *block, dest)
    }

    NodeKind::ForLoop { variable, from, to, step, block, .. } => {
      dest.add_mapping(&node.loc);
      dest.write_str("@for $")?;
      dest.write_str(variable)?;
      dest.write_str(" from ")?;
      write_node(tree, *from, dest)?;
      dest.write_str(" to ")?;
      write_node(tree, *to, dest)?;
      if let Some(step) = step {
        dest.write_str(" step ")?;
        write_node(tree, *step, dest)?;
      }
      write_braced_rules(tree, *block, dest)
    }

    NodeKind::Provide { name } => {
      dest.write_str("@provide ")?;
      serialize_string(name, dest)?;
      dest.write_char(';')
    }

    NodeKind::Require { name } => {
      dest.write_str("@require ")?;
      serialize_string(name, dest)?;
      dest.write_char(';')
    }

    NodeKind::UnknownAtRule { name, params, block } => {
      dest.add_mapping(&node.loc);
      dest.write_char('@')?;
      dest.write_str(name)?;
      if !params.is_empty() {
        dest.write_char(' ')?;
        write_values(tree, params, dest)?;
      }
      match block {
        Some(block) => write_braced_rules(tree, *block, dest),
        None => dest.write_char(';'),
      }
    }
  }
}
