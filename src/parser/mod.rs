//! The GSS parser.
//!
//! An event-driven recursive-descent parser over the cssparser token stream.
//! Recognition of each construct fires a handler method on a
//! [`BuildHandler`] (normally the [`TreeBuilder`](builder::TreeBuilder));
//! the parser itself never touches the tree. Syntax errors are reported to
//! the [`ErrorManager`] and the parser resynchronizes at the next `;` or `}`,
//! abandoning the partially recognized construct through the handler.

pub mod builder;
pub mod events;

use crate::diagnostics::ErrorManager;
use crate::error::ParserError;
use crate::location::{LocationBuilder, SourceId, SourceLocation, SourcePoint};
use crate::tree::{CombinatorKind, CompositeOperator, ConditionalKind, KeyframeKey};
use crate::vendor_prefix::VendorPrefix;
use cssparser::{BasicParseErrorKind, Delimiter, ParseError, Parser, ParserInput, SourcePosition, Token};
use events::{BuildHandler, CondExpr, RefinerEvent, ValueToken};

/// Options the parser consults while recognizing at-rules.
#[derive(Debug, Clone)]
pub struct ParseOptions {
  pub allow_keyframes: bool,
  pub allow_webkit_keyframes: bool,
  pub allow_moz_document: bool,
  pub allowed_at_rules: Vec<String>,
  /// With recovery off, the first syntax error stops the file.
  pub error_recovery: bool,
}

impl Default for ParseOptions {
  fn default() -> ParseOptions {
    ParseOptions {
      allow_keyframes: true,
      allow_webkit_keyframes: true,
      allow_moz_document: false,
      allowed_at_rules: Vec::new(),
      error_recovery: true,
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RuleContext {
  TopLevel,
  /// Conditional arm, media body, component body, loop body.
  Block,
  Keyframes,
}

type GssResult<'i, T> = Result<T, ParseError<'i, ParserError<'i>>>;

struct TokenStart {
  pos: SourcePosition,
  loc: cssparser::SourceLocation,
}

/// Parses one source file into events on `handler`. The same handler may be
/// fed several files in sequence; they form one logical compilation unit.
pub fn parse_source<H: BuildHandler>(
  source: SourceId,
  contents: &str,
  options: &ParseOptions,
  handler: &mut H,
  errors: &mut ErrorManager,
) {
  let line_starts = compute_line_starts(contents);
  let mut input = ParserInput::new(contents);
  let mut parser = Parser::new(&mut input);
  let mut gss = GssParser {
    handler,
    errors,
    source,
    options,
    line_starts,
    contents_len: contents.len(),
    seen_body: false,
    aborted: false,
  };
  gss.handler.on_document_start(source);
  gss.parse_rule_list(&mut parser, RuleContext::TopLevel);
  gss.handler.on_document_end();
}

/// Offsets of line starts, counting `\n`, `\r\n`, `\r`, and `\f` as
/// terminators the way the tokenizer does.
fn compute_line_starts(contents: &str) -> Vec<usize> {
  let bytes = contents.as_bytes();
  let mut starts = vec![0];
  let mut i = 0;
  while i < bytes.len() {
    match bytes[i] {
      b'\n' | b'\x0c' => starts.push(i + 1),
      b'\r' => {
        if bytes.get(i + 1) == Some(&b'\n') {
          i += 1;
        }
        starts.push(i + 1);
      }
      _ => {}
    }
    i += 1;
  }
  starts
}

/// A constant reference: `[A-Z_][A-Z0-9_]*`.
fn is_reference_ident(name: &str) -> bool {
  let mut chars = name.chars();
  match chars.next() {
    Some(c) if c.is_ascii_uppercase() || c == '_' => {}
    _ => return false,
  }
  name.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_')
}

fn is_hex_color(value: &str) -> bool {
  matches!(value.len(), 3 | 4 | 6 | 8) && value.chars().all(|c| c.is_ascii_hexdigit())
}

struct GssParser<'a, H> {
  handler: &'a mut H,
  errors: &'a mut ErrorManager,
  source: SourceId,
  options: &'a ParseOptions,
  line_starts: Vec<usize>,
  contents_len: usize,
  seen_body: bool,
  aborted: bool,
}

impl<'a, H: BuildHandler> GssParser<'a, H> {
  fn token_start<'i, 't>(input: &Parser<'i, 't>) -> TokenStart {
    TokenStart {
      pos: input.position(),
      loc: input.current_source_location(),
    }
  }

  fn point_of(&self, pos: SourcePosition, loc: cssparser::SourceLocation) -> SourcePoint {
    SourcePoint::new(pos.byte_index(), loc.line + 1, loc.column)
  }

  /// A location for a tokenizer position, index derived from the line table.
  fn point_at(&self, loc: cssparser::SourceLocation) -> SourcePoint {
    let index = self
      .line_starts
      .get(loc.line as usize)
      .copied()
      .unwrap_or(0)
      .saturating_add(loc.column.saturating_sub(1) as usize);
    SourcePoint::new(index.min(self.contents_len), loc.line + 1, loc.column)
  }

  fn begin_span(&self, start: &TokenStart) -> SourceLocation {
    let point = self.point_of(start.pos, start.loc);
    LocationBuilder::new(self.source).begin(point).build()
  }

  fn span<'i, 't>(&self, input: &Parser<'i, 't>, start: &TokenStart) -> SourceLocation {
    let begin = self.point_of(start.pos, start.loc);
    let end = self.point_of(input.position(), input.current_source_location());
    LocationBuilder::new(self.source).begin(begin).end(end).build()
  }

  fn report<'i>(&mut self, err: ParseError<'i, ParserError<'i>>) {
    let message = ParserError::from(err.kind).message();
    let point = self.point_at(err.location);
    let loc = SourceLocation::new(self.source, point, point);
    self.errors.report_error(message, loc);
    if !self.options.error_recovery {
      self.aborted = true;
    }
  }

  fn report_message(&mut self, message: impl Into<String>, loc: SourceLocation) {
    self.errors.report_error(message, loc);
    if !self.options.error_recovery {
      self.aborted = true;
    }
  }

  // ---- rule level ----

  fn parse_rule_list<'i, 't>(&mut self, input: &mut Parser<'i, 't>, ctx: RuleContext) {
    loop {
      if self.aborted {
        return;
      }
      let start = Self::token_start(input);
      let state = input.state();
      let token = match input.next_including_whitespace_and_comments() {
        Ok(t) => t.clone(),
        Err(_) => return,
      };
      match token {
        Token::WhiteSpace(_) | Token::Semicolon | Token::CDO | Token::CDC => {}
        Token::Comment(text) => {
          let loc = self.span(input, &start);
          self.handler.on_comment(text.into(), loc);
        }
        Token::AtKeyword(name) => {
          let name = name.as_ref().to_owned();
          if let Err(err) = self.parse_at_rule(input, &name, ctx, &start) {
            self.report(err);
            self.skip_to_rule_end(input);
          }
        }
        Token::CloseCurlyBracket => {
          let loc = self.begin_span(&start);
          self.report_message("Unbalanced \"}\"", loc);
        }
        _ => {
          input.reset(&state);
          let result = match ctx {
            RuleContext::Keyframes => self.parse_keyframe_ruleset(input),
            _ => self.parse_ruleset(input),
          };
          if let Err(err) = result {
            self.report(err);
            self.skip_to_rule_end(input);
          }
        }
      }
    }
  }

  fn parse_ruleset<'i, 't>(&mut self, input: &mut Parser<'i, 't>) -> GssResult<'i, ()> {
    let start = Self::token_start(input);
    self.seen_body = true;
    self.handler.on_ruleset_start(self.begin_span(&start));

    if let Err(err) = self.parse_selector_list(input) {
      self.handler.on_ruleset_abandon();
      return Err(err);
    }

    match next_owned(input) {
      Ok(Token::CurlyBracketBlock) => {}
      Ok(t) => {
        self.handler.on_ruleset_abandon();
        return Err(input.new_unexpected_token_error(t));
      }
      Err(err) => {
        self.handler.on_ruleset_abandon();
        return Err(err.into());
      }
    }

    self.parse_declaration_block(input)?;
    self.handler.on_ruleset_end(self.span(input, &start));
    Ok(())
  }

  // ---- selectors ----

  fn selector_descendant(&mut self, part_open: &mut bool, pending_ws: &mut bool) {
    if *part_open && *pending_ws {
      self.handler.on_combinator(CombinatorKind::Descendant);
      *part_open = false;
    }
    *pending_ws = false;
  }

  fn selector_open_part(&mut self, part_open: &mut bool, pending_ws: &mut bool, any: &mut bool, loc: SourceLocation) {
    self.selector_descendant(part_open, pending_ws);
    if !*part_open {
      self.handler.on_selector_part(String::new(), loc);
      *part_open = true;
      *any = true;
    }
  }

  fn parse_selector_list<'i, 't>(&mut self, input: &mut Parser<'i, 't>) -> GssResult<'i, ()> {
    let mut part_open = false;
    let mut pending_ws = false;
    let mut any = false;
    loop {
      let start = Self::token_start(input);
      let state = input.state();
      let token = match input.next_including_whitespace_and_comments() {
        Ok(t) => t.clone(),
        Err(_) => return Err(input.new_error(BasicParseErrorKind::EndOfInput)),
      };
      match token {
        Token::WhiteSpace(_) => pending_ws = true,
        Token::Comment(text) => {
          let loc = self.span(input, &start);
          self.handler.on_comment(text.into(), loc);
        }
        Token::CurlyBracketBlock => {
          if !any || !part_open {
            return Err(input.new_custom_error(ParserError::InvalidSelector));
          }
          self.handler.on_selector_end();
          input.reset(&state);
          return Ok(());
        }
        Token::Comma => {
          if !part_open {
            return Err(input.new_custom_error(ParserError::InvalidSelector));
          }
          self.handler.on_selector_end();
          part_open = false;
          pending_ws = false;
        }
        Token::Delim(c @ ('>' | '+' | '~')) => {
          if !part_open {
            return Err(input.new_custom_error(ParserError::InvalidSelector));
          }
          let kind = match c {
            '>' => CombinatorKind::Child,
            '+' => CombinatorKind::AdjacentSibling,
            _ => CombinatorKind::GeneralSibling,
          };
          self.handler.on_combinator(kind);
          part_open = false;
          pending_ws = false;
        }
        Token::Ident(name) => {
          self.selector_descendant(&mut part_open, &mut pending_ws);
          if part_open {
            return Err(input.new_custom_error(ParserError::InvalidSelector));
          }
          let loc = self.span(input, &start);
          self.handler.on_selector_part(name.as_ref().into(), loc);
          part_open = true;
          any = true;
        }
        Token::Delim('*') => {
          self.selector_descendant(&mut part_open, &mut pending_ws);
          if part_open {
            return Err(input.new_custom_error(ParserError::InvalidSelector));
          }
          let loc = self.span(input, &start);
          self.handler.on_selector_part("*".into(), loc);
          part_open = true;
          any = true;
        }
        Token::Delim('.') => {
          let loc = self.begin_span(&start);
          self.selector_open_part(&mut part_open, &mut pending_ws, &mut any, loc);
          match next_owned_including_whitespace(input) {
            Ok(Token::Ident(name)) => {
              let loc = self.span(input, &start);
              self.handler.on_refiner(RefinerEvent::Class(name.as_ref().into()), loc);
            }
            Ok(t) => return Err(input.new_unexpected_token_error(t)),
            Err(err) => return Err(err.into()),
          }
        }
        Token::IDHash(name) => {
          let loc = self.span(input, &start);
          self.selector_open_part(&mut part_open, &mut pending_ws, &mut any, loc);
          self.handler.on_refiner(RefinerEvent::Id(name.as_ref().into()), loc);
        }
        Token::Colon => {
          let loc = self.begin_span(&start);
          self.selector_open_part(&mut part_open, &mut pending_ws, &mut any, loc);
          self.parse_pseudo(input, &start)?;
        }
        Token::SquareBracketBlock => {
          let loc = self.begin_span(&start);
          self.selector_open_part(&mut part_open, &mut pending_ws, &mut any, loc);
          self.parse_attribute(input, &start)?;
        }
        t => return Err(input.new_unexpected_token_error(t)),
      }
    }
  }

  fn parse_pseudo<'i, 't>(&mut self, input: &mut Parser<'i, 't>, start: &TokenStart) -> GssResult<'i, ()> {
    match next_owned_including_whitespace(input) {
      Ok(Token::Ident(name)) => {
        let loc = self.span(input, start);
        let lower = name.as_ref().to_ascii_lowercase();
        // The CSS2 pseudo-elements are also recognized in single-colon form.
        if matches!(lower.as_str(), "before" | "after" | "first-line" | "first-letter") {
          self.handler.on_refiner(RefinerEvent::PseudoElement(name.as_ref().into()), loc);
        } else {
          self.handler.on_refiner(
            RefinerEvent::PseudoClass {
              name: name.as_ref().into(),
              argument: None,
            },
            loc,
          );
        }
        Ok(())
      }
      Ok(Token::Colon) => match next_owned_including_whitespace(input) {
        Ok(Token::Ident(name)) => {
          let loc = self.span(input, start);
          self.handler.on_refiner(RefinerEvent::PseudoElement(name.as_ref().into()), loc);
          Ok(())
        }
        Ok(t) => Err(input.new_unexpected_token_error(t)),
        Err(err) => Err(err.into()),
      },
      Ok(Token::Function(name)) => {
        if name.eq_ignore_ascii_case("not") {
          self.handler.on_pseudo_not_start(self.begin_span(start));
          input.parse_nested_block(|p| self.parse_not_argument(p))?;
          self.handler.on_pseudo_not_end();
          Ok(())
        } else {
          let argument = input.parse_nested_block(|p| -> GssResult<'i, String> {
            let inner_start = p.position();
            while p.next_including_whitespace().is_ok() {}
            Ok(p.slice_from(inner_start).to_string())
          })?;
          let loc = self.span(input, start);
          self.handler.on_refiner(
            RefinerEvent::PseudoClass {
              name: name.as_ref().into(),
              argument: Some(argument),
            },
            loc,
          );
          Ok(())
        }
      }
      Ok(t) => Err(input.new_unexpected_token_error(t)),
      Err(err) => Err(err.into()),
    }
  }

  /// The compound selector inside `:not(...)`.
  fn parse_not_argument<'i, 't>(&mut self, input: &mut Parser<'i, 't>) -> GssResult<'i, ()> {
    let mut started = false;
    loop {
      let start = Self::token_start(input);
      let token = match input.next_including_whitespace_and_comments() {
        Ok(t) => t.clone(),
        Err(_) => break,
      };
      match token {
        Token::WhiteSpace(_) => {}
        Token::Comment(text) => {
          let loc = self.span(input, &start);
          self.handler.on_comment(text.into(), loc);
        }
        Token::Ident(name) => {
          if started {
            return Err(input.new_custom_error(ParserError::InvalidSelector));
          }
          let loc = self.span(input, &start);
          self.handler.on_selector_part(name.as_ref().into(), loc);
          started = true;
        }
        Token::Delim('*') => {
          if started {
            return Err(input.new_custom_error(ParserError::InvalidSelector));
          }
          let loc = self.span(input, &start);
          self.handler.on_selector_part("*".into(), loc);
          started = true;
        }
        Token::Delim('.') => {
          if !started {
            self.handler.on_selector_part(String::new(), self.begin_span(&start));
            started = true;
          }
          match next_owned_including_whitespace(input) {
            Ok(Token::Ident(name)) => {
              let loc = self.span(input, &start);
              self.handler.on_refiner(RefinerEvent::Class(name.as_ref().into()), loc);
            }
            Ok(t) => return Err(input.new_unexpected_token_error(t)),
            Err(err) => return Err(err.into()),
          }
        }
        Token::IDHash(name) => {
          let loc = self.span(input, &start);
          if !started {
            self.handler.on_selector_part(String::new(), loc);
            started = true;
          }
          self.handler.on_refiner(RefinerEvent::Id(name.as_ref().into()), loc);
        }
        Token::Colon => {
          if !started {
            self.handler.on_selector_part(String::new(), self.begin_span(&start));
            started = true;
          }
          self.parse_pseudo(input, &start)?;
        }
        Token::SquareBracketBlock => {
          if !started {
            self.handler.on_selector_part(String::new(), self.begin_span(&start));
            started = true;
          }
          self.parse_attribute(input, &start)?;
        }
        t => return Err(input.new_unexpected_token_error(t)),
      }
    }
    if !started {
      return Err(input.new_custom_error(ParserError::InvalidSelector));
    }
    Ok(())
  }

  fn parse_attribute<'i, 't>(&mut self, input: &mut Parser<'i, 't>, start: &TokenStart) -> GssResult<'i, ()> {
    let refiner = input.parse_nested_block(|p| -> GssResult<'i, RefinerEvent> {
      let name = p.expect_ident()?.as_ref().to_owned();
      let state = p.state();
      let operator = match p.next() {
        Err(_) => None,
        Ok(t) => match t.clone() {
          Token::Delim('=') => Some(crate::tree::AttrOperator::Equals),
          Token::IncludeMatch => Some(crate::tree::AttrOperator::Includes),
          Token::DashMatch => Some(crate::tree::AttrOperator::DashMatch),
          Token::PrefixMatch => Some(crate::tree::AttrOperator::Prefix),
          Token::SuffixMatch => Some(crate::tree::AttrOperator::Suffix),
          Token::SubstringMatch => Some(crate::tree::AttrOperator::Substring),
          _ => {
            p.reset(&state);
            None
          }
        },
      };
      let value = if operator.is_some() {
        match next_owned(p) {
          Ok(Token::Ident(s)) | Ok(Token::QuotedString(s)) => Some(s.as_ref().to_owned()),
          Ok(t) => return Err(p.new_unexpected_token_error(t)),
          Err(err) => return Err(err.into()),
        }
      } else {
        None
      };
      Ok(RefinerEvent::Attribute { name, operator, value })
    })?;
    let loc = self.span(input, start);
    self.handler.on_refiner(refiner, loc);
    Ok(())
  }

  // ---- declarations ----

  fn parse_declaration_block<'i, 't>(&mut self, input: &mut Parser<'i, 't>) -> GssResult<'i, ()> {
    let start_loc = {
      let start = Self::token_start(input);
      self.begin_span(&start)
    };
    input.parse_nested_block(|p| -> GssResult<'i, ()> {
      self.handler.on_declarations_start(start_loc);
      self.parse_declarations(p);
      self.handler.on_declarations_end();
      Ok(())
    })
  }

  fn parse_declarations<'i, 't>(&mut self, input: &mut Parser<'i, 't>) {
    loop {
      if self.aborted {
        return;
      }
      let start = Self::token_start(input);
      let token = match input.next_including_whitespace_and_comments() {
        Ok(t) => t.clone(),
        Err(_) => return,
      };
      match token {
        Token::WhiteSpace(_) | Token::Semicolon => {}
        Token::Comment(text) => {
          let loc = self.span(input, &start);
          self.handler.on_comment(text.into(), loc);
        }
        Token::AtKeyword(name) => {
          let name = name.as_ref().to_owned();
          if let Err(err) = self.parse_declaration_level_at_rule(input, &name, &start) {
            self.report(err);
            self.recover_declaration(input);
          }
        }
        Token::Delim('*') => match next_owned_including_whitespace(input) {
          Ok(Token::Ident(property)) => {
            self.parse_declaration_body(input, property.as_ref().to_owned(), true, &start);
          }
          Ok(t) => {
            self.report(input.new_unexpected_token_error(t));
            self.recover_declaration(input);
          }
          Err(_) => return,
        },
        Token::Ident(property) => {
          self.parse_declaration_body(input, property.as_ref().to_owned(), false, &start);
        }
        t => {
          self.report(input.new_unexpected_token_error(t));
          self.recover_declaration(input);
        }
      }
    }
  }

  fn parse_declaration_body<'i, 't>(&mut self, input: &mut Parser<'i, 't>, property: String, star_hack: bool, start: &TokenStart) {
    if let Err(err) = input.expect_colon() {
      self.report(err.into());
      self.recover_declaration(input);
      return;
    }
    self.handler.on_declaration_start(property, star_hack, self.begin_span(start));
    match input.parse_until_after(Delimiter::Semicolon, |p| self.parse_value_expression(p, false)) {
      Ok(()) => {
        let loc = self.span(input, start);
        self.handler.on_declaration_end(loc);
      }
      Err(err) => {
        self.report(err);
        self.handler.on_declaration_abandon();
      }
    }
  }

  fn parse_declaration_level_at_rule<'i, 't>(
    &mut self,
    input: &mut Parser<'i, 't>,
    name: &str,
    start: &TokenStart,
  ) -> GssResult<'i, ()> {
    match name {
      _ if name.eq_ignore_ascii_case("mixin") => self.parse_mixin(input, start),
      _ if name.eq_ignore_ascii_case("def") => self.parse_definition(input, start),
      _ if self.at_rule_allowed(name) => {
        let (prelude, has_block) = self.slice_at_rule_prelude(input)?;
        if has_block {
          return Err(input.new_custom_error(ParserError::AtRuleInvalid(name.to_owned().into())));
        }
        self.handler.on_unknown_at_rule_start(name.to_owned(), prelude, false, self.begin_span(start));
        self.handler.on_unknown_at_rule_end(self.span(input, start));
        Ok(())
      }
      _ => Err(input.new_custom_error(ParserError::AtRuleInvalid(name.to_owned().into()))),
    }
  }

  fn parse_mixin<'i, 't>(&mut self, input: &mut Parser<'i, 't>, start: &TokenStart) -> GssResult<'i, ()> {
    let name = input.expect_ident()?.as_ref().to_owned();
    match next_owned(input) {
      Ok(Token::ParenthesisBlock) => {}
      Ok(t) => return Err(input.new_unexpected_token_error(t)),
      Err(err) => return Err(err.into()),
    }
    self.handler.on_mixin_start(name, self.begin_span(start));
    match input.parse_nested_block(|p| self.parse_value_expression(p, false)) {
      Ok(()) => {
        self.handler.on_mixin_end(self.span(input, start));
        Ok(())
      }
      Err(err) => {
        self.handler.on_mixin_abandon();
        Err(err)
      }
    }
  }

  fn parse_definition<'i, 't>(&mut self, input: &mut Parser<'i, 't>, start: &TokenStart) -> GssResult<'i, ()> {
    let name = input.expect_ident()?.as_ref().to_owned();
    if !is_reference_ident(&name) {
      return Err(input.new_custom_error(ParserError::InvalidDefinitionName(name.into())));
    }
    self.seen_body = true;
    self.handler.on_definition_start(name, self.begin_span(start));
    match input.parse_until_after(Delimiter::Semicolon, |p| self.parse_value_expression(p, false)) {
      Ok(()) => {
        self.handler.on_definition_end(self.span(input, start));
        Ok(())
      }
      Err(err) => {
        self.report(err);
        self.handler.on_definition_abandon();
        Ok(())
      }
    }
  }

  // ---- value expressions ----

  fn parse_value_expression<'i, 't>(&mut self, input: &mut Parser<'i, 't>, in_math: bool) -> GssResult<'i, ()> {
    let mut have_value = false;
    let mut after_operator = false;

    macro_rules! operator {
      ($input:expr, $start:expr, $op:expr, $token:expr) => {{
        if !have_value || after_operator {
          return Err($input.new_unexpected_token_error($token));
        }
        let loc = self.begin_span(&$start);
        self.handler.on_operator($op, loc);
        after_operator = true;
      }};
    }

    loop {
      let start = Self::token_start(input);
      let token = match input.next_including_whitespace_and_comments() {
        Ok(t) => t.clone(),
        Err(_) => break,
      };
      match token {
        Token::WhiteSpace(_) => {}
        Token::Comment(text) => {
          let loc = self.span(input, &start);
          self.handler.on_comment(text.into(), loc);
        }
        Token::Ident(name) => {
          if name.eq_ignore_ascii_case("u") && self.try_parse_unicode_range(input, &start)? {
            have_value = true;
            after_operator = false;
            continue;
          }
          let loc = self.span(input, &start);
          let value = if is_reference_ident(name.as_ref()) {
            ValueToken::ConstantRef(name.as_ref().into())
          } else {
            ValueToken::Literal(name.as_ref().into())
          };
          self.handler.on_value(value, loc);
          have_value = true;
          after_operator = false;
        }
        Token::Number { value, .. } => {
          let loc = self.span(input, &start);
          self.handler.on_value(
            ValueToken::Numeric {
              value: value as f64,
              unit: String::new(),
            },
            loc,
          );
          have_value = true;
          after_operator = false;
        }
        Token::Percentage { unit_value, .. } => {
          let loc = self.span(input, &start);
          self.handler.on_value(
            ValueToken::Numeric {
              value: unit_value as f64 * 100.0,
              unit: "%".into(),
            },
            loc,
          );
          have_value = true;
          after_operator = false;
        }
        Token::Dimension { value, unit, .. } => {
          let loc = self.span(input, &start);
          self.handler.on_value(
            ValueToken::Numeric {
              value: value as f64,
              unit: unit.as_ref().into(),
            },
            loc,
          );
          have_value = true;
          after_operator = false;
        }
        Token::Hash(value) | Token::IDHash(value) => {
          let loc = self.span(input, &start);
          let v = if is_hex_color(value.as_ref()) {
            ValueToken::HexColor(value.as_ref().to_ascii_lowercase())
          } else {
            ValueToken::Literal(format!("#{}", value))
          };
          self.handler.on_value(v, loc);
          have_value = true;
          after_operator = false;
        }
        Token::QuotedString(s) => {
          let loc = self.span(input, &start);
          self.handler.on_value(ValueToken::String(s.as_ref().into()), loc);
          have_value = true;
          after_operator = false;
        }
        Token::UnquotedUrl(url) => {
          let begin = self.begin_span(&start);
          self.handler.on_function_start("url".into(), begin);
          let loc = self.span(input, &start);
          self.handler.on_value(ValueToken::String(url.as_ref().into()), loc);
          self.handler.on_function_end(loc);
          have_value = true;
          after_operator = false;
        }
        Token::Function(name) => {
          let begin = self.begin_span(&start);
          let math = in_math || name.eq_ignore_ascii_case("calc");
          self.handler.on_function_start(name.as_ref().into(), begin);
          input.parse_nested_block(|p| self.parse_value_expression(p, math))?;
          self.handler.on_function_end(self.span(input, &start));
          have_value = true;
          after_operator = false;
        }
        Token::ParenthesisBlock => {
          let begin = self.begin_span(&start);
          self.handler.on_group_start(begin);
          input.parse_nested_block(|p| self.parse_value_expression(p, in_math))?;
          self.handler.on_group_end(self.span(input, &start));
          have_value = true;
          after_operator = false;
        }
        Token::Delim('$') => match next_owned_including_whitespace(input) {
          Ok(Token::Ident(name)) => {
            let loc = self.span(input, &start);
            self.handler.on_value(ValueToken::LoopVariable(name.as_ref().into()), loc);
            have_value = true;
            after_operator = false;
          }
          Ok(t) => return Err(input.new_unexpected_token_error(t)),
          Err(err) => return Err(err.into()),
        },
        Token::Delim('!') => match next_owned(input) {
          Ok(Token::Ident(word)) if word.eq_ignore_ascii_case("important") => {
            let loc = self.span(input, &start);
            self.handler.on_value(ValueToken::Priority, loc);
            have_value = true;
            after_operator = false;
          }
          Ok(t) => return Err(input.new_unexpected_token_error(t)),
          Err(err) => return Err(err.into()),
        },
        Token::Comma => {
          if !have_value || after_operator {
            return Err(input.new_unexpected_token_error(Token::Comma));
          }
          let loc = self.begin_span(&start);
          self.handler.on_operator(CompositeOperator::Comma, loc);
          have_value = false;
          after_operator = true;
        }
        Token::Delim('/') => {
          let op = if in_math { CompositeOperator::Div } else { CompositeOperator::Slash };
          operator!(input, start, op, Token::Delim('/'))
        }
        Token::Delim('*') => operator!(input, start, CompositeOperator::Mul, Token::Delim('*')),
        Token::Delim('+') => operator!(input, start, CompositeOperator::Plus, Token::Delim('+')),
        Token::Delim('-') => operator!(input, start, CompositeOperator::Minus, Token::Delim('-')),
        Token::Delim('=') => operator!(input, start, CompositeOperator::Equals, Token::Delim('=')),
        t => return Err(input.new_unexpected_token_error(t)),
      }
    }
    if after_operator {
      return Err(input.new_custom_error(ParserError::EndOfInput));
    }
    Ok(())
  }

  /// `u+0-7f` style ranges arrive as several tokens; re-slice the raw text
  /// of the contiguous run. Returns false (with the input untouched) when
  /// the ident was a plain `u`.
  fn try_parse_unicode_range<'i, 't>(&mut self, input: &mut Parser<'i, 't>, start: &TokenStart) -> GssResult<'i, bool> {
    let state = input.state();
    let next = match input.next_including_whitespace() {
      Ok(t) => Some(t.clone()),
      Err(_) => None,
    };
    let plus = match next {
      Some(Token::Delim('+')) => true,
      Some(Token::Number { .. }) | Some(Token::Dimension { .. }) => input.slice_from(start.pos)[1..].starts_with('+'),
      _ => false,
    };
    if !plus {
      input.reset(&state);
      return Ok(false);
    }
    // Consume the contiguous run of range tokens.
    loop {
      let st = input.state();
      match input.next_including_whitespace() {
        Ok(Token::Number { .. })
        | Ok(Token::Dimension { .. })
        | Ok(Token::Ident(_))
        | Ok(Token::Delim('?'))
        | Ok(Token::Delim('-'))
        | Ok(Token::Delim('+')) => {}
        _ => {
          input.reset(&st);
          break;
        }
      }
    }
    let raw = input.slice_from(start.pos).trim_end().to_string();
    let loc = self.span(input, start);
    self.handler.on_value(ValueToken::UnicodeRange(raw), loc);
    Ok(true)
  }

  // ---- at-rules ----

  fn at_rule_allowed(&self, name: &str) -> bool {
    self.options.allowed_at_rules.iter().any(|a| a.eq_ignore_ascii_case(name))
  }

  fn parse_at_rule<'i, 't>(
    &mut self,
    input: &mut Parser<'i, 't>,
    name: &str,
    ctx: RuleContext,
    start: &TokenStart,
  ) -> GssResult<'i, ()> {
    if name.eq_ignore_ascii_case("charset") {
      let charset = input.expect_string()?.as_ref().to_owned();
      // Mid-file @charset is common in concatenated inputs; the builder
      // keeps the first one and drops the rest.
      if ctx == RuleContext::TopLevel && !self.seen_body {
        let loc = self.span(input, start);
        self.handler.on_charset(charset, loc);
      }
      return Ok(());
    }
    if name.eq_ignore_ascii_case("import") {
      if ctx != RuleContext::TopLevel || self.seen_body {
        self.report_message("@import must precede the document body", self.begin_span(start));
        self.skip_to_rule_end(input);
        return Ok(());
      }
      self.handler.on_import_start(self.begin_span(start));
      return match input.parse_until_after(Delimiter::Semicolon, |p| self.parse_value_expression(p, false)) {
        Ok(()) => {
          self.handler.on_import_end(self.span(input, start));
          Ok(())
        }
        Err(err) => {
          self.report(err);
          self.handler.on_import_abandon();
          Ok(())
        }
      };
    }
    if name.eq_ignore_ascii_case("def") {
      return self.parse_definition(input, start);
    }
    if name.eq_ignore_ascii_case("if") {
      self.seen_body = true;
      return self.parse_conditional(input, start);
    }
    if name.eq_ignore_ascii_case("media") {
      self.seen_body = true;
      return self.parse_media(input, start);
    }
    if name.eq_ignore_ascii_case("page") {
      self.seen_body = true;
      return self.parse_page(input, start);
    }
    if name.eq_ignore_ascii_case("font-face") {
      self.seen_body = true;
      return self.parse_font_face(input, start);
    }
    if name.eq_ignore_ascii_case("defmixin") {
      if ctx != RuleContext::TopLevel {
        self.report_message("@defmixin is only allowed at the top level", self.begin_span(start));
        self.skip_to_rule_end(input);
        return Ok(());
      }
      self.seen_body = true;
      return self.parse_mixin_definition(input, start);
    }
    if name.eq_ignore_ascii_case("component") || name.eq_ignore_ascii_case("abstract_component") {
      if ctx != RuleContext::TopLevel {
        self.report_message("@component is only allowed at the top level", self.begin_span(start));
        self.skip_to_rule_end(input);
        return Ok(());
      }
      self.seen_body = true;
      return self.parse_component(input, name.eq_ignore_ascii_case("abstract_component"), start);
    }
    if name.eq_ignore_ascii_case("for") {
      self.seen_body = true;
      return self.parse_for_loop(input, start);
    }
    if name.eq_ignore_ascii_case("provide") {
      self.seen_body = true;
      let provided = input.expect_string()?.as_ref().to_owned();
      self.handler.on_provide(provided, self.span(input, start));
      return Ok(());
    }
    if name.eq_ignore_ascii_case("require") {
      self.seen_body = true;
      let required = input.expect_string()?.as_ref().to_owned();
      self.handler.on_require(required, self.span(input, start));
      return Ok(());
    }

    let (prefix, base) = VendorPrefix::strip(name);
    if base.eq_ignore_ascii_case("keyframes") {
      let vendor_allowed = match prefix {
        VendorPrefix::WebKit => self.options.allow_webkit_keyframes,
        _ => self.options.allow_keyframes,
      };
      if vendor_allowed || self.at_rule_allowed(name) {
        self.seen_body = true;
        return self.parse_keyframes(input, prefix, start);
      }
      self.report_message(format!("Unrecognized at-rule \"@{}\"", name), self.begin_span(start));
      self.skip_to_rule_end(input);
      return Ok(());
    }

    if name.eq_ignore_ascii_case("-moz-document") && (self.options.allow_moz_document || self.at_rule_allowed(name)) {
      self.seen_body = true;
      return self.parse_unknown_at_rule(input, name, start);
    }

    if self.at_rule_allowed(name) {
      self.seen_body = true;
      return self.parse_unknown_at_rule(input, name, start);
    }

    self.report_message(format!("Unrecognized at-rule \"@{}\"", name), self.begin_span(start));
    self.skip_to_rule_end(input);
    Ok(())
  }

  fn parse_conditional<'i, 't>(&mut self, input: &mut Parser<'i, 't>, start: &TokenStart) -> GssResult<'i, ()> {
    self.handler.on_conditional_block_start(self.begin_span(start));
    let mut kind = ConditionalKind::If;
    let mut had_else = false;
    loop {
      let arm_loc = self.begin_span(start);
      let condition = if kind == ConditionalKind::Else {
        None
      } else {
        match self.parse_bool_or(input) {
          Ok(expr) => Some(expr),
          Err(err) => {
            self.handler.on_conditional_block_end();
            return Err(err);
          }
        }
      };
      match next_owned(input) {
        Ok(Token::CurlyBracketBlock) => {}
        Ok(t) => {
          self.handler.on_conditional_block_end();
          return Err(input.new_unexpected_token_error(t));
        }
        Err(err) => {
          self.handler.on_conditional_block_end();
          return Err(err.into());
        }
      }
      self.handler.on_conditional_rule_start(kind, condition, arm_loc);
      input.parse_nested_block(|p| -> GssResult<'i, ()> {
        self.parse_rule_list(p, RuleContext::Block);
        Ok(())
      })?;
      self.handler.on_conditional_rule_end();

      if kind == ConditionalKind::Else {
        had_else = true;
      }

      let state = input.state();
      let continued = match input.next() {
        Ok(Token::AtKeyword(n)) if n.eq_ignore_ascii_case("elseif") => Some(ConditionalKind::ElseIf),
        Ok(Token::AtKeyword(n)) if n.eq_ignore_ascii_case("else") => Some(ConditionalKind::Else),
        _ => None,
      };
      match continued {
        None => {
          input.reset(&state);
          break;
        }
        Some(next_kind) => {
          if had_else {
            // The chain is already closed by @else; this arm can never apply.
            self.report_message(ParserError::UnreachableConditionalArm.message(), self.begin_span(start));
            if let Err(err) = self.skip_conditional_arm(input, next_kind) {
              self.handler.on_conditional_block_end();
              return Err(err);
            }
            break;
          }
          kind = next_kind;
        }
      }
    }
    self.handler.on_conditional_block_end();
    Ok(())
  }

  /// Consumes an unreachable `@elseif`/`@else` arm without emitting events.
  fn skip_conditional_arm<'i, 't>(&mut self, input: &mut Parser<'i, 't>, kind: ConditionalKind) -> GssResult<'i, ()> {
    if kind != ConditionalKind::Else {
      let _ = self.parse_bool_or(input)?;
    }
    match next_owned(input) {
      Ok(Token::CurlyBracketBlock) => {
        input.parse_nested_block(|p| -> GssResult<'i, ()> {
          while p.next_including_whitespace_and_comments().is_ok() {}
          Ok(())
        })?;
        Ok(())
      }
      Ok(t) => Err(input.new_unexpected_token_error(t)),
      Err(err) => Err(err.into()),
    }
  }

  fn parse_bool_or<'i, 't>(&mut self, input: &mut Parser<'i, 't>) -> GssResult<'i, CondExpr> {
    let mut left = self.parse_bool_and(input)?;
    loop {
      let state = input.state();
      match next_owned(input) {
        Ok(Token::Delim('|')) => match next_owned_including_whitespace(input) {
          Ok(Token::Delim('|')) => {
            let right = self.parse_bool_and(input)?;
            left = CondExpr::Or(Box::new(left), Box::new(right));
          }
          Ok(t) => return Err(input.new_unexpected_token_error(t)),
          Err(err) => return Err(err.into()),
        },
        _ => {
          input.reset(&state);
          return Ok(left);
        }
      }
    }
  }

  fn parse_bool_and<'i, 't>(&mut self, input: &mut Parser<'i, 't>) -> GssResult<'i, CondExpr> {
    let mut left = self.parse_bool_primary(input)?;
    loop {
      let state = input.state();
      match next_owned(input) {
        Ok(Token::Delim('&')) => match next_owned_including_whitespace(input) {
          Ok(Token::Delim('&')) => {
            let right = self.parse_bool_primary(input)?;
            left = CondExpr::And(Box::new(left), Box::new(right));
          }
          Ok(t) => return Err(input.new_unexpected_token_error(t)),
          Err(err) => return Err(err.into()),
        },
        _ => {
          input.reset(&state);
          return Ok(left);
        }
      }
    }
  }

  fn parse_bool_primary<'i, 't>(&mut self, input: &mut Parser<'i, 't>) -> GssResult<'i, CondExpr> {
    match next_owned(input) {
      Ok(Token::Delim('!')) => {
        let operand = self.parse_bool_primary(input)?;
        Ok(CondExpr::Not(Box::new(operand)))
      }
      Ok(Token::Ident(name)) => Ok(CondExpr::Constant(name.as_ref().to_owned())),
      Ok(Token::ParenthesisBlock) => input.parse_nested_block(|p| self.parse_bool_or(p)),
      Ok(_) => Err(input.new_custom_error(ParserError::InvalidBooleanExpression)),
      Err(err) => Err(err.into()),
    }
  }

  fn parse_media<'i, 't>(&mut self, input: &mut Parser<'i, 't>, start: &TokenStart) -> GssResult<'i, ()> {
    let prelude = self.slice_prelude_until_block(input)?;
    self.handler.on_media_start(prelude, self.begin_span(start));
    input.parse_nested_block(|p| -> GssResult<'i, ()> {
      self.parse_rule_list(p, RuleContext::Block);
      Ok(())
    })?;
    self.handler.on_media_end(self.span(input, start));
    Ok(())
  }

  fn parse_page<'i, 't>(&mut self, input: &mut Parser<'i, 't>, start: &TokenStart) -> GssResult<'i, ()> {
    let pseudo = input
      .try_parse(|p| -> GssResult<'i, String> {
        p.expect_colon()?;
        Ok(p.expect_ident()?.as_ref().to_owned())
      })
      .ok();
    match next_owned(input) {
      Ok(Token::CurlyBracketBlock) => {}
      Ok(t) => return Err(input.new_unexpected_token_error(t)),
      Err(err) => return Err(err.into()),
    }
    self.handler.on_page_start(pseudo, self.begin_span(start));
    self.parse_declaration_block(input)?;
    self.handler.on_page_end(self.span(input, start));
    Ok(())
  }

  fn parse_font_face<'i, 't>(&mut self, input: &mut Parser<'i, 't>, start: &TokenStart) -> GssResult<'i, ()> {
    match next_owned(input) {
      Ok(Token::CurlyBracketBlock) => {}
      Ok(t) => return Err(input.new_unexpected_token_error(t)),
      Err(err) => return Err(err.into()),
    }
    self.handler.on_font_face_start(self.begin_span(start));
    self.parse_declaration_block(input)?;
    self.handler.on_font_face_end(self.span(input, start));
    Ok(())
  }

  fn parse_mixin_definition<'i, 't>(&mut self, input: &mut Parser<'i, 't>, start: &TokenStart) -> GssResult<'i, ()> {
    let name = input.expect_ident()?.as_ref().to_owned();
    match next_owned(input) {
      Ok(Token::ParenthesisBlock) => {}
      Ok(t) => return Err(input.new_unexpected_token_error(t)),
      Err(err) => return Err(err.into()),
    }
    let params = input.parse_nested_block(|p| -> GssResult<'i, Vec<String>> {
      let mut params = Vec::new();
      loop {
        match next_owned(p) {
          Err(_) => break,
          Ok(Token::Ident(param)) => {
            if !is_reference_ident(param.as_ref()) {
              return Err(p.new_custom_error(ParserError::InvalidDefinitionName(param)));
            }
            params.push(param.as_ref().to_owned());
          }
          Ok(Token::Comma) => {}
          Ok(t) => return Err(p.new_unexpected_token_error(t)),
        }
      }
      Ok(params)
    })?;
    match next_owned(input) {
      Ok(Token::CurlyBracketBlock) => {}
      Ok(t) => return Err(input.new_unexpected_token_error(t)),
      Err(err) => return Err(err.into()),
    }
    self.handler.on_mixin_definition_start(name, params, self.begin_span(start));
    self.parse_declaration_block(input)?;
    self.handler.on_mixin_definition_end(self.span(input, start));
    Ok(())
  }

  fn parse_keyframes<'i, 't>(&mut self, input: &mut Parser<'i, 't>, prefix: VendorPrefix, start: &TokenStart) -> GssResult<'i, ()> {
    let name = match next_owned(input) {
      Ok(Token::Ident(s)) => s.as_ref().to_owned(),
      Ok(Token::QuotedString(s)) => s.as_ref().to_owned(),
      Ok(t) => return Err(input.new_unexpected_token_error(t)),
      Err(err) => return Err(err.into()),
    };
    match next_owned(input) {
      Ok(Token::CurlyBracketBlock) => {}
      Ok(t) => return Err(input.new_unexpected_token_error(t)),
      Err(err) => return Err(err.into()),
    }
    self.handler.on_keyframes_start(prefix, name, self.begin_span(start));
    input.parse_nested_block(|p| -> GssResult<'i, ()> {
      self.parse_rule_list(p, RuleContext::Keyframes);
      Ok(())
    })?;
    self.handler.on_keyframes_end(self.span(input, start));
    Ok(())
  }

  fn parse_keyframe_ruleset<'i, 't>(&mut self, input: &mut Parser<'i, 't>) -> GssResult<'i, ()> {
    let start = Self::token_start(input);
    let mut keys = Vec::new();
    loop {
      match next_owned(input) {
        Ok(Token::Percentage { unit_value, .. }) => keys.push(KeyframeKey::Percentage(unit_value as f64 * 100.0)),
        Ok(Token::Ident(word)) if word.eq_ignore_ascii_case("from") => keys.push(KeyframeKey::From),
        Ok(Token::Ident(word)) if word.eq_ignore_ascii_case("to") => keys.push(KeyframeKey::To),
        Ok(Token::Comma) => {}
        Ok(Token::CurlyBracketBlock) => break,
        Ok(_) => return Err(input.new_custom_error(ParserError::InvalidKeyframeKey)),
        Err(err) => return Err(err.into()),
      }
    }
    if keys.is_empty() {
      // The block is already open; drain it so recovery continues cleanly
      // at the next keyframe ruleset.
      input.parse_nested_block(|p| -> GssResult<'i, ()> {
        while p.next_including_whitespace_and_comments().is_ok() {}
        Ok(())
      })?;
      let loc = self.begin_span(&start);
      self.report_message(ParserError::InvalidKeyframeKey.message(), loc);
      return Ok(());
    }
    self.handler.on_keyframe_ruleset_start(keys, self.begin_span(&start));
    self.parse_declaration_block(input)?;
    self.handler.on_keyframe_ruleset_end();
    Ok(())
  }

  fn parse_component<'i, 't>(&mut self, input: &mut Parser<'i, 't>, is_abstract: bool, start: &TokenStart) -> GssResult<'i, ()> {
    let name = input.expect_ident()?.as_ref().to_owned();
    let parent = input
      .try_parse(|p| -> GssResult<'i, String> {
        let word = p.expect_ident()?.as_ref().to_owned();
        if !word.eq_ignore_ascii_case("extends") {
          return Err(p.new_custom_error(ParserError::InvalidSelector));
        }
        Ok(p.expect_ident()?.as_ref().to_owned())
      })
      .ok();
    match next_owned(input) {
      Ok(Token::CurlyBracketBlock) => {}
      Ok(t) => return Err(input.new_unexpected_token_error(t)),
      Err(err) => return Err(err.into()),
    }
    self.handler.on_component_start(name, parent, is_abstract, self.begin_span(start));
    input.parse_nested_block(|p| -> GssResult<'i, ()> {
      self.parse_rule_list(p, RuleContext::Block);
      Ok(())
    })?;
    self.handler.on_component_end(self.span(input, start));
    Ok(())
  }

  fn parse_for_loop<'i, 't>(&mut self, input: &mut Parser<'i, 't>, start: &TokenStart) -> GssResult<'i, ()> {
    match next_owned(input) {
      Ok(Token::Delim('$')) => {}
      Ok(_) | Err(_) => return Err(input.new_custom_error(ParserError::InvalidLoopHeader)),
    }
    let variable = match next_owned_including_whitespace(input) {
      Ok(Token::Ident(name)) => name.as_ref().to_owned(),
      _ => return Err(input.new_custom_error(ParserError::InvalidLoopHeader)),
    };
    self.expect_keyword(input, "from")?;
    let from = self.parse_simple_value(input)?;
    self.expect_keyword(input, "to")?;
    let to = self.parse_simple_value(input)?;
    let state = input.state();
    let step = match next_owned(input) {
      Ok(Token::Ident(word)) if word.eq_ignore_ascii_case("step") => Some(self.parse_simple_value(input)?),
      _ => {
        input.reset(&state);
        None
      }
    };
    match next_owned(input) {
      Ok(Token::CurlyBracketBlock) => {}
      Ok(_) | Err(_) => return Err(input.new_custom_error(ParserError::InvalidLoopHeader)),
    }
    self
      .handler
      .on_for_loop_start(variable, from, to, step, self.begin_span(start));
    input.parse_nested_block(|p| -> GssResult<'i, ()> {
      self.parse_rule_list(p, RuleContext::Block);
      Ok(())
    })?;
    self.handler.on_for_loop_end(self.span(input, start));
    Ok(())
  }

  fn expect_keyword<'i, 't>(&mut self, input: &mut Parser<'i, 't>, word: &str) -> GssResult<'i, ()> {
    match next_owned(input) {
      Ok(Token::Ident(name)) if name.eq_ignore_ascii_case(word) => Ok(()),
      Ok(_) | Err(_) => Err(input.new_custom_error(ParserError::InvalidLoopHeader)),
    }
  }

  fn parse_simple_value<'i, 't>(&mut self, input: &mut Parser<'i, 't>) -> GssResult<'i, ValueToken> {
    match next_owned(input) {
      Ok(Token::Number { value, .. }) => Ok(ValueToken::Numeric {
        value: value as f64,
        unit: String::new(),
      }),
      Ok(Token::Dimension { value, unit, .. }) => Ok(ValueToken::Numeric {
        value: value as f64,
        unit: unit.as_ref().into(),
      }),
      Ok(Token::Ident(name)) if is_reference_ident(name.as_ref()) => Ok(ValueToken::ConstantRef(name.as_ref().into())),
      Ok(_) | Err(_) => Err(input.new_custom_error(ParserError::InvalidLoopHeader)),
    }
  }

  fn parse_unknown_at_rule<'i, 't>(&mut self, input: &mut Parser<'i, 't>, name: &str, start: &TokenStart) -> GssResult<'i, ()> {
    let (prelude, has_block) = self.slice_at_rule_prelude(input)?;
    self
      .handler
      .on_unknown_at_rule_start(name.to_owned(), prelude, has_block, self.begin_span(start));
    if has_block {
      input.parse_nested_block(|p| -> GssResult<'i, ()> {
        self.parse_rule_list(p, RuleContext::Block);
        Ok(())
      })?;
    }
    self.handler.on_unknown_at_rule_end(self.span(input, start));
    Ok(())
  }

  /// Raw text up to the rule body or terminator. True when a `{` block
  /// follows (the block token is consumed, its contents are not).
  fn slice_at_rule_prelude<'i, 't>(&mut self, input: &mut Parser<'i, 't>) -> GssResult<'i, (String, bool)> {
    let start_pos = input.position();
    let mut end_pos = start_pos;
    let has_block;
    loop {
      let state = input.state();
      match next_owned(input) {
        Ok(Token::CurlyBracketBlock) => {
          end_pos = state.position();
          has_block = true;
          break;
        }
        Ok(Token::Semicolon) => {
          end_pos = state.position();
          has_block = false;
          break;
        }
        Ok(_) => end_pos = input.position(),
        Err(_) => {
          has_block = false;
          break;
        }
      }
    }
    let prelude = input.slice(start_pos..end_pos).trim().to_string();
    Ok((prelude, has_block))
  }

  fn slice_prelude_until_block<'i, 't>(&mut self, input: &mut Parser<'i, 't>) -> GssResult<'i, String> {
    let start_pos = input.position();
    let mut end_pos = start_pos;
    loop {
      let state = input.state();
      match next_owned(input) {
        Ok(Token::CurlyBracketBlock) => {
          end_pos = state.position();
          break;
        }
        Ok(_) => end_pos = input.position(),
        Err(err) => return Err(err.into()),
      }
    }
    Ok(input.slice(start_pos..end_pos).trim().to_string())
  }

  // ---- recovery ----

  /// Skips forward until a `;` is consumed or a `{...}` block is consumed
  /// whole, whichever comes first.
  fn skip_to_rule_end<'i, 't>(&mut self, input: &mut Parser<'i, 't>) {
    loop {
      match next_owned(input) {
        Err(_) | Ok(Token::Semicolon) => return,
        Ok(Token::CurlyBracketBlock) => {
          let _ = input.parse_nested_block(|p| -> GssResult<'i, ()> {
            while p.next_including_whitespace_and_comments().is_ok() {}
            Ok(())
          });
          return;
        }
        Ok(_) => {}
      }
    }
  }

  fn recover_declaration<'i, 't>(&mut self, input: &mut Parser<'i, 't>) {
    let _ = input.parse_until_after(Delimiter::Semicolon, |p| -> GssResult<'i, ()> {
      while p.next_including_whitespace_and_comments().is_ok() {}
      Ok(())
    });
  }
}

fn next_owned<'i, 't>(input: &mut Parser<'i, 't>) -> Result<Token<'i>, cssparser::BasicParseError<'i>> {
  input.next().map(|t| t.clone())
}

fn next_owned_including_whitespace<'i, 't>(
  input: &mut Parser<'i, 't>,
) -> Result<Token<'i>, cssparser::BasicParseError<'i>> {
  input.next_including_whitespace().map(|t| t.clone())
}
