//! Error types shared across the parser and the printer.

use cssparser::{BasicParseErrorKind, CowRcStr, ParseErrorKind, Token};

/// A parser-level error. These are converted into [`Diagnostic`](crate::diagnostics::Diagnostic)s
/// by the parser's recovery path rather than surfaced to callers directly.
#[derive(Debug, Clone, PartialEq)]
pub enum ParserError<'i> {
  /// An at-rule with an unrecognized name.
  AtRuleInvalid(CowRcStr<'i>),
  /// A token that is not valid in the current position.
  UnexpectedToken(Token<'i>),
  /// The input ended in the middle of a construct.
  EndOfInput,
  /// A malformed `@def` name (definition names must be reference identifiers).
  InvalidDefinitionName(CowRcStr<'i>),
  /// A malformed boolean condition in `@if`/`@elseif`.
  InvalidBooleanExpression,
  /// `@elseif` or `@else` after a closed `@else` arm.
  UnreachableConditionalArm,
  /// A malformed keyframe key.
  InvalidKeyframeKey,
  /// A malformed `@for` loop header.
  InvalidLoopHeader,
  /// A selector that could not be parsed.
  InvalidSelector,
}

impl<'i> ParserError<'i> {
  pub fn message(&self) -> String {
    match self {
      ParserError::AtRuleInvalid(name) => format!("Unrecognized at-rule \"@{}\"", name),
      ParserError::UnexpectedToken(token) => format!("Unexpected token {:?}", token),
      ParserError::EndOfInput => "Unexpected end of input".into(),
      ParserError::InvalidDefinitionName(name) => {
        format!("Invalid @def name \"{}\": expected an identifier of the form [A-Z_][A-Z0-9_]*", name)
      }
      ParserError::InvalidBooleanExpression => "Invalid boolean expression".into(),
      ParserError::UnreachableConditionalArm => "Conditional arm after @else can never apply".into(),
      ParserError::InvalidKeyframeKey => "Invalid keyframe key: expected a percentage, \"from\" or \"to\"".into(),
      ParserError::InvalidLoopHeader => "Invalid @for header: expected \"$var from <value> to <value> [step <value>]\"".into(),
      ParserError::InvalidSelector => "Invalid selector".into(),
    }
  }
}

impl<'i> From<BasicParseErrorKind<'i>> for ParserError<'i> {
  fn from(kind: BasicParseErrorKind<'i>) -> Self {
    match kind {
      BasicParseErrorKind::UnexpectedToken(token) => ParserError::UnexpectedToken(token),
      BasicParseErrorKind::AtRuleInvalid(name) => ParserError::AtRuleInvalid(name),
      _ => ParserError::EndOfInput,
    }
  }
}

impl<'i> From<ParseErrorKind<'i, ParserError<'i>>> for ParserError<'i> {
  fn from(kind: ParseErrorKind<'i, ParserError<'i>>) -> Self {
    match kind {
      ParseErrorKind::Basic(b) => b.into(),
      ParseErrorKind::Custom(c) => c,
    }
  }
}

/// An error that occurred while writing CSS output.
#[derive(Debug)]
pub enum PrinterError {
  FmtError,
}

impl From<std::fmt::Error> for PrinterError {
  fn from(_: std::fmt::Error) -> PrinterError {
    PrinterError::FmtError
  }
}
