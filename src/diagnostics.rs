//! Diagnostic accumulation.
//!
//! The parser and every pass push their findings here. The driver checks
//! [`ErrorManager::has_errors`] after each pass and short-circuits the rest of
//! the pipeline when an error was reported; warnings never halt a compilation.

use crate::location::{SourceLocation, SourceSet};
use std::collections::BTreeSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DiagnosticKind {
  Error,
  Warning,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Diagnostic {
  pub location: SourceLocation,
  pub message: String,
  pub kind: DiagnosticKind,
}

impl PartialOrd for Diagnostic {
  fn partial_cmp(&self, other: &Diagnostic) -> Option<std::cmp::Ordering> {
    Some(self.cmp(other))
  }
}

impl Ord for Diagnostic {
  fn cmp(&self, other: &Diagnostic) -> std::cmp::Ordering {
    self
      .location
      .cmp(&other.location)
      .then_with(|| self.message.cmp(&other.message))
      .then_with(|| self.kind.cmp(&other.kind))
  }
}

impl Diagnostic {
  /// Renders `name:line:col: kind: message`, the offending source line, and a
  /// caret line spanning the location.
  pub fn format(&self, sources: &SourceSet) -> String {
    let kind = match self.kind {
      DiagnosticKind::Error => "error",
      DiagnosticKind::Warning => "warning",
    };

    if self.location.is_unknown() {
      return format!("<unknown>: {}: {}", kind, self.message);
    }

    let file = sources.get(self.location.source);
    let name = file
      .and_then(|f| f.name.as_deref())
      .unwrap_or("<input>");
    let begin = self.location.begin;
    let mut out = format!("{}:{}:{}: {}: {}", name, begin.line, begin.column, kind, self.message);

    if let Some(line) = file.and_then(|f| f.line_at(begin.index)) {
      let span = if self.location.end.line == begin.line {
        (self.location.end.column.saturating_sub(begin.column)).max(1) as usize
      } else {
        line.len().saturating_sub(begin.column as usize - 1).max(1)
      };
      out.push('\n');
      out.push_str(line);
      out.push('\n');
      out.push_str(&" ".repeat(begin.column as usize - 1));
      out.push_str(&"^".repeat(span));
    }

    out
  }
}

/// Accumulates diagnostics in location order. Reporting the same diagnostic
/// twice is a no-op.
#[derive(Debug, Default)]
pub struct ErrorManager {
  errors: BTreeSet<Diagnostic>,
  warnings: BTreeSet<Diagnostic>,
}

impl ErrorManager {
  pub fn new() -> ErrorManager {
    ErrorManager::default()
  }

  pub fn report_error(&mut self, message: impl Into<String>, location: SourceLocation) {
    self.errors.insert(Diagnostic {
      location,
      message: message.into(),
      kind: DiagnosticKind::Error,
    });
  }

  pub fn report_warning(&mut self, message: impl Into<String>, location: SourceLocation) {
    self.warnings.insert(Diagnostic {
      location,
      message: message.into(),
      kind: DiagnosticKind::Warning,
    });
  }

  pub fn has_errors(&self) -> bool {
    !self.errors.is_empty()
  }

  pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
    self.errors.iter()
  }

  pub fn warnings(&self) -> impl Iterator<Item = &Diagnostic> {
    self.warnings.iter()
  }

  /// All diagnostics in location order, errors and warnings interleaved.
  pub fn all(&self) -> Vec<&Diagnostic> {
    let mut all: Vec<&Diagnostic> = self.errors.iter().chain(self.warnings.iter()).collect();
    all.sort();
    all
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::location::{SourceFile, SourceId, SourceLocation, SourcePoint};
  use pretty_assertions::assert_eq;

  fn loc(index: usize, line: u32, column: u32, len: usize) -> SourceLocation {
    SourceLocation::new(
      SourceId(0),
      SourcePoint::new(index, line, column),
      SourcePoint::new(index + len, line, column + len as u32),
    )
  }

  #[test]
  fn reporting_is_idempotent() {
    let mut errors = ErrorManager::new();
    errors.report_error("boom", loc(3, 1, 4, 2));
    errors.report_error("boom", loc(3, 1, 4, 2));
    errors.report_warning("hm", loc(0, 1, 1, 1));
    assert_eq!(errors.errors().count(), 1);
    assert_eq!(errors.warnings().count(), 1);
    assert!(errors.has_errors());
  }

  #[test]
  fn diagnostics_sort_by_location() {
    let mut errors = ErrorManager::new();
    errors.report_error("second", loc(10, 2, 3, 1));
    errors.report_error("first", loc(2, 1, 3, 1));
    let messages: Vec<&str> = errors.errors().map(|d| d.message.as_str()).collect();
    assert_eq!(messages, vec!["first", "second"]);
  }

  #[test]
  fn format_renders_caret_line() {
    let mut sources = SourceSet::new();
    sources.add(SourceFile::new("test.gss", ".a { color: bogus!; }"));
    let d = Diagnostic {
      location: loc(12, 1, 13, 5),
      message: "Unexpected token".into(),
      kind: DiagnosticKind::Error,
    };
    assert_eq!(
      d.format(&sources),
      "test.gss:1:13: error: Unexpected token\n.a { color: bogus!; }\n            ^^^^^"
    );
  }
}
