//! Source files and source locations.
//!
//! A compilation treats its input files as one logical unit. Every node and
//! diagnostic carries a [`SourceLocation`]: a half-open `[begin, end)`
//! character range into one file, with 1-indexed line/column on both ends.

use std::cmp::Ordering;

/// Identifies a file within a [`SourceSet`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SourceId(pub u32);

impl SourceId {
  /// The id used by [`SourceLocation::unknown`]. It never resolves to a file.
  pub const UNKNOWN: SourceId = SourceId(u32::MAX);
}

/// An input file. Contents may be absent for synthetic placeholders
/// (e.g. a "global" source that only exists to anchor diagnostics).
#[derive(Debug, Clone, Default)]
pub struct SourceFile {
  pub name: Option<String>,
  pub contents: Option<String>,
}

impl SourceFile {
  pub fn new(name: impl Into<String>, contents: impl Into<String>) -> SourceFile {
    SourceFile {
      name: Some(name.into()),
      contents: Some(contents.into()),
    }
  }

  pub fn placeholder(name: impl Into<String>) -> SourceFile {
    SourceFile {
      name: Some(name.into()),
      contents: None,
    }
  }

  pub fn len(&self) -> usize {
    self.contents.as_ref().map_or(0, |c| c.len())
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  /// The source line containing `index` (without its terminator), for caret
  /// rendering in diagnostics.
  pub fn line_at(&self, index: usize) -> Option<&str> {
    let contents = self.contents.as_deref()?;
    if index > contents.len() {
      return None;
    }
    let begin = contents[..index].rfind(['\n', '\r', '\x0c']).map_or(0, |i| i + 1);
    let end = contents[begin..]
      .find(['\n', '\r', '\x0c'])
      .map_or(contents.len(), |i| begin + i);
    Some(&contents[begin..end])
  }
}

/// The ordered input files of one compilation.
#[derive(Debug, Default)]
pub struct SourceSet {
  files: Vec<SourceFile>,
}

impl SourceSet {
  pub fn new() -> SourceSet {
    SourceSet { files: Vec::new() }
  }

  pub fn add(&mut self, file: SourceFile) -> SourceId {
    let id = SourceId(self.files.len() as u32);
    self.files.push(file);
    id
  }

  pub fn get(&self, id: SourceId) -> Option<&SourceFile> {
    self.files.get(id.0 as usize)
  }

  pub fn iter(&self) -> impl Iterator<Item = (SourceId, &SourceFile)> {
    self.files.iter().enumerate().map(|(i, f)| (SourceId(i as u32), f))
  }

  pub fn len(&self) -> usize {
    self.files.len()
  }

  pub fn is_empty(&self) -> bool {
    self.files.is_empty()
  }
}

/// One endpoint of a location: a character index plus its derived
/// 1-indexed line and column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SourcePoint {
  pub index: usize,
  pub line: u32,
  pub column: u32,
}

impl SourcePoint {
  pub fn new(index: usize, line: u32, column: u32) -> SourcePoint {
    debug_assert!(line >= 1 && column >= 1);
    SourcePoint { index, line, column }
  }
}

/// A half-open `[begin, end)` range into one source file, or the
/// distinguished unknown location.
///
/// Unknown compares equal to itself and orders after every known location.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SourceLocation {
  pub source: SourceId,
  pub begin: SourcePoint,
  pub end: SourcePoint,
}

impl SourceLocation {
  pub fn new(source: SourceId, begin: SourcePoint, end: SourcePoint) -> SourceLocation {
    debug_assert!(begin.index <= end.index);
    SourceLocation { source, begin, end }
  }

  pub fn unknown() -> SourceLocation {
    SourceLocation {
      source: SourceId::UNKNOWN,
      begin: SourcePoint { index: 0, line: 1, column: 1 },
      end: SourcePoint { index: 0, line: 1, column: 1 },
    }
  }

  pub fn is_unknown(&self) -> bool {
    self.source == SourceId::UNKNOWN
  }

  /// The span from `a.begin` to `b.end`. Both must refer to the same source;
  /// merging with unknown yields the known side.
  pub fn merge(a: SourceLocation, b: SourceLocation) -> SourceLocation {
    if a.is_unknown() {
      return b;
    }
    if b.is_unknown() {
      return a;
    }
    assert_eq!(a.source, b.source, "cannot merge locations from different sources");
    SourceLocation::new(a.source, a.begin, b.end)
  }
}

impl PartialOrd for SourceLocation {
  fn partial_cmp(&self, other: &SourceLocation) -> Option<Ordering> {
    Some(self.cmp(other))
  }
}

impl Ord for SourceLocation {
  fn cmp(&self, other: &SourceLocation) -> Ordering {
    match (self.is_unknown(), other.is_unknown()) {
      (true, true) => Ordering::Equal,
      (true, false) => Ordering::Greater,
      (false, true) => Ordering::Less,
      (false, false) => self
        .source
        .cmp(&other.source)
        .then(self.begin.index.cmp(&other.begin.index))
        .then(self.end.index.cmp(&other.end.index)),
    }
  }
}

/// Accumulates the endpoints of a location and produces the immutable value.
#[derive(Debug, Clone)]
pub struct LocationBuilder {
  source: SourceId,
  begin: Option<SourcePoint>,
  end: Option<SourcePoint>,
}

impl LocationBuilder {
  pub fn new(source: SourceId) -> LocationBuilder {
    LocationBuilder {
      source,
      begin: None,
      end: None,
    }
  }

  pub fn begin(mut self, point: SourcePoint) -> LocationBuilder {
    self.begin = Some(point);
    self
  }

  pub fn end(mut self, point: SourcePoint) -> LocationBuilder {
    self.end = Some(point);
    self
  }

  pub fn build(self) -> SourceLocation {
    match (self.begin, self.end) {
      (Some(begin), Some(end)) => SourceLocation::new(self.source, begin, end),
      (Some(begin), None) => SourceLocation::new(self.source, begin, begin),
      _ => SourceLocation::unknown(),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn point(index: usize, line: u32, column: u32) -> SourcePoint {
    SourcePoint::new(index, line, column)
  }

  #[test]
  fn merge_spans_same_source() {
    let a = SourceLocation::new(SourceId(0), point(0, 1, 1), point(4, 1, 5));
    let b = SourceLocation::new(SourceId(0), point(10, 2, 3), point(12, 2, 5));
    let merged = SourceLocation::merge(a, b);
    assert_eq!(merged.begin, a.begin);
    assert_eq!(merged.end, b.end);
  }

  #[test]
  fn merge_with_unknown_yields_known_side() {
    let a = SourceLocation::new(SourceId(0), point(0, 1, 1), point(4, 1, 5));
    assert_eq!(SourceLocation::merge(a, SourceLocation::unknown()), a);
    assert_eq!(SourceLocation::merge(SourceLocation::unknown(), a), a);
  }

  #[test]
  fn unknown_orders_after_everything() {
    let a = SourceLocation::new(SourceId(9), point(100, 7, 1), point(104, 7, 5));
    let unknown = SourceLocation::unknown();
    assert!(a < unknown);
    assert_eq!(unknown, SourceLocation::unknown());
    assert_eq!(unknown.cmp(&SourceLocation::unknown()), Ordering::Equal);
  }

  #[test]
  fn locations_order_by_source_then_begin_then_end() {
    let a = SourceLocation::new(SourceId(0), point(5, 1, 6), point(9, 1, 10));
    let b = SourceLocation::new(SourceId(0), point(5, 1, 6), point(12, 1, 13));
    let c = SourceLocation::new(SourceId(1), point(0, 1, 1), point(1, 1, 2));
    assert!(a < b);
    assert!(b < c);
  }

  #[test]
  fn line_at_finds_the_enclosing_line() {
    let file = SourceFile::new("t.gss", "a { b: c; }\n.x { color: red; }\n");
    assert_eq!(file.line_at(0), Some("a { b: c; }"));
    assert_eq!(file.line_at(14), Some(".x { color: red; }"));
  }

  #[test]
  fn builder_produces_immutable_value() {
    let loc = LocationBuilder::new(SourceId(2))
      .begin(point(3, 1, 4))
      .end(point(8, 1, 9))
      .build();
    assert_eq!(loc.source, SourceId(2));
    assert_eq!(loc.begin.index, 3);
    assert_eq!(loc.end.index, 8);
  }
}
