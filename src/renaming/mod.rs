//! CSS class renaming.
//!
//! A substitution map takes an original class name to its renamed form. Maps
//! compose: the splitting map renames each hyphen-delimited part through its
//! delegate, the prefixing map prepends a fixed prefix, and the recording
//! decorator captures every lookup in call order so the result can be
//! serialized (see [`format`]).

pub mod format;

use ahash::AHashMap;
use indexmap::IndexMap;

/// An insertion-ordered renaming, as recorded during a compilation or read
/// back from a serialized map.
#[derive(Debug, Default, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct RenamingMap(pub IndexMap<String, String>);

pub trait SubstitutionMap {
  /// The renamed form of `key`. Stable: the same key always maps to the
  /// same value within one map instance.
  fn get(&mut self, key: &str) -> String;
}

/// A substitution map that can also report the finer-grained pair mappings
/// implied by a renaming: renaming `goog-component` as `a-b` implies
/// `goog → a` and `component → b`.
pub trait MultipleMappingSubstitutionMap: SubstitutionMap {
  fn get_mappings(&mut self, key: &str) -> Vec<(String, String)>;
}

/// Leaves every class name untouched.
#[derive(Debug, Default)]
pub struct IdentitySubstitutionMap;

impl SubstitutionMap for IdentitySubstitutionMap {
  fn get(&mut self, key: &str) -> String {
    key.to_string()
  }
}

/// Appends a trailing `_`, keeping names readable while making renaming
/// visible. Used by the debug renaming mode.
#[derive(Debug, Default)]
pub struct DebugSubstitutionMap;

impl SubstitutionMap for DebugSubstitutionMap {
  fn get(&mut self, key: &str) -> String {
    format!("{}_", key)
  }
}

/// Produces the shortest available names: `a`..`z`, then two-character
/// names drawing digits after the first position.
#[derive(Debug, Default)]
pub struct MinimalSubstitutionMap {
  next: usize,
  assigned: AHashMap<String, String>,
}

impl MinimalSubstitutionMap {
  pub fn new() -> MinimalSubstitutionMap {
    MinimalSubstitutionMap::default()
  }

  fn short_name(mut index: usize) -> String {
    const FIRST: &[u8] = b"abcdefghijklmnopqrstuvwxyz";
    const REST: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
    let mut out = String::new();
    out.push(FIRST[index % FIRST.len()] as char);
    index /= FIRST.len();
    while index > 0 {
      index -= 1;
      out.push(REST[index % REST.len()] as char);
      index /= REST.len();
    }
    out
  }
}

impl SubstitutionMap for MinimalSubstitutionMap {
  fn get(&mut self, key: &str) -> String {
    if let Some(existing) = self.assigned.get(key) {
      return existing.clone();
    }
    let name = MinimalSubstitutionMap::short_name(self.next);
    self.next += 1;
    self.assigned.insert(key.to_string(), name.clone());
    name
  }
}

/// Renames each hyphen-delimited part of a class name through the delegate
/// and rejoins: `dialog-content` becomes `a-b`.
#[derive(Debug, Default)]
pub struct SplittingSubstitutionMap<M> {
  inner: M,
}

impl<M: SubstitutionMap> SplittingSubstitutionMap<M> {
  pub fn new(inner: M) -> SplittingSubstitutionMap<M> {
    SplittingSubstitutionMap { inner }
  }
}

impl<M: SubstitutionMap> SubstitutionMap for SplittingSubstitutionMap<M> {
  fn get(&mut self, key: &str) -> String {
    key
      .split('-')
      .map(|part| self.inner.get(part))
      .collect::<Vec<_>>()
      .join("-")
  }
}

impl<M: SubstitutionMap> MultipleMappingSubstitutionMap for SplittingSubstitutionMap<M> {
  fn get_mappings(&mut self, key: &str) -> Vec<(String, String)> {
    key
      .split('-')
      .map(|part| (part.to_string(), self.inner.get(part)))
      .collect()
  }
}

/// Prepends a fixed prefix to every renamed class.
#[derive(Debug)]
pub struct PrefixingSubstitutionMap<M> {
  prefix: String,
  inner: M,
}

impl<M: SubstitutionMap> PrefixingSubstitutionMap<M> {
  pub fn new(prefix: impl Into<String>, inner: M) -> PrefixingSubstitutionMap<M> {
    PrefixingSubstitutionMap {
      prefix: prefix.into(),
      inner,
    }
  }
}

impl<M: SubstitutionMap> SubstitutionMap for PrefixingSubstitutionMap<M> {
  fn get(&mut self, key: &str) -> String {
    format!("{}{}", self.prefix, self.inner.get(key))
  }
}

/// Records every lookup, in call order, for later serialization. An initial
/// map pre-seeds the renaming from a prior compilation; seeded keys never
/// reach the delegate.
pub struct RecordingSubstitutionMap {
  inner: Box<dyn SubstitutionMap>,
  mappings: IndexMap<String, String>,
}

impl RecordingSubstitutionMap {
  pub fn new(inner: Box<dyn SubstitutionMap>) -> RecordingSubstitutionMap {
    RecordingSubstitutionMap {
      inner,
      mappings: IndexMap::new(),
    }
  }

  pub fn with_initial(inner: Box<dyn SubstitutionMap>, initial: RenamingMap) -> RecordingSubstitutionMap {
    RecordingSubstitutionMap {
      inner,
      mappings: initial.0,
    }
  }

  pub fn mappings(&self) -> &IndexMap<String, String> {
    &self.mappings
  }

  pub fn into_renaming_map(self) -> RenamingMap {
    RenamingMap(self.mappings)
  }
}

impl SubstitutionMap for RecordingSubstitutionMap {
  fn get(&mut self, key: &str) -> String {
    if let Some(existing) = self.mappings.get(key) {
      return existing.clone();
    }
    let renamed = self.inner.get(key);
    self.mappings.insert(key.to_string(), renamed.clone());
    renamed
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use pretty_assertions::assert_eq;

  #[test]
  fn minimal_names_are_short_and_stable() {
    let mut map = MinimalSubstitutionMap::new();
    assert_eq!(map.get("dialog"), "a");
    assert_eq!(map.get("content"), "b");
    assert_eq!(map.get("dialog"), "a");
    assert_eq!(map.get("title"), "c");
  }

  #[test]
  fn minimal_names_stay_valid_past_the_alphabet() {
    for i in 0..100 {
      let name = MinimalSubstitutionMap::short_name(i);
      assert!(name.chars().next().unwrap().is_ascii_lowercase());
      assert!(name.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()));
    }
    let mut seen = std::collections::HashSet::new();
    for i in 0..1000 {
      assert!(seen.insert(MinimalSubstitutionMap::short_name(i)), "duplicate short name");
    }
  }

  #[test]
  fn splitting_renames_each_part() {
    let mut map = SplittingSubstitutionMap::new(MinimalSubstitutionMap::new());
    assert_eq!(map.get("dialog-content"), "a-b");
    assert_eq!(map.get("dialog-title"), "a-c");
    assert_eq!(
      map.get_mappings("dialog-content"),
      vec![("dialog".to_string(), "a".to_string()), ("content".to_string(), "b".to_string())]
    );
  }

  #[test]
  fn prefixing_applies_to_the_renamed_form() {
    let mut map = PrefixingSubstitutionMap::new("x-", MinimalSubstitutionMap::new());
    assert_eq!(map.get("button"), "x-a");
  }

  #[test]
  fn recording_captures_in_call_order() {
    let mut map = RecordingSubstitutionMap::new(Box::new(MinimalSubstitutionMap::new()));
    map.get("zebra");
    map.get("apple");
    map.get("zebra");
    let keys: Vec<&String> = map.mappings().keys().collect();
    assert_eq!(keys, vec!["zebra", "apple"]);
  }

  #[test]
  fn recording_honors_the_initial_map() {
    let mut initial = IndexMap::new();
    initial.insert("button".to_string(), "qq".to_string());
    let mut map = RecordingSubstitutionMap::with_initial(Box::new(MinimalSubstitutionMap::new()), RenamingMap(initial));
    assert_eq!(map.get("button"), "qq");
    // Fresh keys still go through the delegate.
    assert_eq!(map.get("other"), "a");
  }

  #[test]
  fn debug_map_appends_an_underscore() {
    let mut map = DebugSubstitutionMap;
    assert_eq!(map.get("dialog"), "dialog_");
  }
}
