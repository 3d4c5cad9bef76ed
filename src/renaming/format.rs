//! Serialized renaming-map formats.
//!
//! Each format wraps a payload in a preamble/postamble. JSON payloads are
//! pretty-printed with 2-space indent in insertion order. Every format can
//! be read back: `read(write(m)) == m`.

use crate::renaming::RenamingMap;
use indexmap::IndexMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputRenamingMapFormat {
  /// `goog.setCssNameMapping({...});` for compiled Closure code.
  ClosureCompiled,
  /// Like [`OutputRenamingMapFormat::ClosureCompiled`], declaring the
  /// by-whole mapping style.
  ClosureCompiledByWhole,
  /// Like [`OutputRenamingMapFormat::ClosureCompiled`], but keys and values
  /// are first split on `-` into pair-wise sub-mappings.
  ClosureCompiledSplitHyphens,
  /// `CLOSURE_CSS_NAME_MAPPING = {...};` for uncompiled Closure code.
  ClosureUncompiled,
  /// The bare JSON object.
  Json,
  /// Java-properties style `key=value` lines, no timestamp header.
  Properties,
  /// `key:value` lines, the Closure Compiler variable-map format.
  JscompVariableMap,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MapFormatError {
  Malformed(String),
}

impl std::fmt::Display for MapFormatError {
  fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
    match self {
      MapFormatError::Malformed(detail) => write!(f, "malformed renaming map: {}", detail),
    }
  }
}

impl OutputRenamingMapFormat {
  pub fn from_name(name: &str) -> Option<OutputRenamingMapFormat> {
    Some(match name {
      "closure-compiled" => OutputRenamingMapFormat::ClosureCompiled,
      "closure-compiled-by-whole" => OutputRenamingMapFormat::ClosureCompiledByWhole,
      "closure-compiled-split-hyphens" => OutputRenamingMapFormat::ClosureCompiledSplitHyphens,
      "closure-uncompiled" => OutputRenamingMapFormat::ClosureUncompiled,
      "json" => OutputRenamingMapFormat::Json,
      "properties" => OutputRenamingMapFormat::Properties,
      "jscomp-variable-map" => OutputRenamingMapFormat::JscompVariableMap,
      _ => return None,
    })
  }

  pub fn write(&self, map: &RenamingMap) -> String {
    match self {
      OutputRenamingMapFormat::ClosureCompiled => {
        format!("goog.setCssNameMapping({});\n", json_payload(&map.0))
      }
      OutputRenamingMapFormat::ClosureCompiledByWhole => {
        format!("goog.setCssNameMapping({}, 'BY_WHOLE');\n", json_payload(&map.0))
      }
      OutputRenamingMapFormat::ClosureCompiledSplitHyphens => {
        format!("goog.setCssNameMapping({});\n", json_payload(&split_hyphens(&map.0)))
      }
      OutputRenamingMapFormat::ClosureUncompiled => {
        format!("CLOSURE_CSS_NAME_MAPPING = {};\n", json_payload(&map.0))
      }
      OutputRenamingMapFormat::Json => format!("{}\n", json_payload(&map.0)),
      OutputRenamingMapFormat::Properties => {
        let mut out = String::new();
        for (key, value) in &map.0 {
          out.push_str(key);
          out.push('=');
          out.push_str(value);
          out.push('\n');
        }
        out
      }
      OutputRenamingMapFormat::JscompVariableMap => {
        let mut out = String::new();
        for (key, value) in &map.0 {
          out.push_str(key);
          out.push(':');
          out.push_str(value);
          out.push('\n');
        }
        out
      }
    }
  }

  pub fn read(&self, text: &str) -> Result<RenamingMap, MapFormatError> {
    match self {
      OutputRenamingMapFormat::ClosureCompiled
      | OutputRenamingMapFormat::ClosureCompiledByWhole
      | OutputRenamingMapFormat::ClosureCompiledSplitHyphens
      | OutputRenamingMapFormat::ClosureUncompiled
      | OutputRenamingMapFormat::Json => {
        let begin = text
          .find('{')
          .ok_or_else(|| MapFormatError::Malformed("no JSON object found".into()))?;
        let end = text
          .rfind('}')
          .ok_or_else(|| MapFormatError::Malformed("no JSON object found".into()))?;
        let payload: IndexMap<String, String> =
          serde_json::from_str(&text[begin..=end]).map_err(|e| MapFormatError::Malformed(e.to_string()))?;
        Ok(RenamingMap(payload))
      }
      OutputRenamingMapFormat::Properties => read_lines(text, '='),
      OutputRenamingMapFormat::JscompVariableMap => read_lines(text, ':'),
    }
  }
}

fn json_payload(map: &IndexMap<String, String>) -> String {
  serde_json::to_string_pretty(map).expect("renaming map serialization cannot fail")
}

/// Splits each key/value on `-` into pair-wise sub-mappings. The key and
/// value of one entry must have the same number of parts.
fn split_hyphens(map: &IndexMap<String, String>) -> IndexMap<String, String> {
  let mut out = IndexMap::new();
  for (key, value) in map {
    let keys: Vec<&str> = key.split('-').collect();
    let values: Vec<&str> = value.split('-').collect();
    assert_eq!(
      keys.len(),
      values.len(),
      "renaming of \"{}\" as \"{}\" does not split evenly on hyphens",
      key,
      value
    );
    for (k, v) in keys.into_iter().zip(values) {
      out.insert(k.to_string(), v.to_string());
    }
  }
  out
}

fn read_lines(text: &str, separator: char) -> Result<RenamingMap, MapFormatError> {
  let mut map = IndexMap::new();
  for line in text.lines() {
    if line.trim().is_empty() {
      continue;
    }
    let (key, value) = line
      .split_once(separator)
      .ok_or_else(|| MapFormatError::Malformed(format!("line without '{}': {:?}", separator, line)))?;
    map.insert(key.to_string(), value.to_string());
  }
  Ok(RenamingMap(map))
}

#[cfg(test)]
mod tests {
  use super::*;
  use pretty_assertions::assert_eq;

  fn sample() -> RenamingMap {
    let mut map = IndexMap::new();
    map.insert("dialog".to_string(), "a".to_string());
    map.insert("content".to_string(), "b".to_string());
    map.insert("title".to_string(), "c".to_string());
    RenamingMap(map)
  }

  const ALL: [OutputRenamingMapFormat; 7] = [
    OutputRenamingMapFormat::ClosureCompiled,
    OutputRenamingMapFormat::ClosureCompiledByWhole,
    OutputRenamingMapFormat::ClosureCompiledSplitHyphens,
    OutputRenamingMapFormat::ClosureUncompiled,
    OutputRenamingMapFormat::Json,
    OutputRenamingMapFormat::Properties,
    OutputRenamingMapFormat::JscompVariableMap,
  ];

  #[test]
  fn every_format_round_trips() {
    for format in ALL {
      let written = format.write(&sample());
      let read = format.read(&written).unwrap();
      assert_eq!(read, sample(), "{:?}", format);
    }
  }

  #[test]
  fn closure_compiled_payload_shape() {
    let out = OutputRenamingMapFormat::ClosureCompiled.write(&sample());
    assert!(out.starts_with("goog.setCssNameMapping({"));
    assert!(out.ends_with("});\n"));
    assert!(out.contains("  \"dialog\": \"a\""));
  }

  #[test]
  fn by_whole_declares_the_style() {
    let out = OutputRenamingMapFormat::ClosureCompiledByWhole.write(&sample());
    assert!(out.ends_with(", 'BY_WHOLE');\n"));
  }

  #[test]
  fn split_hyphens_splits_pairwise() {
    let mut map = IndexMap::new();
    map.insert("dialog-content".to_string(), "a-b".to_string());
    map.insert("dialog-title".to_string(), "a-c".to_string());
    let out = OutputRenamingMapFormat::ClosureCompiledSplitHyphens.write(&RenamingMap(map));
    let read = OutputRenamingMapFormat::ClosureCompiledSplitHyphens.read(&out).unwrap();
    assert_eq!(read, sample());
  }

  #[test]
  #[should_panic(expected = "does not split evenly")]
  fn split_hyphens_asserts_length_agreement() {
    let mut map = IndexMap::new();
    map.insert("dialog-content".to_string(), "ab".to_string());
    OutputRenamingMapFormat::ClosureCompiledSplitHyphens.write(&RenamingMap(map));
  }

  #[test]
  fn properties_lines_have_no_timestamp() {
    let out = OutputRenamingMapFormat::Properties.write(&sample());
    assert_eq!(out, "dialog=a\ncontent=b\ntitle=c\n");
  }

  #[test]
  fn variable_map_uses_colons() {
    let out = OutputRenamingMapFormat::JscompVariableMap.write(&sample());
    assert_eq!(out, "dialog:a\ncontent:b\ntitle:c\n");
  }

  #[test]
  fn insertion_order_is_preserved_in_json() {
    let out = OutputRenamingMapFormat::Json.write(&sample());
    let dialog = out.find("dialog").unwrap();
    let content = out.find("content").unwrap();
    let title = out.find("title").unwrap();
    assert!(dialog < content && content < title);
  }
}
