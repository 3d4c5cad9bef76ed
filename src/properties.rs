//! Recognized CSS properties and their metadata.
//!
//! The registry is a process-wide read-only table built once on first use.
//! For every recognized property it records whether it is standard, whether
//! it is a shorthand, whether its value is positional (four-value box
//! syntax), the set of shorthands that cover it, and its partition: the
//! canonical shorthand root reached by following the first shorthand
//! recursively (`padding-left` → `padding`). Two properties in the same
//! partition share at least one shorthand. Unrecognized properties are their
//! own partition.

use crate::vendor_prefix::VendorPrefix;
use ahash::AHashMap;
use bitflags::bitflags;
use lazy_static::lazy_static;

bitflags! {
  #[derive(Debug, Clone, Copy, PartialEq, Eq)]
  pub struct PropertyFlags: u8 {
    /// Part of a CSS standard (as opposed to a vendor extension).
    const STANDARD = 0b0001;
    /// A shorthand that expands into several longhands.
    const SHORTHAND = 0b0010;
    /// Accepts the four-value top/right/bottom/left syntax.
    const POSITIONAL_VALUES = 0b0100;
  }
}

#[derive(Debug)]
pub struct PropertyInfo {
  pub name: &'static str,
  pub flags: PropertyFlags,
  /// Every shorthand that covers this property, outermost last.
  pub shorthands: Vec<&'static str>,
  /// The canonical shorthand root.
  pub partition: &'static str,
}

impl PropertyInfo {
  pub fn is_standard(&self) -> bool {
    self.flags.contains(PropertyFlags::STANDARD)
  }

  pub fn is_shorthand(&self) -> bool {
    self.flags.contains(PropertyFlags::SHORTHAND)
  }

  pub fn has_positional_values(&self) -> bool {
    self.flags.contains(PropertyFlags::POSITIONAL_VALUES)
  }
}

const S: u8 = 0b0001;
const H: u8 = 0b0010;
const P: u8 = 0b0100;

/// Name and flag bits of every recognized property.
#[rustfmt::skip]
static PROPERTY_TABLE: &[(&str, u8)] = &[
  ("margin", S | H | P),
  ("margin-top", S), ("margin-right", S), ("margin-bottom", S), ("margin-left", S),
  ("padding", S | H | P),
  ("padding-top", S), ("padding-right", S), ("padding-bottom", S), ("padding-left", S),
  ("border", S | H),
  ("border-top", S | H), ("border-right", S | H), ("border-bottom", S | H), ("border-left", S | H),
  ("border-width", S | H | P), ("border-style", S | H | P), ("border-color", S | H | P),
  ("border-top-width", S), ("border-right-width", S), ("border-bottom-width", S), ("border-left-width", S),
  ("border-top-style", S), ("border-right-style", S), ("border-bottom-style", S), ("border-left-style", S),
  ("border-top-color", S), ("border-right-color", S), ("border-bottom-color", S), ("border-left-color", S),
  ("border-radius", S | H),
  ("border-top-left-radius", S), ("border-top-right-radius", S),
  ("border-bottom-right-radius", S), ("border-bottom-left-radius", S),
  ("border-collapse", S), ("border-spacing", S),
  ("background", S | H),
  ("background-color", S), ("background-image", S), ("background-position", S),
  ("background-repeat", S), ("background-attachment", S), ("background-clip", S),
  ("background-origin", S), ("background-size", S),
  ("font", S | H),
  ("font-family", S), ("font-size", S), ("font-style", S), ("font-variant", S), ("font-weight", S),
  ("line-height", S),
  ("outline", S | H),
  ("outline-color", S), ("outline-style", S), ("outline-width", S),
  ("list-style", S | H),
  ("list-style-type", S), ("list-style-position", S), ("list-style-image", S),
  ("text-align", S), ("text-decoration", S), ("text-indent", S), ("text-transform", S),
  ("text-shadow", S), ("text-overflow", S),
  ("direction", S), ("unicode-bidi", S),
  ("float", S), ("clear", S),
  ("display", S), ("position", S),
  ("top", S), ("right", S), ("bottom", S), ("left", S),
  ("width", S), ("height", S),
  ("min-width", S), ("min-height", S), ("max-width", S), ("max-height", S),
  ("overflow", S), ("overflow-x", S), ("overflow-y", S),
  ("z-index", S), ("color", S), ("cursor", S), ("visibility", S),
  ("white-space", S), ("vertical-align", S),
  ("letter-spacing", S), ("word-spacing", S), ("word-wrap", S), ("word-break", S),
  ("opacity", S), ("content", S), ("quotes", S),
  ("counter-reset", S), ("counter-increment", S),
  ("table-layout", S), ("caption-side", S), ("empty-cells", S),
  ("page-break-before", S), ("page-break-after", S), ("page-break-inside", S),
  ("box-sizing", S), ("box-shadow", S), ("clip", S),
  ("transition", S | H),
  ("transition-property", S), ("transition-duration", S),
  ("transition-timing-function", S), ("transition-delay", S),
  ("transform", S), ("transform-origin", S),
  ("animation", S | H),
  ("animation-name", S), ("animation-duration", S), ("animation-timing-function", S),
  ("animation-delay", S), ("animation-iteration-count", S), ("animation-direction", S),
  ("animation-fill-mode", S), ("animation-play-state", S),
  ("flex", S | H),
  ("flex-grow", S), ("flex-shrink", S), ("flex-basis", S),
  ("flex-flow", S | H),
  ("flex-direction", S), ("flex-wrap", S),
  ("justify-content", S), ("align-items", S), ("align-self", S), ("align-content", S),
  ("order", S),
  ("filter", S), ("pointer-events", S), ("resize", S),
  // @font-face descriptor, accepted wherever declarations are.
  ("src", 0),
];

fn table_entry(name: &str) -> Option<&'static (&'static str, u8)> {
  PROPERTY_TABLE.iter().find(|(n, _)| *n == name)
}

fn is_table_shorthand(name: &str) -> bool {
  table_entry(name).map_or(false, |(_, bits)| bits & H != 0)
}

/// Strips trailing `-segment`s, collecting every known shorthand on the way.
/// Returns the shorthands and the recursion root. `border-<side>-<facet>`
/// forms additionally pick up `border-<facet>`, which is how only those forms
/// end up with three shorthands.
fn compute_shorthands(name: &'static str) -> (Vec<&'static str>, &'static str) {
  let mut shorthands = Vec::new();
  let mut root = name;
  let mut cur = name;
  while let Some(i) = cur.rfind('-') {
    let stripped = &cur[..i];
    if !is_table_shorthand(stripped) {
      break;
    }
    let stripped = table_entry(stripped).unwrap().0;
    shorthands.push(stripped);
    root = stripped;
    cur = stripped;
  }

  let mut segments = name.split('-');
  if let (Some("border"), Some(side), Some(facet), None) =
    (segments.next(), segments.next(), segments.next(), segments.next())
  {
    if matches!(side, "top" | "right" | "bottom" | "left") && matches!(facet, "width" | "style" | "color") {
      if let Some(entry) = table_entry(&format!("border-{}", facet)) {
        shorthands.push(entry.0);
      }
    }
  }

  (shorthands, root)
}

lazy_static! {
  static ref REGISTRY: AHashMap<&'static str, PropertyInfo> = {
    let mut map = AHashMap::with_capacity(PROPERTY_TABLE.len());
    for &(name, bits) in PROPERTY_TABLE {
      let (shorthands, partition) = compute_shorthands(name);
      map.insert(
        name,
        PropertyInfo {
          name,
          flags: PropertyFlags::from_bits_truncate(bits),
          shorthands,
          partition,
        },
      );
    }
    map
  };
}

/// Metadata for an exact (already lowercased, unprefixed) property name.
pub fn lookup(name: &str) -> Option<&'static PropertyInfo> {
  REGISTRY.get(name)
}

/// Metadata for a property name that may carry a vendor prefix.
pub fn lookup_prefixed(name: &str) -> Option<(VendorPrefix, &'static PropertyInfo)> {
  let (prefix, base) = VendorPrefix::strip(name);
  lookup(base).map(|info| (prefix, info))
}

/// Whether a property name is recognized: in the registry (with or without a
/// vendor prefix) or a custom property.
pub fn is_recognized(name: &str) -> bool {
  name.starts_with("--") || lookup_prefixed(name).is_some()
}

/// The partition of a property name. Unrecognized names partition alone.
pub fn partition(name: &str) -> &str {
  match lookup_prefixed(name) {
    Some((_, info)) => info.partition,
    None => name,
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn longhands_find_their_shorthand() {
    let info = lookup("padding-left").unwrap();
    assert_eq!(info.shorthands, vec!["padding"]);
    assert_eq!(info.partition, "padding");
    assert!(!info.is_shorthand());
    assert!(info.is_standard());
  }

  #[test]
  fn border_side_facets_have_three_shorthands() {
    let info = lookup("border-left-width").unwrap();
    assert_eq!(info.shorthands, vec!["border-left", "border", "border-width"]);
    assert_eq!(info.partition, "border");

    // All facets of all sides partition together.
    for side in ["top", "right", "bottom", "left"] {
      for facet in ["width", "style", "color"] {
        assert_eq!(partition(&format!("border-{}-{}", side, facet)), "border");
      }
    }
  }

  #[test]
  fn only_border_side_facets_have_three() {
    for &(name, _) in PROPERTY_TABLE {
      let info = lookup(name).unwrap();
      assert!(
        info.shorthands.len() <= 1 || name.starts_with("border-"),
        "{} has {} shorthands",
        name,
        info.shorthands.len()
      );
    }
  }

  #[test]
  fn partition_terminates_at_its_own_root() {
    // Following the first shorthand repeatedly must reach the partition.
    for &(name, _) in PROPERTY_TABLE {
      let info = lookup(name).unwrap();
      let mut cur = info;
      loop {
        match cur.shorthands.first() {
          Some(&sh) => cur = lookup(sh).unwrap(),
          None => break,
        }
      }
      assert_eq!(cur.name, info.partition, "partition of {}", name);
    }
  }

  #[test]
  fn shorthands_partition_as_themselves() {
    assert_eq!(partition("margin"), "margin");
    assert_eq!(partition("background"), "background");
  }

  #[test]
  fn unrecognized_properties_partition_alone() {
    assert_eq!(partition("frobnicate"), "frobnicate");
    assert!(!is_recognized("frobnicate"));
    assert!(is_recognized("--custom-thing"));
  }

  #[test]
  fn vendor_prefixes_resolve_to_the_base_property() {
    let (prefix, info) = lookup_prefixed("-moz-border-radius").unwrap();
    assert_eq!(prefix, VendorPrefix::Moz);
    assert_eq!(info.name, "border-radius");
    assert!(is_recognized("-webkit-box-shadow"));
  }

  #[test]
  fn positional_values_flag() {
    assert!(lookup("padding").unwrap().has_positional_values());
    assert!(lookup("border-width").unwrap().has_positional_values());
    assert!(!lookup("background").unwrap().has_positional_values());
  }
}
