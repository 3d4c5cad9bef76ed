//! Vendor prefixes.

#![allow(non_upper_case_globals)]

use bitflags::bitflags;

bitflags! {
  /// Bit flags that represent one or more vendor prefixes, such as
  /// `-webkit` or `-moz`. Multiple flags can be combined to represent
  /// more than one prefix without extra allocation.
  #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
  pub struct VendorPrefix: u8 {
    /// No vendor prefix.
    const None   = 0b00000001;
    /// The `-webkit` vendor prefix.
    const WebKit = 0b00000010;
    /// The `-moz` vendor prefix.
    const Moz    = 0b00000100;
    /// The `-ms` vendor prefix.
    const Ms     = 0b00001000;
    /// The `-o` vendor prefix.
    const O      = 0b00010000;
    /// The `-khtml` vendor prefix.
    const Khtml  = 0b00100000;
  }
}

impl Default for VendorPrefix {
  fn default() -> VendorPrefix {
    VendorPrefix::None
  }
}

impl VendorPrefix {
  /// Returns a vendor prefix flag from a prefix string (without the dashes).
  pub fn from_prefix_name(s: &str) -> Option<VendorPrefix> {
    match s {
      "webkit" => Some(VendorPrefix::WebKit),
      "moz" => Some(VendorPrefix::Moz),
      "ms" => Some(VendorPrefix::Ms),
      "o" => Some(VendorPrefix::O),
      "khtml" => Some(VendorPrefix::Khtml),
      _ => None,
    }
  }

  /// Extracts the prefix of a property or at-rule name, e.g.
  /// `-webkit-keyframes` yields `(WebKit, "keyframes")`.
  pub fn strip(name: &str) -> (VendorPrefix, &str) {
    if let Some(rest) = name.strip_prefix('-') {
      if let Some(dash) = rest.find('-') {
        if let Some(prefix) = VendorPrefix::from_prefix_name(&rest[..dash]) {
          return (prefix, &rest[dash + 1..]);
        }
      }
    }
    (VendorPrefix::None, name)
  }

  /// The serialized form, including both dashes; empty for `None`.
  pub fn as_str(&self) -> &'static str {
    match *self {
      VendorPrefix::WebKit => "-webkit-",
      VendorPrefix::Moz => "-moz-",
      VendorPrefix::Ms => "-ms-",
      VendorPrefix::O => "-o-",
      VendorPrefix::Khtml => "-khtml-",
      _ => "",
    }
  }

  /// Returns VendorPrefix::None if empty.
  #[inline]
  pub fn or_none(self) -> Self {
    if self.is_empty() {
      VendorPrefix::None
    } else {
      self
    }
  }
}
