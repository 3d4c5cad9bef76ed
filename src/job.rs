//! The job description: everything a compilation is configured with.

use crate::diagnostics::ErrorManager;
use crate::location::{SourceFile, SourceLocation};
use crate::parser::ParseOptions;
use crate::renaming::format::OutputRenamingMapFormat;
use crate::renaming::{
  DebugSubstitutionMap, MinimalSubstitutionMap, PrefixingSubstitutionMap, RecordingSubstitutionMap, RenamingMap,
  SplittingSubstitutionMap, SubstitutionMap,
};
use crate::vendor_prefix::VendorPrefix;
use ahash::AHashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
  /// Expanded output with comments, for inspecting the compiled tree.
  Debug,
  Compressed,
  Pretty,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
  Ltr,
  Rtl,
  NoChange,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptimizeLevel {
  None,
  Safe,
  Maximum,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Vendor {
  Webkit,
  Mozilla,
  Opera,
  Microsoft,
  Konqueror,
}

impl Vendor {
  pub fn prefix(&self) -> VendorPrefix {
    match self {
      Vendor::Webkit => VendorPrefix::WebKit,
      Vendor::Mozilla => VendorPrefix::Moz,
      Vendor::Opera => VendorPrefix::O,
      Vendor::Microsoft => VendorPrefix::Ms,
      Vendor::Konqueror => VendorPrefix::Khtml,
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenamingType {
  None,
  /// Appends `_` to each class, keeping output readable.
  Debug,
  /// Hyphen-wise minimal renaming.
  Closure,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceMapLevel {
  All,
  Default,
}

/// An immutable description of one compilation.
pub struct JobDescription {
  pub inputs: Vec<SourceFile>,
  pub output_format: OutputFormat,
  pub input_orientation: Orientation,
  pub output_orientation: Orientation,
  pub optimize: OptimizeLevel,
  /// Boolean constants that evaluate to true in `@if` conditions; unlisted
  /// names default to false.
  pub true_condition_names: Vec<String>,
  /// Named integers consulted when replacing constant references.
  pub compile_constants: AHashMap<String, i32>,
  /// Unknown at-rules that pass through without a diagnostic.
  pub allowed_at_rules: Vec<String>,
  pub allowed_non_standard_functions: Vec<String>,
  pub allow_unrecognized_functions: bool,
  pub allowed_unrecognized_properties: Vec<String>,
  pub allow_unrecognized_properties: bool,
  pub allow_def_propagation: bool,
  pub allow_undefined_constants: bool,
  pub allow_moz_document: bool,
  pub allow_keyframes: bool,
  pub allow_webkit_keyframes: bool,
  pub allow_duplicate_declarations: bool,
  /// When set, declarations carrying a different vendor's prefix are
  /// dropped.
  pub vendor: Option<Vendor>,
  pub renaming: RenamingType,
  pub css_renaming_prefix: String,
  pub excluded_classes_from_renaming: Vec<String>,
  /// A prior compilation's renaming, pre-seeding the recording map.
  pub renaming_seed: Option<RenamingMap>,
  pub output_renaming_map_format: OutputRenamingMapFormat,
  pub preserve_comments: bool,
  pub preserve_important_comments: bool,
  pub use_internal_bidi_flipper: bool,
  pub swap_ltr_rtl_in_url: bool,
  pub swap_left_right_in_url: bool,
  pub create_source_map: bool,
  pub source_map_level: SourceMapLevel,
}

impl Default for JobDescription {
  fn default() -> JobDescription {
    JobDescription {
      inputs: Vec::new(),
      output_format: OutputFormat::Compressed,
      input_orientation: Orientation::Ltr,
      output_orientation: Orientation::Ltr,
      optimize: OptimizeLevel::Safe,
      true_condition_names: Vec::new(),
      compile_constants: AHashMap::new(),
      allowed_at_rules: Vec::new(),
      allowed_non_standard_functions: Vec::new(),
      allow_unrecognized_functions: false,
      allowed_unrecognized_properties: Vec::new(),
      allow_unrecognized_properties: false,
      allow_def_propagation: true,
      allow_undefined_constants: false,
      allow_moz_document: false,
      allow_keyframes: true,
      allow_webkit_keyframes: true,
      allow_duplicate_declarations: false,
      vendor: None,
      renaming: RenamingType::None,
      css_renaming_prefix: String::new(),
      excluded_classes_from_renaming: Vec::new(),
      renaming_seed: None,
      output_renaming_map_format: OutputRenamingMapFormat::Json,
      preserve_comments: false,
      preserve_important_comments: true,
      use_internal_bidi_flipper: true,
      swap_ltr_rtl_in_url: false,
      swap_left_right_in_url: false,
      create_source_map: false,
      source_map_level: SourceMapLevel::Default,
    }
  }
}

impl JobDescription {
  /// The RTL-flip pass runs when the orientations differ and neither side
  /// opted out.
  pub fn needs_flip(&self) -> bool {
    self.input_orientation != self.output_orientation
      && self.input_orientation != Orientation::NoChange
      && self.output_orientation != Orientation::NoChange
  }

  /// Configuration-time validation; findings are warnings.
  pub fn validate(&self, errors: &mut ErrorManager) {
    if (self.swap_ltr_rtl_in_url || self.swap_left_right_in_url) && !self.use_internal_bidi_flipper {
      errors.report_warning(
        "swap_ltr_rtl_in_url/swap_left_right_in_url have no effect without use_internal_bidi_flipper",
        SourceLocation::unknown(),
      );
    }
    if !self.css_renaming_prefix.is_empty() && self.renaming == RenamingType::None {
      errors.report_warning(
        "css_renaming_prefix has no effect without a renaming type",
        SourceLocation::unknown(),
      );
    }
  }

  pub fn parse_options(&self) -> ParseOptions {
    ParseOptions {
      allow_keyframes: self.allow_keyframes,
      allow_webkit_keyframes: self.allow_webkit_keyframes,
      allow_moz_document: self.allow_moz_document,
      allowed_at_rules: self.allowed_at_rules.clone(),
      error_recovery: true,
    }
  }

  /// The substitution map chain for this job, or None when renaming is off.
  pub fn substitution_map(&self) -> Option<RecordingSubstitutionMap> {
    let base: Box<dyn SubstitutionMap> = match self.renaming {
      RenamingType::None => return None,
      RenamingType::Debug => Box::new(DebugSubstitutionMap),
      RenamingType::Closure => Box::new(SplittingSubstitutionMap::new(MinimalSubstitutionMap::new())),
    };
    let base: Box<dyn SubstitutionMap> = if self.css_renaming_prefix.is_empty() {
      base
    } else {
      Box::new(PrefixingSubstitutionMap::new(self.css_renaming_prefix.clone(), BoxedMap(base)))
    };
    Some(match self.renaming_seed.clone() {
      Some(seed) => RecordingSubstitutionMap::with_initial(base, seed),
      None => RecordingSubstitutionMap::new(base),
    })
  }
}

/// Adapter letting a boxed map feed a generic wrapper.
struct BoxedMap(Box<dyn SubstitutionMap>);

impl SubstitutionMap for BoxedMap {
  fn get(&mut self, key: &str) -> String {
    self.0.get(key)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn flip_requires_differing_known_orientations() {
    let mut job = JobDescription::default();
    assert!(!job.needs_flip());
    job.output_orientation = Orientation::Rtl;
    assert!(job.needs_flip());
    job.input_orientation = Orientation::NoChange;
    assert!(!job.needs_flip());
  }

  #[test]
  fn url_swap_without_flipper_warns() {
    let mut errors = ErrorManager::new();
    let job = JobDescription {
      swap_ltr_rtl_in_url: true,
      use_internal_bidi_flipper: false,
      ..JobDescription::default()
    };
    job.validate(&mut errors);
    assert_eq!(errors.warnings().count(), 1);
    assert!(!errors.has_errors());
  }

  #[test]
  fn closure_renaming_builds_a_recording_splitting_chain() {
    let job = JobDescription {
      renaming: RenamingType::Closure,
      ..JobDescription::default()
    };
    let mut map = job.substitution_map().unwrap();
    assert_eq!(map.get("dialog-content"), "a-b");
    assert_eq!(map.mappings().get("dialog-content").unwrap(), "a-b");
  }

  #[test]
  fn renaming_prefix_applies_to_whole_names() {
    let job = JobDescription {
      renaming: RenamingType::Closure,
      css_renaming_prefix: "x-".into(),
      ..JobDescription::default()
    };
    let mut map = job.substitution_map().unwrap();
    assert_eq!(map.get("dialog"), "x-a");
  }
}
