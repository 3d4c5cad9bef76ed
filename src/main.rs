//! `gssc`: the GSS compiler command line.

use clap::Parser;
use gss::compiler::Compiler;
use gss::job::{JobDescription, Orientation, OptimizeLevel, OutputFormat, RenamingType, Vendor};
use gss::location::SourceFile;
use gss::renaming::format::OutputRenamingMapFormat;
use std::path::PathBuf;

#[derive(Parser)]
#[clap(name = "gssc", version, about = "Compiles GSS (extended CSS) into standard CSS")]
struct Args {
  /// Input files, compiled in order as one unit.
  #[clap(required = true)]
  inputs: Vec<PathBuf>,

  /// Write the CSS here instead of stdout.
  #[clap(short = 'o', long)]
  output: Option<PathBuf>,

  /// One of: compressed, pretty, debug.
  #[clap(long, default_value = "compressed")]
  output_format: String,

  /// One of: ltr, rtl, nochange.
  #[clap(long, default_value = "ltr")]
  input_orientation: String,

  /// One of: ltr, rtl, nochange.
  #[clap(long, default_value = "ltr")]
  output_orientation: String,

  /// One of: none, safe, maximum.
  #[clap(long, default_value = "safe")]
  optimize: String,

  /// A condition name that evaluates to true in @if blocks. Repeatable.
  #[clap(long = "true-condition")]
  true_conditions: Vec<String>,

  /// A NAME=INTEGER compile-time constant. Repeatable.
  #[clap(long = "define")]
  defines: Vec<String>,

  /// An unknown at-rule to pass through without a diagnostic. Repeatable.
  #[clap(long = "allowed-at-rule")]
  allowed_at_rules: Vec<String>,

  /// A non-standard function to accept. Repeatable.
  #[clap(long = "allowed-non-standard-function")]
  allowed_non_standard_functions: Vec<String>,

  #[clap(long)]
  allow_unrecognized_functions: bool,

  /// An unrecognized property to accept. Repeatable.
  #[clap(long = "allowed-unrecognized-property")]
  allowed_unrecognized_properties: Vec<String>,

  #[clap(long)]
  allow_unrecognized_properties: bool,

  #[clap(long)]
  allow_undefined_constants: bool,

  #[clap(long)]
  allow_duplicate_declarations: bool,

  #[clap(long)]
  allow_moz_document: bool,

  #[clap(long)]
  disallow_keyframes: bool,

  #[clap(long)]
  disallow_webkit_keyframes: bool,

  /// Keep only this vendor's prefixed declarations. One of: webkit,
  /// mozilla, opera, microsoft, konqueror.
  #[clap(long)]
  vendor: Option<String>,

  /// One of: none, debug, closure.
  #[clap(long, default_value = "none")]
  rename: String,

  #[clap(long, default_value = "")]
  css_renaming_prefix: String,

  /// A class excluded from renaming. Repeatable.
  #[clap(long = "excluded-class")]
  excluded_classes: Vec<String>,

  /// One of: closure-compiled, closure-compiled-by-whole,
  /// closure-compiled-split-hyphens, closure-uncompiled, json, properties,
  /// jscomp-variable-map.
  #[clap(long, default_value = "json")]
  output_renaming_map_format: String,

  /// Write the renaming map here.
  #[clap(long)]
  output_renaming_map: Option<PathBuf>,

  /// Seed the renaming from a prior compilation's map (read in the output
  /// map format).
  #[clap(long)]
  input_renaming_map: Option<PathBuf>,

  #[clap(long)]
  preserve_comments: bool,

  /// Write a source map here.
  #[cfg(feature = "sourcemap")]
  #[clap(long)]
  source_map: Option<PathBuf>,
}

fn exit_with(code: i32) -> ! {
  std::process::exit(code)
}

fn main() {
  match run() {
    Ok(()) => exit_with(0),
    Err(message) => {
      if atty::is(atty::Stream::Stderr) {
        eprintln!("\x1b[31m{}\x1b[0m", message);
      } else {
        eprintln!("{}", message);
      }
      exit_with(1)
    }
  }
}

fn run() -> Result<(), String> {
  let args = Args::parse();
  let job = build_job(&args)?;
  let result = Compiler::new(job).compile().map_err(|failure| failure.to_string())?;

  for warning in &result.warnings {
    eprintln!("{}", warning);
  }

  match &args.output {
    Some(path) => std::fs::write(path, &result.css).map_err(|e| format!("cannot write {}: {}", path.display(), e))?,
    None => print!("{}", result.css),
  }

  if let (Some(path), Some(map)) = (&args.output_renaming_map, &result.renaming_map) {
    std::fs::write(path, map).map_err(|e| format!("cannot write {}: {}", path.display(), e))?;
  }

  #[cfg(feature = "sourcemap")]
  if let (Some(path), Some(map)) = (&args.source_map, &result.source_map) {
    std::fs::write(path, map).map_err(|e| format!("cannot write {}: {}", path.display(), e))?;
  }

  Ok(())
}

fn build_job(args: &Args) -> Result<JobDescription, String> {
  let mut inputs = Vec::with_capacity(args.inputs.len());
  for path in &args.inputs {
    let contents = std::fs::read_to_string(path).map_err(|e| format!("cannot read {}: {}", path.display(), e))?;
    inputs.push(SourceFile::new(path.display().to_string(), contents));
  }

  let output_format = match args.output_format.as_str() {
    "compressed" => OutputFormat::Compressed,
    "pretty" => OutputFormat::Pretty,
    "debug" => OutputFormat::Debug,
    other => return Err(format!("unknown output format \"{}\"", other)),
  };
  let optimize = match args.optimize.as_str() {
    "none" => OptimizeLevel::None,
    "safe" => OptimizeLevel::Safe,
    "maximum" => OptimizeLevel::Maximum,
    other => return Err(format!("unknown optimize level \"{}\"", other)),
  };
  let rename = match args.rename.as_str() {
    "none" => RenamingType::None,
    "debug" => RenamingType::Debug,
    "closure" => RenamingType::Closure,
    other => return Err(format!("unknown renaming type \"{}\"", other)),
  };
  let vendor = match args.vendor.as_deref() {
    None => None,
    Some("webkit") => Some(Vendor::Webkit),
    Some("mozilla") => Some(Vendor::Mozilla),
    Some("opera") => Some(Vendor::Opera),
    Some("microsoft") => Some(Vendor::Microsoft),
    Some("konqueror") => Some(Vendor::Konqueror),
    Some(other) => return Err(format!("unknown vendor \"{}\"", other)),
  };
  let output_renaming_map_format = OutputRenamingMapFormat::from_name(&args.output_renaming_map_format)
    .ok_or_else(|| format!("unknown renaming map format \"{}\"", args.output_renaming_map_format))?;

  let mut compile_constants = ahash::AHashMap::new();
  for define in &args.defines {
    let (name, value) = define
      .split_once('=')
      .ok_or_else(|| format!("--define expects NAME=INTEGER, got \"{}\"", define))?;
    let value: i32 = value
      .parse()
      .map_err(|_| format!("--define expects an integer value, got \"{}\"", define))?;
    compile_constants.insert(name.to_string(), value);
  }

  let renaming_seed = match &args.input_renaming_map {
    None => None,
    Some(path) => {
      let text = std::fs::read_to_string(path).map_err(|e| format!("cannot read {}: {}", path.display(), e))?;
      Some(
        output_renaming_map_format
          .read(&text)
          .map_err(|e| format!("{}: {}", path.display(), e))?,
      )
    }
  };

  Ok(JobDescription {
    inputs,
    output_format,
    input_orientation: parse_orientation(&args.input_orientation)?,
    output_orientation: parse_orientation(&args.output_orientation)?,
    optimize,
    true_condition_names: args.true_conditions.clone(),
    compile_constants,
    allowed_at_rules: args.allowed_at_rules.clone(),
    allowed_non_standard_functions: args.allowed_non_standard_functions.clone(),
    allow_unrecognized_functions: args.allow_unrecognized_functions,
    allowed_unrecognized_properties: args.allowed_unrecognized_properties.clone(),
    allow_unrecognized_properties: args.allow_unrecognized_properties,
    allow_undefined_constants: args.allow_undefined_constants,
    allow_moz_document: args.allow_moz_document,
    allow_keyframes: !args.disallow_keyframes,
    allow_webkit_keyframes: !args.disallow_webkit_keyframes,
    allow_duplicate_declarations: args.allow_duplicate_declarations,
    vendor,
    renaming: rename,
    css_renaming_prefix: args.css_renaming_prefix.clone(),
    excluded_classes_from_renaming: args.excluded_classes.clone(),
    renaming_seed,
    output_renaming_map_format,
    preserve_comments: args.preserve_comments,
    #[cfg(feature = "sourcemap")]
    create_source_map: args.source_map.is_some(),
    ..JobDescription::default()
  })
}

fn parse_orientation(value: &str) -> Result<Orientation, String> {
  match value {
    "ltr" => Ok(Orientation::Ltr),
    "rtl" => Ok(Orientation::Rtl),
    "nochange" => Ok(Orientation::NoChange),
    other => Err(format!("unknown orientation \"{}\"", other)),
  }
}
