//! The compilation driver.
//!
//! Parses every input as one logical unit, runs the pass pipeline in
//! canonical order (stopping at the first pass that reports an error), and
//! serializes the result.

use crate::diagnostics::ErrorManager;
use crate::job::{JobDescription, OutputFormat};
use crate::location::SourceSet;
use crate::output;
use crate::parser::builder::TreeBuilder;
use crate::parser::parse_source;
use crate::passes::{self, PassContext};
use crate::printer::Printer;
use crate::tree::Tree;

#[derive(Debug)]
pub struct CompileResult {
  pub css: String,
  /// The recorded renaming, serialized in the job's map format.
  pub renaming_map: Option<String>,
  #[cfg(feature = "sourcemap")]
  pub source_map: Option<String>,
  /// Formatted warnings, in location order.
  pub warnings: Vec<String>,
}

#[derive(Debug)]
pub struct CompileFailure {
  /// Formatted diagnostics, in location order.
  pub diagnostics: Vec<String>,
  pub error_count: usize,
  pub warning_count: usize,
}

impl std::fmt::Display for CompileFailure {
  fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
    for diagnostic in &self.diagnostics {
      writeln!(f, "{}", diagnostic)?;
    }
    write!(f, "{} error(s), {} warning(s)", self.error_count, self.warning_count)
  }
}

pub struct Compiler {
  job: JobDescription,
}

impl Compiler {
  pub fn new(job: JobDescription) -> Compiler {
    Compiler { job }
  }

  pub fn compile(&self) -> Result<CompileResult, CompileFailure> {
    let mut sources = SourceSet::new();
    let mut tree = Tree::new();
    let mut errors = ErrorManager::new();
    self.job.validate(&mut errors);

    let parse_options = self.job.parse_options();
    {
      let mut builder = TreeBuilder::new(&mut tree);
      for file in &self.job.inputs {
        let id = sources.add(file.clone());
        if let Some(contents) = &file.contents {
          parse_source(id, contents, &parse_options, &mut builder, &mut errors);
        }
      }
      builder.finish();
    }

    let mut substitution_map = self.job.substitution_map();
    if !errors.has_errors() {
      for mut pass in passes::pipeline(&self.job) {
        {
          let mut cx = PassContext {
            tree: &mut tree,
            job: &self.job,
            errors: &mut errors,
            substitution_map: substitution_map.as_mut(),
          };
          pass.run(&mut cx);
        }
        if errors.has_errors() {
          break;
        }
      }
    }

    if errors.has_errors() {
      return Err(failure(&sources, &errors));
    }

    let minify = self.job.output_format == OutputFormat::Compressed;
    let preserve_comments = self.job.preserve_comments || self.job.output_format == OutputFormat::Debug;

    #[cfg(feature = "sourcemap")]
    let mut source_map = if self.job.create_source_map {
      let mut map = parcel_sourcemap::SourceMap::new("/");
      for (_, file) in sources.iter() {
        map.add_source(file.name.as_deref().unwrap_or("<input>"));
      }
      Some(map)
    } else {
      None
    };

    let mut css = String::new();
    {
      let mut printer = Printer::new(&mut css, minify);
      printer.preserve_comments = preserve_comments;
      printer.preserve_important_comments = self.job.preserve_important_comments;
      #[cfg(feature = "sourcemap")]
      let mut printer = printer.with_source_map(source_map.as_mut());
      output::write_root(&tree, &mut printer).expect("writing CSS to a string cannot fail");
    }

    let renaming_map = substitution_map.map(|map| {
      self
        .job
        .output_renaming_map_format
        .write(&map.into_renaming_map())
    });

    #[cfg(feature = "sourcemap")]
    let source_map = source_map.and_then(|mut map| map.to_json(None).ok());

    Ok(CompileResult {
      css,
      renaming_map,
      #[cfg(feature = "sourcemap")]
      source_map,
      warnings: errors.warnings().map(|d| d.format(&sources)).collect(),
    })
  }
}

fn failure(sources: &SourceSet, errors: &ErrorManager) -> CompileFailure {
  CompileFailure {
    diagnostics: errors.all().iter().map(|d| d.format(sources)).collect(),
    error_count: errors.errors().count(),
    warning_count: errors.warnings().count(),
  }
}

/// Compiles a job in one call.
pub fn compile(job: JobDescription) -> Result<CompileResult, CompileFailure> {
  Compiler::new(job).compile()
}

/// Serializes a tree as-is, without running any pass. GSS constructs still
/// in the tree print in source form.
pub fn serialize_tree(tree: &Tree, format: OutputFormat) -> String {
  let mut out = String::new();
  let mut printer = Printer::new(&mut out, format == OutputFormat::Compressed);
  printer.preserve_comments = format == OutputFormat::Debug;
  output::write_root(tree, &mut printer).expect("writing CSS to a string cannot fail");
  out
}

#[cfg(test)]
pub(crate) mod test_util {
  use super::*;
  use crate::location::SourceFile;
  use crate::parser::ParseOptions;

  /// Parses one source into a tree, for pass-level tests.
  pub fn parse_tree(source: &str) -> (Tree, ErrorManager) {
    let mut tree = Tree::new();
    let mut errors = ErrorManager::new();
    let mut sources = SourceSet::new();
    let id = sources.add(SourceFile::new("test.gss", source));
    {
      let mut builder = TreeBuilder::new(&mut tree);
      parse_source(id, source, &ParseOptions::default(), &mut builder, &mut errors);
      builder.finish();
    }
    (tree, errors)
  }

  pub fn pretty(tree: &Tree) -> String {
    let mut out = String::new();
    let mut printer = Printer::new(&mut out, false);
    output::write_root(tree, &mut printer).unwrap();
    out
  }

  pub fn compressed(tree: &Tree) -> String {
    let mut out = String::new();
    let mut printer = Printer::new(&mut out, true);
    output::write_root(tree, &mut printer).unwrap();
    out
  }
}
