//! The output writer.

use crate::error::PrinterError;
use crate::location::SourceLocation;
#[cfg(feature = "sourcemap")]
use parcel_sourcemap::{OriginalLocation, SourceMap};

pub(crate) struct Printer<'a, W> {
  dest: &'a mut W,
  #[cfg(feature = "sourcemap")]
  source_map: Option<&'a mut SourceMap>,
  indent: u8,
  line: u32,
  col: u32,
  pub minify: bool,
  pub preserve_comments: bool,
  pub preserve_important_comments: bool,
}

impl<'a, W: std::fmt::Write + Sized> Printer<'a, W> {
  pub fn new(dest: &'a mut W, minify: bool) -> Printer<'a, W> {
    Printer {
      dest,
      #[cfg(feature = "sourcemap")]
      source_map: None,
      indent: 0,
      line: 0,
      col: 0,
      minify,
      preserve_comments: false,
      preserve_important_comments: true,
    }
  }

  #[cfg(feature = "sourcemap")]
  pub fn with_source_map(mut self, source_map: Option<&'a mut SourceMap>) -> Printer<'a, W> {
    self.source_map = source_map;
    self
  }

  pub fn write_str(&mut self, s: &str) -> Result<(), PrinterError> {
    self.col += s.len() as u32;
    self.dest.write_str(s)?;
    Ok(())
  }

  pub fn write_char(&mut self, c: char) -> Result<(), PrinterError> {
    if c == '\n' {
      self.line += 1;
      self.col = 0;
    } else {
      self.col += 1;
    }
    self.dest.write_char(c)?;
    Ok(())
  }

  pub fn whitespace(&mut self) -> Result<(), PrinterError> {
    if self.minify {
      return Ok(());
    }
    self.write_char(' ')
  }

  pub fn delim(&mut self, delim: char, ws_before: bool) -> Result<(), PrinterError> {
    if ws_before {
      self.whitespace()?;
    }
    self.write_char(delim)?;
    self.whitespace()
  }

  pub fn newline(&mut self) -> Result<(), PrinterError> {
    if self.minify {
      return Ok(());
    }
    self.write_char('\n')?;
    if self.indent > 0 {
      self.write_str(&" ".repeat(self.indent as usize))?;
    }
    Ok(())
  }

  pub fn indent(&mut self) {
    self.indent += 2;
  }

  pub fn dedent(&mut self) {
    self.indent -= 2;
  }

  #[allow(unused_variables)]
  pub fn add_mapping(&mut self, loc: &SourceLocation) {
    #[cfg(feature = "sourcemap")]
    if let Some(map) = &mut self.source_map {
      if !loc.is_unknown() {
        map.add_mapping(
          self.line,
          self.col,
          Some(OriginalLocation {
            original_line: loc.begin.line - 1,
            original_column: loc.begin.column - 1,
            source: loc.source.0,
            name: None,
          }),
        )
      }
    }
  }
}

impl<'a, W: std::fmt::Write + Sized> std::fmt::Write for Printer<'a, W> {
  fn write_str(&mut self, s: &str) -> std::fmt::Result {
    self.col += s.len() as u32;
    self.dest.write_str(s)
  }
}
