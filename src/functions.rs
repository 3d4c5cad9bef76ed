//! Built-in GSS function implementations and the custom-function registry.
//!
//! Arithmetic is unit-aware: `add(3px, 180px, 3px)` folds to `186px`, and
//! mixing `px` with `em` is an error. Color functions fold to hex colors.
//! The registry is a process-wide read-only table initialized once; custom
//! functions not present in it are left unevaluated for the lint pass to
//! judge.

use ahash::AHashMap;
use itertools::Itertools;
use lazy_static::lazy_static;

/// A fully evaluated argument, as the evaluation pass extracts it from the
/// tree.
#[derive(Debug, Clone, PartialEq)]
pub enum ArgValue {
  Number { value: f64, unit: String },
  Color(String),
  Str(String),
  Ident(String),
}

impl std::fmt::Display for ArgValue {
  fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
    match self {
      ArgValue::Number { value, unit } => write!(f, "{}{}", value, unit),
      ArgValue::Color(hex) => write!(f, "#{}", hex),
      ArgValue::Str(s) => write!(f, "{}", s),
      ArgValue::Ident(s) => write!(f, "{}", s),
    }
  }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FunctionError {
  WrongArity { name: &'static str, expected: &'static str, got: usize },
  NonNumeric { name: &'static str },
  MismatchedUnits { name: &'static str, left: String, right: String },
  DivideByZero,
  InvalidArgument { name: &'static str, detail: String },
}

impl FunctionError {
  pub fn message(&self) -> String {
    match self {
      FunctionError::WrongArity { name, expected, got } => {
        format!("\"{}\" expects {} arguments, got {}", name, expected, got)
      }
      FunctionError::NonNumeric { name } => format!("\"{}\" requires numeric arguments", name),
      FunctionError::MismatchedUnits { name, left, right } => {
        format!("\"{}\" cannot combine values with units \"{}\" and \"{}\"", name, left, right)
      }
      FunctionError::DivideByZero => "Division by zero".into(),
      FunctionError::InvalidArgument { name, detail } => format!("Invalid argument to \"{}\": {}", name, detail),
    }
  }
}

fn numeric_args<'a>(name: &'static str, args: &'a [ArgValue]) -> Result<Vec<(f64, &'a str)>, FunctionError> {
  args
    .iter()
    .map(|arg| match arg {
      ArgValue::Number { value, unit } => Ok((*value, unit.as_str())),
      _ => Err(FunctionError::NonNumeric { name }),
    })
    .collect()
}

/// Combines the units of a numeric argument list: unitless values adopt the
/// common unit, and two distinct non-empty units are an error.
fn common_unit(name: &'static str, args: &[(f64, &str)]) -> Result<String, FunctionError> {
  let mut unit = "";
  for (_, u) in args {
    if u.is_empty() {
      continue;
    }
    if unit.is_empty() {
      unit = u;
    } else if !unit.eq_ignore_ascii_case(u) {
      return Err(FunctionError::MismatchedUnits {
        name,
        left: unit.into(),
        right: (*u).into(),
      });
    }
  }
  Ok(unit.to_string())
}

pub fn add(args: &[ArgValue]) -> Result<ArgValue, FunctionError> {
  fold_sum("add", args, |acc, v| acc + v)
}

pub fn sub(args: &[ArgValue]) -> Result<ArgValue, FunctionError> {
  fold_sum("sub", args, |acc, v| acc - v)
}

fn fold_sum(name: &'static str, args: &[ArgValue], op: impl Fn(f64, f64) -> f64) -> Result<ArgValue, FunctionError> {
  if args.is_empty() {
    return Err(FunctionError::WrongArity { name, expected: "at least 1", got: 0 });
  }
  let numbers = numeric_args(name, args)?;
  let unit = common_unit(name, &numbers)?;
  let mut value = numbers[0].0;
  for &(v, _) in &numbers[1..] {
    value = op(value, v);
  }
  Ok(ArgValue::Number { value, unit })
}

/// `mult` and `divide` take a measure first and bare scalars after it.
fn fold_scale(name: &'static str, args: &[ArgValue], divide: bool) -> Result<ArgValue, FunctionError> {
  if args.len() < 2 {
    return Err(FunctionError::WrongArity { name, expected: "at least 2", got: args.len() });
  }
  let numbers = numeric_args(name, args)?;
  let (mut value, unit) = (numbers[0].0, numbers[0].1.to_string());
  for &(scalar, scalar_unit) in &numbers[1..] {
    if !scalar_unit.is_empty() {
      return Err(FunctionError::InvalidArgument {
        name,
        detail: format!("scale factors must be unitless, got \"{}{}\"", scalar, scalar_unit),
      });
    }
    if divide {
      if scalar == 0.0 {
        return Err(FunctionError::DivideByZero);
      }
      value /= scalar;
    } else {
      value *= scalar;
    }
  }
  Ok(ArgValue::Number { value, unit })
}

pub fn mult(args: &[ArgValue]) -> Result<ArgValue, FunctionError> {
  fold_scale("mult", args, false)
}

pub fn divide(args: &[ArgValue]) -> Result<ArgValue, FunctionError> {
  fold_scale("divide", args, true)
}

pub fn min(args: &[ArgValue]) -> Result<ArgValue, FunctionError> {
  fold_extremum("min", args, |a, b| if b < a { b } else { a })
}

pub fn max(args: &[ArgValue]) -> Result<ArgValue, FunctionError> {
  fold_extremum("max", args, |a, b| if b > a { b } else { a })
}

fn fold_extremum(name: &'static str, args: &[ArgValue], pick: impl Fn(f64, f64) -> f64) -> Result<ArgValue, FunctionError> {
  if args.is_empty() {
    return Err(FunctionError::WrongArity { name, expected: "at least 1", got: 0 });
  }
  let numbers = numeric_args(name, args)?;
  let unit = common_unit(name, &numbers)?;
  let mut value = numbers[0].0;
  for &(v, _) in &numbers[1..] {
    value = pick(value, v);
  }
  Ok(ArgValue::Number { value, unit })
}

fn channel_byte(name: &'static str, arg: &ArgValue) -> Result<u8, FunctionError> {
  match arg {
    ArgValue::Number { value, unit } if unit.is_empty() => Ok(value.round().clamp(0.0, 255.0) as u8),
    ArgValue::Number { value, unit } if unit == "%" => Ok((value * 255.0 / 100.0).round().clamp(0.0, 255.0) as u8),
    _ => Err(FunctionError::NonNumeric { name }),
  }
}

pub fn rgb(args: &[ArgValue]) -> Result<ArgValue, FunctionError> {
  if args.len() != 3 {
    return Err(FunctionError::WrongArity { name: "rgb", expected: "3", got: args.len() });
  }
  let (r, g, b) = (
    channel_byte("rgb", &args[0])?,
    channel_byte("rgb", &args[1])?,
    channel_byte("rgb", &args[2])?,
  );
  Ok(ArgValue::Color(format!("{:02x}{:02x}{:02x}", r, g, b)))
}

pub fn rgba(args: &[ArgValue]) -> Result<ArgValue, FunctionError> {
  if args.len() != 4 {
    return Err(FunctionError::WrongArity { name: "rgba", expected: "4", got: args.len() });
  }
  let (r, g, b) = (
    channel_byte("rgba", &args[0])?,
    channel_byte("rgba", &args[1])?,
    channel_byte("rgba", &args[2])?,
  );
  let alpha = match &args[3] {
    ArgValue::Number { value, unit } if unit.is_empty() => value.clamp(0.0, 1.0),
    ArgValue::Number { value, unit } if unit == "%" => (value / 100.0).clamp(0.0, 1.0),
    _ => return Err(FunctionError::NonNumeric { name: "rgba" }),
  };
  if (alpha - 1.0).abs() < f64::EPSILON {
    return Ok(ArgValue::Color(format!("{:02x}{:02x}{:02x}", r, g, b)));
  }
  let a = (alpha * 255.0).round() as u8;
  Ok(ArgValue::Color(format!("{:02x}{:02x}{:02x}{:02x}", r, g, b, a)))
}

pub fn concat(args: &[ArgValue]) -> Result<ArgValue, FunctionError> {
  let joined = args
    .iter()
    .map(|arg| match arg {
      ArgValue::Str(s) | ArgValue::Ident(s) => s.clone(),
      other => other.to_string(),
    })
    .join("");
  Ok(ArgValue::Str(joined))
}

/// A registered custom function. Registered once at startup; the registry is
/// never mutated afterwards, so concurrent reads are safe.
pub type CustomFunction = fn(&[ArgValue]) -> Result<ArgValue, FunctionError>;

/// `selectFrom(list, index)` picks the 0-based nth value of a
/// space-separated list.
fn select_from(args: &[ArgValue]) -> Result<ArgValue, FunctionError> {
  if args.len() != 2 {
    return Err(FunctionError::WrongArity { name: "selectFrom", expected: "2", got: args.len() });
  }
  let list = match &args[0] {
    ArgValue::Str(s) | ArgValue::Ident(s) => s,
    _ => {
      return Err(FunctionError::InvalidArgument {
        name: "selectFrom",
        detail: "first argument must be a list".into(),
      })
    }
  };
  let index = match &args[1] {
    ArgValue::Number { value, unit } if unit.is_empty() && value.fract() == 0.0 && *value >= 0.0 => *value as usize,
    _ => {
      return Err(FunctionError::InvalidArgument {
        name: "selectFrom",
        detail: "index must be a non-negative integer".into(),
      })
    }
  };
  match list.split_whitespace().nth(index) {
    Some(item) => Ok(ArgValue::Ident(item.to_string())),
    None => Err(FunctionError::InvalidArgument {
      name: "selectFrom",
      detail: format!("index {} is out of range", index),
    }),
  }
}

lazy_static! {
  static ref REGISTRY: AHashMap<&'static str, CustomFunction> = {
    let mut map: AHashMap<&'static str, CustomFunction> = AHashMap::new();
    map.insert("selectFrom", select_from);
    map
  };
}

/// Looks up a registered custom function by name.
pub fn lookup(name: &str) -> Option<CustomFunction> {
  REGISTRY.get(name).copied()
}
