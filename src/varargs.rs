//! Pythonic call-argument bundles and signature validation.
//!
//! Filters, tests, macros and globals all receive a [`VarArgs`]: the
//! evaluated positional arguments plus keyword arguments. `expect`
//! validates the bundle against a declared signature and returns a reduced
//! bundle where extra positionals have been re-assigned to keyword slots
//! and missing keywords filled from defaults.

use indexmap::IndexMap;

use crate::value::Value;

/// A declared keyword parameter with its default.
#[derive(Debug, Clone)]
pub struct KwArg {
    pub name: String,
    pub default: Value,
}

impl KwArg {
    pub fn new(name: impl Into<String>, default: Value) -> Self {
        KwArg {
            name: name.into(),
            default,
        }
    }
}

/// Shorthand constructor used by the built-in filters.
pub fn kwarg(name: &str, default: impl Into<Value>) -> KwArg {
    KwArg::new(name, default.into())
}

#[derive(Debug, Clone, Default)]
pub struct VarArgs {
    pub args: Vec<Value>,
    pub kwargs: IndexMap<String, Value>,
}

impl VarArgs {
    pub fn new() -> Self {
        VarArgs::default()
    }

    /// The first positional argument, or nil.
    pub fn first(&self) -> Value {
        self.args.first().cloned().unwrap_or_else(Value::none)
    }

    /// A keyword argument with a fallback.
    pub fn get_kwarg(&self, key: &str, fallback: Value) -> Value {
        self.kwargs.get(key).cloned().unwrap_or(fallback)
    }

    /// Validates against an expected signature.
    ///
    /// Rules, in order: missing positionals fail; extra positionals are
    /// re-assigned to the first unused keyword slots, anything left over is
    /// unexpected; a keyword supplied both positionally and by name has
    /// been submitted twice; unknown keywords are unexpected. Unused
    /// keyword slots fill from their defaults.
    pub fn expect(&self, args: usize, kwargs: &[KwArg]) -> Result<VarArgs, String> {
        let mut reduced = VarArgs {
            args: self.args.clone(),
            kwargs: IndexMap::new(),
        };
        let mut reduce_idx: Option<usize> = None;
        let mut unexpected_args: Vec<String> = Vec::new();

        if self.args.len() < args {
            if args > 1 {
                return Err(format!(
                    "Expected {} arguments, got {}",
                    args,
                    self.args.len()
                ));
            }
            return Err(format!("Expected an argument, got {}", self.args.len()));
        } else if self.args.len() > args {
            reduced.args = self.args[..args].to_vec();
            for (idx, arg) in self.args[args..].iter().enumerate() {
                if let Some(kw) = kwargs.get(idx) {
                    reduced.kwargs.insert(kw.name.clone(), arg.clone());
                    reduce_idx = Some(idx + 1);
                } else {
                    unexpected_args.push(arg.to_string());
                }
            }
        }

        let mut unexpected_kwargs: Vec<String> = Vec::new();
        for (key, value) in &self.kwargs {
            match kwargs.iter().position(|kw| &kw.name == key) {
                Some(idx) => {
                    if reduce_idx.map_or(true, |r| idx >= r) {
                        reduced.kwargs.insert(key.clone(), value.clone());
                    } else {
                        return Err(format!("Keyword '{}' has been submitted twice", key));
                    }
                }
                None => unexpected_kwargs.push(format!("{}={}", key, value)),
            }
        }
        unexpected_kwargs.sort();

        match (unexpected_args.len(), unexpected_kwargs.len()) {
            (0, 0) => {}
            (1, 0) => return Err(format!("Unexpected argument '{}'", unexpected_args[0])),
            (_, 0) => {
                return Err(format!(
                    "Unexpected arguments '{}'",
                    unexpected_args.join(", ")
                ))
            }
            (0, 1) => {
                return Err(format!(
                    "Unexpected keyword argument '{}'",
                    unexpected_kwargs[0]
                ))
            }
            (0, _) => {
                return Err(format!(
                    "Unexpected keyword arguments '{}'",
                    unexpected_kwargs.join(", ")
                ))
            }
            _ => {
                return Err(format!(
                    "Unexpected arguments '{}, {}'",
                    unexpected_args.join(", "),
                    unexpected_kwargs.join(", ")
                ))
            }
        }

        for kw in kwargs {
            if !reduced.kwargs.contains_key(&kw.name) {
                reduced.kwargs.insert(kw.name.clone(), kw.default.clone());
            }
        }
        Ok(reduced)
    }

    /// Ensures only `n` positional arguments were given.
    pub fn expect_args(&self, n: usize) -> Result<VarArgs, String> {
        self.expect(n, &[])
    }

    /// Ensures no arguments at all were given.
    pub fn expect_nothing(&self) -> Result<VarArgs, String> {
        self.expect_args(0)
    }

    /// Ensures only the given keyword arguments were given.
    pub fn expect_kwargs(&self, kwargs: &[KwArg]) -> Result<VarArgs, String> {
        self.expect(0, kwargs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(values: &[i64]) -> VarArgs {
        VarArgs {
            args: values.iter().map(|v| Value::from(*v)).collect(),
            kwargs: IndexMap::new(),
        }
    }

    #[test]
    fn test_missing_positional() {
        let va = args(&[1]);
        let err = va.expect(2, &[]).unwrap_err();
        assert_eq!(err, "Expected 2 arguments, got 1");
        let va = args(&[]);
        let err = va.expect(1, &[]).unwrap_err();
        assert_eq!(err, "Expected an argument, got 0");
    }

    #[test]
    fn test_extra_positionals_fill_kwarg_slots() {
        let va = args(&[1, 2]);
        let reduced = va
            .expect(1, &[KwArg::new("width", Value::from(0i64))])
            .unwrap();
        assert_eq!(reduced.args.len(), 1);
        assert_eq!(reduced.kwargs["width"].as_integer(), 2);
    }

    #[test]
    fn test_leftover_positionals_unexpected() {
        let va = args(&[1, 2, 3]);
        let err = va
            .expect(1, &[KwArg::new("width", Value::from(0i64))])
            .unwrap_err();
        assert_eq!(err, "Unexpected argument '3'");
    }

    #[test]
    fn test_keyword_submitted_twice() {
        let mut va = args(&[1, 2]);
        va.kwargs.insert("width".to_string(), Value::from(9i64));
        let err = va
            .expect(1, &[KwArg::new("width", Value::from(0i64))])
            .unwrap_err();
        assert_eq!(err, "Keyword 'width' has been submitted twice");
    }

    #[test]
    fn test_unknown_keyword() {
        let mut va = args(&[]);
        va.kwargs.insert("nope".to_string(), Value::from("x"));
        let err = va.expect(0, &[]).unwrap_err();
        assert_eq!(err, "Unexpected keyword argument 'nope=x'");
    }

    #[test]
    fn test_defaults_fill() {
        let va = args(&[]);
        let reduced = va
            .expect(0, &[KwArg::new("sep", Value::from(","))])
            .unwrap();
        assert_eq!(reduced.kwargs["sep"].to_string(), ",");
    }

    #[test]
    fn test_expect_nothing() {
        assert!(args(&[]).expect_nothing().is_ok());
        assert!(args(&[1]).expect_nothing().is_err());
    }
}
