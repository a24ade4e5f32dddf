//! Predicate evaluation boundary for conditional handlers.
//!
//! The engine treats the predicate sub-language as an external collaborator:
//! conditionals hand an expression string and the (already dereferenced)
//! argument values to a [`PredicateEvaluator`] and only care about the
//! boolean outcome. [`DefaultEvaluator`] implements a deliberately small
//! language; richer evaluators plug in through the trait.

use regex::Regex;
use thiserror::Error;

use crate::value::Value;

/// Predicate evaluation failure; recoverable, reported by the caller.
#[derive(Debug, Error)]
pub enum EvalError {
    #[error("cannot parse predicate '{0}'")]
    Parse(String),

    #[error("unknown variable '{0}' in predicate")]
    UnknownVariable(String),

    #[error("invalid pattern: {0}")]
    Pattern(#[from] regex::Error),
}

/// Evaluates predicate expressions against named argument values.
///
/// Purely functional from the engine's point of view: same expression and
/// arguments, same answer.
pub trait PredicateEvaluator {
    /// Evaluate `expr` against `args`.
    fn eval(&self, expr: &str, args: &[(String, Value)]) -> Result<bool, EvalError>;
}

/// Built-in predicate language.
///
/// Supported forms:
/// - `exists VAR` / `missing VAR`
/// - `VAR = 'literal'` / `VAR != 'literal'`
/// - `VAR ~ 'regex'`
///
/// Values are compared through their text rendering; single quotes around
/// literals are optional.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultEvaluator;

impl DefaultEvaluator {
    fn lookup<'a>(args: &'a [(String, Value)], name: &str) -> Result<&'a Value, EvalError> {
        args.iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
            .ok_or_else(|| EvalError::UnknownVariable(name.to_string()))
    }

    fn strip_quotes(literal: &str) -> &str {
        let trimmed = literal.trim();
        trimmed
            .strip_prefix('\'')
            .and_then(|s| s.strip_suffix('\''))
            .unwrap_or(trimmed)
    }
}

impl PredicateEvaluator for DefaultEvaluator {
    fn eval(&self, expr: &str, args: &[(String, Value)]) -> Result<bool, EvalError> {
        let expr = expr.trim();

        if let Some(name) = expr.strip_prefix("exists ") {
            let value = Self::lookup(args, name.trim())?;
            return Ok(!value.is_null());
        }
        if let Some(name) = expr.strip_prefix("missing ") {
            let value = Self::lookup(args, name.trim())?;
            return Ok(value.is_null());
        }

        // Binary forms: take the leftmost operator so characters inside the
        // literal cannot hijack the split. "!=" naturally wins over the "="
        // it contains because it starts one position earlier.
        let mut leftmost: Option<(usize, &str)> = None;
        for op in ["!=", "=", "~"] {
            if let Some(index) = expr.find(op) {
                if leftmost.is_none_or(|(best, _)| index < best) {
                    leftmost = Some((index, op));
                }
            }
        }

        if let Some((index, op)) = leftmost {
            let name = expr[..index].trim();
            let literal = Self::strip_quotes(&expr[index + op.len()..]);
            if !name.is_empty() {
                let text = Self::lookup(args, name)?.as_text();
                return match op {
                    "~" => {
                        let re = Regex::new(literal)?;
                        Ok(re.is_match(&text))
                    }
                    "!=" => Ok(text != literal),
                    _ => Ok(text == literal),
                };
            }
        }

        Err(EvalError::Parse(expr.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args() -> Vec<(String, Value)> {
        vec![
            ("kind".to_string(), Value::Str("chapter".into())),
            ("n".to_string(), Value::Int(3)),
            ("nothing".to_string(), Value::Null),
        ]
    }

    #[test]
    fn test_equality() {
        let eval = DefaultEvaluator;
        assert!(eval.eval("kind = 'chapter'", &args()).unwrap());
        assert!(!eval.eval("kind = 'section'", &args()).unwrap());
        assert!(eval.eval("n = '3'", &args()).unwrap());
    }

    #[test]
    fn test_inequality() {
        let eval = DefaultEvaluator;
        assert!(eval.eval("kind != 'section'", &args()).unwrap());
        assert!(!eval.eval("kind != 'chapter'", &args()).unwrap());
    }

    #[test]
    fn test_exists_and_missing() {
        let eval = DefaultEvaluator;
        assert!(eval.eval("exists kind", &args()).unwrap());
        assert!(!eval.eval("exists nothing", &args()).unwrap());
        assert!(eval.eval("missing nothing", &args()).unwrap());
    }

    #[test]
    fn test_regex_match() {
        let eval = DefaultEvaluator;
        assert!(eval.eval("kind ~ '^chap'", &args()).unwrap());
        assert!(!eval.eval("kind ~ '^sec'", &args()).unwrap());
        assert!(eval.eval("kind ~ '('", &args()).is_err());
    }

    #[test]
    fn test_unknown_variable() {
        let eval = DefaultEvaluator;
        assert!(matches!(
            eval.eval("ghost = 'x'", &args()),
            Err(EvalError::UnknownVariable(_))
        ));
    }

    #[test]
    fn test_unparsable() {
        let eval = DefaultEvaluator;
        assert!(matches!(
            eval.eval("what is this", &args()),
            Err(EvalError::Parse(_))
        ));
    }
}
