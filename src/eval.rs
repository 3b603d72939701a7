//! The calculator's `=` key: raw keypad text in, display string out.

use std::fmt;

use tracing::debug;

use crate::error::{CalcError, ErrorKind};
use crate::normalize;
use crate::parse::{self, CalculatorEnvironment};
use crate::token;

/// Decimal places kept when formatting a result.
pub const PRECISION: usize = 6;

/// How `sin`, `cos` and `tan` read their argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AngleMode {
    Radians,
    Degrees,
}

impl AngleMode {
    pub fn toggle(self) -> Self {
        match self {
            AngleMode::Radians => AngleMode::Degrees,
            AngleMode::Degrees => AngleMode::Radians,
        }
    }
}

impl Default for AngleMode {
    fn default() -> Self {
        AngleMode::Radians
    }
}

impl fmt::Display for AngleMode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            AngleMode::Radians => f.write_str("RAD"),
            AngleMode::Degrees => f.write_str("DEG"),
        }
    }
}

/// Either a formatted value or the reason there is none.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Success(String),
    Failure(ErrorKind),
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success(_))
    }

    pub fn value(&self) -> Option<&str> {
        match self {
            Outcome::Success(value) => Some(value),
            Outcome::Failure(_) => None,
        }
    }

    pub fn error(&self) -> Option<ErrorKind> {
        match *self {
            Outcome::Success(_) => None,
            Outcome::Failure(kind) => Some(kind),
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Outcome::Success(value) => f.write_str(value),
            Outcome::Failure(kind) => write!(f, "Error: {}", kind),
        }
    }
}

impl From<Result<f64, CalcError>> for Outcome {
    fn from(result: Result<f64, CalcError>) -> Self {
        match result {
            Ok(value) => Outcome::Success(format_result(value)),
            Err(err) => Outcome::Failure(err.kind()),
        }
    }
}

/// Evaluates what the user typed. Never fails past this point: every
/// problem is reported as an [`Outcome::Failure`].
///
/// `prior_answer` is what `ans` refers to inside the expression.
pub fn evaluate(raw: &str, angle_mode: AngleMode, prior_answer: Option<f64>) -> Outcome {
    evaluate_value(raw, angle_mode, prior_answer).into()
}

/// Like [`evaluate`] but keeps the full-precision value and the detailed
/// failure, for callers that chain answers.
pub fn evaluate_value(
    raw: &str,
    angle_mode: AngleMode,
    prior_answer: Option<f64>,
) -> Result<f64, CalcError> {
    let result = run(raw, angle_mode, prior_answer);
    match &result {
        Ok(value) => debug!(raw, %angle_mode, value, "evaluated"),
        Err(err) => debug!(raw, %angle_mode, error = %err, kind = %err.kind(), "evaluation failed"),
    }
    result
}

fn run(raw: &str, angle_mode: AngleMode, prior_answer: Option<f64>) -> Result<f64, CalcError> {
    if normalize::is_bare_number(raw) {
        return Err(CalcError::BareNumber);
    }
    let normalized = normalize::substitute_glyphs(raw);
    normalize::check_complexity(&normalized)?;
    normalize::check_closing_parens(&normalized)?;

    let mut tokens = token::tokenize(&normalized)?;
    let appended = token::balance_parens(&mut tokens)?;
    if appended > 0 {
        debug!(appended, "closed open parentheses");
    }

    let mut env = CalculatorEnvironment::new(angle_mode, prior_answer);
    let value = parse::parse(&tokens, &mut env)?;
    if value.is_finite() {
        Ok(value)
    } else {
        Err(CalcError::NotFinite(value))
    }
}

/// Rounds to [`PRECISION`] places and drops trailing zeros and a
/// trailing decimal point.
pub fn format_result(value: f64) -> String {
    let fixed = format!("{:.*}", PRECISION, value);
    let trimmed = fixed.trim_end_matches('0').trim_end_matches('.');
    if trimmed == "-0" {
        "0".to_owned()
    } else {
        trimmed.to_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formatting() {
        let cases = vec![
            (14.0, "14"),
            (0.5, "0.5"),
            (0.49999999999999994, "0.5"),
            (1.0 / 3.0, "0.333333"),
            (-0.988031624092862, "-0.988032"),
            (-0.0000001, "0"),
            (100.0, "100"),
            (1234567.125, "1234567.125"),
        ];
        for (value, expected) in cases {
            assert_eq!(format_result(value), expected);
        }
    }

    #[test]
    fn basics() {
        let cases = vec![
            ("  1 +   1", "2"),
            (" 4 × 7 − 14", "14"),
            ("((4 × 18) − 17) ÷ 5", "11"),
            ("2^10", "1024"),
            ("√(16) + π − π", "4"),
            ("cos π + sin (2π × (3 ÷ 4))", "-2"),
            ("1/(4)", "0.25"),
        ];
        for (input, expected) in cases {
            assert_eq!(
                evaluate(input, AngleMode::Radians, None),
                Outcome::Success(expected.into()),
                "{}",
                input
            );
        }
    }

    #[test]
    fn display_strings() {
        assert_eq!(evaluate("2+2", AngleMode::Radians, None).to_string(), "4");
        assert_eq!(
            evaluate("2+*2", AngleMode::Radians, None).to_string(),
            "Error: Syntax Error"
        );
        assert_eq!(evaluate("7", AngleMode::Radians, None).to_string(), "Error: Invalid Input");
        assert_eq!(evaluate("ln 0", AngleMode::Radians, None).to_string(), "Error: Math Error");
    }

    #[test]
    fn full_precision_answer() {
        let third = evaluate_value("1/3", AngleMode::Radians, None).unwrap();
        assert_eq!(
            evaluate("ans × 3", AngleMode::Radians, Some(third)),
            Outcome::Success("1".into())
        );
    }

    #[test]
    fn angle_mode_toggle() {
        assert_eq!(AngleMode::default(), AngleMode::Radians);
        assert_eq!(AngleMode::Radians.toggle(), AngleMode::Degrees);
        assert_eq!(AngleMode::Degrees.toggle().to_string(), "RAD");
    }
}
