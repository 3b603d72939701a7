use std::fmt;
use std::num::ParseFloatError;

/// Represents a partial computation that can be captured as part of an
/// error message.
#[derive(Debug, Clone, PartialEq)]
pub enum PartialComp {
    Unary { op: String, arg: String },
    Binary { op: String, lhs: String, rhs: String },
}

impl PartialComp {
    pub fn unary<T, U>(op: T, arg: U) -> Self
    where
        T: ToString,
        U: ToString,
    {
        PartialComp::Unary { op: op.to_string(), arg: arg.to_string() }
    }

    pub fn binary<T, U, V>(op: T, lhs: U, rhs: V) -> Self
    where
        T: ToString,
        U: ToString,
        V: ToString,
    {
        PartialComp::Binary {
            op: op.to_string(),
            lhs: lhs.to_string(),
            rhs: rhs.to_string(),
        }
    }
}

impl fmt::Display for PartialComp {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            PartialComp::Unary { ref op, ref arg } => write!(f, "{} {}", op, arg),
            PartialComp::Binary { ref op, ref lhs, ref rhs } => {
                write!(f, "{} {} {}", lhs, op, rhs)
            }
        }
    }
}

/// Everything that can go wrong between receiving raw keypad text and
/// producing a number. Never leaves [`crate::evaluate`]; callers only see
/// the [`ErrorKind`] it classifies as.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CalcError {
    #[error("input is a bare number")]
    BareNumber,
    #[error("attempted to divide by zero")]
    DivideByZero,
    #[error("expression '{0}' is outside the function's domain")]
    DomainError(PartialComp),
    #[error("invalid number: {0}")]
    InvalidNumber(String),
    #[error("unrecognized token: {0}")]
    UnrecognizedToken(String),
    #[error("expected {1} token, got {0} instead")]
    UnexpectedToken(String, &'static str),
    #[error("unknown variable or function '{0}'")]
    UnknownAtom(String),
    #[error("unexpected end of input")]
    UnexpectedEndOfInput,
    #[error("unmatched parenthesis")]
    UnmatchedParenthesis,
    #[error("no function argument")]
    NoFunctionArgument,
    #[error("result {0} is not a finite number")]
    NotFinite(f64),
    #[error("no previous answer to refer to")]
    MissingAnswer,
    #[error("expression is too long or too repetitive")]
    TooComplex,
    #[error("expression nests deeper than {0} levels")]
    NestingTooDeep(usize),
}

impl CalcError {
    /// Classifies an internal failure into the kind shown to the user.
    pub fn kind(&self) -> ErrorKind {
        use CalcError::*;
        match *self {
            BareNumber => ErrorKind::InvalidInput,
            InvalidNumber(_)
            | UnrecognizedToken(_)
            | UnexpectedToken(..)
            | UnknownAtom(_)
            | UnexpectedEndOfInput
            | NoFunctionArgument => ErrorKind::SyntaxError,
            DivideByZero | DomainError(_) | NotFinite(_) | MissingAnswer => ErrorKind::MathError,
            UnmatchedParenthesis => ErrorKind::UnmatchedParentheses,
            TooComplex | NestingTooDeep(_) => ErrorKind::TooComplex,
        }
    }
}

impl From<ParseFloatError> for CalcError {
    fn from(data: ParseFloatError) -> CalcError {
        CalcError::InvalidNumber(data.to_string())
    }
}

/// The user-facing reason an evaluation failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Nothing to calculate, e.g. `=` pressed on a naked number.
    InvalidInput,
    SyntaxError,
    /// Division by zero, domain errors and other non-finite results.
    MathError,
    /// More closing parentheses than opening ones.
    UnmatchedParentheses,
    /// Input too long, too repetitive or nested too deeply.
    TooComplex,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let reason = match *self {
            ErrorKind::InvalidInput => "Invalid Input",
            ErrorKind::SyntaxError => "Syntax Error",
            ErrorKind::MathError => "Math Error",
            ErrorKind::UnmatchedParentheses => "Unmatched Parentheses",
            ErrorKind::TooComplex => "Too Complex",
        };
        f.write_str(reason)
    }
}
