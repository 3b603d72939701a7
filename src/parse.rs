use std::f64::consts;

use crate::error::{CalcError, PartialComp};
use crate::eval::AngleMode;
use crate::token::*;

/// Deepest nesting of groups, signs and function applications accepted
/// before evaluation gives up.
pub const MAX_DEPTH: usize = 256;

#[derive(Clone, Debug)]
pub struct IntermediateResult {
    pub value: f64,
    tokens_read: usize,
}

impl IntermediateResult {
    pub fn new(value: f64, tokens_read: usize) -> Self {
        IntermediateResult { value, tokens_read }
    }
}

/// Represents an environment for evaluating a mathematical expression
pub trait Environment {
    /// Look up the arity of an atom:
    /// - Variables have an implicit arity of zero
    /// - This library currently does not support varadic functions
    /// - If a symbol is not defined, return None
    fn arity(&self, atom: &str) -> Option<usize>;

    /// Resolve an atom given the name of the atom and some number of
    /// arguments
    /// Precondition: `args.len() == self.arity(atom)`
    fn resolve(
        &mut self,
        atom: &str,
        args: &[IntermediateResult],
    ) -> Result<f64, CalcError>;
}

fn check_depth(depth: usize) -> Result<(), CalcError> {
    if depth > MAX_DEPTH {
        Err(CalcError::NestingTooDeep(MAX_DEPTH))
    } else {
        Ok(())
    }
}

// Addition and subtraction
fn e_expr<E>(
    token_list: &[Token],
    env: &mut E,
    depth: usize,
) -> Result<IntermediateResult, CalcError>
where
    E: Environment,
{
    let mut t1 = t_expr(token_list, env, depth)?;
    let mut index = t1.tokens_read;

    while index < token_list.len() {
        match token_list[index] {
            Token::Plus => {
                let t2 = t_expr(&token_list[index + 1..], env, depth)?;
                t1.value += t2.value;
                t1.tokens_read += t2.tokens_read + 1;
            }
            Token::Minus => {
                let t2 = t_expr(&token_list[index + 1..], env, depth)?;
                t1.value -= t2.value;
                t1.tokens_read += t2.tokens_read + 1;
            }
            _ => break,
        };
        index = t1.tokens_read;
    }
    Ok(t1)
}

// Multiplication, division and multiplication by adjacency
fn t_expr<E>(
    token_list: &[Token],
    env: &mut E,
    depth: usize,
) -> Result<IntermediateResult, CalcError>
where
    E: Environment,
{
    let mut f1 = s_expr(token_list, env, depth)?;
    let mut index = f1.tokens_read;

    while index < token_list.len() {
        match token_list[index] {
            Token::Multiply => {
                let f2 = s_expr(&token_list[index + 1..], env, depth)?;
                f1.value *= f2.value;
                f1.tokens_read += f2.tokens_read + 1;
            }
            Token::Divide => {
                let f2 = s_expr(&token_list[index + 1..], env, depth)?;
                if f2.value == 0.0 {
                    return Err(CalcError::DivideByZero);
                }
                f1.value /= f2.value;
                f1.tokens_read += f2.tokens_read + 1;
            }
            // `2(3+4)`, `5cos(5)`, `2pi`, `(1)(2)`
            Token::OpenParen | Token::Atom(_) => {
                let f2 = f_expr(&token_list[index..], env, depth)?;
                f1.value *= f2.value;
                f1.tokens_read += f2.tokens_read;
            }
            // `(1+2)3`
            Token::Number(_) if token_list[index - 1] == Token::CloseParen => {
                let f2 = f_expr(&token_list[index..], env, depth)?;
                f1.value *= f2.value;
                f1.tokens_read += f2.tokens_read;
            }
            Token::Number(n) => {
                return Err(CalcError::UnexpectedToken(n.to_string(), "operator"));
            }
            _ => break,
        }
        index = f1.tokens_read;
    }
    Ok(f1)
}

// Unary signs
fn s_expr<E>(
    token_list: &[Token],
    env: &mut E,
    depth: usize,
) -> Result<IntermediateResult, CalcError>
where
    E: Environment,
{
    check_depth(depth)?;
    match token_list.first() {
        Some(Token::Minus) => {
            let mut ir = s_expr(&token_list[1..], env, depth + 1)?;
            ir.value = -ir.value;
            ir.tokens_read += 1;
            Ok(ir)
        }
        Some(Token::Plus) => {
            let mut ir = s_expr(&token_list[1..], env, depth + 1)?;
            ir.tokens_read += 1;
            Ok(ir)
        }
        _ => f_expr(token_list, env, depth),
    }
}

// Exponentiation, right associative
fn f_expr<E>(
    token_list: &[Token],
    env: &mut E,
    depth: usize,
) -> Result<IntermediateResult, CalcError>
where
    E: Environment,
{
    let mut g1 = g_expr(token_list, env, depth)?;
    if let Some(Token::Power) = token_list.get(g1.tokens_read) {
        let exp = s_expr(&token_list[g1.tokens_read + 1..], env, depth + 1)?;
        let value = g1.value.powf(exp.value);
        if value.is_nan() && !g1.value.is_nan() && !exp.value.is_nan() {
            return Err(CalcError::DomainError(PartialComp::binary("^", g1.value, exp.value)));
        }
        g1.value = value;
        g1.tokens_read += exp.tokens_read + 1;
    }
    Ok(g1)
}

// Numbers, parenthesized expressions, and atoms
fn g_expr<E>(
    token_list: &[Token],
    env: &mut E,
    depth: usize,
) -> Result<IntermediateResult, CalcError>
where
    E: Environment,
{
    check_depth(depth)?;
    match token_list.first() {
        Some(&Token::Number(n)) => Ok(IntermediateResult::new(n, 1)),
        Some(Token::Atom(s)) => apply_atom(s, token_list, env, depth),
        Some(Token::OpenParen) => {
            let ir = e_expr(&token_list[1..], env, depth + 1)?;
            let close_paren = ir.tokens_read + 1;
            match token_list.get(close_paren) {
                Some(Token::CloseParen) => {
                    Ok(IntermediateResult::new(ir.value, close_paren + 1))
                }
                Some(other) => Err(CalcError::UnexpectedToken(other.to_string(), ")")),
                None => Err(CalcError::UnmatchedParenthesis),
            }
        }
        Some(other) => Err(CalcError::UnexpectedToken(other.to_string(), "number")),
        None => Err(CalcError::UnexpectedEndOfInput),
    }
}

// A function name applies to the operand directly after it: a group, a
// number, a constant, another function application, or a signed one of
// those. `cos 5` is `cos(5)` and `tan cos 5` is `tan(cos(5))`.
fn apply_atom<E>(
    atom: &str,
    token_list: &[Token],
    env: &mut E,
    depth: usize,
) -> Result<IntermediateResult, CalcError>
where
    E: Environment,
{
    let nargs = env
        .arity(atom)
        .ok_or_else(|| CalcError::UnknownAtom(atom.to_owned()))?;
    let mut args = Vec::with_capacity(nargs);
    let mut start = 1;
    for _ in 0..nargs {
        let ir = arg_expr(&token_list[start..], env, depth + 1)?;
        start += ir.tokens_read;
        args.push(ir);
    }
    let value = env.resolve(atom, &args)?;
    Ok(IntermediateResult::new(value, start))
}

fn arg_expr<E>(
    token_list: &[Token],
    env: &mut E,
    depth: usize,
) -> Result<IntermediateResult, CalcError>
where
    E: Environment,
{
    check_depth(depth)?;
    match token_list.first() {
        Some(Token::Minus) => {
            let mut ir = arg_expr(&token_list[1..], env, depth + 1)?;
            ir.value = -ir.value;
            ir.tokens_read += 1;
            Ok(ir)
        }
        Some(Token::Plus) => {
            let mut ir = arg_expr(&token_list[1..], env, depth + 1)?;
            ir.tokens_read += 1;
            Ok(ir)
        }
        Some(Token::OpenParen) | Some(Token::Number(_)) | Some(Token::Atom(_)) => {
            g_expr(token_list, env, depth)
        }
        _ => Err(CalcError::NoFunctionArgument),
    }
}

/// The calculator's vocabulary: constants, the previous answer and the
/// keypad's functions, with trigonometry honoring the angle mode.
#[derive(Debug, Clone, Copy)]
pub struct CalculatorEnvironment {
    angle_mode: AngleMode,
    answer: Option<f64>,
}

impl CalculatorEnvironment {
    pub fn new(angle_mode: AngleMode, answer: Option<f64>) -> Self {
        CalculatorEnvironment { angle_mode, answer }
    }

    fn radians(&self, angle: f64) -> f64 {
        match self.angle_mode {
            AngleMode::Radians => angle,
            AngleMode::Degrees => angle.to_radians(),
        }
    }
}

/// Fails when a function produced NaN from a number, i.e. the argument
/// is outside its domain.
fn checked(op: &str, arg: f64, value: f64) -> Result<f64, CalcError> {
    if value.is_nan() && !arg.is_nan() {
        Err(CalcError::DomainError(PartialComp::unary(op, arg)))
    } else {
        Ok(value)
    }
}

impl Environment for CalculatorEnvironment {
    fn arity(&self, atom: &str) -> Option<usize> {
        match atom {
            "pi" | "e" | "ans" => Some(0),
            "sin" | "cos" | "tan" | "log" | "ln" | "sqrt" => Some(1),
            _ => None,
        }
    }

    fn resolve(
        &mut self,
        atom: &str,
        args: &[IntermediateResult],
    ) -> Result<f64, CalcError> {
        match atom {
            "pi" => Ok(consts::PI),
            "e" => Ok(consts::E),
            "ans" => self.answer.ok_or(CalcError::MissingAnswer),
            "sin" => checked(atom, args[0].value, self.radians(args[0].value).sin()),
            "cos" => checked(atom, args[0].value, self.radians(args[0].value).cos()),
            "tan" => checked(atom, args[0].value, self.radians(args[0].value).tan()),
            "log" => checked(atom, args[0].value, args[0].value.log10()),
            "ln" => checked(atom, args[0].value, args[0].value.ln()),
            "sqrt" => checked(atom, args[0].value, args[0].value.sqrt()),
            _ => Err(CalcError::UnknownAtom(atom.to_owned())),
        }
    }
}

/// Evaluates a balanced token list. Every token must be consumed.
pub fn parse<E>(tokens: &[Token], env: &mut E) -> Result<f64, CalcError>
where
    E: Environment,
{
    let answer = e_expr(tokens, env, 0)?;
    match tokens.get(answer.tokens_read) {
        None => Ok(answer.value),
        Some(extra) => Err(CalcError::UnexpectedToken(extra.to_string(), "end of input")),
    }
}
