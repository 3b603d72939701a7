use std::fmt;
use std::iter::Peekable;

use crate::error::CalcError;

/// Every named atom the calculator knows, longest first so that runs of
/// letters typed without separators (`sincos`, `2pi`) split greedily.
pub const ATOMS: &[&str] = &["sqrt", "sin", "cos", "tan", "log", "ans", "ln", "pi", "e"];

/// Tokens used for parsing an arithmetic expression
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Plus,
    Minus,
    Divide,
    Multiply,
    Power,
    OpenParen,
    CloseParen,
    Number(f64),
    Atom(String),
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Token::Plus => write!(f, "Plus"),
            Token::Minus => write!(f, "Minus"),
            Token::Divide => write!(f, "Divide"),
            Token::Multiply => write!(f, "Multiply"),
            Token::Power => write!(f, "Power"),
            Token::OpenParen => write!(f, "OpenParen"),
            Token::CloseParen => write!(f, "CloseParen"),
            Token::Number(ref n) => write!(f, "'{}'", n),
            Token::Atom(ref s) => write!(f, "'{}'", s),
        }
    }
}

enum OperatorState {
    PotentiallyIncomplete,
    Complete,
    NotAnOperator,
}

trait IsOperator {
    fn is_operator(self) -> bool;
}

impl IsOperator for char {
    fn is_operator(self) -> bool {
        matches!(self, '+' | '-' | '/' | '^' | '(' | ')' | '*')
    }
}

trait CheckOperator {
    fn check_operator(self) -> OperatorState;
}

impl CheckOperator for char {
    fn check_operator(self) -> OperatorState {
        match self {
            '+' | '-' | '/' | '^' | '(' | ')' => OperatorState::Complete,
            '*' => OperatorState::PotentiallyIncomplete,
            _ => OperatorState::NotAnOperator,
        }
    }
}

trait OperatorMatch {
    fn operator_type(self) -> Option<Token>;
}

impl OperatorMatch for [char; 2] {
    fn operator_type(self) -> Option<Token> {
        if self == ['*', '*'] {
            Some(Token::Power)
        } else {
            None
        }
    }
}

impl OperatorMatch for char {
    fn operator_type(self) -> Option<Token> {
        match self {
            '+' => Some(Token::Plus),
            '-' => Some(Token::Minus),
            '/' => Some(Token::Divide),
            '*' => Some(Token::Multiply),
            '^' => Some(Token::Power),
            '(' => Some(Token::OpenParen),
            ')' => Some(Token::CloseParen),
            _ => None,
        }
    }
}

/// Splits a normalized expression into tokens.
pub fn tokenize(input: &str) -> Result<Vec<Token>, CalcError> {
    let mut tokens = Vec::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(&c) = chars.peek() {
        if c.is_alphabetic() {
            let word = consume_atom(&mut chars);
            tokens.extend(split_atom(&word)?.into_iter().map(Token::Atom));
        } else if c.is_ascii_digit() || c == '.' {
            tokens.push(consume_number(&mut chars)?);
        } else {
            match c.check_operator() {
                OperatorState::Complete => {
                    chars.next();
                    tokens.push(c.operator_type().ok_or_else(|| invalid_operator(c))?);
                }
                OperatorState::PotentiallyIncomplete => {
                    chars.next();
                    match chars.peek() {
                        Some(&next_char) if next_char.is_operator() => {
                            if let Some(token) = [c, next_char].operator_type() {
                                tokens.push(token);
                                chars.next();
                            } else {
                                tokens.push(c.operator_type().ok_or_else(|| invalid_operator(c))?);
                            }
                        }
                        _ => {
                            tokens.push(c.operator_type().ok_or_else(|| invalid_operator(c))?);
                        }
                    }
                }
                OperatorState::NotAnOperator => {
                    if c.is_whitespace() {
                        chars.next();
                    } else {
                        let token_string = consume_until_new_token(&mut chars);
                        return Err(CalcError::UnrecognizedToken(token_string));
                    }
                }
            }
        }
    }
    tracing::trace!(count = tokens.len(), "tokenized expression");
    Ok(tokens)
}

/// Closes every parenthesis left open at the end of the expression and
/// returns how many were appended. A closing parenthesis without a
/// matching opener is never corrected.
pub fn balance_parens(tokens: &mut Vec<Token>) -> Result<usize, CalcError> {
    let mut depth = 0usize;
    for token in tokens.iter() {
        match *token {
            Token::OpenParen => depth += 1,
            Token::CloseParen => {
                depth = depth.checked_sub(1).ok_or(CalcError::UnmatchedParenthesis)?;
            }
            _ => (),
        }
    }
    tokens.extend(std::iter::repeat(Token::CloseParen).take(depth));
    Ok(depth)
}

fn invalid_operator(c: char) -> CalcError {
    CalcError::UnrecognizedToken(c.to_string())
}

fn digits<I>(input: &mut Peekable<I>) -> String
where
    I: Iterator<Item = char>,
{
    let mut number = String::new();
    while let Some(&c) = input.peek() {
        if c.is_ascii_digit() {
            number.push(c);
        } else {
            break;
        }
        input.next();
    }
    number
}

fn consume_number<I>(input: &mut Peekable<I>) -> Result<Token, CalcError>
where
    I: Iterator<Item = char>,
{
    let whole = digits(input);
    if let Some(&'.') = input.peek() {
        input.next();
        let frac = digits(input);
        if whole.is_empty() && frac.is_empty() {
            return Err(CalcError::InvalidNumber(".".into()));
        }
        let num: f64 = [whole, ".".into(), frac].concat().parse()?;
        Ok(Token::Number(num))
    } else {
        Ok(Token::Number(whole.parse()?))
    }
}

/// Consume a run of letters. Digits and underscores end the run so that
/// `ans2` reads as `ans` followed by `2`.
fn consume_atom<I: Iterator<Item = char>>(input: &mut Peekable<I>) -> String {
    let mut atom = String::new();
    while let Some(&c) = input.peek() {
        if c.is_alphabetic() {
            atom.push(c);
            input.next();
        } else {
            break;
        }
    }
    atom
}

/// Splits a run of letters into known atoms, longest match first.
fn split_atom(word: &str) -> Result<Vec<String>, CalcError> {
    let mut atoms = Vec::new();
    let mut rest = word;
    while !rest.is_empty() {
        let known = ATOMS
            .iter()
            .find(|atom| rest.starts_with(*atom))
            .ok_or_else(|| CalcError::UnknownAtom(rest.to_owned()))?;
        atoms.push((*known).to_owned());
        rest = &rest[known.len()..];
    }
    Ok(atoms)
}

fn consume_until_new_token<I: Iterator<Item = char>>(input: &mut I) -> String {
    input
        .take_while(|c| !(c.is_whitespace() || c.is_operator() || c.is_ascii_digit()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn atom(s: &str) -> Token {
        Token::Atom(s.into())
    }

    #[test]
    fn normal() {
        let line = "(3 + 7) ** 10 * (7 / 2)";
        let expected = vec![
            Token::OpenParen,
            Token::Number(3.0),
            Token::Plus,
            Token::Number(7.0),
            Token::CloseParen,
            Token::Power,
            Token::Number(10.0),
            Token::Multiply,
            Token::OpenParen,
            Token::Number(7.0),
            Token::Divide,
            Token::Number(2.0),
            Token::CloseParen,
        ];
        assert_eq!(tokenize(line), Ok(expected));
    }

    #[test]
    fn function_chaining() {
        let line = "log 4 / log 2";
        let expected = vec![
            atom("log"),
            Token::Number(4.0),
            Token::Divide,
            atom("log"),
            Token::Number(2.0),
        ];
        assert_eq!(tokenize(line), Ok(expected));
    }

    #[test]
    fn adjacent_atoms_split() {
        assert_eq!(
            tokenize("tancos5"),
            Ok(vec![atom("tan"), atom("cos"), Token::Number(5.0)])
        );
        assert_eq!(
            tokenize("2pisqrtans"),
            Ok(vec![Token::Number(2.0), atom("pi"), atom("sqrt"), atom("ans")])
        );
        assert_eq!(tokenize("sinx"), Err(CalcError::UnknownAtom("x".into())));
    }

    #[test]
    fn decimals() {
        assert_eq!(
            tokenize(".5+2."),
            Ok(vec![Token::Number(0.5), Token::Plus, Token::Number(2.0)])
        );
        assert_eq!(tokenize("1.2.3"), Ok(vec![Token::Number(1.2), Token::Number(0.3)]));
        assert_eq!(tokenize("3+."), Err(CalcError::InvalidNumber(".".into())));
    }

    #[test]
    fn unrecognized() {
        assert_eq!(tokenize("2 $$ 3"), Err(CalcError::UnrecognizedToken("$$".into())));
    }

    #[test]
    fn balancing() {
        let mut tokens = tokenize("((2+3").unwrap();
        assert_eq!(balance_parens(&mut tokens), Ok(2));
        assert_eq!(tokens.iter().filter(|t| **t == Token::CloseParen).count(), 2);

        let mut tokens = tokenize("(2+3))").unwrap();
        assert_eq!(balance_parens(&mut tokens), Err(CalcError::UnmatchedParenthesis));

        let mut tokens = tokenize(")2+3(").unwrap();
        assert_eq!(balance_parens(&mut tokens), Err(CalcError::UnmatchedParenthesis));
    }
}
