//! Keypad input composition.
//!
//! A [`Session`] owns the expression being typed, what the display shows,
//! the angle mode, the previous answer and the history. Keys move it
//! between two states: [`State::Editing`] while an expression is typed and
//! [`State::Evaluated`] while a result is shown.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ErrorKind;
use crate::eval::{self, AngleMode, Outcome};
use crate::history::HistoryStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Add,
    Subtract,
    Multiply,
    Divide,
}

impl Operator {
    pub fn glyph(self) -> char {
        match self {
            Operator::Add => '+',
            Operator::Subtract => '−',
            Operator::Multiply => '×',
            Operator::Divide => '÷',
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Function {
    Sin,
    Cos,
    Tan,
    Log,
    Ln,
    Sqrt,
}

impl Function {
    pub fn label(self) -> &'static str {
        match self {
            Function::Sin => "sin",
            Function::Cos => "cos",
            Function::Tan => "tan",
            Function::Log => "log",
            Function::Ln => "ln",
            Function::Sqrt => "√",
        }
    }
}

/// One key of the calculator keypad.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Digit(u8),
    Point,
    Operator(Operator),
    /// `x^y`
    Power,
    /// `1/x`
    Inverse,
    Function(Function),
    Pi,
    OpenParen,
    CloseParen,
    Clear,
    Delete,
    Equals,
}

impl Key {
    /// Looks a key up by the label printed on it.
    pub fn from_label(label: &str) -> Option<Key> {
        let key = match label {
            "." => Key::Point,
            "+" => Key::Operator(Operator::Add),
            "−" | "-" => Key::Operator(Operator::Subtract),
            "×" | "*" => Key::Operator(Operator::Multiply),
            "÷" | "/" => Key::Operator(Operator::Divide),
            "x^y" | "^" => Key::Power,
            "1/x" => Key::Inverse,
            "sin" => Key::Function(Function::Sin),
            "cos" => Key::Function(Function::Cos),
            "tan" => Key::Function(Function::Tan),
            "log" => Key::Function(Function::Log),
            "ln" => Key::Function(Function::Ln),
            "√" | "sqrt" => Key::Function(Function::Sqrt),
            "π" | "pi" => Key::Pi,
            "(" => Key::OpenParen,
            ")" => Key::CloseParen,
            "C" => Key::Clear,
            "DEL" | "⌫" => Key::Delete,
            "=" => Key::Equals,
            _ => {
                let mut chars = label.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => Key::Digit(c.to_digit(10)? as u8),
                    _ => return None,
                }
            }
        };
        Some(key)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Editing,
    Evaluated,
}

/// The part of a session worth restoring after the app is closed.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub input: String,
    pub result: String,
    pub just_evaluated: bool,
}

#[derive(Debug, Default)]
pub struct Session {
    input: String,
    display: String,
    evaluated: bool,
    angle_mode: AngleMode,
    answer: Option<f64>,
    history: HistoryStore,
}

fn starts_with_binary_operator(line: &str) -> bool {
    matches!(
        line.chars().next(),
        Some('+' | '-' | '−' | '*' | '×' | '/' | '÷' | '^')
    )
}

impl Session {
    pub fn new(angle_mode: AngleMode, history: HistoryStore) -> Self {
        Session { angle_mode, history, ..Session::default() }
    }

    /// Resumes a session saved with [`Session::snapshot`].
    pub fn restore(
        snapshot: SessionSnapshot,
        angle_mode: AngleMode,
        history: HistoryStore,
    ) -> Self {
        let answer = if snapshot.just_evaluated {
            snapshot.result.parse().ok()
        } else {
            None
        };
        Session {
            input: snapshot.input,
            display: snapshot.result,
            evaluated: snapshot.just_evaluated,
            angle_mode,
            answer,
            history,
        }
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            input: self.input.clone(),
            result: self.display.clone(),
            just_evaluated: self.evaluated,
        }
    }

    pub fn state(&self) -> State {
        if self.evaluated {
            State::Evaluated
        } else {
            State::Editing
        }
    }

    /// The expression as typed so far.
    pub fn input(&self) -> &str {
        &self.input
    }

    /// The result or error message on the display, empty if none.
    pub fn display(&self) -> &str {
        &self.display
    }

    pub fn angle_mode(&self) -> AngleMode {
        self.angle_mode
    }

    pub fn set_angle_mode(&mut self, angle_mode: AngleMode) {
        self.angle_mode = angle_mode;
    }

    pub fn toggle_angle_mode(&mut self) -> AngleMode {
        self.angle_mode = self.angle_mode.toggle();
        self.angle_mode
    }

    /// Full-precision value of the last successful evaluation.
    pub fn answer(&self) -> Option<f64> {
        self.answer
    }

    pub fn history(&self) -> &HistoryStore {
        &self.history
    }

    pub fn history_mut(&mut self) -> &mut HistoryStore {
        &mut self.history
    }

    fn start_over(&mut self, input: String) {
        self.input = input;
        self.display.clear();
        self.evaluated = false;
    }

    fn commit(&mut self) {
        if !self.display.is_empty() {
            self.history.record(&self.input, &self.display);
        }
    }

    pub fn press(&mut self, key: Key) {
        debug!(?key, state = ?self.state(), "key pressed");
        match key {
            Key::Equals => {
                self.equals();
            }
            Key::Clear => {
                if self.evaluated {
                    self.commit();
                }
                self.start_over(String::new());
            }
            Key::Delete => {
                let mut input = std::mem::take(&mut self.input);
                input.pop();
                self.start_over(input);
            }
            Key::Inverse => {
                let base = if self.evaluated { self.display.clone() } else { self.input.clone() };
                let input = if base.is_empty() {
                    "1/(".to_owned()
                } else {
                    format!("1/({})", base)
                };
                self.start_over(input);
            }
            Key::Operator(_) | Key::Power if self.evaluated => {
                let input = self.continue_from_result(&key_text(key));
                self.start_over(input);
            }
            _ if self.evaluated => self.start_over(key_text(key)),
            _ => {
                let mut input = std::mem::take(&mut self.input);
                input.push_str(&key_text(key));
                self.start_over(input);
            }
        }
    }

    /// Leaves the result on display but goes back to editing the
    /// expression that produced it.
    pub fn edit_input(&mut self) {
        self.evaluated = false;
    }

    /// The "tap the result" gesture: keeps the finished calculation in the
    /// history and starts a new expression from its result.
    pub fn reuse_result(&mut self) {
        if !self.evaluated {
            return;
        }
        self.commit();
        let result = std::mem::take(&mut self.display);
        self.start_over(result);
    }

    /// Evaluates a whole typed line, as if typed key by key and then `=`.
    /// A line starting with an operator continues from a displayed result.
    /// An empty line changes nothing.
    pub fn submit(&mut self, line: &str) -> Outcome {
        let line = line.trim();
        if line.is_empty() {
            return Outcome::Failure(ErrorKind::InvalidInput);
        }
        let input = if self.evaluated && starts_with_binary_operator(line) {
            self.continue_from_result(line)
        } else {
            line.to_owned()
        };
        self.start_over(input);
        self.equals()
    }

    // A negative result raised to a power is grouped first: `(-4)^2`.
    fn continue_from_result(&self, rest: &str) -> String {
        let power = rest.starts_with('^') || rest.starts_with("**");
        if power && self.display.starts_with('-') {
            format!("({}){}", self.display, rest)
        } else {
            format!("{}{}", self.display, rest)
        }
    }

    fn equals(&mut self) -> Outcome {
        if self.input.trim().is_empty() {
            return Outcome::Failure(ErrorKind::InvalidInput);
        }
        match eval::evaluate_value(&self.input, self.angle_mode, self.answer) {
            Ok(value) => {
                self.display = eval::format_result(value);
                self.answer = Some(value);
                self.evaluated = true;
                self.history.record(&self.input, &self.display);
                Outcome::Success(self.display.clone())
            }
            Err(err) => {
                let outcome = Outcome::Failure(err.kind());
                self.display = outcome.to_string();
                self.evaluated = false;
                outcome
            }
        }
    }
}

fn key_text(key: Key) -> String {
    match key {
        Key::Digit(d) => d.to_string(),
        Key::Point => ".".to_owned(),
        Key::Operator(op) => op.glyph().to_string(),
        Key::Power => "^".to_owned(),
        Key::Function(f) => format!("{}(", f.label()),
        Key::Pi => "π".to_owned(),
        Key::OpenParen => "(".to_owned(),
        Key::CloseParen => ")".to_owned(),
        Key::Inverse | Key::Clear | Key::Delete | Key::Equals => String::new(),
    }
}

impl fmt::Display for Session {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "[{}] {}", self.angle_mode, self.input)?;
        if !self.display.is_empty() {
            write!(f, " = {}", self.display)?;
        }
        Ok(())
    }
}
