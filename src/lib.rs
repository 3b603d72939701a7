#![cfg_attr(all(test, feature = "nightly"), feature(test))]

//! Calculator core: evaluates keypad expressions and keeps a calculation
//! history.
//!
//! ```
//! use pocketcalc::{evaluate, AngleMode, Outcome};
//!
//! assert_eq!(evaluate("2(3+4)", AngleMode::Radians, None), Outcome::Success("14".into()));
//! assert_eq!(evaluate("sin(30", AngleMode::Degrees, None).to_string(), "0.5");
//! assert_eq!(evaluate("1÷0", AngleMode::Radians, None).to_string(), "Error: Math Error");
//! ```

#[cfg(all(test, feature = "nightly"))]
extern crate test;

#[cfg(all(test, feature = "nightly"))]
mod bench;

mod error;
mod eval;
pub mod history;
mod normalize;
mod parse;
pub mod session;
pub mod storage;
mod token;

pub use crate::error::{CalcError, ErrorKind};
pub use crate::eval::{evaluate, evaluate_value, format_result, AngleMode, Outcome};
pub use crate::history::{HistoryEntry, HistoryError, HistoryStore};
pub use crate::session::{Key, Session, SessionSnapshot, State};
pub use crate::storage::{JsonFileStore, KeyValueStore, MemoryStore, StoreError};
