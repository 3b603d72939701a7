use std::io::{self, stdin, stdout, BufRead, Write};
use std::path::PathBuf;
use std::process::exit;

use clap::{crate_version, App, Arg, ArgMatches};
use liner::{BasicCompleter, Context, Prompt};
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

use pocketcalc::storage::{self, JsonFileStore, KeyValueStore, MemoryStore, StoreError};
use pocketcalc::{AngleMode, HistoryError, Key, Session};

#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    #[error("calc: {0}")]
    Store(#[from] StoreError),
    #[error("calc: {0}")]
    Io(#[from] io::Error),
    #[error("calc: no data directory found; use --history <FILE> or --no-history")]
    NoDataDir,
}

enum Flow {
    Continue,
    Exit,
}

const HELP: &str = "\
expressions: 2(3+4)  sin 30  √(2  ans×2  + 1 (continues from the result)
commands:
  :deg | :rad               switch angle mode
  :history [filter]         list calculations, pinned first
  :pin <id>                 pin or unpin an entry
  :delete <id>              delete an unpinned entry
  :rename <id> [name]       name an entry, or clear its name
  :clear                    clear the history
  :export                   print the history as shareable text
  :press <key>...           press keypad keys (7 × sin ( ) = C DEL 1/x ...)
  :ac                       clear the current calculation
  :reuse                    start a new calculation from the result
  :edit                     go back to editing the last expression
  exit | quit";

fn app() -> App<'static, 'static> {
    App::new("pcalc")
        .version(crate_version!())
        .about("Scientific calculator with a pinnable history")
        .arg(
            Arg::with_name("EXPRESSION")
                .help("Evaluate once and exit; reads stdin or starts a prompt when absent")
                .multiple(true),
        )
        .arg(
            Arg::with_name("degrees")
                .short("d")
                .long("degrees")
                .help("Read trigonometric arguments in degrees"),
        )
        .arg(
            Arg::with_name("history")
                .long("history")
                .value_name("FILE")
                .takes_value(true)
                .conflicts_with("no-history")
                .help("JSON file holding the history and the current calculation"),
        )
        .arg(
            Arg::with_name("no-history")
                .long("no-history")
                .help("Keep the history in memory only"),
        )
        .arg(
            Arg::with_name("verbose")
                .short("v")
                .long("verbose")
                .help("Log debug output to stderr"),
        )
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn open_store(matches: &ArgMatches) -> Result<Box<dyn KeyValueStore>, RuntimeError> {
    if matches.is_present("no-history") {
        return Ok(Box::new(MemoryStore::new()));
    }
    let path = match matches.value_of("history") {
        Some(path) => PathBuf::from(path),
        None => storage::default_store_path().ok_or(RuntimeError::NoDataDir)?,
    };
    let store = JsonFileStore::open(path)?;
    debug!(path = %store.path().display(), "using history file");
    Ok(Box::new(store))
}

/// A session bound to the store it is saved to after every line.
struct Calculator {
    session: Session,
    store: Box<dyn KeyValueStore>,
    saved_revision: u64,
}

impl Calculator {
    fn load(store: Box<dyn KeyValueStore>, angle_mode: AngleMode) -> Result<Self, RuntimeError> {
        let history = storage::load_history(&*store)?;
        let saved_revision = history.revision();
        let session = match storage::load_session(&*store)? {
            Some(snapshot) => Session::restore(snapshot, angle_mode, history),
            None => Session::new(angle_mode, history),
        };
        Ok(Calculator { session, store, saved_revision })
    }

    fn persist(&mut self) -> Result<(), RuntimeError> {
        let revision = self.session.history().revision();
        if revision != self.saved_revision {
            storage::save_history(&mut *self.store, self.session.history())?;
            self.saved_revision = revision;
        }
        storage::save_session(&mut *self.store, &self.session.snapshot())?;
        Ok(())
    }

    fn report<W: Write>(out: &mut W, result: Result<String, HistoryError>) -> io::Result<()> {
        match result {
            Ok(message) => writeln!(out, "{}", message),
            Err(e) => {
                warn!("{}", e);
                writeln!(out, "calc: {}", e)
            }
        }
    }

    fn list<W: Write>(&self, out: &mut W, filter: &str) -> io::Result<()> {
        let entries = self.session.history().query(filter);
        if entries.is_empty() {
            return writeln!(out, "(no history)");
        }
        for entry in entries {
            let mark = if entry.pinned { '*' } else { ' ' };
            writeln!(
                out,
                "{} {}  {} = {}  ({})",
                mark,
                entry.id,
                entry.title(),
                entry.result,
                entry.timestamp
            )?;
        }
        Ok(())
    }

    fn press<W: Write>(&mut self, out: &mut W, labels: &str) -> io::Result<()> {
        for label in labels.split_whitespace() {
            match Key::from_label(label) {
                Some(key) => self.session.press(key),
                None => return writeln!(out, "calc: unknown key `{}`", label),
            }
        }
        writeln!(out, "{}", self.session)
    }

    fn handle<W: Write>(&mut self, out: &mut W, line: &str) -> Result<Flow, RuntimeError> {
        let line = line.trim();
        let (command, rest) = match line.find(char::is_whitespace) {
            Some(split) => (&line[..split], line[split..].trim()),
            None => (line, ""),
        };
        match command {
            "" => return Ok(Flow::Continue),
            "exit" | "quit" => return Ok(Flow::Exit),
            ":help" => writeln!(out, "{}", HELP)?,
            ":deg" => {
                self.session.set_angle_mode(AngleMode::Degrees);
                writeln!(out, "{}", self.session.angle_mode())?;
            }
            ":rad" => {
                self.session.set_angle_mode(AngleMode::Radians);
                writeln!(out, "{}", self.session.angle_mode())?;
            }
            ":history" => self.list(out, rest)?,
            ":pin" => {
                let result = self
                    .session
                    .history_mut()
                    .toggle_pin(rest)
                    .map(|pinned| if pinned { "pinned" } else { "unpinned" }.to_owned());
                Self::report(out, result)?;
            }
            ":delete" => {
                let result = self
                    .session
                    .history_mut()
                    .delete(rest)
                    .map(|entry| format!("deleted {} = {}", entry.title(), entry.result));
                Self::report(out, result)?;
            }
            ":rename" => {
                let (id, name) = match rest.find(char::is_whitespace) {
                    Some(split) => (&rest[..split], rest[split..].trim()),
                    None => (rest, ""),
                };
                let result =
                    self.session.history_mut().rename(id, name).map(|()| "renamed".to_owned());
                Self::report(out, result)?;
            }
            ":clear" => {
                self.session.history_mut().clear();
                writeln!(out, "history cleared")?;
            }
            ":export" => writeln!(out, "{}", self.session.history().export_text())?,
            ":press" => self.press(out, rest)?,
            ":ac" => {
                self.session.press(Key::Clear);
                writeln!(out, "{}", self.session)?;
            }
            ":reuse" => {
                self.session.reuse_result();
                writeln!(out, "{}", self.session)?;
            }
            ":edit" => {
                self.session.edit_input();
                writeln!(out, "{}", self.session)?;
            }
            _ if command.starts_with(':') => writeln!(out, "calc: unknown command `{}`", command)?,
            _ => writeln!(out, "{}", self.session.submit(line))?,
        }
        self.persist()?;
        Ok(Flow::Continue)
    }
}

fn interactive(calculator: &mut Calculator) -> Result<(), RuntimeError> {
    let stdout = stdout();
    let mut stdout = stdout.lock();
    let mut con = Context::new();
    let mut completer = BasicCompleter::new(Vec::<String>::new());
    loop {
        let prompt = format!("[{}]> ", calculator.session.angle_mode());
        let line = match con.read_line(Prompt::from(prompt), None, &mut completer) {
            Ok(line) => line,
            Err(ref e) if e.kind() == io::ErrorKind::UnexpectedEof => break,
            Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        };
        if let Flow::Exit = calculator.handle(&mut stdout, &line)? {
            break;
        }
        if !line.trim().is_empty() {
            con.history.push(line.into())?;
        }
    }
    Ok(())
}

fn scripted(calculator: &mut Calculator) -> Result<(), RuntimeError> {
    let stdin = stdin();
    let stdout = stdout();
    let mut stdout = stdout.lock();
    for line in stdin.lock().lines() {
        if let Flow::Exit = calculator.handle(&mut stdout, &line?)? {
            break;
        }
    }
    Ok(())
}

pub fn calc(matches: &ArgMatches) -> Result<i32, RuntimeError> {
    let angle_mode = if matches.is_present("degrees") {
        AngleMode::Degrees
    } else {
        AngleMode::Radians
    };
    let mut calculator = Calculator::load(open_store(matches)?, angle_mode)?;

    if let Some(words) = matches.values_of("EXPRESSION") {
        let expression = words.collect::<Vec<_>>().join(" ");
        let outcome = calculator.session.submit(&expression);
        calculator.persist()?;
        println!("{}", outcome);
        return Ok(if outcome.is_success() { 0 } else { 1 });
    }

    if atty::is(atty::Stream::Stdin) {
        interactive(&mut calculator)?;
    } else {
        scripted(&mut calculator)?;
    }
    Ok(0)
}

fn main() {
    let matches = app().get_matches();
    init_logging(matches.is_present("verbose"));
    let code = match calc(&matches) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{}", e);
            1
        }
    };
    exit(code)
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use pocketcalc::storage::{HISTORY_KEY, SESSION_KEY};

    use super::*;

    /// Memory store that logs the key of every write.
    #[derive(Default)]
    struct LoggedStore {
        inner: MemoryStore,
        writes: Rc<RefCell<Vec<String>>>,
    }

    impl KeyValueStore for LoggedStore {
        fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
            self.inner.get(key)
        }

        fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
            self.writes.borrow_mut().push(key.to_owned());
            self.inner.set(key, value)
        }

        fn remove(&mut self, key: &str) -> Result<(), StoreError> {
            self.writes.borrow_mut().push(key.to_owned());
            self.inner.remove(key)
        }
    }

    fn calculator() -> (Calculator, Rc<RefCell<Vec<String>>>) {
        let store = LoggedStore::default();
        let writes = Rc::clone(&store.writes);
        let calculator = Calculator::load(Box::new(store), AngleMode::Radians).unwrap();
        (calculator, writes)
    }

    fn run(calculator: &mut Calculator, line: &str) -> String {
        let mut out = Vec::new();
        calculator.handle(&mut out, line).unwrap();
        String::from_utf8(out).unwrap()
    }

    fn history_writes(writes: &Rc<RefCell<Vec<String>>>) -> usize {
        writes.borrow().iter().filter(|key| *key == HISTORY_KEY).count()
    }

    #[test]
    fn pinned_entry_survives_delete() {
        let (mut calculator, _) = calculator();
        assert_eq!(run(&mut calculator, "2+2"), "4\n");
        let id = calculator.session.history().entries()[0].id.clone();

        assert_eq!(run(&mut calculator, &format!(":pin {}", id)), "pinned\n");
        let saved = storage::load_history(&*calculator.store).unwrap();
        assert!(saved.get(&id).unwrap().pinned);

        let out = run(&mut calculator, &format!(":delete {}", id));
        assert!(out.starts_with("calc: entry"), "{}", out);
        assert!(storage::load_history(&*calculator.store).unwrap().get(&id).is_some());

        run(&mut calculator, &format!(":pin {}", id));
        assert!(run(&mut calculator, &format!(":delete {}", id)).starts_with("deleted 2+2 = 4"));
        assert!(calculator.store.get(HISTORY_KEY).unwrap().is_none());
    }

    #[test]
    fn history_saved_only_when_changed() {
        let (mut calculator, writes) = calculator();
        run(&mut calculator, "6×7");
        assert_eq!(history_writes(&writes), 1);

        // Mode switches, a repeated calculation and failures leave it alone.
        run(&mut calculator, ":deg");
        run(&mut calculator, "6×7");
        run(&mut calculator, "1÷0");
        run(&mut calculator, ":history");
        assert_eq!(history_writes(&writes), 1);

        let id = calculator.session.history().entries()[0].id.clone();
        assert_eq!(run(&mut calculator, &format!(":rename {} answer", id)), "renamed\n");
        assert_eq!(history_writes(&writes), 2);
        let saved = storage::load_history(&*calculator.store).unwrap();
        assert_eq!(saved.entries()[0].title(), "answer");

        let sessions = writes.borrow().iter().filter(|key| *key == SESSION_KEY).count();
        assert_eq!(sessions, 6);
    }

    #[test]
    fn clear_removes_saved_history() {
        let (mut calculator, _) = calculator();
        run(&mut calculator, "1+1");
        run(&mut calculator, "2+2");
        assert!(calculator.store.get(HISTORY_KEY).unwrap().is_some());

        assert_eq!(run(&mut calculator, ":clear"), "history cleared\n");
        assert!(calculator.store.get(HISTORY_KEY).unwrap().is_none());
        assert_eq!(run(&mut calculator, ":history"), "(no history)\n");

        let snapshot = storage::load_session(&*calculator.store).unwrap().unwrap();
        assert_eq!(snapshot.result, "4");
        assert!(snapshot.just_evaluated);
    }

    #[test]
    fn session_resumes_from_store() {
        let (mut calculator, _) = calculator();
        run(&mut calculator, "2(3+4)");
        let Calculator { store, .. } = calculator;

        let mut resumed = Calculator::load(store, AngleMode::Radians).unwrap();
        assert_eq!(resumed.session.display(), "14");
        assert_eq!(run(&mut resumed, "× 2"), "28\n");
        assert_eq!(run(&mut resumed, ":press C 4 2 ="), "[RAD] 42 = Error: Invalid Input\n");
        assert!(matches!(resumed.handle(&mut Vec::<u8>::new(), "exit").unwrap(), Flow::Exit));
    }
}
