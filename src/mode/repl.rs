//! Interactive shell with line editing, history and reconnection.

use std::mem;
use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use tracing::warn;

use crate::bolt::{BoltSession, Connector, SessionFactory, SessionStatus};
use crate::config::{BoltConfig, CsvOptions, OutputOptions};
use crate::error::{ClientError, Result};
use crate::input::LineTokenizer;
use crate::output::{self, echo_failure, echo_info};

const PROMPT: &str = "boltline> ";
const MULTILINE_PROMPT: &str = "      -> ";
const HISTORY_FILENAME: &str = "client_history";
const RECONNECT_ATTEMPTS: u32 = 3;

const HELP: &str = "\
Statements can span multiple lines and conclude with a semicolon (;).
Each statement is executed and its results are printed.

The following shell commands are supported:

\t:help\t Print this usage information
\t:docs\t Print pointers to the documentation
\t:quit\t Exit the shell
";

const DOCS: &str = "\
If you are new to graph databases or the query language, start with the
documentation of the server you are connected to. Most Bolt-speaking
servers document querying, data import and configuration online.
";

#[derive(Debug, Clone)]
pub struct ReplOptions {
    /// Directory that holds the history file; a leading `~` expands to the
    /// user's home directory.
    pub history_dir: String,
    pub no_history: bool,
    pub verbose_execution_info: bool,
}

impl Default for ReplOptions {
    fn default() -> Self {
        Self {
            history_dir: "~/.boltline".into(),
            no_history: false,
            verbose_execution_info: false,
        }
    }
}

enum ReadOutcome {
    Statement(String),
    Command(String),
    Interrupted,
    Eof,
}

/// Assembles multi-line statements from editor input, carrying text after
/// a terminator over to the next statement.
struct StatementReader {
    tokenizer: LineTokenizer,
    carry: String,
}

impl StatementReader {
    fn new() -> Self {
        Self {
            tokenizer: LineTokenizer::new(),
            carry: String::new(),
        }
    }

    fn next(&mut self, editor: &mut DefaultEditor) -> Result<ReadOutcome> {
        let mut statement = String::new();
        let mut from_carry = !self.carry.is_empty();
        loop {
            let chunk = if statement.is_empty() && !self.carry.is_empty() {
                mem::take(&mut self.carry)
            } else {
                let prompt = if statement.is_empty() && !from_carry {
                    PROMPT
                } else {
                    MULTILINE_PROMPT
                };
                match editor.readline(prompt) {
                    Ok(line) => {
                        if !line.trim().is_empty() {
                            let _ = editor.add_history_entry(line.trim_end());
                        }
                        if statement.is_empty() && !from_carry && line.trim_start().starts_with(':')
                        {
                            return Ok(ReadOutcome::Command(line.trim().to_string()));
                        }
                        line
                    }
                    Err(ReadlineError::Interrupted) => {
                        // Abandon the partial statement, like ^C at a shell.
                        self.tokenizer = LineTokenizer::new();
                        self.carry.clear();
                        return Ok(ReadOutcome::Interrupted);
                    }
                    Err(ReadlineError::Eof) => return Ok(ReadOutcome::Eof),
                    Err(err) => return Err(ClientError::Console(err.to_string())),
                }
            };
            let (text, terminated) = self.tokenizer.consume_line(&chunk);
            if !statement.is_empty() {
                statement.push('\n');
            }
            statement.push_str(&text);
            if terminated {
                self.carry = chunk[text.len() + 1..].trim().to_string();
                return Ok(ReadOutcome::Statement(statement));
            }
            from_carry = false;
        }
    }
}

pub fn run(
    config: &BoltConfig,
    repl_opts: &ReplOptions,
    output_opts: &OutputOptions,
    csv_opts: &CsvOptions,
) -> Result<()> {
    let mut config = config.clone();
    if !config.username.is_empty() && config.password.is_empty() {
        config.password = rpassword::prompt_password("Password: ")
            .map_err(|e| ClientError::Console(format!("password prompt failed: {e}")))?;
    }
    let connector = Connector::new(config.clone());
    let mut session = connector.open()?;

    let mut editor =
        DefaultEditor::new().map_err(|e| ClientError::Console(format!("line editor: {e}")))?;
    let history_file = history_file(repl_opts)?;
    if let Some(path) = &history_file {
        if path.exists() && editor.load_history(path).is_err() {
            echo_failure("Unable to read history file", &path.display().to_string());
        }
    }

    echo_info(&format!("boltline {}", env!("CARGO_PKG_VERSION")));
    echo_info(&format!("Connected to '{}'", config.uri()));
    echo_info("Type :help for shell usage");
    echo_info("Quit the shell by typing Ctrl-D(eof) or :quit");

    let mut reader = StatementReader::new();
    loop {
        let statement = match reader.next(&mut editor)? {
            ReadOutcome::Statement(text) => text,
            ReadOutcome::Command(command) => {
                match command.as_str() {
                    ":quit" => break,
                    ":help" => echo_info(HELP),
                    ":docs" => echo_info(DOCS),
                    other => {
                        echo_failure("Unsupported command", other);
                        echo_info(HELP);
                    }
                }
                continue;
            }
            ReadOutcome::Interrupted => continue,
            ReadOutcome::Eof => break,
        };
        if statement.trim().is_empty() {
            continue;
        }

        match session.run(&statement) {
            Ok(data) => {
                if !data.records.is_empty() {
                    output::print(&data, output_opts, csv_opts)?;
                }
                let rows = match data.records.len() {
                    0 => "Empty set".to_string(),
                    1 => "1 row in set".to_string(),
                    n => format!("{n} rows in set"),
                };
                echo_info(&format!(
                    "{rows} (round trip in {:.3} sec)",
                    data.wall_time.as_secs_f64()
                ));
                if let Some(path) = &history_file {
                    if editor.save_history(path).is_err() {
                        warn!(path = %path.display(), "repl.history_save_failed");
                    }
                }
                if let Some(notification) = &data.notification {
                    output::echo_notification(notification);
                }
                if let Some(stats) = &data.stats {
                    output::echo_stats(stats);
                }
                if repl_opts.verbose_execution_info {
                    if let Some(info) = &data.execution_info {
                        output::echo_execution_info(info);
                    }
                }
            }
            Err(err) if session.status() == SessionStatus::Bad || err.is_connection_level() => {
                echo_failure("Client received connection exception", &err.to_string());
                echo_info("Trying to reconnect...");
                session = reconnect(&connector, &config)?;
            }
            Err(err) => {
                echo_failure("Client received query exception", &err.to_string());
            }
        }
    }
    echo_info("Bye");
    Ok(())
}

fn reconnect(connector: &Connector, config: &BoltConfig) -> Result<BoltSession> {
    let mut last_error = None;
    for attempt in 0..RECONNECT_ATTEMPTS {
        if attempt > 0 {
            thread::sleep(Duration::from_secs(1));
        }
        match connector.open() {
            Ok(session) => {
                echo_info(&format!("Connected to '{}'", config.uri()));
                return Ok(session);
            }
            Err(err) => {
                echo_failure("Connection failure", &err.to_string());
                last_error = Some(err);
            }
        }
    }
    echo_failure("Couldn't connect to", &format!("'{}'", config.uri()));
    Err(last_error.unwrap_or_else(|| ClientError::Connect(config.uri())))
}

fn history_file(opts: &ReplOptions) -> Result<Option<PathBuf>> {
    if opts.no_history {
        return Ok(None);
    }
    let dir = match opts.history_dir.strip_prefix('~') {
        Some(rest) => {
            let home = std::env::var("HOME")
                .map_err(|_| ClientError::Console("cannot resolve home directory".into()))?;
            PathBuf::from(format!("{home}{rest}"))
        }
        None => PathBuf::from(&opts.history_dir),
    };
    std::fs::create_dir_all(&dir)?;
    Ok(Some(dir.join(HISTORY_FILENAME)))
}
