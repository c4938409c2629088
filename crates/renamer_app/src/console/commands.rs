use std::path::PathBuf;

use renamer_core::Mode;

/// One line of console input, parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Command {
    Add(Vec<PathBuf>),
    List,
    Start { mode: Mode, instructions: String },
    Poll,
    Watch,
    Stop,
    Clear,
    Key(String),
    Export(PathBuf),
    Help,
    Quit,
}

pub(crate) const HELP: &str = "\
commands:
  add <path>...                   stage files for renaming
  list                            show the staged files
  start <text|image> [hint...]    rename every staged file in the background
  poll                            show job progress once
  watch                           follow job progress until it ends
  stop                            stop the job and restore original names
  clear                           stop any job and discard staged files
  key <api-key>                   verify and store the API key
  export <dir>                    copy the renamed batch and a manifest to <dir>
  help                            show this text
  quit                            leave";

/// Parse a console line. Blank lines yield `Ok(None)`; the error is a
/// message meant for the user.
pub(crate) fn parse_command(line: &str) -> Result<Option<Command>, String> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let (word, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
    let rest = rest.trim();

    let command = match word.to_ascii_lowercase().as_str() {
        "add" => {
            if rest.is_empty() {
                return Err("usage: add <path>...".to_string());
            }
            Command::Add(rest.split_whitespace().map(PathBuf::from).collect())
        }
        "list" | "ls" => Command::List,
        "start" => {
            let (mode_name, instructions) =
                rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
            let mode = if mode_name.is_empty() {
                Mode::default()
            } else {
                Mode::from_name(mode_name)
                    .ok_or_else(|| format!("unknown mode {mode_name:?}; use text or image"))?
            };
            Command::Start {
                mode,
                instructions: instructions.trim().to_string(),
            }
        }
        "poll" | "status" => Command::Poll,
        "watch" => Command::Watch,
        "stop" => Command::Stop,
        "clear" => Command::Clear,
        "key" => {
            if rest.is_empty() {
                return Err("usage: key <api-key>".to_string());
            }
            Command::Key(rest.to_string())
        }
        "export" => {
            if rest.is_empty() {
                return Err("usage: export <dir>".to_string());
            }
            Command::Export(PathBuf::from(rest))
        }
        "help" | "?" => Command::Help,
        "quit" | "exit" => Command::Quit,
        other => return Err(format!("unknown command {other:?}; type help")),
    };
    Ok(Some(command))
}
