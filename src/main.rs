mod builtins;
mod error;
mod jobs;
mod launcher;
mod pipeline;
mod redirect;
mod signals;
mod status;
mod tokenizer;
mod validator;

use std::io::{self, Write};

use error::ShellError;
use jobs::JobTable;
use launcher::{FgOutcome, LaunchOutcome};
use validator::LineState;

const PROGRAM: &str = env!("CARGO_BIN_NAME");
const BANNER: &str = concat!(
    env!("CARGO_BIN_NAME"),
    " — a small POSIX job-control shell. Type `help` for built-ins."
);

fn prompt(cwd_display: &str) -> String {
    format!("{PROGRAM}:{cwd_display}$ ")
}

fn cwd_with_home_as_tilde() -> String {
    let cwd = std::env::current_dir().unwrap_or_default();
    let cwd = cwd.to_string_lossy().into_owned();
    match std::env::var("HOME") {
        Ok(home) if !home.is_empty() => {
            if let Some(rest) = cwd.strip_prefix(&home) {
                if rest.is_empty() {
                    "~".to_string()
                } else if let Some(rest) = rest.strip_prefix('/') {
                    format!("~/{rest}")
                } else {
                    cwd
                }
            } else {
                cwd
            }
        }
        _ => cwd,
    }
}

/// Read lines from `stdin` until the accumulated text is complete and legal
/// (spec.md §4.3), joining continuations per its joining rule. Returns
/// `None` on EOF before any text was accumulated.
fn read_logical_line(stdin: &io::Stdin) -> io::Result<Option<String>> {
    let mut buffer = String::new();
    let mut first = true;

    loop {
        if !first {
            print!("> ");
            io::stdout().flush()?;
        }
        first = false;

        let mut line = String::new();
        let n = stdin.read_line(&mut line)?;
        if n == 0 {
            return Ok(if buffer.is_empty() { None } else { Some(buffer) });
        }
        let line = line.trim_end_matches(['\n', '\r']);

        if buffer.is_empty() {
            buffer.push_str(line);
        } else if buffer.ends_with('|') {
            buffer.push(' ');
            buffer.push_str(line.trim_start());
        } else {
            buffer.push_str(line);
        }

        match validator::classify(&buffer) {
            LineState::Complete | LineState::Invalid => return Ok(Some(buffer)),
            LineState::NeedsContinuation => continue,
        }
    }
}

/// The classic "put the shell in its own foreground process group" dance:
/// ignore `SIGTTIN` while we don't yet own the terminal, then take it.
fn ensure_foreground(terminal_fd: libc::c_int) -> libc::pid_t {
    unsafe {
        let mut shell_pgid = libc::getpgrp();
        while libc::tcgetpgrp(terminal_fd) != shell_pgid {
            libc::kill(-shell_pgid, libc::SIGTTIN);
            shell_pgid = libc::getpgrp();
        }
        libc::setpgid(0, 0);
        shell_pgid = libc::getpid();
        let _ = signals::set_terminal_foreground(terminal_fd, shell_pgid);
        shell_pgid
    }
}

fn main() {
    env_logger::init();

    let terminal_fd = libc::STDIN_FILENO;
    let is_tty = unsafe { libc::isatty(terminal_fd) } == 1;
    let shell_pgid = if is_tty {
        ensure_foreground(terminal_fd)
    } else {
        unsafe { libc::getpgrp() }
    };
    if signals::install_parent_policy().is_err() {
        log::warn!("failed to install parent signal policy");
    }

    println!("{BANNER}");

    let stdin = io::stdin();
    let mut job_table = JobTable::new();
    let mut last_exit_status: i32 = 0;

    loop {
        if let Ok(Some(status)) = job_table.poll() {
            last_exit_status = status;
        }

        print!("{}", prompt(&cwd_with_home_as_tilde()));
        if io::stdout().flush().is_err() {
            break;
        }

        let line = match read_logical_line(&stdin) {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                eprintln!("{PROGRAM}: {e}");
                std::process::exit(1);
            }
        };

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        if validator::classify(trimmed) == LineState::Invalid {
            eprintln!("Invalid command syntax");
            last_exit_status = 2;
            continue;
        }

        let tokens = tokenizer::tokenize(trimmed);
        let job = match pipeline::build(&tokens, trimmed.to_string()) {
            Ok(job) => job,
            Err(ShellError::Parse) => {
                eprintln!("Invalid command syntax");
                last_exit_status = 2;
                continue;
            }
            Err(e) => {
                eprintln!("{PROGRAM}: {e}");
                last_exit_status = 1;
                continue;
            }
        };

        log::debug!("launching pipeline: {:?}", job.raw_input);

        match launcher::launch(job, &mut job_table, shell_pgid, terminal_fd, last_exit_status) {
            Ok(LaunchOutcome::Builtin(code)) => last_exit_status = code,
            Ok(LaunchOutcome::Backgrounded(_jid)) => {}
            Ok(LaunchOutcome::Foreground(_jid, FgOutcome::Done(outcome))) => {
                last_exit_status = outcome.last_exit_status();
            }
            Ok(LaunchOutcome::Foreground(jid, FgOutcome::Stopped)) => {
                if let Some(job) = job_table.get(jid) {
                    println!("{jid} Stopped {}", job.raw_input);
                }
            }
            Err(ShellError::RedirectOpen(msg)) => {
                eprintln!("{msg}");
                last_exit_status = 1;
            }
            Err(e @ ShellError::Spawn(_)) => {
                eprintln!("{PROGRAM}: {e}");
                std::process::exit(1);
            }
            Err(e) => {
                eprintln!("{PROGRAM}: {e}");
                last_exit_status = 1;
            }
        }
    }

    std::process::exit(last_exit_status);
}
