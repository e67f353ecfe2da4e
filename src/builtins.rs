//! Fixed-set built-in dispatch (spec.md §4.8). Single-stage commands whose
//! name matches this list run in-process, without a fork.

use crate::jobs::JobTable;
use crate::launcher;

const BUILTINS: &[&str] = &["cd", "exit", "help", "bg", "fg", "export", "jobs", "kill"];

const HELP_TEXT: &str = "\
Built-ins: cd [PATH], exit [N], help, bg JID, fg JID, export NAME[=VALUE], jobs, kill [-s SIG] PID";

const KILL_SIGNALS: &[(&str, libc::c_int)] = &[
    ("SIGHUP", libc::SIGHUP),
    ("SIGINT", libc::SIGINT),
    ("SIGTERM", libc::SIGTERM),
    ("SIGKILL", libc::SIGKILL),
    ("SIGSTOP", libc::SIGSTOP),
    ("SIGCONT", libc::SIGCONT),
    ("SIGQUIT", libc::SIGQUIT),
    ("SIGALRM", libc::SIGALRM),
    ("SIGTSTP", libc::SIGTSTP),
];

pub fn is_builtin(name: &str) -> bool {
    BUILTINS.contains(&name)
}

/// Dispatch one built-in call. `argv[0]` must be a recognized name (checked
/// by the caller via [`is_builtin`]). `last_exit_status` is the REPL's
/// current value, needed by `exit` when called with no argument. Returns
/// the exit code recorded as `last_exit_status`.
pub fn execute(
    argv: &[String],
    job_table: &mut JobTable,
    shell_pgid: libc::pid_t,
    terminal_fd: libc::c_int,
    last_exit_status: i32,
) -> i32 {
    let args = &argv[1..];
    match argv[0].as_str() {
        "cd" => builtin_cd(args),
        "exit" => builtin_exit(args, job_table, last_exit_status),
        "help" => builtin_help(),
        "bg" => builtin_bg(args, job_table),
        "fg" => builtin_fg(args, job_table, shell_pgid, terminal_fd),
        "export" => builtin_export(args),
        "jobs" => builtin_jobs(job_table),
        "kill" => builtin_kill(args),
        other => {
            eprintln!("{other}: not a builtin");
            1
        }
    }
}

fn expand_home(path: &str, home: &str) -> String {
    if path == "~" {
        home.to_string()
    } else if let Some(rest) = path.strip_prefix("~/") {
        format!("{home}/{rest}")
    } else {
        path.to_string()
    }
}

fn builtin_cd(args: &[String]) -> i32 {
    let home = std::env::var("HOME").unwrap_or_default();
    let target = match args.first() {
        Some(path) => expand_home(path, &home),
        None => home,
    };

    match std::env::set_current_dir(&target) {
        Ok(()) => 0,
        Err(e) => {
            eprintln!("cd: {target}: {e}");
            1
        }
    }
}

fn builtin_exit(args: &[String], job_table: &mut JobTable, last_exit_status: i32) -> i32 {
    let code = match args.first() {
        Some(s) => match s.parse::<i32>() {
            Ok(n) => n,
            Err(_) => {
                eprintln!("exit: usage: exit [N]");
                return 2;
            }
        },
        None => last_exit_status,
    };

    for jid in job_table.jobs_sorted().iter().map(|j| j.jid.unwrap()).collect::<Vec<_>>() {
        job_table.remove(jid);
    }

    std::process::exit(code);
}

fn builtin_help() -> i32 {
    println!("{HELP_TEXT}");
    0
}

fn builtin_export(args: &[String]) -> i32 {
    let mut code = 0;
    for arg in args {
        if arg.starts_with('=') {
            eprintln!("export: {arg}: invalid identifier");
            code = 1;
            continue;
        }
        match arg.split_once('=') {
            Some((name, value)) => unsafe { std::env::set_var(name, value) },
            None => unsafe { std::env::set_var(arg, "") },
        }
    }
    code
}

fn parse_jid(args: &[String], usage: &str) -> Result<libc::pid_t, i32> {
    match args.first().and_then(|s| s.parse::<libc::pid_t>().ok()) {
        Some(jid) => Ok(jid),
        None => {
            eprintln!("{usage}");
            Err(2)
        }
    }
}

fn builtin_bg(args: &[String], job_table: &mut JobTable) -> i32 {
    let jid = match parse_jid(args, "bg: usage: bg JID") {
        Ok(j) => j,
        Err(code) => return code,
    };
    if job_table.get(jid).is_none() {
        eprintln!("bg: {jid}: no such job");
        return 1;
    }
    match launcher::put_in_background(jid, true) {
        Ok(()) => 0,
        Err(e) => {
            eprintln!("bg: {e}");
            1
        }
    }
}

fn builtin_fg(
    args: &[String],
    job_table: &mut JobTable,
    shell_pgid: libc::pid_t,
    terminal_fd: libc::c_int,
) -> i32 {
    let jid = match parse_jid(args, "fg: usage: fg JID") {
        Ok(j) => j,
        Err(code) => return code,
    };
    let raw_input = match job_table.get(jid) {
        Some(job) => job.raw_input.clone(),
        None => {
            eprintln!("fg: {jid}: no such job");
            return 1;
        }
    };

    match launcher::put_in_foreground(job_table, jid, true, shell_pgid, terminal_fd) {
        Ok(launcher::FgOutcome::Stopped) => {
            println!("{jid} Stopped {raw_input}");
            0
        }
        Ok(launcher::FgOutcome::Done(outcome)) => {
            println!("{jid} Exited ({}) {raw_input}", outcome.display_label());
            outcome.last_exit_status()
        }
        Err(e) => {
            eprintln!("fg: {e}");
            1
        }
    }
}

fn builtin_jobs(job_table: &JobTable) -> i32 {
    for job in job_table.jobs_sorted() {
        let status = match job.status() {
            crate::pipeline::JobStatus::Running => "Running",
            crate::pipeline::JobStatus::Stopped => "Stopped",
            crate::pipeline::JobStatus::Done => "Done",
        };
        println!(
            "{:<8}{:<13}{}",
            job.jid.unwrap_or_default(),
            status,
            job.raw_input
        );
    }
    0
}

fn resolve_signal(name_or_number: &str) -> Option<libc::c_int> {
    if let Ok(n) = name_or_number.parse::<libc::c_int>() {
        return Some(n);
    }
    KILL_SIGNALS
        .iter()
        .find(|(name, _)| *name == name_or_number)
        .map(|(_, sig)| *sig)
}

fn builtin_kill(args: &[String]) -> i32 {
    let mut signal = libc::SIGTERM;
    let mut rest = args;

    if rest.first().map(String::as_str) == Some("-s") {
        let Some(sig_arg) = rest.get(1) else {
            eprintln!("kill: usage: kill [-s SIG] PID");
            return 2;
        };
        let Some(sig) = resolve_signal(sig_arg) else {
            eprintln!("kill: {sig_arg}: unknown signal");
            return 2;
        };
        signal = sig;
        rest = &rest[2..];
    }

    let Some(pid) = rest.first().and_then(|s| s.parse::<libc::pid_t>().ok()) else {
        eprintln!("kill: usage: kill [-s SIG] PID");
        return 2;
    };

    let rc = unsafe { libc::kill(pid, signal) };
    if rc == 0 {
        0
    } else {
        eprintln!("kill: {pid}: {}", std::io::Error::last_os_error());
        1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognizes_fixed_builtin_set() {
        for name in BUILTINS {
            assert!(is_builtin(name));
        }
        assert!(!is_builtin("echo"));
        assert!(!is_builtin("pwd"));
    }

    #[test]
    fn expand_home_handles_bare_tilde_and_prefix() {
        assert_eq!(expand_home("~", "/home/u"), "/home/u");
        assert_eq!(expand_home("~/docs", "/home/u"), "/home/u/docs");
        assert_eq!(expand_home("/etc", "/home/u"), "/etc");
    }

    #[test]
    fn resolve_signal_accepts_name_and_number() {
        assert_eq!(resolve_signal("SIGTERM"), Some(libc::SIGTERM));
        assert_eq!(resolve_signal("9"), Some(9));
        assert_eq!(resolve_signal("SIGBOGUS"), None);
    }

    #[test]
    fn export_rejects_leading_equals() {
        assert_eq!(builtin_export(&["=oops".to_string()]), 1);
    }
}
