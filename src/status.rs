//! Mapping between raw `waitpid` status words and the shell's notion of how
//! a process ended.

/// How a reaped process ended, as distinguished by `WIFEXITED`/`WIFSIGNALED`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Exited(i32),
    Signaled(i32),
}

impl Outcome {
    /// The value recorded as `last_exit_status` for this outcome: the exit
    /// code, or the raw signal number for a signaled process.
    pub fn last_exit_status(self) -> i32 {
        match self {
            Outcome::Exited(code) => code,
            Outcome::Signaled(signum) => signum,
        }
    }

    /// The text shown inside the `Exited (...)` status line.
    pub fn display_label(self) -> String {
        match self {
            Outcome::Exited(code) => code.to_string(),
            Outcome::Signaled(signum) => signal_name(signum).to_string(),
        }
    }
}

#[cfg(unix)]
pub fn outcome_from_wait_status(raw_status: libc::c_int) -> Option<Outcome> {
    if unsafe { libc::WIFEXITED(raw_status) } {
        return Some(Outcome::Exited(unsafe { libc::WEXITSTATUS(raw_status) }));
    }

    if unsafe { libc::WIFSIGNALED(raw_status) } {
        return Some(Outcome::Signaled(unsafe { libc::WTERMSIG(raw_status) }));
    }

    None
}

#[cfg(unix)]
pub fn stopped(raw_status: libc::c_int) -> bool {
    unsafe { libc::WIFSTOPPED(raw_status) }
}

#[cfg(unix)]
pub fn continued(raw_status: libc::c_int) -> bool {
    unsafe { libc::WIFCONTINUED(raw_status) }
}

/// Human-readable name for a signal number, in the register bash uses for
/// its own `Terminated`/`Segmentation fault`-style messages.
#[cfg(unix)]
pub fn signal_name(signum: i32) -> &'static str {
    match signum {
        libc::SIGHUP => "Hangup",
        libc::SIGINT => "Interrupt",
        libc::SIGQUIT => "Quit",
        libc::SIGILL => "Illegal instruction",
        libc::SIGABRT => "Aborted",
        libc::SIGFPE => "Floating point exception",
        libc::SIGKILL => "Killed",
        libc::SIGSEGV => "Segmentation fault",
        libc::SIGPIPE => "Broken pipe",
        libc::SIGALRM => "Alarm clock",
        libc::SIGTERM => "Terminated",
        libc::SIGTSTP => "Stopped",
        libc::SIGTTIN => "Stopped (tty input)",
        libc::SIGTTOU => "Stopped (tty output)",
        libc::SIGCONT => "Continued",
        libc::SIGSTOP => "Stopped (signal)",
        libc::SIGUSR1 => "User defined signal 1",
        libc::SIGUSR2 => "User defined signal 2",
        libc::SIGBUS => "Bus error",
        _ => "Unknown signal",
    }
}
