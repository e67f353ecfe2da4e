//! Parent- and child-side signal disposition (spec.md §4.7), plus the RAII
//! guard that hands the controlling terminal to a job's process group and
//! restores it to the shell on every exit path.

use std::io;

/// Signals the parent ignores so interactive job control isn't interrupted
/// by its own user, and that the child resets to default before `exec`.
const JOB_CONTROL_SIGNALS: &[libc::c_int] = &[
    libc::SIGINT,
    libc::SIGQUIT,
    libc::SIGTSTP,
    libc::SIGTTIN,
    libc::SIGTTOU,
    libc::SIGPIPE,
];

/// Install the parent's signal policy. Called once at shell startup.
pub fn install_parent_policy() -> io::Result<()> {
    for &sig in JOB_CONTROL_SIGNALS {
        if unsafe { libc::signal(sig, libc::SIG_IGN) } == libc::SIG_ERR {
            return Err(io::Error::last_os_error());
        }
    }
    Ok(())
}

/// Reset signal dispositions to default in the forked child, before
/// `setpgid`/`tcsetpgrp`/`execvp`. Also resets `SIGCHLD`, which the parent
/// never touches but the child must not inherit in a non-default state.
pub fn reset_child_dispositions() {
    for &sig in JOB_CONTROL_SIGNALS {
        unsafe {
            libc::signal(sig, libc::SIG_DFL);
        }
    }
    unsafe {
        libc::signal(libc::SIGCHLD, libc::SIG_DFL);
    }
}

/// Block `signal` for the lifetime of the guard, restoring the previous
/// disposition on drop. Used to silence `SIGTTOU` around `tcsetpgrp` calls
/// made from a background-ish context (the shell is not currently in the
/// foreground process group while it performs the call itself).
pub(crate) struct SignalIgnoreGuard {
    signal: libc::c_int,
    previous: libc::sighandler_t,
}

impl SignalIgnoreGuard {
    pub(crate) fn ignore(signal: libc::c_int) -> io::Result<Self> {
        let previous = unsafe { libc::signal(signal, libc::SIG_IGN) };
        if previous == libc::SIG_ERR {
            return Err(io::Error::last_os_error());
        }
        Ok(Self { signal, previous })
    }
}

impl Drop for SignalIgnoreGuard {
    fn drop(&mut self) {
        unsafe {
            libc::signal(self.signal, self.previous);
        }
    }
}

/// Set the terminal's foreground process group, retrying on `EINTR` and
/// ignoring the `SIGTTOU` the shell itself would otherwise receive for the
/// call when it isn't already the foreground group.
pub fn set_terminal_foreground(fd: libc::c_int, pgid: libc::pid_t) -> io::Result<()> {
    if pgid <= 0 {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "invalid process group id",
        ));
    }

    let _sigttou = SignalIgnoreGuard::ignore(libc::SIGTTOU)?;
    loop {
        let rc = unsafe { libc::tcsetpgrp(fd, pgid) };
        if rc == 0 {
            return Ok(());
        }
        let err = io::Error::last_os_error();
        if err.raw_os_error() == Some(libc::EINTR) {
            continue;
        }
        return Err(err);
    }
}

/// Redundant `setpgid`, tolerant of the benign race where the other side
/// (parent or child) has already won: `EACCES`/`ESRCH` mean the process has
/// already exec'd or exited, which is fine — the call only needs one winner.
pub fn set_process_group(pid: libc::pid_t, pgid: libc::pid_t) -> io::Result<()> {
    loop {
        let rc = unsafe { libc::setpgid(pid, pgid) };
        if rc == 0 {
            return Ok(());
        }
        let err = io::Error::last_os_error();
        match err.raw_os_error() {
            Some(code) if code == libc::EINTR => continue,
            Some(code) if code == libc::EACCES || code == libc::ESRCH => return Ok(()),
            _ => return Err(err),
        }
    }
}

pub fn send_continue_to_group(pgid: libc::pid_t) -> io::Result<()> {
    if pgid <= 0 {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "invalid process group id",
        ));
    }
    loop {
        let rc = unsafe { libc::kill(-pgid, libc::SIGCONT) };
        if rc == 0 {
            return Ok(());
        }
        let err = io::Error::last_os_error();
        if err.raw_os_error() == Some(libc::EINTR) {
            continue;
        }
        return Err(err);
    }
}
