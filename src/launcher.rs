//! Allocates pipes, forks each stage, assigns process groups, wires
//! descriptors, and transfers the controlling terminal for foreground
//! pipelines (spec.md §4.5).
//!
//! Forking is done manually with raw `libc` calls rather than
//! `std::process::Command` + `pre_exec`: the child must call `tcsetpgrp` on
//! the still-inherited terminal fd *before* any pipe/file descriptor is
//! duplicated onto 0/1/2, and `pre_exec` closures run after `Command`'s own
//! stdio wiring, which would make that ordering impossible to express.

use std::ffi::CString;
use std::io;
use std::os::unix::io::{IntoRawFd, RawFd};

use crate::builtins;
use crate::error::ShellError;
use crate::jobs::JobTable;
use crate::pipeline::Pipeline;
use crate::redirect::{self, ResolvedEndpoints};
use crate::signals;
use crate::status;

pub enum LaunchOutcome {
    /// Ran in-process; no job was created.
    Builtin(i32),
    Backgrounded(libc::pid_t),
    Foreground(libc::pid_t, FgOutcome),
}

pub enum FgOutcome {
    Done(status::Outcome),
    Stopped,
}

/// Launch a validated, redirect-resolved pipeline. `shell_pgid`/`terminal_fd`
/// identify the shell's own process group and controlling terminal, needed
/// to hand off and reclaim foreground ownership. `last_exit_status` is the
/// REPL's current value, passed through to the built-in dispatcher.
pub fn launch(
    mut pipeline: Pipeline,
    job_table: &mut JobTable,
    shell_pgid: libc::pid_t,
    terminal_fd: libc::c_int,
    last_exit_status: i32,
) -> Result<LaunchOutcome, ShellError> {
    if pipeline.processes.len() == 1 && builtins::is_builtin(&pipeline.processes[0].argv[0]) {
        let resolved = redirect::resolve(&pipeline.redirect)?;
        let code = with_stdio_redirected(&resolved, || {
            builtins::execute(
                &pipeline.processes[0].argv,
                job_table,
                shell_pgid,
                terminal_fd,
                last_exit_status,
            )
        });
        return Ok(LaunchOutcome::Builtin(code));
    }

    let resolved = redirect::resolve(&pipeline.redirect)?;
    let n = pipeline.processes.len();

    let mut pipes: Vec<(RawFd, RawFd)> = Vec::with_capacity(n.saturating_sub(1));
    for _ in 0..n.saturating_sub(1) {
        let (reader, writer) = os_pipe::pipe().map_err(ShellError::Spawn)?;
        pipes.push((reader.into_raw_fd(), writer.into_raw_fd()));
    }

    let mut job_pgid: Option<libc::pid_t> = None;

    for i in 0..n {
        let argv = pipeline.processes[i].argv.clone();
        let stdin_fd: RawFd = if i == 0 { resolved.stdin.fd } else { pipes[i - 1].0 };
        let stdout_fd: RawFd = if i == n - 1 { resolved.stdout.fd } else { pipes[i].1 };
        let stderr_fd: Option<RawFd> = if i == n - 1 { Some(resolved.stderr.fd) } else { None };
        let is_first = i == 0;
        let foreground = pipeline.foreground;
        let target_pgid_for_child = job_pgid.unwrap_or(0);
        let all_pipe_fds: Vec<RawFd> = pipes.iter().flat_map(|&(r, w)| [r, w]).collect();
        let owned_resolved: Vec<RawFd> = [
            (resolved.stdin.owned, resolved.stdin.fd),
            (resolved.stdout.owned, resolved.stdout.fd),
            (resolved.stderr.owned, resolved.stderr.fd),
        ]
        .into_iter()
        .filter_map(|(owned, fd)| owned.then_some(fd))
        .collect();

        let pid = unsafe { libc::fork() };
        if pid < 0 {
            return Err(ShellError::Spawn(io::Error::last_os_error()));
        }

        if pid == 0 {
            run_child(
                &argv,
                stdin_fd,
                stdout_fd,
                stderr_fd,
                is_first,
                target_pgid_for_child,
                foreground,
                terminal_fd,
                &all_pipe_fds,
                &owned_resolved,
            );
            unreachable!("run_child never returns");
        }

        if is_first {
            job_pgid = Some(pid);
            pipeline.jid = Some(pid);
        }
        let pgid = job_pgid.expect("first stage always sets job_pgid before later stages fork");
        let _ = signals::set_process_group(pid, pgid);
        pipeline.processes[i].pid = Some(pid);
        pipeline.processes[i].pgid = Some(pgid);

        if i > 0 {
            unsafe {
                libc::close(pipes[i - 1].0);
                libc::close(pipes[i - 1].1);
            }
        }
    }

    resolved.close_owned();

    let jid = pipeline.jid.expect("multi-stage launch always sets jid");
    let foreground = pipeline.foreground;
    job_table.insert(pipeline);

    if foreground {
        let outcome = put_in_foreground(job_table, jid, false, shell_pgid, terminal_fd)?;
        Ok(LaunchOutcome::Foreground(jid, outcome))
    } else {
        Ok(LaunchOutcome::Backgrounded(jid))
    }
}

/// Child-side half of the fork: reset signals, join the process group,
/// take the terminal if this pipeline is foreground, wire descriptors onto
/// 0/1/2, close everything else, and `execvp`. Never returns.
#[allow(clippy::too_many_arguments)]
fn run_child(
    argv: &[String],
    stdin_fd: RawFd,
    stdout_fd: RawFd,
    stderr_fd: Option<RawFd>,
    is_first: bool,
    target_pgid: libc::pid_t,
    foreground: bool,
    terminal_fd: libc::c_int,
    all_pipe_fds: &[RawFd],
    owned_resolved: &[RawFd],
) -> ! {
    signals::reset_child_dispositions();

    let self_pgid = if is_first { unsafe { libc::getpid() } } else { target_pgid };
    unsafe {
        libc::setpgid(0, if is_first { 0 } else { target_pgid });
    }

    if foreground {
        unsafe {
            libc::tcsetpgrp(terminal_fd, self_pgid);
        }
    }

    unsafe {
        if stdin_fd != libc::STDIN_FILENO {
            libc::dup2(stdin_fd, libc::STDIN_FILENO);
        }
        if stdout_fd != libc::STDOUT_FILENO {
            libc::dup2(stdout_fd, libc::STDOUT_FILENO);
        }
        if let Some(fd) = stderr_fd {
            if fd != libc::STDERR_FILENO {
                libc::dup2(fd, libc::STDERR_FILENO);
            }
        }

        for &fd in all_pipe_fds {
            libc::close(fd);
        }
        for &fd in owned_resolved {
            libc::close(fd);
        }
    }

    let program = argv.first().cloned().unwrap_or_default();
    let c_argv: Vec<CString> = argv
        .iter()
        .map(|s| CString::new(s.as_str()).unwrap_or_else(|_| CString::new("").unwrap()))
        .collect();
    let mut c_ptrs: Vec<*const libc::c_char> = c_argv.iter().map(|c| c.as_ptr()).collect();
    c_ptrs.push(std::ptr::null());

    unsafe {
        libc::execvp(c_ptrs[0], c_ptrs.as_ptr());
    }

    println!("{program}: command not found");
    unsafe {
        libc::_exit(1);
    }
}

/// Hand the terminal to `jid`'s process group, optionally send `SIGCONT`,
/// and block on its last stage until it exits, is signaled, or stops.
/// Terminal ownership is restored to `shell_pgid` on every path.
pub fn put_in_foreground(
    job_table: &mut JobTable,
    jid: libc::pid_t,
    send_cont: bool,
    shell_pgid: libc::pid_t,
    terminal_fd: libc::c_int,
) -> Result<FgOutcome, ShellError> {
    signals::set_terminal_foreground(terminal_fd, jid).map_err(ShellError::Spawn)?;
    if send_cont {
        let _ = signals::send_continue_to_group(jid);
    }

    let pid = job_table
        .get(jid)
        .and_then(|j| j.last_stage().pid)
        .expect("jid must name a launched job");

    let result = loop {
        let mut raw_status: libc::c_int = 0;
        let rc = unsafe { libc::waitpid(pid, &mut raw_status, libc::WUNTRACED) };
        if rc < 0 {
            let err = io::Error::last_os_error();
            if err.raw_os_error() == Some(libc::EINTR) {
                continue;
            }
            break Err(ShellError::Spawn(err));
        }

        if status::stopped(raw_status) {
            if let Some(job) = job_table.get_mut(jid) {
                job.last_stage_mut().stopped = true;
            }
            break Ok(FgOutcome::Stopped);
        }

        if let Some(outcome) = status::outcome_from_wait_status(raw_status) {
            if let Some(job) = job_table.get_mut(jid) {
                job.last_stage_mut().completed = true;
            }
            job_table.remove(jid);
            break Ok(FgOutcome::Done(outcome));
        }
    };

    let _ = signals::set_terminal_foreground(terminal_fd, shell_pgid);
    result
}

/// Resume a background job without waiting for it.
pub fn put_in_background(jid: libc::pid_t, send_cont: bool) -> Result<(), ShellError> {
    if send_cont {
        signals::send_continue_to_group(jid).map_err(ShellError::Spawn)?;
    }
    Ok(())
}

/// Dup the resolved redirects onto the shell's own stdio for the duration
/// of `f`, then restore. Used by the built-in short-circuit, which never
/// forks.
fn with_stdio_redirected<F: FnOnce() -> i32>(resolved: &ResolvedEndpoints, f: F) -> i32 {
    let saved_in = unsafe { libc::dup(libc::STDIN_FILENO) };
    let saved_out = unsafe { libc::dup(libc::STDOUT_FILENO) };
    let saved_err = unsafe { libc::dup(libc::STDERR_FILENO) };

    unsafe {
        if resolved.stdin.owned {
            libc::dup2(resolved.stdin.fd, libc::STDIN_FILENO);
        }
        if resolved.stdout.owned {
            libc::dup2(resolved.stdout.fd, libc::STDOUT_FILENO);
        }
        if resolved.stderr.owned {
            libc::dup2(resolved.stderr.fd, libc::STDERR_FILENO);
        }
    }
    resolved.close_owned();

    let code = f();

    unsafe {
        libc::dup2(saved_in, libc::STDIN_FILENO);
        libc::dup2(saved_out, libc::STDOUT_FILENO);
        libc::dup2(saved_err, libc::STDERR_FILENO);
        libc::close(saved_in);
        libc::close(saved_out);
        libc::close(saved_err);
    }

    code
}
