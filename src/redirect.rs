//! Opens/creates the files a `Pipeline`'s `RedirectSpec` names, producing
//! descriptors ready to be wired onto a stage's stdio (spec.md §4.4).

use std::ffi::CString;
use std::io;
use std::os::unix::io::RawFd;

use crate::error::ShellError;
use crate::pipeline::{OutputSink, RedirectMode, RedirectSpec, StdinSource};

/// A resolved descriptor plus whether it was freshly opened (and so must be
/// closed by the launcher once every stage has inherited it) or is simply
/// the shell's own inherited standard stream (left alone).
pub struct Resolved {
    pub fd: RawFd,
    pub owned: bool,
}

pub struct ResolvedEndpoints {
    pub stdin: Resolved,
    pub stdout: Resolved,
    pub stderr: Resolved,
}

impl ResolvedEndpoints {
    /// Close every descriptor this struct owns. Safe to call more than
    /// once; closing an already-closed fd is ignored.
    pub fn close_owned(&self) {
        for r in [&self.stdin, &self.stdout, &self.stderr] {
            if r.owned {
                unsafe {
                    libc::close(r.fd);
                }
            }
        }
    }
}

fn open_for_read(path: &str) -> Result<RawFd, ShellError> {
    let c_path =
        CString::new(path).map_err(|_| ShellError::RedirectOpen(format!("{path}: invalid path")))?;
    let fd = unsafe { libc::open(c_path.as_ptr(), libc::O_RDONLY) };
    if fd < 0 {
        let err = io::Error::last_os_error();
        return Err(ShellError::RedirectOpen(format!("{path}: {err}")));
    }
    Ok(fd)
}

fn open_for_write(path: &str, mode: RedirectMode) -> Result<RawFd, ShellError> {
    let c_path =
        CString::new(path).map_err(|_| ShellError::RedirectOpen(format!("{path}: invalid path")))?;
    let (flags, perm): (libc::c_int, libc::mode_t) = match mode {
        RedirectMode::Truncate => (libc::O_WRONLY | libc::O_CREAT | libc::O_TRUNC, 0o644),
        RedirectMode::Append => (libc::O_WRONLY | libc::O_CREAT | libc::O_APPEND, 0o666),
    };
    let fd = unsafe { libc::open(c_path.as_ptr(), flags, perm as libc::c_uint) };
    if fd < 0 {
        let err = io::Error::last_os_error();
        return Err(ShellError::RedirectOpen(format!("{path}: {err}")));
    }
    Ok(fd)
}

/// Resolve a `RedirectSpec` into concrete descriptors. Resolution happens
/// before any `fork`, so a failure here aborts the launch with no children
/// created.
pub fn resolve(spec: &RedirectSpec) -> Result<ResolvedEndpoints, ShellError> {
    let stdin = match &spec.stdin {
        StdinSource::Default => Resolved {
            fd: libc::STDIN_FILENO,
            owned: false,
        },
        StdinSource::File(path) => Resolved {
            fd: open_for_read(path)?,
            owned: true,
        },
    };

    let stdout = match &spec.stdout {
        OutputSink::Default => Resolved {
            fd: libc::STDOUT_FILENO,
            owned: false,
        },
        OutputSink::File(path, mode) => Resolved {
            fd: open_for_write(path, *mode)?,
            owned: true,
        },
    };

    let stderr = match &spec.stderr {
        OutputSink::Default => Resolved {
            fd: libc::STDERR_FILENO,
            owned: false,
        },
        OutputSink::File(path, mode) => Resolved {
            fd: open_for_write(path, *mode)?,
            owned: true,
        },
    };

    Ok(ResolvedEndpoints { stdin, stdout, stderr })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    #[test]
    fn missing_input_file_is_redirect_open_error() {
        let spec = RedirectSpec {
            stdin: StdinSource::File("/nonexistent/posh-test-missing".into()),
            ..Default::default()
        };
        let err = resolve(&spec).unwrap_err();
        assert!(matches!(err, ShellError::RedirectOpen(_)));
    }

    #[test]
    fn truncate_creates_and_writes_file() {
        let dir = std::env::temp_dir();
        let path = dir.join(format!("posh-test-{}", std::process::id()));
        std::fs::write(&path, b"old contents").unwrap();

        let spec = RedirectSpec {
            stdout: OutputSink::File(path.to_str().unwrap().into(), RedirectMode::Truncate),
            ..Default::default()
        };
        let resolved = resolve(&spec).unwrap();
        unsafe {
            libc::write(resolved.stdout.fd, b"hi".as_ptr() as *const _, 2);
        }
        resolved.close_owned();

        let mut contents = String::new();
        std::fs::File::open(&path)
            .unwrap()
            .read_to_string(&mut contents)
            .unwrap();
        assert_eq!(contents, "hi");
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn default_sink_is_not_owned() {
        let spec = RedirectSpec::default();
        let resolved = resolve(&spec).unwrap();
        assert!(!resolved.stdin.owned);
        assert!(!resolved.stdout.owned);
        assert!(!resolved.stderr.owned);
    }
}
