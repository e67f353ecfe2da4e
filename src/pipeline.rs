//! The `Pipeline`/`Process` data model (spec.md §3) and the builder that
//! folds a token sequence into one.

use crate::error::ShellError;
use crate::tokenizer::Token;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedirectMode {
    Truncate,
    Append,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum StdinSource {
    #[default]
    Default,
    File(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum OutputSink {
    #[default]
    Default,
    File(String, RedirectMode),
}

/// The pipeline-wide redirection spec: at most one target per stream,
/// applying to the first stage (stdin) or last stage (stdout/stderr) only.
#[derive(Debug, Clone, Default)]
pub struct RedirectSpec {
    pub stdin: StdinSource,
    pub stdout: OutputSink,
    pub stderr: OutputSink,
}

/// One stage of a pipeline: a single forked (or builtin-dispatched) command.
#[derive(Debug, Clone)]
pub struct Process {
    pub argv: Vec<String>,
    pub pid: Option<libc::pid_t>,
    pub pgid: Option<libc::pid_t>,
    pub has_pipe: bool,
    pub stopped: bool,
    pub completed: bool,
}

impl Process {
    fn new(argv: Vec<String>, has_pipe: bool) -> Self {
        Process {
            argv,
            pid: None,
            pgid: None,
            has_pipe,
            stopped: false,
            completed: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Running,
    Stopped,
    Done,
}

/// A user-entered command line as a unit: one or more processes connected
/// by pipes, launched under one process group.
#[derive(Debug, Clone)]
pub struct Pipeline {
    pub jid: Option<libc::pid_t>,
    pub foreground: bool,
    pub raw_input: String,
    pub processes: Vec<Process>,
    pub redirect: RedirectSpec,
}

impl Pipeline {
    /// Derived job status per spec.md §3's invariant: `Done` iff every
    /// process is completed; `Stopped` iff every process is completed or
    /// stopped and at least one is stopped; otherwise `Running`.
    pub fn status(&self) -> JobStatus {
        if self.processes.iter().all(|p| p.completed) {
            return JobStatus::Done;
        }
        let all_settled = self.processes.iter().all(|p| p.completed || p.stopped);
        let any_stopped = self.processes.iter().any(|p| p.stopped);
        if all_settled && any_stopped {
            JobStatus::Stopped
        } else {
            JobStatus::Running
        }
    }

    pub fn last_stage(&self) -> &Process {
        self.processes.last().expect("pipeline has at least one process")
    }

    pub fn last_stage_mut(&mut self) -> &mut Process {
        self.processes.last_mut().expect("pipeline has at least one process")
    }
}

/// Fold a token sequence into a `Pipeline`. `raw_input` is the original
/// trimmed line, stored verbatim for the `jobs` listing.
///
/// Callers are expected to have already run [`crate::validator::validate`]
/// over `tokens`; this function still rejects a leading `|` and duplicate
/// redirections of the same stream, since a caller building a `Pipeline`
/// directly (e.g. in tests) should not be able to skip those checks.
pub fn build(tokens: &[Token], raw_input: String) -> Result<Pipeline, ShellError> {
    let mut tokens = tokens;
    let mut foreground = true;
    if let Some(Token::Amp) = tokens.last() {
        foreground = false;
        tokens = &tokens[..tokens.len() - 1];
    }

    if matches!(tokens.first(), Some(Token::Pipe)) {
        return Err(ShellError::Parse);
    }
    if tokens.iter().any(|t| matches!(t, Token::Amp)) {
        return Err(ShellError::Parse);
    }

    let mut redirect = RedirectSpec::default();
    let mut saw_stdin = false;
    let mut saw_stdout = false;
    let mut saw_stderr = false;

    let mut stages: Vec<Vec<String>> = vec![Vec::new()];
    let mut iter = tokens.iter().peekable();
    while let Some(token) = iter.next() {
        match token {
            Token::Pipe => stages.push(Vec::new()),
            Token::Word(w) => stages.last_mut().unwrap().push(w.clone()),
            Token::Amp => unreachable!("trailing & already stripped"),
            Token::Lt | Token::Gt | Token::GtGt | Token::EGt | Token::EGtGt => {
                let operand = match iter.next() {
                    Some(Token::Word(w)) => w.clone(),
                    _ => return Err(ShellError::Parse),
                };
                match token {
                    Token::Lt => {
                        if saw_stdin {
                            return Err(ShellError::Parse);
                        }
                        saw_stdin = true;
                        redirect.stdin = StdinSource::File(operand);
                    }
                    Token::Gt => {
                        if saw_stdout {
                            return Err(ShellError::Parse);
                        }
                        saw_stdout = true;
                        redirect.stdout = OutputSink::File(operand, RedirectMode::Truncate);
                    }
                    Token::GtGt => {
                        if saw_stdout {
                            return Err(ShellError::Parse);
                        }
                        saw_stdout = true;
                        redirect.stdout = OutputSink::File(operand, RedirectMode::Append);
                    }
                    Token::EGt => {
                        if saw_stderr {
                            return Err(ShellError::Parse);
                        }
                        saw_stderr = true;
                        redirect.stderr = OutputSink::File(operand, RedirectMode::Truncate);
                    }
                    Token::EGtGt => {
                        if saw_stderr {
                            return Err(ShellError::Parse);
                        }
                        saw_stderr = true;
                        redirect.stderr = OutputSink::File(operand, RedirectMode::Append);
                    }
                    _ => unreachable!(),
                }
            }
        }
    }

    if stages.iter().any(Vec::is_empty) {
        return Err(ShellError::Parse);
    }

    let n = stages.len();
    let processes = stages
        .into_iter()
        .enumerate()
        .map(|(i, argv)| Process::new(argv, i < n - 1))
        .collect();

    Ok(Pipeline {
        jid: None,
        foreground,
        raw_input,
        processes,
        redirect,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokenizer::tokenize;

    fn build_line(line: &str) -> Pipeline {
        build(&tokenize(line), line.to_string()).unwrap()
    }

    #[test]
    fn single_stage_has_no_pipe() {
        let p = build_line("echo hi");
        assert_eq!(p.processes.len(), 1);
        assert!(!p.processes[0].has_pipe);
        assert_eq!(p.processes[0].argv, vec!["echo", "hi"]);
    }

    #[test]
    fn pipeline_marks_all_but_last_has_pipe() {
        let p = build_line("a | b | c");
        assert_eq!(p.processes.len(), 3);
        assert!(p.processes[0].has_pipe);
        assert!(p.processes[1].has_pipe);
        assert!(!p.processes[2].has_pipe);
    }

    #[test]
    fn trailing_amp_sets_background() {
        let p = build_line("sleep 5 &");
        assert!(!p.foreground);
        assert_eq!(p.processes[0].argv, vec!["sleep", "5"]);
    }

    #[test]
    fn redirection_operands_are_not_appended_to_argv() {
        let p = build_line("cat < in.txt > out.txt e> err.txt");
        assert_eq!(p.processes[0].argv, vec!["cat"]);
        assert_eq!(p.redirect.stdin, StdinSource::File("in.txt".into()));
        assert_eq!(
            p.redirect.stdout,
            OutputSink::File("out.txt".into(), RedirectMode::Truncate)
        );
        assert_eq!(
            p.redirect.stderr,
            OutputSink::File("err.txt".into(), RedirectMode::Truncate)
        );
    }

    #[test]
    fn leading_pipe_is_an_error() {
        let tokens = tokenize("| cat");
        assert!(build(&tokens, "| cat".into()).is_err());
    }

    #[test]
    fn duplicate_stdout_redirection_is_an_error() {
        let tokens = tokenize("cat > a > b");
        assert!(build(&tokens, "cat > a > b".into()).is_err());
    }

    #[test]
    fn middle_stage_redirection_is_accepted_and_stored() {
        let p = build_line("a > mid.txt | b");
        assert_eq!(p.processes[0].argv, vec!["a"]);
        assert_eq!(
            p.redirect.stdout,
            OutputSink::File("mid.txt".into(), RedirectMode::Truncate)
        );
    }

    #[test]
    fn status_done_when_all_completed() {
        let mut p = build_line("echo hi");
        p.processes[0].completed = true;
        assert_eq!(p.status(), JobStatus::Done);
    }

    #[test]
    fn status_stopped_when_any_stopped_and_rest_settled() {
        let mut p = build_line("a | b");
        p.processes[0].completed = true;
        p.processes[1].stopped = true;
        assert_eq!(p.status(), JobStatus::Stopped);
    }

    #[test]
    fn status_running_otherwise() {
        let p = build_line("echo hi");
        assert_eq!(p.status(), JobStatus::Running);
    }
}
