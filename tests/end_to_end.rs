use std::io::Write;
use std::process::{Command, Output, Stdio};

fn run_shell(lines: &[&str]) -> Output {
    let mut child = Command::new(env!("CARGO_BIN_EXE_posh"))
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("failed to spawn posh");

    {
        let stdin = child.stdin.as_mut().expect("stdin piped");
        for line in lines {
            writeln!(stdin, "{line}").unwrap();
        }
        writeln!(stdin, "exit").unwrap();
    }

    child.wait_with_output().expect("failed to wait on posh")
}

#[test]
fn echo_hello_prints_and_exits_zero() {
    let output = run_shell(&["echo hello"]);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("hello\n"));
}

#[test]
fn unknown_command_reports_not_found() {
    let output = run_shell(&["no_such_cmd_xyz"]);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("no_such_cmd_xyz: command not found"));
}

#[test]
fn quoted_pipe_character_is_literal() {
    let output = run_shell(&[r#"echo "a | b" | cat"#]);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("a | b\n"));
}

#[test]
fn empty_line_launches_nothing_and_shell_continues() {
    let output = run_shell(&["", "echo still-alive"]);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("still-alive\n"));
}

#[test]
fn invalid_leading_pipe_reports_syntax_error_and_continues() {
    let output = run_shell(&["| cat", "echo recovered"]);
    let stderr = String::from_utf8_lossy(&output.stderr);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stderr.contains("Invalid command syntax"));
    assert!(stdout.contains("recovered\n"));
}

#[test]
fn sixteen_stage_pipeline_passes_bytes_through_unmodified() {
    let cats = vec!["cat"; 14].join(" | ");
    let line = format!("printf 'hello\\n' | {cats} | wc -l");
    let output = run_shell(&[&line]);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains('1'));
}

#[test]
fn background_job_reported_running_in_jobs_listing() {
    let output = run_shell(&["sleep 2 &", "jobs"]);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Running"));
    assert!(stdout.contains("sleep 2 &"));
}

#[test]
fn help_prints_fixed_usage_blurb() {
    let output = run_shell(&["help"]);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Built-ins:"));
}

#[test]
fn bare_exit_defaults_to_last_exit_status() {
    // `run_shell` always appends a bare trailing `exit`; a preceding
    // failing command must make that `exit` terminate with the same code.
    let output = run_shell(&["no_such_cmd_xyz"]);
    assert_eq!(output.status.code(), Some(1));
}
