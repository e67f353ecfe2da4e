//! The Job Table: owns every active `Pipeline`, polls child state with
//! non-blocking waits, and prints the status-line transitions of
//! spec.md §4.6/§6.

use std::collections::HashMap;
use std::io;

use crate::pipeline::Pipeline;
use crate::status;

/// Active jobs keyed by `jid`. A slot becomes empty when a job completes;
/// callers iterating must tolerate the table shrinking mid-iteration.
#[derive(Default)]
pub struct JobTable {
    jobs: HashMap<libc::pid_t, Pipeline>,
}

impl JobTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, job: Pipeline) {
        let jid = job.jid.expect("job must have a jid before insertion");
        self.jobs.insert(jid, job);
    }

    pub fn get(&self, jid: libc::pid_t) -> Option<&Pipeline> {
        self.jobs.get(&jid)
    }

    pub fn get_mut(&mut self, jid: libc::pid_t) -> Option<&mut Pipeline> {
        self.jobs.get_mut(&jid)
    }

    pub fn remove(&mut self, jid: libc::pid_t) -> Option<Pipeline> {
        self.jobs.remove(&jid)
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    /// Jobs sorted by `jid`, for a stable `jobs` listing.
    pub fn jobs_sorted(&self) -> Vec<&Pipeline> {
        let mut jobs: Vec<&Pipeline> = self.jobs.values().collect();
        jobs.sort_by_key(|j| j.jid);
        jobs
    }

    /// Poll every live job's last stage with a non-blocking wait, updating
    /// status and printing the four transition lines of spec.md §6. Returns
    /// the `last_exit_status` update, if any job exited or was signaled
    /// during this poll (the most recent one wins, matching a REPL that
    /// only tracks a single `last_exit_status` scalar).
    pub fn poll(&mut self) -> io::Result<Option<i32>> {
        let mut last_exit_status = None;
        let jids: Vec<libc::pid_t> = self.jobs.keys().copied().collect();

        for jid in jids {
            loop {
                let Some(job) = self.jobs.get_mut(&jid) else {
                    break;
                };
                let pid = job.last_stage().pid.expect("launched job has a pid");

                let mut raw_status: libc::c_int = 0;
                let rc = unsafe {
                    libc::waitpid(
                        pid,
                        &mut raw_status,
                        libc::WNOHANG | libc::WUNTRACED | libc::WCONTINUED,
                    )
                };

                if rc == 0 {
                    break;
                }
                if rc < 0 {
                    let err = io::Error::last_os_error();
                    if err.raw_os_error() == Some(libc::EINTR) {
                        continue;
                    }
                    break;
                }

                if status::stopped(raw_status) {
                    job.last_stage_mut().stopped = true;
                    println!("{jid} Stopped {}", job.raw_input);
                    break;
                }

                if status::continued(raw_status) {
                    job.last_stage_mut().stopped = false;
                    println!("{jid} Continued {}", job.raw_input);
                    continue;
                }

                if let Some(outcome) = status::outcome_from_wait_status(raw_status) {
                    job.last_stage_mut().completed = true;
                    println!("{jid} Exited ({}) {}", outcome.display_label(), job.raw_input);
                    last_exit_status = Some(outcome.last_exit_status());
                    self.jobs.remove(&jid);
                    break;
                }
            }
        }

        Ok(last_exit_status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::{Process, RedirectSpec};

    fn job_with_pid(pid: libc::pid_t) -> Pipeline {
        Pipeline {
            jid: Some(pid),
            foreground: false,
            raw_input: "sleep 1 &".into(),
            processes: vec![Process {
                argv: vec!["sleep".into(), "1".into()],
                pid: Some(pid),
                pgid: Some(pid),
                has_pipe: false,
                stopped: false,
                completed: false,
            }],
            redirect: RedirectSpec::default(),
        }
    }

    #[test]
    fn insert_and_get_round_trip() {
        let mut table = JobTable::new();
        table.insert(job_with_pid(4242));
        assert!(table.get(4242).is_some());
        assert_eq!(table.jobs_sorted().len(), 1);
    }

    #[test]
    fn remove_empties_table() {
        let mut table = JobTable::new();
        table.insert(job_with_pid(4242));
        table.remove(4242);
        assert!(table.is_empty());
    }

    #[test]
    fn jobs_sorted_orders_by_jid() {
        let mut table = JobTable::new();
        table.insert(job_with_pid(500));
        table.insert(job_with_pid(100));
        let sorted = table.jobs_sorted();
        assert_eq!(sorted[0].jid, Some(100));
        assert_eq!(sorted[1].jid, Some(500));
    }

    /// Spawns a real child, stops it with `SIGSTOP`, and drives it through
    /// `poll()` to cover the Stopped/Continued/Exited transitions end to
    /// end against the actual `waitpid` semantics.
    #[test]
    fn poll_reports_stopped_continued_and_exited() {
        let mut child = std::process::Command::new("sleep")
            .arg("5")
            .spawn()
            .expect("failed to spawn sleep");
        let pid = child.id() as libc::pid_t;

        let mut table = JobTable::new();
        table.insert(job_with_pid(pid));

        unsafe {
            libc::kill(pid, libc::SIGSTOP);
        }
        // Give the signal a moment to land before polling.
        std::thread::sleep(std::time::Duration::from_millis(200));
        table.poll().unwrap();
        assert_eq!(table.get(pid).unwrap().status(), crate::pipeline::JobStatus::Stopped);

        unsafe {
            libc::kill(pid, libc::SIGCONT);
        }
        std::thread::sleep(std::time::Duration::from_millis(200));
        table.poll().unwrap();
        assert_eq!(table.get(pid).unwrap().status(), crate::pipeline::JobStatus::Running);

        unsafe {
            libc::kill(pid, libc::SIGTERM);
        }
        std::thread::sleep(std::time::Duration::from_millis(200));
        table.poll().unwrap();
        assert!(table.get(pid).is_none());

        let _ = child.wait();
    }
}
