//! Running one external program with captured output and cancellation.

use std::io::Read;
use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::cancel::CancelToken;
use crate::collab::{Invocation, InvocationError};

const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Runs `argv` in `cwd` and waits for it, killing it if `cancel` is raised.
///
/// Stdout and stderr are drained on background threads so a chatty tool
/// cannot block on a full pipe while the caller polls for exit.
pub fn run_process(
    argv: &[String],
    cwd: &Path,
    cancel: &CancelToken,
) -> Result<Invocation, InvocationError> {
    let (program, args) = argv
        .split_first()
        .ok_or_else(|| InvocationError::Io(std::io::Error::other("empty command line")))?;

    if cancel.is_cancelled() {
        return Err(InvocationError::Cancelled);
    }

    let mut command = Command::new(program);
    command
        .args(args)
        .current_dir(cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    own_process_group(&mut command);
    let mut child = command.spawn().map_err(InvocationError::Io)?;

    let stdout = drain(child.stdout.take());
    let stderr = drain(child.stderr.take());

    let status = loop {
        // Reader threads are detached on the early returns: grandchildren
        // of a killed shell may still hold the pipes open.
        if cancel.is_cancelled() {
            kill(&mut child, program);
            return Err(InvocationError::Cancelled);
        }
        match child.try_wait() {
            Ok(Some(status)) => break status,
            Ok(None) => thread::sleep(POLL_INTERVAL),
            Err(e) => {
                kill(&mut child, program);
                return Err(InvocationError::Io(e));
            }
        }
    };

    Ok(Invocation {
        exit_code: status.code(),
        stdout: collect(stdout),
        stderr: collect(stderr),
    })
}

/// Puts the child at the head of a new process group, so that cancelling it
/// also reaches whatever it spawned (a wrapper shell's yosys, for example).
#[cfg(unix)]
fn own_process_group(command: &mut Command) {
    use std::os::unix::process::CommandExt;
    command.process_group(0);
}

#[cfg(not(unix))]
fn own_process_group(_command: &mut Command) {}

fn kill(child: &mut Child, program: &str) {
    tracing::info!(program, pid = child.id(), "terminating external program");
    if let Err(e) = kill_tree(child) {
        tracing::warn!(program, error = %e, "failed to kill external program");
    }
    let _ = child.wait();
}

#[cfg(unix)]
fn kill_tree(child: &mut Child) -> std::io::Result<()> {
    let pgid = libc::pid_t::try_from(child.id()).map_err(std::io::Error::other)?;
    // SAFETY: `kill` takes no pointers; a negative pid addresses the group
    // created for this child in `own_process_group`.
    if unsafe { libc::kill(-pgid, libc::SIGKILL) } == 0 {
        Ok(())
    } else {
        child.kill()
    }
}

#[cfg(not(unix))]
fn kill_tree(child: &mut Child) -> std::io::Result<()> {
    child.kill()
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> Option<JoinHandle<Vec<u8>>> {
    pipe.map(|mut pipe| {
        thread::spawn(move || {
            let mut buf = Vec::new();
            let _ = pipe.read_to_end(&mut buf);
            buf
        })
    })
}

fn collect(handle: Option<JoinHandle<Vec<u8>>>) -> String {
    handle
        .and_then(|h| h.join().ok())
        .map(|buf| String::from_utf8_lossy(&buf).into_owned())
        .unwrap_or_default()
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::time::Instant;

    fn sh(script: &str) -> Vec<String> {
        vec!["sh".to_string(), "-c".to_string(), script.to_string()]
    }

    #[test]
    fn captures_exit_code_and_streams() {
        let dir = tempfile::tempdir().unwrap();
        let out = run_process(
            &sh("echo out; echo err >&2; exit 3"),
            dir.path(),
            &CancelToken::new(),
        )
        .unwrap();
        assert_eq!(out.exit_code, Some(3));
        assert_eq!(out.stdout.trim(), "out");
        assert_eq!(out.stderr.trim(), "err");
        assert!(!out.success());
    }

    #[test]
    fn runs_in_working_directory() {
        let dir = tempfile::tempdir().unwrap();
        let out = run_process(&sh("touch marker"), dir.path(), &CancelToken::new()).unwrap();
        assert!(out.success());
        assert!(dir.path().join("marker").is_file());
    }

    #[test]
    fn missing_program_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let argv = vec!["forge-test-no-such-program".to_string()];
        let err = run_process(&argv, dir.path(), &CancelToken::new()).unwrap_err();
        assert!(matches!(err, InvocationError::Io(_)));
    }

    #[test]
    fn cancel_kills_running_process() {
        let dir = tempfile::tempdir().unwrap();
        let token = CancelToken::new();
        let trigger = token.clone();
        let canceller = thread::spawn(move || {
            thread::sleep(Duration::from_millis(200));
            trigger.cancel();
        });

        let started = Instant::now();
        let err = run_process(&sh("sleep 30"), dir.path(), &token).unwrap_err();
        canceller.join().unwrap();
        assert!(matches!(err, InvocationError::Cancelled));
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[test]
    fn cancel_kills_grandchildren() {
        let dir = tempfile::tempdir().unwrap();
        let token = CancelToken::new();
        let trigger = token.clone();
        let canceller = thread::spawn(move || {
            thread::sleep(Duration::from_millis(200));
            trigger.cancel();
        });

        let err = run_process(
            &sh("(sleep 1; touch survived) & wait"),
            dir.path(),
            &token,
        )
        .unwrap_err();
        canceller.join().unwrap();
        assert!(matches!(err, InvocationError::Cancelled));

        thread::sleep(Duration::from_millis(1500));
        assert!(!dir.path().join("survived").exists());
    }

    #[test]
    fn already_cancelled_never_spawns() {
        let dir = tempfile::tempdir().unwrap();
        let token = CancelToken::new();
        token.cancel();
        let err = run_process(&sh("touch marker"), dir.path(), &token).unwrap_err();
        assert!(matches!(err, InvocationError::Cancelled));
        assert!(!dir.path().join("marker").exists());
    }
}
