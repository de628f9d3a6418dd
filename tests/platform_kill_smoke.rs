use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use taskpulse::system::command::{CommandDispatcher, CommandOutcome, PriorityLevel};

fn spawn_long_lived_child() -> Child {
    #[cfg(windows)]
    let mut cmd = {
        let mut c = Command::new("powershell");
        c.args([
            "-NoProfile",
            "-NonInteractive",
            "-Command",
            "Start-Sleep -Seconds 30",
        ]);
        c
    };

    #[cfg(not(windows))]
    let mut cmd = {
        let mut c = Command::new("sleep");
        c.arg("30");
        c
    };

    cmd.stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .expect("failed to spawn child process")
}

fn wait_for_exit(child: &mut Child, timeout: Duration) {
    let deadline = Instant::now() + timeout;
    loop {
        match child.try_wait() {
            Ok(Some(_)) => return,
            Ok(None) if Instant::now() < deadline => thread::sleep(Duration::from_millis(50)),
            Ok(None) => {
                let _ = child.kill();
                panic!("child process did not exit before timeout");
            }
            Err(err) => {
                let _ = child.kill();
                panic!("failed waiting for child exit: {err}");
            }
        }
    }
}

#[test]
fn terminate_nonexistent_pid_returns_not_found() {
    let dispatcher = CommandDispatcher::new();
    assert_eq!(
        dispatcher.signal_terminate(i32::MAX as u32),
        CommandOutcome::NotFound
    );
    assert_eq!(dispatcher.signal_terminate(u32::MAX), CommandOutcome::NotFound);
}

#[test]
fn terminate_spawned_child() {
    let mut child = spawn_long_lived_child();
    let dispatcher = CommandDispatcher::new();

    let outcome = dispatcher.signal_terminate(child.id());
    if outcome != CommandOutcome::Success {
        let _ = child.kill();
        panic!("terminate reported {outcome:?}");
    }
    wait_for_exit(&mut child, Duration::from_secs(5));
}

#[test]
fn repeated_kill_of_exited_child_never_crashes() {
    let mut child = spawn_long_lived_child();
    let pid = child.id();
    let dispatcher = CommandDispatcher::new();

    assert_eq!(dispatcher.signal_kill(pid), CommandOutcome::Success);
    wait_for_exit(&mut child, Duration::from_secs(5));

    for _ in 0..2 {
        let outcome = dispatcher.signal_kill(pid);
        assert!(
            matches!(outcome, CommandOutcome::Success | CommandOutcome::NotFound),
            "unexpected outcome {outcome:?}"
        );
    }
}

#[test]
fn lowering_own_child_priority_succeeds() {
    let mut child = spawn_long_lived_child();
    let outcome = CommandDispatcher::new().set_priority(child.id(), PriorityLevel::Low);
    let _ = child.kill();
    let _ = child.wait();
    assert_eq!(outcome, CommandOutcome::Success);
}

#[test]
fn spawn_launches_detached_command() {
    let outcome = CommandDispatcher::new().spawn(if cfg!(windows) { "exit 0" } else { "true" });
    assert_eq!(outcome, CommandOutcome::Success);
}
