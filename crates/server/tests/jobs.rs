//! Job output, watching, and termination

mod common;

use common::{TestServer, TestServerBuilder};
use std::time::{Duration, Instant};

#[test]
fn test_job_output_then_exit() {
    let server = TestServer::start();
    let mut client = server.connect();

    let pid = client.run_job("echo hello   world");
    assert_eq!(client.expect_line(), format!("[JOB {pid}] hello world"));
    assert_eq!(
        client.expect_line(),
        format!("[JOB {pid}] Exited with status 0")
    );
}

#[test]
fn test_exit_status_is_reported() {
    let server = TestServer::start();
    let mut client = server.connect();

    let pid = client.run_job("exit3");
    assert_eq!(
        client.expect_line(),
        format!("[JOB {pid}] Exited with status 3")
    );

    client.send("list-jobs");
    assert_eq!(client.expect_line(), "[SERVER] No currently running jobs");
}

#[test]
fn test_stderr_has_its_own_prefix() {
    let server = TestServer::start();
    let mut client = server.connect();

    let pid = client.run_job("errecho oops");
    assert_eq!(client.expect_line(), format!("*(JOB {pid})* oops"));
    client.expect_containing(&format!("[JOB {pid}] Exited with status 0"));
}

#[test]
fn test_unterminated_output_is_delivered_before_exit() {
    let server = TestServer::start();
    let mut client = server.connect();

    let pid = client.run_job("partial");
    assert_eq!(client.expect_line(), format!("[JOB {pid}] no newline"));
    assert_eq!(
        client.expect_line(),
        format!("[JOB {pid}] Exited with status 0")
    );
}

#[test]
fn test_overlong_output_line_aborts_job() {
    let server = TestServerBuilder::new().buffer_capacity(128).start();
    let mut client = server.connect();

    let pid = client.run_job("flood");
    assert_eq!(
        client.expect_line(),
        format!("*(SERVER)* Buffer from job {pid} is full. Aborting job.")
    );
    assert_eq!(
        client.expect_line(),
        format!("[JOB {pid}] Exited due to signal")
    );
}

#[test]
fn test_background_writer_does_not_stall_server() {
    let server = TestServer::start();
    let mut owner = server.connect();
    let mut other = server.connect();

    // The job exits after 200ms while its `yes` keeps the pipes busy
    let pid = owner.run_job("spewer");
    std::thread::sleep(Duration::from_millis(600));

    let started = Instant::now();
    other.send("list-jobs");
    let reply = other.expect_line();
    assert!(
        started.elapsed() < Duration::from_secs(2),
        "reply took {:?}",
        started.elapsed()
    );
    assert!(reply.starts_with("[SERVER] "), "unexpected line {reply:?}");

    server.wait_for_log(&format!("[JOB {pid}] Exited with status 0\n"));
    other.send("list-jobs");
    assert_eq!(other.expect_line(), "[SERVER] No currently running jobs");
    owner.close();
}

#[test]
fn test_kill_job_is_announced_to_watchers() {
    let server = TestServer::start();
    let mut owner = server.connect();

    let pid = owner.run_job("sleeper");
    owner.send(&format!("kill-job {pid}"));
    assert_eq!(
        owner.expect_line(),
        format!("[JOB {pid}] Exited due to signal")
    );

    owner.send(&format!("kill-job {pid}"));
    assert_eq!(owner.expect_line(), format!("[SERVER] Job {pid} not found"));
}

#[test]
fn test_watch_job_toggles() {
    let server = TestServer::start();
    let mut owner = server.connect();
    let mut observer = server.connect();

    let pid = owner.run_job("ticker");

    observer.send(&format!("watch-job {pid}"));
    assert_eq!(observer.expect_line(), format!("[SERVER] Watching job {pid}"));
    observer.expect_containing(&format!("[JOB {pid}] tick"));

    observer.send(&format!("watch-job {pid}"));
    observer.expect_containing(&format!("[SERVER] No longer watching job {pid}"));

    // Nothing else is addressed to the observer once it stopped watching
    observer.send("list-jobs");
    assert_eq!(observer.expect_line(), format!("[SERVER] {pid}"));

    owner.send(&format!("kill-job {pid}"));
    owner.expect_containing(&format!("[JOB {pid}] Exited due to signal"));
}

#[test]
fn test_owner_can_stop_watching_its_own_job() {
    let server = TestServer::start();
    let mut owner = server.connect();

    let pid = owner.run_job("ticker");
    owner.send(&format!("watch-job {pid}"));
    owner.expect_containing(&format!("[SERVER] No longer watching job {pid}"));

    owner.send(&format!("kill-job {pid}"));
    owner.send("list-jobs");
    let reply = owner.expect_line();
    assert!(reply.starts_with("[SERVER] "), "unexpected line {reply:?}");
    assert!(!reply.contains("Exited"));
}

#[test]
fn test_departed_watcher_does_not_disturb_job() {
    let server = TestServer::start();
    let mut owner = server.connect();
    let mut observer = server.connect();

    let pid = owner.run_job("ticker");
    observer.send(&format!("watch-job {pid}"));
    observer.expect_containing(&format!("[JOB {pid}] tick"));
    observer.close();
    server.wait_for_log("[SERVER] Client 2 disconnected");

    owner.expect_containing(&format!("[JOB {pid}] tick"));
    owner.expect_containing(&format!("[JOB {pid}] tick"));

    owner.send(&format!("kill-job {pid}"));
    owner.expect_containing(&format!("[JOB {pid}] Exited due to signal"));
}

#[test]
fn test_protocol_log_mirrors_traffic() {
    let server = TestServer::start();
    let mut client = server.connect();

    let pid = client.run_job("echo hi");
    client.expect_containing(&format!("[JOB {pid}] Exited with status 0"));

    let log = server.wait_for_log(&format!("[JOB {pid}] Exited with status 0\n"));
    let expected = [
        "[SERVER] Client 1 connected\n".to_string(),
        "[CLIENT 1] run-job echo hi\n".to_string(),
        format!("[SERVER] Job {pid} created\n"),
        format!("[JOB {pid}] hi\n"),
    ];
    let mut from = 0;
    for line in &expected {
        let at = log[from..]
            .find(line.as_str())
            .unwrap_or_else(|| panic!("{line:?} missing or out of order in:\n{log}"));
        from += at + line.len();
    }
    assert!(!log.contains('\r'));
}
