//! Shared harness for the server integration tests
//!
//! Every test gets its own server on an ephemeral port, running on a
//! background thread, with a temporary jobs directory populated with small
//! shell scripts.

#![allow(dead_code)]

use jobd_config::config::ServerConfig;
use jobd_server::Server;
use jobd_utils::ShutdownHandle;
use std::fs;
use std::io::{self, BufRead, BufReader, Write};
use std::net::{Shutdown, SocketAddr, TcpStream};
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tempfile::TempDir;

pub const TIMEOUT: Duration = Duration::from_secs(10);

const SCRIPTS: &[(&str, &str)] = &[
    ("echo", "echo \"$@\""),
    ("errecho", "echo \"$@\" >&2"),
    ("exit3", "exit 3"),
    ("sleeper", "exec sleep 30"),
    ("flood", "printf '%0300d' 0\nexec sleep 30"),
    ("ticker", "while true; do echo tick; sleep 0.2; done"),
    ("partial", "printf 'no newline'"),
    ("spewer", "yes &\nsleep 0.2\nexit 0"),
];

/// Protocol log the test can read back.
#[derive(Clone, Default)]
pub struct SharedLog(Arc<Mutex<Vec<u8>>>);

impl SharedLog {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl Write for SharedLog {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Builder for a server under test
pub struct TestServerBuilder {
    config: ServerConfig,
    termination_signals: bool,
}

impl TestServerBuilder {
    pub fn new() -> Self {
        Self {
            config: ServerConfig {
                port: 0,
                ..ServerConfig::default()
            },
            termination_signals: false,
        }
    }

    pub fn max_clients(mut self, max: usize) -> Self {
        self.config.max_clients = max;
        self
    }

    pub fn max_jobs(mut self, max: usize) -> Self {
        self.config.max_jobs = max;
        self
    }

    pub fn buffer_capacity(mut self, capacity: usize) -> Self {
        self.config.buffer_capacity = capacity;
        self
    }

    /// Route SIGINT and SIGTERM of the whole test process to this server.
    pub fn termination_signals(mut self) -> Self {
        self.termination_signals = true;
        self
    }

    pub fn start(mut self) -> TestServer {
        let jobs_dir = TempDir::new().unwrap();
        write_scripts(jobs_dir.path());
        self.config.jobs_dir = jobs_dir.path().to_path_buf();

        let log = SharedLog::default();
        let mut server = Server::bind_with_log(self.config, Box::new(log.clone())).unwrap();
        if self.termination_signals {
            server.install_termination_signals().unwrap();
        }
        let addr = server.local_addr().unwrap();
        let shutdown = server.shutdown_handle();
        let thread = std::thread::spawn(move || server.run().unwrap());

        TestServer {
            addr,
            log,
            shutdown,
            thread: Some(thread),
            _jobs_dir: jobs_dir,
        }
    }
}

impl Default for TestServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn write_scripts(dir: &Path) {
    for (name, body) in SCRIPTS {
        let path = dir.join(name);
        fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    }
    // Present but not executable
    let path = dir.join("noexec");
    fs::write(&path, "#!/bin/sh\necho never\n").unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o644)).unwrap();
}

pub struct TestServer {
    pub addr: SocketAddr,
    log: SharedLog,
    shutdown: ShutdownHandle,
    thread: Option<JoinHandle<()>>,
    _jobs_dir: TempDir,
}

impl TestServer {
    pub fn start() -> Self {
        TestServerBuilder::new().start()
    }

    pub fn connect(&self) -> TestClient {
        TestClient::connect(self.addr)
    }

    pub fn log(&self) -> String {
        self.log.contents()
    }

    /// Wait until the protocol log contains `needle`.
    pub fn wait_for_log(&self, needle: &str) -> String {
        let deadline = Instant::now() + TIMEOUT;
        loop {
            let log = self.log();
            if log.contains(needle) {
                return log;
            }
            assert!(
                Instant::now() < deadline,
                "log never contained {needle:?}:\n{log}"
            );
            std::thread::sleep(Duration::from_millis(20));
        }
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.shutdown.clone()
    }

    /// Stop the server and wait for its thread. Returns the final log.
    pub fn stop(mut self) -> String {
        self.join();
        self.log()
    }

    fn join(&mut self) {
        if let Some(thread) = self.thread.take() {
            self.shutdown.request();
            thread.join().unwrap();
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if self.thread.is_some() {
            self.shutdown.request();
            if let Some(thread) = self.thread.take() {
                let _ = thread.join();
            }
        }
    }
}

pub struct TestClient {
    reader: BufReader<TcpStream>,
    writer: TcpStream,
}

impl TestClient {
    pub fn connect(addr: SocketAddr) -> Self {
        let stream = TcpStream::connect(addr).unwrap();
        stream.set_read_timeout(Some(TIMEOUT)).unwrap();
        let writer = stream.try_clone().unwrap();
        Self {
            reader: BufReader::new(stream),
            writer,
        }
    }

    pub fn send(&mut self, line: &str) {
        self.send_raw(format!("{line}\r\n").as_bytes());
    }

    pub fn send_raw(&mut self, bytes: &[u8]) {
        self.writer.write_all(bytes).unwrap();
        self.writer.flush().unwrap();
    }

    /// Next line with its `\r\n` stripped, or `None` once the server closed
    /// the connection.
    pub fn read_line(&mut self) -> Option<String> {
        let mut line = String::new();
        match self.reader.read_line(&mut line) {
            Ok(0) => None,
            Ok(_) => {
                assert!(line.ends_with("\r\n"), "line not CRLF framed: {line:?}");
                line.truncate(line.len() - 2);
                Some(line)
            }
            Err(e) if e.kind() == io::ErrorKind::ConnectionReset => None,
            Err(e) => panic!("read failed: {e}"),
        }
    }

    pub fn expect_line(&mut self) -> String {
        self.read_line().expect("connection closed unexpectedly")
    }

    /// Skip lines until one contains `needle`.
    pub fn expect_containing(&mut self, needle: &str) -> String {
        let mut seen = Vec::new();
        loop {
            match self.read_line() {
                Some(line) if line.contains(needle) => return line,
                Some(line) => seen.push(line),
                None => panic!("closed before {needle:?}; saw {seen:?}"),
            }
        }
    }

    /// Send `run-job` and return the new pid.
    pub fn run_job(&mut self, command: &str) -> u32 {
        self.send(&format!("run-job {command}"));
        let line = self.expect_containing("[SERVER] Job ");
        line.trim_start_matches("[SERVER] Job ")
            .trim_end_matches(" created")
            .parse()
            .unwrap_or_else(|_| panic!("not a creation reply: {line:?}"))
    }

    /// Read until the server closes the connection. Returns what arrived.
    pub fn expect_closed(&mut self) -> Vec<String> {
        let mut rest = Vec::new();
        while let Some(line) = self.read_line() {
            rest.push(line);
        }
        rest
    }

    pub fn close(self) {
        let _ = self.writer.shutdown(Shutdown::Both);
    }
}
