//! The control loop

use crate::announce::{Announcer, Delivery};
use crate::client::ClientTable;
use crate::job::{Job, StreamKind};
use crate::jobs::JobTable;
use crate::reap;
use crate::watch::{Token, Wake, WatchSet};
use jobd_config::config::ServerConfig;
use jobd_core::{ClientId, Error, Pid, Result, ResultExt};
use jobd_protocol::{messages, Command, Delimiter, Fill, Verb};
use jobd_utils::{client_span, job_span, ShutdownHandle, WakePipe, SIGCHLD};
use std::io::{self, ErrorKind, Write};
use std::net::{SocketAddr, TcpListener};

/// What to do with a client after servicing it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Disposition {
    Keep,
    Drop,
}

pub struct Server {
    config: ServerConfig,
    listener: TcpListener,
    clients: ClientTable,
    jobs: JobTable,
    announcer: Announcer,
    control: WakePipe,
    child_exit: WakePipe,
    shutdown: ShutdownHandle,
}

impl Server {
    /// Bind the listener and register for child termination. The protocol log
    /// goes to stdout.
    pub fn bind(config: ServerConfig) -> Result<Self> {
        Self::bind_with_log(config, Box::new(io::stdout()))
    }

    pub fn bind_with_log(config: ServerConfig, log: Box<dyn Write + Send>) -> Result<Self> {
        config.validate()?;

        let addr = config.socket_addr();
        let listener = TcpListener::bind(addr).context(format!("bind {addr}"))?;
        listener
            .set_nonblocking(true)
            .context("set listener non-blocking")?;

        let control = WakePipe::new()?;
        let mut child_exit = WakePipe::new()?;
        child_exit.notify_on(SIGCHLD)?;
        let shutdown = ShutdownHandle::new(control.waker()?);

        tracing::info!(
            addr = %listener.local_addr().unwrap_or(addr),
            jobs_dir = %config.jobs_dir.display(),
            max_clients = config.max_clients,
            max_jobs = config.max_jobs,
            "server listening"
        );

        Ok(Self {
            clients: ClientTable::new(config.max_clients, config.buffer_capacity),
            jobs: JobTable::new(config.max_jobs),
            announcer: Announcer::new(log, config.buffer_capacity),
            config,
            listener,
            control,
            child_exit,
            shutdown,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.listener.local_addr().context("query listener address")
    }

    /// A handle that stops [`run`](Self::run) from any thread.
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.shutdown.clone()
    }

    /// Route SIGINT and SIGTERM to the shutdown handle.
    pub fn install_termination_signals(&mut self) -> Result<()> {
        self.shutdown.install_termination_signals(&mut self.control)
    }

    /// Serve until shutdown is requested.
    pub fn run(mut self) -> Result<()> {
        loop {
            if self.shutdown.is_requested() {
                self.shut_down();
                return Ok(());
            }
            let wake = self.wait()?;
            self.dispatch(wake);
        }
    }

    fn wait(&self) -> Result<Wake> {
        let mut set = WatchSet::new();
        if self.clients.has_capacity() {
            set.add_source(&self.listener, Token::Listener);
        }
        set.add_source(&self.control, Token::Control);
        set.add_source(&self.child_exit, Token::ChildExit);
        for client in self.clients.iter() {
            set.add_source(client, Token::Client(client.id()));
        }
        for job in self.jobs.iter() {
            for kind in [StreamKind::Stdout, StreamKind::Stderr] {
                if let Some(fd) = job.stream_fd(kind) {
                    set.add(fd, Token::Job(job.pid(), kind));
                }
            }
        }
        tracing::trace!(fds = set.len(), highest = ?set.highest_fd(), "waiting");
        set.wait()
    }

    fn dispatch(&mut self, wake: Wake) {
        let (ready, interrupted) = match wake {
            Wake::Ready(tokens) => (tokens, false),
            Wake::Interrupted => (Vec::new(), true),
        };

        if ready.contains(&Token::Listener) {
            self.accept_client();
        }

        for token in &ready {
            if let Token::Job(pid, kind) = *token {
                self.drain_job(pid, kind);
            }
        }

        let mut departing = Vec::new();
        for token in &ready {
            if let Token::Client(id) = *token {
                if self.service_client(id) == Disposition::Drop {
                    departing.push(id);
                }
            }
        }
        for id in departing {
            self.disconnect(id);
        }

        if ready.contains(&Token::Control) {
            self.control.drain();
        }
        let child_exited = ready.contains(&Token::ChildExit);
        if child_exited {
            self.child_exit.drain();
        }
        if child_exited || interrupted {
            self.reap();
        }
    }

    fn accept_client(&mut self) {
        match self.listener.accept() {
            Ok((stream, peer)) => match self.clients.insert(stream, peer) {
                Ok(id) => {
                    tracing::info!(client_id = %id, %peer, "client connected");
                    self.announcer.log_line(&messages::client_connected(id));
                }
                Err(e) => tracing::warn!(%peer, error = %e, "rejected connection"),
            },
            Err(e) if e.kind() == ErrorKind::WouldBlock => {}
            Err(e) => tracing::warn!(error = %e, "accept failed"),
        }
    }

    fn drain_job(&mut self, pid: Pid, kind: StreamKind) {
        let _span = job_span(pid.as_u32()).entered();
        let Some(job) = self.jobs.get_mut(pid) else {
            return;
        };
        match job.drain_output(kind, &mut self.announcer, &self.clients) {
            Ok(report) if report.closed => tracing::debug!(stream = %kind, "job stream closed"),
            Ok(report) => tracing::trace!(stream = %kind, ?report, "job output drained"),
            Err(e) => tracing::warn!(stream = %kind, error = %e, "failed to drain job output"),
        }
    }

    /// Read from a ready client and execute every complete line.
    fn service_client(&mut self, id: ClientId) -> Disposition {
        let _span = client_span(id.as_u64()).entered();
        let Some(client) = self.clients.get_mut(id) else {
            return Disposition::Keep;
        };

        let fill = client.buffer.fill(&mut client.stream);
        let mut lines = Vec::new();
        while let Some(message) = client.buffer.next_message(Delimiter::Network) {
            lines.push(String::from_utf8_lossy(message).into_owned());
        }
        client.buffer.compact();
        let saturated = client.buffer.is_saturated();

        for line in &lines {
            if self.execute(id, line) == Disposition::Drop {
                return Disposition::Drop;
            }
        }

        match fill {
            Ok(Fill::Closed) => Disposition::Drop,
            Err(e) => {
                tracing::debug!(error = %e, "client read failed");
                Disposition::Drop
            }
            Ok(Fill::Read(_) | Fill::Saturated) if saturated => {
                let e = Error::protocol(format!("client {id}"), "line exceeds buffer");
                tracing::warn!(error = %e, "dropping client");
                self.announcer.log_line(&messages::client_overflow(id));
                Disposition::Drop
            }
            Ok(_) => Disposition::Keep,
        }
    }

    fn execute(&mut self, id: ClientId, line: &str) -> Disposition {
        self.announcer.log_line(&messages::client_said(id, line));
        let command = Command::parse(line);
        tracing::debug!(verb = %command.verb, "executing command");

        match command.verb {
            Verb::ListJobs => {
                let text = messages::job_list(&self.jobs.live_pids());
                self.reply(id, text);
            }
            Verb::RunJob => self.run_job(id, &command),
            Verb::KillJob => self.kill_job(id, &command),
            Verb::WatchJob => self.watch_job(id, &command),
            Verb::Exit => return Disposition::Drop,
            Verb::Invalid => self.reply(id, messages::invalid_command(line)),
        }
        Disposition::Keep
    }

    fn run_job(&mut self, id: ClientId, command: &Command<'_>) {
        let Some((&name, args)) = command
            .args
            .split_first()
            .filter(|(name, _)| is_valid_job_name(name))
        else {
            self.reply(id, messages::invalid_command(command.line));
            return;
        };

        if !self.jobs.has_capacity() {
            self.reply(id, messages::MAX_JOBS_EXCEEDED);
            return;
        }

        let executable = self.config.job_executable(name);
        let job = match Job::spawn(name, &executable, args, self.config.buffer_capacity, id) {
            Ok(job) => job,
            Err(e) => {
                tracing::warn!(job = name, error = %e, "failed to start job");
                self.reply(id, messages::spawn_failed(name));
                return;
            }
        };
        match self.jobs.insert(job) {
            Ok(pid) => {
                tracing::info!(%pid, job = name, client_id = %id, "job started");
                self.reply(id, messages::job_created(pid));
            }
            Err(e) => {
                tracing::warn!(error = %e, "job table full");
                self.reply(id, messages::MAX_JOBS_EXCEEDED);
            }
        }
    }

    fn kill_job(&mut self, id: ClientId, command: &Command<'_>) {
        let Some(pid) = parse_pid(command) else {
            self.reply(id, messages::invalid_command(command.line));
            return;
        };
        match self.jobs.kill(pid) {
            Ok(()) => tracing::info!(%pid, client_id = %id, "job killed"),
            Err(Error::NotFound { .. }) => self.reply(id, messages::job_not_found(pid)),
            Err(e) => tracing::warn!(%pid, error = %e, "failed to kill job"),
        }
    }

    fn watch_job(&mut self, id: ClientId, command: &Command<'_>) {
        let Some(pid) = parse_pid(command) else {
            self.reply(id, messages::invalid_command(command.line));
            return;
        };
        let text = match self.jobs.toggle_watch(pid, id) {
            Ok(true) => messages::watching(pid),
            Ok(false) => messages::not_watching(pid),
            Err(_) => messages::job_not_found(pid),
        };
        self.reply(id, text);
    }

    /// Send one line to the requesting client, truncated to fit.
    fn reply(&mut self, id: ClientId, text: impl Into<String>) {
        let Some(client) = self.clients.get(id) else {
            return;
        };
        let text = self.announcer.fit(text.into());
        match self.announcer.send_line(client.stream(), &text) {
            Ok(Delivery::Complete) => {}
            Ok(Delivery::Incomplete) => tracing::warn!(client_id = %id, "incomplete reply"),
            Err(e) => tracing::warn!(client_id = %id, error = %e, "reply failed"),
        }
    }

    fn disconnect(&mut self, id: ClientId) {
        let Some(client) = self.clients.remove(id) else {
            return;
        };
        let watched = self.jobs.forget_client(id);
        tracing::info!(client_id = %id, peer = %client.peer(), watched, "client disconnected");
        self.announcer.log_line(&messages::client_disconnected(id));
    }

    fn reap(&mut self) {
        let marked = reap::reap(&mut self.jobs);
        if marked == 0 {
            return;
        }

        let announcer = &mut self.announcer;
        let clients = &self.clients;
        let removed = self.jobs.remove_dead(|job| {
            job.flush_output(announcer, clients);
            if let Some(reason) = job.exit_reason() {
                let text = reason.announcement(job.pid());
                announcer.broadcast(clients, job.watchers(), &text);
            }
        });
        tracing::debug!(?removed, "removed terminated jobs");
    }

    fn shut_down(&mut self) {
        tracing::info!(clients = self.clients.len(), "shutting down");
        let everyone = self.clients.ids();
        self.announcer
            .broadcast(&self.clients, everyone, messages::SHUTTING_DOWN);
        self.clients.drain().for_each(drop);
    }
}

/// A job name resolves inside the jobs directory only.
fn is_valid_job_name(name: &str) -> bool {
    !name.is_empty() && !name.contains('/') && name != "." && name != ".."
}

fn parse_pid(command: &Command<'_>) -> Option<Pid> {
    command.sole_arg()?.parse().ok()
}
