//! Parsing of client protocol lines
//!
//! The parser only recognises the verb. Argument arity and type are checked
//! by the server when it executes the command, so that a malformed argument
//! produces the same "invalid command" reply as an unknown verb.

use std::fmt;

/// The verb of a client command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verb {
    ListJobs,
    RunJob,
    KillJob,
    WatchJob,
    Exit,
    Invalid,
}

impl Verb {
    pub const LIST_JOBS: &'static str = "list-jobs";
    pub const RUN_JOB: &'static str = "run-job";
    pub const KILL_JOB: &'static str = "kill-job";
    pub const WATCH_JOB: &'static str = "watch-job";
    pub const EXIT: &'static str = "exit";

    fn from_token(token: &str) -> Self {
        match token {
            Self::LIST_JOBS => Verb::ListJobs,
            Self::RUN_JOB => Verb::RunJob,
            Self::KILL_JOB => Verb::KillJob,
            Self::WATCH_JOB => Verb::WatchJob,
            Self::EXIT => Verb::Exit,
            _ => Verb::Invalid,
        }
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Verb::ListJobs => Self::LIST_JOBS,
            Verb::RunJob => Self::RUN_JOB,
            Verb::KillJob => Self::KILL_JOB,
            Verb::WatchJob => Self::WATCH_JOB,
            Verb::Exit => Self::EXIT,
            Verb::Invalid => "invalid",
        };
        f.write_str(name)
    }
}

/// A parsed client line: verb, positional arguments, and the original text
/// for error replies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command<'a> {
    pub verb: Verb,
    pub args: Vec<&'a str>,
    pub line: &'a str,
}

impl<'a> Command<'a> {
    #[must_use]
    pub fn parse(line: &'a str) -> Self {
        let mut tokens = line.split_whitespace();
        let verb = tokens.next().map_or(Verb::Invalid, Verb::from_token);
        Self {
            verb,
            args: tokens.collect(),
            line,
        }
    }

    /// The single argument of a command that takes exactly one.
    #[must_use]
    pub fn sole_arg(&self) -> Option<&'a str> {
        match self.args.as_slice() {
            [arg] => Some(*arg),
            _ => None,
        }
    }
}
