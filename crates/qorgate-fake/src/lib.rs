//! Test doubles for qorgate.
//!
//! [`FakeProcessRunner`] answers commands from a script instead of spawning
//! them, so case runs can be driven deterministically without abc, yosys or
//! the mapper installed.

use anyhow::Context;
use qorgate_adapters::{AdapterError, CommandSpec, ProcessRunner};
use qorgate_types::CommandResult;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// A successful run with the given stdout.
pub fn ok(stdout: impl Into<String>) -> CommandResult {
    CommandResult {
        stdout: stdout.into(),
        ..CommandResult::default()
    }
}

/// A completed run with a non-zero exit code.
pub fn exit(code: i32, stdout: impl Into<String>) -> CommandResult {
    CommandResult {
        stdout: stdout.into(),
        exit_code: code,
        ..CommandResult::default()
    }
}

/// A run that hit its timeout.
pub fn timed_out() -> CommandResult {
    CommandResult {
        exit_code: -1,
        timed_out: true,
        ..CommandResult::default()
    }
}

#[derive(Debug, Clone)]
enum Reply {
    Result(CommandResult),
    SpawnFailure,
}

#[derive(Debug, Clone)]
struct Rule {
    needle: String,
    reply: Reply,
    /// Files written relative to the command's cwd before replying.
    writes: Vec<(PathBuf, String)>,
}

#[derive(Debug, Default)]
struct Inner {
    rules: Vec<Rule>,
    calls: Vec<CommandSpec>,
}

/// Scripted [`ProcessRunner`].
///
/// A command is answered by the most recently registered rule whose needle is
/// a substring of its command line; unmatched commands succeed with empty
/// output. Clones share the script and the call log.
#[derive(Debug, Clone, Default)]
pub struct FakeProcessRunner {
    inner: Arc<Mutex<Inner>>,
}

impl FakeProcessRunner {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn push(&self, rule: Rule) -> &Self {
        self.lock().rules.push(rule);
        self
    }

    pub fn respond(&self, needle: impl Into<String>, result: CommandResult) -> &Self {
        self.push(Rule {
            needle: needle.into(),
            reply: Reply::Result(result),
            writes: Vec::new(),
        })
    }

    /// Like [`respond`](Self::respond), also creating `files` in the command's
    /// working directory the way the real tool would.
    pub fn respond_with_files(
        &self,
        needle: impl Into<String>,
        result: CommandResult,
        files: &[(&str, &str)],
    ) -> &Self {
        self.push(Rule {
            needle: needle.into(),
            reply: Reply::Result(result),
            writes: files
                .iter()
                .map(|(p, c)| (PathBuf::from(p), c.to_string()))
                .collect(),
        })
    }

    pub fn fail_spawn(&self, needle: impl Into<String>) -> &Self {
        self.push(Rule {
            needle: needle.into(),
            reply: Reply::SpawnFailure,
            writes: Vec::new(),
        })
    }

    /// Every command seen so far, in call order.
    pub fn calls(&self) -> Vec<CommandSpec> {
        self.lock().calls.clone()
    }

    pub fn call_count_matching(&self, needle: &str) -> usize {
        self.lock()
            .calls
            .iter()
            .filter(|c| c.command_line.contains(needle))
            .count()
    }
}

impl ProcessRunner for FakeProcessRunner {
    fn run(&self, spec: &CommandSpec) -> Result<CommandResult, AdapterError> {
        if spec.command_line.trim().is_empty() {
            return Err(AdapterError::EmptyCommand);
        }

        let rule = {
            let mut inner = self.lock();
            inner.calls.push(spec.clone());
            inner
                .rules
                .iter()
                .rev()
                .find(|r| spec.command_line.contains(&r.needle))
                .cloned()
        };

        let Some(rule) = rule else {
            return Ok(CommandResult::default());
        };

        for (rel, contents) in &rule.writes {
            let path = match &spec.cwd {
                Some(cwd) => cwd.join(rel),
                None => rel.clone(),
            };
            std::fs::write(&path, contents)
                .with_context(|| format!("fake runner: write {}", path.display()))?;
        }

        match rule.reply {
            Reply::Result(result) => Ok(result),
            Reply::SpawnFailure => Err(AdapterError::Spawn {
                command: spec.command_line.clone(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "scripted failure"),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unmatched_command_succeeds_empty() {
        let fake = FakeProcessRunner::new();
        let r = fake.run(&CommandSpec::new("abc -c 'quit'")).unwrap();
        assert!(r.succeeded());
        assert!(r.stdout.is_empty());
    }

    #[test]
    fn latest_matching_rule_wins() {
        let fake = FakeProcessRunner::new();
        fake.respond("yosys", ok("first"))
            .respond("yosys", exit(2, "second"));
        let r = fake.run(&CommandSpec::new("yosys -s top.yos")).unwrap();
        assert_eq!(r.exit_code, 2);
        assert_eq!(r.stdout, "second");
    }

    #[test]
    fn records_calls_across_clones() {
        let fake = FakeProcessRunner::new();
        let clone = fake.clone();
        clone.run(&CommandSpec::new("abc -c 'cec a b'")).unwrap();
        clone.run(&CommandSpec::new("ifpga -i x")).unwrap();
        assert_eq!(fake.calls().len(), 2);
        assert_eq!(fake.call_count_matching("cec"), 1);
    }

    #[test]
    fn spawn_failure_is_error() {
        let fake = FakeProcessRunner::new();
        fake.fail_spawn("fm_shell");
        let err = fake.run(&CommandSpec::new("fm_shell -f top.fm")).unwrap_err();
        assert!(matches!(err, AdapterError::Spawn { .. }));
    }

    #[test]
    fn writes_files_into_cwd() {
        let dir = tempfile::tempdir().unwrap();
        let fake = FakeProcessRunner::new();
        fake.respond_with_files("abc", ok(""), &[("top.abc.v", "assign y = a & b;\n")]);
        fake.run(&CommandSpec::new("abc -c x").cwd(dir.path()))
            .unwrap();
        let written = std::fs::read_to_string(dir.path().join("top.abc.v")).unwrap();
        assert!(written.contains("assign"));
    }

    #[test]
    fn timed_out_helper() {
        let r = timed_out();
        assert!(r.timed_out);
        assert!(!r.succeeded());
    }
}
