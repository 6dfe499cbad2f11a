//! In-crate fakes for exercising the engine without namespaces or peers

use crate::capture::{CaptureSession, TrafficRecorder};
use crate::error::{AppError, Result};
use crate::exec::{CommandOutput, CommandRunner, CommandSpec};
use crate::pki::{TrustMaterial, TrustProvisioner};
use crate::runner::{PeerLauncher, PeerProcess};
use crate::sink::RecordSink;
use crate::types::{Algorithm, NetworkCondition, ResultRecord};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Build initiator output with valid banner and provider lines
pub fn initiator_output(pairs: &str) -> String {
    format!(
        "OpenSSL 3.2.0 23 Nov 2023 (Library: OpenSSL 3.2.0 23 Nov 2023)\n\
         oqsprovider provider loaded successfully\n{}\n",
        pairs
    )
}

#[derive(Clone)]
enum Scripted {
    Output(CommandOutput),
    Error(String),
}

struct Rule {
    pattern: String,
    responses: VecDeque<Scripted>,
}

/// Command runner answering by substring match on the rendered command.
///
/// Each pattern holds a queue of responses; the last one repeats. Commands
/// without a matching rule succeed with empty output.
#[derive(Default)]
pub struct FakeCommandRunner {
    rules: Mutex<Vec<Rule>>,
    calls: Mutex<Vec<String>>,
}

impl FakeCommandRunner {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, pattern: &str, response: Scripted) {
        let mut rules = self.rules.lock().unwrap();
        match rules.iter_mut().find(|rule| rule.pattern == pattern) {
            Some(rule) => rule.responses.push_back(response),
            None => rules.push(Rule {
                pattern: pattern.to_string(),
                responses: VecDeque::from([response]),
            }),
        }
    }

    pub fn respond(&self, pattern: &str, output: CommandOutput) {
        self.push(pattern, Scripted::Output(output));
    }

    /// Make matching commands fail to start
    pub fn fail_on(&self, pattern: &str, message: &str) {
        self.push(pattern, Scripted::Error(message.to_string()));
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_matching(&self, pattern: &str) -> usize {
        self.calls().iter().filter(|call| call.contains(pattern)).count()
    }

    /// Position of the first call containing `pattern`
    pub fn position(&self, pattern: &str) -> Option<usize> {
        self.calls().iter().position(|call| call.contains(pattern))
    }
}

#[async_trait]
impl CommandRunner for FakeCommandRunner {
    async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput> {
        let line = spec.to_string();
        self.calls.lock().unwrap().push(line.clone());

        let mut rules = self.rules.lock().unwrap();
        let scripted = rules
            .iter_mut()
            .find(|rule| line.contains(&rule.pattern))
            .and_then(|rule| {
                if rule.responses.len() > 1 {
                    rule.responses.pop_front()
                } else {
                    rule.responses.front().cloned()
                }
            });

        match scripted {
            Some(Scripted::Output(output)) => Ok(output),
            Some(Scripted::Error(message)) => Err(AppError::process(message)),
            None => Ok(CommandOutput::ok("")),
        }
    }
}

/// Scripted behavior of one initiator launch
#[derive(Debug, Clone)]
pub enum InitiatorScript {
    /// Exit with this stdout
    Complete(String),
    /// Never exit
    Hang,
}

#[derive(Default)]
struct LaunchCounters {
    responders_spawned: AtomicUsize,
    responders_terminated: AtomicUsize,
    initiators_terminated: AtomicUsize,
}

/// Peer launcher replaying initiator scripts in order
pub struct FakeLauncher {
    scripts: Mutex<VecDeque<InitiatorScript>>,
    requested: Mutex<Vec<u32>>,
    keylogs: Mutex<Vec<Option<PathBuf>>>,
    counters: Arc<LaunchCounters>,
}

impl FakeLauncher {
    pub fn new(scripts: Vec<InitiatorScript>) -> Self {
        Self {
            scripts: Mutex::new(scripts.into()),
            requested: Mutex::new(Vec::new()),
            keylogs: Mutex::new(Vec::new()),
            counters: Arc::new(LaunchCounters::default()),
        }
    }

    /// Launcher whose every batch completes with `pairs`
    pub fn repeating(pairs: &str, batches: usize) -> Self {
        Self::new(vec![InitiatorScript::Complete(initiator_output(pairs)); batches])
    }

    pub fn requested_rounds(&self) -> Vec<u32> {
        self.requested.lock().unwrap().clone()
    }

    pub fn keylogs(&self) -> Vec<Option<PathBuf>> {
        self.keylogs.lock().unwrap().clone()
    }

    pub fn responders_spawned(&self) -> usize {
        self.counters.responders_spawned.load(Ordering::SeqCst)
    }

    pub fn responders_terminated(&self) -> usize {
        self.counters.responders_terminated.load(Ordering::SeqCst)
    }

    pub fn initiators_terminated(&self) -> usize {
        self.counters.initiators_terminated.load(Ordering::SeqCst)
    }
}

struct FakePeer {
    script: Option<InitiatorScript>,
    counters: Arc<LaunchCounters>,
    responder: bool,
}

#[async_trait]
impl PeerProcess for FakePeer {
    async fn wait_output(&mut self) -> Result<CommandOutput> {
        match &self.script {
            Some(InitiatorScript::Complete(stdout)) => Ok(CommandOutput::ok(stdout.clone())),
            _ => std::future::pending().await,
        }
    }

    async fn terminate(&mut self) {
        let counter = if self.responder {
            &self.counters.responders_terminated
        } else {
            &self.counters.initiators_terminated
        };
        counter.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl PeerLauncher for FakeLauncher {
    async fn spawn_responder(
        &self,
        _material: &TrustMaterial,
        keylog: Option<&Path>,
    ) -> Result<Box<dyn PeerProcess>> {
        self.counters.responders_spawned.fetch_add(1, Ordering::SeqCst);
        self.keylogs.lock().unwrap().push(keylog.map(Path::to_path_buf));
        Ok(Box::new(FakePeer {
            script: None,
            counters: Arc::clone(&self.counters),
            responder: true,
        }))
    }

    async fn wait_ready(&self) -> Result<()> {
        Ok(())
    }

    async fn spawn_initiator(&self, _material: &TrustMaterial, rounds: u32) -> Result<Box<dyn PeerProcess>> {
        self.requested.lock().unwrap().push(rounds);
        let script = self
            .scripts
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| AppError::internal("no initiator script left"))?;
        Ok(Box::new(FakePeer {
            script: Some(script),
            counters: Arc::clone(&self.counters),
            responder: false,
        }))
    }
}

/// Provisioner that only records which algorithms it was asked for
#[derive(Default)]
pub struct FakeProvisioner {
    provisioned: Mutex<Vec<String>>,
    fail_for: Option<String>,
}

impl FakeProvisioner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_for(algorithm: &str) -> Self {
        Self {
            provisioned: Mutex::new(Vec::new()),
            fail_for: Some(algorithm.to_string()),
        }
    }

    pub fn provisioned(&self) -> Vec<String> {
        self.provisioned.lock().unwrap().clone()
    }
}

#[async_trait]
impl TrustProvisioner for FakeProvisioner {
    async fn provision(&self, algorithm: &Algorithm) -> Result<TrustMaterial> {
        self.provisioned.lock().unwrap().push(algorithm.name.clone());
        if self.fail_for.as_deref() == Some(algorithm.name.as_str()) {
            return Err(AppError::provisioning(format!("key generation failed for {}", algorithm)));
        }
        Ok(TrustMaterial::at(&PathBuf::from(format!("/tmp/pki-{}", algorithm.file_stem()))))
    }
}

/// Sink keeping records in memory
#[derive(Default)]
pub struct MemorySink {
    records: Mutex<Vec<ResultRecord>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<ResultRecord> {
        self.records.lock().unwrap().clone()
    }
}

impl RecordSink for MemorySink {
    fn append(&self, record: &ResultRecord) -> Result<()> {
        self.records.lock().unwrap().push(record.clone());
        Ok(())
    }
}

/// Recorder handing out keylog paths without capturing anything
#[derive(Default)]
pub struct FakeRecorder {
    started: Mutex<Vec<PathBuf>>,
    stopped: Arc<AtomicUsize>,
}

impl FakeRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn started(&self) -> Vec<PathBuf> {
        self.started.lock().unwrap().clone()
    }

    pub fn stopped(&self) -> usize {
        self.stopped.load(Ordering::SeqCst)
    }
}

struct FakeSession {
    keylog: PathBuf,
    stopped: Arc<AtomicUsize>,
}

#[async_trait]
impl CaptureSession for FakeSession {
    fn keylog(&self) -> &Path {
        &self.keylog
    }

    async fn stop(self: Box<Self>) -> Result<()> {
        self.stopped.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[async_trait]
impl TrafficRecorder for FakeRecorder {
    async fn start(&self, algorithm: &Algorithm, condition: &NetworkCondition) -> Result<Box<dyn CaptureSession>> {
        let keylog = PathBuf::from(format!("/rec/{}_{}.secrets", algorithm.file_stem(), condition.label()));
        self.started.lock().unwrap().push(keylog.clone());
        Ok(Box::new(FakeSession {
            keylog,
            stopped: Arc::clone(&self.stopped),
        }))
    }
}
