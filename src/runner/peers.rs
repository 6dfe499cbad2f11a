//! Peer process launching and responder readiness

use crate::error::Result;
use crate::exec::{ChildProcess, CommandOutput, CommandRunner, CommandSpec};
use crate::network::LinkPair;
use crate::pki::TrustMaterial;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// A running responder or initiator
#[async_trait]
pub trait PeerProcess: Send {
    /// Wait for the process to exit and collect its output
    async fn wait_output(&mut self) -> Result<CommandOutput>;

    /// Stop the process; must be safe to call on an exited process
    async fn terminate(&mut self);
}

#[async_trait]
impl PeerProcess for ChildProcess {
    async fn wait_output(&mut self) -> Result<CommandOutput> {
        ChildProcess::wait_output(self).await
    }

    async fn terminate(&mut self) {
        ChildProcess::terminate(self).await
    }
}

/// Starts the two handshake peers for a batch
#[async_trait]
pub trait PeerLauncher: Send + Sync {
    async fn spawn_responder(
        &self,
        material: &TrustMaterial,
        keylog: Option<&Path>,
    ) -> Result<Box<dyn PeerProcess>>;

    /// Block until the responder accepts connections
    async fn wait_ready(&self) -> Result<()>;

    async fn spawn_initiator(&self, material: &TrustMaterial, rounds: u32) -> Result<Box<dyn PeerProcess>>;
}

/// Command lines for the peer tools
#[derive(Debug, Clone)]
pub struct PeerCommands {
    pub openssl_binary: String,
    pub stimer_binary: String,
    /// OpenSSL config that loads the provider in the initiator
    pub openssl_config: PathBuf,
    pub link: LinkPair,
    pub use_sudo: bool,
}

impl PeerCommands {
    /// TLS 1.3 responder requiring a client certificate chain
    pub fn responder(&self, material: &TrustMaterial, keylog: Option<&Path>) -> CommandSpec {
        let mut spec = CommandSpec::new(&self.openssl_binary)
            .arg("s_server")
            .arg("-accept")
            .arg(self.link.port.to_string())
            .arg("-cert")
            .arg(path_arg(&material.server_cert))
            .arg("-key")
            .arg(path_arg(&material.server_key))
            .args(["-tls1_3", "-Verify", "2", "-verify_return_error"])
            .arg("-CAfile")
            .arg(path_arg(&material.ca_cert))
            .arg("-chainCAfile")
            .arg(path_arg(&material.ica_cert))
            .arg("-ignore_unexpected_eof");

        if let Some(keylog) = keylog {
            spec = spec.arg("-keylogfile").arg(path_arg(keylog));
        }

        spec.arg("-quiet")
            .in_namespace(&self.link.responder.namespace, self.use_sudo)
    }

    /// Timing initiator running `rounds` handshakes against the responder
    pub fn initiator(&self, material: &TrustMaterial, rounds: u32) -> CommandSpec {
        CommandSpec::new(&self.stimer_binary)
            .arg("-h")
            .arg(self.link.rendezvous())
            .arg("-r")
            .arg(rounds.to_string())
            .arg(format!("--cert={}", material.client_cert.display()))
            .arg(format!("--key={}", material.client_key.display()))
            .arg(format!("--rootcert={}", material.ca_cert.display()))
            .arg(format!("--chaincert={}", material.ica_cert.display()))
            .arg(format!("--config={}", self.openssl_config.display()))
            .in_namespace(&self.link.initiator.namespace, self.use_sudo)
    }

    /// Lists a TCP listener on the rendezvous port inside the responder namespace
    pub fn listening_probe(&self) -> CommandSpec {
        CommandSpec::new("ss")
            .args(["-H", "-l", "-t", "-n", "sport", "="])
            .arg(format!(":{}", self.link.port))
            .in_namespace(&self.link.responder.namespace, self.use_sudo)
    }
}

fn path_arg(path: &Path) -> String {
    path.display().to_string()
}

/// How the engine decides the responder is ready
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadinessProbe {
    /// Sleep for a fixed grace period
    FixedDelay(Duration),
    /// Poll for a listening socket until `deadline`, then fall back to
    /// sleeping `fallback`
    ListeningSocket {
        deadline: Duration,
        interval: Duration,
        fallback: Duration,
    },
}

impl ReadinessProbe {
    pub fn listening(grace: Duration) -> Self {
        Self::ListeningSocket {
            deadline: crate::defaults::READINESS_DEADLINE,
            interval: crate::defaults::READINESS_INTERVAL,
            fallback: grace,
        }
    }

    pub async fn wait(&self, runner: &dyn CommandRunner, probe: &CommandSpec) -> Result<()> {
        match *self {
            Self::FixedDelay(grace) => {
                tokio::time::sleep(grace).await;
                Ok(())
            }
            Self::ListeningSocket {
                deadline,
                interval,
                fallback,
            } => {
                let started = tokio::time::Instant::now();
                while started.elapsed() < deadline {
                    match runner.run(probe).await {
                        Ok(output) if output.success() && !output.stdout.trim().is_empty() => return Ok(()),
                        Ok(_) => {}
                        // Probe tool unavailable; the grace period is all we have
                        Err(_) => break,
                    }
                    tokio::time::sleep(interval).await;
                }
                tokio::time::sleep(fallback).await;
                Ok(())
            }
        }
    }
}

/// Launches the real peer tools inside the emulated topology
pub struct SystemPeerLauncher {
    commands: PeerCommands,
    probe: ReadinessProbe,
    runner: Arc<dyn CommandRunner>,
}

impl SystemPeerLauncher {
    pub fn new(commands: PeerCommands, probe: ReadinessProbe, runner: Arc<dyn CommandRunner>) -> Self {
        Self { commands, probe, runner }
    }
}

#[async_trait]
impl PeerLauncher for SystemPeerLauncher {
    async fn spawn_responder(
        &self,
        material: &TrustMaterial,
        keylog: Option<&Path>,
    ) -> Result<Box<dyn PeerProcess>> {
        let child = ChildProcess::spawn_quiet(&self.commands.responder(material, keylog))?;
        Ok(Box::new(child))
    }

    async fn wait_ready(&self) -> Result<()> {
        self.probe
            .wait(self.runner.as_ref(), &self.commands.listening_probe())
            .await
    }

    async fn spawn_initiator(&self, material: &TrustMaterial, rounds: u32) -> Result<Box<dyn PeerProcess>> {
        let child = ChildProcess::spawn(&self.commands.initiator(material, rounds))?;
        Ok(Box::new(child))
    }
}
