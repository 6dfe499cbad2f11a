//! Optional packet capture around each condition's batch sequence
//!
//! Two `tshark` processes, one per namespace, record the link while the
//! trials for one (algorithm, condition) pair run. The responder writes the
//! TLS session secrets next to the captures so they can be decrypted later.

use crate::error::{AppError, ErrorContext, Result};
use crate::exec::{ChildProcess, CommandSpec};
use crate::logging::Logger;
use crate::network::{LinkEndpoint, LinkPair};
use crate::types::{Algorithm, NetworkCondition};
use async_trait::async_trait;
use chrono::{DateTime, Local};
use futures::future::join_all;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Name of the capture directory under the output directory
pub const RECORDINGS_DIR: &str = "traffic-recordings";

/// Files produced by one capture session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureArtifacts {
    pub responder_pcap: PathBuf,
    pub initiator_pcap: PathBuf,
    pub keylog: PathBuf,
}

impl CaptureArtifacts {
    pub fn named(
        dir: &Path,
        algorithm: &Algorithm,
        condition: &NetworkCondition,
        timestamp: &DateTime<Local>,
    ) -> Self {
        let stem = format!(
            "{}_{}_{}",
            algorithm.file_stem(),
            condition.label(),
            timestamp.format("%Y-%m-%d_%H-%M-%S")
        );
        Self {
            responder_pcap: dir.join(format!("server-{}.pcap", stem)),
            initiator_pcap: dir.join(format!("client-{}.pcap", stem)),
            keylog: dir.join(format!("{}.secrets", stem)),
        }
    }

    /// Create the empty files; the captures are made world-writable because
    /// `tshark` may drop privileges before writing
    pub fn prepare(
        dir: &Path,
        algorithm: &Algorithm,
        condition: &NetworkCondition,
        timestamp: &DateTime<Local>,
    ) -> Result<Self> {
        let artifacts = Self::named(dir, algorithm, condition, timestamp);
        for path in [&artifacts.responder_pcap, &artifacts.initiator_pcap, &artifacts.keylog] {
            OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Creating {}", path.display()))?;
        }
        for path in [&artifacts.responder_pcap, &artifacts.initiator_pcap] {
            make_world_writable(path)?;
        }
        Ok(artifacts)
    }
}

#[cfg(unix)]
fn make_world_writable(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o666))
        .with_context(|| format!("Setting permissions on {}", path.display()))
}

#[cfg(not(unix))]
fn make_world_writable(_path: &Path) -> Result<()> {
    Ok(())
}

/// A running capture
#[async_trait]
pub trait CaptureSession: Send {
    /// Session-secrets file the responder should write to
    fn keylog(&self) -> &Path;

    async fn stop(self: Box<Self>) -> Result<()>;
}

/// Starts captures for one (algorithm, condition) pair
#[async_trait]
pub trait TrafficRecorder: Send + Sync {
    async fn start(&self, algorithm: &Algorithm, condition: &NetworkCondition) -> Result<Box<dyn CaptureSession>>;
}

/// Records with `tshark` inside both namespaces
pub struct TsharkRecorder {
    dir: PathBuf,
    link: LinkPair,
    use_sudo: bool,
    /// Wait after each capture start
    warmup: Duration,
    /// Wait before stopping, so trailing packets are written
    drain: Duration,
    logger: Logger,
}

impl TsharkRecorder {
    pub fn new(dir: PathBuf, link: LinkPair, use_sudo: bool, warmup: Duration, logger: Logger) -> Self {
        Self {
            dir,
            link,
            use_sudo,
            warmup,
            drain: warmup,
            logger,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn capture_command(&self, endpoint: &LinkEndpoint, file: &Path) -> CommandSpec {
        CommandSpec::new("tshark")
            .arg("-i")
            .arg(endpoint.device.as_str())
            .arg("-w")
            .arg(file.display().to_string())
            .in_namespace(&endpoint.namespace, self.use_sudo)
    }

    async fn start_one(&self, endpoint: &LinkEndpoint, file: &Path) -> Result<ChildProcess> {
        let spec = self.capture_command(endpoint, file);
        let mut child = ChildProcess::spawn_quiet(&spec)?;
        tokio::time::sleep(self.warmup).await;

        if child.has_exited() {
            return Err(AppError::environment(format!(
                "Capture on {}/{} exited during warm-up",
                endpoint.namespace, endpoint.device
            )));
        }

        self.logger
            .debug(&format!("Capturing {} into {}", endpoint.device, file.display()))
            .field("namespace", &endpoint.namespace)
            .field("device", &endpoint.device)
            .log()
            .await;
        Ok(child)
    }
}

#[async_trait]
impl TrafficRecorder for TsharkRecorder {
    async fn start(&self, algorithm: &Algorithm, condition: &NetworkCondition) -> Result<Box<dyn CaptureSession>> {
        let artifacts = CaptureArtifacts::prepare(&self.dir, algorithm, condition, &Local::now())?;

        let mut responder = self.start_one(&self.link.responder, &artifacts.responder_pcap).await?;
        let initiator = match self.start_one(&self.link.initiator, &artifacts.initiator_pcap).await {
            Ok(child) => child,
            Err(e) => {
                responder.terminate().await;
                return Err(e);
            }
        };

        Ok(Box::new(TsharkSession {
            artifacts,
            captures: vec![responder, initiator],
            drain: self.drain,
        }))
    }
}

struct TsharkSession {
    artifacts: CaptureArtifacts,
    captures: Vec<ChildProcess>,
    drain: Duration,
}

#[async_trait]
impl CaptureSession for TsharkSession {
    fn keylog(&self) -> &Path {
        &self.artifacts.keylog
    }

    async fn stop(mut self: Box<Self>) -> Result<()> {
        tokio::time::sleep(self.drain).await;
        join_all(self.captures.iter_mut().map(|capture| capture.terminate())).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn timestamp() -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 5, 1, 9, 30, 0).unwrap()
    }

    #[test]
    fn test_artifact_names() {
        let artifacts = CaptureArtifacts::named(
            Path::new("/out/traffic-recordings"),
            &Algorithm::traditional("RSA:2048"),
            &NetworkCondition::new(10000.0, 5.0, 0.1),
            &timestamp(),
        );
        assert_eq!(
            artifacts.responder_pcap,
            PathBuf::from("/out/traffic-recordings/server-RSA2048_Rate-10000.0_Delay-5.0_Loss-0.1_2024-05-01_09-30-00.pcap")
        );
        assert_eq!(
            artifacts.initiator_pcap.file_name().unwrap(),
            "client-RSA2048_Rate-10000.0_Delay-5.0_Loss-0.1_2024-05-01_09-30-00.pcap"
        );
        assert_eq!(
            artifacts.keylog.file_name().unwrap(),
            "RSA2048_Rate-10000.0_Delay-5.0_Loss-0.1_2024-05-01_09-30-00.secrets"
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_prepare_creates_world_writable_captures() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let artifacts = CaptureArtifacts::prepare(
            dir.path(),
            &Algorithm::post_quantum("falcon512", true),
            &NetworkCondition::baseline(),
            &timestamp(),
        )
        .unwrap();

        for pcap in [&artifacts.responder_pcap, &artifacts.initiator_pcap] {
            let mode = std::fs::metadata(pcap).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o666);
        }
        assert!(artifacts.keylog.exists());
    }

    #[test]
    fn test_capture_command() {
        let recorder = TsharkRecorder::new(
            PathBuf::from("/out/traffic-recordings"),
            LinkPair::default(),
            true,
            Duration::from_secs(2),
            Logger::new("CAPTURE".to_string()),
        );
        let link = LinkPair::default();
        let spec = recorder.capture_command(&link.initiator, Path::new("/out/traffic-recordings/client.pcap"));
        assert_eq!(
            spec.to_string(),
            "sudo ip netns exec ns2 tshark -i veth102 -w /out/traffic-recordings/client.pcap"
        );
    }
}
