//! Namespace topology lifecycle

use super::{LinkPair, NetworkConditionController};
use crate::error::{AppError, ErrorContext, Result};
use crate::exec::{CommandOutput, CommandRunner, CommandSpec};
use crate::logging::NetworkLogger;
use crate::types::NetworkCondition;
use std::path::PathBuf;
use std::sync::Arc;

/// External scripts creating and removing the namespaces and veth pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopologyScripts {
    pub setup: PathBuf,
    pub cleanup: PathBuf,
}

impl TopologyScripts {
    pub fn setup_command(&self) -> CommandSpec {
        CommandSpec::new("bash").arg(self.setup.display().to_string())
    }

    pub fn cleanup_command(&self) -> CommandSpec {
        CommandSpec::new("bash").arg(self.cleanup.display().to_string())
    }
}

/// Brings the two-namespace link up and down
pub struct Topology {
    runner: Arc<dyn CommandRunner>,
    scripts: TopologyScripts,
    link: LinkPair,
    use_sudo: bool,
    logger: NetworkLogger,
}

impl Topology {
    pub fn new(
        runner: Arc<dyn CommandRunner>,
        scripts: TopologyScripts,
        link: LinkPair,
        use_sudo: bool,
        logger: NetworkLogger,
    ) -> Self {
        Self {
            runner,
            scripts,
            link,
            use_sudo,
            logger,
        }
    }

    /// Clean slate, setup (retried once after a cleanup), baseline netem and
    /// static neighbour entries
    pub async fn bring_up(&self, controller: &NetworkConditionController) -> Result<()> {
        // Leftovers from an earlier run may or may not exist
        let cleaned = self.run_script(&self.scripts.cleanup_command()).await?;
        self.logger.log_topology_step("Initial cleanup", cleaned.success()).await;

        let setup = self.run_script(&self.scripts.setup_command()).await?;
        if !setup.success() {
            self.logger.log_topology_step("Namespace setup", false).await;

            let cleaned = self.run_script(&self.scripts.cleanup_command()).await?;
            self.logger.log_topology_step("Cleanup before retry", cleaned.success()).await;

            let retry = self.run_script(&self.scripts.setup_command()).await?;
            if !retry.success() {
                self.logger.log_topology_step("Namespace setup retry", false).await;
                return Err(AppError::environment(format!(
                    "Namespace setup failed and cleanup did not help: {}",
                    retry.describe_failure()
                )));
            }
        }
        self.logger.log_topology_step("Namespace setup", true).await;

        controller
            .install(&NetworkCondition::baseline())
            .await
            .context("Installing baseline impairment")?;

        self.install_neighbours().await?;
        self.logger.log_topology_step("Static neighbours", true).await;
        Ok(())
    }

    /// Run the cleanup script; failure is fatal
    pub async fn teardown(&self) -> Result<()> {
        let output = self.run_script(&self.scripts.cleanup_command()).await?;
        self.logger.log_topology_step("Namespace cleanup", output.success()).await;

        if output.success() {
            Ok(())
        } else {
            Err(AppError::environment(format!(
                "Namespace cleanup failed: {}",
                output.describe_failure()
            )))
        }
    }

    /// Permanent neighbour entries so heavy loss cannot stall on ARP
    pub fn neighbour_commands(&self) -> Vec<CommandSpec> {
        self.link
            .neighbours()
            .into_iter()
            .map(|(local, peer)| {
                CommandSpec::new("ip")
                    .args(["neighbor", "replace"])
                    .arg(peer.address.as_str())
                    .arg("lladdr")
                    .arg(peer.mac.as_str())
                    .args(["nud", "permanent", "dev"])
                    .arg(local.device.as_str())
                    .in_namespace(&local.namespace, self.use_sudo)
            })
            .collect()
    }

    async fn install_neighbours(&self) -> Result<()> {
        for spec in self.neighbour_commands() {
            let output = self.runner.run(&spec).await?;
            self.logger
                .log_command(&spec.to_string(), output.success(), output.code)
                .await;
            if !output.success() {
                return Err(AppError::environment(format!(
                    "'{}' failed: {}",
                    spec,
                    output.describe_failure()
                )));
            }
        }
        Ok(())
    }

    async fn run_script(&self, spec: &CommandSpec) -> Result<CommandOutput> {
        let output = self
            .runner
            .run(spec)
            .await
            .with_context(|| format!("Running {}", spec))?;
        self.logger
            .log_command(&spec.to_string(), output.success(), output.code)
            .await;
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Config;
    use crate::test_support::FakeCommandRunner;

    fn scripts() -> TopologyScripts {
        TopologyScripts {
            setup: PathBuf::from("./scripts/nspace-setup.sh"),
            cleanup: PathBuf::from("./scripts/nspace-cleanup.sh"),
        }
    }

    fn parts(runner: &Arc<FakeCommandRunner>) -> (Topology, NetworkConditionController) {
        let config = Config { quiet: true, ..Default::default() };
        let shared: Arc<dyn CommandRunner> = runner.clone();
        let topology = Topology::new(
            shared.clone(),
            scripts(),
            LinkPair::default(),
            true,
            NetworkLogger::new(&config),
        );
        let controller =
            NetworkConditionController::new(shared, LinkPair::default(), true, NetworkLogger::new(&config));
        (topology, controller)
    }

    #[tokio::test]
    async fn test_bring_up_sequence() {
        let runner = Arc::new(FakeCommandRunner::new());
        let (topology, controller) = parts(&runner);
        topology.bring_up(&controller).await.unwrap();

        let calls = runner.calls();
        assert_eq!(calls[0], "bash ./scripts/nspace-cleanup.sh");
        assert_eq!(calls[1], "bash ./scripts/nspace-setup.sh");
        assert!(calls[2].contains("ns1 tc qdisc replace dev veth101 root netem rate 10000.0mbit delay 0.0ms loss 0.0%"));
        assert!(calls[3].contains("ns2 tc qdisc replace dev veth102"));
        assert_eq!(
            calls[4],
            "sudo ip netns exec ns1 ip neighbor replace 192.168.102.1 lladdr 00:00:00:00:00:02 nud permanent dev veth101"
        );
        assert_eq!(
            calls[5],
            "sudo ip netns exec ns2 ip neighbor replace 192.168.101.1 lladdr 00:00:00:00:00:01 nud permanent dev veth102"
        );
        assert_eq!(calls.len(), 6);
    }

    #[tokio::test]
    async fn test_failed_initial_cleanup_is_tolerated() {
        let runner = Arc::new(FakeCommandRunner::new());
        runner.respond("nspace-cleanup", CommandOutput::failed(1, "Cannot remove namespace file"));
        let (topology, controller) = parts(&runner);
        assert!(topology.bring_up(&controller).await.is_ok());
    }

    #[tokio::test]
    async fn test_setup_retried_once_after_cleanup() {
        let runner = Arc::new(FakeCommandRunner::new());
        runner.respond("nspace-setup", CommandOutput::failed(1, "File exists"));
        runner.respond("nspace-setup", CommandOutput::ok(""));
        let (topology, controller) = parts(&runner);
        topology.bring_up(&controller).await.unwrap();

        assert_eq!(runner.calls_matching("nspace-setup"), 2);
        assert_eq!(runner.calls_matching("nspace-cleanup"), 2);
    }

    #[tokio::test]
    async fn test_setup_failing_twice_aborts() {
        let runner = Arc::new(FakeCommandRunner::new());
        runner.respond("nspace-setup", CommandOutput::failed(1, "File exists"));
        let (topology, controller) = parts(&runner);

        let error = topology.bring_up(&controller).await.unwrap_err();
        assert!(matches!(error, AppError::Environment(_)));
        assert_eq!(runner.calls_matching("nspace-setup"), 2);
        assert_eq!(runner.calls_matching("tc qdisc"), 0);
    }

    #[tokio::test]
    async fn test_teardown_failure_is_fatal() {
        let runner = Arc::new(FakeCommandRunner::new());
        runner.respond("nspace-cleanup", CommandOutput::failed(1, "busy"));
        let (topology, _) = parts(&runner);
        let error = topology.teardown().await.unwrap_err();
        assert_eq!(error.exit_code(), 2);
    }
}
