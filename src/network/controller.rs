//! `tc netem` impairment on both link endpoints

use super::{LinkEndpoint, LinkPair};
use crate::error::{AppError, ErrorContext, Result};
use crate::exec::{CommandRunner, CommandSpec};
use crate::logging::NetworkLogger;
use crate::types::NetworkCondition;
use std::sync::Arc;

/// How the qdisc is written
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QdiscAction {
    /// Create or overwrite the root qdisc
    Replace,
    /// Modify the existing netem qdisc
    Change,
}

impl QdiscAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Replace => "replace",
            Self::Change => "change",
        }
    }
}

/// Applies a symmetric condition to the responder and initiator endpoints.
///
/// Both endpoints are changed back-to-back; no trial runs in between.
/// Re-applying the condition in force leaves the link unchanged.
pub struct NetworkConditionController {
    runner: Arc<dyn CommandRunner>,
    link: LinkPair,
    use_sudo: bool,
    logger: NetworkLogger,
}

impl NetworkConditionController {
    pub fn new(runner: Arc<dyn CommandRunner>, link: LinkPair, use_sudo: bool, logger: NetworkLogger) -> Self {
        Self {
            runner,
            link,
            use_sudo,
            logger,
        }
    }

    pub fn link(&self) -> &LinkPair {
        &self.link
    }

    pub fn qdisc_command(
        &self,
        endpoint: &LinkEndpoint,
        action: QdiscAction,
        condition: &NetworkCondition,
    ) -> CommandSpec {
        CommandSpec::new("tc")
            .args(["qdisc", action.as_str(), "dev"])
            .arg(endpoint.device.as_str())
            .args(["root", "netem"])
            .args(condition.netem_args())
            .in_namespace(&endpoint.namespace, self.use_sudo)
    }

    /// Install the root netem qdisc on both endpoints
    pub async fn install(&self, condition: &NetworkCondition) -> Result<()> {
        self.write(QdiscAction::Replace, condition).await
    }

    /// Switch both endpoints to `condition`
    pub async fn apply(&self, condition: &NetworkCondition) -> Result<()> {
        self.write(QdiscAction::Change, condition).await
    }

    async fn write(&self, action: QdiscAction, condition: &NetworkCondition) -> Result<()> {
        condition.validate()?;

        for endpoint in self.link.endpoints() {
            let spec = self.qdisc_command(endpoint, action, condition);
            let output = self
                .runner
                .run(&spec)
                .await
                .with_context(|| format!("Impairing {}", endpoint.device))?;
            self.logger
                .log_command(&spec.to_string(), output.success(), output.code)
                .await;

            if !output.success() {
                return Err(AppError::environment(format!(
                    "Cannot {} netem on {}/{}: {}",
                    action.as_str(),
                    endpoint.namespace,
                    endpoint.device,
                    output.describe_failure()
                )));
            }

            self.logger
                .log_condition_applied(condition, &endpoint.namespace, &endpoint.device)
                .await;
        }

        Ok(())
    }
}
