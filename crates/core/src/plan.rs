//! Changeset plans: a declarative list of calls grouped by deployment context.

use std::{collections::HashMap, path::Path};

use alloy_core::primitives::{Address, Bytes, U256};
use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::{
    CallRequest, CapturedTransaction, ChainClient, ChainSelector, DeployerGroup,
    DeployerGroupBuilder, RecordingTransactor, error::Result,
};

/// One call of a plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlannedCall {
    pub network: ChainSelector,
    pub to: Address,
    #[serde(default)]
    pub data: Bytes,
    #[serde(default)]
    pub value: U256,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gas_limit: Option<u64>,
}

impl From<&PlannedCall> for CallRequest {
    fn from(call: &PlannedCall) -> Self {
        let request = CallRequest::new(call.to)
            .data(call.data.clone())
            .value(call.value);
        match call.gas_limit {
            Some(gas_limit) => request.gas_limit(gas_limit),
            None => request,
        }
    }
}

/// Calls captured under one deployment context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlannedContext {
    pub description: String,
    #[serde(default)]
    pub calls: Vec<PlannedCall>,
}

/// An ordered set of deployment contexts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangesetPlan {
    #[serde(default)]
    pub contexts: Vec<PlannedContext>,
}

impl ChangesetPlan {
    pub fn load_from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .context(format!("Failed to read plan from {}", path.display()))?;
        let plan: Self = toml::from_str(&content).context("Failed to parse plan file as TOML")?;
        if plan.contexts.is_empty() {
            anyhow::bail!("Plan {} declares no deployment context", path.display());
        }
        Ok(plan)
    }

    /// Description of the first context, used as root of the group.
    pub fn root_description(&self) -> &str {
        self.contexts
            .first()
            .map(|c| c.description.as_str())
            .unwrap_or("changeset")
    }

    /// Finish `builder` with this plan's root context.
    pub fn group<'a, C: ChainClient>(
        &self,
        builder: DeployerGroupBuilder<'a, C>,
    ) -> DeployerGroup<'a, C> {
        builder.with_deployment_context(self.root_description())
    }

    /// Capture every call of the plan into `group`.
    ///
    /// The first context reuses the group's current context, each later one
    /// forks it. Returns the captured transactions in plan order.
    pub async fn apply<C: ChainClient>(
        &self,
        group: &mut DeployerGroup<'_, C>,
    ) -> Result<Vec<CapturedTransaction>> {
        let mut transactors: HashMap<ChainSelector, RecordingTransactor> = HashMap::new();
        let mut captured = Vec::new();

        for (index, context) in self.contexts.iter().enumerate() {
            if index > 0 {
                group.with_deployment_context(context.description.clone());
            }

            for call in &context.calls {
                if !transactors.contains_key(&call.network) {
                    let transactor = group.transactor(call.network).await?;
                    transactors.insert(call.network, transactor);
                }
                let transactor = &transactors[&call.network];
                captured.push(transactor.sign(call.into())?);
            }

            tracing::info!(
                context = %context.description,
                calls = context.calls.len(),
                "Captured deployment context"
            );
        }

        Ok(captured)
    }
}
