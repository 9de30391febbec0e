//! `ProvisioningEngine` implementation backed by the terraform CLI

use crate::terraform::Terraform;
use async_trait::async_trait;
use modcheck_core::{ProvisionError, ProvisionInputs, ProvisionOutputs, ProvisioningEngine};
use tokio_util::sync::CancellationToken;

#[async_trait]
impl ProvisioningEngine for Terraform {
    fn name(&self) -> &str {
        "terraform"
    }

    async fn apply(
        &self,
        inputs: &ProvisionInputs,
        cancel: &CancellationToken,
    ) -> Result<(), ProvisionError> {
        self.init(inputs, cancel).await?;
        Terraform::apply(self, inputs, cancel).await
    }

    async fn outputs(&self, inputs: &ProvisionInputs) -> Result<ProvisionOutputs, ProvisionError> {
        self.output_all(inputs).await
    }

    async fn destroy(&self, inputs: &ProvisionInputs) -> Result<(), ProvisionError> {
        Terraform::destroy(self, inputs).await
    }
}
