use anyhow::{Context, Result};

use crate::model::{Instance, InstanceAdmin, InstanceState};
use crate::store::traits::InstanceStore;
use crate::store::StoreError;

/// Register the deployment's instance record if none exists yet.
/// Safe to run on every start.
pub async fn register_instance<S: InstanceStore>(store: &S, instance_name: &str) -> Result<Instance> {
    if let InstanceState::Configured(instance) = store.get_instance().await? {
        log::info!("instance {} already registered", instance.instance_id);
        return Ok(instance);
    }

    let instance = Instance::new(
        instance_name.to_string(),
        env!("CARGO_PKG_VERSION").to_string(),
    );

    match store.register_instance(instance).await {
        Ok(instance) => {
            log::info!("registered instance {}", instance.instance_id);
            Ok(instance)
        }
        // Another process registered first
        Err(StoreError::Conflict(_)) => store
            .get_instance()
            .await?
            .into_instance()
            .context("instance registration conflicted but no instance exists"),
        Err(err) => Err(err).context("Failed to register instance"),
    }
}

/// Grant the instance-admin capability to a user
pub async fn grant_instance_admin<S: InstanceStore>(store: &S, user_id: &str) -> Result<()> {
    store
        .add_instance_admin(InstanceAdmin::new(user_id.to_string()))
        .await
        .context("Failed to add instance admin")?;
    log::info!("granted instance admin to {}", user_id);
    Ok(())
}
