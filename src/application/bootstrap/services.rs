use crate::application::bootstrap::persistence::PersistenceHandle;
use crate::application::deletion::DeletionService;
use crate::config::Config;
use tracing::info;

pub struct ServicesBootstrap;

impl ServicesBootstrap {
    /// Wires the deletion service over the persistent store and audit log
    pub fn init(config: &Config, persistence: &PersistenceHandle) -> DeletionService {
        let deletion = &config.deletion;
        info!(
            "Deletion policy: critical -> {}, warnings -> {}, otherwise -> {}; archive after {} days",
            deletion.policy.on_critical,
            deletion.policy.on_warnings,
            deletion.policy.otherwise,
            deletion.archive_after_days
        );

        DeletionService::with_policy(
            persistence.entity_store.clone(),
            deletion.policy,
            deletion.archive_after_days,
        )
        .with_audit(persistence.audit_repository.clone())
    }
}
