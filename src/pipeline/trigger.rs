//! Scheduled trigger: enqueue every enabled target.

use crate::error::StorageError;
use crate::queue::evaluation::{EnqueueStatus, EvaluationQueue};
use crate::queue::request::{EvaluationRequest, TargetKey};
use crate::storage::targets::TargetStore;

/// Enqueue one request per enabled target. Disabled targets are skipped.
pub async fn enqueue_enabled_targets(
    queue: &EvaluationQueue,
    targets: &dyn TargetStore,
) -> Result<Vec<(TargetKey, EnqueueStatus)>, StorageError> {
    let all = targets.list().await?;
    let mut statuses = Vec::with_capacity(all.len());
    let mut skipped_disabled = 0;

    for target in all {
        if !target.enabled {
            skipped_disabled += 1;
            continue;
        }
        let request = EvaluationRequest::from(&target);
        let key = request.key();
        let status = queue.enqueue(request);
        statuses.push((key, status));
    }

    let accepted = statuses.iter().filter(|(_, s)| s.is_accepted()).count();
    log::info!(
        "TRIGGER_COMPLETE enqueued={} not_enqueued={} disabled={}",
        accepted,
        statuses.len() - accepted,
        skipped_disabled
    );
    Ok(statuses)
}
