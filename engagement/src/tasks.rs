use crate::models::interaction::InteractionKind;
use crate::services::reconciler::Reconciler;
use log::{error, info};
use std::sync::Arc;
use std::time::Duration;
use strum::IntoEnumIterator;
use tokio::time;

/// Schedules every domain's reconcile handler on its own interval. Another instance
/// running the same schedule is fine: the domain lock makes one of them skip.
pub async fn reconcile_task(reconciler: Arc<Reconciler>, interval: Duration) {
    for kind in InteractionKind::iter() {
        let reconciler = reconciler.clone();
        let mut reconcile_interval = time::interval(interval);
        reconcile_interval.set_missed_tick_behavior(time::MissedTickBehavior::Delay);

        tokio::spawn(async move {
            loop {
                reconcile_interval.tick().await;

                let _ = reconciler.run(kind).await.map_err(|e| {
                    error!("{} failed: {}", kind.handler_name(), e);
                });
            }
        });

        info!("{} scheduled every {:?}", kind.handler_name(), interval);
    }
}
