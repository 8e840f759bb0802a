use async_trait::async_trait;

use crate::domain::entities::subscriptions::SubscriptionEntity;

/// Hook fired when retry exhaustion escalates a subscription to suspended.
/// Presentation (mail, push, in-app) lives outside this engine.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SuspensionNotifier: Send + Sync {
    async fn subscription_suspended(&self, subscription: &SubscriptionEntity, reason: &str);
}

/// Default sink: a structured log event operators can alert on.
pub struct LogSuspensionNotifier;

#[async_trait]
impl SuspensionNotifier for LogSuspensionNotifier {
    async fn subscription_suspended(&self, subscription: &SubscriptionEntity, reason: &str) {
        tracing::warn!(
            subscription_id = %subscription.id,
            user_id = %subscription.user_id,
            reason,
            "renewals: subscription suspended after exhausting retries"
        );
    }
}
