use chrono::Utc;
use tokio::time::{interval, Duration, MissedTickBehavior};

use crate::db::PaymentRepo;
use crate::error::AppError;
use crate::events::PAYMENT_EXPIRED;
use crate::models::PaymentEvent;
use crate::redis_pub::RedisPublisher;

pub fn start_payment_expiration_worker(repo: PaymentRepo, redis_pub: RedisPublisher, every: Duration) {
    tokio::spawn(async move {
        let mut timer = interval(every);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            timer.tick().await;

            match expire_overdue_payments(&repo, &redis_pub).await {
                Ok(0) => tracing::debug!("payment expiration check complete"),
                Ok(count) => tracing::info!(count, "expired overdue payments"),
                Err(e) => tracing::error!(error = %e, "payment expiration worker error"),
            }
        }
    });
}

async fn expire_overdue_payments(repo: &PaymentRepo, redis_pub: &RedisPublisher) -> Result<usize, AppError> {
    let expired = repo.expire_overdue(Utc::now()).await?;

    for payment in &expired {
        if let Err(e) = redis_pub.publish(PAYMENT_EXPIRED, &PaymentEvent::new(PAYMENT_EXPIRED, payment)).await {
            tracing::error!(payment_number = %payment.payment_number, error = %e, "redis publish error");
        }
    }

    Ok(expired.len())
}
