use actix::prelude::*;
use std::sync::Arc;
use std::time::Duration;

use crate::domain::order::{PromotionReport, StaleOrderPromoter};
use crate::repository::RepositoryError;

// ============================================================================
// Promoter Actor - periodic stale-order sweep
// ============================================================================
//
// Runs StaleOrderPromoter::run_once on a fixed interval. The sweep can also
// be triggered by sending RunPromotion directly.
//
// ============================================================================

// ============================================================================
// Messages
// ============================================================================

#[derive(Message)]
#[rtype(result = "Result<PromotionReport, RepositoryError>")]
pub struct RunPromotion;

// ============================================================================
// Promoter Actor
// ============================================================================

pub struct PromoterActor {
    promoter: Arc<StaleOrderPromoter>,
    interval: Duration,
}

impl PromoterActor {
    pub fn new(promoter: Arc<StaleOrderPromoter>, interval: Duration) -> Self {
        Self { promoter, interval }
    }
}

impl Actor for PromoterActor {
    type Context = Context<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        tracing::info!(interval_secs = self.interval.as_secs(), "PromoterActor started");

        ctx.run_interval(self.interval, |_act, ctx| {
            ctx.notify(RunPromotion);
        });
    }

    fn stopped(&mut self, _ctx: &mut Self::Context) {
        tracing::info!("PromoterActor stopped");
    }
}

impl Handler<RunPromotion> for PromoterActor {
    type Result = ResponseFuture<Result<PromotionReport, RepositoryError>>;

    fn handle(&mut self, _msg: RunPromotion, _ctx: &mut Self::Context) -> Self::Result {
        let promoter = self.promoter.clone();

        Box::pin(async move {
            let result = promoter.run_once().await;
            if let Err(ref e) = result {
                tracing::error!(error = %e, "Promotion sweep failed");
            }
            result
        })
    }
}
