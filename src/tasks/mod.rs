//! Background scheduled tasks for the application.
//!
//! Call `spawn_all` once during startup to launch them.

use crate::services::DrawService;

/// Spawn all background tasks.
///
/// The expired-draw sweep is idempotent: a draw leaves the `active` state
/// once it has been finalized, so a missed or repeated tick is harmless.
pub fn spawn_all(draw_service: DrawService, sweep_interval_secs: u64) {
    // 到期抽奖自动开奖
    {
        let svc = draw_service.clone();
        let interval = std::time::Duration::from_secs(sweep_interval_secs.max(1));
        tokio::spawn(async move {
            loop {
                match svc.finalize_expired_draws().await {
                    Ok(n) if n > 0 => log::info!("Expired draws finalized: {n}"),
                    Ok(_) => {}
                    Err(e) => log::error!("Failed to finalize expired draws: {e:?}"),
                }
                tokio::time::sleep(interval).await;
            }
        });
    }
}
