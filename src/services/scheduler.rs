use crate::services::ticket::TicketService;
use chrono::Utc;
use log::{error, info};
use std::time::Duration;
use tokio::time;

/// Optional eager expiry. Redemption re-checks the window on every scan, so
/// this only keeps stored statuses from lagging.
pub struct SchedulerService {
    tickets: TicketService,
}

impl SchedulerService {
    pub fn new(tickets: TicketService) -> Self {
        Self { tickets }
    }

    pub fn start_expiry_sweep(&self, every: Duration) {
        let tickets = self.tickets.clone();

        tokio::spawn(async move {
            let mut interval = time::interval(every);
            loop {
                interval.tick().await;

                let today = tickets.local_today(Utc::now());
                if let Err(e) = tickets.expire_stale(today).await {
                    error!("Failed to expire stale tickets: {}", e);
                }
            }
        });

        info!("Ticket expiry sweep started (every {}s)", every.as_secs());
    }
}
