use crate::error::{ServiceError, ServiceResult};
use crate::models::settings::local_today;
use crate::models::{MealType, NewTicket, Ticket, TicketStatus, WindowCheck};
use crate::services::payload::{render_qr_svg, RedemptionPayload};
use crate::services::settings::SettingsSource;
use crate::services::wallet::WalletLedger;
use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use log::{debug, info, warn};
use serde::Serialize;
use sqlx::PgPool;
use uuid::Uuid;

/// What the purchaser gets back per ticket.
#[derive(Debug, Clone, Serialize)]
pub struct IssuedTicket {
    pub id: Uuid,
    pub meal_type: MealType,
    pub meal_date: NaiveDate,
    pub price: i64,
    pub qr_payload: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct PurchaseReceipt {
    pub tickets: Vec<IssuedTicket>,
    pub total: i64,
    pub balance: i64,
    pub transaction_id: Uuid,
}

#[derive(Debug, Clone, Serialize)]
pub struct Redemption {
    pub ticket_id: Uuid,
    pub owner_id: Uuid,
    pub meal_type: MealType,
    pub meal_date: NaiveDate,
    pub used_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct TicketService {
    pool: PgPool,
    settings: SettingsSource,
    max_per_purchase: i32,
    offset: FixedOffset,
}

impl TicketService {
    pub fn new(
        pool: PgPool,
        settings: SettingsSource,
        max_per_purchase: i32,
        offset: FixedOffset,
    ) -> Self {
        Self {
            pool,
            settings,
            max_per_purchase,
            offset,
        }
    }

    pub async fn purchase(
        &self,
        account_id: Uuid,
        meal_type: MealType,
        meal_date: NaiveDate,
        quantity: i32,
    ) -> ServiceResult<PurchaseReceipt> {
        self.purchase_at(account_id, meal_type, meal_date, quantity, Utc::now())
            .await
    }

    /// Debit and ticket issue share one database transaction: either the
    /// wallet is charged and every ticket exists, or nothing happened.
    pub async fn purchase_at(
        &self,
        account_id: Uuid,
        meal_type: MealType,
        meal_date: NaiveDate,
        quantity: i32,
        now: DateTime<Utc>,
    ) -> ServiceResult<PurchaseReceipt> {
        if quantity < 1 || quantity > self.max_per_purchase {
            return Err(ServiceError::InvalidQuantity {
                requested: quantity,
                max: self.max_per_purchase,
            });
        }
        if meal_date < local_today(now, self.offset) {
            return Err(ServiceError::InvalidMealDate(meal_date));
        }

        let settings = self.settings.snapshot(&self.pool).await?;
        let price = settings.meal(meal_type).price;
        let total = price
            .checked_mul(i64::from(quantity))
            .ok_or_else(|| ServiceError::InvalidAmount("Purchase total overflows".to_string()))?;

        let description = format!("{} x {} for {}", quantity, meal_type, meal_date);

        let mut tx = self.pool.begin().await?;
        let debit = WalletLedger::debit_in_transaction(&mut tx, account_id, total, &description).await?;

        let mut tickets = Vec::with_capacity(quantity as usize);
        for _ in 0..quantity {
            let id = Uuid::new_v4();
            let payload = RedemptionPayload::generate(id, account_id, meal_date).encode();

            let ticket = Ticket::insert(
                &mut *tx,
                &NewTicket {
                    id,
                    owner_id: account_id,
                    purchase_transaction_id: debit.id,
                    meal_type,
                    meal_date,
                    price,
                    qr_payload: payload,
                },
            )
            .await?;

            tickets.push(IssuedTicket {
                id: ticket.id,
                meal_type: ticket.meal_type,
                meal_date: ticket.meal_date,
                price: ticket.price,
                qr_payload: ticket.qr_payload,
            });
        }

        tx.commit().await?;

        let balance = debit
            .balance_after
            .ok_or_else(|| ServiceError::Internal("completed debit without balance".to_string()))?;

        info!(
            "Account {} bought {} {} ticket(s) for {} (total {}, balance {})",
            account_id, quantity, meal_type, meal_date, total, balance
        );

        Ok(PurchaseReceipt {
            tickets,
            total,
            balance,
            transaction_id: debit.id,
        })
    }

    pub async fn redeem(&self, payload: &str, admin_id: Uuid) -> ServiceResult<Redemption> {
        self.redeem_at(payload, admin_id, Utc::now()).await
    }

    /// Scans a payload. The ticket row stays locked from the status read to
    /// the status write, so of two simultaneous scans one wins and the other
    /// sees `used`.
    pub async fn redeem_at(
        &self,
        payload: &str,
        admin_id: Uuid,
        now: DateTime<Utc>,
    ) -> ServiceResult<Redemption> {
        let decoded = RedemptionPayload::decode(payload)?;
        let settings = self.settings.snapshot(&self.pool).await?;

        let mut tx = self.pool.begin().await?;

        let ticket = Ticket::lock_by_id(&mut tx, decoded.ticket_id)
            .await?
            .filter(|t| {
                t.qr_payload == payload.trim()
                    && t.owner_id == decoded.owner_id
                    && t.meal_date == decoded.meal_date
            })
            .ok_or(ServiceError::TicketNotFound)?;

        match ticket.status {
            TicketStatus::Used => {
                debug!("Ticket {} scanned again after use", ticket.id);
                return Err(ServiceError::AlreadyUsed);
            }
            TicketStatus::Expired => return Err(ServiceError::Expired),
            TicketStatus::Active => {}
        }

        match settings
            .meal(ticket.meal_type)
            .check_window(ticket.meal_date, now, self.offset)
        {
            WindowCheck::Expired => {
                Ticket::mark_expired(&mut *tx, ticket.id).await?;
                tx.commit().await?;
                info!("Ticket {} expired on scan", ticket.id);
                Err(ServiceError::Expired)
            }
            WindowCheck::OutsideWindow => {
                debug!(
                    "Ticket {} scanned outside the {} window",
                    ticket.id, ticket.meal_type
                );
                Err(ServiceError::OutsideWindow)
            }
            WindowCheck::Open => {
                let used = Ticket::mark_used(&mut *tx, ticket.id, admin_id, now)
                    .await?
                    .ok_or(ServiceError::AlreadyUsed)?;
                tx.commit().await?;

                info!(
                    "Ticket {} ({}) redeemed by admin {}",
                    used.id, used.meal_type, admin_id
                );

                Ok(Redemption {
                    ticket_id: used.id,
                    owner_id: used.owner_id,
                    meal_type: used.meal_type,
                    meal_date: used.meal_date,
                    used_at: used.used_at.unwrap_or(now),
                })
            }
        }
    }

    pub async fn tickets_for_owner(&self, owner_id: Uuid) -> ServiceResult<Vec<Ticket>> {
        self.tickets_for_owner_at(owner_id, Utc::now()).await
    }

    /// Lists an owner's tickets, persisting any expiry that is now due.
    pub async fn tickets_for_owner_at(
        &self,
        owner_id: Uuid,
        now: DateTime<Utc>,
    ) -> ServiceResult<Vec<Ticket>> {
        let today = local_today(now, self.offset);
        let mut tickets = Ticket::find_by_owner(&self.pool, owner_id).await?;

        for ticket in tickets.iter_mut() {
            if ticket.status == TicketStatus::Active && ticket.meal_date < today {
                if let Some(expired) = Ticket::mark_expired(&self.pool, ticket.id).await? {
                    *ticket = expired;
                } else if let Some(current) = Ticket::find_by_id(&self.pool, ticket.id).await? {
                    *ticket = current;
                }
            }
        }

        Ok(tickets)
    }

    pub async fn qr_svg(&self, ticket_id: Uuid, owner_id: Uuid) -> ServiceResult<String> {
        let ticket = Ticket::find_by_id(&self.pool, ticket_id)
            .await?
            .filter(|t| t.owner_id == owner_id)
            .ok_or(ServiceError::TicketNotFound)?;

        if ticket.status.is_terminal() {
            warn!("QR requested for ticket {} in status {:?}", ticket.id, ticket.status);
        }

        render_qr_svg(&ticket.qr_payload)
    }

    /// Marks every active ticket dated before `today` as expired.
    pub async fn expire_stale(&self, today: NaiveDate) -> ServiceResult<u64> {
        let count = Ticket::expire_before(&self.pool, today).await?;
        if count > 0 {
            info!("Expired {} stale ticket(s) dated before {}", count, today);
        }
        Ok(count)
    }

    pub fn local_today(&self, now: DateTime<Utc>) -> NaiveDate {
        local_today(now, self.offset)
    }
}
