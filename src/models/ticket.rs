use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgExecutor, Postgres, Transaction as SqlxTransaction};
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "meal_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum MealType {
    Breakfast,
    Lunch,
    Dinner,
}

impl fmt::Display for MealType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MealType::Breakfast => "breakfast",
            MealType::Lunch => "lunch",
            MealType::Dinner => "dinner",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "ticket_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TicketStatus {
    Active,
    Used,
    Expired,
}

impl TicketStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, TicketStatus::Active)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Ticket {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub purchase_transaction_id: Uuid,
    pub meal_type: MealType,
    pub meal_date: NaiveDate,
    pub price: i64,
    pub status: TicketStatus,
    #[serde(skip_serializing)]
    pub qr_payload: String,
    pub created_at: DateTime<Utc>,
    pub used_at: Option<DateTime<Utc>>,
    pub validated_by: Option<Uuid>,
}

#[derive(Debug, Clone)]
pub struct NewTicket {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub purchase_transaction_id: Uuid,
    pub meal_type: MealType,
    pub meal_date: NaiveDate,
    pub price: i64,
    pub qr_payload: String,
}

impl Ticket {
    pub async fn insert<'e, E>(executor: E, new: &NewTicket) -> sqlx::Result<Self>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Ticket>(
            r#"
            INSERT INTO tickets (
                id, owner_id, purchase_transaction_id, meal_type, meal_date,
                price, status, qr_payload, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, 'active', $7, $8)
            RETURNING *
            "#,
        )
        .bind(new.id)
        .bind(new.owner_id)
        .bind(new.purchase_transaction_id)
        .bind(new.meal_type)
        .bind(new.meal_date)
        .bind(new.price)
        .bind(&new.qr_payload)
        .bind(Utc::now())
        .fetch_one(executor)
        .await
    }

    pub async fn find_by_id<'e, E>(executor: E, id: Uuid) -> sqlx::Result<Option<Self>>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Ticket>("SELECT * FROM tickets WHERE id = $1")
            .bind(id)
            .fetch_optional(executor)
            .await
    }

    pub async fn lock_by_id(
        tx: &mut SqlxTransaction<'_, Postgres>,
        id: Uuid,
    ) -> sqlx::Result<Option<Self>> {
        sqlx::query_as::<_, Ticket>("SELECT * FROM tickets WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut **tx)
            .await
    }

    pub async fn find_by_owner<'e, E>(executor: E, owner_id: Uuid) -> sqlx::Result<Vec<Self>>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Ticket>(
            r#"
            SELECT * FROM tickets
            WHERE owner_id = $1
            ORDER BY meal_date DESC, created_at DESC
            "#,
        )
        .bind(owner_id)
        .fetch_all(executor)
        .await
    }

    /// active -> used. `None` means some other scan got there first.
    pub async fn mark_used<'e, E>(
        executor: E,
        id: Uuid,
        validated_by: Uuid,
        used_at: DateTime<Utc>,
    ) -> sqlx::Result<Option<Self>>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Ticket>(
            r#"
            UPDATE tickets
            SET status = 'used', used_at = $1, validated_by = $2
            WHERE id = $3 AND status = 'active'
            RETURNING *
            "#,
        )
        .bind(used_at)
        .bind(validated_by)
        .bind(id)
        .fetch_optional(executor)
        .await
    }

    pub async fn mark_expired<'e, E>(executor: E, id: Uuid) -> sqlx::Result<Option<Self>>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Ticket>(
            r#"
            UPDATE tickets
            SET status = 'expired'
            WHERE id = $1 AND status = 'active'
            RETURNING *
            "#,
        )
        .bind(id)
        .fetch_optional(executor)
        .await
    }

    /// Bulk active -> expired for every ticket dated before `today`.
    pub async fn expire_before<'e, E>(executor: E, today: NaiveDate) -> sqlx::Result<u64>
    where
        E: PgExecutor<'e>,
    {
        let result = sqlx::query(
            r#"
            UPDATE tickets
            SET status = 'expired'
            WHERE status = 'active' AND meal_date < $1
            "#,
        )
        .bind(today)
        .execute(executor)
        .await?;

        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_active_is_non_terminal() {
        assert!(!TicketStatus::Active.is_terminal());
        assert!(TicketStatus::Used.is_terminal());
        assert!(TicketStatus::Expired.is_terminal());
    }

    #[test]
    fn meal_type_round_trips_through_json_and_display() {
        let meal: MealType = serde_json::from_str("\"lunch\"").unwrap();
        assert_eq!(meal, MealType::Lunch);
        assert_eq!(meal.to_string(), "lunch");
    }

    #[test]
    fn payload_is_not_serialized() {
        let ticket = Ticket {
            id: Uuid::new_v4(),
            owner_id: Uuid::new_v4(),
            purchase_transaction_id: Uuid::new_v4(),
            meal_type: MealType::Dinner,
            meal_date: NaiveDate::from_ymd_opt(2025, 3, 1).unwrap(),
            price: 1000,
            status: TicketStatus::Active,
            qr_payload: "secret".to_string(),
            created_at: Utc::now(),
            used_at: None,
            validated_by: None,
        };

        let json = serde_json::to_value(&ticket).unwrap();
        assert!(json.get("qr_payload").is_none());
        assert_eq!(json["status"], "active");
    }
}
