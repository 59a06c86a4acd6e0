use chrono::{DateTime, Utc};
use rand::{distr::Alphanumeric, Rng};
use serde::{Deserialize, Serialize};
use sqlx::{PgExecutor, Postgres, Transaction as SqlxTransaction};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "transaction_kind", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    Deposit,
    Purchase,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "transaction_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    Pending,
    Completed,
    Cancelled,
}

/// One ledger row. `amount` is signed: deposits are positive, purchases negative.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Transaction {
    pub id: Uuid,
    pub account_id: Uuid,
    pub amount: i64,
    pub kind: TransactionKind,
    pub status: TransactionStatus,
    pub external_ref: Option<String>,
    pub description: String,
    pub balance_before: i64,
    pub balance_after: Option<i64>,
    pub performed_by: Option<Uuid>,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewTransaction<'a> {
    pub account_id: Uuid,
    pub amount: i64,
    pub kind: TransactionKind,
    pub status: TransactionStatus,
    pub external_ref: Option<&'a str>,
    pub description: &'a str,
    pub balance_before: i64,
    pub balance_after: Option<i64>,
    pub performed_by: Option<Uuid>,
}

impl Transaction {
    /// Builds a fresh gateway reference, e.g. `TOPUP-20250301-k3J9...`.
    pub fn generate_external_ref() -> String {
        let suffix: String = rand::rng()
            .sample_iter(&Alphanumeric)
            .take(20)
            .map(char::from)
            .collect();

        format!("TOPUP-{}-{}", Utc::now().format("%Y%m%d"), suffix)
    }

    pub async fn insert<'e, E>(executor: E, new: &NewTransaction<'_>) -> sqlx::Result<Self>
    where
        E: PgExecutor<'e>,
    {
        let now = Utc::now();

        sqlx::query_as::<_, Transaction>(
            r#"
            INSERT INTO transactions (
                id, account_id, amount, kind, status, external_ref, description,
                balance_before, balance_after, performed_by, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $11)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(new.account_id)
        .bind(new.amount)
        .bind(new.kind)
        .bind(new.status)
        .bind(new.external_ref)
        .bind(new.description)
        .bind(new.balance_before)
        .bind(new.balance_after)
        .bind(new.performed_by)
        .bind(now)
        .fetch_one(executor)
        .await
    }

    pub async fn find_by_external_ref<'e, E>(
        executor: E,
        external_ref: &str,
    ) -> sqlx::Result<Option<Self>>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Transaction>("SELECT * FROM transactions WHERE external_ref = $1")
            .bind(external_ref)
            .fetch_optional(executor)
            .await
    }

    pub async fn lock_by_external_ref(
        tx: &mut SqlxTransaction<'_, Postgres>,
        external_ref: &str,
    ) -> sqlx::Result<Option<Self>> {
        sqlx::query_as::<_, Transaction>(
            "SELECT * FROM transactions WHERE external_ref = $1 FOR UPDATE",
        )
        .bind(external_ref)
        .fetch_optional(&mut **tx)
        .await
    }

    pub async fn find_by_account<'e, E>(
        executor: E,
        account_id: Uuid,
        limit: i64,
    ) -> sqlx::Result<Vec<Self>>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Transaction>(
            r#"
            SELECT * FROM transactions
            WHERE account_id = $1
            ORDER BY created_at DESC
            LIMIT $2
            "#,
        )
        .bind(account_id)
        .bind(limit)
        .fetch_all(executor)
        .await
    }

    pub async fn pending_deposits<'e, E>(executor: E, account_id: Uuid) -> sqlx::Result<Vec<Self>>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Transaction>(
            r#"
            SELECT * FROM transactions
            WHERE account_id = $1 AND kind = 'deposit' AND status = 'pending'
            "#,
        )
        .bind(account_id)
        .fetch_all(executor)
        .await
    }

    pub async fn mark_completed(
        tx: &mut SqlxTransaction<'_, Postgres>,
        id: Uuid,
        balance_after: i64,
    ) -> sqlx::Result<Self> {
        sqlx::query_as::<_, Transaction>(
            r#"
            UPDATE transactions
            SET status = 'completed', balance_after = $1, updated_at = $2
            WHERE id = $3 AND status = 'pending'
            RETURNING *
            "#,
        )
        .bind(balance_after)
        .bind(Utc::now())
        .bind(id)
        .fetch_one(&mut **tx)
        .await
    }

    /// Cancels a single intent. Returns `None` when it was no longer pending.
    pub async fn cancel<'e, E>(executor: E, id: Uuid, note: &str) -> sqlx::Result<Option<Self>>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Transaction>(
            r#"
            UPDATE transactions
            SET status = 'cancelled', note = $1, updated_at = $2
            WHERE id = $3 AND status = 'pending'
            RETURNING *
            "#,
        )
        .bind(note)
        .bind(Utc::now())
        .bind(id)
        .fetch_optional(executor)
        .await
    }

    pub async fn cancel_pending_deposits<'e, E>(
        executor: E,
        account_id: Uuid,
        note: &str,
    ) -> sqlx::Result<Vec<Self>>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Transaction>(
            r#"
            UPDATE transactions
            SET status = 'cancelled', note = $1, updated_at = $2
            WHERE account_id = $3 AND kind = 'deposit' AND status = 'pending'
            RETURNING *
            "#,
        )
        .bind(note)
        .bind(Utc::now())
        .bind(account_id)
        .fetch_all(executor)
        .await
    }

    /// Sum of completed deltas; must always equal the cached account balance.
    pub async fn completed_sum<'e, E>(executor: E, account_id: Uuid) -> sqlx::Result<i64>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COALESCE(SUM(amount), 0)::BIGINT FROM transactions
            WHERE account_id = $1 AND status = 'completed'
            "#,
        )
        .bind(account_id)
        .fetch_one(executor)
        .await
    }
}
