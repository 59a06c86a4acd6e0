use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgExecutor, PgPool, Postgres, Transaction as SqlxTransaction};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "account_role", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum AccountRole {
    Student,
    Admin,
    SuperAdmin,
}

impl AccountRole {
    /// Admins and super admins may scan tickets and credit wallets.
    pub fn is_staff(self) -> bool {
        matches!(self, AccountRole::Admin | AccountRole::SuperAdmin)
    }

    pub fn is_super_admin(self) -> bool {
        self == AccountRole::SuperAdmin
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Account {
    pub id: Uuid,
    pub balance: i64,
    pub role: AccountRole,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Account {
    /// Inserts the account if it does not exist yet; signup may call this more than once.
    pub async fn create(pool: &PgPool, id: Uuid) -> sqlx::Result<Self> {
        let now = Utc::now();

        sqlx::query(
            r#"
            INSERT INTO accounts (id, balance, role, created_at, updated_at)
            VALUES ($1, 0, 'student', $2, $2)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(id)
        .bind(now)
        .execute(pool)
        .await?;

        sqlx::query_as::<_, Account>("SELECT * FROM accounts WHERE id = $1")
            .bind(id)
            .fetch_one(pool)
            .await
    }

    pub async fn find_by_id<'e, E>(executor: E, id: Uuid) -> sqlx::Result<Option<Self>>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Account>("SELECT * FROM accounts WHERE id = $1")
            .bind(id)
            .fetch_optional(executor)
            .await
    }

    /// Row-locks the account for the rest of the transaction.
    pub async fn lock_for_update(
        tx: &mut SqlxTransaction<'_, Postgres>,
        id: Uuid,
    ) -> sqlx::Result<Option<Self>> {
        sqlx::query_as::<_, Account>("SELECT * FROM accounts WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut **tx)
            .await
    }

    pub async fn set_balance(
        tx: &mut SqlxTransaction<'_, Postgres>,
        id: Uuid,
        balance: i64,
    ) -> sqlx::Result<Self> {
        sqlx::query_as::<_, Account>(
            r#"
            UPDATE accounts
            SET balance = $1, updated_at = $2
            WHERE id = $3
            RETURNING *
            "#,
        )
        .bind(balance)
        .bind(Utc::now())
        .bind(id)
        .fetch_one(&mut **tx)
        .await
    }

    pub async fn set_role(
        tx: &mut SqlxTransaction<'_, Postgres>,
        id: Uuid,
        role: AccountRole,
    ) -> sqlx::Result<Self> {
        sqlx::query_as::<_, Account>(
            r#"
            UPDATE accounts
            SET role = $1, updated_at = $2
            WHERE id = $3
            RETURNING *
            "#,
        )
        .bind(role)
        .bind(Utc::now())
        .bind(id)
        .fetch_one(&mut **tx)
        .await
    }

    pub async fn count_staff<'e, E>(executor: E) -> sqlx::Result<i64>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM accounts WHERE role IN ('admin', 'super_admin')",
        )
        .fetch_one(executor)
        .await
    }
}
