use crate::error::{ServiceError, ServiceResult};
use crate::models::{Account, AccountRole};
use log::{info, warn};
use sqlx::PgPool;
use uuid::Uuid;

// advisory lock key serializing role changes
const ROLE_CHANGE_LOCK: i64 = 0x6d65_616c_726f_6c65;

#[derive(Clone)]
pub struct AccountService {
    pool: PgPool,
}

impl AccountService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Creates the caller's account with a zero balance. Repeat calls return
    /// the existing account unchanged.
    pub async fn create(&self, id: Uuid) -> ServiceResult<Account> {
        let account = Account::create(&self.pool, id).await?;
        info!("Account {} ready (role {:?})", account.id, account.role);
        Ok(account)
    }

    pub async fn get(&self, id: Uuid) -> ServiceResult<Account> {
        Account::find_by_id(&self.pool, id)
            .await?
            .ok_or(ServiceError::AccountNotFound(id))
    }

    /// Changes a role. Only super admins may do this, and the number of staff
    /// accounts never exceeds `max_admins`.
    pub async fn set_role(
        &self,
        actor: &Account,
        target: Uuid,
        role: AccountRole,
        max_admins: i64,
    ) -> ServiceResult<Account> {
        if !actor.role.is_super_admin() {
            warn!("Account {} tried to change the role of {}", actor.id, target);
            return Err(ServiceError::Forbidden(
                "Only super admins can change roles".to_string(),
            ));
        }
        if actor.id == target && role != AccountRole::SuperAdmin {
            return Err(ServiceError::InvalidState(
                "Super admins cannot demote themselves".to_string(),
            ));
        }

        let mut tx = self.pool.begin().await?;

        sqlx::query("SELECT pg_advisory_xact_lock($1)")
            .bind(ROLE_CHANGE_LOCK)
            .execute(&mut *tx)
            .await?;

        let current = Account::lock_for_update(&mut tx, target)
            .await?
            .ok_or(ServiceError::AccountNotFound(target))?;

        if current.role == role {
            return Ok(current);
        }

        if role.is_staff() && !current.role.is_staff() {
            let staff = Account::count_staff(&mut *tx).await?;
            if staff >= max_admins {
                return Err(ServiceError::LimitExceeded(format!(
                    "Admin limit of {} reached",
                    max_admins
                )));
            }
        }

        let updated = Account::set_role(&mut tx, target, role).await?;
        tx.commit().await?;

        info!(
            "Account {} role changed {:?} -> {:?} by {}",
            target, current.role, role, actor.id
        );

        Ok(updated)
    }
}
