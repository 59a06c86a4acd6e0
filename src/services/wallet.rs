use crate::error::{ServiceError, ServiceResult};
use crate::models::{
    Account, NewTransaction, Transaction, TransactionKind, TransactionStatus,
};
use log::{info, warn};
use serde::Serialize;
use sqlx::{PgPool, Postgres, Transaction as SqlxTransaction};
use uuid::Uuid;

/// Atomic credit/debit over `accounts` + `transactions`.
///
/// Every mutation locks the account row first (`FOR UPDATE`) and only then
/// touches transaction rows, so all writers agree on lock order.
#[derive(Clone)]
pub struct WalletLedger {
    pool: PgPool,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreditOutcome {
    pub balance: i64,
    pub transaction_id: Uuid,
    /// True when the external reference had already been applied.
    pub already_applied: bool,
}

#[derive(Debug, Clone)]
pub struct CreditRequest<'a> {
    pub account_id: Uuid,
    pub amount: i64,
    pub description: &'a str,
    pub external_ref: Option<&'a str>,
    pub performed_by: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BalanceAudit {
    pub account_id: Uuid,
    pub cached_balance: i64,
    pub ledger_balance: i64,
    pub consistent: bool,
}

impl WalletLedger {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn credit(
        &self,
        account_id: Uuid,
        amount: i64,
        description: &str,
        external_ref: Option<&str>,
    ) -> ServiceResult<i64> {
        let mut tx = self.pool.begin().await?;
        let outcome = Self::credit_in_transaction(
            &mut tx,
            &CreditRequest {
                account_id,
                amount,
                description,
                external_ref,
                performed_by: None,
            },
        )
        .await?;
        tx.commit().await?;

        Ok(outcome.balance)
    }

    pub async fn debit(&self, account_id: Uuid, amount: i64, description: &str) -> ServiceResult<i64> {
        let mut tx = self.pool.begin().await?;
        let transaction = Self::debit_in_transaction(&mut tx, account_id, amount, description).await?;
        tx.commit().await?;

        transaction
            .balance_after
            .ok_or_else(|| ServiceError::Internal("completed debit without balance".to_string()))
    }

    /// Cashier top-up. Capped per transaction and attributed to the acting admin.
    pub async fn manual_credit(
        &self,
        admin: &Account,
        target: Uuid,
        amount: i64,
        max_amount: i64,
    ) -> ServiceResult<i64> {
        if !admin.role.is_staff() {
            return Err(ServiceError::Forbidden(
                "Only admins can credit wallets".to_string(),
            ));
        }
        if amount <= 0 {
            return Err(ServiceError::InvalidAmount(
                "Credit amount must be positive".to_string(),
            ));
        }
        if amount > max_amount {
            return Err(ServiceError::LimitExceeded(format!(
                "Manual credit of {} exceeds the per-transaction cap of {}",
                amount, max_amount
            )));
        }

        let description = format!("Cashier credit by {}", admin.id);
        let mut tx = self.pool.begin().await?;
        let outcome = Self::credit_in_transaction(
            &mut tx,
            &CreditRequest {
                account_id: target,
                amount,
                description: &description,
                external_ref: None,
                performed_by: Some(admin.id),
            },
        )
        .await?;
        tx.commit().await?;

        info!(
            "Admin {} credited {} to account {} (new balance {})",
            admin.id, amount, target, outcome.balance
        );

        Ok(outcome.balance)
    }

    pub async fn history(&self, account_id: Uuid, limit: i64) -> ServiceResult<Vec<Transaction>> {
        let limit = limit.clamp(1, 200);
        Ok(Transaction::find_by_account(&self.pool, account_id, limit).await?)
    }

    /// Compares the cached balance with the sum of completed ledger rows.
    pub async fn audit_balance(&self, account_id: Uuid) -> ServiceResult<BalanceAudit> {
        let mut tx = self.pool.begin().await?;
        let account = Account::lock_for_update(&mut tx, account_id)
            .await?
            .ok_or(ServiceError::AccountNotFound(account_id))?;
        let ledger_balance = Transaction::completed_sum(&mut *tx, account_id).await?;
        tx.commit().await?;

        let consistent = ledger_balance == account.balance;
        if !consistent {
            warn!(
                "Balance drift on account {}: cached {} vs ledger {}",
                account_id, account.balance, ledger_balance
            );
        }

        Ok(BalanceAudit {
            account_id,
            cached_balance: account.balance,
            ledger_balance,
            consistent,
        })
    }

    /// Credits inside a caller-owned transaction.
    ///
    /// With an external reference this is idempotent: a completed row for the
    /// reference short-circuits, a pending row for the same account is settled
    /// in place, and a cancelled one is reported as unknown.
    pub async fn credit_in_transaction(
        tx: &mut SqlxTransaction<'_, Postgres>,
        request: &CreditRequest<'_>,
    ) -> ServiceResult<CreditOutcome> {
        if request.amount <= 0 {
            return Err(ServiceError::InvalidAmount(
                "Credit amount must be positive".to_string(),
            ));
        }

        let account = Account::lock_for_update(tx, request.account_id)
            .await?
            .ok_or(ServiceError::AccountNotFound(request.account_id))?;

        if let Some(reference) = request.external_ref {
            // re-read under the account lock so racing confirmations serialize here
            if let Some(existing) = Transaction::lock_by_external_ref(tx, reference).await? {
                return Self::settle_existing(tx, &account, existing, request).await;
            }
        }

        let new_balance = account
            .balance
            .checked_add(request.amount)
            .ok_or_else(|| ServiceError::InvalidAmount("Balance overflow".to_string()))?;

        Account::set_balance(tx, account.id, new_balance).await?;
        let transaction = Transaction::insert(
            &mut **tx,
            &NewTransaction {
                account_id: account.id,
                amount: request.amount,
                kind: TransactionKind::Deposit,
                status: TransactionStatus::Completed,
                external_ref: request.external_ref,
                description: request.description,
                balance_before: account.balance,
                balance_after: Some(new_balance),
                performed_by: request.performed_by,
            },
        )
        .await?;

        Ok(CreditOutcome {
            balance: new_balance,
            transaction_id: transaction.id,
            already_applied: false,
        })
    }

    async fn settle_existing(
        tx: &mut SqlxTransaction<'_, Postgres>,
        account: &Account,
        existing: Transaction,
        request: &CreditRequest<'_>,
    ) -> ServiceResult<CreditOutcome> {
        let reference = existing.external_ref.clone().unwrap_or_default();

        if existing.account_id != account.id || existing.kind != TransactionKind::Deposit {
            warn!(
                "External reference {} belongs to a different ledger entry",
                reference
            );
            return Err(ServiceError::InvalidState(format!(
                "Reference {} does not match account {}",
                reference, account.id
            )));
        }

        match existing.status {
            TransactionStatus::Completed => Ok(CreditOutcome {
                balance: existing.balance_after.unwrap_or(account.balance),
                transaction_id: existing.id,
                already_applied: true,
            }),
            TransactionStatus::Cancelled => Err(ServiceError::UnknownReference(reference)),
            TransactionStatus::Pending => {
                if existing.amount != request.amount {
                    return Err(ServiceError::InvalidAmount(format!(
                        "Reference {} was opened for {}, not {}",
                        reference, existing.amount, request.amount
                    )));
                }

                let new_balance = account
                    .balance
                    .checked_add(existing.amount)
                    .ok_or_else(|| ServiceError::InvalidAmount("Balance overflow".to_string()))?;

                Account::set_balance(tx, account.id, new_balance).await?;
                let completed = Transaction::mark_completed(tx, existing.id, new_balance).await?;

                Ok(CreditOutcome {
                    balance: new_balance,
                    transaction_id: completed.id,
                    already_applied: false,
                })
            }
        }
    }

    /// Debits inside a caller-owned transaction. The balance check runs on the
    /// locked row, so concurrent debits cannot both pass on a stale read.
    pub async fn debit_in_transaction(
        tx: &mut SqlxTransaction<'_, Postgres>,
        account_id: Uuid,
        amount: i64,
        description: &str,
    ) -> ServiceResult<Transaction> {
        if amount <= 0 {
            return Err(ServiceError::InvalidAmount(
                "Debit amount must be positive".to_string(),
            ));
        }

        let account = Account::lock_for_update(tx, account_id)
            .await?
            .ok_or(ServiceError::AccountNotFound(account_id))?;

        if amount > account.balance {
            return Err(ServiceError::InsufficientFunds {
                balance: account.balance,
                required: amount,
            });
        }

        let new_balance = account.balance - amount;
        Account::set_balance(tx, account.id, new_balance).await?;

        let transaction = Transaction::insert(
            &mut **tx,
            &NewTransaction {
                account_id: account.id,
                amount: -amount,
                kind: TransactionKind::Purchase,
                status: TransactionStatus::Completed,
                external_ref: None,
                description,
                balance_before: account.balance,
                balance_after: Some(new_balance),
                performed_by: None,
            },
        )
        .await?;

        Ok(transaction)
    }
}
