use crate::error::{ServiceError, ServiceResult};
use crate::models::{Account, NewTransaction, Transaction, TransactionKind, TransactionStatus};
use crate::services::gateway::{is_failure_status, is_success_status, CheckoutRequest, PaymentGateway};
use crate::services::wallet::{CreditRequest, WalletLedger};
use log::{error, info, warn};
use serde::Serialize;
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

const NOTE_GATEWAY_ERROR: &str = "gateway_error";
const NOTE_GATEWAY_FAILED: &str = "gateway_failed";
const NOTE_USER_CANCELLED: &str = "cancelled_by_user";

/// Top-up intents and gateway reconciliation.
#[derive(Clone)]
pub struct PaymentService {
    pool: PgPool,
    gateway: Arc<dyn PaymentGateway>,
    min_top_up: i64,
    return_url: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct TopUpSession {
    pub reference: String,
    pub checkout_url: String,
    pub transaction_id: Uuid,
    pub amount: i64,
    /// Older intents this one superseded.
    pub superseded: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconciliationResult {
    Applied,
    Ignored,
    UnknownReference,
}

#[derive(Debug, Clone, Serialize)]
pub struct Reconciliation {
    pub result: ReconciliationResult,
    pub already_applied: bool,
    pub balance: Option<i64>,
}

impl Reconciliation {
    fn ignored() -> Self {
        Self {
            result: ReconciliationResult::Ignored,
            already_applied: false,
            balance: None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CancelOutcome {
    pub transaction: Transaction,
    pub already_cancelled: bool,
}

impl PaymentService {
    pub fn new(
        pool: PgPool,
        gateway: Arc<dyn PaymentGateway>,
        min_top_up: i64,
        return_url: String,
    ) -> Self {
        Self {
            pool,
            gateway,
            min_top_up,
            return_url,
        }
    }

    /// Opens a new top-up intent, superseding any pending one, then asks the
    /// gateway for a checkout URL. The intent row is committed before the
    /// network call so a crash mid-call leaves a recoverable pending row.
    pub async fn initiate(&self, account_id: Uuid, amount: i64) -> ServiceResult<TopUpSession> {
        if amount < self.min_top_up {
            return Err(ServiceError::InvalidAmount(format!(
                "Top-up must be at least {}",
                self.min_top_up
            )));
        }

        let reference = Transaction::generate_external_ref();
        let mut tx = self.pool.begin().await?;

        let account = Account::lock_for_update(&mut tx, account_id)
            .await?
            .ok_or(ServiceError::AccountNotFound(account_id))?;

        let note = format!("superseded by {}", reference);
        let superseded = Transaction::cancel_pending_deposits(&mut *tx, account_id, &note).await?;
        for old in &superseded {
            info!(
                "Cancelled pending top-up {:?} for account {} (superseded)",
                old.external_ref, account_id
            );
        }

        let description = format!("Wallet top-up {}", reference);
        let intent = Transaction::insert(
            &mut *tx,
            &NewTransaction {
                account_id,
                amount,
                kind: TransactionKind::Deposit,
                status: TransactionStatus::Pending,
                external_ref: Some(&reference),
                description: &description,
                balance_before: account.balance,
                balance_after: None,
                performed_by: None,
            },
        )
        .await?;

        tx.commit().await?;

        let request = CheckoutRequest {
            reference: reference.clone(),
            amount,
            account_id,
            return_url: self.return_url.clone(),
        };

        match self.gateway.create_checkout(&request).await {
            Ok(session) => {
                info!(
                    "Top-up {} opened for account {} ({} minor units)",
                    reference, account_id, amount
                );
                Ok(TopUpSession {
                    reference,
                    checkout_url: session.checkout_url,
                    transaction_id: intent.id,
                    amount,
                    superseded: superseded
                        .into_iter()
                        .filter_map(|t| t.external_ref)
                        .collect(),
                })
            }
            Err(e) => {
                error!("Checkout creation failed for {}: {}", reference, e);
                // the user never saw this reference, so don't leave it dangling
                if let Err(cancel_err) =
                    Transaction::cancel(&self.pool, intent.id, NOTE_GATEWAY_ERROR).await
                {
                    error!(
                        "Failed to cancel intent {} after gateway error: {}",
                        reference, cancel_err
                    );
                }
                Err(ServiceError::Gateway(e.to_string()))
            }
        }
    }

    /// Applies a gateway callback. Safe to call any number of times, in any
    /// order, for the same reference. A reported amount that disagrees with
    /// the intent is ignored rather than credited.
    pub async fn confirm(
        &self,
        reference: &str,
        status: &str,
        reported_amount: Option<i64>,
    ) -> ServiceResult<Reconciliation> {
        if !is_success_status(status) {
            if is_failure_status(status) {
                self.cancel_after_gateway_failure(reference).await?;
            } else {
                info!("Ignoring callback for {} with status {:?}", reference, status);
            }
            return Ok(Reconciliation::ignored());
        }

        let mut tx = self.pool.begin().await?;

        let Some(intent) = Transaction::find_by_external_ref(&mut *tx, reference).await? else {
            warn!("Callback for unknown reference {}", reference);
            return Err(ServiceError::UnknownReference(reference.to_string()));
        };

        match intent.status {
            TransactionStatus::Completed => {
                info!("Duplicate confirmation for {}, already applied", reference);
                return Ok(Reconciliation {
                    result: ReconciliationResult::Applied,
                    already_applied: true,
                    balance: intent.balance_after,
                });
            }
            TransactionStatus::Cancelled => {
                warn!(
                    "Confirmation for cancelled intent {} (note: {:?})",
                    reference, intent.note
                );
                return Err(ServiceError::UnknownReference(reference.to_string()));
            }
            TransactionStatus::Pending => {}
        }

        if let Some(reported) = reported_amount {
            if reported != intent.amount {
                warn!(
                    "Callback for {} reports {} but the intent is for {}, ignoring",
                    reference, reported, intent.amount
                );
                return Ok(Reconciliation::ignored());
            }
        }

        let description = format!("Wallet top-up {}", reference);
        let outcome = WalletLedger::credit_in_transaction(
            &mut tx,
            &CreditRequest {
                account_id: intent.account_id,
                amount: intent.amount,
                description: &description,
                external_ref: Some(reference),
                performed_by: None,
            },
        )
        .await?;

        tx.commit().await?;

        if outcome.already_applied {
            info!("Concurrent confirmation for {} lost the race, no-op", reference);
        } else {
            info!(
                "Top-up {} applied to account {}: +{} (balance {})",
                reference, intent.account_id, intent.amount, outcome.balance
            );
        }

        Ok(Reconciliation {
            result: ReconciliationResult::Applied,
            already_applied: outcome.already_applied,
            balance: Some(outcome.balance),
        })
    }

    /// Explicit abandonment by the account holder.
    pub async fn cancel_intent(&self, account_id: Uuid, reference: &str) -> ServiceResult<CancelOutcome> {
        let intent = Transaction::find_by_external_ref(&self.pool, reference)
            .await?
            .filter(|t| t.account_id == account_id && t.kind == TransactionKind::Deposit)
            .ok_or_else(|| ServiceError::UnknownReference(reference.to_string()))?;

        match intent.status {
            TransactionStatus::Cancelled => Ok(CancelOutcome {
                transaction: intent,
                already_cancelled: true,
            }),
            TransactionStatus::Completed => Err(ServiceError::InvalidState(format!(
                "Top-up {} has already been paid",
                reference
            ))),
            TransactionStatus::Pending => {
                match Transaction::cancel(&self.pool, intent.id, NOTE_USER_CANCELLED).await? {
                    Some(cancelled) => {
                        info!("Account {} cancelled top-up {}", account_id, reference);
                        Ok(CancelOutcome {
                            transaction: cancelled,
                            already_cancelled: false,
                        })
                    }
                    // lost a race with a confirmation or supersession; report what won
                    None => {
                        let current = Transaction::find_by_external_ref(&self.pool, reference)
                            .await?
                            .ok_or_else(|| ServiceError::UnknownReference(reference.to_string()))?;
                        if current.status == TransactionStatus::Completed {
                            return Err(ServiceError::InvalidState(format!(
                                "Top-up {} has already been paid",
                                reference
                            )));
                        }
                        Ok(CancelOutcome {
                            transaction: current,
                            already_cancelled: true,
                        })
                    }
                }
            }
        }
    }

    async fn cancel_after_gateway_failure(&self, reference: &str) -> ServiceResult<()> {
        let Some(intent) = Transaction::find_by_external_ref(&self.pool, reference).await? else {
            warn!("Failure callback for unknown reference {}", reference);
            return Ok(());
        };

        if intent.status == TransactionStatus::Pending
            && Transaction::cancel(&self.pool, intent.id, NOTE_GATEWAY_FAILED)
                .await?
                .is_some()
        {
            info!("Top-up {} cancelled after gateway failure", reference);
        }

        Ok(())
    }
}
