use std::sync::Arc;

use tracing::info;

use wren_db::Database;
use wren_db::models::TransferOutcome;
use wren_types::error::ServiceError;
use wren_types::events::ServerEvent;

use crate::registry::SessionRegistry;
use crate::services::run_blocking;

/// Executes atomic peer-to-peer balance transfers. This is the only
/// path in the system that mutates balances; everything else reads
/// snapshots.
pub struct TransferService {
    db: Arc<Database>,
    registry: SessionRegistry,
}

impl TransferService {
    pub fn new(db: Arc<Database>, registry: SessionRegistry) -> Self {
        Self { db, registry }
    }

    /// Move `amount` from sender to receiver inside one store
    /// transaction (membership check, debit, credit, ledger row,
    /// payment message). The sender must belong to the conversation,
    /// same as for a plain chat message. On
    /// success the sender's live session gets `money_sent` and the
    /// receiver's — if any — `money_received` plus a `new_message` so
    /// an open chat view refreshes. Insufficient funds surfaces as a
    /// normal error for the caller to report to the initiator only.
    ///
    /// Sender and receiver being equal is allowed: debit and credit hit
    /// the same row and the net effect is zero.
    pub async fn transfer(
        &self,
        sender_id: i64,
        receiver_id: i64,
        amount: f64,
        conversation_id: i64,
    ) -> Result<(), ServiceError> {
        // Also rejects NaN, which would slip through a `<= 0` check
        if !(amount > 0.0) {
            return Err(ServiceError::InvalidAmount);
        }

        let content = format!("Sent ${}", amount);
        let db = self.db.clone();
        let body = content.clone();
        let outcome = run_blocking(move || {
            db.transfer(sender_id, receiver_id, amount, conversation_id, &body)
        })
        .await?;

        match outcome {
            TransferOutcome::InsufficientFunds => Err(ServiceError::InsufficientFunds),
            TransferOutcome::NotAMember => Err(ServiceError::NotAMember),
            TransferOutcome::Completed { transaction_id, .. } => {
                info!(
                    "transfer {}: ${} from {} to {} in conversation {}",
                    transaction_id, amount, sender_id, receiver_id, conversation_id
                );

                self.registry
                    .send_to_user(
                        sender_id,
                        ServerEvent::MoneySent {
                            success: true,
                            amount: Some(amount),
                            message: None,
                        },
                    )
                    .await;

                let receiver_live = self
                    .registry
                    .send_to_user(
                        receiver_id,
                        ServerEvent::MoneyReceived {
                            success: true,
                            amount,
                            conversation_id,
                        },
                    )
                    .await;
                if receiver_live {
                    self.registry
                        .send_to_user(
                            receiver_id,
                            ServerEvent::NewMessage {
                                conversation_id,
                                sender_id,
                                content,
                            },
                        )
                        .await;
                }

                Ok(())
            }
        }
    }
}
