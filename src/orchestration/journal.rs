use crate::db::Repository;
use crate::domain::Timestamp;
use crate::engine::{
    AdminReceipt, FulfillmentOutcome, FulfillmentReceipt, PendingRequest, TakeoverReceipt,
};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum JournalError {
    #[error(transparent)]
    Db(#[from] sqlx::Error),
}

/// Mirrors committed registry results into the database.
#[derive(Clone)]
pub struct Journal {
    repo: Arc<Repository>,
}

impl Journal {
    pub fn new(repo: Arc<Repository>) -> Self {
        Self { repo }
    }

    pub fn repo(&self) -> &Arc<Repository> {
        &self.repo
    }

    pub async fn record_takeover(
        &self,
        receipt: &TakeoverReceipt,
        at: Timestamp,
    ) -> Result<(), JournalError> {
        self.repo
            .upsert_slot(receipt.slot_index, &receipt.slot)
            .await?;
        if let Some(sequence_number) = receipt.sequence_number {
            let request = PendingRequest {
                slot_index: receipt.slot_index,
                epoch_id: receipt.slot.epoch_id,
            };
            self.repo.insert_pending(sequence_number, &request).await?;
        }
        self.repo.insert_events(&receipt.events, at).await?;
        Ok(())
    }

    /// The request is marked resolved regardless of outcome, so a pending row
    /// journaled late by its takeover is never left behind.
    pub async fn record_fulfillment(
        &self,
        receipt: &FulfillmentReceipt,
        at: Timestamp,
    ) -> Result<(), JournalError> {
        self.repo
            .resolve_pending(receipt.sequence_number, receipt.outcome.name())
            .await?;
        if let (FulfillmentOutcome::Applied { slot_index, .. }, Some(slot)) =
            (receipt.outcome, &receipt.slot)
        {
            self.repo.upsert_slot(slot_index, slot).await?;
        }
        self.repo.insert_events(&receipt.events, at).await?;
        Ok(())
    }

    pub async fn record_admin(
        &self,
        receipt: &AdminReceipt,
        at: Timestamp,
    ) -> Result<(), JournalError> {
        self.repo
            .insert_events(std::slice::from_ref(&receipt.event), at)
            .await?;
        Ok(())
    }
}
