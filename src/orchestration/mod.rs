//! Wiring of the registry, its collaborators, the journal and the oracle backend.

pub mod journal;
pub mod service;

pub use journal::{Journal, JournalError};
pub use service::{Clock, ConfigView, ManualClock, SlotService, SlotView, SystemClock};

use crate::config::{Config, OracleMode};
use crate::db::Repository;
use crate::domain::Address;
use crate::engine::{AdminConfig, AdminError, EmissionSchedule, SlotRegistry};
use crate::ledger::{InMemoryAsset, InMemoryRewardToken, LedgerError};
use crate::oracle::{Dispatcher, EntropyBackend, HttpEntropy, LocalEntropy, QueuedEntropy};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Admin(#[from] AdminError),
    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

/// Everything a running node shares.
#[derive(Clone)]
pub struct Node {
    pub service: Arc<SlotService>,
    pub oracle: Arc<QueuedEntropy>,
    pub asset: Arc<InMemoryAsset>,
    pub reward: Arc<InMemoryRewardToken>,
    pub backend: Arc<dyn EntropyBackend>,
}

/// Identity the registry mints under.
pub fn registry_address() -> Address {
    let digest = Sha256::digest(b"slotmine.registry");
    let mut bytes = [0u8; 20];
    bytes.copy_from_slice(&digest[..20]);
    Address::new(bytes)
}

impl Node {
    /// Build a node from configuration. `repo` enables the journal.
    pub fn build(
        config: &Config,
        repo: Option<Arc<Repository>>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, BootstrapError> {
        let mut admin = AdminConfig::new(
            config.owner,
            config.treasury,
            config.team,
            config.capacity,
            config.multipliers.clone(),
        )?;
        for faction in &config.factions {
            admin.set_faction(config.owner, *faction, true)?;
        }

        let asset = Arc::new(InMemoryAsset::new());
        for (owner, amount) in &config.genesis_balances {
            asset.fund(*owner, *amount)?;
        }

        let address = registry_address();
        let reward = Arc::new(InMemoryRewardToken::new(address));
        let oracle = Arc::new(QueuedEntropy::new(config.entropy_fee));

        let backend: Arc<dyn EntropyBackend> = match config.oracle_mode {
            OracleMode::Local => Arc::new(LocalEntropy::new(Duration::from_millis(
                config.fulfillment_delay_ms,
            ))),
            OracleMode::Http => Arc::new(HttpEntropy::new(
                config.oracle_url.clone().unwrap_or_default(),
                config.callback_url(),
            )),
        };

        let registry = SlotRegistry::new(
            address,
            admin,
            EmissionSchedule::new(config.deploy_time),
            asset.clone(),
            reward.clone(),
            oracle.clone(),
        );
        let service = Arc::new(SlotService::new(registry, clock, repo.map(Journal::new)));

        info!(
            registry = %address,
            capacity = config.capacity,
            deploy_time = %config.deploy_time,
            oracle_mode = ?config.oracle_mode,
            "Node assembled"
        );

        Ok(Self {
            service,
            oracle,
            asset,
            reward,
            backend,
        })
    }

    pub fn dispatcher(&self) -> Dispatcher {
        Dispatcher::new(self.oracle.clone(), self.backend.clone(), self.service.clone())
    }

    /// Run the oracle dispatcher in the background.
    pub fn spawn_dispatcher(&self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(self.dispatcher().run())
    }
}
