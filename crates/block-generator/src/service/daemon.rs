//! Periodic block generation loop
//!
//! Calls the producer once per tick and picks the next delay from the
//! outcome. Shutdown is only observed between ticks, so an attempt in
//! flight always runs to completion.

use crate::config::BlockGeneratorConfig;
use crate::domain::GenerationOutcome;
use crate::error::Result;
use crate::ports::BlockProducerApi;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// Tick loop driving a [`BlockProducerApi`]
pub struct BlockGeneratorDaemon {
    producer: Arc<dyn BlockProducerApi>,
    config: BlockGeneratorConfig,
}

impl BlockGeneratorDaemon {
    pub fn new(producer: Arc<dyn BlockProducerApi>, config: BlockGeneratorConfig) -> Self {
        Self { producer, config }
    }

    /// Delay before the next tick, given the result of this one
    pub fn next_delay(&self, result: &Result<GenerationOutcome>) -> Duration {
        match result {
            Ok(GenerationOutcome::NotEligible) => self.config.not_validator_backoff(),
            Ok(_) => self.config.tick_interval(),
            Err(e) if e.is_configuration() => self.config.not_validator_backoff(),
            Err(_) => self.config.error_backoff(),
        }
    }

    /// Run one tick and return the delay before the next one
    pub async fn tick(&self) -> Duration {
        let result = self.producer.try_generate().await;
        match &result {
            Ok(_) => {}
            Err(e) if e.is_configuration() => {
                warn!(error = %e, "block generation not possible with current configuration");
            }
            Err(e) => {
                error!(error = %e, recoverable = e.is_recoverable(), "block generation failed");
            }
        }
        self.next_delay(&result)
    }

    /// Loop until `shutdown` flips to `true` or its sender is dropped
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        info!(key_id = self.config.key_id, "block generator started");
        loop {
            if *shutdown.borrow() {
                break;
            }
            let delay = self.tick().await;
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        info!("block generator stopped");
    }

    /// Run on a tokio task
    pub fn spawn(self, shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(self.run(shutdown))
    }
}
