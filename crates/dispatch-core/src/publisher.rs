//! Publisher: serializes a callable and hands it to the queue provider,
//! delayed or immediate, taking care of the debounce pointer for
//! `Debounced` items.

use std::sync::Arc;
use std::time::Duration;

use uuid::Uuid;

use crate::config::DispatcherConfig;
use crate::error::DispatchError;
use crate::queue::{check_delay, Metadata, QueueProvider};
use crate::store::{composite_key, DebounceStore};
use crate::validate::validate_debounced;
use crate::wire::{Dispatchable, Registry};

/// Optional overrides for a single `publish` call. `delay`/`queue_name`/
/// `metadata` are ignored for `Debounced` items: the publisher always
/// computes the delay from the declared interval and assigns a fresh
/// instance key.
#[derive(Clone, Debug, Default)]
pub struct PublishOptions {
    pub delay: Option<Duration>,
    pub queue_name: Option<String>,
    pub metadata: Option<Metadata>,
}

pub struct Publisher {
    registry: Arc<Registry>,
    queue: Arc<dyn QueueProvider>,
    debounce_store: Option<Arc<dyn DebounceStore>>,
    config: DispatcherConfig,
}

impl Publisher {
    pub fn new(registry: Arc<Registry>, queue: Arc<dyn QueueProvider>) -> Self {
        Self {
            registry,
            queue,
            debounce_store: None,
            config: DispatcherConfig::default(),
        }
    }

    pub fn with_debounce_store(mut self, store: Arc<dyn DebounceStore>) -> Self {
        self.debounce_store = Some(store);
        self
    }

    pub fn with_config(mut self, config: DispatcherConfig) -> Self {
        self.config = config;
        self
    }

    /// Serializes `callable` and enqueues it, delayed or immediate.
    pub async fn publish(
        &self,
        callable: &mut dyn Dispatchable,
        opts: PublishOptions,
    ) -> Result<(), DispatchError> {
        if let Some(mut spec) = callable.debounced() {
            let store = self.debounce_store.as_ref().ok_or_else(|| {
                DispatchError::missing_capability(
                    "Debounced callable published without a debounce store configured on Publisher",
                )
            })?;

            // Instance keys are single-use: always overwrite, never trust
            // a caller-provided one.
            let instance_key = Uuid::new_v4().to_string();
            callable.set_debounce_instance_key(instance_key.clone());
            spec.instance_key = Some(instance_key.clone());
            validate_debounced(&spec)?;

            let key = composite_key(callable.type_tag(), &spec.type_key);
            store.set_reference(&key, &instance_key, spec.interval).await?;

            let bytes = self.registry.encode(callable)?;
            check_delay(spec.interval, self.config.max_queue_delay)?;
            self.queue
                .enqueue_delayed(bytes, spec.interval, opts.queue_name.as_deref(), opts.metadata)
                .await
        } else {
            let bytes = self.registry.encode(callable)?;
            match opts.delay {
                Some(delay) => {
                    check_delay(delay, self.config.max_queue_delay)?;
                    self.queue
                        .enqueue_delayed(bytes, delay, opts.queue_name.as_deref(), opts.metadata)
                        .await
                }
                None => self.queue.enqueue(bytes, opts.queue_name.as_deref(), opts.metadata).await,
            }
        }
    }

    /// Publishes a batch of callables. `Debounced` items go one-at-a-time
    /// through `publish` so the pointer is set per item; everything else
    /// goes through the provider's bulk path.
    pub async fn publish_batch(
        &self,
        mut callables: Vec<Box<dyn Dispatchable>>,
        queue_name: Option<&str>,
    ) -> Result<(), DispatchError> {
        let mut bulk_bytes = Vec::new();
        for callable in callables.iter_mut() {
            if callable.debounced().is_some() {
                self.publish(
                    callable.as_mut(),
                    PublishOptions {
                        queue_name: queue_name.map(str::to_owned),
                        ..Default::default()
                    },
                )
                .await?;
            } else {
                bulk_bytes.push(self.registry.encode(callable.as_ref())?);
            }
        }
        if !bulk_bytes.is_empty() {
            self.queue.enqueue_bulk(bulk_bytes, queue_name).await?;
        }
        Ok(())
    }
}
