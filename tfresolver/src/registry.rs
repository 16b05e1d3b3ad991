//! Provider registry: preference order per platform
//!
//! Providers are kept in one ordered list per platform. Position 0 is the
//! current primary. A provider that resolves after the primary failed is
//! promoted to the front; one that keeps failing is moved to the back. No
//! provider is ever removed.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tfconfig::EngineSettings;
use tfsource::{MusicProvider, Platform};
use tracing::{debug, info, warn};

/// Snapshot of one provider's standing in its platform order
#[derive(Debug, Clone)]
pub struct ProviderDescriptor {
    pub provider: Arc<dyn MusicProvider>,
    /// Per-call budget of this endpoint
    pub timeout: Duration,
    /// Position in the platform order, 0 = primary
    pub rank: usize,
    pub consecutive_failures: u32,
}

impl ProviderDescriptor {
    pub fn id(&self) -> &str {
        self.provider.id()
    }

    pub fn platform(&self) -> Platform {
        self.provider.platform()
    }

    pub fn base_url(&self) -> &str {
        self.provider.base_url()
    }
}

#[derive(Debug)]
struct Slot {
    provider: Arc<dyn MusicProvider>,
    timeout: Duration,
    consecutive_failures: u32,
}

#[derive(Debug)]
pub struct ProviderRegistry {
    /// Registration order, used by the aggregator
    all: Vec<(Arc<dyn MusicProvider>, Duration)>,
    orders: Mutex<HashMap<Platform, Vec<Slot>>>,
    demote_after_failures: u32,
}

impl ProviderRegistry {
    /// Registers providers in preference order
    pub fn new(providers: Vec<(Arc<dyn MusicProvider>, Duration)>, demote_after_failures: u32) -> Self {
        let mut orders: HashMap<Platform, Vec<Slot>> = HashMap::new();
        for (provider, timeout) in &providers {
            orders.entry(provider.platform()).or_default().push(Slot {
                provider: provider.clone(),
                timeout: *timeout,
                consecutive_failures: 0,
            });
        }

        Self {
            all: providers,
            orders: Mutex::new(orders),
            demote_after_failures: demote_after_failures.max(1),
        }
    }

    /// Registry whose timeouts come from the matching configured endpoint,
    /// or the global provider timeout
    pub fn from_settings(providers: Vec<Arc<dyn MusicProvider>>, settings: &EngineSettings) -> Self {
        let with_timeouts = providers
            .into_iter()
            .map(|provider| {
                let timeout = settings
                    .provider_endpoints
                    .iter()
                    .find(|e| e.name == provider.id())
                    .map(|e| settings.timeout_for(e))
                    .unwrap_or(settings.provider_timeout);
                (provider, timeout)
            })
            .collect();
        Self::new(with_timeouts, settings.demote_after_failures)
    }

    /// Every provider in registration order
    pub fn providers(&self) -> &[(Arc<dyn MusicProvider>, Duration)] {
        &self.all
    }

    pub fn is_empty(&self) -> bool {
        self.all.is_empty()
    }

    pub fn platforms(&self) -> Vec<Platform> {
        let mut platforms: Vec<Platform> = self.orders.lock().keys().copied().collect();
        platforms.sort();
        platforms
    }

    /// The first `max` providers of `platform`, in current preference order
    pub fn candidates(&self, platform: Platform, max: usize) -> Vec<ProviderDescriptor> {
        let orders = self.orders.lock();
        orders
            .get(&platform)
            .map(|slots| {
                slots
                    .iter()
                    .take(max)
                    .enumerate()
                    .map(|(rank, slot)| ProviderDescriptor {
                        provider: slot.provider.clone(),
                        timeout: slot.timeout,
                        rank,
                        consecutive_failures: slot.consecutive_failures,
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Provider ids of `platform` in preference order
    pub fn order(&self, platform: Platform) -> Vec<String> {
        self.candidates(platform, usize::MAX)
            .into_iter()
            .map(|d| d.id().to_string())
            .collect()
    }

    /// Makes `provider_id` the primary of `platform` and clears its failures
    pub fn promote(&self, platform: Platform, provider_id: &str) {
        let mut orders = self.orders.lock();
        let Some(slots) = orders.get_mut(&platform) else {
            return;
        };
        let Some(pos) = slots.iter().position(|s| s.provider.id() == provider_id) else {
            return;
        };

        let mut slot = slots.remove(pos);
        slot.consecutive_failures = 0;
        slots.insert(0, slot);

        if pos > 0 {
            info!(provider = provider_id, platform = %platform, "promoted to primary");
        }
    }

    pub fn record_success(&self, platform: Platform, provider_id: &str) {
        let mut orders = self.orders.lock();
        if let Some(slot) = orders
            .get_mut(&platform)
            .and_then(|slots| slots.iter_mut().find(|s| s.provider.id() == provider_id))
        {
            slot.consecutive_failures = 0;
        }
    }

    /// Counts one failure; returns `true` when it demoted the provider
    pub fn record_failure(&self, platform: Platform, provider_id: &str) -> bool {
        let mut orders = self.orders.lock();
        let Some(slots) = orders.get_mut(&platform) else {
            return false;
        };
        let Some(pos) = slots.iter().position(|s| s.provider.id() == provider_id) else {
            return false;
        };

        slots[pos].consecutive_failures += 1;
        let failures = slots[pos].consecutive_failures;
        debug!(provider = provider_id, failures, "provider failure recorded");

        if failures < self.demote_after_failures || pos + 1 == slots.len() {
            return false;
        }

        let mut slot = slots.remove(pos);
        slot.consecutive_failures = 0;
        slots.push(slot);
        warn!(
            provider = provider_id,
            platform = %platform,
            failures,
            "demoted to the back of the preference order"
        );
        true
    }
}
