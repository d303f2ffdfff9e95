//! Clip-instance cache keyed by (rig content hash, clip content hash).
//!
//! The cache is an explicit object owned by the application (no global).
//! Each key owns a `OnceCell`: the first requester builds while concurrent
//! requesters for the same key block on the cell and receive the same `Arc`.
//! Requests for different keys only contend on the table lock, never on a
//! build.

use std::sync::Arc;

use hashbrown::HashMap;
use once_cell::sync::OnceCell;
use parking_lot::RwLock;

use crate::clip::Clip;
use crate::config::Config;
use crate::error::Result;
use crate::instance::{ClipInstance, InstanceKey};
use crate::rig::RigDefinition;

type Slot = Arc<OnceCell<Arc<ClipInstance>>>;

#[derive(Debug, Default)]
pub struct ClipInstanceCache {
    slots: RwLock<HashMap<InstanceKey, Slot>>,
}

impl ClipInstanceCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(cfg: &Config) -> Self {
        Self {
            slots: RwLock::new(HashMap::with_capacity(cfg.instance_cache_capacity)),
        }
    }

    /// Return the cached instance for (rig, clip), building it on first use.
    ///
    /// A failed build leaves the slot empty so a later call retries.
    pub fn get_or_build(
        &self,
        rig: &RigDefinition,
        clip: &Arc<Clip>,
    ) -> Result<Arc<ClipInstance>> {
        let key = InstanceKey::new(rig, clip);
        let slot = self.slot(key);
        if let Some(inst) = slot.get() {
            log::trace!("clip instance cache hit {:?}", key);
            return Ok(inst.clone());
        }
        let inst = slot.get_or_try_init(|| {
            log::debug!(
                "building clip instance for rig '{}' / clip '{}'",
                rig.name(),
                clip.name()
            );
            ClipInstance::new(rig, clip.clone()).map(Arc::new)
        })?;
        Ok(inst.clone())
    }

    /// Cached instance without building.
    pub fn get(&self, key: InstanceKey) -> Option<Arc<ClipInstance>> {
        self.slots
            .read()
            .get(&key)
            .and_then(|slot| slot.get().cloned())
    }

    fn slot(&self, key: InstanceKey) -> Slot {
        if let Some(slot) = self.slots.read().get(&key) {
            return slot.clone();
        }
        self.slots.write().entry(key).or_default().clone()
    }

    /// Number of built instances.
    pub fn len(&self) -> usize {
        self.slots
            .read()
            .values()
            .filter(|slot| slot.get().is_some())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every cached instance. Outstanding `Arc`s stay valid.
    pub fn clear(&self) {
        let mut slots = self.slots.write();
        log::debug!("clearing clip instance cache ({} entries)", slots.len());
        slots.clear();
    }
}
