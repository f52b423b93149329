//! Per-invocation result cache.
//!
//! Native enumeration costs tens to hundreds of milliseconds and its ordering
//! is occasionally non-deterministic across repeated calls in one process, so
//! the facade performs at most one native call per `(device_id, operation)`
//! key per run. This is memoization, not a time-based expiry cache: entries
//! live for the lifetime of the invocation and are discarded with it.

use std::collections::HashMap;
use std::time::Instant;

use crate::types::{ControlInfo, DeviceInfo, FormatInfo};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    Enumerate,
    ListFormats,
    ListControls,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    device_id: String,
    op: OperationKind,
}

#[derive(Debug, Clone)]
enum CachedResult {
    Devices(Vec<DeviceInfo>),
    Formats(Vec<FormatInfo>),
    Controls(Vec<ControlInfo>),
}

#[derive(Debug, Clone)]
struct Entry {
    result: CachedResult,
    stored_at: Instant,
}

/// Cache hit/miss counters for one invocation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
}

/// Process-local memoization of enumeration and control-metadata queries.
///
/// Owned by the facade; backends are cache-unaware. Never persisted, never
/// shared across invocations or threads.
#[derive(Debug, Default)]
pub struct ResultCache {
    entries: HashMap<CacheKey, Entry>,
    stats: CacheStats,
}

impl ResultCache {
    pub fn new() -> Self {
        Self::default()
    }

    // Enumeration is process-wide, keyed under an empty device id.
    fn key(device_id: &str, op: OperationKind) -> CacheKey {
        CacheKey {
            device_id: device_id.to_string(),
            op,
        }
    }

    fn get(&mut self, device_id: &str, op: OperationKind) -> Option<&Entry> {
        let key = Self::key(device_id, op);
        if self.entries.contains_key(&key) {
            self.stats.hits += 1;
            log::debug!("cache hit: {:?} for '{}'", op, device_id);
        } else {
            self.stats.misses += 1;
            log::debug!("cache miss: {:?} for '{}'", op, device_id);
        }
        self.entries.get(&key)
    }

    fn store(&mut self, device_id: &str, op: OperationKind, result: CachedResult) {
        self.entries.insert(
            Self::key(device_id, op),
            Entry {
                result,
                stored_at: Instant::now(),
            },
        );
    }

    pub fn get_devices(&mut self) -> Option<Vec<DeviceInfo>> {
        match self.get("", OperationKind::Enumerate) {
            Some(Entry {
                result: CachedResult::Devices(devices),
                ..
            }) => Some(devices.clone()),
            _ => None,
        }
    }

    pub fn store_devices(&mut self, devices: Vec<DeviceInfo>) {
        self.store("", OperationKind::Enumerate, CachedResult::Devices(devices));
    }

    pub fn get_formats(&mut self, device_id: &str) -> Option<Vec<FormatInfo>> {
        match self.get(device_id, OperationKind::ListFormats) {
            Some(Entry {
                result: CachedResult::Formats(formats),
                ..
            }) => Some(formats.clone()),
            _ => None,
        }
    }

    pub fn store_formats(&mut self, device_id: &str, formats: Vec<FormatInfo>) {
        self.store(
            device_id,
            OperationKind::ListFormats,
            CachedResult::Formats(formats),
        );
    }

    pub fn get_controls(&mut self, device_id: &str) -> Option<Vec<ControlInfo>> {
        match self.get(device_id, OperationKind::ListControls) {
            Some(Entry {
                result: CachedResult::Controls(controls),
                ..
            }) => Some(controls.clone()),
            _ => None,
        }
    }

    pub fn store_controls(&mut self, device_id: &str, controls: Vec<ControlInfo>) {
        self.store(
            device_id,
            OperationKind::ListControls,
            CachedResult::Controls(controls),
        );
    }

    /// Drop the `list_controls` entry for one device so the next query
    /// re-reads from the hardware. Enumeration and format entries are never
    /// invalidated by a control write.
    pub fn invalidate_controls(&mut self, device_id: &str) {
        self.entries
            .remove(&Self::key(device_id, OperationKind::ListControls));
    }

    /// Age of the cached entry, if any. Useful for diagnostics only.
    pub fn entry_age(&self, device_id: &str, op: OperationKind) -> Option<std::time::Duration> {
        self.entries
            .get(&Self::key(device_id, op))
            .map(|e| e.stored_at.elapsed())
    }

    pub fn stats(&self) -> CacheStats {
        self.stats
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_controls() -> Vec<ControlInfo> {
        vec![
            ControlInfo::integer("brightness", 0, 255, 1, 128).with_value(128),
            ControlInfo::boolean("focus_automatic", true).with_value(1),
        ]
    }

    #[test]
    fn test_miss_then_hit() {
        let mut cache = ResultCache::new();
        assert!(cache.get_controls("/dev/video0").is_none());
        cache.store_controls("/dev/video0", sample_controls());
        assert_eq!(cache.get_controls("/dev/video0"), Some(sample_controls()));
        assert_eq!(cache.stats(), CacheStats { hits: 1, misses: 1 });
    }

    #[test]
    fn test_invalidate_controls_is_scoped() {
        let mut cache = ResultCache::new();
        cache.store_controls("/dev/video0", sample_controls());
        cache.store_controls("/dev/video1", sample_controls());
        cache.store_formats("/dev/video0", vec![FormatInfo::new("YUYV", 640, 480, 30.0)]);
        cache.store_devices(vec![DeviceInfo::new("/dev/video0", "cam")]);

        cache.invalidate_controls("/dev/video0");

        assert!(cache.get_controls("/dev/video0").is_none());
        assert!(cache.get_controls("/dev/video1").is_some());
        assert!(cache.get_formats("/dev/video0").is_some());
        assert!(cache.get_devices().is_some());
    }

    #[test]
    fn test_keys_do_not_collide_across_operations() {
        let mut cache = ResultCache::new();
        cache.store_formats("/dev/video0", vec![FormatInfo::new("MJPG", 1280, 720, 30.0)]);
        assert!(cache.get_controls("/dev/video0").is_none());
        assert!(cache.get_formats("/dev/video0").is_some());
    }
}
