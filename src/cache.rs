use crate::record::AdvertisementRecord;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

/// Latest pending record per device, shared by the scanner and the publisher.
///
/// Writes are last-write-wins. Reads take the entry out, so every record is
/// handed to the publisher at most once.
#[derive(Debug)]
pub struct FrameCache {
    capacity: usize,
    frames: Mutex<HashMap<String, AdvertisementRecord>>,
}

impl FrameCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            frames: Mutex::new(HashMap::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, AdvertisementRecord>> {
        // recover from poisoning, each write is a single map operation
        self.frames.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Store `record` under its address. Returns `false` when the cache is
    /// full and the address is new; existing addresses always update.
    pub fn insert(&self, record: AdvertisementRecord) -> bool {
        let mut frames = self.lock();
        if frames.len() >= self.capacity && !frames.contains_key(&record.addr) {
            return false;
        }
        frames.insert(record.addr.clone(), record);
        true
    }

    pub fn take(&self, addr: &str) -> Option<AdvertisementRecord> {
        self.lock().remove(addr)
    }

    /// Take every pending record in one step.
    pub fn drain(&self) -> Vec<AdvertisementRecord> {
        self.lock().drain().map(|(_, record)| record).collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::DecodeOptions;
    use std::sync::Arc;
    use time::OffsetDateTime;

    fn record(addr: &str, rssi: i16) -> AdvertisementRecord {
        AdvertisementRecord::from_advertisement(
            addr,
            rssi,
            None,
            &[],
            &DecodeOptions::default(),
            OffsetDateTime::UNIX_EPOCH,
        )
    }

    #[test]
    fn last_write_wins() {
        let cache = FrameCache::new(4);
        assert!(cache.insert(record("aa:bb", -80)));
        assert!(cache.insert(record("aa:bb", -60)));
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.take("aa:bb").map(|r| r.rssi), Some(-60));
        assert_eq!(cache.take("aa:bb"), None);
    }

    #[test]
    fn full_cache_rejects_new_keys_only() {
        let cache = FrameCache::new(1);
        assert!(cache.insert(record("aa", -80)));
        assert!(!cache.insert(record("bb", -80)));
        assert!(cache.insert(record("aa", -50)));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn drain_empties() {
        let cache = FrameCache::new(8);
        cache.insert(record("aa", -1));
        cache.insert(record("bb", -2));
        let mut drained: Vec<_> = cache.drain().into_iter().map(|r| r.addr).collect();
        drained.sort();
        assert_eq!(drained, vec!["aa", "bb"]);
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn producer_and_consumer_tasks() {
        let cache = Arc::new(FrameCache::new(64));
        let producer = {
            let cache = cache.clone();
            tokio::spawn(async move {
                for i in 0..32 {
                    cache.insert(record(&format!("dev{}", i % 8), i));
                }
            })
        };
        producer.await.unwrap();
        assert_eq!(cache.drain().len(), 8);
        assert!(cache.is_empty());
    }
}
