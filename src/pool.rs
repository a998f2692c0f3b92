//! Mapping engine pool
//!
//! A fixed set of engines handed out as exclusive leases. `acquire` blocks
//! while every engine is leased; dropping a lease returns its engine and
//! wakes one waiter. All members share the primary engine's metadata.

use crate::config::MetadataSource;
use crate::engine::{EngineFactory, EngineSettings, MappingEngine, MetadataBinding};
use crate::error::Result;
use parking_lot::{Condvar, Mutex};
use std::ops::{Deref, DerefMut};

/// Smallest pool built from hardware parallelism
pub const MIN_POOL_SIZE: usize = 4;
/// Largest pool built from hardware parallelism
pub const MAX_POOL_SIZE: usize = 32;
/// Pool size when parallelism is unknown
pub const DEFAULT_POOL_SIZE: usize = 8;

/// Pool size matching the host's concurrent frame requests
pub fn pool_size() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get().clamp(MIN_POOL_SIZE, MAX_POOL_SIZE))
        .unwrap_or(DEFAULT_POOL_SIZE)
}

/// Bounded pool of mapping engines
pub struct EnginePool<E: MappingEngine> {
    engines: Mutex<Vec<E>>,
    available: Condvar,
    capacity: usize,
}

impl<E: MappingEngine> EnginePool<E> {
    /// Build `size` engines; the first parses the metadata and owns it
    pub fn build<F>(
        factory: &F,
        source: MetadataSource,
        settings: &EngineSettings,
        size: usize,
    ) -> Result<Self>
    where
        F: EngineFactory<Engine = E>,
    {
        let primary = factory.create(MetadataBinding::Parse(source), settings)?;
        Self::with_primary(primary, factory, settings, size)
    }

    /// Fill a pool around an already created primary engine
    pub fn with_primary<F>(
        primary: E,
        factory: &F,
        settings: &EngineSettings,
        size: usize,
    ) -> Result<Self>
    where
        F: EngineFactory<Engine = E>,
    {
        let capacity = size.max(1);
        let mut engines = Vec::with_capacity(capacity);
        for _ in 1..capacity {
            let binding = MetadataBinding::Share(primary.metadata().share());
            match factory.create(binding, settings) {
                Ok(engine) => engines.push(engine),
                Err(e) => {
                    teardown(engines, |e: &E| e.metadata().is_owner());
                    return Err(e);
                }
            }
        }
        engines.push(primary);

        tracing::debug!("Engine pool ready with {} engines", capacity);
        Ok(Self {
            engines: Mutex::new(engines),
            available: Condvar::new(),
            capacity,
        })
    }

    /// Lease an engine, blocking until one is free
    pub fn acquire(&self) -> EngineLease<'_, E> {
        let mut engines = self.engines.lock();
        let engine = loop {
            if let Some(engine) = engines.pop() {
                break engine;
            }
            self.available.wait(&mut engines);
        };
        EngineLease {
            pool: self,
            engine: Some(engine),
        }
    }

    /// Lease an engine if one is free right now
    pub fn try_acquire(&self) -> Option<EngineLease<'_, E>> {
        let engine = self.engines.lock().pop()?;
        Some(EngineLease {
            pool: self,
            engine: Some(engine),
        })
    }

    fn release(&self, engine: E) {
        self.engines.lock().push(engine);
        self.available.notify_one();
    }

    /// Number of engines in the pool
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of engines not currently leased
    pub fn available(&self) -> usize {
        self.engines.lock().len()
    }
}

impl<E: MappingEngine> Drop for EnginePool<E> {
    fn drop(&mut self) {
        let engines = std::mem::take(self.engines.get_mut());
        teardown(engines, |e: &E| e.metadata().is_owner());
    }
}

/// Drop borrowers first so the metadata owner goes last
fn teardown<T>(mut items: Vec<T>, is_owner: impl Fn(&T) -> bool) {
    items.sort_by_key(|item| is_owner(item));
    for item in items {
        drop(item);
    }
}

/// Exclusive use of one pooled engine; returned to the pool on drop
pub struct EngineLease<'a, E: MappingEngine> {
    pool: &'a EnginePool<E>,
    // Only `None` once the lease is being dropped
    engine: Option<E>,
}

impl<E: MappingEngine> Deref for EngineLease<'_, E> {
    type Target = E;

    fn deref(&self) -> &E {
        self.engine.as_ref().expect("lease holds its engine until dropped")
    }
}

impl<E: MappingEngine> DerefMut for EngineLease<'_, E> {
    fn deref_mut(&mut self) -> &mut E {
        self.engine.as_mut().expect("lease holds its engine until dropped")
    }
}

impl<E: MappingEngine> Drop for EngineLease<'_, E> {
    fn drop(&mut self) {
        if let Some(engine) = self.engine.take() {
            self.pool.release(engine);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{ReferenceEngine, ReferenceFactory};
    use crate::error::Error;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex as StdMutex;
    use std::time::{Duration, Instant};

    fn settings() -> EngineSettings {
        EngineSettings {
            bl_bit_depth: 10,
            ..Default::default()
        }
    }

    fn pool(size: usize) -> EnginePool<ReferenceEngine> {
        EnginePool::build(&ReferenceFactory, MetadataSource::Embedded, &settings(), size).unwrap()
    }

    fn wait_for(counter: &AtomicUsize, value: usize) {
        let start = Instant::now();
        while counter.load(Ordering::SeqCst) < value {
            assert!(start.elapsed() < Duration::from_secs(5), "waiter never woke");
            std::thread::sleep(Duration::from_millis(1));
        }
    }

    #[test]
    fn test_pool_size_clamped() {
        let size = pool_size();
        assert!((MIN_POOL_SIZE..=MAX_POOL_SIZE).contains(&size));
    }

    #[test]
    fn test_single_owner_shared_metadata() {
        let pool = pool(4);
        assert_eq!(pool.capacity(), 4);
        assert_eq!(pool.available(), 4);

        let leases: Vec<_> = (0..4).map(|_| pool.acquire()).collect();
        let owners = leases.iter().filter(|l| l.metadata().is_owner()).count();
        assert_eq!(owners, 1);
        assert!(leases.iter().all(|l| l.metadata().handle_count() == 4));
        assert!(pool.try_acquire().is_none());

        drop(leases);
        assert_eq!(pool.available(), 4);
    }

    #[test]
    fn test_acquire_blocks_until_release() {
        let pool = pool(2);
        let held: Vec<_> = (0..2).map(|_| pool.acquire()).collect();
        let acquired = AtomicUsize::new(0);
        let done = AtomicBool::new(false);

        std::thread::scope(|s| {
            for _ in 0..2 {
                s.spawn(|| {
                    let lease = pool.acquire();
                    acquired.fetch_add(1, Ordering::SeqCst);
                    while !done.load(Ordering::SeqCst) {
                        std::thread::sleep(Duration::from_millis(1));
                    }
                    drop(lease);
                });
            }

            std::thread::sleep(Duration::from_millis(50));
            assert_eq!(acquired.load(Ordering::SeqCst), 0);

            let mut held = held;
            held.pop();
            wait_for(&acquired, 1);
            std::thread::sleep(Duration::from_millis(50));
            assert_eq!(acquired.load(Ordering::SeqCst), 1);

            held.pop();
            wait_for(&acquired, 2);
            done.store(true, Ordering::SeqCst);
        });

        assert_eq!(pool.available(), 2);
    }

    #[test]
    fn test_lease_returned_on_early_exit() {
        let pool = pool(1);
        let result: Result<()> = (|| {
            let mut lease = pool.acquire();
            lease.initialize_frame(3, None)?;
            Ok(())
        })();
        assert!(matches!(result, Err(Error::Metadata(_))));
        assert_eq!(pool.available(), 1);
    }

    #[test]
    fn test_released_engine_keeps_frame_state() {
        use crate::engine::reference::FrameRecord;
        use crate::engine::ReferenceMetadata;

        let pool = pool(1);
        let payload = ReferenceMetadata::embed(&FrameRecord {
            scene_change: true,
            ..Default::default()
        });
        {
            let mut lease = pool.acquire();
            lease.initialize_frame(0, Some(payload.as_slice())).unwrap();
        }
        assert_eq!(pool.available(), 1);

        let lease = pool.try_acquire().unwrap();
        assert!(lease.is_scene_change());
        assert_eq!(pool.available(), 0);
        drop(lease);
        assert_eq!(pool.available(), 1);
    }

    #[test]
    fn test_construction_failure_is_fatal() {
        let bad = EngineSettings {
            bl_bit_depth: 20,
            ..Default::default()
        };
        let result =
            EnginePool::<ReferenceEngine>::build(&ReferenceFactory, MetadataSource::Embedded, &bad, 4);
        assert!(matches!(result, Err(Error::EngineInit(_))));
    }

    #[test]
    fn test_teardown_drops_owner_last() {
        struct Member<'a> {
            owner: bool,
            log: &'a StdMutex<Vec<bool>>,
        }

        impl Drop for Member<'_> {
            fn drop(&mut self) {
                self.log.lock().unwrap().push(self.owner);
            }
        }

        let log = StdMutex::new(Vec::new());
        let members = [false, true, false, false]
            .into_iter()
            .map(|owner| Member { owner, log: &log })
            .collect();
        teardown(members, |m: &Member<'_>| m.owner);
        assert_eq!(*log.lock().unwrap(), vec![false, false, false, true]);
    }
}
