use std::sync::Arc;

use parking_lot::RwLock;

use crate::binner::BinStats;
use crate::buffer::ClusterBuffer;
use crate::grid::CellIndex;

#[derive(Debug)]
struct Published {
    frame: u64,
    buffer: ClusterBuffer,
    stats: BinStats,
}

/// Thread-safe handle to the most recently completed cluster buffer.
///
/// The binner works on its own buffer and publishes it only once the pass
/// has finished, so readers on other threads always observe a whole frame.
#[derive(Debug)]
pub struct SharedClusters {
    inner: Arc<RwLock<Published>>,
}

impl Clone for SharedClusters {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl SharedClusters {
    /// Creates a handle holding `initial` as frame zero.
    pub fn new(initial: ClusterBuffer) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Published {
                frame: 0,
                buffer: initial,
                stats: BinStats::default(),
            })),
        }
    }

    /// Replaces the published contents with a finished pass and returns the
    /// new frame number.
    pub fn publish(&self, buffer: &ClusterBuffer, stats: BinStats) -> u64 {
        let mut guard = self.inner.write();
        guard.buffer.clone_from(buffer);
        guard.stats = stats;
        guard.frame += 1;
        guard.frame
    }

    /// Number of frames published so far.
    pub fn frame(&self) -> u64 {
        self.inner.read().frame
    }

    pub fn stats(&self) -> BinStats {
        self.inner.read().stats
    }

    /// Runs `reader` against the published buffer while holding a read lock.
    pub fn read<F, R>(&self, reader: F) -> R
    where
        F: FnOnce(&ClusterBuffer) -> R,
    {
        reader(&self.inner.read().buffer)
    }

    /// Copies out the light indices of one cell.
    pub fn lights_in(&self, cell: CellIndex) -> Option<Vec<u32>> {
        self.read(|buffer| buffer.get(cell).map(<[u32]>::to_vec))
    }

    /// Returns a copy of the whole published buffer.
    pub fn snapshot(&self) -> ClusterBuffer {
        self.read(ClusterBuffer::clone)
    }
}
