//! Ground-truth rebuild of the active particle list.

use strata_core::ParticleStore;

use crate::registry::TimeBinRegistry;

/// The indices of particles whose bins are active at the current tick.
///
/// The list is a cache: it is always derived from particle bins and the
/// registry's active mask by a full scan, never patched incrementally.
#[derive(Clone, Debug, Default)]
pub struct ActiveList {
    indices: Vec<usize>,
}

impl ActiveList {
    /// An empty list; call [`rebuild`](Self::rebuild) before use.
    pub fn new() -> Self {
        Self::default()
    }

    /// Active particle indices, ascending.
    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    /// Number of active particles.
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    /// Whether no particle is active.
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Rescan the store: recount every bin from scratch and collect the
    /// particles sitting in active bins.
    pub fn rebuild<S: ParticleStore + ?Sized>(
        &mut self,
        registry: &mut TimeBinRegistry,
        store: &S,
    ) {
        registry.zero_counts();
        self.indices.clear();
        for i in 0..store.len() {
            let bin = store.bin(i);
            registry.record(store.kind(i), bin);
            if registry.is_active(bin) {
                self.indices.push(i);
            }
        }
    }
}
