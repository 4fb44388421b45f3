//! Result table keyed by window index.

use crate::pipeline::types::Spectrum;
use std::collections::BTreeMap;
use std::collections::btree_map::Entry;

/// Spectra received so far, in any arrival order.
#[derive(Debug, Default, Clone)]
pub struct ResultTable {
    spectra: BTreeMap<u64, Spectrum>,
}

impl ResultTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores the spectrum of window `index`.
    ///
    /// Returns `false` and keeps the first value if the index is already present.
    pub fn insert(&mut self, index: u64, spectrum: Spectrum) -> bool {
        match self.spectra.entry(index) {
            Entry::Vacant(slot) => {
                slot.insert(spectrum);
                true
            }
            Entry::Occupied(_) => false,
        }
    }

    pub fn contains(&self, index: u64) -> bool {
        self.spectra.contains_key(&index)
    }

    pub fn len(&self) -> usize {
        self.spectra.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spectra.is_empty()
    }

    /// True when every index in `0..dispatched` has a spectrum.
    ///
    /// Only indices below `dispatched` are ever stored, so a count is enough.
    pub fn is_complete(&self, dispatched: u64) -> bool {
        self.spectra.len() as u64 == dispatched
    }

    /// Indices in `0..dispatched` that have not arrived yet.
    pub fn missing(&self, dispatched: u64) -> Vec<u64> {
        (0..dispatched).filter(|i| !self.contains(*i)).collect()
    }

    /// Spectra `0..dispatched` in index order.
    pub fn assemble(&self, dispatched: u64) -> Vec<Spectrum> {
        self.spectra.range(..dispatched).map(|(_, s)| s.clone()).collect()
    }

    pub fn clear(&mut self) {
        self.spectra.clear();
    }
}
