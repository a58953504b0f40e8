use crate::{
    catalog::{Representation, RepresentationCatalog},
    error::{AbrError, AbrResult},
};

/// Chooses the representation to fetch next.
pub trait RepresentationSelector: Send + Sync {
    fn select<'a>(
        &self,
        catalog: &'a RepresentationCatalog,
        estimate_kbps: f64,
    ) -> &'a Representation;
}

/// Picks the best representation that fits the estimated throughput.
///
/// The catalog is scanned in manifest order and the last fitting entry with a strictly higher
/// bitrate than the current pick is kept. Manifests usually list representations in ascending
/// bitrate, in which case this is simply the last one that fits. The policy does not rely on that
/// order though: equal bitrates resolve to the first one seen, and when nothing fits the
/// representation with the lowest bitrate is returned.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThroughputSelector;

impl RepresentationSelector for ThroughputSelector {
    fn select<'a>(
        &self,
        catalog: &'a RepresentationCatalog,
        estimate_kbps: f64,
    ) -> &'a Representation {
        let budget = estimate_kbps * 1000.0;

        let mut best: Option<&Representation> = None;
        for representation in catalog.iter() {
            if representation.bandwidth as f64 > budget {
                continue;
            }
            match best {
                Some(current) if representation.bandwidth <= current.bandwidth => {}
                _ => best = Some(representation),
            }
        }

        best.unwrap_or_else(|| lowest_bandwidth(catalog))
    }
}

/// Always returns the same representation.
#[derive(Debug, Clone)]
pub struct FixedSelector {
    id: String,
}

impl FixedSelector {
    /// Fails if `id` is not part of `catalog`.
    pub fn new(catalog: &RepresentationCatalog, id: impl Into<String>) -> AbrResult<Self> {
        let id = id.into();
        if catalog.get(&id).is_none() {
            return Err(AbrError::UnknownRepresentation(id));
        }
        Ok(Self { id })
    }
}

impl RepresentationSelector for FixedSelector {
    fn select<'a>(
        &self,
        catalog: &'a RepresentationCatalog,
        _estimate_kbps: f64,
    ) -> &'a Representation {
        catalog
            .get(&self.id)
            .unwrap_or_else(|| lowest_bandwidth(catalog))
    }
}

fn lowest_bandwidth(catalog: &RepresentationCatalog) -> &Representation {
    // min_by_key returns the first of equal minimums
    catalog
        .iter()
        .min_by_key(|r| r.bandwidth)
        .unwrap_or_else(|| catalog.first())
}
