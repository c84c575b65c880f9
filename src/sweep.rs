/// Removes stations that dropped out of the latest poll.
///
/// Every object below `stations` (channels and states alike) is mapped to
/// its station segment; segments the cycle did not observe lose their whole
/// subtree through one recursive delete. Stray leaves whose station root is
/// already gone are caught the same way.

use std::collections::BTreeSet;

use crate::logging::{self, Source};
use crate::reconcile::CycleContext;
use crate::stations::{station_segment, STATIONS_ROOT};
use crate::store::{ObjectKind, StateStore, StoreError};

/// What a sweep did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SweepOutcome {
    /// The cycle was not clean; nothing was touched.
    Skipped,
    /// Station segments removed and the number of objects deleted.
    Swept { stations: Vec<String>, objects: usize },
}

/// Station segments currently present in the store.
pub fn known_stations<S: StateStore + ?Sized>(store: &mut S) -> Result<BTreeSet<String>, StoreError> {
    let mut paths = store.list_where(STATIONS_ROOT, ObjectKind::Channel)?;
    paths.extend(store.list_where(STATIONS_ROOT, ObjectKind::State)?);

    Ok(paths
        .iter()
        .filter_map(|path| station_segment(path))
        .map(str::to_string)
        .collect())
}

/// Deletes every stored station the cycle did not observe.
///
/// Skipped entirely unless every polled slot succeeded, so a transient
/// outage never wipes the known stations.
pub fn sweep_stale_stations<S: StateStore + ?Sized>(
    store: &mut S,
    ctx: &CycleContext,
) -> Result<SweepOutcome, StoreError> {
    if !ctx.is_clean() {
        logging::warn(
            Source::Sweep,
            None,
            &format!(
                "cleanup skipped: {} of {} slots failed",
                ctx.failed_slots().len(),
                ctx.slots_polled()
            ),
        );
        return Ok(SweepOutcome::Skipped);
    }

    let mut stations = Vec::new();
    let mut objects = 0;

    for segment in known_stations(store)? {
        if ctx.observes(&segment) {
            continue;
        }
        let path = format!("{}.{}", STATIONS_ROOT, segment);
        let removed = store.delete(&path, true)?;
        logging::info(
            Source::Sweep,
            Some(&path),
            &format!("station no longer reported, removed {} objects", removed),
        );
        objects += removed;
        stations.push(segment);
    }

    Ok(SweepOutcome::Swept { stations, objects })
}
