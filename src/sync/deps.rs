//! Static dependency graph among entity kinds.
//!
//! A kind's upserts may only run after every prerequisite kind's batch has
//! fully committed. The orchestrator consumes this DAG rather than relying
//! on call-order convention; kinds in the same stage share no write rows
//! and may run concurrently.

use crate::sync_store::EntityKind;

/// Prerequisite kinds, per kind. Collection membership is observed directly
/// and has no prerequisites.
pub fn prerequisites(kind: EntityKind) -> &'static [EntityKind] {
    match kind {
        EntityKind::Artist => &[],
        EntityKind::Album => &[],
        EntityKind::Collection => &[],
        EntityKind::AlbumArtist => &[EntityKind::Artist, EntityKind::Album],
        EntityKind::Track => &[EntityKind::Album],
        EntityKind::Genre => &[EntityKind::Artist],
        EntityKind::RelatedArtist => &[EntityKind::Artist],
        EntityKind::AudioFeatures => &[EntityKind::Track],
    }
}

/// Topological stages of the DAG: every kind lands one stage after its
/// deepest prerequisite. Stage boundaries are the ordering barriers.
pub fn stages() -> Vec<Vec<EntityKind>> {
    fn depth(kind: EntityKind) -> usize {
        prerequisites(kind)
            .iter()
            .map(|&dep| depth(dep) + 1)
            .max()
            .unwrap_or(0)
    }

    let max_depth = EntityKind::ALL.iter().map(|&k| depth(k)).max().unwrap_or(0);
    let mut stages = vec![Vec::new(); max_depth + 1];
    for kind in EntityKind::ALL {
        stages[depth(kind)].push(kind);
    }
    stages
}
