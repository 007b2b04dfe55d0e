//! # Collaborator Seams
//!
//! Interfaces to the systems that live outside the synchronization layer:
//! the death pipeline consumes deaths, content tables answer item questions
//! the appearance block needs.

use crate::entity::EntityId;

/// Receives entities whose hitpoints reached zero.
///
/// Called at most once per death; the entity stays registered and the
/// pipeline decides what happens next (respawn, drop, despawn).
pub trait DeathPipeline {
    /// An entity died this tick.
    fn on_death(&mut self, id: EntityId);
}

impl<F: FnMut(EntityId)> DeathPipeline for F {
    fn on_death(&mut self, id: EntityId) {
        self(id);
    }
}

impl DeathPipeline for Vec<EntityId> {
    fn on_death(&mut self, id: EntityId) {
        self.push(id);
    }
}

/// Item content queries used by the appearance block.
pub trait ItemDefinitions {
    /// Body armour that also covers the arms.
    fn is_full_body(&self, item: u16) -> bool;
    /// Helmet that hides the hair.
    fn is_full_helm(&self, item: u16) -> bool;
    /// Helmet that hides the hair and the beard.
    fn is_full_mask(&self, item: u16) -> bool;
}

/// Item definitions where nothing covers anything.
#[derive(Clone, Copy, Debug, Default)]
pub struct PlainItems;

impl ItemDefinitions for PlainItems {
    fn is_full_body(&self, _item: u16) -> bool {
        false
    }

    fn is_full_helm(&self, _item: u16) -> bool {
        false
    }

    fn is_full_mask(&self, _item: u16) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::EntityKind;

    #[test]
    fn test_closure_pipeline() {
        let mut count = 0;
        {
            let mut pipeline = |_id: EntityId| count += 1;
            let pipeline: &mut dyn DeathPipeline = &mut pipeline;
            pipeline.on_death(EntityId::new(EntityKind::Npc, 0, 0));
        }
        assert_eq!(count, 1);
    }

    #[test]
    fn test_plain_items() {
        assert!(!PlainItems.is_full_body(1115));
        assert!(!PlainItems.is_full_helm(1163));
        assert!(!PlainItems.is_full_mask(1053));
    }
}
