use super::{StateCx, StateId, StatePolicy, StateTraits};
use crate::entity::Controls;
use crate::events::Notification;

/// Terminal. Only a forced respawn leaves it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Dead;

impl StatePolicy for Dead {
    fn id(&self) -> StateId {
        StateId::Dead
    }

    fn traits(&self) -> StateTraits {
        StateTraits {
            can_be_interrupted: false,
            priority: 5,
            allows_movement: false,
            allows_rotation: false,
        }
    }

    fn on_enter(&mut self, _previous: StateId, cx: &mut StateCx<'_, '_>) {
        cx.actor.controls = Controls::default();
        cx.actor.block = None;
        cx.input.clear();
        let entity = cx.actor.id;
        cx.notify(Notification::Died { entity });
        cx.animate("death");
    }

    fn on_physics_process(&mut self, _dt: f32, _cx: &mut StateCx<'_, '_>) {}
}
