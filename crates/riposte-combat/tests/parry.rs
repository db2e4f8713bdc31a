//! A parry ends the whole swing: nothing standing next to the parrier is hit
//! on the swing's remaining active ticks.

use std::f32::consts::PI;

use glam::Vec3;
use riposte_combat::prelude::*;

const DT: f32 = 1.0 / 60.0;

#[test]
fn test_parried_swing_spares_bystanders() {
    let tuning = CombatTuning {
        parry_window: 10.0,
        ..CombatTuning::default()
    };
    let mut sim = Simulation::new(Role::Server, tuning, FlatWorld::new(0.0)).expect("valid tuning");
    let attacker = sim
        .spawn(
            Spawn::new("attacker", Vec3::ZERO)
                .with_loadout(Loadout::with_weapon(Weapon::Melee(MeleeWeapon::sword()))),
        )
        .expect("spawn");
    let parrier = sim
        .spawn(Spawn::new("parrier", Vec3::new(0.0, 0.0, 1.2)).with_yaw(PI))
        .expect("spawn");
    let bystander = sim
        .spawn(Spawn::new("bystander", Vec3::new(0.4, 0.0, 1.2)).with_yaw(PI))
        .expect("spawn");

    sim.submit_input(parrier, InputFrame::idle().holding_block());
    sim.tick(DT);
    sim.submit_input(attacker, InputFrame::idle().with_action(InputAction::Attack));

    let mut parried = false;
    for _ in 0..60 {
        sim.tick(DT);
        parried |= sim
            .notifications()
            .drain()
            .iter()
            .any(|n| matches!(n, Notification::Parried { defender, .. } if *defender == parrier));
    }

    assert!(parried);
    let health = |id| sim.entity(id).expect("entity").actor.vitals.health;
    assert!((health(parrier) - 100.0).abs() < f32::EPSILON);
    assert!((health(bystander) - 100.0).abs() < f32::EPSILON);
}
