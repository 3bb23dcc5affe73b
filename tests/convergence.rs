//! Property tests: observers converge on the authority
//!
//! Key invariants:
//! 1. Owner references can arrive in any order; the HUD binding ends up the same
//! 2. Ammo stays within 0..=capacity under any mix of shots and reloads
//! 3. After a lossy, reordering link drains, every observer matches the authority
//! 4. Phases only move forward and the countdown never goes negative

use proptest::prelude::*;
use uuid::Uuid;

use blaster_sync_server::game::actor::ActorId;
use blaster_sync_server::game::bots::BotDriver;
use blaster_sync_server::game::match_coordinator::{
    countdown_time, MatchCoordinator, MatchPhase, MatchTimings,
};
use blaster_sync_server::game::observer::ObserverWorld;
use blaster_sync_server::game::session::{MatchSession, SessionConfig};
use blaster_sync_server::game::spawn::{default_points, RandomSpawnSelector};
use blaster_sync_server::game::weapon::{WeaponAuthority, WeaponConfig, WeaponState, WeaponView};
use blaster_sync_server::replication::link::{LinkConditions, SimulatedLink};
use blaster_sync_server::replication::packet::{FieldUpdate, ReplicationPacket};
use blaster_sync_server::util::vec3::Vec3;

#[derive(Debug, Clone)]
enum WeaponOp {
    Equip(u64),
    Fire,
    AddAmmo(u32),
    Drop,
}

fn weapon_op_strategy() -> impl Strategy<Value = WeaponOp> {
    prop_oneof![
        1 => (1u64..4).prop_map(WeaponOp::Equip),
        4 => Just(WeaponOp::Fire),
        1 => (0u32..40).prop_map(WeaponOp::AddAmmo),
        1 => Just(WeaponOp::Drop),
    ]
}

fn apply_op(weapon: &mut WeaponAuthority, op: &WeaponOp, controllers: &[Uuid]) {
    match op {
        WeaponOp::Equip(character) => {
            let controller = controllers[*character as usize % controllers.len()];
            weapon.equip(ActorId(*character), controller);
        }
        WeaponOp::Fire => {
            weapon.fire(Vec3::ZERO);
        }
        WeaponOp::AddAmmo(amount) => {
            weapon.add_ammo(*amount);
        }
        WeaponOp::Drop => {
            weapon.dropped();
        }
    }
}

fn assert_view_matches(view: &WeaponView, weapon: &WeaponAuthority) -> Result<(), TestCaseError> {
    prop_assert_eq!(view.state(), weapon.state());
    prop_assert_eq!(view.ammo(), weapon.ammo());
    prop_assert_eq!(view.owner_character(), weapon.owner_character());
    prop_assert_eq!(view.owner_controller(), weapon.owner_controller());
    Ok(())
}

proptest! {
    /// Owner and state updates delivered in any order bind the HUD the same way
    #[test]
    fn prop_owner_delivery_order_independent(
        order in Just(vec![0usize, 1, 2, 3]).prop_shuffle(),
        local_owns in any::<bool>(),
    ) {
        let local = Uuid::new_v4();
        let owner = if local_owns { local } else { Uuid::new_v4() };
        let mut weapon = WeaponAuthority::spawn(1, WeaponConfig::default(), Vec3::ZERO, None);
        let (mut view, _) = WeaponView::from_snapshot(&weapon.snapshot(), Some(local));

        weapon.equip(ActorId(5), owner);
        weapon.fire(Vec3::ZERO);
        let mut updates = Vec::new();
        weapon.collect_updates(&mut updates);
        prop_assert_eq!(updates.len(), 4);

        for i in order {
            view.apply(&updates[i]);
        }

        assert_view_matches(&view, &weapon)?;
        let hud = view.presentation().binding().hud();
        prop_assert_eq!(hud.is_some(), local_owns);
        if let Some(hud) = hud {
            prop_assert_eq!(hud.controller, local);
            prop_assert_eq!(hud.character, ActorId(5));
        }
    }

    /// Ammo never leaves 0..=capacity and fire decrements by exactly one
    #[test]
    fn prop_ammo_arithmetic(ops in prop::collection::vec(weapon_op_strategy(), 0..80)) {
        let controllers = [Uuid::new_v4(), Uuid::new_v4()];
        let mut weapon = WeaponAuthority::spawn(1, WeaponConfig::default(), Vec3::ZERO, None);
        let capacity = weapon.mag_capacity();

        for op in &ops {
            let before = weapon.ammo();
            let equipped_before = weapon.state() == WeaponState::Equipped;
            apply_op(&mut weapon, op, &controllers);
            let after = weapon.ammo();

            prop_assert!(after <= capacity);
            match op {
                WeaponOp::Fire if equipped_before && before > 0 => prop_assert_eq!(after, before - 1),
                WeaponOp::Fire => prop_assert_eq!(after, before),
                WeaponOp::AddAmmo(amount) => {
                    prop_assert_eq!(after, (before + amount).min(capacity))
                }
                _ => prop_assert_eq!(after, before),
            }
        }
    }

    /// A weapon view fed through a lossy link converges once the link drains
    #[test]
    fn prop_weapon_view_converges(
        ops in prop::collection::vec(weapon_op_strategy(), 1..60),
        seed in any::<u64>(),
        hold in 0.0f64..0.9,
    ) {
        let controllers = [Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4()];
        let mut weapon = WeaponAuthority::spawn(1, WeaponConfig::default(), Vec3::ZERO, None);
        let (mut view, _) = WeaponView::from_snapshot(&weapon.snapshot(), Some(controllers[1]));
        let mut link = SimulatedLink::new(LinkConditions::lossy(hold), seed);

        for (tick, op) in ops.iter().enumerate() {
            apply_op(&mut weapon, op, &controllers);
            let mut packet = ReplicationPacket::new(tick as u64);
            weapon.collect_updates(&mut packet.updates);
            link.send(&packet);
            for update in &link.deliver(tick as u64).updates {
                view.apply(update);
            }
        }
        let rest: Vec<FieldUpdate> = link.flush(u64::MAX).updates;
        for update in &rest {
            view.apply(update);
        }

        assert_view_matches(&view, &weapon)?;
        let expect_hud = weapon.owner_character().is_some()
            && weapon.owner_controller() == Some(controllers[1]);
        prop_assert_eq!(view.presentation().binding().hud().is_some(), expect_hud);
        prop_assert_eq!(
            view.presentation().pickup_trigger_enabled(),
            weapon.presentation().pickup_trigger_enabled()
        );
    }

    /// Whole-session convergence with bots and several lossy observers
    #[test]
    fn prop_session_observers_converge(
        seed in any::<u64>(),
        bots in 1usize..5,
        ticks in 30u32..240,
        hold in 0.0f64..0.8,
    ) {
        let config = SessionConfig {
            timings: MatchTimings { warm_up: 1.0, match_duration: 4.0, cooldown: 60.0 },
            respawn_delay: 0.5,
            weapon_count: 4,
            ..SessionConfig::default()
        };
        let selector = RandomSpawnSelector::new(default_points(), seed);
        let mut session = MatchSession::new(config, 0.0, Box::new(selector));
        let mut driver = BotDriver::new(seed);
        let mut controllers = Vec::new();
        for i in 0..bots {
            let controller = session.add_player(format!("Bot{i}"), true);
            driver.add_bot(controller);
            controllers.push(controller);
        }
        let mut observers: Vec<(SimulatedLink, ObserverWorld)> = (0..2)
            .map(|i| {
                (
                    SimulatedLink::new(LinkConditions::lossy(hold), seed.wrapping_add(i)),
                    ObserverWorld::new(controllers.get(i as usize).copied()),
                )
            })
            .collect();

        let dt = 1.0 / 30.0;
        let mut now = 0.0;
        for _ in 0..ticks {
            now += dt;
            let output = driver.update(&session, dt);
            for (controller, command) in output.commands {
                session.submit(controller, command);
            }
            for (victim, attacker) in output.eliminations {
                session.report_elimination(victim, Some(attacker), now);
            }
            session.tick(now);
            let packet = session.collect_packet();
            for (link, observer) in &mut observers {
                link.send(&packet);
                observer.apply(&link.deliver(session.tick_count()));
            }
        }
        for (link, observer) in &mut observers {
            observer.apply(&link.flush(u64::MAX));
        }

        for (_, observer) in &observers {
            prop_assert_eq!(observer.phase(), Some(session.coordinator().phase()));
            prop_assert_eq!(observer.countdown_time(now), Some(session.coordinator().countdown_time(now)));
            prop_assert_eq!(observer.weapon_count(), session.weapons().count());
            for weapon in session.weapons() {
                let view = observer.weapon(weapon.id());
                prop_assert!(view.is_some());
                if let Some(view) = view {
                    assert_view_matches(view, weapon)?;
                }
            }
        }
    }

    /// Phases only advance; countdown is clamped at zero
    #[test]
    fn prop_phase_monotonic_countdown_clamped(
        warm_up in 0.0f32..20.0,
        match_duration in 0.1f32..60.0,
        cooldown in 0.0f32..20.0,
        level_start in 0.0f32..100.0,
        steps in prop::collection::vec(0.0f32..5.0, 1..100),
    ) {
        let timings = MatchTimings { warm_up, match_duration, cooldown };
        let mut coordinator = MatchCoordinator::new(1, timings, 1.0, level_start);
        let mut now = level_start;
        let mut last = MatchPhase::WaitingToStart;
        let rank = |p: MatchPhase| match p {
            MatchPhase::WaitingToStart => 0,
            MatchPhase::InProgress => 1,
            MatchPhase::Cooldown => 2,
        };

        for step in steps {
            now += step;
            coordinator.tick(now);
            let phase = coordinator.phase();
            prop_assert!(rank(phase) >= rank(last));
            last = phase;
            let countdown = coordinator.countdown_time(now);
            prop_assert!(countdown >= 0.0);
            prop_assert_eq!(countdown, countdown_time(&timings, phase, level_start, now));
        }
    }
}
