//! # Orbits Demo
//!
//! A headless solar-system style scene: a sun with an orbiting planet
//! and a moon orbiting the planet, driven by scripts and hierarchical
//! transform propagation. Prints world positions a few times per
//! simulated second.

use std::time::Duration;

use glam::Vec3;

use aster_scene::{
    AssetHandle, CameraComponent, EntityId, GameTime, LightComponent, ModelComponent,
    SceneInstance, Script, ScriptComponent, World,
};

/// Rotates the entity's local translation around the parent origin.
struct Orbit {
    radius: f32,
    /// Angular velocity, radians per second.
    speed: f32,
}

impl Script for Orbit {
    fn update(&mut self, entity: EntityId, world: &mut World, time: &GameTime) {
        let angle = time.total_seconds() * self.speed;
        if let Some(node) = world.transform_mut(entity) {
            node.translation = Vec3::new(
                self.radius * angle.cos(),
                0.0,
                self.radius * angle.sin(),
            );
        }
    }
}

fn main() {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    let mut scene = SceneInstance::new("orbits");
    let manager = scene.manager_mut();

    let sun = manager.spawn("sun");
    manager.set_component(sun, ModelComponent::new(AssetHandle(1), AssetHandle(1)));
    manager.set_component(sun, LightComponent::point(Vec3::new(1.0, 0.9, 0.7), 50.0, 100.0));
    manager.add(sun);

    let planet = manager.spawn("planet");
    manager.set_component(planet, ModelComponent::new(AssetHandle(2), AssetHandle(2)));
    manager.set_component(
        planet,
        ScriptComponent::with(Orbit {
            radius: 8.0,
            speed: 0.5,
        }),
    );
    manager.attach(sun, planet).unwrap();

    let moon = manager.spawn("moon");
    manager.set_component(moon, ModelComponent::new(AssetHandle(3), AssetHandle(3)));
    manager.set_component(
        moon,
        ScriptComponent::with(Orbit {
            radius: 2.0,
            speed: 2.0,
        }),
    );
    manager.attach(planet, moon).unwrap();

    let camera = manager.spawn("camera");
    manager.set_component(camera, CameraComponent::default());
    manager.add(camera);
    if let Some(node) = manager.world_mut().transform_mut(camera) {
        node.translation = Vec3::new(0.0, 20.0, 20.0);
    }

    log::info!(
        "scene '{}' with {} entities",
        scene.name(),
        scene.manager().world().member_count()
    );

    let mut time = GameTime::new();
    let step = Duration::from_millis(16);
    for _ in 0..240 {
        time.advance(step);
        scene.update(&time);
        scene.draw(&time);

        if time.frame_count() % 30 == 0 {
            let world = scene.manager().world();
            let planet_pos = world.transform(planet).map(|n| n.world_translation());
            let moon_pos = world.transform(moon).map(|n| n.world_translation());
            log::info!(
                "t={:.2}s planet={:?} moon={:?}",
                time.total_seconds(),
                planet_pos,
                moon_pos
            );
        }
    }
}
