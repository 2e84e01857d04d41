//! End-to-end scene behavior through the manager frame loop.

use std::time::Duration;

use glam::{Mat4, Vec3};

use aster_scene::processors::{HierarchicalProcessor, LightProcessor, ModelProcessor};
use aster_scene::{
    CameraComponent, ChildSceneComponent, EntityId, EntityManager, GameTime, LightComponent,
    ModelComponent, ModelNode, NodeLinkComponent, SceneInstance, Script, ScriptComponent, World,
};

fn tick(manager: &mut EntityManager, time: &mut GameTime) {
    let _ = env_logger::builder().is_test(true).try_init();
    time.advance(Duration::from_millis(16));
    manager.update(time);
    manager.draw(time).unwrap();
}

fn world_translation(manager: &EntityManager, entity: EntityId) -> Vec3 {
    manager.world().transform(entity).unwrap().world_translation()
}

#[test]
fn parents_update_before_children() {
    let mut manager = EntityManager::new();
    let mut time = GameTime::new();

    let a = manager.spawn("a");
    let b = manager.spawn("b");
    let c = manager.spawn("c");
    manager.world_mut().attach(a, b).unwrap();
    manager.world_mut().attach(b, c).unwrap();
    manager.add(a);

    manager.world_mut().transform_mut(a).unwrap().translation = Vec3::new(1.0, 0.0, 0.0);
    manager.world_mut().transform_mut(b).unwrap().translation = Vec3::new(0.0, 2.0, 0.0);
    manager.world_mut().transform_mut(c).unwrap().translation = Vec3::new(0.0, 0.0, 3.0);

    tick(&mut manager, &mut time);

    assert!((world_translation(&manager, a) - Vec3::new(1.0, 0.0, 0.0)).length() < 1e-5);
    assert!((world_translation(&manager, b) - Vec3::new(1.0, 2.0, 0.0)).length() < 1e-5);
    assert!((world_translation(&manager, c) - Vec3::new(1.0, 2.0, 3.0)).length() < 1e-5);
}

#[test]
fn repeated_updates_are_stable() {
    let mut manager = EntityManager::new();
    let mut time = GameTime::new();

    let a = manager.spawn("a");
    let b = manager.spawn("b");
    manager.world_mut().attach(a, b).unwrap();
    manager.add(a);
    manager.world_mut().transform_mut(a).unwrap().translation = Vec3::new(0.25, 0.5, 0.75);
    manager
        .world_mut()
        .transform_mut(b)
        .unwrap()
        .set_rotation_euler_xyz(Vec3::new(0.1, 0.2, 0.3));

    tick(&mut manager, &mut time);
    let first = manager.world().transform(b).unwrap().world_matrix();
    tick(&mut manager, &mut time);
    let second = manager.world().transform(b).unwrap().world_matrix();

    assert_eq!(first.to_cols_array(), second.to_cols_array());
}

#[test]
fn node_link_follows_target_skeleton() {
    let mut manager = EntityManager::new();
    let mut time = GameTime::new();

    let rig = manager.spawn("rig");
    manager.set_component(
        rig,
        ModelComponent::default().with_nodes(vec![ModelNode {
            name: "hand".to_string(),
            transform: Mat4::from_translation(Vec3::new(0.0, 1.0, 0.0)),
        }]),
    );
    manager.add(rig);
    manager.world_mut().transform_mut(rig).unwrap().translation = Vec3::new(5.0, 0.0, 0.0);

    // the linked entity sits under a parent whose transform must NOT
    // leak into it while the link is active
    let carrier = manager.spawn("carrier");
    manager.add(carrier);
    manager.world_mut().transform_mut(carrier).unwrap().translation = Vec3::new(100.0, 0.0, 0.0);

    let glove = manager.spawn("glove");
    manager.world_mut().attach(carrier, glove).unwrap();
    manager.set_component(glove, NodeLinkComponent::to_node(rig, "hand"));
    manager.world_mut().transform_mut(glove).unwrap().translation = Vec3::new(0.0, 0.0, 2.0);

    tick(&mut manager, &mut time);

    // world = rig world * hand node * own local
    let expected = Vec3::new(5.0, 1.0, 2.0);
    assert!((world_translation(&manager, glove) - expected).length() < 1e-5);

    // removing the link restores normal propagation under the carrier
    manager.remove_component::<NodeLinkComponent>(glove);
    tick(&mut manager, &mut time);
    let expected = Vec3::new(100.0, 0.0, 2.0);
    assert!((world_translation(&manager, glove) - expected).length() < 1e-5);
}

#[test]
fn unresolved_node_link_falls_back_to_own_transform() {
    let mut manager = EntityManager::new();
    let mut time = GameTime::new();

    let carrier = manager.spawn("carrier");
    manager.add(carrier);
    manager.world_mut().transform_mut(carrier).unwrap().translation = Vec3::new(10.0, 0.0, 0.0);

    let orphan_link = manager.spawn("orphan_link");
    manager.world_mut().attach(carrier, orphan_link).unwrap();
    manager.set_component(orphan_link, NodeLinkComponent::default());
    manager
        .world_mut()
        .transform_mut(orphan_link)
        .unwrap()
        .translation = Vec3::new(0.0, 3.0, 0.0);

    tick(&mut manager, &mut time);

    assert!((world_translation(&manager, orphan_link) - Vec3::new(10.0, 3.0, 0.0)).length() < 1e-5);
}

#[test]
fn root_set_tracks_hierarchy_mutations() {
    let mut manager = EntityManager::new();
    let mut time = GameTime::new();

    let a = manager.spawn("a");
    let b = manager.spawn("b");
    let c = manager.spawn("c");
    manager.add(a);
    manager.add(b);
    manager.add(c);

    let roots = |m: &EntityManager| {
        m.processor::<HierarchicalProcessor>()
            .unwrap()
            .roots()
            .to_vec()
    };
    assert_eq!(roots(&manager), vec![a, b, c]);

    manager.attach(a, b).unwrap();
    assert_eq!(roots(&manager), vec![a, c]);

    manager.detach(a, b).unwrap();
    assert_eq!(roots(&manager), vec![a, c, b]);

    manager.remove(c);
    assert_eq!(roots(&manager), vec![a, b]);

    tick(&mut manager, &mut time);

    // every root is a member with no parent
    for root in roots(&manager) {
        assert!(manager.contains(root));
        assert_eq!(manager.world().parent_of(root), None);
    }
}

#[test]
fn failed_reparent_leaves_scene_untouched() {
    let mut manager = EntityManager::new();
    let mut time = GameTime::new();

    let a = manager.spawn("a");
    let b = manager.spawn("b");
    let c = manager.spawn("c");
    manager.world_mut().attach(a, b).unwrap();
    manager.world_mut().attach(b, c).unwrap();
    manager.add(a);
    tick(&mut manager, &mut time);

    // a under its own grandchild closes a cycle
    assert!(manager.set_parent(a, Some(c)).is_err());
    // c already has a parent
    assert!(manager.attach(a, c).is_err());

    assert_eq!(manager.world().parent_of(a), None);
    assert_eq!(manager.world().parent_of(b), Some(a));
    assert_eq!(manager.world().parent_of(c), Some(b));
    assert_eq!(
        manager.processor::<HierarchicalProcessor>().unwrap().roots().to_vec(),
        vec![a]
    );
    assert_eq!(manager.world().member_count(), 3);
}

#[test]
fn removing_a_root_deregisters_the_subtree() {
    let mut manager = EntityManager::new();
    let mut time = GameTime::new();

    let root = manager.spawn("root");
    let mid = manager.spawn("mid");
    let leaf = manager.spawn("leaf");
    manager.world_mut().attach(root, mid).unwrap();
    manager.world_mut().attach(mid, leaf).unwrap();
    manager.set_component(leaf, ModelComponent::default());
    manager.add(root);
    tick(&mut manager, &mut time);

    assert!(manager
        .processor::<ModelProcessor>()
        .unwrap()
        .render_model(leaf)
        .is_some());

    manager.remove(root);

    assert_eq!(manager.world().member_count(), 0);
    assert!(manager
        .processor::<ModelProcessor>()
        .unwrap()
        .render_model(leaf)
        .is_none());
    assert!(manager.processor::<HierarchicalProcessor>().unwrap().roots().is_empty());
    // entities survive removal and can be re-added
    manager.add(root);
    assert_eq!(manager.world().member_count(), 3);
}

#[test]
fn wide_hierarchies_update_every_child() {
    let mut manager = EntityManager::new();
    let mut time = GameTime::new();

    let root = manager.spawn("root");
    manager.add(root);
    manager.world_mut().transform_mut(root).unwrap().translation = Vec3::new(0.0, 0.0, -4.0);

    // enough children to push the propagation pass onto worker threads
    let count = 2000;
    let mut children = Vec::with_capacity(count);
    for i in 0..count {
        let child = manager.spawn(&format!("child_{i}"));
        manager.world_mut().attach(root, child).unwrap();
        manager.world_mut().transform_mut(child).unwrap().translation =
            Vec3::new(i as f32, 2.0 * i as f32, 0.0);
        children.push(child);
    }
    manager.update(&time);
    time.advance(Duration::from_millis(16));

    for (i, &child) in children.iter().enumerate() {
        let expected = Vec3::new(i as f32, 2.0 * i as f32, -4.0);
        assert!((world_translation(&manager, child) - expected).length() < 1e-4);
    }
}

#[test]
fn disabling_a_parent_cascades_and_unwinds() {
    let mut manager = EntityManager::new();
    let mut time = GameTime::new();

    let parent = manager.spawn("parent");
    let child = manager.spawn("child");
    manager.world_mut().attach(parent, child).unwrap();
    manager.set_component(parent, LightComponent::default());
    manager.set_component(child, LightComponent::default());
    manager.add(parent);
    tick(&mut manager, &mut time);

    let active = |m: &EntityManager| m.processor::<LightProcessor>().unwrap().active_lights().count();
    assert_eq!(active(&manager), 2);

    manager.set_enabled(parent, false);
    assert_eq!(active(&manager), 0);
    assert!(!manager.world().is_effectively_enabled(child));

    manager.set_enabled(parent, true);
    assert_eq!(active(&manager), 2);

    // a directly disabled child stays off through a parent toggle
    manager.set_enabled(child, false);
    manager.set_enabled(parent, false);
    manager.set_enabled(parent, true);
    assert_eq!(active(&manager), 1);
    assert!(!manager.world().is_effectively_enabled(child));
    assert!(manager.world().is_effectively_enabled(parent));
}

struct Orbiter {
    radius: f32,
}

impl Script for Orbiter {
    fn update(&mut self, entity: EntityId, world: &mut World, time: &GameTime) {
        let angle = time.total_seconds();
        if let Some(node) = world.transform_mut(entity) {
            node.translation = Vec3::new(self.radius * angle.cos(), 0.0, self.radius * angle.sin());
        }
    }
}

#[test]
fn script_writes_land_in_same_frame_matrices() {
    let mut manager = EntityManager::new();
    let mut time = GameTime::new();

    let satellite = manager.spawn("satellite");
    manager.set_component(satellite, ScriptComponent::with(Orbiter { radius: 2.0 }));
    manager.add(satellite);

    tick(&mut manager, &mut time);

    let angle = time.total_seconds();
    let expected = Vec3::new(2.0 * angle.cos(), 0.0, 2.0 * angle.sin());
    assert!((world_translation(&manager, satellite) - expected).length() < 1e-5);
}

struct Panicking;

impl Script for Panicking {
    fn update(&mut self, _: EntityId, _: &mut World, _: &GameTime) {
        panic!("script bug");
    }
}

#[test]
#[should_panic(expected = "script bug")]
fn update_panics_propagate() {
    let mut manager = EntityManager::new();
    let entity = manager.spawn("broken");
    manager.set_component(entity, ScriptComponent::with(Panicking));
    manager.add(entity);
    manager.update(&GameTime::new());
}

#[test]
fn child_scene_entities_stay_isolated() {
    let mut manager = EntityManager::new();
    let mut time = GameTime::new();

    let mut nested = SceneInstance::new("nested");
    let inner = nested.manager_mut().spawn("inner");
    nested
        .manager_mut()
        .set_component(inner, LightComponent::default());
    nested.manager_mut().add(inner);

    let portal = manager.spawn("portal");
    manager.set_component(portal, ChildSceneComponent::new(nested));
    // the carrying entity also has a light, but the chain stops before
    // the light processor sees it
    manager.set_component(portal, LightComponent::default());
    manager.add(portal);
    tick(&mut manager, &mut time);

    if let Some(lights) = manager.processor::<LightProcessor>() {
        assert_eq!(lights.active_lights().count(), 0);
    }

    // the nested scene still runs its own processors
    let portal_component = manager
        .world()
        .component::<ChildSceneComponent>(portal)
        .unwrap();
    let inner_lights = portal_component
        .instance
        .manager()
        .processor::<LightProcessor>()
        .unwrap();
    assert_eq!(inner_lights.active_lights().count(), 1);
}

#[test]
fn entities_under_a_scene_portal_still_propagate() {
    let mut manager = EntityManager::new();
    let mut time = GameTime::new();

    let portal = manager.spawn("portal");
    manager.set_component(portal, ChildSceneComponent::new(SceneInstance::new("inner")));
    manager.add(portal);

    // the portal is vetoed before the transform pass sees it, but a
    // plain entity attached below it must not freeze in place
    let hitcher = manager.spawn("hitcher");
    manager.attach(portal, hitcher).unwrap();
    manager
        .world_mut()
        .transform_mut(hitcher)
        .unwrap()
        .translation = Vec3::new(1.0, 2.0, 3.0);

    tick(&mut manager, &mut time);
    assert!((world_translation(&manager, hitcher) - Vec3::new(1.0, 2.0, 3.0)).length() < 1e-5);

    manager.world_mut().transform_mut(hitcher).unwrap().translation = Vec3::new(4.0, 0.0, 0.0);
    tick(&mut manager, &mut time);
    assert!((world_translation(&manager, hitcher) - Vec3::new(4.0, 0.0, 0.0)).length() < 1e-5);
}

#[test]
fn cameras_expose_view_projection() {
    let mut manager = EntityManager::new();
    let mut time = GameTime::new();

    let camera = manager.spawn("camera");
    manager.set_component(camera, CameraComponent::perspective(1.0, 1.5, 0.1, 100.0));
    manager.add(camera);
    manager.world_mut().transform_mut(camera).unwrap().translation = Vec3::new(0.0, 0.0, 10.0);

    tick(&mut manager, &mut time);

    let render_camera = manager
        .processor::<aster_scene::processors::CameraProcessor>()
        .unwrap()
        .render_camera(camera)
        .unwrap();
    // view is the inverse of the camera's world transform
    let eye = render_camera.view.transform_point3(Vec3::new(0.0, 0.0, 10.0));
    assert!(eye.length() < 1e-5);
}
