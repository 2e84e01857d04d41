//! # Aster Scene
//!
//! Entity-component scene graph with hierarchical transform propagation.
//!
//! ## Core Types
//!
//! - [`EntityId`] — Lightweight generational entity identifier
//! - [`World`] — Container owning entities, component bags, and the transform graph
//! - [`TransformGraph`] / [`NodeId`] — Arena of transform nodes with parent/child links
//! - [`ComponentRegistry`] — Explicit component-type-to-key registration
//!
//! ## Processing
//!
//! - [`Processor`] — Per-component-combination update/draw stage
//! - [`EntityManager`] — Membership, processor dispatch, and the frame loop
//! - [`SceneInstance`] — Top-level scene wrapper with the draw error boundary
//!
//! A frame is driven as `manager.update(&time)` followed by
//! `manager.draw(&time)`. Update propagates panics from user code; draw
//! reports failures as [`DrawError`] values which [`SceneInstance::draw`]
//! logs without aborting the frame.

mod component;
pub mod components;
mod entity;
mod manager;
mod processor;
pub mod processors;
mod scene_instance;
mod time;
mod transform;
mod world;

pub use component::{Component, ComponentInfo, ComponentKey, ComponentRegistry, ProcessorFactory};
pub use components::{
    AssetHandle, CameraComponent, ChildSceneComponent, LightComponent, LightKind, ModelComponent,
    ModelNode, NodeLinkComponent, Projection, Script, ScriptComponent, SharedScript,
    SpriteComponent,
};
pub use entity::EntityId;
pub use manager::EntityManager;
pub use processor::{DrawError, Processor, ProcessorFlow, TrackEvent, TrackedEntities};
pub use scene_instance::SceneInstance;
pub use time::GameTime;
pub use transform::{HierarchyError, HierarchyEvent, NodeId, TransformGraph, TransformNode};
pub use world::World;
