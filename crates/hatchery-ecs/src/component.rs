//! Component trait and type registration.
//!
//! Every component type stored in a [`World`](crate::world::World) must be
//! registered in its [`ComponentRegistry`] first. Registration assigns a
//! [`ComponentTypeId`] keyed by the Rust [`TypeId`], so lookups are typed
//! (`get_component::<Combat>()`) rather than string-keyed. The registered
//! name exists for logs and diagnostics only.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;

use crate::event::LifecycleEvent;

// ---------------------------------------------------------------------------
// Component
// ---------------------------------------------------------------------------

/// A unit of entity state.
///
/// Components that hold transient, per-occupant state (targets, timers,
/// velocities, tints) override [`on_event`](Self::on_event) to reset that
/// state when the entity is recycled or reused. The world delivers each
/// queued [`LifecycleEvent`] to every component exactly once.
pub trait Component: Any + fmt::Debug {
    /// React to a lifecycle event delivered from the entity's outbox.
    fn on_event(&mut self, _event: &LifecycleEvent) {}
}

/// Object-safe view of a [`Component`] used by the world's storage.
pub(crate) trait ErasedComponent: fmt::Debug {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
    fn into_any(self: Box<Self>) -> Box<dyn Any>;
    fn deliver(&mut self, event: &LifecycleEvent);
}

impl<T: Component> ErasedComponent for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }

    fn deliver(&mut self, event: &LifecycleEvent) {
        <T as Component>::on_event(self, event);
    }
}

// ---------------------------------------------------------------------------
// ComponentTypeId
// ---------------------------------------------------------------------------

/// Opaque identifier for a registered component type.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ComponentTypeId(pub(crate) u32);

impl fmt::Debug for ComponentTypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ComponentTypeId({})", self.0)
    }
}

// ---------------------------------------------------------------------------
// ComponentInfo
// ---------------------------------------------------------------------------

/// Metadata recorded for a registered component type.
#[derive(Debug, Clone)]
pub struct ComponentInfo {
    pub id: ComponentTypeId,
    /// Name supplied at registration, used in logs.
    pub name: String,
    /// Rust type name, for error messages.
    pub type_name: &'static str,
    pub type_id: TypeId,
}

// ---------------------------------------------------------------------------
// ComponentRegistry
// ---------------------------------------------------------------------------

/// Maps Rust component types to [`ComponentTypeId`]s.
///
/// Registering the same type twice returns the id from the first
/// registration and ignores the new name.
#[derive(Debug, Default)]
pub struct ComponentRegistry {
    by_type: HashMap<TypeId, ComponentTypeId>,
    by_name: HashMap<String, ComponentTypeId>,
    /// Indexed by `ComponentTypeId.0`.
    infos: Vec<ComponentInfo>,
}

impl ComponentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `T` under `name`.
    ///
    /// # Panics
    ///
    /// Panics if `name` is already taken by a different type.
    pub fn register<T: Component>(&mut self, name: &str) -> ComponentTypeId {
        let type_id = TypeId::of::<T>();
        if let Some(&existing) = self.by_type.get(&type_id) {
            return existing;
        }
        if self.by_name.contains_key(name) {
            panic!("component name '{name}' is already registered for a different type");
        }

        let id = ComponentTypeId(self.infos.len() as u32);
        self.infos.push(ComponentInfo {
            id,
            name: name.to_owned(),
            type_name: std::any::type_name::<T>(),
            type_id,
        });
        self.by_type.insert(type_id, id);
        self.by_name.insert(name.to_owned(), id);
        id
    }

    /// Id of `T`, if registered.
    pub fn lookup<T: 'static>(&self) -> Option<ComponentTypeId> {
        self.by_type.get(&TypeId::of::<T>()).copied()
    }

    /// Id registered under `name`, if any.
    pub fn lookup_by_name(&self, name: &str) -> Option<ComponentTypeId> {
        self.by_name.get(name).copied()
    }

    pub fn get_info(&self, id: ComponentTypeId) -> Option<&ComponentInfo> {
        self.infos.get(id.0 as usize)
    }

    /// Registered name of `id`, or `"<unregistered>"`.
    pub fn name_of(&self, id: ComponentTypeId) -> &str {
        self.get_info(id)
            .map(|info| info.name.as_str())
            .unwrap_or("<unregistered>")
    }

    pub fn len(&self) -> usize {
        self.infos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.infos.is_empty()
    }

    /// All registered names, sorted.
    pub fn registered_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.by_name.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
