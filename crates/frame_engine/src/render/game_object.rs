//! Game objects and the registry that owns them
//!
//! Ids come from an [`IdAllocator`] owned by the registry instead of a global
//! counter, so two registries (or two tests) never share an id sequence.

use std::collections::btree_map::{self, BTreeMap};
use std::rc::Rc;

use crate::foundation::math::{TransformComponent, Vec3};
use crate::render::vulkan::model::Model;

/// Identifier of a game object, unique within one allocator
pub type GameObjectId = u32;

/// Monotonically increasing id source
#[derive(Debug, Default)]
pub struct IdAllocator {
    next: GameObjectId,
}

impl IdAllocator {
    /// Start counting from zero
    pub fn new() -> Self {
        Self::default()
    }

    /// Hand out the next id
    pub fn allocate(&mut self) -> GameObjectId {
        let id = self.next;
        self.next += 1;
        id
    }
}

/// Marks a game object as a point light
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointLightComponent {
    /// Light strength, stored in the alpha channel of the light color
    pub light_intensity: f32,
}

/// Something in the scene: a mesh, a light, or both
pub struct GameObject {
    id: GameObjectId,
    /// Mesh to draw, if any
    pub model: Option<Rc<Model>>,
    /// Base color; for point lights, the light color
    pub color: Vec3,
    /// Placement in the world
    pub transform: TransformComponent,
    /// Present on point lights
    pub point_light: Option<PointLightComponent>,
}

impl GameObject {
    fn new(id: GameObjectId) -> Self {
        Self {
            id,
            model: None,
            color: Vec3::zeros(),
            transform: TransformComponent::default(),
            point_light: None,
        }
    }

    /// Blank object with an id from `ids`
    pub fn create(ids: &mut IdAllocator) -> Self {
        Self::new(ids.allocate())
    }

    /// Point light with the given intensity, billboard radius and color
    pub fn point_light(ids: &mut IdAllocator, intensity: f32, radius: f32, color: Vec3) -> Self {
        let mut object = Self::create(ids);
        object.color = color;
        object.transform.scale.x = radius;
        object.point_light = Some(PointLightComponent {
            light_intensity: intensity,
        });
        object
    }

    /// Id assigned at creation
    pub fn id(&self) -> GameObjectId {
        self.id
    }

    /// Billboard radius of a point light
    pub fn light_radius(&self) -> f32 {
        self.transform.scale.x
    }
}

impl std::fmt::Debug for GameObject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GameObject")
            .field("id", &self.id)
            .field("has_model", &self.model.is_some())
            .field("color", &self.color)
            .field("transform", &self.transform)
            .field("point_light", &self.point_light)
            .finish()
    }
}

/// All game objects of a scene, iterated in id order
#[derive(Debug, Default)]
pub struct GameObjectRegistry {
    ids: IdAllocator,
    objects: BTreeMap<GameObjectId, GameObject>,
}

impl GameObjectRegistry {
    /// Create an empty registry with its own id sequence
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a blank object and return it for setup
    pub fn spawn(&mut self) -> &mut GameObject {
        let id = self.ids.allocate();
        self.objects.entry(id).or_insert_with(|| GameObject::new(id))
    }

    /// Create a point light with the given intensity, radius and color
    pub fn spawn_point_light(&mut self, intensity: f32, radius: f32, color: Vec3) -> &mut GameObject {
        let object = GameObject::point_light(&mut self.ids, intensity, radius, color);
        let id = object.id;
        self.objects.entry(id).or_insert(object)
    }

    /// Add an object built elsewhere, returning any object it replaced
    pub fn insert(&mut self, object: GameObject) -> Option<GameObject> {
        self.objects.insert(object.id, object)
    }

    /// Look up an object
    pub fn get(&self, id: GameObjectId) -> Option<&GameObject> {
        self.objects.get(&id)
    }

    /// Look up an object for modification
    pub fn get_mut(&mut self, id: GameObjectId) -> Option<&mut GameObject> {
        self.objects.get_mut(&id)
    }

    /// Remove an object; its id is never reused
    pub fn remove(&mut self, id: GameObjectId) -> Option<GameObject> {
        self.objects.remove(&id)
    }

    /// Objects in id order
    pub fn iter(&self) -> btree_map::Values<'_, GameObjectId, GameObject> {
        self.objects.values()
    }

    /// Mutable objects in id order
    pub fn iter_mut(&mut self) -> btree_map::ValuesMut<'_, GameObjectId, GameObject> {
        self.objects.values_mut()
    }

    /// Number of objects
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// Whether the registry holds no objects
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Allocators count up from zero independently
    #[test]
    fn test_id_allocator() {
        let mut first = IdAllocator::new();
        let mut second = IdAllocator::new();
        assert_eq!(first.allocate(), 0);
        assert_eq!(first.allocate(), 1);
        assert_eq!(second.allocate(), 0);
    }

    /// Spawned objects get fresh ids and default transforms
    #[test]
    fn test_spawn() {
        let mut registry = GameObjectRegistry::new();
        let a = registry.spawn().id();
        let b = registry.spawn().id();
        assert_ne!(a, b);
        assert_eq!(registry.len(), 2);
        let object = registry.get(a).unwrap();
        assert_eq!(object.transform, TransformComponent::default());
        assert!(object.model.is_none());
        assert!(object.point_light.is_none());
    }

    /// Point lights carry intensity, radius and color
    #[test]
    fn test_spawn_point_light() {
        let mut registry = GameObjectRegistry::new();
        let light = registry.spawn_point_light(0.2, 0.1, Vec3::new(1.0, 0.5, 0.5));
        assert_eq!(light.point_light, Some(PointLightComponent { light_intensity: 0.2 }));
        assert_eq!(light.light_radius(), 0.1);
        assert_eq!(light.color, Vec3::new(1.0, 0.5, 0.5));
    }

    /// Removed ids are not handed out again
    #[test]
    fn test_remove_does_not_reuse_ids() {
        let mut registry = GameObjectRegistry::new();
        let first = registry.spawn().id();
        registry.remove(first).unwrap();
        assert!(registry.is_empty());
        assert_ne!(registry.spawn().id(), first);
    }

    /// Iteration follows id order
    #[test]
    fn test_iteration_order() {
        let mut registry = GameObjectRegistry::new();
        for _ in 0..5 {
            registry.spawn();
        }
        registry.remove(2);
        let ids: Vec<_> = registry.iter().map(GameObject::id).collect();
        assert_eq!(ids, vec![0, 1, 3, 4]);

        for object in registry.iter_mut() {
            object.transform.translation.y = 1.0;
        }
        assert!(registry.iter().all(|object| object.transform.translation.y == 1.0));
    }

    /// Objects built outside the registry keep their id when inserted
    #[test]
    fn test_insert_external_object() {
        let mut ids = IdAllocator::new();
        let light = GameObject::point_light(&mut ids, 1.0, 0.05, Vec3::new(0.0, 1.0, 0.0));
        let id = light.id();

        let mut registry = GameObjectRegistry::new();
        assert!(registry.insert(light).is_none());
        assert_eq!(registry.get(id).unwrap().light_radius(), 0.05);

        let replacement = GameObject::create(&mut IdAllocator::new());
        assert_eq!(replacement.id(), id);
        assert!(registry.insert(replacement).is_some());
        assert_eq!(registry.len(), 1);
    }
}
