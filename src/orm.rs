//! Entity model: attribute bags, dirty tracking and per-type descriptors
//!
//! Entities are typed key-value maps rather than user structs: a registered
//! [`EntityDescriptor`] supplies the field schema (validated at hydration),
//! mass-assignment protection lists and the relationship registry, replacing
//! reflection over model classes with an explicit lookup table.

pub mod descriptor;
pub mod entity;

pub use descriptor::{DescriptorBuilder, EntityDescriptor, EntityRegistry, FieldType};
pub use entity::{Entity, RelationValue};
