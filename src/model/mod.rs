//! Model composition: component classes, prior models, instances and the mapper.

pub mod class;
mod info;
pub mod instance;
pub mod mapper;
pub mod prior_model;

pub use class::ComponentClass;
pub use instance::{ComponentInstance, InstanceEntry, ModelInstance};
pub use mapper::{ModelEntry, ModelMapper, PriorTuple};
pub use prior_model::{CollectionPriorModel, Parameter, PriorModel};
