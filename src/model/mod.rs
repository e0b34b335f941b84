pub mod dates;
pub mod entity;
pub mod schema;

pub use entity::{Domain, Entity, Project, Task, TaskStatus, TimeLog, Value};
pub use schema::{FieldKind, FieldSchema, SchemaRegistry, ValidationError};
