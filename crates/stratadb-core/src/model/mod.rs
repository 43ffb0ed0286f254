mod field;
mod index;
mod key;
mod schema;

pub use field::{FieldKind, FieldModel, TypeVariant};
pub use index::{ComponentWidth, IndexComponent, IndexLayout};
pub use key::{KEY_PART_SEPARATOR, KeyLayout, KeyPart};
pub use schema::{RecordSchema, SchemaId, SchemaRegistry, SchemaRegistryBuilder};
