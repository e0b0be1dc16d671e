pub mod constraint;
pub mod entity;
pub mod error;
pub mod lock;
pub mod model;
pub mod oplog;
pub mod workspace;

pub use error::{ModelError, ModelResult};
pub use model::{Model, StatusScope};

pub fn version() -> &'static str {
    "0.1.0"
}
