//! Model registry and key router (§4.A consumer, §4.B).

pub mod error;
pub mod key_router;
pub mod model_registry;

pub use error::RegistryError;
pub use key_router::KeyRouter;
pub use model_registry::ModelRegistry;
