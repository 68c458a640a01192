//! # Engine Class System
//!
//! Prototype-style classes for engine and game objects, built at runtime:
//!
//! - [`Blueprint::extend`] creates a subtype without touching the parent
//! - [`Blueprint::inject`] patches an existing blueprint in place
//! - overriding methods opt in to a [`Super`] handle for calling the implementation
//!   they shadow
//! - list and map field defaults are deep-copied into every instance unless declared
//!   with [`Properties::shared_field`]
//!
//! ## Example
//! ```rust
//! use engine_class::{Blueprint, Properties, Value};
//!
//! let entity = Blueprint::root().extend(
//!     "Entity",
//!     Properties::new()
//!         .field("tags", Value::list([]))
//!         .method("describe", |_, _| Ok(Value::from("entity"))),
//! );
//! let player = entity.extend(
//!     "Player",
//!     Properties::new().override_method("describe", |_, parent, args| {
//!         let base = parent.call(args)?;
//!         Ok(Value::from(format!("player {}", base.as_str().unwrap_or_default())))
//!     }),
//! );
//!
//! let hero = player.construct(&[]).unwrap();
//! assert_eq!(hero.call("describe", &[]).unwrap(), Value::from("player entity"));
//! ```

mod blueprint;
mod copy;
mod error;
mod field;
mod instance;
mod registry;
mod value;

pub use blueprint::{
    Blueprint, FieldPolicy, MethodFn, OverrideFn, Properties, StaticInitFn, Super, INIT,
};
pub use copy::{copy, merge};
pub use error::ClassError;
pub use instance::Instance;
pub use registry::ClassRegistry;
pub use value::{Handle, Value};
