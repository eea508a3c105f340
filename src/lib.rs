//! # dibox
//!
//! Async dependency injection with layered (type, name) matching.
//!
//! ## Features
//!
//! - **Named requests**: every request is a type plus an optional argument
//!   name, matched exact first, then by type, then by name
//! - **Heterogeneous bindings**: implementation types, sync and async
//!   factories, pre-built instances and predicate bindings
//! - **Union requests**: candidate types tried in declared order
//! - **Implicit construction**: unbound [`Injectable`] types build themselves
//! - **Single flight**: one instance per resolved key, even under concurrent
//!   requests
//! - **Ordered teardown**: close capabilities run newest first
//!
//! ## Quick Start
//!
//! ```rust
//! use dibox::{Args, Bind, Container, DiResult, Factory, Injectable, Instance, Param};
//! use std::sync::Arc;
//!
//! struct Database {
//!     url: String,
//! }
//!
//! struct UserService {
//!     db: Arc<Database>,
//! }
//!
//! impl Injectable for UserService {
//!     fn dependencies() -> Vec<Param> {
//!         vec![Param::value::<Database>("db")]
//!     }
//!
//!     fn construct(args: Args) -> DiResult<Self> {
//!         Ok(UserService { db: args.get("db")? })
//!     }
//! }
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> DiResult<()> {
//! let container = Container::new();
//! container.bind(
//!     Bind::ty::<Database>()
//!         .factory(Factory::new([Param::value::<String>("url")], |args| {
//!             Ok(Instance::new(Database { url: args.cloned("url")? }))
//!         }))
//!         .arg("url", "postgres://localhost".to_string()),
//! )?;
//!
//! let users = container.provide::<UserService>().await?;
//! assert_eq!(users.db.url, "postgres://localhost");
//!
//! container.close().await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Trait Objects
//!
//! ```rust
//! use dibox::{Args, Bind, Container, DiResult, Injectable, Target};
//! use std::sync::Arc;
//!
//! trait Logger: Send + Sync {
//!     fn log(&self, message: &str) -> String;
//! }
//!
//! struct ConsoleLogger;
//!
//! impl Logger for ConsoleLogger {
//!     fn log(&self, message: &str) -> String {
//!         format!("[LOG] {message}")
//!     }
//! }
//!
//! impl Injectable for ConsoleLogger {
//!     fn construct(_args: Args) -> DiResult<Self> {
//!         Ok(ConsoleLogger)
//!     }
//! }
//!
//! fn as_logger(logger: Arc<ConsoleLogger>) -> Arc<dyn Logger> {
//!     logger
//! }
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> DiResult<()> {
//! let container = Container::new();
//! container.bind(Bind::ty::<dyn Logger>().to(Target::implementation_as(as_logger)))?;
//!
//! let logger = container.provide_trait::<dyn Logger>(None).await?;
//! assert_eq!(logger.log("hello"), "[LOG] hello");
//! # Ok(())
//! # }
//! ```

pub mod binding;
pub mod config;
pub mod container;
pub mod error;
pub mod instance;
pub mod key;
pub mod lifecycle;
pub mod matcher;
pub mod registry;
pub mod store;

pub use binding::{Args, Bind, BindingRecord, BoxFuture, Factory, Param, ParamKind, Selector, Target, TypePredicate};
pub use config::ContainerOptions;
pub use container::Container;
pub use error::{DiError, DiResult};
pub use instance::{Injectable, Instance, InstanceBuilder};
pub use key::{AnyArc, BindingKey, Type, TypeQuery};
pub use lifecycle::{AsyncClose, AsyncStart, Close, Start};
pub use matcher::KeyMap;
pub use registry::Registry;
pub use store::InstanceStore;
