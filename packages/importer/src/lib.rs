//! Graft importer - declarative, streaming document imports.
//!
//! This crate turns XML documents into typed object graphs in a single
//! forward pass, driven by a YAML import specification instead of
//! hand-written parsing code. Forward references are first-class: a
//! reference to an id that has not been created yet produces a pending
//! value that is backpatched the moment the object arrives.
//!
//! # Example
//!
//! ```
//! use graft_importer::{ImportEngine, ImportSpec, InMemoryModel};
//!
//! let spec = ImportSpec::from_yaml(r#"
//! root:
//!   handler: dispatch
//!   routes:
//!     book:
//!       handler: create
//!       type: Book
//!       children:
//!         - handler: property
//!           attribute: title
//!           property: title
//! "#).unwrap();
//!
//! let mut model = InMemoryModel::new();
//! let engine = ImportEngine::new(spec);
//! let report = engine
//!     .import_str(r#"<shelf><book id="b1" title="Dune"/></shelf>"#, "shelf.xml", &mut model)
//!     .unwrap();
//! assert_eq!(report.objects_created, 1);
//! ```
//!
//! # Architecture
//!
//! - [`spec`]: YAML import specifications
//! - [`handlers`]: the handler variant set interpreting elements
//! - [`engine`]: the per-document import pass
//! - [`context`]: per-pass state (variables, identity, diagnostics)
//! - [`identity`]: id registry, backpatching, forward-declaration slots
//! - [`env`]: scoped variable environment (`THIS`, `SCOPE`)
//! - [`model`]: the model gateway boundary and the in-memory model
//! - [`value`]: values flowing between handlers and the model
//! - [`convert`]: text-to-value conversion formats
//! - [`expr`]: the predicate evaluator boundary
//! - [`xml`]: the forward-only pull cursor
//! - [`diagnostics`]: recoverable problems, collected per pass
//! - [`error`]: fatal errors and the Result alias
//! - [`cli`]: command-line interface

pub mod cli;
pub mod context;
pub mod convert;
pub mod diagnostics;
pub mod engine;
pub mod env;
pub mod error;
pub mod expr;
pub mod handlers;
pub mod identity;
pub mod model;
pub mod spec;
pub mod value;
pub mod xml;

// Re-export the types most callers need
pub use diagnostics::{Diagnostic, Location, Severity};
pub use engine::{ImportEngine, ImportReport};
pub use error::{ImportError, Result};
pub use handlers::Handler;
pub use model::{InMemoryModel, ModelGateway, ObjectId};
pub use spec::ImportSpec;
pub use value::Value;
