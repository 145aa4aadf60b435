//! Variable resolution module
//!
//! Turns the variables of a stage into the environment a deploy sees:
//! the priority merge from the domain, followed by `$NAME` / `${NAME}`
//! reference substitution.
//!
//! # Usage
//!
//! ```
//! use shipyard_application::variable_resolver::ResolutionSession;
//! use shipyard_domain::environment::{Owner, VariableDraft};
//! use shipyard_domain::{StageId, VariableId};
//!
//! let stage = StageId::new(1).unwrap();
//! let owner = Owner::Stage(stage);
//! let direct = vec![
//!     VariableDraft::new("HOST", "db").persist(VariableId::new(1).unwrap(), owner),
//!     VariableDraft::new("URL", "mysql://$HOST/app").persist(VariableId::new(2).unwrap(), owner),
//! ];
//!
//! let session = ResolutionSession::from_records(stage, direct, Vec::new());
//! assert_eq!(session.env(None)["URL"], "mysql://db/app");
//! ```

pub mod engine;
pub mod parser;
mod session;

pub use engine::{ResolutionResult, VariableResolver, substitute};
pub use parser::{VariableReference, parse_references};
pub use session::ResolutionSession;
