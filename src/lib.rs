//! Environment-sanitization core for a privilege-elevation tool.
//!
//! This crate owns the part of the problem that decides, per variable,
//! whether it is deleted, preserved, or checked before the invoked
//! command ever sees it, and the rebuilder that drives that decision
//! across a whole environment. Policy storage, identity resolution, PAM,
//! and localization are external collaborators the caller supplies
//! through the traits and plain structs in [`collab`].

pub mod collab;
pub mod defaults;
pub mod didset;
pub mod envfile;
pub mod error;
pub mod hooks;
pub mod policy;
pub mod rebuild;
pub mod table;

pub use collab::{CommandLine, InvokerIdentity, Mode, PlatformPaths, PolicyStore, RunasIdentity};
pub use defaults::StaticPolicy;
pub use didset::{Canonical, DidMask};
pub use envfile::read_env_file;
pub use error::EnvError;
pub use hooks::{getenv_hook, putenv_hook, setenv_hook, unsetenv_hook, HookResult};
pub use policy::{tz_is_sane, CheckOutcome, PolicyMatcher};
pub use rebuild::{rebuild_env, validate_env_vars, RebuildParams};
pub use table::{EnvState, EnvTable};
