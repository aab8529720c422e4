//! Optimistic commit protocol for a versioned catalog on shared storage.
//!
//! Persisted layout (all coordination is through file names; bodies are
//! informational):
//!
//! ```text
//! <root>/
//! +-- tracker/<V>.txt                    body: "<V>"
//! +-- archive/<V>.txt@<expireMillis>     body: "<expireMillis>"
//! +-- commit/<V>/
//!     +-- sub-tracker/<S>.txt            body: "<S>"
//!     +-- sub-hint/COMMIT-HINT.TXT       body: "<U>@<S>"
//!     +-- sub-hint/<U>.txt               body: "<U>"
//!     +-- <S>/PRE_COMMIT-<U>.txt         body: filename
//!     +-- <S>/<U>.txt                    body: "<U>"
//!     +-- <S>/EXPIRED-HINT.TXT           body: "EXPIRED!"
//! ```
//!
//! `<V>` is the catalog version, `<S>` the retry attempt under one version,
//! `<U>` a per-invocation unique client id. The maximum `<V>` in `tracker/`
//! is the current target; the appearance of `COMMIT-HINT.TXT` is what makes
//! a version visible, and the appearance of `EXPIRED-HINT.TXT` is what kills
//! an attempt.

mod adjudicate;
mod archive;
mod attempt;
mod coordinator;
mod error;
pub mod layout;
mod version;

pub use attempt::{AttemptPaths, AttemptState, ClientGroup};
pub use coordinator::{CommitCoordinator, CommitOutcome};
pub use error::CommitError;
pub use layout::Marker;
pub use version::VersionPaths;
