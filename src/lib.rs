//! Packaging E2E harness
//!
//! Builds the library's npm tarball once, then installs it into a matrix
//! of sample consumer projects (bundler × module-format × build-mode) and
//! verifies each one can load and run the package, either in a headless
//! browser or directly under Node.
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │                   MatrixRunner (sequential)                │
//! ├────────────────────────────────────────────────────────────┤
//! │  pack()                 -> tarball, built once per run     │
//! │  for each case/scenario:                                   │
//! │    StagedProject::stage -> fresh template copy             │
//! │    .install(tarball)    -> npm install + artifact          │
//! │    ScenarioKind::run    -> one of:                         │
//! │      WebpackBuild  build, StaticServer, race w/ PageLoader │
//! │      ViteDev       dev server on free port + PageLoader    │
//! │      ViteBuild     build, preview server + PageLoader      │
//! │      NodeModule    run entry script, compare stdout        │
//! │    cleanup on success / keep on failure, then fail fast    │
//! └────────────────────────────────────────────────────────────┘
//! ```
//!
//! Everything runs strictly one at a time; the only concurrency is the
//! race between a page check and its server dying underneath it.

pub mod browser;
pub mod error;
pub mod matrix;
pub mod pack;
pub mod process;
pub mod scenarios;
pub mod server;
pub mod stage;

pub use error::{HarnessError, HarnessResult};
pub use matrix::{catalog, MatrixRunner};
