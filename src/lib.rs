//! fixlens library crate
//!
//! Turns free-form model output into validated [`diagnosis::DiagnosisResult`]
//! records and folds later verification evidence into them. The binary is a
//! thin CLI over these modules.

pub mod config;
pub mod diagnosis;
pub mod llm;
pub mod util;
