pub mod analysis;
pub mod client;
pub mod models;
pub mod prompts;

#[cfg(test)]
pub(crate) mod testing;

pub use analysis::{analyze, parse_judgment, verify_fix, DiagnoseRequest, VerificationEvidence};
pub use client::{
    invoke_with_fallback, BoxFuture, EvidenceImage, ModelClient, ModelReply, ModelRequest,
};
pub use models::ModelCache;
