//! Core pipeline orchestration and domain logic for postharvest.
//!
//! This crate ties together extraction, enrichment, image publishing and
//! document assembly into one request pipeline ([`process_request`]).

pub mod assembler;
pub mod context;
pub mod enrichment;
pub mod pipeline;
pub mod reorder;

pub use assembler::{Assembly, DocumentAssembler, assemble, position_len};
pub use context::{CollaboratorFactory, Collaborators, LiveFactory};
pub use enrichment::LlmEnricher;
pub use pipeline::{
    HarvestReport, HarvestRequest, PipelineOptions, ProgressReporter, SilentProgress, UrlFailure,
    process_request,
};
pub use reorder::ReorderBuffer;
