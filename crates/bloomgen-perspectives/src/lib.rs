pub mod extraction;
pub mod llm_generator;
pub mod programmatic;
pub mod prompts;

pub use extraction::{extract_documents, extract_json};
pub use llm_generator::{GenerationFailure, GenerationReport, LlmPerspectiveGenerator};
pub use programmatic::{
    CategoryDeclaration, PerspectiveDeclaration, ProgrammaticGenerator, PropertyDeclaration,
    RelationshipDeclaration,
};
pub use prompts::{build_batch_prompt, build_single_prompt, PromptPayload, PromptPolicy};
