pub mod ai_generator;
pub mod fallback;
pub mod mock_response;
pub mod schema;

pub use ai_generator::{
    build_prompts, parse_generated_json, AiGenerator, AttemptError, CompletionClient,
    CompletionError, GenerationContext, OpenAiClient,
};
pub use fallback::FallbackGenerator;
pub use mock_response::{
    GenerationConfig, MockRequest, MockResponse, MockResponseService, ResponseSource,
};
pub use schema::{normalize_schema, CompiledSchema, SchemaViolation, ValidationReport};
