//! OpenTelemetry GenAI Semantic Convention attribute constants.
//!
//! Names follow the OTel GenAI Semantic Conventions so generator calls are
//! instrumented consistently. The constants are the field names declared on
//! generator spans and are passed to `Span::record` once a response arrives.
//!
//! Span naming convention: `gen_ai.{operation}` (e.g., `"gen_ai.chat"`); the
//! model goes in `gen_ai.request.model`.

// --- Required attributes ---

/// The name of the operation being performed (e.g., "chat").
pub const GEN_AI_OPERATION_NAME: &str = "gen_ai.operation.name";

/// The name of the GenAI provider (e.g., "gemini").
pub const GEN_AI_PROVIDER_NAME: &str = "gen_ai.provider.name";

// --- Recommended attributes ---

/// The model ID requested (e.g., "gemini-2.5-flash").
pub const GEN_AI_REQUEST_MODEL: &str = "gen_ai.request.model";

/// The number of input tokens consumed.
pub const GEN_AI_USAGE_INPUT_TOKENS: &str = "gen_ai.usage.input_tokens";

/// The number of output tokens generated.
pub const GEN_AI_USAGE_OUTPUT_TOKENS: &str = "gen_ai.usage.output_tokens";

/// The finish reason reported by the provider (e.g., "STOP").
pub const GEN_AI_RESPONSE_FINISH_REASONS: &str = "gen_ai.response.finish_reasons";

// --- Operation name values ---

/// Standard chat completion operation.
pub const OP_CHAT: &str = "chat";

// --- Provider name values ---

/// Google Gemini provider identifier.
pub const PROVIDER_GEMINI: &str = "gemini";
