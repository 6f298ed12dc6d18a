//! Fixed instructions sent to the vision model.

/// Instruction accompanying the image when requesting its structured summary
pub const SUMMARY_INSTRUCTION: &str = "Analyze this image. Provide a concise summary and a list \
of key objects/features as tags. Return the result in JSON format.";

/// System instruction for answering questions about the current image
pub const VISUAL_INDEXER_PERSONA: &str = "You are an expert visual indexer. Answer questions \
about the provided image accurately and concisely. Focus on identifying objects, text, colors, \
and spatial relationships.";

/// Lead-in carrying the image when prior turns are replayed ahead of the question
pub const IMAGE_CONTEXT_NOTE: &str = "This is the image we are discussing.";

/// Summary used when the model's structured output could not be parsed
pub const FALLBACK_SUMMARY: &str = "analysis unavailable";

/// Answer used when the model returns no text
pub const NO_RESPONSE_PLACEHOLDER: &str = "No response received.";
