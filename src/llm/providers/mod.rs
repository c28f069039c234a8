pub mod gemini;
pub mod openai_compatible;
