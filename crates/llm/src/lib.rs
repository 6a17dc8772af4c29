pub mod provider;
pub mod summarizer;
mod translate;

pub use provider::OpenAiCompatProvider;
pub use summarizer::Summarizer;
