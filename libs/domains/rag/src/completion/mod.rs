mod openai;

pub use openai::OpenAICompletion;
