mod openai;

pub use openai::OpenAIEmbedder;
