//! souschef-providers: model backends behind the `ModelProvider` trait.

pub mod openai_compat;

pub use openai_compat::OpenAiCompatProvider;
