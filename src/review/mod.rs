pub mod comment;
pub mod fallback_parser;
pub mod inline;
pub mod orchestrate;
pub mod prompts;
pub mod suggestion;
pub mod tagged_parser;
