pub mod analyzer;
pub mod extraction;
pub mod handlers;
pub mod models;
pub mod prompts;
pub mod validation;
