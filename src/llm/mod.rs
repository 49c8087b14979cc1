//! Language model backends.

pub mod api;

pub use api::ApiLanguageModel;
