pub mod assistants;
pub mod configs;
pub mod errors;
pub mod languages;
pub mod models;
pub mod predictors;
pub mod prompts;
pub mod sessions;
pub mod translations;

#[cfg(test)]
mod testutil;
