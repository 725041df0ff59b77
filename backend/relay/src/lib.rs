//! `snapsage-relay`: the reasoning service the pipeline dispatches to.
//!
//! Accepts `POST /chat` with `{"text": ...}`, asks the configured language
//! model for an explanation and answers `{"reply": ...}` or `{"error": ...}`.

pub mod providers;
pub mod server;

pub use providers::{build_provider, mock::MockProvider, ollama::OllamaProvider, openai::OpenAiProvider};
pub use server::{relay_router, serve, RelayState};
