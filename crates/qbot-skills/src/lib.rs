//! Generator skills: the fallback used when the knowledge table has no answer.

pub use qbot_core::{GenerationResult, RemoteGenerator};

mod model_router;

pub use model_router::{LlmMode, ModelRouter, NO_ANSWER};
