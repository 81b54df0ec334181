//! qbot-core: bot core library (shared types, configuration, knowledge table, answer resolution).
//!
//! The gateway and the generator skills depend only on the types re-exported here.

mod knowledge;
mod resolver;
mod shared;

// Shared
pub use shared::{ConfigError, CoreConfig, IncomingMessage, MessageContext, Secrets, ENV_BOT_TOKEN, ENV_GEMINI_API_KEY};

// Knowledge
pub use knowledge::{KnowledgeEntry, KnowledgeSource, KnowledgeStore, KnowledgeTable};

// Resolver
pub use resolver::{
    AnswerResolver, GenerationResult, RemoteGenerator, ReplySink, ReplySource, ReplyStyle, Resolution,
    SinkError, DEFAULT_ANSWER_PREFIX, DEFAULT_THINKING_MESSAGE,
};
