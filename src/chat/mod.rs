/// Chat
///
/// Forwards user queries to the external webhook, keeps the transcript and
/// records completed exchanges for the signed-in user.

pub mod gateway;
pub mod recorder;
pub mod reply;
pub mod session;

pub use gateway::ChatGateway;
pub use recorder::{QueryRecorder, RecordOutcome};
pub use reply::UpstreamReply;
pub use session::{ChatExchange, ChatMessage, ChatRole, ChatSession};
