pub mod quantity;
pub mod replies;
pub mod services;
pub mod state;

pub use services::ConversationStateMachine;
pub use state::{ImageRef, PendingOrder, Phase, SessionTable};
