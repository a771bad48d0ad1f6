pub mod credential;
pub mod error;
pub mod session;
pub mod store;

pub use credential::{CredentialSource, StaticCredential};
pub use error::SessionError;
pub use session::{Session, SessionContext};
pub use store::{AgentFactory, SessionStore};
