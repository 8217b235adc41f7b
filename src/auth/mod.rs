//! Credential hashing, token issuing and the session state machine

pub mod clock;
pub mod jwt;
pub mod middleware;
pub mod password;
pub mod session;

pub use clock::{Clock, ManualClock, SystemClock};
pub use jwt::{AccessClaims, TokenError, TokenFactory};
pub use middleware::{session_auth_middleware, AuthContext};
pub use password::CredentialHasher;
pub use session::{Session, SessionOutcome};
