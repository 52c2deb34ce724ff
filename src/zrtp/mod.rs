pub mod backoff;
pub mod kdf;
pub mod key_agreement;
pub mod message;
pub mod session;
pub mod state_machine;
pub mod transport;

pub use key_agreement::{KeyAgreement, X25519KeyAgreement};
pub use session::{DerivedKeys, ZrtpRole, ZrtpSession};
pub use state_machine::ZrtpHandshake;
pub use transport::{ChannelTransport, ZrtpTransport};
