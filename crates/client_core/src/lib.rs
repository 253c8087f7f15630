//! Client side of the press-kit site: cached content access, field
//! editors, the password gate, admin bootstrap and the page shells built
//! on top of them.

pub mod accessor;
pub mod backend;
pub mod bootstrap;
pub mod edit_mode;
pub mod editor;
pub mod error;
pub mod identity;
pub mod pages;
pub mod password_gate;
pub mod theme;

pub use accessor::ContentAccessor;
pub use backend::{HttpBackend, PressKitBackend, UnavailableBackend};
pub use bootstrap::{AdminBootstrap, AdminScreen};
pub use edit_mode::EditMode;
pub use error::ClientError;
pub use identity::{HttpIdentityProvider, Identity, IdentityProvider, LoginError, LoginStatus};

#[cfg(test)]
#[path = "tests/support.rs"]
pub(crate) mod test_support;
