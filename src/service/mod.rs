//! Service layer
//!
//! Business logic for authentication and account linking.

mod account;
mod identity;
mod linking;

pub use account::AccountService;
pub use identity::{GitHubLoginOutcome, IdentityService, Resolution, resolve};
pub use linking::{LinkStatus, LinkingService};
