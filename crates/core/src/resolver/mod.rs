//! Hostname resolution.
//!
//! Resolvers are called from many worker threads at once with no lock held,
//! so implementations must be `Send + Sync`.

mod error;
mod system;
mod traits;
mod types;

pub use error::ResolveError;
pub use system::SystemResolver;
pub use traits::Resolver;
pub use types::AddressFamily;
