//! Membership providers
//!
//! A provider exposes a set of candidate outbounds to a group. The only
//! built-in kind is the static [`MemoryProvider`]; refreshable providers
//! plug in through the [`Provider`] trait and the [`ProviderManager`].

mod manager;
mod memory;
mod traits;

pub use manager::ProviderManager;
pub use memory::MemoryProvider;
pub use traits::{Provider, PROVIDER_COMPATIBLE};
