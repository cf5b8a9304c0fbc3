//! Alliances and user profiles.
//!
//! - [`AllianceResolver`]: wallet → alliance badge, used on the paint path
//! - [`AllianceService`]: signed create / join / kick plus list and leaderboard
//! - [`ProfileService`]: signed profile updates and user lookup

mod profile;
mod resolver;
mod service;

pub use profile::{ProfileService, UserProfile};
pub use resolver::AllianceResolver;
pub use service::{AllianceRef, AllianceService};
