//! State module for tracking crawl progress
//!
//! - `WorkState`: lifecycle of a single discovered URL, including why it was dropped
//! - `DomainState`: per-domain politeness gate (concurrency cap and request history)

mod domain_state;
mod work_state;

pub use domain_state::DomainState;
pub use work_state::WorkState;
