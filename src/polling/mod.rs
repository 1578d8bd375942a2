mod poller;
mod snapshot;

pub use poller::{JobPoller, PollOptions};
pub use snapshot::PollOutcome;
