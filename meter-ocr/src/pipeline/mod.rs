mod dispatch;
mod messages;

pub use dispatch::{run_dispatch_worker, DispatchOutcome, DispatchStats, Dispatcher, DropReason};
pub use messages::{
    discovery_message, reading_messages, DiscoveryConfig, ReadingDetail,
    STATE_CLASS_TOTAL_INCREASING,
};
