pub mod monitor;
pub mod stream;

pub use monitor::{EventMonitor, MonitorState};
pub use stream::{BusMessage, ChannelStream, EventStream, RedfishAlert};
