//! The applications installed on simulated hosts.

pub mod onoff_retarget;
pub mod packet_sink;
pub mod progress;
pub mod request_client;

pub use onoff_retarget::{OnOffConfig, OnOffRetarget, PortPolicy, SourceState};
pub use packet_sink::{PacketRecord, PacketSink};
pub use progress::ProgressReporter;
pub use request_client::RequestClient;
