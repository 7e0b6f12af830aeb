//! The discrete-event kernel underneath the distributed pulse-wave
//! simulator.
//!
//! This crate supplies the pieces the traffic-generation layer consumes as
//! services: virtual time and the event queue, the simulated topology with
//! its links and raw IPv4 sockets, global routing, packet capture, and the
//! run loop that drives installed applications.
//!
//! # Organization
//!
//! - [`Time`], [`DataRate`], and [`Message`] are the basic currencies.
//! - [`scheduler::EventQueue`] orders events by `(virtual time, insertion
//!   order)` and supports constant-time idempotent cancellation.
//! - [`protocols`] holds addressing, subnetting, and the wire formats the
//!   attack vectors craft by hand.
//! - [`Internet`] is the topology arena: nodes, links, sockets, routing
//!   tables, and capture files.
//! - [`Simulation`] owns the internet plus the installed [`Application`]s
//!   and runs the event loop to a scheduled stop.
//!
//! Everything is deterministic: given the same topology, applications, and
//! seeds, two runs dispatch the same events at the same virtual times and
//! write byte-identical capture files.

pub mod data_rate;
pub use data_rate::DataRate;

pub mod message;
pub use message::Message;

pub mod time;
pub use time::Time;

pub mod scheduler;
pub use scheduler::{EventHandle, EventQueue};

pub mod protocols;

pub mod internet;
pub use internet::{AppId, Internet, LinkId, NetworkError, NodeId, Packet, SocketId, Tag};

pub mod pcap;
pub use pcap::PcapWriter;

pub mod random;
pub use random::SeedSource;

pub mod simulation;
pub use simulation::{Application, RunSummary, Simulation};
