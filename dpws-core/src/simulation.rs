//! The event loop and the application surface.

use crate::internet::{AppId, Event, Internet, NetworkError, Packet, SocketId, Tag};
use crate::Time;
use std::any::Any;

/// Behavior installed on the simulation and driven by events.
///
/// Handlers run to completion on the single event loop; they never block.
/// Anything that would wait is expressed as a scheduled timer instead. A
/// returned error is fatal and aborts the run; recoverable conditions are
/// logged by the handler and swallowed.
pub trait Application {
    /// A previously scheduled timer fired.
    fn timer(
        &mut self,
        internet: &mut Internet,
        id: AppId,
        tag: Tag,
    ) -> Result<(), NetworkError>;

    /// A socket this application connected has become usable.
    fn connected(
        &mut self,
        _internet: &mut Internet,
        _id: AppId,
        _socket: SocketId,
    ) -> Result<(), NetworkError> {
        Ok(())
    }

    /// A packet addressed to this application's node arrived.
    fn receive(
        &mut self,
        _internet: &mut Internet,
        _id: AppId,
        _packet: &Packet,
    ) -> Result<(), NetworkError> {
        Ok(())
    }

    /// The simulation is over; release sockets and cancel timers.
    fn stop(&mut self, _internet: &mut Internet, _id: AppId) {}

    /// Supports downcasting for post-run inspection.
    fn as_any(&self) -> &dyn Any;
}

/// What the run loop did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    /// Number of events dispatched.
    pub events: u64,
    /// Virtual time when the loop ended.
    pub finished_at: Time,
    /// Whether the armed stop event ended the run (as opposed to the queue
    /// draining first).
    pub stopped: bool,
}

/// Owns the [`Internet`] and the installed applications, and runs the
/// virtual-time event loop.
pub struct Simulation {
    pub internet: Internet,
    applications: Vec<Option<Box<dyn Application>>>,
}

impl Simulation {
    pub fn new() -> Self {
        Self {
            internet: Internet::new(),
            applications: Vec::new(),
        }
    }

    /// Installs an application and returns its id.
    pub fn add_application(&mut self, application: Box<dyn Application>) -> AppId {
        self.applications.push(Some(application));
        self.applications.len() - 1
    }

    /// Downcasts an installed application for inspection.
    pub fn application<T: Application + 'static>(&self, id: AppId) -> Option<&T> {
        self.applications
            .get(id)?
            .as_ref()?
            .as_any()
            .downcast_ref()
    }

    /// Runs the event loop until the stop event armed at `duration` fires or
    /// the queue drains, then stops every application and flushes captures.
    pub fn run(&mut self, duration: Time) -> Result<RunSummary, NetworkError> {
        self.internet.schedule_stop(duration);

        let mut events = 0u64;
        let mut stopped = false;
        while let Some((_, event)) = self.internet.pop_event() {
            events += 1;
            match event {
                Event::Stop => {
                    stopped = true;
                    break;
                }
                Event::Deliver { link, node, packet } => {
                    if let Some((app, packet)) =
                        self.internet.handle_delivery(link, node, packet)
                    {
                        self.dispatch(app, |app, internet, id| {
                            app.receive(internet, id, &packet)
                        })?;
                    }
                }
                Event::Timer { app, tag } => {
                    self.dispatch(app, |app, internet, id| app.timer(internet, id, tag))?;
                }
                Event::Connected { app, socket } => {
                    self.dispatch(app, |app, internet, id| {
                        app.connected(internet, id, socket)
                    })?;
                }
            }
        }

        for id in 0..self.applications.len() {
            if let Some(mut application) = self.applications[id].take() {
                application.stop(&mut self.internet, id);
                self.applications[id] = Some(application);
            }
        }
        if let Err(error) = self.internet.flush_captures() {
            tracing::warn!(%error, "failed to flush capture files");
        }

        Ok(RunSummary {
            events,
            finished_at: self.internet.now(),
            stopped,
        })
    }

    /// Runs one application handler with the application taken out of the
    /// arena, so the handler can hold `&mut Internet` without aliasing.
    /// Handlers never re-enter applications, only schedule events.
    fn dispatch<F>(&mut self, id: AppId, f: F) -> Result<(), NetworkError>
    where
        F: FnOnce(&mut dyn Application, &mut Internet, AppId) -> Result<(), NetworkError>,
    {
        let Some(slot) = self.applications.get_mut(id) else {
            tracing::warn!(app = id, "event for unknown application");
            return Ok(());
        };
        let Some(mut application) = slot.take() else {
            tracing::warn!(app = id, "application re-entered");
            return Ok(());
        };
        let result = f(application.as_mut(), &mut self.internet, id);
        self.applications[id] = Some(application);
        result
    }
}

impl Default for Simulation {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::internet::NodeId;
    use crate::protocols::udp;
    use crate::{DataRate, Message};

    /// Sends a fixed number of packets, one per timer tick.
    struct Ticker {
        node: NodeId,
        remote: crate::protocols::ipv4::Ipv4Address,
        socket: Option<SocketId>,
        remaining: u32,
        period: Time,
    }

    impl Ticker {
        const TAG_START: Tag = 0;
        const TAG_SEND: Tag = 1;
    }

    impl Application for Ticker {
        fn timer(
            &mut self,
            internet: &mut Internet,
            id: AppId,
            tag: Tag,
        ) -> Result<(), NetworkError> {
            match tag {
                Self::TAG_START => {
                    let socket = internet.open_socket(self.node, udp::PROTOCOL_NUMBER)?;
                    internet.connect_socket(socket, self.remote, id)?;
                    self.socket = Some(socket);
                }
                _ => {
                    if self.remaining > 0 {
                        self.remaining -= 1;
                        internet.send(self.socket.unwrap(), Message::with_len(80))?;
                        internet.schedule(self.period, id, Self::TAG_SEND);
                    }
                }
            }
            Ok(())
        }

        fn connected(
            &mut self,
            internet: &mut Internet,
            id: AppId,
            _socket: SocketId,
        ) -> Result<(), NetworkError> {
            internet.schedule(Time::ZERO, id, Self::TAG_SEND);
            Ok(())
        }

        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    /// Counts packets addressed to its node.
    struct Counter {
        received: u32,
    }

    impl Application for Counter {
        fn timer(
            &mut self,
            _internet: &mut Internet,
            _id: AppId,
            _tag: Tag,
        ) -> Result<(), NetworkError> {
            Ok(())
        }

        fn receive(
            &mut self,
            _internet: &mut Internet,
            _id: AppId,
            _packet: &Packet,
        ) -> Result<(), NetworkError> {
            self.received += 1;
            Ok(())
        }

        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    #[test]
    fn delivers_until_the_stop_event() {
        let mut sim = Simulation::new();
        let a = sim.internet.add_node("a");
        let b = sim.internet.add_node("b");
        let link = sim.internet.connect(
            a,
            b,
            DataRate::from_bits_per_sec(1_000_000),
            Time::from_millis(1),
        );
        sim.internet
            .assign_address(a, link, [10, 0, 0, 1].into())
            .unwrap();
        sim.internet
            .assign_address(b, link, [10, 0, 0, 2].into())
            .unwrap();
        sim.internet.populate_routing_tables();

        let ticker = sim.add_application(Box::new(Ticker {
            node: a,
            remote: [10, 0, 0, 2].into(),
            socket: None,
            remaining: 10,
            period: Time::from_millis(100),
        }));
        let counter = sim.add_application(Box::new(Counter { received: 0 }));
        sim.internet.set_sink(b, counter);
        sim.internet.schedule_at(Time::ZERO, ticker, Ticker::TAG_START);

        // sends fire at 0, 100 ms, ... 900 ms; all ten arrive well before the
        // stop at one second
        let summary = sim.run(Time::from_secs(1)).unwrap();
        assert!(summary.stopped);
        assert_eq!(summary.finished_at, Time::from_secs(1));
        assert_eq!(sim.application::<Counter>(counter).unwrap().received, 10);
    }
}
