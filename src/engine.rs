//! The protocol engine.
//!
//! [`SpaEngine`] owns the link to the controller and is the only thing that ever talks over it,
//! so at most one exchange is in flight at any time. Collaborators that need to share it go
//! through a [`SpaHandle`], which runs the engine on its own task and feeds it commands over a
//! channel.

use crate::mapper;
use crate::parser::{Frame, ParseError, Progress, ResponseParser};
use crate::properties::{SpaProperties, Snapshot};
use crate::property::{FieldValue, RwProperty, WriteError, confirm};
use crate::schedule::{Cadence, PollScheduler};
use crate::schema::{SPANET, STATUS_COMMAND};
use crate::transport::{self, CommandTransport, Link, Pacing};
use jiff::civil::DateTime;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::time::Instant;
use tokio_stream::wrappers::BroadcastStream;
use tokio_util::task::AbortOnDropHandle;
use tracing::{debug, info, warn};

const EVENT_CAPACITY: usize = 1024;

#[derive(Clone, Copy, Debug, Default)]
pub struct Settings {
    pub pacing: Pacing,
    pub cadence: Cadence,
}

#[derive(thiserror::Error, Debug)]
pub enum PollError {
    #[error("could not exchange the status request with the controller")]
    Transport(#[source] transport::Error),
    #[error("could not parse the status frame")]
    Parse(#[source] ParseError),
}

#[derive(thiserror::Error, Debug)]
pub enum CommandError {
    #[error("the engine task is no longer running")]
    EngineGone,
    #[error("the write was not applied")]
    Write(#[source] WriteError),
    #[error("the poll failed")]
    Poll(#[source] PollError),
}

#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SpaEvent {
    PropertyChanged { name: &'static str, value: String },
    PumpChanged { pump: usize, state: Option<i32> },
    /// A status frame was parsed and applied.
    StateUpdated,
    PollFailed { error: String },
}

type StateCallback = Box<dyn FnMut(&SpaProperties) + Send>;

pub struct SpaEngine<S> {
    transport: CommandTransport<S>,
    parser: ResponseParser,
    properties: SpaProperties,
    scheduler: PollScheduler,
    events: broadcast::Sender<SpaEvent>,
    snapshots: watch::Sender<Arc<Snapshot>>,
    last_response: String,
    on_state_updated: Option<StateCallback>,
}

impl<S: Link> SpaEngine<S> {
    pub fn new(io: S, settings: Settings) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let (snapshots, _) = watch::channel(Arc::new(Snapshot::default()));
        Self {
            transport: CommandTransport::new(io, settings.pacing),
            parser: ResponseParser::new(&SPANET),
            properties: SpaProperties::new(),
            scheduler: PollScheduler::new(settings.cadence, Instant::now()),
            events,
            snapshots,
            last_response: String::new(),
            on_state_updated: None,
        }
    }

    pub fn properties(&self) -> &SpaProperties {
        &self.properties
    }

    /// Direct access to the property store, e.g. to register change callbacks.
    pub fn properties_mut(&mut self) -> &mut SpaProperties {
        &mut self.properties
    }

    /// Everything received in response to the last status request, framing included.
    pub fn last_response(&self) -> &str {
        &self.last_response
    }

    pub fn is_initialised(&self) -> bool {
        self.scheduler.is_initialised()
    }

    /// Time since the last status frame that parsed successfully.
    pub fn last_update_age(&self) -> Option<Duration> {
        self.scheduler.last_success().map(|at| at.elapsed())
    }

    /// Call `callback` after every successfully applied status frame.
    pub fn on_state_updated(&mut self, callback: impl FnMut(&SpaProperties) + Send + 'static) {
        self.on_state_updated = Some(Box::new(callback));
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SpaEvent> {
        self.events.subscribe()
    }

    pub fn snapshots(&self) -> watch::Receiver<Arc<Snapshot>> {
        self.snapshots.subscribe()
    }

    pub fn poll_now(&mut self) {
        self.scheduler.poll_now(Instant::now());
    }

    pub fn set_poll_interval(&mut self, interval: Duration) {
        info!(message = "changing the poll interval", ?interval);
        self.scheduler.set_poll_interval(interval);
    }

    /// Request a status frame and apply it to the property store.
    ///
    /// A failed poll leaves the store as it was and schedules a retry.
    pub async fn poll(&mut self) -> Result<(), PollError> {
        let result = self.exchange().await;
        // Sending the status request is not a reason to debounce.
        self.transport.take_dirty();
        let frame = match result {
            Ok(frame) => frame,
            Err(e) => {
                warn!(message = "poll failed", error = (&e as &dyn std::error::Error));
                self.scheduler.on_failure(Instant::now());
                self.emit(SpaEvent::PollFailed { error: e.to_string() });
                return Err(e);
            }
        };
        let report = mapper::apply(&frame, &mut self.properties);
        self.scheduler.on_success(Instant::now());
        debug!(
            message = "frame applied",
            changed = report.changed.len(),
            pumps_changed = report.pumps_changed.len(),
            rejected = report.rejected
        );
        for (name, value) in report.changed {
            self.emit(SpaEvent::PropertyChanged { name, value });
        }
        for pump in report.pumps_changed {
            self.emit_pump(pump);
        }
        self.emit(SpaEvent::StateUpdated);
        if let Some(callback) = &mut self.on_state_updated {
            callback(&self.properties);
        }
        self.publish();
        Ok(())
    }

    async fn exchange(&mut self) -> Result<Frame, PollError> {
        self.transport.send(STATUS_COMMAND).await.map_err(PollError::Transport)?;
        let mut scan = self.parser.begin();
        let outcome = loop {
            match self.transport.read_byte().await {
                Ok(Some(byte)) => match scan.push(byte) {
                    Ok(Progress::Continue) => {}
                    Ok(Progress::Complete) => break Ok(()),
                    Err(e) => break Err(PollError::Parse(e)),
                },
                Ok(None) => break Ok(()),
                Err(e) => break Err(PollError::Transport(e)),
            }
        };
        let trailing = self.transport.flush(true).unwrap_or_else(|e| {
            debug!(
                message = "could not drain the response",
                error = (&e as &dyn std::error::Error)
            );
            Vec::new()
        });
        self.last_response = scan.capture(&trailing);
        outcome?;
        self.parser.finish(scan).map_err(PollError::Parse)
    }

    /// Poll if one is due.
    pub async fn tick(&mut self) -> Option<Result<(), PollError>> {
        if self.scheduler.is_due(Instant::now()) { Some(self.poll().await) } else { None }
    }

    /// Write a property through its typed setter.
    ///
    /// `select` picks the property out of the store, e.g. `|p| &mut p.set_temperature`.
    pub async fn set<T: FieldValue>(
        &mut self,
        select: impl FnOnce(&mut SpaProperties) -> &mut RwProperty<T>,
        value: T,
    ) -> Result<(), WriteError> {
        let result = select(&mut self.properties).set(value, &mut self.transport).await;
        self.after_write(result.is_ok());
        result
    }

    pub async fn set_label<T: FieldValue>(
        &mut self,
        select: impl FnOnce(&mut SpaProperties) -> &mut RwProperty<T>,
        label: &str,
    ) -> Result<(), WriteError> {
        let result = select(&mut self.properties).set_label(label, &mut self.transport).await;
        self.after_write(result.is_ok());
        result
    }

    /// Write a property identified by its name, given a label or the value as text.
    ///
    /// Unlike the typed setters this reports the new value as a [`SpaEvent::PropertyChanged`].
    pub async fn set_by_name(&mut self, name: &str, input: &str) -> Result<(), WriteError> {
        let planned = self
            .properties
            .field_mut(name)
            .and_then(|field| field.as_writable())
            .ok_or_else(|| WriteError::NoSuchProperty(name.to_string()))?
            .plan_text(input)?;
        let Some(planned) = planned else {
            debug!(message = "value already cached, not writing", name);
            return Ok(());
        };
        if let Err(e) = confirm(&mut self.transport, &planned).await {
            warn!(
                message = "write was not confirmed",
                name,
                error = (&e as &dyn std::error::Error)
            );
            self.after_write(false);
            return Err(e);
        }
        let field = self.properties.field_mut(name).and_then(|field| field.as_writable());
        if let Some(field) = field {
            match field.commit_text(&planned) {
                Ok(true) => {
                    let name = mapper::FIELDS.iter().find(|f| f.name == name).map(|f| f.name);
                    if let Some(name) = name {
                        self.emit(SpaEvent::PropertyChanged { name, value: planned.value.clone() });
                    }
                }
                Ok(false) => {}
                Err(e) => warn!(
                    message = "confirmed value not cached",
                    name,
                    error = (&e as &dyn std::error::Error)
                ),
            }
        }
        self.after_write(true);
        Ok(())
    }

    /// Switch pump `number` (1 to 5) to `state`.
    pub async fn set_pump(&mut self, number: usize, state: i32) -> Result<(), WriteError> {
        let pump = self.properties.pump_mut(number).ok_or(WriteError::NoSuchPump(number))?;
        let result = pump.set_state(state, &mut self.transport).await;
        if self.after_write(result.is_ok()) && result.is_ok() {
            self.emit_pump(number);
        }
        result
    }

    /// Set the spa clock and day of the week.
    pub async fn set_spa_time(&mut self, time: DateTime) -> Result<(), WriteError> {
        let gap = self.transport.pacing().burst_gap;
        let result = self.properties.set_spa_time(time, &mut self.transport, gap).await;
        self.after_write(result.is_ok());
        result
    }

    /// Returns whether anything went out over the link.
    fn after_write(&mut self, confirmed: bool) -> bool {
        let sent = self.transport.take_dirty();
        if sent && confirmed {
            self.scheduler.mark_dirty();
            self.publish();
        }
        sent
    }

    fn emit(&self, event: SpaEvent) {
        // Having no subscribers is fine.
        let _ = self.events.send(event);
    }

    fn emit_pump(&self, pump: usize) {
        let state = self.properties.pump(pump).and_then(|p| p.current_state());
        self.emit(SpaEvent::PumpChanged { pump, state });
    }

    fn publish(&self) {
        let mut snapshot = self.properties.snapshot();
        snapshot.initialised = self.scheduler.is_initialised();
        snapshot.firmware = self.parser.layout().map(|layout| layout.firmware());
        self.snapshots.send_replace(Arc::new(snapshot));
    }

    /// Serve commands and poll on schedule until every command sender is gone.
    pub async fn run(mut self, mut commands: mpsc::UnboundedReceiver<Command>) {
        loop {
            let deadline = self.scheduler.evaluate(Instant::now());
            tokio::select! {
                biased;
                command = commands.recv() => match command {
                    Some(command) => self.serve(command).await,
                    None => {
                        debug!("command channel closed, stopping the engine");
                        return;
                    }
                },
                () = tokio::time::sleep_until(deadline) => {
                    // Failures are reported through events and retried on schedule.
                    let _ = self.poll().await;
                }
            }
        }
    }

    async fn serve(&mut self, command: Command) {
        // A requester that went away no longer cares about the outcome.
        match command {
            Command::Set { name, value, reply } => {
                let _ = reply.send(self.set_by_name(&name, &value).await);
            }
            Command::SetPump { pump, state, reply } => {
                let _ = reply.send(self.set_pump(pump, state).await);
            }
            Command::SetSpaTime { time, reply } => {
                let _ = reply.send(self.set_spa_time(time).await);
            }
            Command::PollNow { reply } => {
                let _ = reply.send(self.poll().await);
            }
            Command::SetPollInterval(interval) => self.set_poll_interval(interval),
        }
    }
}

pub enum Command {
    Set { name: String, value: String, reply: oneshot::Sender<Result<(), WriteError>> },
    SetPump { pump: usize, state: i32, reply: oneshot::Sender<Result<(), WriteError>> },
    SetSpaTime { time: DateTime, reply: oneshot::Sender<Result<(), WriteError>> },
    PollNow { reply: oneshot::Sender<Result<(), PollError>> },
    SetPollInterval(Duration),
}

/// Shared access to an engine running on its own task.
///
/// The task is stopped when the handle is dropped.
pub struct SpaHandle {
    commands: mpsc::UnboundedSender<Command>,
    snapshots: watch::Receiver<Arc<Snapshot>>,
    events: broadcast::Sender<SpaEvent>,
    #[allow(unused)] // exists for its drop handler
    engine_task: AbortOnDropHandle<()>,
}

impl SpaHandle {
    pub fn spawn<S: Link + 'static>(engine: SpaEngine<S>) -> Self {
        let (commands, jobs) = mpsc::unbounded_channel();
        let snapshots = engine.snapshots();
        let events = engine.events.clone();
        let engine_task = AbortOnDropHandle::new(tokio::task::spawn(engine.run(jobs)));
        Self { commands, snapshots, events, engine_task }
    }

    pub fn snapshot(&self) -> Arc<Snapshot> {
        Arc::clone(&self.snapshots.borrow())
    }

    pub fn snapshots(&self) -> watch::Receiver<Arc<Snapshot>> {
        self.snapshots.clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SpaEvent> {
        self.events.subscribe()
    }

    /// Events as a stream. Events missed by a lagging consumer show up as errors.
    pub fn events(&self) -> BroadcastStream<SpaEvent> {
        BroadcastStream::new(self.subscribe())
    }

    pub fn is_initialised(&self) -> bool {
        self.snapshots.borrow().initialised
    }

    async fn request<T>(
        &self,
        command: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> Result<T, CommandError> {
        let (reply, response) = oneshot::channel();
        self.commands.send(command(reply)).map_err(|_| CommandError::EngineGone)?;
        response.await.map_err(|_| CommandError::EngineGone)
    }

    pub async fn set(&self, name: &str, value: &str) -> Result<(), CommandError> {
        let (name, value) = (name.to_string(), value.to_string());
        self.request(|reply| Command::Set { name, value, reply })
            .await?
            .map_err(CommandError::Write)
    }

    pub async fn set_pump(&self, pump: usize, state: i32) -> Result<(), CommandError> {
        self.request(|reply| Command::SetPump { pump, state, reply })
            .await?
            .map_err(CommandError::Write)
    }

    pub async fn set_spa_time(&self, time: DateTime) -> Result<(), CommandError> {
        self.request(|reply| Command::SetSpaTime { time, reply })
            .await?
            .map_err(CommandError::Write)
    }

    /// Poll right away and wait for the outcome.
    pub async fn poll_now(&self) -> Result<(), CommandError> {
        self.request(|reply| Command::PollNow { reply }).await?.map_err(CommandError::Poll)
    }

    pub fn set_poll_interval(&self, interval: Duration) -> Result<(), CommandError> {
        self.commands.send(Command::SetPollInterval(interval)).map_err(|_| CommandError::EngineGone)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::FrameBuilder;
    use crate::schema::Register;
    use std::collections::HashMap;
    use tokio::io::{AsyncBufReadExt as _, AsyncWriteExt as _, BufReader, DuplexStream};

    fn fast() -> Settings {
        Settings {
            pacing: Pacing {
                settle_delay: Duration::from_millis(1),
                response_timeout: Duration::from_millis(200),
                read_timeout: Duration::from_millis(50),
                burst_gap: Duration::from_millis(1),
                flush_limit: 5120,
            },
            cadence: Cadence {
                poll_interval: Duration::from_secs(3600),
                retry_interval: Duration::from_secs(3600),
                debounce: Duration::from_millis(500),
            },
        }
    }

    /// Answers status requests with `frames` in turn and other commands from `replies`.
    ///
    /// Hangs up once the frames run out. Yields every command it received.
    fn controller(
        far: DuplexStream,
        frames: Vec<Vec<u8>>,
        replies: &[(&'static str, &'static str)],
    ) -> tokio::task::JoinHandle<Vec<String>> {
        let replies: HashMap<_, _> = replies.iter().copied().collect();
        tokio::spawn(async move {
            let (read, mut write) = tokio::io::split(far);
            let mut lines = BufReader::new(read).lines();
            let mut frames = frames.into_iter();
            let mut received = Vec::new();
            while let Ok(Some(line)) = lines.next_line().await {
                if line.is_empty() {
                    continue;
                }
                let response = if line == STATUS_COMMAND {
                    match frames.next() {
                        Some(frame) => frame,
                        None => break,
                    }
                } else {
                    replies
                        .get(line.as_str())
                        .map(|r| format!("{r}\r\n").into_bytes())
                        .unwrap_or_default()
                };
                received.push(line);
                if write.write_all(&response).await.is_err() {
                    break;
                }
            }
            received
        })
    }

    #[tokio::test]
    async fn poll_fills_the_store() {
        let (near, far) = tokio::io::duplex(8192);
        let frame = FrameBuilder::current().set(Register::R6, 8, "384").build();
        let device = controller(far, vec![frame.clone()], &[]);
        let mut engine = SpaEngine::new(near, fast());
        let mut events = engine.subscribe();
        let mut snapshots = engine.snapshots();
        let updates = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let counter = Arc::clone(&updates);
        engine.on_state_updated(move |_| {
            counter.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        });

        assert!(!engine.is_initialised());
        engine.poll().await.unwrap();
        assert!(engine.is_initialised());
        assert!(engine.last_update_age().is_some());
        assert_eq!(engine.properties().set_temperature.get(), Some(&384));
        assert_eq!(engine.last_response().as_bytes(), &frame[..]);
        assert_eq!(updates.load(std::sync::atomic::Ordering::SeqCst), 1);

        let snapshot = Arc::clone(&snapshots.borrow_and_update());
        assert!(snapshot.initialised);
        assert_eq!(snapshot.value("STMP"), Some("384"));
        assert_eq!(snapshot.spa_time.as_deref(), Some("2024-03-02 14:30:15"));

        let mut seen = Vec::new();
        while let Ok(event) = events.try_recv() {
            seen.push(event);
        }
        assert!(seen.contains(&SpaEvent::PropertyChanged { name: "STMP", value: "384".into() }));
        assert!(seen.contains(&SpaEvent::PumpChanged { pump: 1, state: Some(0) }));
        assert_eq!(seen.last(), Some(&SpaEvent::StateUpdated));

        drop(engine);
        assert_eq!(device.await.unwrap(), ["RF"]);
    }

    #[tokio::test]
    async fn cut_off_frame_keeps_the_previous_state() {
        let (near, far) = tokio::io::duplex(8192);
        let first = FrameBuilder::current().build();
        let second = FrameBuilder::current().set(Register::R6, 8, "400").build();
        let cut = second[..second.len() - 4].to_vec();
        let _device = controller(far, vec![first, cut], &[]);
        let mut engine = SpaEngine::new(near, fast());
        engine.poll().await.unwrap();
        let result = engine.poll().await;
        assert!(
            matches!(result, Err(PollError::Parse(ParseError::Incomplete { .. }))),
            "{result:?}"
        );
        assert_eq!(engine.properties().set_temperature.get(), Some(&380));
        assert!(engine.is_initialised());
    }

    #[tokio::test]
    async fn garbage_is_a_framing_error() {
        let (near, far) = tokio::io::duplex(8192);
        let _device = controller(far, vec![b"XX:,1,2,3\r\n".to_vec()], &[]);
        let mut engine = SpaEngine::new(near, fast());
        let mut events = engine.subscribe();
        let result = engine.poll().await;
        assert!(matches!(result, Err(PollError::Parse(ParseError::Framing(_)))), "{result:?}");
        assert!(!engine.is_initialised());
        assert!(engine.last_response().starts_with("X"));
        assert!(matches!(events.try_recv(), Ok(SpaEvent::PollFailed { .. })));
    }

    #[tokio::test]
    async fn garbage_after_a_good_frame_changes_nothing() {
        let (near, far) = tokio::io::duplex(8192);
        let good = FrameBuilder::current().set(Register::R6, 8, "390").build();
        let _device = controller(far, vec![good, b"XX:,R2,1,2,3,4,5,6,7\r\n".to_vec()], &[]);
        let mut engine = SpaEngine::new(near, fast());
        engine.poll().await.unwrap();
        let before = engine.properties().snapshot();

        let result = engine.poll().await;
        assert!(matches!(result, Err(PollError::Parse(ParseError::Framing(_)))), "{result:?}");
        assert!(engine.is_initialised());
        assert_eq!(engine.properties().set_temperature.get(), Some(&390));
        assert_eq!(
            engine.properties().spa_time.get(),
            Some(&jiff::civil::date(2024, 3, 2).at(14, 30, 15, 0))
        );
        let after = engine.properties().snapshot();
        assert_eq!(after.properties, before.properties);
        assert_eq!(after.spa_time, before.spa_time);
    }

    #[tokio::test]
    async fn writes_are_confirmed_before_they_are_cached() {
        let (near, far) = tokio::io::duplex(8192);
        let device = controller(
            far,
            vec![FrameBuilder::current().build()],
            &[("W40:390", "390"), ("W40:400", "40"), ("S22:1", "S22-OK")],
        );
        let mut engine = SpaEngine::new(near, fast());
        engine.poll().await.unwrap();

        engine.set_by_name("STMP", "380").await.unwrap();
        engine.set_by_name("STMP", "389").await.unwrap();
        assert_eq!(engine.properties().set_temperature.get(), Some(&390));
        let result = engine.set(|p| &mut p.set_temperature, 400).await;
        assert!(matches!(result, Err(WriteError::Verification { .. })), "{result:?}");
        assert_eq!(engine.properties().set_temperature.get(), Some(&390));
        let result = engine.set_by_name("WTMP", "1").await;
        assert!(matches!(result, Err(WriteError::NoSuchProperty(_))), "{result:?}");
        engine.set_pump(1, 1).await.unwrap();
        assert_eq!(engine.properties().pump(1).unwrap().current_state(), Some(1));
        let result = engine.set_pump(1, 2).await;
        assert!(matches!(result, Err(WriteError::PumpStateUnsupported { .. })), "{result:?}");
        assert!(matches!(engine.set_pump(6, 1).await, Err(WriteError::NoSuchPump(6))));

        drop(engine);
        assert_eq!(device.await.unwrap(), ["RF", "W40:390", "W40:400", "S22:1"]);
    }

    #[tokio::test]
    async fn confirmed_writes_debounce_the_next_poll() {
        let (near, far) = tokio::io::duplex(8192);
        let _device =
            controller(far, vec![FrameBuilder::current().build()], &[("W60:12", "12")]);
        let mut engine = SpaEngine::new(near, fast());
        assert!(engine.tick().await.is_some());
        assert!(engine.tick().await.is_none());
        engine.set(|p| &mut p.filtration_hours, 12).await.unwrap();
        assert!(engine.scheduler.is_debouncing());
        let due = engine.scheduler.evaluate(Instant::now());
        assert!(due <= Instant::now() + Duration::from_millis(500));
    }

    #[tokio::test]
    async fn handle_serializes_requests_through_the_engine() {
        let (near, far) = tokio::io::duplex(8192);
        let frame = FrameBuilder::current().build();
        let _device = controller(far, vec![frame.clone(), frame], &[("W67:31", "31")]);
        let handle = SpaHandle::spawn(SpaEngine::new(near, fast()));
        let mut snapshots = handle.snapshots();
        snapshots.wait_for(|s| s.initialised).await.unwrap();
        assert!(handle.is_initialised());

        handle.set("L_1SNZ_DAY", "Weekdays").await.unwrap();
        let snapshot = handle.snapshot();
        assert_eq!(snapshot.value("L_1SNZ_DAY"), Some("31"));
        assert_eq!(snapshot.properties["L_1SNZ_DAY"].label, Some("Weekdays"));

        let result = handle.set("L_1SNZ_DAY", "Someday").await;
        assert!(
            matches!(result, Err(CommandError::Write(WriteError::UnknownLabel(_)))),
            "{result:?}"
        );
        handle.poll_now().await.unwrap();
    }
}
