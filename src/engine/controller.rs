//! Playback controller
//!
//! One controller per recording on the page. It is the only thing that
//! changes a player's [`PlaybackState`]:
//!
//! ```text
//! Idle   --play()-->        Playing   (takes the audible slot, builds the graph)
//! Playing --pause()-->      Paused    (gives the slot back, keeps the graph)
//! Paused --play()-->        Playing
//! Playing --end of stream-> Ended     (gives the slot back; play() restarts)
//! any    --destroy()-->     terminal  (graph and slot released, events stop)
//! ```
//!
//! Load, decode and start failures send the player back to `Idle` with a
//! `PlaybackFailed` event. Sibling players never notice.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use tracing::{debug, trace, warn};

use crate::dsp::{FilterParameters, ParameterKind, ProcessingContext, SignalGraph};
use crate::engine::buffer::AudioBuffer;
use crate::engine::channel::{ParameterChannel, ParameterSender};
use crate::engine::coordinator::{ExclusivityCoordinator, ExclusivityToken, SlotHolder};
use crate::engine::events::{EventSink, PlaybackFailure, PlayerEventKind, PlayerId};
use crate::engine::media::{MediaElement, MediaEvent, StartRequest};
use crate::engine::source::AudioSource;
use crate::engine::transport::{PlaybackState, SeekOutcome, Transport};

/// Shared surroundings every player on a page is mounted into
#[derive(Clone)]
pub struct PlayerEnv {
    /// Page-wide audible slot
    pub coordinator: ExclusivityCoordinator,
    /// Host real-time processing
    pub context: Rc<dyn ProcessingContext>,
    /// Where events go
    pub events: EventSink,
    /// Seconds of playback between time updates
    pub time_update_interval: f64,
    /// Filter settings a fresh player starts with
    pub initial_filters: FilterParameters,
}

impl fmt::Debug for PlayerEnv {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlayerEnv")
            .field("coordinator", &self.coordinator)
            .field("realtime", &self.context.is_available())
            .field("time_update_interval", &self.time_update_interval)
            .field("initial_filters", &self.initial_filters)
            .finish()
    }
}

/// Lifecycle of a player's signal graph, for display and tests
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GraphStatus {
    /// Nothing played yet
    NotBuilt,
    /// Stages connected and filtering
    Active,
    /// Host has no real-time processing; audio passes through unfiltered
    Unavailable,
    /// Player destroyed, stages freed
    Released,
}

enum GraphSlot {
    NotBuilt,
    Active(SignalGraph),
    Unavailable,
}

impl GraphSlot {
    fn active_mut(&mut self) -> Option<&mut SignalGraph> {
        match self {
            GraphSlot::Active(graph) => Some(graph),
            _ => None,
        }
    }

    /// Release the stages and go back to `NotBuilt`; repeat calls do nothing
    fn release(&mut self) {
        if let GraphSlot::Active(mut graph) = std::mem::replace(self, GraphSlot::NotBuilt) {
            graph.release();
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoadState {
    Loading,
    Loaded,
    Failed,
}

struct ControllerCore {
    id: PlayerId,
    source: AudioSource,
    media: Box<dyn MediaElement>,
    context: Rc<dyn ProcessingContext>,
    coordinator: ExclusivityCoordinator,
    events: EventSink,
    transport: Transport,
    params: ParameterChannel,
    graph: GraphSlot,
    load: LoadState,
    token: Option<ExclusivityToken>,
    /// Serial of the last start request handed to the media element
    start_serial: u64,
    /// Start request still waiting for the host
    pending_start: Option<StartRequest>,
    /// Host confirmed output for the current play
    audible: bool,
    destroyed: bool,
}

impl ControllerCore {
    fn emit(&self, kind: PlayerEventKind) {
        self.events.emit(self.id, kind);
    }

    fn set_state(&mut self, state: PlaybackState) {
        let from = self.transport.state();
        if self.transport.transition(state) {
            debug!(player = %self.id, %from, to = %state, "playback state changed");
            self.emit(PlayerEventKind::StateChanged { state });
        }
    }

    fn emit_time_update(&mut self) {
        self.transport.mark_time_update();
        self.emit(PlayerEventKind::TimeUpdated {
            position: self.transport.position(),
        });
    }

    /// Silence output and forget any start in flight
    fn stop_output(&mut self) {
        self.media.halt();
        self.pending_start = None;
        self.audible = false;
    }

    fn release_token(&mut self) {
        if let Some(token) = self.token.take() {
            self.coordinator.release(token);
        }
    }

    fn sync_parameters(&mut self) {
        self.params.drain(self.graph.active_mut());
    }

    fn ensure_graph(&mut self) {
        if !matches!(self.graph, GraphSlot::NotBuilt) {
            return;
        }
        let params = self.params.current();
        self.graph = match SignalGraph::build(&self.source, self.context.as_ref(), &params) {
            Ok(graph) => GraphSlot::Active(graph),
            Err(err) => {
                warn!(player = %self.id, %err, "filters disabled, playing unfiltered");
                GraphSlot::Unavailable
            }
        };
    }

    fn start_playing(&mut self, token: ExclusivityToken) {
        if self.destroyed {
            self.coordinator.release(token);
            return;
        }
        self.token = Some(token);

        if self.load == LoadState::Failed {
            debug!(player = %self.id, "reloading after failure");
            self.transport.clear_metadata();
            self.load = LoadState::Loading;
            self.media.load(&self.source);
        }

        if self.transport.at_end() {
            self.transport.rewind();
            self.media.seek(0.0);
        }

        self.sync_parameters();
        self.ensure_graph();

        self.start_serial += 1;
        let request = StartRequest(self.start_serial);
        self.pending_start = Some(request);
        self.audible = false;
        self.transport.reset_time_update();

        self.set_state(PlaybackState::Playing);
        self.media.request_start(request);
    }

    fn pause(&mut self) {
        if self.destroyed || self.transport.state() != PlaybackState::Playing {
            return;
        }
        self.stop_output();
        self.release_token();
        if self.load == LoadState::Loaded {
            self.transport.sync_position(self.media.position());
        }
        self.set_state(PlaybackState::Paused);
    }

    fn finish(&mut self) {
        self.stop_output();
        self.release_token();
        if let Some(duration) = self.transport.duration() {
            self.transport.sync_position(duration);
        }
        self.emit_time_update();
        self.set_state(PlaybackState::Ended);
    }

    fn fail(&mut self, failure: PlaybackFailure) {
        warn!(player = %self.id, source = %self.source.url(), %failure, "playback failed");
        self.stop_output();
        self.release_token();
        self.set_state(PlaybackState::Idle);
        self.emit(PlayerEventKind::PlaybackFailed { failure });
    }

    fn seek(&mut self, position: f64) {
        if self.destroyed {
            return;
        }
        match self.transport.seek(position) {
            SeekOutcome::Applied(position) => {
                self.media.seek(position);
                if let Some(graph) = self.graph.active_mut() {
                    graph.reset();
                }
                self.emit_time_update();
            }
            SeekOutcome::Queued => {
                trace!(player = %self.id, position, "seek queued until metadata");
            }
        }
    }

    fn handle_media_event(&mut self, event: MediaEvent) {
        if self.destroyed {
            trace!(player = %self.id, ?event, "event after destroy ignored");
            return;
        }

        match event {
            MediaEvent::MetadataLoaded { duration } => {
                if self.load == LoadState::Loaded {
                    return;
                }
                self.load = LoadState::Loaded;
                let landed = self.transport.set_duration(duration);
                self.emit(PlayerEventKind::MetadataLoaded {
                    duration: self.transport.duration().unwrap_or(0.0),
                });
                if let Some(position) = landed {
                    self.media.seek(position);
                    self.emit_time_update();
                }
            }
            MediaEvent::StartResolved { request } => {
                if self.pending_start == Some(request)
                    && self.transport.state() == PlaybackState::Playing
                {
                    self.pending_start = None;
                    self.audible = true;
                    debug!(player = %self.id, %request, "output started");
                } else {
                    trace!(player = %self.id, %request, "stale start resolved");
                }
            }
            MediaEvent::StartRejected { request, reason } => {
                if self.pending_start == Some(request) {
                    self.fail(PlaybackFailure::StartRejected(reason));
                } else {
                    trace!(player = %self.id, %request, "stale start rejected");
                }
            }
            MediaEvent::Ended => {
                if self.transport.state() == PlaybackState::Playing {
                    self.finish();
                }
            }
            MediaEvent::LoadFailed { reason } => {
                self.load = LoadState::Failed;
                self.fail(PlaybackFailure::SourceLoadFailed(reason));
            }
            MediaEvent::DecodeFailed { reason } => {
                self.load = LoadState::Failed;
                self.fail(PlaybackFailure::SourceDecodeFailed(reason));
            }
        }
    }

    fn render(&mut self, out: &mut AudioBuffer) -> usize {
        if self.destroyed
            || !self.audible
            || self.load != LoadState::Loaded
            || self.transport.state() != PlaybackState::Playing
        {
            out.silence();
            return 0;
        }

        self.sync_parameters();
        let frames = self.media.read(out);
        if let Some(graph) = self.graph.active_mut() {
            graph.process(out);
        }
        out.silence_from(frames);

        self.transport.sync_position(self.media.position());
        if frames < out.len() || self.transport.at_end() {
            self.finish();
        } else if self.transport.time_update_due() {
            self.emit_time_update();
        }
        frames
    }

    fn destroy(&mut self) {
        if self.destroyed {
            return;
        }
        self.destroyed = true;
        self.stop_output();
        self.release_token();
        self.graph.release();
        self.media.unload();
        debug!(player = %self.id, source = %self.source.url(), "player destroyed");
    }

    fn graph_status(&self) -> GraphStatus {
        match (&self.graph, self.destroyed) {
            (_, true) => GraphStatus::Released,
            (GraphSlot::NotBuilt, false) => GraphStatus::NotBuilt,
            (GraphSlot::Active(_), false) => GraphStatus::Active,
            (GraphSlot::Unavailable, false) => GraphStatus::Unavailable,
        }
    }
}

impl SlotHolder for RefCell<ControllerCore> {
    fn yield_slot(&self) {
        match self.try_borrow_mut() {
            Ok(mut core) => core.pause(),
            Err(_) => warn!("player busy while losing the audible slot"),
        }
    }
}

/// Review player for one recording
///
/// Not `Send`: players live on the page's event loop. Dropping a player
/// destroys it.
pub struct PlaybackController {
    id: PlayerId,
    core: Rc<RefCell<ControllerCore>>,
    coordinator: ExclusivityCoordinator,
    /// Set by `destroy` even when the core is busy
    destroyed: Cell<bool>,
}

impl PlaybackController {
    /// Mount a player for `source` and start loading its metadata
    pub fn new(source: AudioSource, media: Box<dyn MediaElement>, env: &PlayerEnv) -> Self {
        let id = PlayerId::new();
        let mut core = ControllerCore {
            id,
            source,
            media,
            context: Rc::clone(&env.context),
            coordinator: env.coordinator.clone(),
            events: env.events.clone(),
            transport: Transport::new(env.time_update_interval),
            params: ParameterChannel::new(env.initial_filters),
            graph: GraphSlot::NotBuilt,
            load: LoadState::Loading,
            token: None,
            start_serial: 0,
            pending_start: None,
            audible: false,
            destroyed: false,
        };
        core.media.load(&core.source);
        debug!(player = %id, source = %core.source.url(), "player mounted");

        Self {
            id,
            core: Rc::new(RefCell::new(core)),
            coordinator: env.coordinator.clone(),
            destroyed: Cell::new(false),
        }
    }

    /// Start or resume playback
    ///
    /// Takes the audible slot first, which pauses whichever other player
    /// holds it. No effect once destroyed or while already playing.
    pub fn play(&self) {
        if self.settle() {
            return;
        }
        {
            let core = self.core.borrow();
            if core.destroyed || core.transport.state() == PlaybackState::Playing {
                return;
            }
        }

        let holder: Weak<RefCell<ControllerCore>> = Rc::downgrade(&self.core);
        let token = self.coordinator.acquire(self.id, holder);
        self.core.borrow_mut().start_playing(token);
    }

    /// Pause playback, keeping position and graph
    pub fn pause(&self) {
        if self.settle() {
            return;
        }
        self.core.borrow_mut().pause();
    }

    /// Move the playhead, clamped to `[0, duration]`
    ///
    /// Before metadata arrives the seek is queued and applied on load.
    pub fn seek(&self, position: f64) {
        if self.settle() {
            return;
        }
        self.core.borrow_mut().seek(position);
    }

    /// Change one filter parameter; returns the clamped value in effect
    ///
    /// Works before the graph exists; the value is used when it is built.
    pub fn set_parameter(&self, kind: ParameterKind, value: f64) -> f64 {
        let mut core = self.core.borrow_mut();
        core.sync_parameters();
        let ControllerCore { params, graph, .. } = &mut *core;
        params.set(kind, value, graph.active_mut())
    }

    /// Current filter settings, including changes still queued by senders
    pub fn filter_parameters(&self) -> FilterParameters {
        let mut core = self.core.borrow_mut();
        core.sync_parameters();
        core.params.current()
    }

    /// Handle for UI controls to push parameter changes
    pub fn parameter_sender(&self) -> ParameterSender {
        self.core.borrow().params.sender()
    }

    /// Deliver an asynchronous event from the host media element
    pub fn handle_media_event(&self, event: MediaEvent) {
        if self.settle() {
            return;
        }
        self.core.borrow_mut().handle_media_event(event);
    }

    /// Deliver every event the media element queued itself
    ///
    /// Returns how many events were handled.
    pub fn pump(&self) -> usize {
        let mut handled = 0;
        while !self.settle() {
            let event = self.core.borrow_mut().media.poll_event();
            let Some(event) = event else { break };
            self.handle_media_event(event);
            handled += 1;
        }
        handled
    }

    /// Output callback: fill `out` with the next filtered block
    ///
    /// Writes silence and returns 0 unless the player is audible. Returns
    /// the number of frames of real audio written.
    pub fn render(&self, out: &mut AudioBuffer) -> usize {
        if self.settle() {
            out.silence();
            return 0;
        }
        self.core.borrow_mut().render(out)
    }

    /// Tear the player down; safe to call repeatedly
    ///
    /// Anything still in flight (a load, a start request) completes into
    /// nothing afterwards.
    pub fn destroy(&self) {
        self.destroyed.set(true);
        match self.core.try_borrow_mut() {
            Ok(mut core) => core.destroy(),
            Err(_) => warn!(player = %self.id, "player busy, teardown finishes on next call"),
        }
    }

    /// Finish a teardown deferred by a busy core; true once destroyed
    fn settle(&self) -> bool {
        if !self.destroyed.get() {
            return false;
        }
        if let Ok(mut core) = self.core.try_borrow_mut() {
            core.destroy();
        }
        true
    }

    /// Player identity, as found in events
    pub fn id(&self) -> PlayerId {
        self.id
    }

    /// Recording this player is bound to
    pub fn source(&self) -> AudioSource {
        self.core.borrow().source.clone()
    }

    /// Current playback state
    pub fn state(&self) -> PlaybackState {
        self.core.borrow().transport.state()
    }

    /// Playhead in seconds
    pub fn position(&self) -> f64 {
        self.core.borrow().transport.position()
    }

    /// Total length, once metadata arrived
    pub fn duration(&self) -> Option<f64> {
        self.core.borrow().transport.duration()
    }

    /// Whether output has actually started for the current play
    pub fn is_audible(&self) -> bool {
        let core = self.core.borrow();
        core.audible && core.transport.state() == PlaybackState::Playing
    }

    /// Signal graph lifecycle
    pub fn graph_status(&self) -> GraphStatus {
        if self.settle() {
            return GraphStatus::Released;
        }
        self.core.borrow().graph_status()
    }

    /// Whether `destroy` has run
    pub fn is_destroyed(&self) -> bool {
        self.destroyed.get()
    }
}

impl Drop for PlaybackController {
    fn drop(&mut self) {
        self.destroy();
    }
}

impl fmt::Debug for PlaybackController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = f.debug_struct("PlaybackController");
        out.field("id", &self.id);
        match self.core.try_borrow() {
            Ok(core) => out
                .field("source", &core.source.url())
                .field("state", &core.transport.state())
                .field("position", &core.transport.position()),
            Err(_) => out.field("core", &"<busy>"),
        };
        out.finish()
    }
}
