//! crates/stories_core/src/playback.rs
//!
//! The story playback controller.
//!
//! A controller owns one viewing session: the current story, its neighbors, the
//! progress of the auto-advance timer and a cache of interaction records. All
//! mutation happens on the task that owns the controller. The auto-advance timer
//! runs as a separate task that only *reports* ticks back over a channel; the
//! controller applies them. Ticks are tagged with the timer's generation so a
//! cancelled timer can never move the progress of its successor.

use crate::domain::{Story, StoryId, StoryInteraction};
use crate::ports::{InteractionStore, StoryLookup};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub const DEFAULT_TICKS_PER_SECOND: u32 = 100;
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_millis(10);

const COMMAND_BUFFER: usize = 32;
const EVENT_BUFFER: usize = 64;

//=========================================================================================
// Public Types
//=========================================================================================

/// Timing parameters of the auto-advance timer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaybackConfig {
    pub ticks_per_second: u32,
    pub tick_interval: Duration,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            ticks_per_second: DEFAULT_TICKS_PER_SECOND,
            tick_interval: DEFAULT_TICK_INTERVAL,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Idle,
    Loading,
    Playing,
    Paused,
    Completed,
}

/// An immutable copy of the session, published after every change.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackSnapshot {
    pub state: PlaybackState,
    pub story: Option<Story>,
    pub interaction: Option<StoryInteraction>,
    pub previous_id: Option<StoryId>,
    pub next_id: Option<StoryId>,
    pub progress: f64,
    pub is_paused: bool,
    /// Set once the last story completed and there was nothing to advance to.
    pub end_of_content: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackEvent {
    StoryStarted { story_id: StoryId },
    /// The story's timer ran out. Manual navigation does not emit this.
    StoryCompleted { story_id: StoryId },
    EndOfContent,
}

/// Commands accepted by a running controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackCommand {
    Start,
    Pause,
    Resume,
    Next,
    Previous,
    /// Toggles the like flag of the given story, or of the current one.
    ToggleLike { story_id: Option<StoryId> },
    MarkSeen,
    Stop,
}

/// Number of timer steps for a story of the given duration.
///
/// Zero, negative and non-finite durations take no steps at all.
pub fn step_count(duration_secs: f64, ticks_per_second: u32) -> u64 {
    if !duration_secs.is_finite() || duration_secs <= 0.0 {
        return 0;
    }
    (duration_secs * f64::from(ticks_per_second)).floor() as u64
}

//=========================================================================================
// Auto-advance Timer
//=========================================================================================

/// Messages delivered to the controller from tasks it spawned.
#[derive(Debug)]
enum Internal {
    Tick { generation: u64 },
    /// The timer ran all of its steps.
    Elapsed { generation: u64 },
    /// A background "seen" write finished; the record must be re-read.
    SeenWritten { story_id: StoryId },
}

struct AutoAdvanceTimer {
    token: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl Drop for AutoAdvanceTimer {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

async fn run_timer(
    steps: u64,
    interval: Duration,
    generation: u64,
    paused: Arc<AtomicBool>,
    token: CancellationToken,
    ticks: mpsc::UnboundedSender<Internal>,
) {
    let mut remaining = steps;
    while remaining > 0 {
        if token.is_cancelled() {
            return;
        }
        tokio::select! {
            _ = token.cancelled() => return,
            _ = tokio::time::sleep(interval) => {}
        }
        if token.is_cancelled() {
            return;
        }
        // Paused ticks do not consume a step.
        if paused.load(Ordering::Acquire) {
            continue;
        }
        remaining -= 1;
        if ticks.send(Internal::Tick { generation }).is_err() {
            return;
        }
    }
    if !token.is_cancelled() {
        let _ = ticks.send(Internal::Elapsed { generation });
    }
}

//=========================================================================================
// The Controller
//=========================================================================================

pub struct PlaybackController {
    lookup: Arc<dyn StoryLookup>,
    store: Arc<dyn InteractionStore>,
    config: PlaybackConfig,

    current_id: StoryId,
    state: PlaybackState,
    story: Option<Story>,
    previous_id: Option<StoryId>,
    next_id: Option<StoryId>,
    progress: f64,
    progress_step: f64,
    end_of_content: bool,
    interactions: HashMap<StoryId, StoryInteraction>,

    paused: Arc<AtomicBool>,
    timer: Option<AutoAdvanceTimer>,
    generation: u64,

    internal_tx: mpsc::UnboundedSender<Internal>,
    internal_rx: mpsc::UnboundedReceiver<Internal>,
    snapshots: watch::Sender<PlaybackSnapshot>,
    events: broadcast::Sender<PlaybackEvent>,
}

impl PlaybackController {
    /// Creates an idle controller that will start at `story_id`.
    pub fn new(
        story_id: StoryId,
        lookup: Arc<dyn StoryLookup>,
        store: Arc<dyn InteractionStore>,
        config: PlaybackConfig,
    ) -> Self {
        let (internal_tx, internal_rx) = mpsc::unbounded_channel();
        let (events, _) = broadcast::channel(EVENT_BUFFER);
        let (snapshots, _) = watch::channel(PlaybackSnapshot {
            state: PlaybackState::Idle,
            story: None,
            interaction: None,
            previous_id: None,
            next_id: None,
            progress: 0.0,
            is_paused: false,
            end_of_content: false,
        });
        Self {
            lookup,
            store,
            config,
            current_id: story_id,
            state: PlaybackState::Idle,
            story: None,
            previous_id: None,
            next_id: None,
            progress: 0.0,
            progress_step: 0.0,
            end_of_content: false,
            interactions: HashMap::new(),
            paused: Arc::new(AtomicBool::new(false)),
            timer: None,
            generation: 0,
            internal_tx,
            internal_rx,
            snapshots,
            events,
        }
    }

    pub fn snapshot(&self) -> PlaybackSnapshot {
        PlaybackSnapshot {
            state: self.state,
            story: self.story.clone(),
            interaction: self
                .story
                .as_ref()
                .and_then(|story| self.interactions.get(&story.id).cloned()),
            previous_id: self.previous_id,
            next_id: self.next_id,
            progress: self.progress,
            is_paused: self.is_paused(),
            end_of_content: self.end_of_content,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<PlaybackSnapshot> {
        self.snapshots.subscribe()
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<PlaybackEvent> {
        self.events.subscribe()
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn progress(&self) -> f64 {
        self.progress
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Acquire)
    }

    /// Moves the controller onto its own task and returns the handle driving it.
    pub fn spawn(self) -> PlaybackHandle {
        let (commands, command_rx) = mpsc::channel(COMMAND_BUFFER);
        let snapshots = self.subscribe();
        let events = self.events.clone();
        let task = tokio::spawn(self.run(command_rx));
        PlaybackHandle {
            commands,
            snapshots,
            events,
            task,
        }
    }

    /// Processes commands and timer ticks until the command channel closes or
    /// a `Stop` arrives. The timer is always stopped on the way out.
    pub async fn run(mut self, mut commands: mpsc::Receiver<PlaybackCommand>) {
        enum Step {
            Command(PlaybackCommand),
            Internal(Internal),
        }

        loop {
            let step = tokio::select! {
                command = commands.recv() => match command {
                    Some(command) => Step::Command(command),
                    None => break,
                },
                Some(event) = self.internal_rx.recv() => Step::Internal(event),
            };
            match step {
                Step::Command(command) => {
                    if !self.handle_command(command).await {
                        break;
                    }
                }
                Step::Internal(event) => self.handle_internal(event).await,
            }
        }

        self.stop_auto_advance().await;
        info!(story_id = self.current_id, "Playback session closed");
    }

    /// Applies one command. Returns `false` when the session should end.
    async fn handle_command(&mut self, command: PlaybackCommand) -> bool {
        debug!(?command, "Playback command");
        match command {
            PlaybackCommand::Start => self.start_viewing().await,
            PlaybackCommand::Pause => self.pause(),
            PlaybackCommand::Resume => self.resume(),
            PlaybackCommand::Next => self.next_story().await,
            PlaybackCommand::Previous => self.previous_story().await,
            PlaybackCommand::ToggleLike { story_id } => {
                self.toggle_like(story_id.unwrap_or(self.current_id)).await
            }
            PlaybackCommand::MarkSeen => self.mark_current_as_seen().await,
            PlaybackCommand::Stop => return false,
        }
        true
    }

    async fn handle_internal(&mut self, event: Internal) {
        match event {
            Internal::Tick { generation } => self.on_tick(generation).await,
            Internal::Elapsed { generation } => self.on_elapsed(generation).await,
            // Re-reading here orders this refresh after every earlier write.
            Internal::SeenWritten { story_id } => self.refresh_interaction(story_id).await,
        }
    }

    //=====================================================================================
    // Viewing
    //=====================================================================================

    /// Loads the current story and starts playing it.
    pub async fn start_viewing(&mut self) {
        let story_id = self.current_id;
        self.show(story_id).await;
    }

    /// Resolves `story_id` with its interaction and neighbors, then switches to it.
    ///
    /// If the story cannot be resolved the session keeps its last-known state,
    /// including a still-running timer for the previous story.
    async fn show(&mut self, story_id: StoryId) -> bool {
        let previous_state = self.state;
        self.state = PlaybackState::Loading;
        self.publish();

        let lookup = Arc::clone(&self.lookup);
        let store = Arc::clone(&self.store);
        let (story, interaction, next_id, previous_id) = tokio::join!(
            lookup.get_story(story_id),
            store.get_interaction(story_id),
            lookup.get_next_id(story_id),
            lookup.get_previous_id(story_id),
        );

        let story = match story {
            Ok(Some(story)) => story,
            Ok(None) => {
                warn!(story_id, "Story not found, keeping current session");
                self.state = previous_state;
                self.publish();
                return false;
            }
            Err(e) => {
                warn!(story_id, error = %e, "Failed to load story, keeping current session");
                self.state = previous_state;
                self.publish();
                return false;
            }
        };

        match interaction {
            Ok(interaction) => self.apply_interaction(story_id, interaction),
            Err(e) => warn!(story_id, error = %e, "Failed to load interaction"),
        }
        self.next_id = next_id.unwrap_or_else(|e| {
            warn!(story_id, error = %e, "Failed to resolve next story id");
            None
        });
        self.previous_id = previous_id.unwrap_or_else(|e| {
            warn!(story_id, error = %e, "Failed to resolve previous story id");
            None
        });

        self.current_id = story_id;
        self.story = Some(story);
        self.end_of_content = false;
        info!(story_id, "Showing story");
        self.emit(PlaybackEvent::StoryStarted { story_id });

        // Every display re-marks the story as seen, back-navigation included.
        self.spawn_mark_seen(story_id);
        self.start_auto_advance().await;
        true
    }

    /// Moves to the next story, or ends the session when there is none.
    pub async fn next_story(&mut self) {
        let current = self.current_id;
        let target = match self.lookup.get_next_id(current).await {
            Ok(next) => next,
            Err(e) => {
                warn!(story_id = current, error = %e, "Failed to resolve next story id");
                self.next_id
            }
        };
        let Some(next) = target else {
            self.finish_session().await;
            return;
        };
        // With no timer left the finished story cannot be resumed, so a failed
        // load ends the session like running out of stories.
        if !self.show(next).await && self.timer.is_none() {
            self.finish_session().await;
        }
    }

    async fn finish_session(&mut self) {
        self.stop_auto_advance().await;
        self.state = PlaybackState::Completed;
        self.end_of_content = true;
        info!(story_id = self.current_id, "Reached end of content");
        self.publish();
        self.emit(PlaybackEvent::EndOfContent);
    }

    /// Moves to the previous story. Without one, the current story keeps playing.
    pub async fn previous_story(&mut self) {
        let current = self.current_id;
        let target = match self.lookup.get_previous_id(current).await {
            Ok(previous) => previous,
            Err(e) => {
                warn!(story_id = current, error = %e, "Failed to resolve previous story id");
                self.previous_id
            }
        };
        match target {
            Some(previous) => {
                self.show(previous).await;
            }
            None => debug!(story_id = current, "No previous story"),
        }
    }

    //=====================================================================================
    // Auto-advance
    //=====================================================================================

    /// Restarts the timer for the current story at progress 0.
    pub async fn start_auto_advance(&mut self) {
        self.stop_auto_advance().await;

        let Some((story_id, duration)) = self.story.as_ref().map(|s| (s.id, s.duration)) else {
            debug!("No story loaded, not starting the timer");
            return;
        };
        let steps = step_count(duration, self.config.ticks_per_second);
        self.progress_step = if steps == 0 { 1.0 } else { 1.0 / steps as f64 };
        self.progress = 0.0;

        self.generation += 1;
        let token = CancellationToken::new();
        let handle = tokio::spawn(run_timer(
            steps,
            self.config.tick_interval,
            self.generation,
            Arc::clone(&self.paused),
            token.clone(),
            self.internal_tx.clone(),
        ));
        self.timer = Some(AutoAdvanceTimer {
            token,
            handle: Some(handle),
        });
        debug!(story_id, steps, generation = self.generation, "Auto-advance started");

        self.state = if self.is_paused() {
            PlaybackState::Paused
        } else {
            PlaybackState::Playing
        };
        self.publish();
    }

    /// Cancels the timer and waits for it to finish. Safe to call repeatedly.
    pub async fn stop_auto_advance(&mut self) {
        if let Some(mut timer) = self.timer.take() {
            timer.token.cancel();
            if let Some(handle) = timer.handle.take() {
                if let Err(e) = handle.await {
                    warn!(error = %e, "Auto-advance timer task failed");
                }
            }
            debug!(generation = self.generation, "Auto-advance stopped");
        }
        // Ticks already queued by the old timer are dropped on arrival.
        self.generation += 1;
    }

    pub fn pause(&mut self) {
        self.paused.store(true, Ordering::Release);
        if self.state == PlaybackState::Playing {
            self.state = PlaybackState::Paused;
        }
        self.publish();
    }

    pub fn resume(&mut self) {
        self.paused.store(false, Ordering::Release);
        if self.state == PlaybackState::Paused {
            self.state = PlaybackState::Playing;
        }
        self.publish();
    }

    fn accepts(&self, generation: u64) -> bool {
        self.timer.is_some() && generation == self.generation
    }

    /// Applies one timer step. A tick that was in flight when `pause()` ran
    /// was already counted by the timer, so it still moves the progress.
    async fn on_tick(&mut self, generation: u64) {
        if !self.accepts(generation)
            || !matches!(self.state, PlaybackState::Playing | PlaybackState::Paused)
        {
            return;
        }
        self.progress += self.progress_step;
        if self.progress >= 1.0 {
            self.complete_current().await;
        } else {
            self.publish();
        }
    }

    /// The timer ran out of steps before progress reached 1.0.
    async fn on_elapsed(&mut self, generation: u64) {
        if !self.accepts(generation) {
            return;
        }
        self.complete_current().await;
    }

    async fn complete_current(&mut self) {
        self.progress = 1.0;
        self.stop_auto_advance().await;
        self.state = PlaybackState::Completed;
        self.publish();
        self.emit(PlaybackEvent::StoryCompleted {
            story_id: self.current_id,
        });
        self.next_story().await;
    }

    //=====================================================================================
    // Interactions
    //=====================================================================================

    /// Toggles the like flag and republishes the stored record.
    ///
    /// Store failures are logged; the published interaction then stays unchanged.
    pub async fn toggle_like(&mut self, story_id: StoryId) {
        if let Err(e) = self.store.toggle_like(story_id).await {
            warn!(story_id, error = %e, "Failed to toggle like");
            return;
        }
        info!(story_id, "Toggled like");
        self.refresh_interaction(story_id).await;
    }

    pub async fn mark_current_as_seen(&mut self) {
        let story_id = self.current_id;
        match self.store.mark_seen(story_id).await {
            Ok(()) => debug!(story_id, "Marked story as seen"),
            Err(e) => warn!(story_id, error = %e, "Failed to mark story as seen"),
        }
        self.refresh_interaction(story_id).await;
    }

    async fn refresh_interaction(&mut self, story_id: StoryId) {
        match self.store.get_interaction(story_id).await {
            Ok(interaction) => {
                self.apply_interaction(story_id, interaction);
                self.publish();
            }
            Err(e) => warn!(story_id, error = %e, "Failed to reload interaction"),
        }
    }

    /// Writes "seen" in the background. The controller re-reads the record
    /// itself once the write is reported back.
    fn spawn_mark_seen(&self, story_id: StoryId) {
        let store = Arc::clone(&self.store);
        let results = self.internal_tx.clone();
        tokio::spawn(async move {
            match store.mark_seen(story_id).await {
                Ok(()) => {
                    let _ = results.send(Internal::SeenWritten { story_id });
                }
                Err(e) => warn!(story_id, error = %e, "Failed to mark story as seen"),
            }
        });
    }

    fn apply_interaction(&mut self, story_id: StoryId, interaction: Option<StoryInteraction>) {
        match interaction {
            Some(interaction) => {
                self.interactions.insert(story_id, interaction);
            }
            None => {
                self.interactions.remove(&story_id);
            }
        }
    }

    fn publish(&self) {
        self.snapshots.send_replace(self.snapshot());
    }

    fn emit(&self, event: PlaybackEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }
}

//=========================================================================================
// Handle
//=========================================================================================

/// The command/subscription side of a spawned controller.
pub struct PlaybackHandle {
    commands: mpsc::Sender<PlaybackCommand>,
    snapshots: watch::Receiver<PlaybackSnapshot>,
    events: broadcast::Sender<PlaybackEvent>,
    task: JoinHandle<()>,
}

impl PlaybackHandle {
    /// Sends a command. Returns `false` once the controller has shut down.
    pub async fn send(&self, command: PlaybackCommand) -> bool {
        self.commands.send(command).await.is_ok()
    }

    pub fn snapshots(&self) -> watch::Receiver<PlaybackSnapshot> {
        self.snapshots.clone()
    }

    pub fn current(&self) -> PlaybackSnapshot {
        self.snapshots.borrow().clone()
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<PlaybackEvent> {
        self.events.subscribe()
    }

    /// Stops the controller and waits for its task to finish.
    pub async fn shutdown(self) {
        let _ = self.commands.send(PlaybackCommand::Stop).await;
        if let Err(e) = self.task.await {
            warn!(error = %e, "Playback task failed");
        }
    }
}
