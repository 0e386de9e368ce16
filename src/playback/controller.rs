use std::sync::{Arc, Mutex as StdMutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use super::clock::{PlaybackClock, TickOutcome};
use super::error::PlaybackError;
use super::types::{Intent, PlaybackMode, PlaybackSettings, PlaybackSnapshot};
use crate::track::SampleSequence;

/// Tokio intervals reject a zero period.
const SHORTEST_TICK: Duration = Duration::from_millis(1);

fn floor_interval(settings: &PlaybackSettings, interval: Duration) -> Duration {
    interval.max(settings.min_tick_interval).max(SHORTEST_TICK)
}

#[derive(Debug)]
struct Shared {
    samples: Option<SampleSequence>,
    clock: PlaybackClock,
    mode: PlaybackMode,
    tick_interval: Duration,
    /// Bumped on every cancel; a timer only ticks while its epoch is current.
    timer_epoch: u64,
}

impl Shared {
    fn sample_count(&self) -> usize {
        self.samples.as_ref().map_or(0, SampleSequence::len)
    }

    fn advance(&mut self) -> Result<TickOutcome, PlaybackError> {
        if self.sample_count() == 0 {
            return Err(PlaybackError::NoSamples);
        }
        Ok(self.clock.tick())
    }

    fn snapshot(&self) -> PlaybackSnapshot {
        PlaybackSnapshot {
            samples: self.samples.clone(),
            progress: self.clock.progress(),
            current_index: self.clock.sample_index(self.sample_count()),
            mode: self.mode,
            is_playing: self.mode == PlaybackMode::Playing,
            tick_interval: self.tick_interval,
        }
    }
}

#[derive(Debug)]
struct Inner {
    state: StdMutex<Shared>,
    updates: watch::Sender<PlaybackSnapshot>,
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, Shared> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, shared: &Shared) {
        self.updates.send_replace(shared.snapshot());
    }

    /// Returns `false` once this timer must stop ticking.
    fn on_tick(&self, epoch: u64) -> bool {
        let mut locked = self.lock();
        if locked.timer_epoch != epoch || locked.mode != PlaybackMode::Playing {
            return false;
        }

        match locked.advance() {
            Ok(TickOutcome::Advanced) => {
                self.publish(&locked);
                true
            }
            Ok(TickOutcome::Finished) => {
                log::info!("Playback reached the end of the track");
                locked.mode = PlaybackMode::Stopped;
                self.publish(&locked);
                false
            }
            Err(e) => {
                log::error!("Playback tick failed, stopping: {}", e);
                locked.mode = PlaybackMode::Stopped;
                self.publish(&locked);
                false
            }
        }
    }

    /// Stops playback if the timer with `epoch` dies while still current.
    fn halt_if_current(&self, epoch: u64) {
        let mut locked = self.lock();
        if locked.timer_epoch == epoch && locked.mode == PlaybackMode::Playing {
            log::warn!("Playback timer exited unexpectedly, stopping");
            locked.mode = PlaybackMode::Stopped;
            self.publish(&locked);
        }
    }
}

struct TimerGuard {
    inner: Arc<Inner>,
    epoch: u64,
}

impl Drop for TimerGuard {
    fn drop(&mut self) {
        self.inner.halt_if_current(self.epoch);
    }
}

#[derive(Debug)]
struct TimerHandle {
    stop_tx: oneshot::Sender<()>,
    join: JoinHandle<()>,
}

async fn run_timer(
    inner: Arc<Inner>,
    epoch: u64,
    period: Duration,
    mut stop_rx: oneshot::Receiver<()>,
) {
    let guard = TimerGuard { inner, epoch };
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        let should_stop = tokio::select! {
            _ = ticker.tick() => false,
            _ = &mut stop_rx => true,
        };
        if should_stop || !guard.inner.on_tick(guard.epoch) {
            break;
        }
    }
}

/// Drives the progress counter on a timer and exposes the playback intents.
///
/// Every operation is total: calls that make no sense in the current state
/// are ignored. At most one timer is alive at any time; starting one always
/// cancels the previous. Timers run on the ambient Tokio runtime.
pub struct PlaybackController {
    inner: Arc<Inner>,
    settings: PlaybackSettings,
    timer: Option<TimerHandle>,
}

impl PlaybackController {
    pub fn new(settings: PlaybackSettings) -> Self {
        let shared = Shared {
            samples: None,
            clock: PlaybackClock::default(),
            mode: PlaybackMode::Idle,
            tick_interval: floor_interval(&settings, settings.tick_interval),
            timer_epoch: 0,
        };
        let (updates, _) = watch::channel(shared.snapshot());

        Self {
            inner: Arc::new(Inner {
                state: StdMutex::new(shared),
                updates,
            }),
            settings,
            timer: None,
        }
    }

    pub fn settings(&self) -> &PlaybackSettings {
        &self.settings
    }

    pub fn snapshot(&self) -> PlaybackSnapshot {
        self.inner.lock().snapshot()
    }

    /// State-change notifications, one per mutation.
    pub fn subscribe(&self) -> watch::Receiver<PlaybackSnapshot> {
        self.inner.updates.subscribe()
    }

    pub fn mode(&self) -> PlaybackMode {
        self.inner.lock().mode
    }

    pub fn is_playing(&self) -> bool {
        self.mode() == PlaybackMode::Playing
    }

    pub fn load(&mut self, samples: SampleSequence) {
        self.cancel_timer();
        let mut locked = self.inner.lock();
        log::info!(
            "Loaded {} samples for device {}",
            samples.len(),
            samples.device_id()
        );
        locked.samples = Some(samples);
        locked.clock.reset();
        locked.mode = PlaybackMode::Stopped;
        self.inner.publish(&locked);
    }

    pub fn play(&mut self) {
        {
            let mut locked = self.inner.lock();
            if locked.mode != PlaybackMode::Stopped
                || locked.sample_count() == 0
                || locked.clock.is_finished()
            {
                log::debug!("Ignoring play in {} state", locked.mode);
                return;
            }
            locked.mode = PlaybackMode::Playing;
        }

        if let Err(e) = self.start_timer() {
            log::error!("Cannot start playback: {}", e);
            let mut locked = self.inner.lock();
            locked.mode = PlaybackMode::Stopped;
            self.inner.publish(&locked);
            return;
        }
        let locked = self.inner.lock();
        self.inner.publish(&locked);
    }

    pub fn pause(&mut self) {
        if self.mode() != PlaybackMode::Playing {
            return;
        }
        self.cancel_timer();
        let mut locked = self.inner.lock();
        locked.mode = PlaybackMode::Stopped;
        self.inner.publish(&locked);
    }

    pub fn toggle_play_pause(&mut self) {
        if self.is_playing() {
            self.pause();
        } else {
            self.play();
        }
    }

    pub fn reset(&mut self) {
        self.cancel_timer();
        let mut locked = self.inner.lock();
        locked.clock.reset();
        if locked.mode != PlaybackMode::Idle {
            locked.mode = PlaybackMode::Stopped;
        }
        self.inner.publish(&locked);
    }

    pub fn step_forward(&mut self) {
        let step = i32::from(self.settings.step_size);
        self.move_progress(|clock| clock.step(step));
    }

    pub fn step_backward(&mut self) {
        let step = i32::from(self.settings.step_size);
        self.move_progress(|clock| clock.step(-step));
    }

    /// Jumps to an absolute progress value (scrubbing).
    pub fn seek(&mut self, progress: u16) {
        self.move_progress(|clock| clock.seek(progress));
    }

    pub fn set_tick_interval(&mut self, interval: Duration) {
        let interval = floor_interval(&self.settings, interval);
        let playing = {
            let mut locked = self.inner.lock();
            if locked.tick_interval == interval {
                return;
            }
            locked.tick_interval = interval;
            locked.mode == PlaybackMode::Playing
        };
        log::debug!("Tick interval set to {:?}", interval);

        // restart at the new rate, keeping progress
        if playing {
            if let Err(e) = self.start_timer() {
                log::error!("Cannot restart playback timer: {}", e);
                self.inner.lock().mode = PlaybackMode::Stopped;
            }
        }
        let locked = self.inner.lock();
        self.inner.publish(&locked);
    }

    pub fn tick_interval(&self) -> Duration {
        self.inner.lock().tick_interval
    }

    /// Shortens the tick interval, flooring at the configured minimum.
    pub fn speed_increase(&mut self) {
        let current = self.tick_interval();
        let min = floor_interval(&self.settings, self.settings.min_tick_interval);
        if current > min {
            let faster = current.saturating_sub(self.settings.speed_step).max(min);
            self.set_tick_interval(faster);
        }
    }

    pub fn speed_decrease(&mut self) {
        let slower = self.tick_interval().saturating_add(self.settings.speed_step);
        self.set_tick_interval(slower);
    }

    pub fn apply(&mut self, intent: Intent) {
        log::debug!("Applying intent {}", intent);
        match intent {
            Intent::PlayPause => self.toggle_play_pause(),
            Intent::Reset => self.reset(),
            Intent::StepForward => self.step_forward(),
            Intent::StepBackward => self.step_backward(),
            Intent::SpeedIncrease => self.speed_increase(),
            Intent::SpeedDecrease => self.speed_decrease(),
        }
    }

    /// Tears the controller down; no tick fires afterwards.
    pub fn shutdown(&mut self) {
        self.cancel_timer();
        let mut locked = self.inner.lock();
        if locked.mode == PlaybackMode::Playing {
            locked.mode = PlaybackMode::Stopped;
            self.inner.publish(&locked);
        }
    }

    fn move_progress(&mut self, apply: impl FnOnce(&mut PlaybackClock)) {
        let finished_while_playing = {
            let mut locked = self.inner.lock();
            if locked.mode == PlaybackMode::Idle {
                return;
            }
            apply(&mut locked.clock);
            locked.mode == PlaybackMode::Playing && locked.clock.is_finished()
        };

        // the next tick would wrap to 0, so reaching the end stops like a finished run
        if finished_while_playing {
            self.cancel_timer();
            self.inner.lock().mode = PlaybackMode::Stopped;
        }
        let locked = self.inner.lock();
        self.inner.publish(&locked);
    }

    fn start_timer(&mut self) -> Result<(), PlaybackError> {
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| PlaybackError::NoRuntime)?;
        self.cancel_timer();

        let (epoch, period) = {
            let locked = self.inner.lock();
            (locked.timer_epoch, locked.tick_interval)
        };
        let (stop_tx, stop_rx) = oneshot::channel();
        let join = runtime.spawn(run_timer(self.inner.clone(), epoch, period, stop_rx));
        self.timer = Some(TimerHandle { stop_tx, join });

        log::debug!("Playback timer started ({:?} per tick)", period);
        Ok(())
    }

    fn cancel_timer(&mut self) {
        self.inner.lock().timer_epoch += 1;
        if let Some(timer) = self.timer.take() {
            let _ = timer.stop_tx.send(());
            drop(timer.join);
        }
    }
}

impl Drop for PlaybackController {
    fn drop(&mut self) {
        self.inner.lock().timer_epoch += 1;
        if let Some(timer) = self.timer.take() {
            let _ = timer.stop_tx.send(());
            timer.join.abort();
        }
    }
}
