//! Application facade
//!
//! [`Soundboard`] wires the mixer, the device router, the hotkey listener and
//! the recorder together and is the only surface a UI talks to. It lives on
//! the UI thread (output streams are not `Send`). Everything that happens on
//! other threads (stream failures, hotkey hits, finished recordings) is queued
//! as a task and executed by [`Soundboard::process_pending_tasks`].

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::audio::device::{AudioDevice, DeviceFilter, default_main_output, monitor_targets};
use crate::audio::{
    AudioBackend, AudioError, DeviceRouter, EventSink, MixBuffer, PlaybackStatus, RouterEvent,
    StatusBoard, StreamKind,
};
use crate::hotkey::{
    BindingSet, BindingTarget, HotkeyAction, HotkeyCombination, HotkeyConfig, HotkeyError,
    HotkeyListener, InputHook, ListenerEvent, ListenerSink, RecordingOutcome, RecordingSession,
};
use crate::sound::{SoundCatalog, SoundId};
use crate::state::config::{AppConfig, DeviceConfig, GlobalConfig, MixConfig};
use crate::utils::error::{AppError, AppResult, ErrorContext};

/// User-visible result of a queued task
#[derive(Debug, Clone)]
pub enum Notification {
    /// A stream could not be opened or dropped out; it stays stopped
    DeviceUnavailable {
        kind: StreamKind,
        device_id: String,
        context: ErrorContext,
    },
    /// A hotkey asked for a sound that cannot be played
    PlaybackFailed { id: SoundId, context: ErrorContext },
    /// The input hook died; hotkeys are off until the listener is restarted
    ListenerStopped { reason: String },
    /// The mic-to-mixer hotkey changed the mic inclusion toggle
    MicToggled { included: bool },
    /// The stop-all hotkey fired
    StoppedAll,
    /// A hotkey recording ended
    RecordingFinished(RecordingOutcome),
}

enum UiTask {
    Router(RouterEvent),
    Listener(ListenerEvent),
    Recording(RecordingOutcome),
    Notify(Notification),
}

/// Soundboard engine facade
pub struct Soundboard {
    catalog: Arc<dyn SoundCatalog>,
    mixer: Arc<MixBuffer>,
    status: Arc<StatusBoard>,
    router: DeviceRouter,
    filter: DeviceFilter,
    hotkeys: HotkeyConfig,
    live_config: Arc<GlobalConfig>,
    bindings: BindingSet,
    listener: HotkeyListener,
    recording: Option<RecordingSession>,
    output_devices: Vec<AudioDevice>,
    input_devices: Vec<AudioDevice>,
    tasks_tx: mpsc::UnboundedSender<UiTask>,
    tasks_rx: mpsc::UnboundedReceiver<UiTask>,
}

impl Soundboard {
    /// Build the engine with every stream stopped
    ///
    /// Volumes, single-sound mode and the match policy are taken from
    /// `config`. Call [`Soundboard::apply_device_config`] to open devices.
    pub fn new(
        config: &AppConfig,
        backend: Arc<dyn AudioBackend>,
        catalog: Arc<dyn SoundCatalog>,
        bindings: BindingSet,
    ) -> Self {
        let (tasks_tx, tasks_rx) = mpsc::unbounded_channel();
        let format = config.audio.stream_format();

        let mixer = Arc::new(MixBuffer::new(format.channels));
        mixer.set_single_sound_mode(config.mix.single_sound_mode);
        let status = StatusBoard::new();

        let router_tx = tasks_tx.clone();
        let router_events: EventSink = Arc::new(move |event| {
            let _ = router_tx.send(UiTask::Router(event));
        });
        let router = DeviceRouter::new(
            backend,
            format,
            config.audio.fifo_frames,
            Arc::clone(&mixer),
            Arc::clone(&status),
            router_events,
        );
        router.set_volumes(
            config.mix.master_volume,
            config.mix.soundboard_monitor_volume,
            config.mix.mic_monitor_volume,
        );

        let listener_tx = tasks_tx.clone();
        let listener_events: ListenerSink = Arc::new(move |event| {
            let _ = listener_tx.send(UiTask::Listener(event));
        });
        let listener = HotkeyListener::new(config.hotkeys.match_policy, listener_events);

        info!(
            sample_rate = format.sample_rate,
            channels = format.channels,
            frame_size = format.frame_size,
            bindings = bindings.len(),
            "Soundboard created"
        );

        Self {
            catalog,
            mixer,
            status,
            router,
            filter: config.audio.device_filter(),
            hotkeys: config.hotkeys.clone(),
            live_config: Arc::new(GlobalConfig::new(config.clone())),
            bindings,
            listener,
            recording: None,
            output_devices: Vec::new(),
            input_devices: Vec::new(),
            tasks_tx,
            tasks_rx,
        }
    }

    // ---- playback ----

    /// Start a sound with its catalog volume and loop flag
    ///
    /// Returns `Ok(false)` for unknown or disabled sounds.
    ///
    /// # Errors
    /// Returns `AudioError::DecodeUnavailable` if the sound has no decoded samples.
    pub fn play(&self, id: &SoundId) -> AppResult<bool> {
        let Some(asset) = self.catalog.asset(id) else {
            debug!(sound = %id, "Play requested for unknown sound");
            return Ok(false);
        };
        if !asset.enabled {
            debug!(sound = %id, "Play requested for disabled sound");
            return Ok(false);
        }

        let samples = self
            .catalog
            .samples(id)
            .ok_or_else(|| AudioError::DecodeUnavailable(id.clone()))?;

        self.mixer
            .add(samples, asset.volume, asset.looping, id.clone(), asset.name.as_str());
        Ok(true)
    }

    /// Stop every instance of a sound; `false` when it was not playing
    pub fn stop(&self, id: &SoundId) -> bool {
        let removed = self.mixer.remove(id);
        if !removed {
            debug!(sound = %id, "Stop requested but sound is not playing");
        }
        removed
    }

    pub fn stop_all(&self) {
        info!("Stopping all sounds");
        self.mixer.clear();
    }

    pub fn is_playing(&self, id: &SoundId) -> bool {
        self.mixer.is_playing(id)
    }

    pub fn set_single_sound_mode(&self, enabled: bool) {
        self.mixer.set_single_sound_mode(enabled);
        self.publish_config();
    }

    /// Set master, soundboard-monitor and mic-monitor volumes, each in [0, 1]
    pub fn set_volumes(&self, master: f32, soundboard_monitor: f32, mic_monitor: f32) {
        self.router.set_volumes(master, soundboard_monitor, mic_monitor);
        self.publish_config();
    }

    // ---- devices ----

    /// Re-enumerate devices and restart every enabled stream
    ///
    /// Streams that fail to restart are reported through
    /// [`Soundboard::process_pending_tasks`].
    ///
    /// # Errors
    /// Returns an error if the host cannot enumerate devices at all.
    pub fn refresh_devices(&mut self) -> AppResult<()> {
        let backend = Arc::clone(self.router.backend());
        self.output_devices = self.filter.apply(backend.output_devices()?);
        self.input_devices = self.filter.apply(backend.input_devices()?);
        info!(
            outputs = self.output_devices.len(),
            inputs = self.input_devices.len(),
            "Device list refreshed"
        );

        for (kind, err) in self.router.restart_all() {
            self.queue_device_failure(kind, err);
        }
        Ok(())
    }

    /// Open devices and toggles from a saved configuration
    ///
    /// The main output falls back to the virtual loopback cable. Failures are
    /// queued as notifications and leave the affected stream stopped.
    pub fn apply_device_config(&mut self, devices: &DeviceConfig) -> AppResult<()> {
        self.refresh_devices()?;

        let main = devices
            .main_output
            .clone()
            .or_else(|| default_main_output(&self.output_devices).map(|d| d.id.clone()));
        if main.is_none() {
            warn!("No main output configured and no loopback device found");
        }

        let selections = [
            (StreamKind::Main, main),
            (StreamKind::SoundboardMonitor, devices.soundboard_monitor_output.clone()),
            (StreamKind::MicMonitor, devices.mic_monitor_output.clone()),
            (StreamKind::MicCapture, devices.mic_input.clone()),
        ];
        for (kind, device) in selections {
            if let Err(e) = self.router.select_device(kind, device.as_deref()) {
                self.queue_device_failure(kind, e);
            }
        }

        let toggles = [
            (
                StreamKind::SoundboardMonitor,
                self.router.enable_monitor(StreamKind::SoundboardMonitor, devices.soundboard_monitor_enabled),
            ),
            (
                StreamKind::MicMonitor,
                self.router.enable_monitor(StreamKind::MicMonitor, devices.mic_monitor_enabled),
            ),
            (
                StreamKind::MicCapture,
                self.router.enable_mic_inclusion(devices.mic_included),
            ),
        ];
        for (kind, result) in toggles {
            if let Err(e) = result {
                self.queue_device_failure(kind, e);
            }
        }
        self.publish_config();
        Ok(())
    }

    /// Choose the device for one stream and restart only that stream
    ///
    /// # Errors
    /// Returns `AudioError::DeviceUnavailable` if the stream is enabled and the
    /// device cannot be opened; the stream is left stopped.
    pub fn select_device(&mut self, kind: StreamKind, device_id: Option<&str>) -> AppResult<()> {
        let result = self.router.select_device(kind, device_id);
        self.publish_config();
        Ok(result?)
    }

    /// Toggle the soundboard or mic monitor
    ///
    /// # Errors
    /// Returns the first stream that failed to open.
    pub fn enable_monitor(&mut self, kind: StreamKind, enabled: bool) -> AppResult<()> {
        let result = self.router.enable_monitor(kind, enabled);
        self.publish_config();
        Ok(result?)
    }

    /// Mix the microphone into the main output
    ///
    /// # Errors
    /// Returns `AudioError::DeviceUnavailable` if mic capture cannot start.
    pub fn enable_mic_inclusion(&mut self, enabled: bool) -> AppResult<()> {
        let result = self.router.enable_mic_inclusion(enabled);
        self.publish_config();
        Ok(result?)
    }

    /// Filtered output devices from the last refresh
    pub fn output_devices(&self) -> &[AudioDevice] {
        &self.output_devices
    }

    /// Output devices that may carry a monitor stream (no loopback cable)
    pub fn monitor_targets(&self) -> Vec<AudioDevice> {
        monitor_targets(&self.output_devices)
    }

    pub fn input_devices(&self) -> &[AudioDevice] {
        &self.input_devices
    }

    pub fn router(&self) -> &DeviceRouter {
        &self.router
    }

    // ---- hotkeys ----

    /// Start recording a hotkey through a suppressing hook
    ///
    /// The listener ignores input until the recording ends. `on_complete`
    /// runs on the recorder thread after the hook is uninstalled; the outcome
    /// is also queued as [`Notification::RecordingFinished`].
    ///
    /// # Errors
    /// Returns `HotkeyError::RecorderBusy` while another recording runs, or
    /// `HotkeyError::ListenerFailed` if the hook cannot be installed.
    pub fn begin_recording<F>(&mut self, hook: Box<dyn InputHook>, on_complete: F) -> AppResult<()>
    where
        F: FnOnce(RecordingOutcome) + Send + 'static,
    {
        if self.recording.as_ref().is_some_and(|session| !session.is_finished()) {
            return Err(HotkeyError::RecorderBusy.into());
        }

        let gate = self.listener.gate();
        gate.close();

        let tasks = self.tasks_tx.clone();
        let reopen = gate.clone();
        let started = RecordingSession::start(hook, self.hotkeys.quiet_interval(), move |outcome| {
            reopen.open();
            let _ = tasks.send(UiTask::Recording(outcome.clone()));
            on_complete(outcome);
        });

        match started {
            Ok(session) => {
                self.recording = Some(session);
                Ok(())
            }
            Err(e) => {
                gate.open();
                Err(e.into())
            }
        }
    }

    /// Abort the running recording, if any
    pub fn cancel_recording(&mut self) {
        if let Some(session) = self.recording.as_mut() {
            session.cancel();
        }
    }

    pub fn is_recording(&self) -> bool {
        self.recording.as_ref().is_some_and(|session| !session.is_finished())
    }

    /// Bind `combination` to `target` and rebuild the registry
    ///
    /// Returns the combination the target had before, if it changed.
    ///
    /// # Errors
    /// Returns `HotkeyError::CombinationInUse` if another target holds the
    /// combination; nothing changes in that case.
    pub fn assign(
        &mut self,
        target: BindingTarget,
        combination: HotkeyCombination,
    ) -> AppResult<Option<HotkeyCombination>> {
        let previous = self.bindings.assign(target, combination)?;
        self.rebuild_registry()?;
        Ok(previous)
    }

    /// Remove the binding of `target` and rebuild the registry
    pub fn clear(&mut self, target: &BindingTarget) -> AppResult<Option<HotkeyCombination>> {
        let previous = self.bindings.clear(target);
        if previous.is_some() {
            self.rebuild_registry()?;
        }
        Ok(previous)
    }

    /// Rebuild the listener registry from the bindings and the catalog
    ///
    /// Only sounds that exist and are enabled are registered.
    pub fn rebuild_registry(&mut self) -> AppResult<()> {
        let entries = self.bindings.registry_entries(self.catalog.as_ref());
        self.listener.register_all(entries)?;
        Ok(())
    }

    /// Install `hook` and start dispatching hotkeys
    pub fn start_listener(&mut self, hook: Box<dyn InputHook>) -> AppResult<()> {
        self.rebuild_registry()?;
        self.listener.start(hook)?;
        Ok(())
    }

    pub fn stop_listener(&mut self) {
        self.listener.stop();
    }

    pub fn is_listening(&self) -> bool {
        self.listener.is_running()
    }

    pub fn bindings(&self) -> &BindingSet {
        &self.bindings
    }

    // ---- catalog ----

    /// React to a sound deleted from the catalog
    pub fn on_sound_removed(&mut self, id: &SoundId) -> AppResult<()> {
        self.mixer.remove(id);
        if self.bindings.remove_sound(id) {
            debug!(sound = %id, "Removed hotkey of deleted sound");
        }
        self.rebuild_registry()
    }

    // ---- status ----

    pub fn status(&self) -> PlaybackStatus {
        self.status.snapshot()
    }

    /// Current device selection and toggles, for saving
    pub fn device_config(&self) -> DeviceConfig {
        let mut devices = DeviceConfig::default();
        for kind in StreamKind::ALL {
            devices.set_selected(kind, self.router.selected_device(kind).map(str::to_string));
        }
        let levels = self.router.levels();
        devices.soundboard_monitor_enabled = levels.soundboard_monitor_enabled();
        devices.mic_monitor_enabled = levels.mic_monitor_enabled();
        devices.mic_included = levels.mic_included();
        devices
    }

    /// Current volumes and single-sound mode, for saving
    pub fn mix_config(&self) -> MixConfig {
        let levels = self.router.levels();
        MixConfig {
            master_volume: levels.master(),
            soundboard_monitor_volume: levels.soundboard_monitor(),
            mic_monitor_volume: levels.mic_monitor(),
            single_sound_mode: self.mixer.single_sound_mode(),
        }
    }

    /// Shared handle on the live configuration
    ///
    /// Every device, toggle and volume change made through the facade is
    /// published here, so other threads (a settings saver, a UI bridge) can
    /// read the current state without touching the audio thread.
    pub fn live_config(&self) -> Arc<GlobalConfig> {
        Arc::clone(&self.live_config)
    }

    fn publish_config(&self) {
        let devices = self.device_config();
        let mix = self.mix_config();
        self.live_config.modify(|config| {
            config.devices = devices.clone();
            config.mix = mix.clone();
        });
    }

    // ---- UI pump ----

    /// Execute every queued task and return what the user should see
    pub fn process_pending_tasks(&mut self) -> Vec<Notification> {
        let mut notifications = Vec::new();
        while let Ok(task) = self.tasks_rx.try_recv() {
            self.execute(task, &mut notifications);
        }
        notifications
    }

    /// Wait for at least one task, then drain the queue
    pub async fn next_notifications(&mut self) -> Vec<Notification> {
        let mut notifications = Vec::new();
        if let Some(task) = self.tasks_rx.recv().await {
            self.execute(task, &mut notifications);
        }
        notifications.extend(self.process_pending_tasks());
        notifications
    }

    fn execute(&mut self, task: UiTask, notifications: &mut Vec<Notification>) {
        match task {
            UiTask::Router(RouterEvent::StreamFailed {
                kind,
                device_id,
                reason,
            }) => {
                self.router.handle_stream_failure(kind, &device_id);
                let err = AppError::from(AudioError::unavailable(device_id.as_str(), reason));
                notifications.push(Notification::DeviceUnavailable {
                    kind,
                    device_id,
                    context: err.context(),
                });
            }
            UiTask::Listener(ListenerEvent::Action(action)) => {
                self.run_action(action, notifications);
            }
            UiTask::Listener(ListenerEvent::Stopped(reason)) => {
                self.listener.stop();
                notifications.push(Notification::ListenerStopped { reason });
            }
            UiTask::Recording(outcome) => {
                self.recording = None;
                notifications.push(Notification::RecordingFinished(outcome));
            }
            UiTask::Notify(notification) => notifications.push(notification),
        }
    }

    fn run_action(&mut self, action: HotkeyAction, notifications: &mut Vec<Notification>) {
        debug!(?action, "Running hotkey action");
        match action {
            HotkeyAction::PlaySound(id) => {
                if let Err(e) = self.play(&id) {
                    warn!(sound = %id, "Hotkey playback failed: {}", e);
                    notifications.push(Notification::PlaybackFailed {
                        id,
                        context: e.context(),
                    });
                }
            }
            HotkeyAction::StopAll => {
                self.stop_all();
                notifications.push(Notification::StoppedAll);
            }
            HotkeyAction::ToggleMicToMixer => {
                let included = !self.router.levels().mic_included();
                let result = self.router.enable_mic_inclusion(included);
                self.publish_config();
                match result {
                    Ok(()) => notifications.push(Notification::MicToggled { included }),
                    Err(e) => notifications.push(device_notification(
                        StreamKind::MicCapture,
                        self.router.selected_device(StreamKind::MicCapture),
                        e,
                    )),
                }
            }
        }
    }

    fn queue_device_failure(&self, kind: StreamKind, err: AudioError) {
        let notification = device_notification(kind, self.router.selected_device(kind), err);
        let _ = self.tasks_tx.send(UiTask::Notify(notification));
    }
}

impl Drop for Soundboard {
    fn drop(&mut self) {
        self.cancel_recording();
        self.listener.stop();
        info!("Soundboard shut down");
    }
}

fn device_notification(kind: StreamKind, device_id: Option<&str>, err: AudioError) -> Notification {
    let device_id = match &err {
        AudioError::DeviceUnavailable { device, .. } => device.clone(),
        AudioError::DeviceNotFound(device) => device.clone(),
        _ => device_id.unwrap_or_default().to_string(),
    };
    Notification::DeviceUnavailable {
        kind,
        device_id,
        context: AppError::from(err).context(),
    }
}
