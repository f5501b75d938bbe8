//! Real-time sound mixer
//!
//! [`MixBuffer`] owns the set of currently playing sound instances and turns
//! them into fixed-size interleaved blocks for the output callbacks. All
//! state sits behind one mutex that is held for a single `add`, `remove` or
//! mix pass, never across I/O.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;
use tracing::debug;

use crate::sound::SoundId;

/// One in-progress playback of a sound
#[derive(Debug, Clone)]
pub struct PlayingInstance {
    pub id: SoundId,
    pub name: Arc<str>,
    samples: Arc<[f32]>,
    pub volume: f32,
    pub looping: bool,
    /// Read position in frames
    offset: usize,
}

impl PlayingInstance {
    /// Current read position in frames
    pub fn offset(&self) -> usize {
        self.offset
    }
}

/// Output of [`MixBuffer::mix`]
#[derive(Debug, Clone, PartialEq)]
pub struct MixBlock {
    /// Interleaved samples, `frames * channels` long, clipped to [-1, 1]
    pub samples: Vec<f32>,
    /// Names of instances still playing after this block
    pub names: Vec<Arc<str>>,
}

struct MixState {
    instances: Vec<PlayingInstance>,
    single_sound_mode: bool,
}

/// Thread-safe set of playing instances plus the per-block mixing algorithm
pub struct MixBuffer {
    channels: usize,
    state: Mutex<MixState>,
    /// Most instances ever live at once; callers size their name buffers by it
    peak_instances: AtomicUsize,
}

impl MixBuffer {
    /// Create an empty mixer for interleaved audio with `channels` channels
    pub fn new(channels: u16) -> Self {
        Self {
            channels: channels.max(1) as usize,
            state: Mutex::new(MixState {
                instances: Vec::new(),
                single_sound_mode: false,
            }),
            peak_instances: AtomicUsize::new(0),
        }
    }

    pub fn channels(&self) -> u16 {
        self.channels as u16
    }

    /// Start playing `samples`
    ///
    /// In single-sound mode every other instance is dropped first. Otherwise a
    /// non-looping request replaces any instance of the same id, while looping
    /// requests stack on top of what is already playing.
    pub fn add(
        &self,
        samples: Arc<[f32]>,
        volume: f32,
        looping: bool,
        id: SoundId,
        name: impl Into<Arc<str>>,
    ) {
        let instance = PlayingInstance {
            id,
            name: name.into(),
            samples,
            volume: volume.clamp(0.0, 1.0),
            looping,
            offset: 0,
        };

        let mut state = self.state.lock();
        if state.single_sound_mode {
            state.instances.clear();
        } else if !looping {
            state.instances.retain(|existing| existing.id != instance.id);
        }

        debug!(
            sound = %instance.id,
            looping,
            volume = instance.volume,
            "Adding sound instance"
        );
        state.instances.push(instance);
        self.peak_instances
            .fetch_max(state.instances.len(), Ordering::Relaxed);
    }

    /// Mix `frame_count` frames into a freshly allocated block
    pub fn mix(&self, frame_count: usize) -> MixBlock {
        let mut samples = vec![0.0f32; frame_count * self.channels];
        let mut names = Vec::new();
        self.mix_into(&mut samples, &mut names);
        MixBlock { samples, names }
    }

    /// Mix into a caller-owned interleaved block
    ///
    /// `out` is overwritten; its length decides the block size and should be a
    /// multiple of the channel count (a trailing partial frame is left silent).
    /// `names` is cleared and refilled with the instances still playing, so
    /// real-time callers can reuse both buffers across calls. `names` grows
    /// before the lock is taken, and only when more sounds play at once than
    /// ever before.
    pub fn mix_into(&self, out: &mut [f32], names: &mut Vec<Arc<str>>) {
        out.fill(0.0);
        names.clear();
        names.reserve(self.peak_instances.load(Ordering::Relaxed));

        let channels = self.channels;
        let frames = out.len() / channels;
        let block = &mut out[..frames * channels];

        let mut state = self.state.lock();
        state.instances.retain_mut(|instance| {
            let finished = render_instance(instance, block, channels);
            if !finished {
                names.push(Arc::clone(&instance.name));
            }
            !finished
        });
        drop(state);

        for sample in block.iter_mut() {
            *sample = sample.clamp(-1.0, 1.0);
        }
    }

    /// Stop every instance of `id`
    ///
    /// Returns `false` when nothing with that id was playing.
    pub fn remove(&self, id: &SoundId) -> bool {
        let mut state = self.state.lock();
        let before = state.instances.len();
        state.instances.retain(|instance| &instance.id != id);
        before != state.instances.len()
    }

    /// Stop everything
    pub fn clear(&self) {
        self.state.lock().instances.clear();
    }

    /// Switch single-sound mode
    ///
    /// Turning the mode on stops everything that is currently playing,
    /// including loops.
    pub fn set_single_sound_mode(&self, enabled: bool) {
        let mut state = self.state.lock();
        state.single_sound_mode = enabled;
        if enabled {
            state.instances.clear();
        }
    }

    pub fn single_sound_mode(&self) -> bool {
        self.state.lock().single_sound_mode
    }

    pub fn is_playing(&self, id: &SoundId) -> bool {
        self.state.lock().instances.iter().any(|instance| &instance.id == id)
    }

    /// Number of live instances
    pub fn len(&self) -> usize {
        self.state.lock().instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy of the live instances, oldest first
    pub fn instances(&self) -> Vec<PlayingInstance> {
        self.state.lock().instances.clone()
    }

    /// Capacity a name buffer needs so that [`MixBuffer::mix_into`] never grows it
    pub fn peak_instances(&self) -> usize {
        self.peak_instances.load(Ordering::Relaxed)
    }
}

/// Accumulate one instance into `block`; returns `true` once it is exhausted
fn render_instance(instance: &mut PlayingInstance, block: &mut [f32], channels: usize) -> bool {
    let total_frames = instance.samples.len() / channels;
    if total_frames == 0 {
        return true;
    }

    let block_frames = block.len() / channels;
    let volume = instance.volume;
    let mut written = 0;

    while written < block_frames {
        if instance.offset >= total_frames {
            if !instance.looping {
                break;
            }
            instance.offset = 0;
        }

        let take = (block_frames - written).min(total_frames - instance.offset);
        let src = &instance.samples[instance.offset * channels..(instance.offset + take) * channels];
        let dst = &mut block[written * channels..(written + take) * channels];
        for (out, sample) in dst.iter_mut().zip(src) {
            *out += sample * volume;
        }

        written += take;
        instance.offset += take;
    }

    if instance.looping {
        instance.offset %= total_frames;
        false
    } else {
        instance.offset >= total_frames
    }
}
