//! Sound catalog seam
//!
//! The catalog (import, transcoding, metadata persistence) lives outside the
//! engine. The engine only needs decoded interleaved PCM keyed by a stable id
//! plus the per-sound playback defaults, which it reads through
//! [`SoundCatalog`]. [`InMemoryCatalog`] is the reference implementation used
//! by the demo binary and the tests.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// Opaque, stable sound identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SoundId(String);

impl SoundId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SoundId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SoundId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for SoundId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Metadata of one imported sound
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SoundAsset {
    pub id: SoundId,
    pub name: String,
    /// Default playback volume (0.0 - 1.0)
    #[serde(default = "default_volume")]
    pub volume: f32,
    #[serde(rename = "loop", default)]
    pub looping: bool,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default, with = "duration_secs")]
    pub duration: Duration,
}

fn default_volume() -> f32 {
    1.0
}

fn default_enabled() -> bool {
    true
}

mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(value.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Ok(Duration::try_from_secs_f64(secs).unwrap_or_default())
    }
}

impl SoundAsset {
    pub fn new(id: impl Into<SoundId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            volume: 1.0,
            looping: false,
            enabled: true,
            duration: Duration::ZERO,
        }
    }

    pub fn with_volume(mut self, volume: f32) -> Self {
        self.volume = volume.clamp(0.0, 1.0);
        self
    }

    pub fn with_loop(mut self, looping: bool) -> Self {
        self.looping = looping;
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}

/// Read access to the externally owned sound catalog
pub trait SoundCatalog: Send + Sync {
    /// Metadata for one sound
    fn asset(&self, id: &SoundId) -> Option<SoundAsset>;

    /// Decoded interleaved samples in the engine format
    fn samples(&self, id: &SoundId) -> Option<Arc<[f32]>>;

    /// All known sounds
    fn assets(&self) -> Vec<SoundAsset>;
}

#[derive(Default)]
struct CatalogEntries {
    order: Vec<SoundId>,
    assets: HashMap<SoundId, SoundAsset>,
    samples: HashMap<SoundId, Arc<[f32]>>,
}

/// In-memory [`SoundCatalog`]
#[derive(Default)]
pub struct InMemoryCatalog {
    entries: RwLock<CatalogEntries>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a sound together with its decoded samples
    pub fn insert(&self, asset: SoundAsset, samples: impl Into<Arc<[f32]>>) {
        let mut entries = self.entries.write();
        let id = asset.id.clone();
        if !entries.assets.contains_key(&id) {
            entries.order.push(id.clone());
        }
        entries.samples.insert(id.clone(), samples.into());
        entries.assets.insert(id, asset);
    }

    /// Insert metadata without decoded samples
    pub fn insert_undecoded(&self, asset: SoundAsset) {
        let mut entries = self.entries.write();
        let id = asset.id.clone();
        if !entries.assets.contains_key(&id) {
            entries.order.push(id.clone());
        }
        entries.samples.remove(&id);
        entries.assets.insert(id, asset);
    }

    /// Apply an edit to a sound's metadata
    pub fn update(&self, id: &SoundId, edit: impl FnOnce(&mut SoundAsset)) -> bool {
        match self.entries.write().assets.get_mut(id) {
            Some(asset) => {
                edit(asset);
                true
            }
            None => false,
        }
    }

    /// Remove a sound and evict its cached samples
    pub fn remove(&self, id: &SoundId) -> Option<SoundAsset> {
        let mut entries = self.entries.write();
        entries.order.retain(|existing| existing != id);
        entries.samples.remove(id);
        entries.assets.remove(id)
    }
}

impl SoundCatalog for InMemoryCatalog {
    fn asset(&self, id: &SoundId) -> Option<SoundAsset> {
        self.entries.read().assets.get(id).cloned()
    }

    fn samples(&self, id: &SoundId) -> Option<Arc<[f32]>> {
        self.entries.read().samples.get(id).cloned()
    }

    fn assets(&self) -> Vec<SoundAsset> {
        let entries = self.entries.read();
        entries
            .order
            .iter()
            .filter_map(|id| entries.assets.get(id).cloned())
            .collect()
    }
}
