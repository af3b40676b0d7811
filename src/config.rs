//! Configuration for clustering, caching and rendering.
//!
//! Every field has a default, so an empty JSON object is a valid config.
use serde::de::Error;
use std::time::Duration;

/// Top-level configuration
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Clustering radius in screen pixels, independent of zoom.
    #[serde(default = "Config::default_max_distance_px")]
    pub max_distance_px: f64,

    /// Algorithm used when none is supplied to the builder.
    #[serde(default)]
    pub algorithm: AlgorithmKind,

    /// Cell size in screen pixels for the grid algorithm.
    #[serde(default = "Config::default_grid_size_px")]
    pub grid_size_px: f64,

    /// Clusters with at most this many items are drawn as individual markers.
    #[serde(default = "Config::default_min_cluster_size")]
    pub min_cluster_size: usize,

    /// Threads computing clusters off the surface thread.
    #[serde(default = "Config::default_worker_threads")]
    pub worker_threads: usize,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub render: RenderConfig,
}

/// Built-in clustering algorithms
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlgorithmKind {
    /// Greedy grouping within `max_distance_px`.
    #[default]
    Distance,
    /// Square cells of `grid_size_px`.
    Grid,
}

/// Saturates instead of wrapping for durations beyond `u64::MAX` ms.
fn duration_to_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Per-zoom result cache settings
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CacheConfig {
    /// Number of discrete zoom levels kept before LRU eviction.
    #[serde(default = "CacheConfig::default_capacity")]
    pub capacity: usize,

    /// Speculatively compute the neighbouring zoom levels after each request.
    #[serde(default = "CacheConfig::default_precache")]
    pub precache: bool,

    #[serde(default = "CacheConfig::default_precache_delay_min_ms")]
    pub precache_delay_min_ms: u64,

    #[serde(default = "CacheConfig::default_precache_delay_max_ms")]
    pub precache_delay_max_ms: u64,
}

impl CacheConfig {
    const fn default_capacity() -> usize {
        5
    }

    const fn default_precache() -> bool {
        true
    }

    const fn default_precache_delay_min_ms() -> u64 {
        500
    }

    const fn default_precache_delay_max_ms() -> u64 {
        1000
    }

    pub fn with_capacity(mut self, capacity: usize) -> Self {
        assert!(capacity > 0, "Cache capacity must be greater than zero");
        self.capacity = capacity;
        self
    }

    pub fn with_precache(mut self, enabled: bool) -> Self {
        self.precache = enabled;
        self
    }

    pub fn with_precache_delay(mut self, min: Duration, max: Duration) -> Self {
        assert!(min <= max, "Precache delay range is inverted");
        self.precache_delay_min_ms = duration_to_millis(min);
        self.precache_delay_max_ms = duration_to_millis(max);
        self
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: Self::default_capacity(),
            precache: Self::default_precache(),
            precache_delay_min_ms: Self::default_precache_delay_min_ms(),
            precache_delay_max_ms: Self::default_precache_delay_max_ms(),
        }
    }
}

/// Marker reconciliation settings
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RenderConfig {
    #[serde(default = "RenderConfig::default_animate")]
    pub animate: bool,

    /// Marker operations performed per scheduling turn on the surface thread.
    #[serde(default = "RenderConfig::default_batch_size")]
    pub batch_size: usize,

    /// Delay between scheduling turns while work remains.
    #[serde(default = "RenderConfig::default_frame_interval_ms")]
    pub frame_interval_ms: u64,

    /// Frames per marker animation.
    #[serde(default = "RenderConfig::default_animation_frames")]
    pub animation_frames: u32,

    /// Zoom-outs steeper than this many levels remove markers without animating.
    #[serde(default = "RenderConfig::default_max_animation_zoom_out")]
    pub max_animation_zoom_out: f64,
}

impl RenderConfig {
    const fn default_animate() -> bool {
        true
    }

    const fn default_batch_size() -> usize {
        10
    }

    const fn default_frame_interval_ms() -> u64 {
        10
    }

    const fn default_animation_frames() -> u32 {
        16
    }

    const fn default_max_animation_zoom_out() -> f64 {
        3.0
    }

    pub fn with_animation(mut self, animate: bool) -> Self {
        self.animate = animate;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        assert!(batch_size > 0, "Batch size must be greater than zero");
        self.batch_size = batch_size;
        self
    }

    pub fn with_frame_interval(mut self, interval: Duration) -> Self {
        self.frame_interval_ms = duration_to_millis(interval);
        self
    }

    pub fn with_animation_frames(mut self, frames: u32) -> Self {
        assert!(frames > 0, "Animation frames must be greater than zero");
        self.animation_frames = frames;
        self
    }

    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_interval_ms)
    }
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            animate: Self::default_animate(),
            batch_size: Self::default_batch_size(),
            frame_interval_ms: Self::default_frame_interval_ms(),
            animation_frames: Self::default_animation_frames(),
            max_animation_zoom_out: Self::default_max_animation_zoom_out(),
        }
    }
}

impl Config {
    const fn default_max_distance_px() -> f64 {
        100.0
    }

    const fn default_grid_size_px() -> f64 {
        100.0
    }

    const fn default_min_cluster_size() -> usize {
        4
    }

    const fn default_worker_threads() -> usize {
        2
    }

    pub fn with_max_distance_px(mut self, distance: f64) -> Self {
        assert!(
            distance.is_finite() && distance > 0.0,
            "Cluster distance must be positive"
        );
        self.max_distance_px = distance;
        self
    }

    pub fn with_algorithm(mut self, algorithm: AlgorithmKind) -> Self {
        self.algorithm = algorithm;
        self
    }

    pub fn with_grid_size_px(mut self, size: f64) -> Self {
        assert!(size.is_finite() && size > 0.0, "Grid size must be positive");
        self.grid_size_px = size;
        self
    }

    pub fn with_min_cluster_size(mut self, size: usize) -> Self {
        self.min_cluster_size = size;
        self
    }

    pub fn with_worker_threads(mut self, threads: usize) -> Self {
        assert!(threads > 0, "Worker threads must be greater than zero");
        if threads > 16 {
            log::warn!(
                "{} clustering workers is unusually many; only the latest request is ever used",
                threads
            );
        }
        self.worker_threads = threads;
        self
    }

    pub fn with_cache(mut self, cache: CacheConfig) -> Self {
        self.cache = cache;
        self
    }

    pub fn with_render(mut self, render: RenderConfig) -> Self {
        self.render = render;
        self
    }

    pub fn validate(&self) -> Result<(), String> {
        if !self.max_distance_px.is_finite() || self.max_distance_px <= 0.0 {
            return Err("Cluster distance must be a positive number of pixels".to_string());
        }

        if !self.grid_size_px.is_finite() || self.grid_size_px <= 0.0 {
            return Err("Grid size must be a positive number of pixels".to_string());
        }

        if self.worker_threads == 0 {
            return Err("Worker threads must be greater than zero".to_string());
        }

        if self.cache.capacity == 0 {
            return Err("Cache capacity must be greater than zero".to_string());
        }

        if self.cache.precache_delay_min_ms > self.cache.precache_delay_max_ms {
            return Err("Precache delay minimum exceeds maximum".to_string());
        }

        if self.render.batch_size == 0 {
            return Err("Render batch size must be greater than zero".to_string());
        }

        if self.render.animation_frames == 0 {
            return Err("Animation frames must be greater than zero".to_string());
        }

        if !self.render.max_animation_zoom_out.is_finite() || self.render.max_animation_zoom_out < 0.0
        {
            return Err("Animation zoom-out threshold must be non-negative".to_string());
        }

        Ok(())
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let config: Config = serde_json::from_str(json)?;
        if let Err(e) = config.validate() {
            return Err(Error::custom(e));
        }
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    #[cfg(feature = "toml")]
    pub fn from_toml(toml_str: &str) -> Result<Self, toml::de::Error> {
        let config: Config = toml::from_str(toml_str)?;
        if let Err(e) = config.validate() {
            return Err(toml::de::Error::custom(e));
        }
        Ok(config)
    }

    #[cfg(feature = "toml")]
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_distance_px: Self::default_max_distance_px(),
            algorithm: AlgorithmKind::default(),
            grid_size_px: Self::default_grid_size_px(),
            min_cluster_size: Self::default_min_cluster_size(),
            worker_threads: Self::default_worker_threads(),
            cache: CacheConfig::default(),
            render: RenderConfig::default(),
        }
    }
}
