//! # Filter Chain Module
//!
//! Catene di filtri audio/video da passare a FFmpeg (`-vf` / `-af`).
//!
//! ## Responsabilità:
//! - Rappresenta un filtro come nome + parametri
//! - Mantiene due sequenze ordinate (video e audio)
//! - Costruisce le stringhe di filtro in modo deterministico
//! - Fornisce costruttori per i filtri più comuni
//!
//! I parametri sono salvati in una `BTreeMap`: l'ordine di inserimento non
//! conta, ma la stringa prodotta è sempre la stessa per gli stessi parametri.
//!
//! ## Esempio:
//! ```rust,ignore
//! let chain = FilterChain::new()
//!     .add_video_filter(Filter::scale(1920, 1080))
//!     .add_audio_filter(Filter::volume(0.9));
//! assert_eq!(chain.video_filter_string().as_deref(), Some("scale=h=1080:w=1920"));
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A single FFmpeg filter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Filter {
    pub name: String,
    #[serde(default)]
    pub params: BTreeMap<String, String>,
}

impl Filter {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: BTreeMap::new(),
        }
    }

    /// Add a parameter. An empty value renders as a bare key.
    pub fn param(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.params.insert(key.into(), value.to_string());
        self
    }

    /// Render as `name=k=v:k2=v2`
    pub fn render(&self) -> String {
        if self.params.is_empty() {
            return self.name.clone();
        }

        let params: Vec<String> = self
            .params
            .iter()
            .map(|(key, value)| {
                if value.is_empty() {
                    key.clone()
                } else {
                    format!("{}={}", key, value)
                }
            })
            .collect();

        format!("{}={}", self.name, params.join(":"))
    }

    // Video filters

    pub fn scale(width: u32, height: u32) -> Self {
        Self::new("scale").param("w", width).param("h", height)
    }

    pub fn crop(width: u32, height: u32, x: u32, y: u32) -> Self {
        Self::new("crop")
            .param("w", width)
            .param("h", height)
            .param("x", x)
            .param("y", y)
    }

    /// Rotation angle in ffmpeg expression syntax (e.g. `PI/2`)
    pub fn rotate(angle: &str) -> Self {
        Self::new("rotate").param("angle", angle)
    }

    pub fn blur(sigma: f64) -> Self {
        Self::new("gblur").param("sigma", format!("{:.2}", sigma))
    }

    pub fn sharpen(amount: f64) -> Self {
        Self::new("unsharp")
            .param("luma_msize_x", 5)
            .param("luma_msize_y", 5)
            .param("luma_amount", format!("{:.2}", amount))
            .param("chroma_msize_x", 5)
            .param("chroma_msize_y", 5)
            .param("chroma_amount", format!("{:.2}", amount * 0.5))
    }

    pub fn brightness_contrast(brightness: f64, contrast: f64) -> Self {
        Self::new("eq")
            .param("brightness", format!("{:.2}", brightness))
            .param("contrast", format!("{:.2}", contrast))
    }

    pub fn saturation(saturation: f64) -> Self {
        Self::new("eq").param("saturation", format!("{:.2}", saturation))
    }

    pub fn fade_in(duration: f64) -> Self {
        Self::new("fade")
            .param("type", "in")
            .param("duration", format!("{:.2}", duration))
    }

    pub fn fade_out(start_time: f64, duration: f64) -> Self {
        Self::new("fade")
            .param("type", "out")
            .param("start_time", format!("{:.2}", start_time))
            .param("duration", format!("{:.2}", duration))
    }

    /// Overlay placement at `x`/`y`. The overlay image is the engine's second input.
    pub fn watermark(x: i32, y: i32) -> Self {
        Self::new("overlay").param("x", x).param("y", y)
    }

    // Audio filters

    pub fn volume(volume: f64) -> Self {
        Self::new("volume").param("volume", format!("{:.2}", volume))
    }

    pub fn audio_fade_in(duration: f64) -> Self {
        Self::new("afade")
            .param("type", "in")
            .param("duration", format!("{:.2}", duration))
    }

    pub fn audio_fade_out(start_time: f64, duration: f64) -> Self {
        Self::new("afade")
            .param("type", "out")
            .param("start_time", format!("{:.2}", start_time))
            .param("duration", format!("{:.2}", duration))
    }

    pub fn highpass(frequency: u32) -> Self {
        Self::new("highpass").param("f", frequency)
    }

    pub fn lowpass(frequency: u32) -> Self {
        Self::new("lowpass").param("f", frequency)
    }

    pub fn noise_reduction(strength: f64) -> Self {
        Self::new("anlmdn").param("s", format!("{:.2}", strength))
    }
}

/// Ordered video and audio filter sequences
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterChain {
    #[serde(default)]
    pub video: Vec<Filter>,
    #[serde(default)]
    pub audio: Vec<Filter>,
}

impl FilterChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_video_filter(mut self, filter: Filter) -> Self {
        self.video.push(filter);
        self
    }

    pub fn add_audio_filter(mut self, filter: Filter) -> Self {
        self.audio.push(filter);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.video.is_empty() && self.audio.is_empty()
    }

    /// Value for `-vf`, `None` when there are no video filters
    pub fn video_filter_string(&self) -> Option<String> {
        Self::join(&self.video)
    }

    /// Value for `-af`, `None` when there are no audio filters
    pub fn audio_filter_string(&self) -> Option<String> {
        Self::join(&self.audio)
    }

    fn join(filters: &[Filter]) -> Option<String> {
        if filters.is_empty() {
            return None;
        }
        Some(filters.iter().map(Filter::render).collect::<Vec<_>>().join(","))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_render_is_sorted_and_deterministic() {
        let a = Filter::new("eq").param("contrast", "1.1").param("brightness", "0.05");
        let b = Filter::new("eq").param("brightness", "0.05").param("contrast", "1.1");
        assert_eq!(a.render(), "eq=brightness=0.05:contrast=1.1");
        assert_eq!(a.render(), b.render());
    }

    #[test]
    fn test_empty_value_renders_bare_key() {
        let f = Filter::new("hflip");
        assert_eq!(f.render(), "hflip");

        let f = Filter::new("format").param("yuv420p", "");
        assert_eq!(f.render(), "format=yuv420p");
    }

    #[test]
    fn test_chain_strings() {
        let chain = FilterChain::new()
            .add_video_filter(Filter::scale(854, 480))
            .add_video_filter(Filter::brightness_contrast(0.0, 1.05))
            .add_audio_filter(Filter::volume(0.95))
            .add_audio_filter(Filter::lowpass(15000));

        assert_eq!(
            chain.video_filter_string().as_deref(),
            Some("scale=h=480:w=854,eq=brightness=0.00:contrast=1.05")
        );
        assert_eq!(
            chain.audio_filter_string().as_deref(),
            Some("volume=volume=0.95,lowpass=f=15000")
        );
    }

    #[test]
    fn test_empty_chain() {
        let chain = FilterChain::new();
        assert!(chain.is_empty());
        assert!(chain.video_filter_string().is_none());
        assert!(chain.audio_filter_string().is_none());
    }

    #[test]
    fn test_watermark_renders_overlay_position() {
        assert_eq!(Filter::watermark(10, -20).render(), "overlay=x=10:y=-20");
    }
}
