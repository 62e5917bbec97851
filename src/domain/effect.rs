//! Frame transform capability and the default tonal effect.

use super::scene::SceneParams;
use image::{Rgb, RgbImage};
use serde::{Deserialize, Serialize};
use std::f32::consts::TAU;
use std::sync::Arc;

/// One decoded video frame, packed RGB24.
pub type Frame = RgbImage;

/// Pure per-frame visual transform. Must not depend on any other frame of
/// the segment.
pub trait FrameTransform: Send + Sync {
    fn transform_frame(&self, frame: &Frame, frame_index: usize, scene: &SceneParams) -> Frame;

    /// Only every `frame_stride()`-th frame needs transforming; the frames in
    /// between reuse the preceding result.
    fn frame_stride(&self) -> usize {
        1
    }
}

/// Immutable effect parameters. A new value (with a higher `version`)
/// replaces the old one between segments, never during one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EffectSettings {
    #[serde(skip_deserializing)]
    pub version: u64,
    pub quantization_levels: u8,
    pub wave_amplitude: f32,
    pub wave_frequency: f32,
    pub wave_cycle_frames: u32,
    pub background_mix: f32,
    pub edge_blend: f32,
    pub every_nth_frame: u32,
}

impl Default for EffectSettings {
    fn default() -> Self {
        Self {
            version: 0,
            quantization_levels: 16,
            wave_amplitude: 0.01,
            wave_frequency: 20.0,
            wave_cycle_frames: 180,
            background_mix: 0.2,
            edge_blend: 0.2,
            every_nth_frame: 1,
        }
    }
}

/// Sine-wave displacement, luma posterisation, background tint and an edge
/// overlay between quantised bands.
#[derive(Debug, Clone)]
pub struct TonalEffect {
    settings: Arc<EffectSettings>,
}

impl TonalEffect {
    pub fn new(settings: Arc<EffectSettings>) -> Self {
        Self { settings }
    }

    fn quantised_luma(&self, frame: &Frame, frame_index: usize) -> Vec<u8> {
        let s = &self.settings;
        let (width, height) = frame.dimensions();
        let (wf, hf) = (width as f32, height as f32);

        let levels = f32::from(s.quantization_levels.max(2));
        let step = 255.0 / (levels - 1.0);
        let cycle = s.wave_cycle_frames.max(1) as usize;
        let phase = (frame_index % cycle) as f32 * TAU / cycle as f32;

        let mut bands = Vec::with_capacity((width * height) as usize);
        for y in 0..height {
            let yf = y as f32;
            let dy = (phase + yf * s.wave_frequency / hf).sin() * hf * s.wave_amplitude;
            let sy = (yf + dy).round().clamp(0.0, hf - 1.0) as u32;
            for x in 0..width {
                let xf = x as f32;
                let dx = (phase + xf * s.wave_frequency / wf).sin() * wf * s.wave_amplitude;
                let sx = (xf + dx).round().clamp(0.0, wf - 1.0) as u32;

                let Rgb([r, g, b]) = *frame.get_pixel(sx, sy);
                let luma = 0.299 * f32::from(r) + 0.587 * f32::from(g) + 0.114 * f32::from(b);
                let band = ((luma / step + 0.5).floor() * step).clamp(0.0, 255.0);
                bands.push(band as u8);
            }
        }
        bands
    }
}

fn mix(a: f32, b: u8, weight: f32) -> f32 {
    a * (1.0 - weight) + f32::from(b) * weight
}

impl FrameTransform for TonalEffect {
    fn transform_frame(&self, frame: &Frame, frame_index: usize, scene: &SceneParams) -> Frame {
        let (width, height) = frame.dimensions();
        if width == 0 || height == 0 {
            return frame.clone();
        }

        let bands = self.quantised_luma(frame, frame_index);
        let background_mix = self.settings.background_mix.clamp(0.0, 1.0);
        let edge_blend = self.settings.edge_blend.clamp(0.0, 1.0);

        let mut out = RgbImage::new(width, height);
        for y in 0..height {
            for x in 0..width {
                let i = (y * width + x) as usize;
                let band = bands[i];
                let on_edge = edge_blend > 0.0
                    && ((x + 1 < width && bands[i + 1] != band)
                        || (y + 1 < height && bands[i + width as usize] != band));

                let mut pixel = [0u8; 3];
                for (c, value) in pixel.iter_mut().enumerate() {
                    let mut v = mix(f32::from(band), scene.background[c], background_mix);
                    if on_edge {
                        v = mix(v, scene.edge[c], edge_blend);
                    }
                    *value = v.round().clamp(0.0, 255.0) as u8;
                }
                out.put_pixel(x, y, Rgb(pixel));
            }
        }
        out
    }

    fn frame_stride(&self) -> usize {
        self.settings.every_nth_frame.max(1) as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn effect(settings: EffectSettings) -> TonalEffect {
        TonalEffect::new(Arc::new(settings))
    }

    #[test]
    fn test_uniform_frame_posterised_and_tinted() {
        let fx = effect(EffectSettings {
            quantization_levels: 2,
            background_mix: 0.2,
            ..EffectSettings::default()
        });
        let scene = SceneParams::from_clock(12, 0);
        let frame = RgbImage::from_pixel(8, 6, Rgb([128, 128, 128]));

        let out = fx.transform_frame(&frame, 0, &scene);

        // 128 rounds up to the white band; 255 * 0.8 + 175 * 0.2 = 239
        assert_eq!(out.dimensions(), (8, 6));
        assert!(out.pixels().all(|p| *p == Rgb([239, 239, 239])));
    }

    #[test]
    fn test_edge_overlay_between_bands() {
        let fx = effect(EffectSettings {
            quantization_levels: 2,
            wave_amplitude: 0.0,
            background_mix: 0.0,
            edge_blend: 1.0,
            ..EffectSettings::default()
        });
        let scene = SceneParams::from_clock(0, 0);
        let mut frame = RgbImage::from_pixel(4, 1, Rgb([0, 0, 0]));
        frame.put_pixel(2, 0, Rgb([255, 255, 255]));
        frame.put_pixel(3, 0, Rgb([255, 255, 255]));

        let out = fx.transform_frame(&frame, 0, &scene);

        assert_eq!(*out.get_pixel(0, 0), Rgb([0, 0, 0]));
        // Last dark pixel before the bright band takes the (white) edge colour.
        assert_eq!(*out.get_pixel(1, 0), scene.edge);
        assert_eq!(*out.get_pixel(3, 0), Rgb([255, 255, 255]));
    }

    #[test]
    fn test_transform_is_deterministic() {
        let fx = effect(EffectSettings::default());
        let scene = SceneParams::from_clock(9, 15);
        let frame = RgbImage::from_fn(16, 9, |x, y| Rgb([(x * 16) as u8, (y * 28) as u8, 90]));

        assert_eq!(
            fx.transform_frame(&frame, 42, &scene),
            fx.transform_frame(&frame, 42, &scene)
        );
    }

    #[test]
    fn test_frame_stride_from_settings() {
        assert_eq!(effect(EffectSettings::default()).frame_stride(), 1);
        let every_third = EffectSettings {
            every_nth_frame: 3,
            ..EffectSettings::default()
        };
        assert_eq!(effect(every_third).frame_stride(), 3);
        let zero = EffectSettings {
            every_nth_frame: 0,
            ..EffectSettings::default()
        };
        assert_eq!(effect(zero).frame_stride(), 1);
    }

    #[test]
    fn test_settings_parse_with_defaults() {
        let parsed: EffectSettings =
            serde_json::from_str(r#"{"quantization_levels": 8, "version": 99}"#).unwrap();
        assert_eq!(parsed.quantization_levels, 8);
        assert_eq!(parsed.version, 0);
        assert_eq!(parsed.every_nth_frame, 1);
    }
}
