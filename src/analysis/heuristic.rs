// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Camera-frame mood estimate from brightness and colour temperature
//!
//! This is a placeholder, not a vision model: it looks at how well lit and
//! how warm a frame is and picks one of a pair of moods with a random draw.
//! It only runs when the AI gateway is not configured or fails.

use async_trait::async_trait;
use image::{DynamicImage, GenericImageView};
use tracing::{debug, info};

use super::{Analysis, AnalysisRequest, AnalysisType, FacialReading, MoodSource, ReadingSource};
use crate::mood::Mood;
use crate::Result;

/// Frames larger than this are downscaled before averaging
const MAX_FRAME_EDGE: u32 = 512;

/// Confidence reported for heuristic readings (0-100)
const HEURISTIC_CONFIDENCE: f64 = 40.0;

/// Average lighting of one frame, each value normalised by 255
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameStats {
    /// Mean of `(r + g + b) / 3`, in `0.0..=1.0`
    pub brightness: f64,
    /// Mean red minus mean blue, in `-1.0..=1.0`
    pub temperature: f64,
    pub pixel_count: usize,
}

impl FrameStats {
    /// Average over packed RGBA bytes; the alpha channel is ignored
    pub fn from_rgba(data: &[u8]) -> Self {
        let mut total_brightness = 0.0;
        let mut red_sum = 0.0;
        let mut blue_sum = 0.0;
        let mut pixel_count = 0usize;

        for px in data.chunks_exact(4) {
            let (r, g, b) = (f64::from(px[0]), f64::from(px[1]), f64::from(px[2]));
            total_brightness += (r + g + b) / 3.0;
            red_sum += r;
            blue_sum += b;
            pixel_count += 1;
        }

        if pixel_count == 0 {
            return Self { brightness: 0.0, temperature: 0.0, pixel_count };
        }

        let n = pixel_count as f64;
        Self {
            brightness: total_brightness / n / 255.0,
            temperature: (red_sum / n - blue_sum / n) / 255.0,
            pixel_count,
        }
    }

    pub fn from_image(img: &DynamicImage) -> Self {
        let (width, height) = img.dimensions();
        let img = if width > MAX_FRAME_EDGE || height > MAX_FRAME_EDGE {
            img.resize(MAX_FRAME_EDGE, MAX_FRAME_EDGE, image::imageops::FilterType::Triangle)
        } else {
            img.clone()
        };
        Self::from_rgba(img.to_rgba8().as_raw())
    }

    /// Decode an encoded image (JPEG, PNG, ...) and average it
    pub fn from_encoded(bytes: &[u8]) -> Result<Self> {
        let img = image::load_from_memory(bytes)?;
        Ok(Self::from_image(&img))
    }
}

/// Map lighting bands plus a draw in `[0, 1)` to a mood
pub fn classify(stats: &FrameStats, draw: f64) -> Mood {
    if stats.pixel_count == 0 {
        return Mood::Neutral;
    }

    let FrameStats { brightness, temperature, .. } = *stats;
    if brightness > 0.6 && temperature > 0.1 {
        if draw > 0.5 { Mood::Happy } else { Mood::Energetic }
    } else if brightness > 0.5 && temperature > 0.0 {
        if draw > 0.5 { Mood::Calm } else { Mood::Neutral }
    } else if brightness < 0.4 {
        if draw > 0.5 { Mood::Tired } else { Mood::Calm }
    } else if temperature < -0.1 {
        if draw > 0.3 { Mood::Neutral } else { Mood::Anxious }
    } else {
        Mood::Neutral
    }
}

fn canned_words(mood: Mood) -> (&'static str, &'static str) {
    match mood {
        Mood::Happy => (
            "You seem bright and upbeat right now.",
            "Share that energy: send a kind note to someone you care about.",
        ),
        Mood::Energetic => (
            "There is a lively energy about you today.",
            "Channel it into a short walk or a task you've been putting off.",
        ),
        Mood::Calm => (
            "You look settled and at ease.",
            "A few minutes of mindful breathing can help you keep this calm.",
        ),
        Mood::Neutral => (
            "You seem steady and balanced.",
            "Check in with yourself: a glass of water and a stretch go a long way.",
        ),
        Mood::Tired => (
            "You might be running a little low on energy.",
            "Consider a short rest or an early night tonight.",
        ),
        Mood::Anxious => (
            "There may be some tension on your mind.",
            "Try box breathing: in for four, hold for four, out for four.",
        ),
        Mood::Sad => (
            "It looks like things may feel heavy right now.",
            "Reaching out to a friend can help. You don't have to carry it alone.",
        ),
    }
}

/// Build the full reading for a heuristic estimate
pub fn reading_for(mood: Mood) -> FacialReading {
    let (insight, suggestion) = canned_words(mood);
    FacialReading {
        mood,
        confidence: HEURISTIC_CONFIDENCE,
        insight: insight.to_string(),
        suggestion: suggestion.to_string(),
        source: ReadingSource::Heuristic,
    }
}

/// Facial analysis that never leaves the process
pub struct HeuristicAnalyzer {
    draw: Box<dyn Fn() -> f64 + Send + Sync>,
}

impl HeuristicAnalyzer {
    pub fn new() -> Self {
        Self {
            draw: Box::new(rand::random::<f64>),
        }
    }

    /// Use a fixed random source, for deterministic results
    pub fn with_draw<F>(draw: F) -> Self
    where
        F: Fn() -> f64 + Send + Sync + 'static,
    {
        Self { draw: Box::new(draw) }
    }

    /// Estimate a mood from an encoded frame
    pub fn estimate(&self, frame: &[u8]) -> Result<FacialReading> {
        let stats = FrameStats::from_encoded(frame)?;
        Ok(self.read(&stats))
    }

    fn read(&self, stats: &FrameStats) -> FacialReading {
        let mood = classify(stats, (self.draw)());
        debug!(
            "Frame brightness={:.2} temperature={:.2} -> {}",
            stats.brightness, stats.temperature, mood
        );
        reading_for(mood)
    }
}

impl Default for HeuristicAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MoodSource for HeuristicAnalyzer {
    fn name(&self) -> &'static str {
        "heuristic"
    }

    fn can_handle(&self, kind: AnalysisType) -> bool {
        kind == AnalysisType::Facial
    }

    fn priority(&self) -> u8 {
        10 // Last resort
    }

    async fn analyze(&self, request: &AnalysisRequest) -> Result<Analysis> {
        let frame = request.decode_image()?;
        info!("Estimating mood from {} byte frame", frame.len());
        // Decoding and resizing are CPU bound
        let stats = tokio::task::spawn_blocking(move || FrameStats::from_encoded(&frame)).await??;
        Ok(Analysis::Facial(self.read(&stats)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgba, RgbaImage};

    fn stats(brightness: f64, temperature: f64) -> FrameStats {
        FrameStats { brightness, temperature, pixel_count: 1 }
    }

    fn solid_png(r: u8, g: u8, b: u8) -> Vec<u8> {
        let img = RgbaImage::from_pixel(8, 8, Rgba([r, g, b, 255]));
        let mut buffer = Vec::new();
        DynamicImage::ImageRgba8(img)
            .write_to(&mut std::io::Cursor::new(&mut buffer), ImageFormat::Png)
            .unwrap();
        buffer
    }

    #[test]
    fn test_frame_stats_average() {
        // One white pixel, one pure red pixel
        let data = [255, 255, 255, 255, 255, 0, 0, 255];
        let s = FrameStats::from_rgba(&data);
        assert_eq!(s.pixel_count, 2);
        assert!((s.brightness - (1.0 + 1.0 / 3.0) / 2.0).abs() < 1e-9);
        assert!((s.temperature - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_bright_warm_band() {
        assert_eq!(classify(&stats(0.7, 0.2), 0.9), Mood::Happy);
        assert_eq!(classify(&stats(0.7, 0.2), 0.1), Mood::Energetic);
    }

    #[test]
    fn test_moderate_warm_band() {
        assert_eq!(classify(&stats(0.55, 0.05), 0.9), Mood::Calm);
        assert_eq!(classify(&stats(0.55, 0.05), 0.2), Mood::Neutral);
    }

    #[test]
    fn test_dark_band() {
        assert_eq!(classify(&stats(0.2, 0.3), 0.8), Mood::Tired);
        assert_eq!(classify(&stats(0.2, 0.3), 0.5), Mood::Calm);
    }

    #[test]
    fn test_cool_band() {
        assert_eq!(classify(&stats(0.45, -0.2), 0.4), Mood::Neutral);
        assert_eq!(classify(&stats(0.45, -0.2), 0.3), Mood::Anxious);
    }

    #[test]
    fn test_default_band_and_empty_frame() {
        assert_eq!(classify(&stats(0.45, 0.0), 0.0), Mood::Neutral);
        assert_eq!(classify(&FrameStats::from_rgba(&[]), 0.0), Mood::Neutral);
    }

    #[test]
    fn test_estimate_from_encoded_frame() {
        let heuristic = HeuristicAnalyzer::with_draw(|| 0.9);
        let reading = heuristic.estimate(&solid_png(250, 200, 120)).unwrap();
        assert_eq!(reading.mood, Mood::Happy);
        assert_eq!(reading.source, ReadingSource::Heuristic);

        let dark = heuristic.estimate(&solid_png(10, 10, 10)).unwrap();
        assert_eq!(dark.mood, Mood::Tired);
    }

    #[test]
    fn test_garbage_frame_is_an_error() {
        let heuristic = HeuristicAnalyzer::with_draw(|| 0.0);
        assert!(heuristic.estimate(b"not an image").is_err());
    }

    #[tokio::test]
    async fn test_analyze_decodes_frame_off_the_runtime() {
        use base64::{engine::general_purpose, Engine as _};

        let heuristic = HeuristicAnalyzer::with_draw(|| 0.9);
        let encoded = general_purpose::STANDARD.encode(solid_png(250, 200, 120));
        let request = AnalysisRequest::facial(format!("data:image/png;base64,{}", encoded));

        match heuristic.analyze(&request).await.unwrap() {
            Analysis::Facial(reading) => {
                assert_eq!(reading.mood, Mood::Happy);
                assert_eq!(reading.source, ReadingSource::Heuristic);
            }
            other => panic!("Expected facial reading, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_analyze_rejects_undecodable_frame() {
        use base64::{engine::general_purpose, Engine as _};

        let heuristic = HeuristicAnalyzer::with_draw(|| 0.0);
        let request = AnalysisRequest::facial(general_purpose::STANDARD.encode(b"not an image"));
        assert!(matches!(
            heuristic.analyze(&request).await,
            Err(crate::MindflowError::Image(_))
        ));
    }
}
