//! Data produced while serving one analysis request.

use crate::error::SectionError;
use crate::prompts::Section;
use image::{DynamicImage, RgbImage};
use serde::{Deserialize, Serialize};

/// One rasterised PDF page.
#[derive(Debug, Clone)]
pub struct PageImage {
    /// 0-based page index in the source PDF.
    pub index: usize,
    pub image: DynamicImage,
}

impl PageImage {
    pub fn new(index: usize, image: DynamicImage) -> Self {
        Self { index, image }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }
}

/// Where one page landed inside the composite.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PagePlacement {
    pub index: usize,
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// All pages of a document stacked vertically in page order.
#[derive(Debug, Clone)]
pub struct CompositeImage {
    pub image: RgbImage,
    pub placements: Vec<PagePlacement>,
}

impl CompositeImage {
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn page_count(&self) -> usize {
        self.placements.len()
    }

    pub fn summary(&self) -> CompositeSummary {
        CompositeSummary {
            width: self.width(),
            height: self.height(),
            page_count: self.page_count(),
            placements: self.placements.clone(),
        }
    }
}

/// Serialisable description of a composite image (without pixels).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompositeSummary {
    pub width: u32,
    pub height: u32,
    pub page_count: usize,
    pub placements: Vec<PagePlacement>,
}

/// Outcome of one section prompt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SectionResult {
    pub section: Section,
    /// Cleaned model text, or the reason the call failed.
    pub outcome: Result<String, SectionError>,
    pub input_tokens: usize,
    pub output_tokens: usize,
    pub duration_ms: u64,
    pub retries: u32,
}

impl SectionResult {
    pub fn failed(section: Section, error: SectionError, duration_ms: u64, retries: u32) -> Self {
        Self {
            section,
            outcome: Err(error),
            input_tokens: 0,
            output_tokens: 0,
            duration_ms,
            retries,
        }
    }

    pub fn is_error(&self) -> bool {
        self.outcome.is_err()
    }

    pub fn error(&self) -> Option<&SectionError> {
        self.outcome.as_ref().err()
    }

    /// Text to display for this section: the cleaned model output, or an
    /// error line embedding the failure reason.
    pub fn text(&self) -> String {
        match &self.outcome {
            Ok(text) => text.clone(),
            Err(e) => e.user_message(),
        }
    }
}

/// Timing and token totals for one request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalysisStats {
    pub page_count: usize,
    pub section_count: usize,
    pub failed_sections: usize,
    pub total_input_tokens: u64,
    pub total_output_tokens: u64,
    pub render_duration_ms: u64,
    pub composite_duration_ms: u64,
    pub llm_duration_ms: u64,
    pub total_duration_ms: u64,
    pub temp_files_allocated: usize,
}

/// The full result of analysing one uploaded report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportAnalysis {
    pub filename: String,
    /// Section results in display order.
    pub sections: Vec<SectionResult>,
    pub composite: CompositeSummary,
    /// Composite image as a `data:image/png;base64,…` URI.
    pub composite_data_uri: String,
    pub stats: AnalysisStats,
}

impl ReportAnalysis {
    pub fn get(&self, section: Section) -> Option<&SectionResult> {
        self.sections.iter().find(|r| r.section == section)
    }

    /// Display text of `section`, if it was part of the request.
    pub fn text(&self, section: Section) -> Option<String> {
        self.get(section).map(SectionResult::text)
    }

    /// `(key, text)` pairs in display order.
    pub fn to_map(&self) -> Vec<(&'static str, String)> {
        self.sections
            .iter()
            .map(|r| (r.section.key(), r.text()))
            .collect()
    }

    pub fn all_failed(&self) -> bool {
        !self.sections.is_empty() && self.sections.iter().all(SectionResult::is_error)
    }
}
