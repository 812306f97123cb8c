//! Shared fakes for the integration tests.
#![allow(dead_code)]

use async_trait::async_trait;
use image::{DynamicImage, Rgb, RgbImage};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};
use reportrx::tempfiles::TempFileManager;
use reportrx::{
    AnalysisConfig, Analyzer, ModelFailure, ModelReply, ModelRequest, PageImage, RasterError,
    Rasterizer, Section, VisionModel,
};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Model that answers every section, or fails every call, and records what
/// it was asked.
pub struct ScriptedModel {
    failure: Option<String>,
    delay: Duration,
    pub prompts: Mutex<Vec<Section>>,
    pub calls: AtomicUsize,
    in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
}

impl ScriptedModel {
    pub fn answering() -> Arc<Self> {
        Arc::new(Self::build(None, Duration::ZERO))
    }

    pub fn failing(detail: &str) -> Arc<Self> {
        Arc::new(Self::build(Some(detail.to_string()), Duration::ZERO))
    }

    pub fn slow(delay: Duration) -> Arc<Self> {
        Arc::new(Self::build(None, delay))
    }

    fn build(failure: Option<String>, delay: Duration) -> Self {
        Self {
            failure,
            delay,
            prompts: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

/// The reply text `ScriptedModel` gives for `section`.
pub fn canned_reply(section: Section) -> String {
    format!("Findings for {}.", section.title())
}

#[async_trait]
impl VisionModel for ScriptedModel {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn generate(&self, request: ModelRequest<'_>) -> Result<ModelReply, ModelFailure> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let section = Section::ALL
            .into_iter()
            .find(|s| s.prompt() == request.prompt)
            .expect("prompt belongs to a known section");
        self.prompts.lock().unwrap().push(section);

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        match &self.failure {
            Some(detail) => Err(ModelFailure::Call(detail.clone())),
            None => Ok(ModelReply {
                content: canned_reply(section),
                input_tokens: 1000,
                output_tokens: 50,
            }),
        }
    }
}

/// Rasterizer returning `pages` solid pages of `width`×`height`, page `i`
/// filled with [`page_colour`]`(i)`.
pub struct UniformRasterizer {
    pub pages: usize,
    pub width: u32,
    pub height: u32,
}

pub fn page_colour(i: usize) -> Rgb<u8> {
    Rgb([(40 * (i + 1)) as u8, 200, (255 - 40 * i) as u8])
}

impl Rasterizer for UniformRasterizer {
    fn rasterize(&self, pdf_path: &Path, _dpi: u32) -> Result<Vec<PageImage>, RasterError> {
        assert!(pdf_path.exists(), "input must be staged before rasterising");
        Ok((0..self.pages)
            .map(|i| {
                let img = RgbImage::from_pixel(self.width, self.height, page_colour(i));
                PageImage::new(i, DynamicImage::ImageRgb8(img))
            })
            .collect())
    }
}

pub struct PanickingRasterizer;

impl Rasterizer for PanickingRasterizer {
    fn rasterize(&self, _: &Path, _: u32) -> Result<Vec<PageImage>, RasterError> {
        panic!("pdfium aborted");
    }
}

pub fn analyzer(
    dir: &Path,
    model: Arc<dyn VisionModel>,
    rasterizer: Arc<dyn Rasterizer>,
    config: AnalysisConfig,
) -> Analyzer {
    Analyzer::with_parts(config, model, rasterizer, TempFileManager::new(dir))
}

/// Bytes that pass the header check; the fake rasterizers never parse them.
pub fn fake_pdf() -> Vec<u8> {
    b"%PDF-1.7\n% fake body\n%%EOF\n".to_vec()
}

/// A real PDF with one page per entry of `heights` (in points, 200 pt wide),
/// each saying "Page N".
pub fn sample_pdf(heights: &[i64]) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let mut kids: Vec<Object> = Vec::new();
    for (i, &height) in heights.iter().enumerate() {
        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), Object::Integer(18)]),
                Operation::new("Td", vec![Object::Integer(20), Object::Integer(height - 40)]),
                Operation::new("Tj", vec![Object::string_literal(format!("Page {}", i + 1))]),
                Operation::new("ET", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(
            dictionary! {},
            content.encode().expect("content encodes"),
        ));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "MediaBox" => vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::Integer(200),
                Object::Integer(height),
            ],
        });
        kids.push(page_id.into());
    }

    let pages = dictionary! {
        "Type" => "Pages",
        "Kids" => kids,
        "Count" => Object::Integer(heights.len() as i64),
        "Resources" => resources_id,
    };
    doc.objects.insert(pages_id, Object::Dictionary(pages));
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).expect("PDF serialises");
    bytes
}
