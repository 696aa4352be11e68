use crate::control_system::traffic_light_controller::{ControllerState, SignalPhase};
use crate::detection::vehicle_detector::{Detection, VehicleClass};
use crate::error::RenderError;
use crate::global_variables::{HEADER_HEIGHT, LIGHT_WIDGET_MARGIN, LIGHT_WIDGET_SIZE};
use crate::render::canvas::{dim, Canvas};
use crate::shared_data::{LaneFrame, LaneId, VehicleCount};
use image::imageops::{self, FilterType};
use image::{Rgb, RgbImage};
use log::debug;
use plotters::style::RGBColor;
use std::sync::Arc;

const LAMP_RED: RGBColor = RGBColor(255, 0, 0);
const LAMP_YELLOW: RGBColor = RGBColor(255, 255, 0);
const LAMP_GREEN: RGBColor = RGBColor(0, 255, 0);
const HOUSING: RGBColor = RGBColor(100, 100, 100);
const HEADER_BG: [u8; 3] = [50, 50, 50];
const BOX_COLOR: RGBColor = RGBColor(255, 140, 0);
const TEXT_GREEN: RGBColor = RGBColor(0, 255, 0);
const TEXT_WHITE: RGBColor = RGBColor(255, 255, 255);

/// The most recently assembled display frame.
#[derive(Debug, Clone)]
pub struct CombinedView {
    /// Shared so sinks can keep a view without copying the pixels.
    pub image: Arc<RgbImage>,
    pub signal: ControllerState,
    pub counts: Vec<VehicleCount>,
}

impl CombinedView {
    pub fn status_line(&self) -> String {
        format!("{} | {}", signal_text(&self.signal), counts_text(&self.counts))
    }
}

/// Boxes and "{class} {confidence}" labels for the given vehicle detections.
pub fn draw_detections(image: &mut RgbImage, detections: &[Detection]) -> Result<(), RenderError> {
    if detections.is_empty() {
        return Ok(());
    }
    let canvas = Canvas::new(image);
    for det in detections {
        let x0 = det.bbox.x.round() as i32;
        let y0 = det.bbox.y.round() as i32;
        let x1 = (det.bbox.x + det.bbox.width).round() as i32;
        let y1 = (det.bbox.y + det.bbox.height).round() as i32;
        canvas.rect((x0, y0), (x1, y1), BOX_COLOR, false, 2)?;

        let name = VehicleClass::from_class_id(det.class_id)
            .map(|c| c.name())
            .unwrap_or("unknown");
        let label = format!("{} {:.2}", name, det.confidence);
        // Labels are cosmetic; a missing font must not cost us the boxes.
        if let Err(e) = canvas.text(&label, (x0, (y0 - 16).max(0)), 14, BOX_COLOR) {
            debug!("Skipping detection label: {}", e);
        }
    }
    canvas.finish()
}

/// Traffic light widget in the frame's top-right corner: housing plus red,
/// yellow and green lamps, with only the lit lamp at full brightness.
pub fn draw_signal_widget(image: &mut RgbImage, phase: SignalPhase) -> Result<(), RenderError> {
    let (width, height) = image.dimensions();
    let (widget_w, widget_h) = LIGHT_WIDGET_SIZE;
    if width < widget_w + 2 * LIGHT_WIDGET_MARGIN || height < widget_h + LIGHT_WIDGET_MARGIN {
        return Err(RenderError::DoesNotFit {
            overlay: LIGHT_WIDGET_SIZE,
            target: (width, height),
        });
    }

    let x0 = (width - widget_w - LIGHT_WIDGET_MARGIN) as i32;
    let y0 = LIGHT_WIDGET_MARGIN as i32;
    let (w, h) = (widget_w as i32, widget_h as i32);

    let canvas = Canvas::new(image);
    canvas.rect((x0, y0), (x0 + w, y0 + h), HOUSING, true, 1)?;

    let radius = w * 3 / 10;
    let lamps = [
        (SignalPhase::Red, LAMP_RED),
        (SignalPhase::Yellow, LAMP_YELLOW),
        (SignalPhase::Green, LAMP_GREEN),
    ];
    for (slot, (lamp_phase, color)) in lamps.into_iter().enumerate() {
        let center = (x0 + w / 2, y0 + h * (2 * slot as i32 + 1) / 6);
        let lit = if lamp_phase == phase { color } else { dim(color, 0.3) };
        canvas.circle(center, radius, lit)?;
    }
    canvas.finish()
}

/// "Lane {n} Count: {count}" in the top-left corner.
pub fn draw_lane_caption(
    image: &mut RgbImage,
    lane: LaneId,
    count: VehicleCount,
) -> Result<(), RenderError> {
    let canvas = Canvas::new(image);
    canvas.text(
        &format!("Lane {} Count: {}", lane + 1, count),
        (10, 10),
        28,
        TEXT_GREEN,
    )?;
    canvas.finish()
}

/// Grid shape for `lanes` tiles: a single row for up to two lanes, otherwise
/// the smallest near-square grid (2x2 for three or four lanes).
pub fn grid_size(lanes: usize) -> (usize, usize) {
    if lanes <= 2 {
        return (1, lanes.max(1));
    }
    let cols = (lanes as f64).sqrt().ceil() as usize;
    let rows = lanes.div_ceil(cols);
    (rows, cols)
}

/// Tiles the latest frame of every lane. All tiles take the size of the
/// first frame; frames of another size are resized to fit their cell.
pub fn combine_frames(frames: &[Arc<LaneFrame>], lanes: usize) -> RgbImage {
    let (rows, cols) = grid_size(lanes);
    let (cell_w, cell_h) = frames
        .first()
        .map(|f| f.image.dimensions())
        .unwrap_or((1, 1));
    let mut combined = RgbImage::new(cell_w * cols as u32, cell_h * rows as u32);

    for frame in frames {
        if frame.lane >= rows * cols {
            continue;
        }
        let x = (frame.lane % cols) as i64 * cell_w as i64;
        let y = (frame.lane / cols) as i64 * cell_h as i64;
        if frame.image.dimensions() == (cell_w, cell_h) {
            imageops::replace(&mut combined, &frame.image, x, y);
        } else {
            let resized = imageops::resize(&frame.image, cell_w, cell_h, FilterType::Triangle);
            imageops::replace(&mut combined, &resized, x, y);
        }
    }
    combined
}

pub fn signal_text(state: &ControllerState) -> String {
    format!("Current {}: Lane {}", state.phase.name(), state.active_lane + 1)
}

pub fn counts_text(counts: &[VehicleCount]) -> String {
    let parts: Vec<String> = counts
        .iter()
        .enumerate()
        .map(|(lane, count)| format!("Lane {}: {}", lane + 1, count))
        .collect();
    format!("Counts: {}", parts.join(", "))
}

/// Stacks a status header above the grid.
pub fn add_header(grid: &RgbImage, state: &ControllerState, counts: &[VehicleCount]) -> RgbImage {
    let (width, height) = grid.dimensions();
    let mut framed = RgbImage::from_pixel(width, height + HEADER_HEIGHT, Rgb(HEADER_BG));
    imageops::replace(&mut framed, grid, 0, HEADER_HEIGHT as i64);

    let drawn = {
        let canvas = Canvas::new(&mut framed);
        canvas
            .text(&signal_text(state), (20, 18), 28, TEXT_GREEN)
            .and_then(|_| {
                canvas.text(&counts_text(counts), (width as i32 / 2, 20), 22, TEXT_WHITE)
            })
            .and_then(|_| canvas.finish())
    };
    if let Err(e) = drawn {
        debug!("Header text skipped this tick: {}", e);
    }
    framed
}

/// Builds the combined view from every lane's latest frame.
pub fn compose_view(
    frames: &[Arc<LaneFrame>],
    state: ControllerState,
    counts: Vec<VehicleCount>,
) -> CombinedView {
    let grid = combine_frames(frames, counts.len());
    CombinedView {
        image: Arc::new(add_header(&grid, &state, &counts)),
        signal: state,
        counts,
    }
}
