use crate::error::RenderError;
use image::RgbImage;
use plotters::coord::Shift;
use plotters::prelude::*;

/// Drawing primitives over an RGB frame buffer, backed by plotters' bitmap
/// backend. Everything drawn lands directly in the wrapped image.
pub struct Canvas<'a> {
    area: DrawingArea<BitMapBackend<'a>, Shift>,
}

impl<'a> Canvas<'a> {
    pub fn new(image: &'a mut RgbImage) -> Self {
        let (width, height) = image.dimensions();
        let backend = BitMapBackend::with_buffer(image, (width, height));
        Self {
            area: backend.into_drawing_area(),
        }
    }

    pub fn fill(&self, color: RGBColor) -> Result<(), RenderError> {
        self.area.fill(&color).map_err(draw_error)
    }

    pub fn rect(
        &self,
        top_left: (i32, i32),
        bottom_right: (i32, i32),
        color: RGBColor,
        filled: bool,
        thickness: u32,
    ) -> Result<(), RenderError> {
        let style = if filled {
            color.filled()
        } else {
            color.stroke_width(thickness)
        };
        self.area
            .draw(&Rectangle::new([top_left, bottom_right], style))
            .map_err(draw_error)
    }

    pub fn circle(&self, center: (i32, i32), radius: i32, color: RGBColor) -> Result<(), RenderError> {
        self.area
            .draw(&Circle::new(center, radius, color.filled()))
            .map_err(draw_error)
    }

    pub fn text(
        &self,
        text: &str,
        pos: (i32, i32),
        size: u32,
        color: RGBColor,
    ) -> Result<(), RenderError> {
        let style = TextStyle::from(("sans-serif", size).into_font()).color(&color);
        self.area
            .draw(&Text::new(text.to_string(), pos, style))
            .map_err(draw_error)
    }

    pub fn finish(self) -> Result<(), RenderError> {
        self.area.present().map_err(draw_error)
    }
}

fn draw_error<E: std::fmt::Display>(e: E) -> RenderError {
    RenderError::Draw(e.to_string())
}

/// Scales a colour towards black, used for unlit lamps.
pub fn dim(color: RGBColor, factor: f64) -> RGBColor {
    let scale = |c: u8| (c as f64 * factor).round() as u8;
    RGBColor(scale(color.0), scale(color.1), scale(color.2))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filled_rect_writes_into_image() {
        let mut image = RgbImage::new(20, 20);
        {
            let canvas = Canvas::new(&mut image);
            canvas.rect((2, 2), (10, 10), RGBColor(0, 255, 0), true, 1).unwrap();
            canvas.finish().unwrap();
        }
        assert_eq!(image.get_pixel(5, 5).0, [0, 255, 0]);
        assert_eq!(image.get_pixel(15, 15).0, [0, 0, 0]);
    }

    #[test]
    fn filled_circle_colours_its_center() {
        let mut image = RgbImage::new(30, 30);
        {
            let canvas = Canvas::new(&mut image);
            canvas.circle((15, 15), 5, RGBColor(255, 0, 0)).unwrap();
            canvas.finish().unwrap();
        }
        assert_eq!(image.get_pixel(15, 15).0, [255, 0, 0]);
        assert_eq!(image.get_pixel(1, 1).0, [0, 0, 0]);
    }

    #[test]
    fn dim_scales_each_channel() {
        assert_eq!(dim(RGBColor(0, 255, 100), 0.3), RGBColor(0, 77, 30));
    }
}
