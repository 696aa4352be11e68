use crate::detection::vehicle_detector::{Detection, Detector, VehicleClass};
use crate::error::FrameError;
use crate::render::compose::draw_detections;
use crate::shared_data::VehicleCount;
use image::RgbImage;
use log::debug;

/// Turns raw frames into (annotated frame, vehicle count) using a detector.
///
/// The counter keeps no frame buffers between calls: each frame is moved in
/// and handed back annotated.
pub struct LaneCounter {
    detector: Box<dyn Detector>,
}

impl LaneCounter {
    pub fn new(detector: Box<dyn Detector>) -> Self {
        Self { detector }
    }

    pub fn count(&mut self, mut frame: RgbImage) -> Result<(RgbImage, VehicleCount), FrameError> {
        let vehicles: Vec<Detection> = self
            .detector
            .detect(&frame)?
            .into_iter()
            .filter(|d| VehicleClass::from_class_id(d.class_id).is_some())
            .collect();

        if let Err(e) = draw_detections(&mut frame, &vehicles) {
            debug!("Detection overlay skipped: {}", e);
        }
        Ok((frame, vehicles.len() as VehicleCount))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::vehicle_detector::BoundingBox;
    use image::Rgb;

    struct Fixed(Result<Vec<u32>, String>);

    impl Detector for Fixed {
        fn detect(&mut self, _frame: &RgbImage) -> Result<Vec<Detection>, FrameError> {
            match &self.0 {
                Ok(classes) => Ok(classes
                    .iter()
                    .map(|&class_id| Detection {
                        class_id,
                        confidence: 0.5,
                        bbox: BoundingBox {
                            x: 2.0,
                            y: 2.0,
                            width: 6.0,
                            height: 6.0,
                        },
                    })
                    .collect()),
                Err(reason) => Err(FrameError::Detection(reason.clone())),
            }
        }
    }

    #[test]
    fn counts_only_vehicle_classes() {
        // person, car, bicycle, bus, truck, motorcycle, traffic light
        let mut counter = LaneCounter::new(Box::new(Fixed(Ok(vec![0, 2, 1, 5, 7, 3, 9]))));
        let (_, count) = counter.count(RgbImage::new(32, 32)).unwrap();
        assert_eq!(count, 4);
    }

    #[test]
    fn empty_frame_counts_zero_and_is_unchanged() {
        let mut counter = LaneCounter::new(Box::new(Fixed(Ok(vec![]))));
        let frame = RgbImage::from_pixel(16, 16, Rgb([9, 9, 9]));
        let (annotated, count) = counter.count(frame.clone()).unwrap();
        assert_eq!(count, 0);
        assert_eq!(annotated, frame);
    }

    #[test]
    fn non_vehicles_are_not_drawn() {
        let mut counter = LaneCounter::new(Box::new(Fixed(Ok(vec![0, 1]))));
        let frame = RgbImage::from_pixel(16, 16, Rgb([9, 9, 9]));
        let (annotated, count) = counter.count(frame.clone()).unwrap();
        assert_eq!(count, 0);
        assert_eq!(annotated, frame);
    }

    #[test]
    fn detector_failure_is_reported() {
        let mut counter = LaneCounter::new(Box::new(Fixed(Err("inference".into()))));
        assert!(matches!(
            counter.count(RgbImage::new(8, 8)),
            Err(FrameError::Detection(_))
        ));
    }
}
