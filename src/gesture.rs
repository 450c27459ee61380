use crate::{
    config::GestureConfig,
    types::{BodyPoint, GestureReading, LandmarkFrame, Lane, Posture},
};

pub struct GestureClassifier {
    hands_joined_threshold_px: i32,
}

impl GestureClassifier {
    pub fn new(config: &GestureConfig) -> Self {
        Self {
            hands_joined_threshold_px: config.hands_joined_threshold_px,
        }
    }

    pub fn classify(&self, landmarks: &LandmarkFrame) -> GestureReading {
        let distance = wrist_distance(landmarks);
        let hands_joined = distance
            .map(|d| hands_joined(d, self.hands_joined_threshold_px))
            .unwrap_or(false);

        GestureReading {
            hands_joined,
            distance,
            lane: classify_lane(landmarks),
            posture: classify_posture(landmarks),
        }
    }
}

/// Strictly below the threshold counts as joined.
pub fn hands_joined(distance: i32, threshold: i32) -> bool {
    distance < threshold
}

pub fn wrist_distance(landmarks: &LandmarkFrame) -> Option<i32> {
    let (lx, ly) = landmarks.pixel(BodyPoint::LeftWrist)?;
    let (rx, ry) = landmarks.pixel(BodyPoint::RightWrist)?;
    Some((lx - rx).hypot(ly - ry) as i32)
}

/// Shoulder midpoint height in pixels. Captured once per session as the
/// calibration reference.
pub fn shoulder_mid_y(landmarks: &LandmarkFrame) -> Option<i32> {
    let (_, left) = landmarks.pixel_i32(BodyPoint::LeftShoulder)?;
    let (_, right) = landmarks.pixel_i32(BodyPoint::RightShoulder)?;
    Some((left + right).abs() / 2)
}

// The frame is mirrored before detection, so the detector's right pinky sits on
// the player's left side of the image.
pub fn classify_lane(landmarks: &LandmarkFrame) -> Option<Lane> {
    let (left_side_x, _) = landmarks.pixel_i32(BodyPoint::RightPinky)?;
    let (right_side_x, _) = landmarks.pixel_i32(BodyPoint::LeftPinky)?;
    let (right_shoulder_x, _) = landmarks.pixel_i32(BodyPoint::RightShoulder)?;
    let (left_shoulder_x, _) = landmarks.pixel_i32(BodyPoint::LeftShoulder)?;

    let lane = if right_side_x <= right_shoulder_x || left_side_x <= right_shoulder_x {
        Lane::Left
    } else if right_side_x >= left_shoulder_x || left_side_x >= left_shoulder_x {
        Lane::Right
    } else {
        Lane::Center
    };
    Some(lane)
}

pub fn classify_posture(landmarks: &LandmarkFrame) -> Option<Posture> {
    let shoulder_mid = shoulder_mid_y(landmarks)? as f32;
    let elbow_mid = mid_y(landmarks, BodyPoint::LeftElbow, BodyPoint::RightElbow)?;
    let pinky_mid = mid_y(landmarks, BodyPoint::LeftPinky, BodyPoint::RightPinky)?;

    // Jump is tested first and wins over a degenerate crouch reading.
    let posture = if pinky_mid < shoulder_mid {
        Posture::Jump
    } else if pinky_mid > elbow_mid {
        Posture::Crouch
    } else {
        Posture::Stand
    };
    Some(posture)
}

fn mid_y(landmarks: &LandmarkFrame, a: BodyPoint, b: BodyPoint) -> Option<f32> {
    let (_, ay) = landmarks.pixel_i32(a)?;
    let (_, by) = landmarks.pixel_i32(b)?;
    Some((ay + by) as f32 / 2.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    // Power-of-two frame size keeps normalized coordinates exact.
    const W: u32 = 1024;
    const H: u32 = 1024;

    fn px(v: i32) -> f32 {
        v as f32 / 1024.0
    }

    fn body(pinky_left: (i32, i32), pinky_right: (i32, i32)) -> LandmarkFrame {
        LandmarkFrame::new(W, H)
            .with_point(BodyPoint::LeftShoulder, px(600), px(300))
            .with_point(BodyPoint::RightShoulder, px(400), px(300))
            .with_point(BodyPoint::LeftElbow, px(650), px(500))
            .with_point(BodyPoint::RightElbow, px(350), px(500))
            .with_point(BodyPoint::LeftWrist, px(650), px(450))
            .with_point(BodyPoint::RightWrist, px(350), px(450))
            .with_point(BodyPoint::LeftPinky, px(pinky_left.0), px(pinky_left.1))
            .with_point(BodyPoint::RightPinky, px(pinky_right.0), px(pinky_right.1))
    }

    #[test]
    fn hands_joined_is_strictly_below_threshold() {
        assert!(hands_joined(0, 130));
        assert!(hands_joined(129, 130));
        assert!(!hands_joined(130, 130));
        assert!(!hands_joined(500, 130));
    }

    #[test]
    fn classifier_measures_wrist_distance_in_pixels() {
        let frame = LandmarkFrame::new(W, H)
            .with_point(BodyPoint::LeftWrist, px(500), px(500))
            .with_point(BodyPoint::RightWrist, px(530), px(540));
        let classifier = GestureClassifier::new(&GestureConfig::default());
        let reading = classifier.classify(&frame);
        assert_eq!(reading.distance, Some(50));
        assert!(reading.hands_joined);
    }

    #[test]
    fn missing_wrists_fail_closed() {
        let frame = LandmarkFrame::new(W, H).with_point(BodyPoint::LeftWrist, 0.5, 0.5);
        let classifier = GestureClassifier::new(&GestureConfig::default());
        let reading = classifier.classify(&frame);
        assert_eq!(reading.distance, None);
        assert!(!reading.hands_joined);
        assert_eq!(reading.lane, None);
        assert_eq!(reading.posture, None);
    }

    #[test]
    fn pinkies_between_shoulders_is_center() {
        let frame = body((550, 400), (450, 400));
        assert_eq!(classify_lane(&frame), Some(Lane::Center));
    }

    #[test]
    fn pinky_reaching_right_shoulder_x_is_left() {
        // Exactly on the shoulder x counts.
        let frame = body((550, 400), (400, 400));
        assert_eq!(classify_lane(&frame), Some(Lane::Left));
        let frame = body((380, 400), (450, 400));
        assert_eq!(classify_lane(&frame), Some(Lane::Left));
    }

    #[test]
    fn pinky_reaching_left_shoulder_x_is_right() {
        let frame = body((600, 400), (450, 400));
        assert_eq!(classify_lane(&frame), Some(Lane::Right));
        let frame = body((550, 400), (640, 400));
        assert_eq!(classify_lane(&frame), Some(Lane::Right));
    }

    #[test]
    fn left_wins_when_both_lane_conditions_hold() {
        // Arms crossed wide: one pinky past each shoulder.
        let frame = body((700, 400), (300, 400));
        assert_eq!(classify_lane(&frame), Some(Lane::Left));
    }

    #[test]
    fn posture_follows_hand_height() {
        assert_eq!(classify_posture(&body((550, 250), (450, 250))), Some(Posture::Jump));
        assert_eq!(classify_posture(&body((550, 400), (450, 400))), Some(Posture::Stand));
        assert_eq!(classify_posture(&body((550, 600), (450, 600))), Some(Posture::Crouch));
    }

    #[test]
    fn posture_boundaries_are_strict() {
        // Hands exactly at shoulder height or exactly at elbow height stand.
        assert_eq!(classify_posture(&body((550, 300), (450, 300))), Some(Posture::Stand));
        assert_eq!(classify_posture(&body((550, 500), (450, 500))), Some(Posture::Stand));
    }

    #[test]
    fn jump_takes_precedence_over_crouch() {
        // Degenerate landmarks: elbows above shoulders, hands between.
        let frame = LandmarkFrame::new(W, H)
            .with_point(BodyPoint::LeftShoulder, px(600), px(300))
            .with_point(BodyPoint::RightShoulder, px(400), px(300))
            .with_point(BodyPoint::LeftElbow, px(650), px(100))
            .with_point(BodyPoint::RightElbow, px(350), px(100))
            .with_point(BodyPoint::LeftPinky, px(550), px(200))
            .with_point(BodyPoint::RightPinky, px(450), px(200));
        assert_eq!(classify_posture(&frame), Some(Posture::Jump));
    }

    #[test]
    fn shoulder_mid_uses_integer_pixels() {
        let frame = LandmarkFrame::new(W, H)
            .with_point(BodyPoint::LeftShoulder, px(600), px(301))
            .with_point(BodyPoint::RightShoulder, px(400), px(302));
        assert_eq!(shoulder_mid_y(&frame), Some(301));
    }
}
