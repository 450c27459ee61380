#[derive(Clone, Debug)]
pub struct Frame {
    pub rgb: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl Frame {
    /// A frame that carries only its dimensions, used by sources that never
    /// see pixels (replayed landmark recordings).
    pub fn empty(width: u32, height: u32) -> Self {
        Self {
            rgb: Vec::new(),
            width,
            height,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BodyPoint {
    LeftShoulder,
    RightShoulder,
    LeftElbow,
    RightElbow,
    LeftWrist,
    RightWrist,
    LeftPinky,
    RightPinky,
}

impl BodyPoint {
    pub const COUNT: usize = 8;

    pub const ALL: [BodyPoint; Self::COUNT] = [
        BodyPoint::LeftShoulder,
        BodyPoint::RightShoulder,
        BodyPoint::LeftElbow,
        BodyPoint::RightElbow,
        BodyPoint::LeftWrist,
        BodyPoint::RightWrist,
        BodyPoint::LeftPinky,
        BodyPoint::RightPinky,
    ];

    fn slot(self) -> usize {
        match self {
            BodyPoint::LeftShoulder => 0,
            BodyPoint::RightShoulder => 1,
            BodyPoint::LeftElbow => 2,
            BodyPoint::RightElbow => 3,
            BodyPoint::LeftWrist => 4,
            BodyPoint::RightWrist => 5,
            BodyPoint::LeftPinky => 6,
            BodyPoint::RightPinky => 7,
        }
    }

    /// Index of this point in the 33-point MediaPipe pose layout.
    pub fn mediapipe_index(self) -> usize {
        match self {
            BodyPoint::LeftShoulder => 11,
            BodyPoint::RightShoulder => 12,
            BodyPoint::LeftElbow => 13,
            BodyPoint::RightElbow => 14,
            BodyPoint::LeftWrist => 15,
            BodyPoint::RightWrist => 16,
            BodyPoint::LeftPinky => 17,
            BodyPoint::RightPinky => 18,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct LandmarkFrame {
    points: [Option<(f32, f32)>; BodyPoint::COUNT],
    pub width: u32,
    pub height: u32,
}

impl LandmarkFrame {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            points: [None; BodyPoint::COUNT],
            width,
            height,
        }
    }

    pub fn with_point(mut self, point: BodyPoint, x: f32, y: f32) -> Self {
        self.set(point, x, y);
        self
    }

    pub fn set(&mut self, point: BodyPoint, x: f32, y: f32) {
        self.points[point.slot()] = Some((x, y));
    }

    pub fn get(&self, point: BodyPoint) -> Option<(f32, f32)> {
        self.points[point.slot()]
    }

    pub fn from_mediapipe(landmarks: &[[f32; 2]], width: u32, height: u32) -> Self {
        let mut frame = Self::new(width, height);
        for point in BodyPoint::ALL {
            if let Some([x, y]) = landmarks.get(point.mediapipe_index()) {
                frame.set(point, *x, *y);
            }
        }
        frame
    }

    pub fn pixel(&self, point: BodyPoint) -> Option<(f32, f32)> {
        self.get(point)
            .map(|(x, y)| (x * self.width as f32, y * self.height as f32))
    }

    pub fn pixel_i32(&self, point: BodyPoint) -> Option<(i32, i32)> {
        self.pixel(point).map(|(x, y)| (x as i32, y as i32))
    }
}

#[derive(Clone, Debug)]
pub struct PoseFrame {
    pub frame: Frame,
    pub landmarks: Option<LandmarkFrame>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Lane {
    Left,
    Center,
    Right,
}

impl Lane {
    pub fn label(&self) -> &'static str {
        match self {
            Lane::Left => "Left",
            Lane::Center => "Center",
            Lane::Right => "Right",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Posture {
    Jump,
    Crouch,
    Stand,
}

impl Posture {
    pub fn label(&self) -> &'static str {
        match self {
            Posture::Jump => "Jumping",
            Posture::Crouch => "Crouching",
            Posture::Stand => "Standing",
        }
    }
}

/// Classifier output for one frame. `lane` and `posture` are `None` when the
/// landmarks they depend on are missing.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GestureReading {
    pub hands_joined: bool,
    pub distance: Option<i32>,
    pub lane: Option<Lane>,
    pub posture: Option<Posture>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Command {
    MoveLeft,
    MoveRight,
    Jump,
    Crouch,
    Resume,
    Click { x: i32, y: i32 },
}
