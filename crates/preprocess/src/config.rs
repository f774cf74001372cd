pub const DEFAULT_INPUT_SIZE: (u32, u32) = (640, 640);
pub const LETTERBOX_COLOR: [u8; 3] = [114, 114, 114];

/// Per-channel normalization applied as `(pixel / 255 - mean[c]) / std[c]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Normalization {
    pub mean: [f32; 3],
    pub std: [f32; 3],
}

impl Normalization {
    pub const IMAGENET: Normalization = Normalization {
        mean: [0.485, 0.456, 0.406],
        std: [0.229, 0.224, 0.225],
    };
}

/// How a classification input is fitted to the target size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResizeMode {
    #[default]
    Stretch,
    CenterCrop,
}

impl std::str::FromStr for ResizeMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "stretch" => Ok(ResizeMode::Stretch),
            "center-crop" | "center_crop" | "crop" => Ok(ResizeMode::CenterCrop),
            other => Err(format!("unknown resize mode {other:?}")),
        }
    }
}

/// Channel order the model expects in its input tensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ColorOrder {
    #[default]
    Rgb,
    Bgr,
}

impl ColorOrder {
    /// Index of the decoded RGB component written to output channel `c`.
    pub fn source_channel(self, c: usize) -> usize {
        match self {
            ColorOrder::Rgb => c,
            ColorOrder::Bgr => 2 - c,
        }
    }
}

impl std::str::FromStr for ColorOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "rgb" => Ok(ColorOrder::Rgb),
            "bgr" => Ok(ColorOrder::Bgr),
            other => Err(format!("unknown color order {other:?}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PreprocessConfig {
    pub input_size: (u32, u32),
    /// `None` means scale-only (`pixel / 255`).
    pub normalization: Option<Normalization>,
    pub pad_color: [u8; 3],
    pub resize_mode: ResizeMode,
    pub color_order: ColorOrder,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            input_size: DEFAULT_INPUT_SIZE,
            normalization: None,
            pad_color: LETTERBOX_COLOR,
            resize_mode: ResizeMode::Stretch,
            color_order: ColorOrder::Rgb,
        }
    }
}
