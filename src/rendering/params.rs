use serde::{Deserialize, Serialize};

/// Output video parameters a worker renders against.
#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Debug, Default)]
pub struct VideoParams {
    pub width: u32,
    pub height: u32,
    pub frame_rate: f64,
}

impl VideoParams {
    pub fn new(width: u32, height: u32, frame_rate: f64) -> Self {
        Self {
            width,
            height,
            frame_rate,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.width > 0 && self.height > 0 && self.frame_rate > 0.0
    }
}

/// Output audio parameters a worker renders against.
#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Debug, Default)]
pub struct AudioParams {
    pub sample_rate: u32,
    pub channels: u16,
}

impl AudioParams {
    pub fn new(sample_rate: u32, channels: u16) -> Self {
        Self {
            sample_rate,
            channels,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.sample_rate > 0 && self.channels > 0
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Debug, Default)]
#[serde(rename_all = "lowercase")]
pub enum RenderMode {
    #[default]
    Online,
    Offline,
}

/// Device color transform applied on download, as a row-major 4x4 matrix.
#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Debug)]
pub struct ColorTransform(pub [[f64; 4]; 4]);

impl ColorTransform {
    pub fn identity() -> Self {
        let mut m = [[0.0; 4]; 4];
        for (i, row) in m.iter_mut().enumerate() {
            row[i] = 1.0;
        }
        Self(m)
    }
}

impl Default for ColorTransform {
    fn default() -> Self {
        Self::identity()
    }
}
