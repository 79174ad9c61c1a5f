use iced::Color;

/// Circumference of the 40-unit gauge ring.
pub const RING_LENGTH: f32 = 251.2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Band {
    Good,
    Warn,
    Critical,
}

impl Band {
    pub fn from_percentage(percentage: u8) -> Self {
        if percentage >= 80 {
            Band::Good
        } else if percentage >= 60 {
            Band::Warn
        } else {
            Band::Critical
        }
    }

    pub fn color(self) -> Color {
        match self {
            Band::Good => Color::from_rgb8(0x22, 0xc5, 0x5e),
            Band::Warn => Color::from_rgb8(0xea, 0xb3, 0x08),
            Band::Critical => Color::from_rgb8(0xef, 0x44, 0x44),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GaugeReading {
    pub percentage: u8,
    pub band: Band,
}

impl GaugeReading {
    /// Length of the filled arc on the ring.
    pub fn arc_length(&self) -> f32 {
        RING_LENGTH * self.percentage as f32 / 100.0
    }
}

/// Map a normalized health value to a percentage and band.
pub fn render(value: f64) -> GaugeReading {
    let clamped = if value.is_nan() { 0.0 } else { value.clamp(0.0, 1.0) };
    let percentage = (clamped * 100.0).round() as u8;

    GaugeReading {
        percentage,
        band: Band::from_percentage(percentage),
    }
}
