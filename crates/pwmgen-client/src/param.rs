use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{GeneratorError, PayloadError, Result};

/// Waveform a channel generates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum WaveKind {
    /// Fixed duty cycle (`CST`).
    #[default]
    #[serde(rename = "CST", alias = "constant")]
    Constant,
    /// Sinusoidal variation around the average (`SIN`).
    #[serde(rename = "SIN", alias = "sinusoidal")]
    Sinusoidal,
    /// Triangular variation around the average (`TRI`).
    #[serde(rename = "TRI", alias = "triangular")]
    Triangular,
}

impl WaveKind {
    /// Wire token for this kind.
    pub fn as_token(self) -> &'static str {
        match self {
            Self::Constant => "CST",
            Self::Sinusoidal => "SIN",
            Self::Triangular => "TRI",
        }
    }

    fn describe(self) -> &'static str {
        match self {
            Self::Constant => "cst",
            Self::Sinusoidal => "sinusoidal",
            Self::Triangular => "triangular",
        }
    }
}

impl fmt::Display for WaveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_token())
    }
}

impl FromStr for WaveKind {
    type Err = PayloadError;

    fn from_str(token: &str) -> std::result::Result<Self, Self::Err> {
        match token {
            "CST" => Ok(Self::Constant),
            "SIN" => Ok(Self::Sinusoidal),
            "TRI" => Ok(Self::Triangular),
            other => Err(PayloadError::UnknownKind(other.to_string())),
        }
    }
}

/// Waveform parameters of one channel.
///
/// `average` and `amplitude` are duty-cycle fractions, `period` is in
/// seconds and `start` is the phase offset as a fraction of the period.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Param {
    #[serde(rename = "type", alias = "kind")]
    pub kind: WaveKind,
    pub average: f64,
    #[serde(default)]
    pub amplitude: f64,
    #[serde(default)]
    pub period: f64,
    #[serde(default)]
    pub start: f64,
}

impl Param {
    /// Constant duty cycle.
    pub fn constant(average: f64) -> Self {
        Self {
            kind: WaveKind::Constant,
            average,
            ..Self::default()
        }
    }

    /// Sinusoidal duty cycle.
    pub fn sinusoidal(average: f64, amplitude: f64, period: f64, start: f64) -> Self {
        Self {
            kind: WaveKind::Sinusoidal,
            average,
            amplitude,
            period,
            start,
        }
    }

    /// Triangular duty cycle.
    pub fn triangular(average: f64, amplitude: f64, period: f64, start: f64) -> Self {
        Self {
            kind: WaveKind::Triangular,
            average,
            amplitude,
            period,
            start,
        }
    }

    /// Check the parameters against the generator's acceptance rules.
    ///
    /// The device applies the same rules and rejects a whole set request
    /// if any channel fails; checking locally gives the same message
    /// without a round trip.
    pub fn validate(&self, channel: u32) -> Result<()> {
        let invalid = |reason: String| GeneratorError::InvalidParam { channel, reason };
        let name = self.kind.describe();

        for (field, value) in [
            ("average", self.average),
            ("amplitude", self.amplitude),
            ("period", self.period),
            ("start", self.start),
        ] {
            if !value.is_finite() {
                return Err(invalid(format!("expect a finite {field}, got {value}")));
            }
        }

        if !(0.0..=1.0).contains(&self.average) {
            return Err(invalid(format!(
                "expect average of {name} function to be in the range [0,1], got {:.6}",
                self.average
            )));
        }

        if self.kind == WaveKind::Constant {
            for (field, value) in [
                ("amplitude", self.amplitude),
                ("period", self.period),
                ("start", self.start),
            ] {
                if value != 0.0 {
                    return Err(invalid(format!(
                        "expect {field} of constant function to be 0"
                    )));
                }
            }
            return Ok(());
        }

        if self.amplitude == 0.0 {
            return Err(invalid(format!(
                "expect amplitude of {name} function to be different of 0"
            )));
        }
        let high = self.average + self.amplitude;
        if high > 1.0 {
            return Err(invalid(format!(
                "expect average+amplitude of {name} function to be <= 1, got {high:.6}"
            )));
        }
        let low = self.average - self.amplitude;
        if low < 0.0 {
            return Err(invalid(format!(
                "expect average-amplitude of {name} function to be >= 0, got {low:.6}"
            )));
        }
        if self.period <= 0.0 {
            return Err(invalid(format!(
                "expect period of {name} function to be > 0, got {:.6}",
                self.period
            )));
        }
        if !(0.0..1.0).contains(&self.start) {
            return Err(invalid(format!(
                "expect start of {name} function to be in the range [0,1[, got {:.6}",
                self.start
            )));
        }
        Ok(())
    }
}

impl fmt::Display for Param {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "type={} average={:.6} amplitude={:.6} period={:.6} start={:.6}",
            self.kind, self.average, self.amplitude, self.period, self.start
        )
    }
}
