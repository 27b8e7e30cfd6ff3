//! Animation clips and channels

/// Animated property of a joint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelType {
    Translation,
    Rotation,
    Scale,
    /// Morph target weights
    Weights,
}

impl ChannelType {
    /// Floats per sample value
    pub fn components(self) -> usize {
        match self {
            Self::Translation | Self::Scale => 3,
            Self::Rotation => 4,
            Self::Weights => 1,
        }
    }
}

/// How values between keyframes are reconstructed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Interpolation {
    Linear,
    Step,
    /// Cubic Hermite; data holds (in-tangent, value, out-tangent) per keyframe
    CubicSpline,
}

/// One animated property stream for one joint
#[derive(Debug, Clone, PartialEq)]
pub struct Channel {
    pub kind: ChannelType,
    pub interpolation: Interpolation,
    pub joint_index: usize,
    /// Keyframe times in seconds, non-decreasing
    pub timestamps: Vec<f32>,
    /// Flat sample buffer
    pub data: Vec<f32>,
}

impl Channel {
    /// Floats per sample value for this channel
    ///
    /// Weights channels carry as many components as the data allows.
    pub fn components(&self) -> usize {
        match self.kind {
            ChannelType::Weights => {
                let per_key = self.data.len() / self.timestamps.len().max(1);
                if self.interpolation == Interpolation::CubicSpline {
                    (per_key / 3).max(1)
                } else {
                    per_key.max(1)
                }
            }
            kind => kind.components(),
        }
    }

    /// Expected `data.len()` for the timestamp count
    pub fn expected_data_len(&self) -> usize {
        let per_key = self.components()
            * if self.interpolation == Interpolation::CubicSpline {
                3
            } else {
                1
            };
        self.timestamps.len() * per_key
    }

    /// Check the data length invariant and timestamp ordering
    pub fn validate(&self) -> Result<(), String> {
        if self.timestamps.is_empty() {
            return Err("channel has no keyframes".to_string());
        }
        if self.data.len() != self.expected_data_len() {
            return Err(format!(
                "{:?} channel has {} floats for {} keyframes, expected {}",
                self.kind,
                self.data.len(),
                self.timestamps.len(),
                self.expected_data_len()
            ));
        }
        if self.timestamps.windows(2).any(|w| w[1] < w[0]) {
            return Err("timestamps are not sorted".to_string());
        }
        Ok(())
    }

    /// Value (not tangent) of keyframe `key`, `None` past the stored data
    pub fn value(&self, key: usize) -> Option<&[f32]> {
        let c = self.components();
        let slot = if self.interpolation == Interpolation::CubicSpline {
            key.checked_mul(3)?.checked_add(1)?
        } else {
            key
        };
        let start = slot.checked_mul(c)?;
        self.data.get(start..start.checked_add(c)?)
    }

    pub fn end_time(&self) -> f32 {
        self.timestamps.last().copied().unwrap_or(0.0)
    }
}

/// Named animation clip
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Animation {
    pub name: String,
    pub channels: Vec<Channel>,
}

impl Animation {
    /// Time of the last keyframe over all channels
    pub fn duration(&self) -> f32 {
        self.channels
            .iter()
            .map(Channel::end_time)
            .fold(0.0, f32::max)
    }
}
