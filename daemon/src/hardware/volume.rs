//! Master output volume through the ALSA mixer

use std::process::Command;

use tracing::{debug, info};

pub const VOLUME_STEP: u8 = 10;
const INITIAL_VOLUME: u8 = 70;

#[derive(Debug, thiserror::Error)]
pub enum VolumeError {
    #[error("failed to run amixer: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("amixer exited with {status}: {stderr}")]
    Mixer { status: String, stderr: String },
}

/// A system-wide volume knob, 0..=100
pub trait VolumeControl: Send {
    fn volume(&self) -> u8;

    fn set_volume(&mut self, volume: u8) -> Result<(), VolumeError>;

    fn volume_up(&mut self) -> Result<u8, VolumeError> {
        let target = self.volume().saturating_add(VOLUME_STEP).min(100);
        self.set_volume(target)?;
        Ok(target)
    }

    fn volume_down(&mut self) -> Result<u8, VolumeError> {
        let target = self.volume().saturating_sub(VOLUME_STEP);
        self.set_volume(target)?;
        Ok(target)
    }
}

/// Drives the `Master` control with `amixer`
pub struct AmixerVolume {
    control: String,
    current: u8,
}

impl AmixerVolume {
    /// Open the mixer and set the startup volume
    pub fn open(control: &str) -> Result<Self, VolumeError> {
        let mut mixer = Self {
            control: control.to_string(),
            current: INITIAL_VOLUME,
        };
        mixer.set_volume(INITIAL_VOLUME)?;
        info!(control, volume = INITIAL_VOLUME, "mixer ready");
        Ok(mixer)
    }
}

impl VolumeControl for AmixerVolume {
    fn volume(&self) -> u8 {
        self.current
    }

    fn set_volume(&mut self, volume: u8) -> Result<(), VolumeError> {
        let volume = volume.min(100);
        let output = Command::new("amixer")
            .args(["-q", "sset", &self.control, &format!("{volume}%")])
            .output()?;

        if !output.status.success() {
            return Err(VolumeError::Mixer {
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        debug!(control = %self.control, volume, "master volume set");
        self.current = volume;
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// In-memory knob
    pub(crate) struct FixedMixer(pub u8);

    impl VolumeControl for FixedMixer {
        fn volume(&self) -> u8 {
            self.0
        }

        fn set_volume(&mut self, volume: u8) -> Result<(), VolumeError> {
            self.0 = volume;
            Ok(())
        }
    }

    #[test]
    fn test_steps_are_clamped() {
        let mut mixer = FixedMixer(95);
        assert_eq!(mixer.volume_up().unwrap(), 100);
        assert_eq!(mixer.volume_up().unwrap(), 100);

        let mut mixer = FixedMixer(5);
        assert_eq!(mixer.volume_down().unwrap(), 0);
        assert_eq!(mixer.volume_down().unwrap(), 0);
    }

    #[test]
    fn test_default_step() {
        let mut mixer = FixedMixer(70);
        assert_eq!(mixer.volume_up().unwrap(), 80);
        assert_eq!(mixer.volume_down().unwrap(), 70);
    }
}
