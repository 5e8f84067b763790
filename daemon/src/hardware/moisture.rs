//! Skin moisture sampling over a capacitive sensor
//!
//! The sensor exposes 16-bit registers; bit 0x0800 of the status register
//! signals an unread conversion on channel 0.

use std::time::Duration;

use tracing::{debug, warn};

const STATUS_REGISTER: u8 = 0x18;
const DATA_REGISTER: u8 = 0x00;
const UNREAD_CONVERSION: u16 = 0x0800;

#[derive(Debug, thiserror::Error)]
pub enum SensorError {
    #[error("sensor bus error: {0}")]
    Bus(String),

    #[error("no sample was ready after {polls} polls")]
    NotReady { polls: usize },
}

/// Register-level access to the sensor
pub trait MoistureSensor: Send {
    fn read_word(&mut self, register: u8) -> Result<u16, SensorError>;
}

/// Sampling parameters
#[derive(Debug, Clone)]
pub struct Sampling {
    pub max_count: usize,
    pub interval: Duration,
    /// Status polls allowed while waiting for one sample
    pub tolerance: usize,
}

impl Default for Sampling {
    fn default() -> Self {
        Self {
            max_count: 7,
            interval: Duration::from_millis(500),
            tolerance: 50,
        }
    }
}

/// Convert a raw data word into a moisture score (higher is wetter)
pub fn moisture_from_raw(word: u16) -> i32 {
    let water = word & 0xFF0F;
    let low = (water & 0x0F) << 12;
    let high = water >> 4;
    100 - i32::from((low | high) >> 4)
}

/// Middle element of the sorted samples
pub fn median(samples: &[i32]) -> Option<i32> {
    if samples.is_empty() {
        return None;
    }
    let mut sorted = samples.to_vec();
    sorted.sort_unstable();
    Some(sorted[sorted.len() / 2])
}

pub struct MoistureMeter {
    sensor: Box<dyn MoistureSensor>,
}

impl MoistureMeter {
    pub fn new(sensor: Box<dyn MoistureSensor>) -> Self {
        Self { sensor }
    }

    /// Collect up to `max_count` samples
    ///
    /// A sensor that stops producing conversions ends the run early with the
    /// samples gathered so far; a bus error before the first sample fails.
    pub fn measure(&mut self, sampling: &Sampling) -> Result<Vec<i32>, SensorError> {
        let mut samples = Vec::with_capacity(sampling.max_count);

        while samples.len() < sampling.max_count {
            match self.next_sample(sampling) {
                Ok(sample) => {
                    debug!(sample, "moisture sample");
                    samples.push(sample);
                    std::thread::sleep(sampling.interval);
                }
                Err(e) if samples.is_empty() => return Err(e),
                Err(e) => {
                    warn!(error = %e, collected = samples.len(), "moisture sampling cut short");
                    break;
                }
            }
        }

        Ok(samples)
    }

    fn next_sample(&mut self, sampling: &Sampling) -> Result<i32, SensorError> {
        let mut polls = 0;
        while self.sensor.read_word(STATUS_REGISTER)? & UNREAD_CONVERSION == 0 {
            polls += 1;
            if polls > sampling.tolerance {
                return Err(SensorError::NotReady { polls });
            }
            std::thread::sleep(sampling.interval);
        }
        Ok(moisture_from_raw(self.sensor.read_word(DATA_REGISTER)?))
    }
}
