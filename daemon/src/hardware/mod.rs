//! Device hardware: moisture sensor sampling and the master mixer

mod moisture;
mod volume;

pub use moisture::{median, MoistureMeter, MoistureSensor, Sampling, SensorError};
pub use volume::{AmixerVolume, VolumeControl, VolumeError};

#[cfg(test)]
pub(crate) use moisture::tests as moisture_fakes;
#[cfg(test)]
pub(crate) use volume::tests as volume_fakes;
