//! Audio I/O collaborators: WAV files and live devices.
//!
//! - `wav` - mono f32 WAV read/write (hound)
//! - `device` - cpal input/output streams (feature `device`)

pub mod wav;

#[cfg(feature = "device")]
pub mod device;

pub use wav::{decode_wav, encode_wav, read_wav, write_wav};

#[cfg(feature = "device")]
pub use device::{list_devices, DeviceDirection, DeviceInfo, DeviceStream, StreamEvent};
