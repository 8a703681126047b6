/// Actuation sinks: where the blended intensity ends up.
///
/// Rumble-only output reports (both motors get the same strength):
///
/// DualSense USB: Report ID 0x02, 48 bytes
///   Byte 1: valid flag 0 (0x03 = compatible vibration + haptics select)
///   Byte 3: right motor, Byte 4: left motor
///
/// DualSense BT: Report ID 0x31, 78 bytes
///   Byte 1: fixed tag 0x02, then the USB layout shifted by +1
///   Last 4 bytes: CRC-32 (seed 0xA2)
///
/// DS4 USB: Report ID 0x05, 32 bytes
///   Byte 1: flags (0x01 = rumble)
///   Byte 4: right motor, Byte 5: left motor
///
/// DS4 BT: Report ID 0x11, 78 bytes
///   Byte 1: 0xC0 (HID output + CRC), Byte 3: 0xF1 (rumble)
///   Byte 6: right motor, Byte 7: left motor
///   Last 4 bytes: CRC-32 (seed 0xA2)

use crate::device::{ControllerKind, Link};
use crate::error::{Result, RumbleError};

/// Consumer of the final intensity, 0.0..=1.0.
pub trait RumbleSink: Send {
    fn set_intensity(&mut self, percent: f32) -> Result<()>;
}

/// No controller attached: every write reports `ActuationUnavailable`.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisconnectedSink;

impl RumbleSink for DisconnectedSink {
    fn set_intensity(&mut self, _percent: f32) -> Result<()> {
        Err(RumbleError::ActuationUnavailable)
    }
}

/// Scale 0..=1 to a motor byte.
pub fn motor_level(percent: f32) -> u8 {
    (percent.clamp(0.0, 1.0) * 255.0).round() as u8
}

const BT_OUTPUT_SEED: u8 = 0xA2;

pub fn rumble_report(kind: ControllerKind, link: Link, motor: u8) -> Vec<u8> {
    match (kind, link) {
        (ControllerKind::DualSense, Link::Usb) => {
            let mut buf = vec![0u8; 48];
            buf[0] = 0x02;
            buf[1] = 0x03;
            buf[3] = motor;
            buf[4] = motor;
            buf
        }
        (ControllerKind::DualSense, Link::Bluetooth) => {
            let mut buf = vec![0u8; 78];
            buf[0] = 0x31;
            buf[1] = 0x02;
            buf[2] = 0x03;
            buf[4] = motor;
            buf[5] = motor;
            stamp_crc(&mut buf);
            buf
        }
        (ControllerKind::Ds4, Link::Usb) => {
            let mut buf = vec![0u8; 32];
            buf[0] = 0x05;
            buf[1] = 0x01;
            buf[4] = motor;
            buf[5] = motor;
            buf
        }
        (ControllerKind::Ds4, Link::Bluetooth) => {
            let mut buf = vec![0u8; 78];
            buf[0] = 0x11;
            buf[1] = 0xC0;
            buf[3] = 0xF1;
            buf[6] = motor;
            buf[7] = motor;
            stamp_crc(&mut buf);
            buf
        }
    }
}

/// Reflected CRC-32 (poly 0xEDB88320).
fn crc32(bytes: impl IntoIterator<Item = u8>) -> u32 {
    let mut crc = !0u32;
    for byte in bytes {
        crc ^= u32::from(byte);
        for _ in 0..8 {
            crc = if crc & 1 != 0 { (crc >> 1) ^ 0xEDB8_8320 } else { crc >> 1 };
        }
    }
    !crc
}

/// Overwrite the last 4 bytes with the seeded CRC of everything before them.
fn stamp_crc(report: &mut [u8]) {
    let at = report.len() - 4;
    let crc = crc32(std::iter::once(BT_OUTPUT_SEED).chain(report[..at].iter().copied()));
    report[at..].copy_from_slice(&crc.to_le_bytes());
}

#[cfg(windows)]
pub struct HidSink {
    device: hidapi::HidDevice,
    kind: ControllerKind,
    link: Link,
}

#[cfg(windows)]
impl HidSink {
    pub fn new(device: hidapi::HidDevice, kind: ControllerKind, link: Link) -> Self {
        Self { device, kind, link }
    }
}

#[cfg(windows)]
impl RumbleSink for HidSink {
    fn set_intensity(&mut self, percent: f32) -> Result<()> {
        let report = rumble_report(self.kind, self.link, motor_level(percent));
        self.device.write(&report).map_err(|e| {
            log::debug!("HID write error (non-fatal): {e}");
            RumbleError::ActuationUnavailable
        })?;
        Ok(())
    }
}

/// Open the first supported controller, or fall back to a disconnected sink.
#[cfg(windows)]
pub fn connect(enabled: bool) -> Box<dyn RumbleSink> {
    use crate::device;

    if !enabled {
        log::info!("Controller output disabled by config");
        return Box::new(DisconnectedSink);
    }
    let api = match hidapi::HidApi::new() {
        Ok(api) => api,
        Err(e) => {
            log::error!("Failed to initialize HID API: {e}");
            return Box::new(DisconnectedSink);
        }
    };
    let Some(info) = device::find_first(&api) else {
        log::warn!("No supported controller found. Rumble output disabled for this session.");
        return Box::new(DisconnectedSink);
    };
    match device::open(&api, &info) {
        Ok(dev) => {
            log::info!("Rumble output: {} ({})", info.kind, info.link);
            Box::new(HidSink::new(dev, info.kind, info.link))
        }
        Err(e) => {
            log::warn!("Found controller but failed to open: {e}");
            Box::new(DisconnectedSink)
        }
    }
}

#[cfg(not(windows))]
pub fn connect(enabled: bool) -> Box<dyn RumbleSink> {
    if enabled {
        log::warn!("HID rumble output is only available on Windows. Rumble output disabled.");
    }
    Box::new(DisconnectedSink)
}

/// Test sink that keeps every value it receives.
#[cfg(test)]
#[derive(Debug, Default, Clone)]
pub(crate) struct RecordingSink {
    values: std::sync::Arc<std::sync::Mutex<Vec<f32>>>,
}

#[cfg(test)]
impl RecordingSink {
    pub(crate) fn values(&self) -> Vec<f32> {
        self.values.lock().unwrap().clone()
    }
}

#[cfg(test)]
impl RumbleSink for RecordingSink {
    fn set_intensity(&mut self, percent: f32) -> Result<()> {
        self.values.lock().unwrap().push(percent);
        Ok(())
    }
}
