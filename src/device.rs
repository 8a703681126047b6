/// Controller discovery: VID/PID matching, link detection, and opening the first
/// supported pad found at startup. The chosen device is kept for the session;
/// there is no re-detection.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerKind {
    /// DualSense and DualSense Edge share the output report layout.
    DualSense,
    /// DualShock 4, both revisions.
    Ds4,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Link {
    Usb,
    Bluetooth,
}

const SONY_VID: u16 = 0x054C;

/// HID usage page / usage of the gamepad collection.
pub const GAMEPAD_USAGE_PAGE: u16 = 0x01;
pub const GAMEPAD_USAGE: u16 = 0x05;

/// Identify a supported controller from VID/PID.
pub fn identify(vid: u16, pid: u16) -> Option<ControllerKind> {
    if vid != SONY_VID {
        return None;
    }
    match pid {
        0x0CE6 | 0x0DF2 => Some(ControllerKind::DualSense),
        0x05C4 | 0x09CC => Some(ControllerKind::Ds4),
        _ => None,
    }
}

/// Bluetooth HID paths carry the Bluetooth HID service GUID or the `&0005` bus tag.
pub fn detect_link(path: &str) -> Link {
    let lower = path.to_ascii_lowercase();
    if lower.contains("{00001124") || lower.contains("&0005") {
        Link::Bluetooth
    } else {
        Link::Usb
    }
}

impl std::fmt::Display for ControllerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ControllerKind::DualSense => f.write_str("DualSense"),
            ControllerKind::Ds4 => f.write_str("DualShock 4"),
        }
    }
}

impl std::fmt::Display for Link {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Link::Usb => f.write_str("USB"),
            Link::Bluetooth => f.write_str("Bluetooth"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ControllerInfo {
    pub kind: ControllerKind,
    pub link: Link,
    pub path: String,
}

/// First 60 characters of a device path, for log lines.
pub fn path_preview(path: &str) -> String {
    path.chars().take(60).collect()
}

#[cfg(windows)]
pub use hid::{find_first, open};

#[cfg(windows)]
mod hid {
    use super::{detect_link, identify, path_preview, ControllerInfo, ControllerKind, Link, GAMEPAD_USAGE, GAMEPAD_USAGE_PAGE};
    use crate::error::{Result, RumbleError};
    use hidapi::{HidApi, HidDevice};

    /// First supported controller in enumeration order.
    pub fn find_first(api: &HidApi) -> Option<ControllerInfo> {
        api.device_list()
            .filter(|dev| dev.usage_page() == GAMEPAD_USAGE_PAGE && dev.usage() == GAMEPAD_USAGE)
            .find_map(|dev| {
                let kind = identify(dev.vendor_id(), dev.product_id())?;
                let path = dev.path().to_string_lossy().to_string();
                let link = detect_link(&path);
                log::info!("Found {kind} ({link}) at {}", path_preview(&path));
                Some(ControllerInfo { kind, link, path })
            })
    }

    /// Open the device. Bluetooth pads only accept full output reports after a
    /// feature-report read switches them to extended mode.
    pub fn open(api: &HidApi, info: &ControllerInfo) -> Result<HidDevice> {
        let cpath = std::ffi::CString::new(info.path.as_bytes())
            .map_err(|_| RumbleError::invalid("device path contains a NUL byte"))?;
        let device = api.open_path(&cpath)?;
        if info.link == Link::Bluetooth {
            let report_id = match info.kind {
                ControllerKind::DualSense => 0x05,
                ControllerKind::Ds4 => 0x02,
            };
            let mut buf = [0u8; 64];
            buf[0] = report_id;
            match device.get_feature_report(&mut buf) {
                Ok(_) => log::info!("Bluetooth extended mode enabled (feature report 0x{report_id:02X})"),
                Err(e) => log::warn!("Failed to enable Bluetooth extended mode: {e}"),
            }
        }
        Ok(device)
    }
}
