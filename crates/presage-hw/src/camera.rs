//! V4L2 camera capture via the `v4l` crate.

use std::path::{Path, PathBuf};

use presage_vision::{Frame, FrameSource, SourceError};
use thiserror::Error;
use v4l::buffer::Type as BufType;
use v4l::io::traits::CaptureStream;
use v4l::prelude::*;
use v4l::video::Capture;
use v4l::FourCC;

use crate::convert;

/// Buffers mapped per capture stream.
const STREAM_BUFFERS: u32 = 2;

#[derive(Error, Debug)]
pub enum CameraError {
    #[error("device not found: {0}")]
    DeviceNotFound(String),
    #[error("device busy")]
    DeviceBusy,
    #[error("capture failed: {0}")]
    CaptureFailed(String),
    #[error("format negotiation failed: {0}")]
    FormatNegotiationFailed(String),
    #[error("streaming not supported")]
    StreamingNotSupported,
}

/// How to open and size the capture device.
#[derive(Debug, Clone)]
pub struct CaptureConfig {
    pub device: PathBuf,
    pub width: u32,
    pub height: u32,
    /// Frames read and discarded after open so auto-exposure can settle.
    pub warmup_frames: u32,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            device: PathBuf::from("/dev/video0"),
            width: 640,
            height: 480,
            warmup_frames: 3,
        }
    }
}

/// Negotiated pixel format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PixelFormat {
    /// YUYV 4:2:2 packed (2 bytes/pixel, extract the Y channel).
    Yuyv,
    /// 8-bit grayscale (1 byte/pixel, common for IR cameras).
    Grey,
}

/// Info about a discovered V4L2 capture device.
#[derive(Debug, Clone)]
pub struct DeviceInfo {
    pub path: PathBuf,
    pub card: String,
    pub driver: String,
}

/// V4L2 camera handle. Frames are pulled one at a time through a short
/// mmap stream; `stop` releases the device and later reads fail.
pub struct Camera {
    device: Option<Device>,
    width: u32,
    height: u32,
    pixel_format: PixelFormat,
}

impl Camera {
    pub fn open(config: &CaptureConfig) -> Result<Self, CameraError> {
        let path = config.device.as_path();
        if !path.exists() {
            return Err(CameraError::DeviceNotFound(path.display().to_string()));
        }

        let device = Device::with_path(path).map_err(|e| {
            if e.to_string().contains("busy") || e.to_string().contains("EBUSY") {
                CameraError::DeviceBusy
            } else {
                CameraError::DeviceNotFound(format!("{}: {e}", path.display()))
            }
        })?;

        let caps = device.query_caps().map_err(|e| {
            CameraError::CaptureFailed(format!("failed to query capabilities: {e}"))
        })?;

        tracing::info!(
            device = %path.display(),
            driver = %caps.driver,
            card = %caps.card,
            "opened camera"
        );

        if !caps.capabilities.contains(v4l::capability::Flags::VIDEO_CAPTURE) {
            return Err(CameraError::StreamingNotSupported);
        }

        // Request YUYV at the configured size; if the driver negotiates
        // GREY instead (IR cameras do), accept it.
        let mut fmt = device.format().map_err(|e| {
            CameraError::FormatNegotiationFailed(format!("failed to get format: {e}"))
        })?;
        fmt.fourcc = FourCC::new(b"YUYV");
        fmt.width = config.width;
        fmt.height = config.height;

        let negotiated = device.set_format(&fmt).map_err(|e| {
            CameraError::FormatNegotiationFailed(format!("failed to set format: {e}"))
        })?;

        let pixel_format = if negotiated.fourcc == FourCC::new(b"GREY") {
            PixelFormat::Grey
        } else if negotiated.fourcc == FourCC::new(b"YUYV") {
            PixelFormat::Yuyv
        } else {
            return Err(CameraError::FormatNegotiationFailed(format!(
                "unsupported pixel format: {:?} (need YUYV or GREY)",
                negotiated.fourcc
            )));
        };

        tracing::info!(
            width = negotiated.width,
            height = negotiated.height,
            fourcc = ?negotiated.fourcc,
            "negotiated format"
        );

        let mut camera = Self {
            device: Some(device),
            width: negotiated.width,
            height: negotiated.height,
            pixel_format,
        };
        camera.warm_up(config.warmup_frames);
        Ok(camera)
    }

    /// Read and discard frames so the sensor can settle. Failures here are
    /// not fatal; the caller's first real read decides.
    fn warm_up(&mut self, frames: u32) {
        for n in 0..frames {
            match self.read() {
                Ok(Some(_)) => {}
                Ok(None) => tracing::warn!(frame = n, "warm-up read returned no frame"),
                Err(err) => {
                    tracing::warn!(frame = n, error = %err, "warm-up read failed");
                    break;
                }
            }
        }
    }

    fn grab(
        device: &Device,
        width: u32,
        height: u32,
        pixel_format: PixelFormat,
    ) -> Result<Option<Frame>, CameraError> {
        let mut stream = MmapStream::with_buffers(device, BufType::VideoCapture, STREAM_BUFFERS)
            .map_err(|e| CameraError::CaptureFailed(format!("failed to create mmap stream: {e}")))?;

        let (buf, meta) = stream
            .next()
            .map_err(|e| CameraError::CaptureFailed(format!("failed to dequeue buffer: {e}")))?;
        if buf.is_empty() {
            return Ok(None);
        }

        let data = match pixel_format {
            PixelFormat::Grey => convert::grey_to_grayscale(buf, width, height),
            PixelFormat::Yuyv => convert::yuyv_to_grayscale(buf, width, height),
        }
        .map_err(|e| CameraError::CaptureFailed(format!("conversion failed: {e}")))?;

        tracing::debug!(seq = meta.sequence, "captured frame");
        Ok(Some(Frame::new(data, width, height)))
    }
}

impl FrameSource for Camera {
    fn read(&mut self) -> Result<Option<Frame>, SourceError> {
        let Some(device) = self.device.as_ref() else {
            return Err(SourceError::Stopped);
        };
        Self::grab(device, self.width, self.height, self.pixel_format)
            .map_err(|e| SourceError::Capture(e.to_string()))
    }

    fn stop(&mut self) {
        if self.device.take().is_some() {
            tracing::info!("camera released");
        }
    }
}

/// List available V4L2 video capture devices.
pub fn list_devices() -> Vec<DeviceInfo> {
    let mut devices = Vec::new();

    for i in 0..16 {
        let path = format!("/dev/video{i}");
        if !Path::new(&path).exists() {
            continue;
        }
        let Ok(dev) = Device::with_path(&path) else {
            continue;
        };
        let Ok(caps) = dev.query_caps() else {
            continue;
        };
        if !caps.capabilities.contains(v4l::capability::Flags::VIDEO_CAPTURE) {
            continue;
        }
        devices.push(DeviceInfo {
            path: PathBuf::from(path),
            card: caps.card.clone(),
            driver: caps.driver.clone(),
        });
    }

    devices
}
