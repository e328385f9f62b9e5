// src/framebuffer.rs

//! Frame sinks: where rendered frames end up.
//!
//! On the bench this is the Linux framebuffer the SBC scans out to the
//! projector's video input. The device is memory-mapped once and every frame
//! overwrites it in full.

use crate::color::{PackedPixel, BLACK};
use crate::config::{Config, SinkKind};
use crate::pattern::PatternBuffer;
use anyhow::{bail, Context, Result};
use nix::sys::mman::{mmap, munmap, MapFlags, ProtFlags};
use std::fs::{File, OpenOptions};
use std::num::NonZeroUsize;
use std::os::unix::io::AsRawFd;
use std::path::{Path, PathBuf};
use std::ptr::NonNull;

/// A display-sized destination for frames.
pub trait FrameSink: Send {
    /// Overwrites the whole display with `frame`. A frame of the wrong size is
    /// refused before anything is written.
    fn present(&mut self, frame: &PatternBuffer) -> Result<()>;

    /// Sets every pixel to `value`.
    fn fill(&mut self, value: PackedPixel) -> Result<()>;

    fn blank(&mut self) -> Result<()> {
        self.fill(BLACK)
    }
}

/// Opens the sink selected in `config`.
pub fn open(config: &Config) -> Result<Box<dyn FrameSink>> {
    let geometry = &config.geometry;
    let dims = (geometry.display_width, geometry.display_height);
    match config.output.sink {
        SinkKind::Framebuffer => Ok(Box::new(FbDevice::open(
            &config.output.framebuffer_device,
            dims,
        )?)),
        SinkKind::Discard => Ok(Box::new(DiscardSink::new(dims))),
    }
}

fn check_frame(frame: &PatternBuffer, dims: (usize, usize)) -> Result<()> {
    if frame.dimensions() != dims {
        bail!(
            "Frame is {}x{} but the display is {}x{}",
            frame.width(),
            frame.height(),
            dims.0,
            dims.1
        );
    }
    Ok(())
}

// --- Linux fbdev ---

const FBIOGET_VSCREENINFO: libc::c_ulong = 0x4600;
const FBIOGET_FSCREENINFO: libc::c_ulong = 0x4602;

#[repr(C)]
#[allow(dead_code)]
#[derive(Debug, Default, Clone, Copy)]
struct FbBitfield {
    offset: u32,
    length: u32,
    msb_right: u32,
}

/// `struct fb_var_screeninfo` from `<linux/fb.h>`.
#[repr(C)]
#[allow(dead_code)]
#[derive(Debug, Default, Clone, Copy)]
struct FbVarScreenInfo {
    xres: u32,
    yres: u32,
    xres_virtual: u32,
    yres_virtual: u32,
    xoffset: u32,
    yoffset: u32,
    bits_per_pixel: u32,
    grayscale: u32,
    red: FbBitfield,
    green: FbBitfield,
    blue: FbBitfield,
    transp: FbBitfield,
    nonstd: u32,
    activate: u32,
    height: u32,
    width: u32,
    accel_flags: u32,
    pixclock: u32,
    left_margin: u32,
    right_margin: u32,
    upper_margin: u32,
    lower_margin: u32,
    hsync_len: u32,
    vsync_len: u32,
    sync: u32,
    vmode: u32,
    rotate: u32,
    colorspace: u32,
    reserved: [u32; 4],
}

/// `struct fb_fix_screeninfo` from `<linux/fb.h>`.
#[repr(C)]
#[allow(dead_code)]
#[derive(Debug, Default, Clone, Copy)]
struct FbFixScreenInfo {
    id: [u8; 16],
    smem_start: libc::c_ulong,
    smem_len: u32,
    type_: u32,
    type_aux: u32,
    visual: u32,
    xpanstep: u16,
    ypanstep: u16,
    ywrapstep: u16,
    line_length: u32,
    mmio_start: libc::c_ulong,
    mmio_len: u32,
    accel: u32,
    capabilities: u16,
    reserved: [u16; 2],
}

nix::ioctl_read_bad!(fb_get_var_screeninfo, FBIOGET_VSCREENINFO, FbVarScreenInfo);
nix::ioctl_read_bad!(fb_get_fix_screeninfo, FBIOGET_FSCREENINFO, FbFixScreenInfo);

/// A memory-mapped ARGB8888 framebuffer device.
#[derive(Debug)]
pub struct FbDevice {
    _file: File,
    path: PathBuf,
    base: NonNull<libc::c_void>,
    map_len: usize,
    /// Bytes per scanline; may exceed `width * 4`.
    stride: usize,
    width: usize,
    height: usize,
}

// SAFETY: the mapping is owned exclusively by this value and only touched
// through `&mut self`.
unsafe impl Send for FbDevice {}

impl FbDevice {
    /// Maps `path`, checking that its visible mode is `dims` at 32 bpp.
    pub fn open(path: &Path, (width, height): (usize, usize)) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .with_context(|| format!("Failed to open framebuffer {}", path.display()))?;
        let fd = file.as_raw_fd();

        let mut var = FbVarScreenInfo::default();
        let mut fix = FbFixScreenInfo::default();
        // SAFETY: both structs match the kernel layout and outlive the calls.
        unsafe {
            fb_get_var_screeninfo(fd, &mut var)
                .with_context(|| format!("FBIOGET_VSCREENINFO failed on {}", path.display()))?;
            fb_get_fix_screeninfo(fd, &mut fix)
                .with_context(|| format!("FBIOGET_FSCREENINFO failed on {}", path.display()))?;
        }

        if var.xres as usize != width || var.yres as usize != height {
            bail!(
                "{} is {}x{} but the display geometry is configured as {}x{}",
                path.display(),
                var.xres,
                var.yres,
                width,
                height
            );
        }
        if var.bits_per_pixel != 32 {
            bail!(
                "{} uses {} bits per pixel; ARGB8888 (32) is required",
                path.display(),
                var.bits_per_pixel
            );
        }

        let stride = fix.line_length as usize;
        if stride < width * 4 {
            bail!(
                "{} reports a line length of {} bytes for {} pixels",
                path.display(),
                stride,
                width
            );
        }
        let map_len = NonZeroUsize::new(stride * height)
            .context("Framebuffer mapping would be empty")?;

        // SAFETY: mapping a device file we hold open; the length comes from
        // the driver's own geometry.
        let base = unsafe {
            mmap(
                None,
                map_len,
                ProtFlags::PROT_READ | ProtFlags::PROT_WRITE,
                MapFlags::MAP_SHARED,
                &file,
                0,
            )
        }
        .with_context(|| format!("Failed to mmap framebuffer {}", path.display()))?;

        log::info!(
            "FbDevice: mapped {} ({}x{}, stride {} bytes)",
            path.display(),
            width,
            height,
            stride
        );
        Ok(FbDevice {
            _file: file,
            path: path.to_path_buf(),
            base,
            map_len: map_len.get(),
            stride,
            width,
            height,
        })
    }

    fn scanline(&mut self, y: usize) -> &mut [PackedPixel] {
        debug_assert!(y < self.height);
        // SAFETY: `y < height`, the mapping spans `stride * height` bytes and
        // each scanline holds at least `width` u32s. mmap returns page-aligned
        // memory and the stride is a multiple of 4 for 32 bpp modes.
        unsafe {
            let row = self.base.as_ptr().cast::<u8>().add(y * self.stride);
            std::slice::from_raw_parts_mut(row.cast::<PackedPixel>(), self.width)
        }
    }
}

impl FrameSink for FbDevice {
    fn present(&mut self, frame: &PatternBuffer) -> Result<()> {
        check_frame(frame, (self.width, self.height))?;
        for y in 0..self.height {
            self.scanline(y).copy_from_slice(frame.row(y));
        }
        Ok(())
    }

    fn fill(&mut self, value: PackedPixel) -> Result<()> {
        for y in 0..self.height {
            self.scanline(y).fill(value);
        }
        Ok(())
    }
}

impl Drop for FbDevice {
    fn drop(&mut self) {
        // SAFETY: `base`/`map_len` came from a successful mmap and no slice
        // into the mapping outlives `&mut self`.
        if let Err(e) = unsafe { munmap(self.base, self.map_len) } {
            log::warn!("FbDevice: munmap of {} failed: {}", self.path.display(), e);
        }
    }
}

// --- Headless ---

/// Accepts frames and drops them.
#[derive(Debug)]
pub struct DiscardSink {
    dims: (usize, usize),
    frames: u64,
}

impl DiscardSink {
    pub fn new(dims: (usize, usize)) -> Self {
        log::info!(
            "DiscardSink: frames are rendered at {}x{} and dropped",
            dims.0,
            dims.1
        );
        DiscardSink { dims, frames: 0 }
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }
}

impl FrameSink for DiscardSink {
    fn present(&mut self, frame: &PatternBuffer) -> Result<()> {
        check_frame(frame, self.dims)?;
        self.frames += 1;
        log::trace!("DiscardSink: dropped frame #{}", self.frames);
        Ok(())
    }

    fn fill(&mut self, value: PackedPixel) -> Result<()> {
        log::trace!("DiscardSink: fill {:#010x}", value);
        Ok(())
    }
}

#[cfg(test)]
pub use memory::MemorySink;


#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::WHITE;
    use test_log::test;

    #[test]
    fn it_should_refuse_frames_of_the_wrong_size() {
        let mut sink = MemorySink::new((4, 2));
        sink.fill(WHITE).unwrap();
        let err = sink.present(&PatternBuffer::new(2, 2)).unwrap_err();
        assert!(err.to_string().contains("2x2"));
        // Nothing was written.
        assert!(sink.screen().pixels().iter().all(|&p| p == WHITE));
        assert_eq!(sink.presented(), 0);
    }

    #[test]
    fn it_should_blank_to_zero() {
        let mut sink = MemorySink::new((3, 3));
        sink.fill(WHITE).unwrap();
        sink.blank().unwrap();
        assert!(sink.screen().pixels().iter().all(|&p| p == BLACK));
    }

    #[test]
    fn it_should_count_discarded_frames() {
        let mut sink = DiscardSink::new((2, 2));
        sink.present(&PatternBuffer::new(2, 2)).unwrap();
        sink.present(&PatternBuffer::new(2, 2)).unwrap();
        assert!(sink.present(&PatternBuffer::new(1, 2)).is_err());
        assert_eq!(sink.frames(), 2);
    }

    #[test]
    fn it_should_fail_to_open_a_missing_device() {
        let result = FbDevice::open(Path::new("/nonexistent/fb9"), (8, 8));
        assert!(result.is_err());
    }
}
