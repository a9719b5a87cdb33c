//! Latest-wins telemetry store.
//!
//! Keeps exactly one frame per [`MediaKind`]. Every store bumps that
//! kind's sequence number, so a reader can tell whether it has already
//! seen a frame. Optionally mirrors each frame to `latest.jpg` /
//! `latest.pcm` in a directory, written to a temp file and renamed so
//! readers never see a torn file.

use core::cell::RefCell;
use std::fs;
use std::path::{Path, PathBuf};

use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use log::warn;

use crate::link::messages::MediaKind;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFrame {
    pub seq: u64,
    pub data: Vec<u8>,
}

#[derive(Default)]
struct Slot {
    seq: u64,
    frame: Option<Vec<u8>>,
}

#[derive(Default)]
struct Slots {
    video: Slot,
    audio: Slot,
}

impl Slots {
    fn get_mut(&mut self, media: MediaKind) -> &mut Slot {
        match media {
            MediaKind::Video => &mut self.video,
            MediaKind::Audio => &mut self.audio,
        }
    }
}

pub struct TelemetryStore {
    slots: Mutex<CriticalSectionRawMutex, RefCell<Slots>>,
    mirror_dir: Option<PathBuf>,
}

impl TelemetryStore {
    pub fn new(mirror_dir: Option<PathBuf>) -> Self {
        Self {
            slots: Mutex::new(RefCell::new(Slots::default())),
            mirror_dir,
        }
    }

    /// Replace the latest frame of `media`; returns its sequence number.
    pub fn store(&self, media: MediaKind, data: Vec<u8>) -> u64 {
        if let Some(dir) = &self.mirror_dir {
            if let Err(e) = mirror(dir, media, &data) {
                warn!("Relay: telemetry mirror write failed: {}", e);
            }
        }
        self.slots.lock(|s| {
            let mut s = s.borrow_mut();
            let slot = s.get_mut(media);
            slot.seq += 1;
            slot.frame = Some(data);
            slot.seq
        })
    }

    pub fn latest(&self, media: MediaKind) -> Option<StoredFrame> {
        self.slots.lock(|s| {
            let mut s = s.borrow_mut();
            let slot = s.get_mut(media);
            slot.frame.as_ref().map(|data| StoredFrame {
                seq: slot.seq,
                data: data.clone(),
            })
        })
    }
}

/// File name of the mirrored frame for `media`.
pub fn mirror_file_name(media: MediaKind) -> &'static str {
    match media {
        MediaKind::Video => "latest.jpg",
        MediaKind::Audio => "latest.pcm",
    }
}

fn mirror(dir: &Path, media: MediaKind, data: &[u8]) -> std::io::Result<()> {
    let name = mirror_file_name(media);
    let target = dir.join(name);
    let tmp = dir.join(format!(".{name}.tmp"));
    fs::write(&tmp, data)?;
    fs::rename(&tmp, &target)
}
