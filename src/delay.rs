//! Audio/video presentation delay of the first program.
//!
//! Discovery finds the AAC and MPEG-2 video PIDs of the first program. The
//! measurement pass then takes the first audio PTS and the PTS of the first
//! video PES whose payload opens with a sequence header, and reports how far
//! video lags audio.

use std::io::Read;

use log::debug;

use crate::constants::{
    MAX_AV_DELAY_TICKS, ONESEG_PID, PAT_PID, PTS_CLOCK_HZ, PTS_WRAP_THRESHOLD, SEQUENCE_START_CODE,
};
use crate::error::TsError;
use crate::packet::{PacketReader, TsPacket};
use crate::pes::{PesHandler, PesHeader, PesReassembler};
use crate::psi::{PatDecoder, PmtDecoder, PmtSection};
use crate::source::Recorder;
use crate::types::StreamType;
use crate::Result;

/// Elementary PIDs of the measured program
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AvPids {
    pub audio: u16,
    pub video: u16,
}

#[derive(Debug, Default)]
struct AvDiscovery {
    pmt_pid: Option<u16>,
    audio: Option<u16>,
    video: Option<u16>,
}

impl AvDiscovery {
    fn on_pmt(&mut self, pmt: &PmtSection) {
        if self.audio.is_none() {
            self.audio = pmt.find_stream(StreamType::AacAdts).map(|s| s.elementary_pid);
        }
        if self.video.is_none() {
            self.video = pmt.find_stream(StreamType::Mpeg2Video).map(|s| s.elementary_pid);
        }
    }

    fn pids(&self) -> Option<AvPids> {
        Some(AvPids {
            audio: self.audio?,
            video: self.video?,
        })
    }
}

/// Locate the audio and video PIDs of the first regular program.
pub fn find_av_pids<R: Read>(reader: &mut PacketReader<R>) -> Result<AvPids> {
    let mut state = AvDiscovery::default();
    let mut pat_decoder = PatDecoder::new();
    let mut pmt_decoder = PmtDecoder::new();

    loop {
        let packet = match reader.read_packet() {
            Ok(p) => p,
            Err(TsError::EndOfStream) => {
                return Err(TsError::Discovery("no AAC + MPEG-2 video program found"));
            }
            Err(e) => return Err(e),
        };

        if packet.pid == PAT_PID && state.pmt_pid.is_none() {
            pat_decoder.submit(&packet, |pat| {
                if state.pmt_pid.is_some() {
                    return;
                }
                state.pmt_pid = pat
                    .programs()
                    .find(|a| a.pid != ONESEG_PID)
                    .map(|a| a.pid);
                if let Some(pid) = state.pmt_pid {
                    debug!("delay: PMT pid {pid:#06x}");
                }
            });
        } else if Some(packet.pid) == state.pmt_pid {
            pmt_decoder.submit(&packet, |pmt| state.on_pmt(&pmt));
        }

        if let Some(pids) = state.pids() {
            debug!("delay: audio pid {:#06x}, video pid {:#06x}", pids.audio, pids.video);
            return Ok(pids);
        }
    }
}

/// First PES header on the audio PID that carries a PTS
#[derive(Debug, Default)]
struct AudioPts {
    pts: Option<u64>,
}

impl PesHandler for AudioPts {
    fn on_header(&mut self, header: &PesHeader) {
        if self.pts.is_none() {
            if let Some(pts) = header.pts {
                debug!("audio PTS {pts}");
                self.pts = Some(pts);
            }
        }
    }
}

/// PTS of the first aligned video PES whose payload starts with a sequence
/// header
#[derive(Debug, Default)]
struct VideoPts {
    pts: Option<u64>,
    header: Option<PesHeader>,
    start_code: u32,
    remaining: u8,
}

impl PesHandler for VideoPts {
    fn on_header(&mut self, header: &PesHeader) {
        if self.pts.is_some() {
            return;
        }
        self.header = Some(header.clone());
        self.start_code = 0;
        self.remaining = 4;
    }

    fn on_data(&mut self, data: &[u8]) {
        if self.pts.is_some() || self.remaining == 0 {
            return;
        }
        let Some(header) = &self.header else {
            return;
        };
        if !header.data_alignment {
            return;
        }

        for &b in data {
            self.start_code = (self.start_code << 8) | b as u32;
            self.remaining -= 1;
            if self.remaining == 0 {
                break;
            }
        }
        if self.remaining == 0 && self.start_code == SEQUENCE_START_CODE {
            if let Some(pts) = header.pts {
                debug!("video PTS {pts} (sequence header)");
                self.pts = Some(pts);
            }
        }
    }
}

/// Audio and video PTS pair found by [`find_av_pts`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AvPts {
    pub audio: u64,
    pub video: u64,
}

/// Feed the two elementary streams until both timestamps are known.
pub fn find_av_pts<R: Read>(reader: &mut PacketReader<R>, pids: AvPids) -> Result<AvPts> {
    let mut audio_pes = PesReassembler::new();
    let mut video_pes = PesReassembler::new();
    let mut audio = AudioPts::default();
    let mut video = VideoPts::default();

    loop {
        let packet: TsPacket = match reader.read_packet() {
            Ok(p) => p,
            Err(TsError::EndOfStream) => {
                return Err(TsError::Discovery("input ended before audio and video PTS were found"));
            }
            Err(e) => return Err(e),
        };

        if packet.pid == pids.audio && audio.pts.is_none() {
            audio_pes.submit(&packet, &mut audio);
        } else if packet.pid == pids.video && video.pts.is_none() {
            video_pes.submit(&packet, &mut video);
        }

        if let (Some(audio), Some(video)) = (audio.pts, video.pts) {
            return Ok(AvPts { audio, video });
        }
    }
}

/// How far video presentation lags audio
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AvDelay {
    pub audio_pts: u64,
    pub video_pts: u64,
    /// `(video - audio) mod 2^33`, in 90 kHz ticks
    pub diff_ticks: u64,
}

impl AvDelay {
    pub fn seconds(&self) -> f64 {
        self.diff_ticks as f64 / PTS_CLOCK_HZ as f64
    }
}

/// Difference in 33-bit modular arithmetic. Video ahead of audio wraps to a
/// huge value and is rejected along with genuinely large gaps.
pub fn compute_delay(pts: AvPts) -> Result<AvDelay> {
    let diff_ticks = pts.video.wrapping_sub(pts.audio) & (PTS_WRAP_THRESHOLD - 1);
    if diff_ticks > MAX_AV_DELAY_TICKS {
        return Err(TsError::SanityCheck { diff_ticks });
    }
    Ok(AvDelay {
        audio_pts: pts.audio,
        video_pts: pts.video,
        diff_ticks,
    })
}

/// Full two-pass measurement over one input
pub fn measure_delay<R: Read>(input: R) -> Result<AvDelay> {
    let mut recorder = Recorder::new(input);
    let pids = find_av_pids(&mut PacketReader::new(&mut recorder))?;
    debug!("delay: discovery read {} bytes", recorder.recorded_len());

    let pts = find_av_pts(&mut PacketReader::new(recorder.into_replay()), pids)?;
    compute_delay(pts)
}
