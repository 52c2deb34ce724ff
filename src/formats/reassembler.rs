//! RTP -> H.26x reassembler.
//!
//! Input : a stream of classified RTP frames, arbitrarily reordered.
//! Output: complete NAL units on a FIFO delivery queue, drained with
//!         `next_frame`.
//!
//! Fragments group by RTP timestamp. Ordering across the 16-bit sequence
//! wrap uses a 32-bit reconstruction key: once the FU start fragment fixes
//! the first sequence number, any fragment numerically below it is assumed
//! post-wrap and keyed at `0x10000 + seq`, so an ordered map iteration walks
//! the fragments in true order. This holds as long as no NAL spans more than
//! 65535 fragments (~94 MB at typical MTUs).
//!
//! An intra frame in progress blocks delivery of completing inter frames
//! until it completes or is dropped, unless `NO_H26X_INTRA_DELAY` is set.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};

use byteorder::{BigEndian, ByteOrder};

use crate::config::MediaStreamConfig;
use crate::formats::codec::H26xCodec;
use crate::formats::fragment_type::{FragmentType, NalClass};
use crate::formats::{H26X_PREPEND_SC, NO_H26X_INTRA_DELAY};
use crate::log::log_sink::LogSink;
use crate::rtp::rtp_frame::RtpFrame;
use crate::rtp_error::{RecvDisposition, RtpError};
use crate::{sink_error, sink_info, sink_warn};

/// Book-keeping charge per held fragment when accounting reclaimed memory.
pub const FRAME_OVERHEAD: usize = std::mem::size_of::<RtpFrame>();

/// One access unit being reassembled, keyed by its RTP timestamp.
#[derive(Debug)]
struct FragmentedFrame {
    /// Sequence number of the FU start fragment, once seen.
    first_seq: Option<u16>,
    /// Sequence number of the FU end fragment, once seen.
    last_seq: Option<u16>,
    /// Fragments keyed for wrap-safe ordered iteration.
    fragments: BTreeMap<u32, RtpFrame>,
    /// Fragments received before the start fragment; unkeyable until then.
    pending: Vec<RtpFrame>,
    pkts_received: usize,
    /// Sum of fragment payloads, FU and payload headers excluded.
    total_payload_bytes: usize,
    /// When the first fragment arrived.
    arrival: Instant,
}

impl FragmentedFrame {
    fn new() -> Self {
        Self {
            first_seq: None,
            last_seq: None,
            fragments: BTreeMap::new(),
            pending: Vec::new(),
            pkts_received: 0,
            total_payload_bytes: 0,
            arrival: Instant::now(),
        }
    }
}

/// Reconstruction key: fragments below the start sequence wrapped.
#[inline]
fn wrap_key(first_seq: u16, seq: u16) -> u32 {
    if first_seq > seq {
        0x10000 + u32::from(seq)
    } else {
        u32::from(seq)
    }
}

/// Fragment count a complete frame must reach, wrap included.
#[inline]
fn expected_fragments(first_seq: u16, last_seq: u16) -> usize {
    if first_seq > last_seq {
        0xffff - usize::from(first_seq) + usize::from(last_seq) + 2
    } else {
        usize::from(last_seq) - usize::from(first_seq) + 1
    }
}

/// Receive-side payload engine for one stream.
pub struct Reassembler<C: H26xCodec> {
    codec: C,
    config: MediaStreamConfig,
    logger: Arc<dyn LogSink>,
    frames: HashMap<u32, FragmentedFrame>,
    /// Timestamps whose frame was dropped; late fragments never revive them.
    dropped: HashSet<u32>,
    queued: VecDeque<RtpFrame>,
    /// Timestamp of the intra frame currently being reassembled, if any.
    active_intra: Option<u32>,
    last_gc: Instant,
    reclaimed_bytes: usize,
}

impl<C: H26xCodec> Reassembler<C> {
    pub fn new(codec: C, config: MediaStreamConfig, logger: Arc<dyn LogSink>) -> Self {
        Self {
            codec,
            config,
            logger,
            frames: HashMap::new(),
            dropped: HashSet::new(),
            queued: VecDeque::new(),
            active_intra: None,
            last_gc: Instant::now(),
            reclaimed_bytes: 0,
        }
    }

    /// Feeds one received RTP frame into the reassembler.
    ///
    /// `Ready` / `MultipleReady` report frames pushed onto the delivery
    /// queue; `Pending` means the packet was absorbed into an in-progress
    /// frame (or discarded by policy, which the stream survives).
    pub fn handle_packet(
        &mut self,
        frame: RtpFrame,
        flags: u32,
    ) -> Result<RecvDisposition, RtpError> {
        let enable_idelay = flags & NO_H26X_INTRA_DELAY == 0;
        let frag_type = self.codec.fragment_type(&frame.payload);

        match frag_type {
            FragmentType::Aggregated => return self.handle_aggregation_packet(frame, flags),
            FragmentType::NotFragmented => {
                self.queued.push_back(Self::with_start_code(flags, frame));
                return Ok(RecvDisposition::Ready);
            }
            FragmentType::Invalid => {
                sink_warn!(
                    self.logger,
                    "invalid {} frame received (ts {})",
                    self.codec.name(),
                    frame.timestamp
                );
                return Err(RtpError::Generic("invalid fragment type".into()));
            }
            FragmentType::Start | FragmentType::Middle | FragmentType::End => {}
        }

        // the rest deals with fragmented frames

        let c_ts = frame.timestamp;
        let c_seq = frame.seq;
        let nal_class = self.codec.nal_class(&frame.payload);

        if !self.frames.contains_key(&c_ts) {
            if self.dropped.contains(&c_ts) {
                sink_warn!(
                    self.logger,
                    "packet belonging to a dropped frame was received (ts {c_ts})"
                );
                return Err(RtpError::Generic("fragment of a dropped frame".into()));
            }

            // a new intra replaces the one still in progress
            if nal_class == NalClass::Intra {
                if enable_idelay {
                    if let Some(old) = self.active_intra.filter(|old| *old != c_ts) {
                        sink_warn!(self.logger, "dropping old intra since a new one arrived");
                        let cleaned = self.drop_frame(old);
                        self.reclaimed_bytes += cleaned;
                    }
                }
                self.active_intra = Some(c_ts);
            }
        }

        let overhead = self.codec.payload_header_size() + self.codec.fu_header_size();
        let entry = self.frames.entry(c_ts).or_insert_with(FragmentedFrame::new);

        entry.pkts_received += 1;
        entry.total_payload_bytes += frame.payload.len().saturating_sub(overhead);

        if frag_type == FragmentType::Start {
            entry.first_seq = Some(c_seq);
            entry.fragments.insert(u32::from(c_seq), frame);

            // the start sequence orients every fragment buffered so far
            let pending = std::mem::take(&mut entry.pending);
            for fragment in pending {
                let key = wrap_key(c_seq, fragment.seq);
                entry.fragments.insert(key, fragment);
            }
        } else {
            if frag_type == FragmentType::End {
                entry.last_seq = Some(c_seq);
            }
            match entry.first_seq {
                Some(first) => {
                    entry.fragments.insert(wrap_key(first, c_seq), frame);
                }
                // position unknown until the start fragment arrives
                None => entry.pending.push(frame),
            }
        }

        let completed = match (entry.first_seq, entry.last_seq) {
            (Some(first), Some(last)) => entry.pkts_received == expected_fragments(first, last),
            _ => false,
        };

        if completed {
            // an intra is still in progress: the inter must wait, and since
            // it is already complete, waiting means dropping it
            if nal_class == NalClass::Inter && enable_idelay && self.active_intra.is_some() {
                sink_warn!(
                    self.logger,
                    "inter frame (ts {c_ts}) completed while an intra is in progress"
                );
                let cleaned = self.drop_frame(c_ts);
                self.reclaimed_bytes += cleaned;
                return Ok(RecvDisposition::Pending);
            }

            if let Some(done) = self.frames.remove(&c_ts) {
                let out = self.reconstruct(done, c_seq, c_ts, flags);
                self.queued.push_back(out);
                if nal_class == NalClass::Intra {
                    self.active_intra = None;
                }
                return Ok(RecvDisposition::Ready);
            }
        }

        let late = self
            .frames
            .get(&c_ts)
            .map(|f| f.arrival.elapsed() >= Duration::from_millis(self.config.pkt_max_delay_ms))
            .unwrap_or(false);
        if late && (nal_class != NalClass::Intra || !enable_idelay) {
            sink_warn!(self.logger, "received a packet that is too late (ts {c_ts})");
            let cleaned = self.drop_frame(c_ts);
            self.reclaimed_bytes += cleaned;
        }

        self.garbage_collect();
        Ok(RecvDisposition::Pending)
    }

    /// Pops the next complete frame off the delivery queue.
    pub fn next_frame(&mut self) -> Option<RtpFrame> {
        self.queued.pop_front()
    }

    /// Frames currently being reassembled.
    pub fn frames_in_progress(&self) -> usize {
        self.frames.len()
    }

    /// Total bytes reclaimed by dropped frames so far.
    pub fn reclaimed_bytes(&self) -> usize {
        self.reclaimed_bytes
    }

    fn with_start_code(flags: u32, mut frame: RtpFrame) -> RtpFrame {
        if flags & H26X_PREPEND_SC != 0 {
            let mut payload = Vec::with_capacity(frame.payload.len() + 4);
            payload.extend_from_slice(&[0, 0, 0, 1]);
            payload.append(&mut frame.payload);
            frame.payload = payload;
        }
        frame
    }

    /// Splits an aggregation packet into its constituents, one delivery
    /// frame each.
    fn handle_aggregation_packet(
        &mut self,
        frame: RtpFrame,
        flags: u32,
    ) -> Result<RecvDisposition, RtpError> {
        let payload = &frame.payload;
        let mut pos = self.codec.payload_header_size();

        while pos + 2 <= payload.len() {
            let nal_size = usize::from(BigEndian::read_u16(&payload[pos..pos + 2]));
            let start = pos + 2;
            if start + nal_size > payload.len() {
                sink_error!(
                    self.logger,
                    "aggregation packet claims a NAL larger than the packet"
                );
                return Err(RtpError::Generic("oversize aggregation constituent".into()));
            }

            let mut out = Vec::with_capacity(4 + nal_size);
            if flags & H26X_PREPEND_SC != 0 {
                out.extend_from_slice(&[0, 0, 0, 1]);
            }
            out.extend_from_slice(&payload[start..start + nal_size]);
            self.queued
                .push_back(RtpFrame::new(frame.seq, frame.timestamp, frame.marker, out));

            pos = start + nal_size;
        }

        Ok(RecvDisposition::MultipleReady)
    }

    /// Concatenates a complete frame's fragments, FU headers stripped, behind
    /// the reconstituted NAL header.
    fn reconstruct(&self, done: FragmentedFrame, seq: u16, timestamp: u32, flags: u32) -> RtpFrame {
        let overhead = self.codec.payload_header_size() + self.codec.fu_header_size();
        let prepend = flags & H26X_PREPEND_SC != 0;

        let mut payload = Vec::with_capacity(
            if prepend { 4 } else { 0 } + self.codec.nal_header_size() + done.total_payload_bytes,
        );
        if prepend {
            payload.extend_from_slice(&[0, 0, 0, 1]);
        }
        if let Some(first) = done.fragments.values().next() {
            payload.extend_from_slice(&self.codec.reconstruct_nal_header(&first.payload));
        }
        for fragment in done.fragments.values() {
            if fragment.payload.len() > overhead {
                payload.extend_from_slice(&fragment.payload[overhead..]);
            }
        }

        RtpFrame::new(seq, timestamp, true, payload)
    }

    /// Removes a frame, remembers its timestamp as dropped and returns the
    /// bytes reclaimed.
    fn drop_frame(&mut self, ts: u32) -> usize {
        let Some(frame) = self.frames.remove(&ts) else {
            sink_error!(self.logger, "tried to drop a non-existing frame (ts {ts})");
            return 0;
        };

        sink_info!(
            self.logger,
            "dropping frame ts {ts}, seq {:?}..{:?}, {} fragments received",
            frame.first_seq,
            frame.last_seq,
            frame.pkts_received
        );

        let mut total_cleaned = 0;
        for fragment in frame.fragments.values() {
            total_cleaned += fragment.payload.len() + FRAME_OVERHEAD;
        }
        for fragment in &frame.pending {
            total_cleaned += fragment.payload.len() + FRAME_OVERHEAD;
        }

        self.dropped.insert(ts);
        if self.active_intra == Some(ts) {
            self.active_intra = None;
        }

        total_cleaned
    }

    /// Reaps frames that stalled past the lost-frame timeout. Runs inline on
    /// receive calls, at most once per configured interval.
    fn garbage_collect(&mut self) {
        if self.last_gc.elapsed() < Duration::from_millis(self.config.gc_interval_ms) {
            return;
        }

        let timeout = Duration::from_millis(self.config.lost_frame_timeout_ms);
        let stale: Vec<u32> = self
            .frames
            .iter()
            .filter(|(_, frame)| frame.arrival.elapsed() > timeout)
            .map(|(ts, _)| *ts)
            .collect();

        let mut total_cleaned = 0;
        for ts in stale {
            sink_warn!(
                self.logger,
                "found an old frame that has not been completed (ts {ts})"
            );
            total_cleaned += self.drop_frame(ts);
        }

        if total_cleaned > 0 {
            sink_info!(self.logger, "garbage collection cleaned {total_cleaned} bytes");
            self.reclaimed_bytes += total_cleaned;
        }

        self.last_gc = Instant::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formats::h264::H264;
    use crate::log::noop_log_sink::NoopLogSink;

    const TS: u32 = 9000;

    fn reassembler() -> Reassembler<H264> {
        Reassembler::new(H264, MediaStreamConfig::default(), Arc::new(NoopLogSink))
    }

    /// FU-A fragments of an IDR whose payload is `body`, split evenly.
    fn fua_fragments(nal_header: u8, body: &[u8], pieces: usize) -> Vec<Vec<u8>> {
        let indicator = (nal_header & 0xE0) | 28;
        let ntype = nal_header & 0x1F;
        let chunk = body.len().div_ceil(pieces);
        let mut out = Vec::new();
        for (i, part) in body.chunks(chunk).enumerate() {
            let s = if i == 0 { 0x80 } else { 0 };
            let e = if (i + 1) * chunk >= body.len() { 0x40 } else { 0 };
            let mut pkt = vec![indicator, s | e | ntype];
            pkt.extend_from_slice(part);
            out.push(pkt);
        }
        out
    }

    fn frame(seq: u16, ts: u32, payload: Vec<u8>) -> RtpFrame {
        RtpFrame::new(seq, ts, false, payload)
    }

    #[test]
    fn in_order_fu_reassembly() {
        let mut r = reassembler();
        let body = [0x11, 0x22, 0x33, 0x44, 0x55, 0x66];
        let frags = fua_fragments(0x65, &body, 3);

        let mut seq = 100u16;
        for (i, f) in frags.iter().enumerate() {
            let d = r.handle_packet(frame(seq, TS, f.clone()), 0).unwrap();
            if i + 1 == frags.len() {
                assert_eq!(d, RecvDisposition::Ready);
            } else {
                assert_eq!(d, RecvDisposition::Pending);
            }
            seq = seq.wrapping_add(1);
        }

        let out = r.next_frame().expect("frame expected");
        let mut expected = vec![0x65];
        expected.extend_from_slice(&body);
        assert_eq!(out.payload, expected);
        assert_eq!(out.timestamp, TS);
        assert_eq!(r.frames_in_progress(), 0);
    }

    #[test]
    fn out_of_order_fu_reassembly() {
        let mut r = reassembler();
        let body = [1, 2, 3, 4, 5, 6];
        let frags = fua_fragments(0x65, &body, 3);

        // arrival order: end, start, middle
        r.handle_packet(frame(102, TS, frags[2].clone()), 0).unwrap();
        r.handle_packet(frame(100, TS, frags[0].clone()), 0).unwrap();
        let d = r.handle_packet(frame(101, TS, frags[1].clone()), 0).unwrap();
        assert_eq!(d, RecvDisposition::Ready);

        let out = r.next_frame().unwrap();
        let mut expected = vec![0x65];
        expected.extend_from_slice(&body);
        assert_eq!(out.payload, expected);
    }

    #[test]
    fn wrapping_sequence_numbers_reassemble_identically() {
        let body = [7u8, 8, 9, 10, 11, 12];
        let frags = fua_fragments(0x65, &body, 3);

        let mut expected = vec![0x65];
        expected.extend_from_slice(&body);

        // start at 65534 so the end fragment lands on 0
        let mut r = reassembler();
        r.handle_packet(frame(65534, TS, frags[0].clone()), 0).unwrap();
        r.handle_packet(frame(65535, TS, frags[1].clone()), 0).unwrap();
        r.handle_packet(frame(0, TS, frags[2].clone()), 0).unwrap();
        assert_eq!(r.next_frame().unwrap().payload, expected);

        // same frame, fragments arriving post-wrap first
        let mut r = reassembler();
        r.handle_packet(frame(0, TS, frags[2].clone()), 0).unwrap();
        r.handle_packet(frame(65535, TS, frags[1].clone()), 0).unwrap();
        r.handle_packet(frame(65534, TS, frags[0].clone()), 0).unwrap();
        assert_eq!(r.next_frame().unwrap().payload, expected);
    }

    #[test]
    fn single_nal_passes_through_with_start_code() {
        let mut r = reassembler();
        let d = r
            .handle_packet(frame(7, TS, vec![0x41, 9, 8, 7]), H26X_PREPEND_SC)
            .unwrap();
        assert_eq!(d, RecvDisposition::Ready);
        assert_eq!(r.next_frame().unwrap().payload, vec![0, 0, 0, 1, 0x41, 9, 8, 7]);
    }

    #[test]
    fn aggregation_packet_splits_into_constituents() {
        let mut r = reassembler();
        // STAP-A: header, then [len][nal] pairs
        let mut payload = vec![0x18];
        payload.extend_from_slice(&[0, 2, 0x67, 0xAA]);
        payload.extend_from_slice(&[0, 3, 0x68, 0xBB, 0xCC]);
        let d = r.handle_packet(frame(3, TS, payload), 0).unwrap();
        assert_eq!(d, RecvDisposition::MultipleReady);
        assert_eq!(r.next_frame().unwrap().payload, vec![0x67, 0xAA]);
        assert_eq!(r.next_frame().unwrap().payload, vec![0x68, 0xBB, 0xCC]);
        assert!(r.next_frame().is_none());
    }

    #[test]
    fn oversize_aggregation_constituent_aborts() {
        let mut r = reassembler();
        let mut payload = vec![0x18];
        payload.extend_from_slice(&[0, 2, 0x67, 0xAA]);
        payload.extend_from_slice(&[0, 200, 0x68]); // claims 200 bytes, has 1
        let err = r.handle_packet(frame(3, TS, payload), 0).unwrap_err();
        assert!(matches!(err, RtpError::Generic(_)));
        // the first constituent had already been emitted
        assert_eq!(r.next_frame().unwrap().payload, vec![0x67, 0xAA]);
        assert!(r.next_frame().is_none());
    }

    #[test]
    fn invalid_payload_is_rejected() {
        let mut r = reassembler();
        assert!(r.handle_packet(frame(1, TS, vec![]), 0).is_err());
        // type 30 is unassigned in RFC 6184
        assert!(r.handle_packet(frame(2, TS, vec![0x1E, 0]), 0).is_err());
    }

    #[test]
    fn intra_interlock_drops_completing_inter() {
        let mut r = reassembler();

        // incomplete intra at ts A: start fragment only
        let intra = fua_fragments(0x65, &[1, 2, 3, 4], 2);
        r.handle_packet(frame(10, 1000, intra[0].clone()), 0).unwrap();

        // complete inter at ts B finishes while the intra is in progress
        let inter = fua_fragments(0x41, &[5, 6, 7, 8], 2);
        r.handle_packet(frame(20, 2000, inter[0].clone()), 0).unwrap();
        let d = r.handle_packet(frame(21, 2000, inter[1].clone()), 0).unwrap();
        assert_eq!(d, RecvDisposition::Pending);
        assert!(r.next_frame().is_none());

        // late fragments of the dropped inter are rejected outright
        assert!(r
            .handle_packet(frame(21, 2000, inter[1].clone()), 0)
            .is_err());

        // the intra completes and is delivered
        let d = r.handle_packet(frame(11, 1000, intra[1].clone()), 0).unwrap();
        assert_eq!(d, RecvDisposition::Ready);
        let out = r.next_frame().unwrap();
        assert_eq!(out.payload[0], 0x65);

        // with the intra delivered, a fresh inter flows again
        let inter2 = fua_fragments(0x41, &[9, 9], 2);
        r.handle_packet(frame(30, 3000, inter2[0].clone()), 0).unwrap();
        let d = r.handle_packet(frame(31, 3000, inter2[1].clone()), 0).unwrap();
        assert_eq!(d, RecvDisposition::Ready);
    }

    #[test]
    fn interlock_disabled_lets_inter_through() {
        let mut r = reassembler();
        let intra = fua_fragments(0x65, &[1, 2, 3, 4], 2);
        r.handle_packet(frame(10, 1000, intra[0].clone()), NO_H26X_INTRA_DELAY)
            .unwrap();

        let inter = fua_fragments(0x41, &[5, 6], 2);
        r.handle_packet(frame(20, 2000, inter[0].clone()), NO_H26X_INTRA_DELAY)
            .unwrap();
        let d = r
            .handle_packet(frame(21, 2000, inter[1].clone()), NO_H26X_INTRA_DELAY)
            .unwrap();
        assert_eq!(d, RecvDisposition::Ready);
    }

    #[test]
    fn new_intra_replaces_stalled_intra() {
        let mut r = reassembler();
        let old = fua_fragments(0x65, &[1, 2, 3, 4], 2);
        r.handle_packet(frame(10, 1000, old[0].clone()), 0).unwrap();

        let new = fua_fragments(0x65, &[5, 6, 7, 8], 2);
        r.handle_packet(frame(20, 2000, new[0].clone()), 0).unwrap();

        // the old intra is gone and its timestamp is poisoned
        assert_eq!(r.frames_in_progress(), 1);
        assert!(r.handle_packet(frame(11, 1000, old[1].clone()), 0).is_err());

        // the new intra still completes
        let d = r.handle_packet(frame(21, 2000, new[1].clone()), 0).unwrap();
        assert_eq!(d, RecvDisposition::Ready);
    }

    #[test]
    fn stalled_frames_are_garbage_collected_with_byte_accounting() {
        let config = MediaStreamConfig {
            gc_interval_ms: 0,
            lost_frame_timeout_ms: 50,
            pkt_max_delay_ms: 10_000,
            ..Default::default()
        };
        let mut r = Reassembler::new(H264, config, Arc::new(NoopLogSink));

        let frags = fua_fragments(0x41, &[1, 2, 3, 4, 5, 6], 3);
        r.handle_packet(frame(10, 4000, frags[0].clone()), 0).unwrap();
        r.handle_packet(frame(11, 4000, frags[1].clone()), 0).unwrap();
        assert_eq!(r.frames_in_progress(), 1);

        let held: usize = frags[..2].iter().map(|f| f.len() + FRAME_OVERHEAD).sum();

        std::thread::sleep(Duration::from_millis(100));
        // the sweep runs after the incoming fragment has been absorbed
        let trigger = fua_fragments(0x41, &[7, 7], 2);
        r.handle_packet(frame(50, 5000, trigger[0].clone()), 0).unwrap();

        // the fresh frame survives, the stalled one was reaped
        assert_eq!(r.frames_in_progress(), 1);
        assert_eq!(r.reclaimed_bytes(), held);

        // the reaped timestamp stays poisoned
        assert!(r.handle_packet(frame(12, 4000, frags[2].clone()), 0).is_err());
    }

    #[test]
    fn late_fragment_joins_its_frame_before_the_sweep() {
        let config = MediaStreamConfig {
            gc_interval_ms: 0,
            lost_frame_timeout_ms: 50,
            pkt_max_delay_ms: 10_000,
            ..Default::default()
        };
        let mut r = Reassembler::new(H264, config, Arc::new(NoopLogSink));

        let frags = fua_fragments(0x41, &[1, 2, 3, 4, 5, 6], 3);
        r.handle_packet(frame(10, 4000, frags[0].clone()), 0).unwrap();

        std::thread::sleep(Duration::from_millis(100));

        // the frame is already past the timeout, but the fragment is still
        // absorbed into it; only then does the sweep reap the frame
        let d = r.handle_packet(frame(11, 4000, frags[1].clone()), 0).unwrap();
        assert_eq!(d, RecvDisposition::Pending);
        assert_eq!(r.frames_in_progress(), 0);

        let held: usize = frags[..2].iter().map(|f| f.len() + FRAME_OVERHEAD).sum();
        assert_eq!(r.reclaimed_bytes(), held);
    }

    #[test]
    fn expected_fragment_count_handles_wrap() {
        assert_eq!(expected_fragments(100, 102), 3);
        assert_eq!(expected_fragments(5, 5), 1);
        assert_eq!(expected_fragments(65534, 0), 3);
        assert_eq!(expected_fragments(65533, 3), 7);
    }

    #[test]
    fn wrap_key_orders_fragments() {
        assert_eq!(wrap_key(100, 101), 101);
        assert_eq!(wrap_key(65534, 1), 0x10001);
        assert!(wrap_key(65534, 65535) < wrap_key(65534, 0));
    }
}
