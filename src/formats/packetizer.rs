//! H.26x -> RTP payload packetizer.
//!
//! Input  : one raw Annex-B access unit (may contain multiple NAL units).
//! Output : RTP payloads staged into a `FrameQueue` transaction; single-NAL
//!          for NALs within the payload budget, an aggregation packet where
//!          the codec supports one, FU division for oversize NALs.
//!
//! The whole access unit is one queue transaction: any enqueue failure tears
//! the transaction down and surfaces the error unchanged.

use std::sync::Arc;

use crate::config::MediaStreamConfig;
use crate::formats::codec::H26xCodec;
use crate::formats::NO_H26X_SCL;
use crate::log::log_sink::LogSink;
use crate::rtp::frame_queue::FrameQueue;
use crate::rtp_error::RtpError;
use crate::scl::partitioner::{partition, NalRecord};
use crate::sink_error;

/// NAL slices marked for the shared aggregation packet.
///
/// Process state of exactly one transaction: constructed after the
/// partitioning pass, dropped when the transaction ends, so it can never leak
/// across frames.
struct AggregationInfo<'a> {
    nals: Vec<&'a [u8]>,
}

impl<'a> AggregationInfo<'a> {
    fn new() -> Self {
        Self { nals: Vec::new() }
    }

    fn push(&mut self, nal: &'a [u8]) {
        self.nals.push(nal);
    }

    fn nals(&self) -> &[&'a [u8]] {
        &self.nals
    }
}

/// Send-side payload engine for one stream.
pub struct Packetizer<C: H26xCodec> {
    codec: C,
    payload_size: usize,
    logger: Arc<dyn LogSink>,
}

impl<C: H26xCodec> Packetizer<C> {
    pub fn new(codec: C, config: &MediaStreamConfig, logger: Arc<dyn LogSink>) -> Self {
        Self {
            codec,
            payload_size: config.payload_size,
            logger,
        }
    }

    /// Splits one access unit into RTP payloads and stages them on `queue`.
    ///
    /// With `NO_H26X_SCL` set the buffer is treated as a single NAL unit and
    /// the start code lookup is skipped. The buffer is `&mut` for the scanner
    /// (see `scl::scanner`); its contents are unchanged on return.
    pub fn push_frame(
        &self,
        queue: &mut dyn FrameQueue,
        data: &mut [u8],
        flags: u32,
    ) -> Result<(), RtpError> {
        if data.is_empty() {
            return Err(RtpError::InvalidValue);
        }

        queue.init_transaction().map_err(|e| {
            sink_error!(self.logger, "failed to initialize a frame queue transaction");
            e
        })?;

        let (nals, should_aggregate) = if flags & NO_H26X_SCL != 0 {
            let nal = NalRecord {
                offset: 0,
                prefix_len: 0,
                size: data.len(),
                aggregate: false,
            };
            (vec![nal], false)
        } else {
            partition(data, self.payload_size, self.codec.payload_header_size())
        };

        if nals.is_empty() {
            sink_error!(
                self.logger,
                "no {} NAL units found in frame, cannot send",
                self.codec.name()
            );
            queue.deinit_transaction();
            return Err(RtpError::InvalidValue);
        }

        let data = &*data;

        if should_aggregate {
            // scoped to this transaction; dropped on every exit path
            let mut aggregation = AggregationInfo::new();
            for nal in nals.iter().filter(|n| n.aggregate) {
                aggregation.push(&data[nal.offset..nal.offset + nal.size]);
            }

            let staged = match self.codec.build_aggregate(aggregation.nals()) {
                Some(payload) => queue.enqueue_message(payload),
                // no aggregation mode: the marked NALs go out one by one
                None => aggregation
                    .nals()
                    .iter()
                    .try_for_each(|nal| self.single_nal_unit(queue, nal)),
            };
            if let Err(e) = staged {
                queue.deinit_transaction();
                return Err(e);
            }
        }

        for nal in &nals {
            if nal.aggregate && should_aggregate {
                continue;
            }
            let slice = &data[nal.offset..nal.offset + nal.size];
            // a single NAL unit packet is the NAL itself, so the plain size
            // comparison against the budget is exact
            let staged = if nal.size <= self.payload_size {
                self.single_nal_unit(queue, slice)
            } else {
                self.fu_division(queue, slice)
            };
            if let Err(e) = staged {
                queue.deinit_transaction();
                return Err(e);
            }
        }

        queue.flush_queue()
    }

    fn single_nal_unit(&self, queue: &mut dyn FrameQueue, nal: &[u8]) -> Result<(), RtpError> {
        queue.enqueue_message(nal.to_vec()).map_err(|e| {
            sink_error!(self.logger, "failed to enqueue a single NAL unit packet");
            e
        })
    }

    /// Slices one oversize NAL into fragmentation units.
    ///
    /// The NAL header is not copied: it travels split across the payload and
    /// FU headers, which repeat on every fragment.
    fn fu_division(&self, queue: &mut dyn FrameQueue, nal: &[u8]) -> Result<(), RtpError> {
        if nal.len() <= self.payload_size {
            // a bug, should be caught earlier
            return Err(RtpError::Generic("FU division of an in-budget NAL".into()));
        }

        let payload_header = self.codec.fu_payload_header(nal);
        let fu_headers = self.codec.fu_headers(nal);
        let overhead = self.codec.payload_header_size() + self.codec.fu_header_size();

        let fu_payload_size = self.payload_size.saturating_sub(overhead);
        if fu_payload_size == 0 {
            return Err(RtpError::Generic(
                "payload budget smaller than the FU overhead".into(),
            ));
        }

        let mut pos = self.codec.nal_header_size();
        let mut left = nal.len() - pos;
        let mut fu_header = fu_headers[0];

        while left > fu_payload_size {
            let mut msg = Vec::with_capacity(overhead + fu_payload_size);
            msg.extend_from_slice(&payload_header);
            msg.push(fu_header);
            msg.extend_from_slice(&nal[pos..pos + fu_payload_size]);
            queue.enqueue_message(msg).map_err(|e| {
                sink_error!(self.logger, "queueing an FU packet failed");
                e
            })?;

            pos += fu_payload_size;
            left -= fu_payload_size;
            fu_header = fu_headers[1];
        }

        let mut msg = Vec::with_capacity(overhead + left);
        msg.extend_from_slice(&payload_header);
        msg.push(fu_headers[2]);
        msg.extend_from_slice(&nal[pos..]);
        queue.enqueue_message(msg).map_err(|e| {
            sink_error!(self.logger, "queueing the final FU packet failed");
            e
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formats::h264::H264;
    use crate::formats::h265::H265;
    use crate::log::noop_log_sink::NoopLogSink;
    use crate::rtp::frame_queue::VecFrameQueue;

    fn annexb(nalus: &[&[u8]]) -> Vec<u8> {
        let mut out = Vec::new();
        for n in nalus {
            out.extend_from_slice(&[0, 0, 0, 1]);
            out.extend_from_slice(n);
        }
        out
    }

    fn packetizer<C: H26xCodec>(codec: C, payload_size: usize) -> Packetizer<C> {
        let config = MediaStreamConfig {
            payload_size,
            ..Default::default()
        };
        Packetizer::new(codec, &config, Arc::new(NoopLogSink))
    }

    #[test]
    fn small_nals_go_out_as_single_packets() {
        let p = packetizer(H264, 1200);
        let mut q = VecFrameQueue::new();
        // one big-enough NAL so the pair is not aggregate-eligible twice over
        let big = vec![0x65u8; 1199];
        let mut data = annexb(&[&big, &[0x41, 9, 9]]);
        p.push_frame(&mut q, &mut data, 0).unwrap();
        assert_eq!(q.sent().len(), 2);
        assert_eq!(q.sent()[0], big);
        assert_eq!(q.sent()[1], vec![0x41, 9, 9]);
    }

    #[test]
    fn oversize_nal_is_fu_divided_and_budget_respected() {
        let payload_size = 20;
        let p = packetizer(H264, payload_size);
        let mut q = VecFrameQueue::new();
        let mut nal = vec![0x65u8];
        nal.extend((0..100u8).map(|x| x.wrapping_add(1)));
        let mut data = annexb(&[&nal]);
        p.push_frame(&mut q, &mut data, 0).unwrap();

        assert!(q.sent().len() >= 2);
        for (i, pkt) in q.sent().iter().enumerate() {
            assert!(pkt.len() <= payload_size);
            assert_eq!(pkt[0] & 0x1F, 28);
            let s = pkt[1] & 0x80 != 0;
            let e = pkt[1] & 0x40 != 0;
            assert_eq!(s, i == 0);
            assert_eq!(e, i + 1 == q.sent().len());
        }
        // fragments concatenate back to the NAL payload
        let body: Vec<u8> = q.sent().iter().flat_map(|p| p[2..].to_vec()).collect();
        assert_eq!(body, nal[1..]);
    }

    #[test]
    fn no_scl_flag_sends_buffer_as_one_nal() {
        let p = packetizer(H264, 1200);
        let mut q = VecFrameQueue::new();
        let mut data = vec![0x65, 1, 2, 3]; // no start codes anywhere
        p.push_frame(&mut q, &mut data, NO_H26X_SCL).unwrap();
        assert_eq!(q.sent(), &[vec![0x65, 1, 2, 3]]);
    }

    #[test]
    fn frame_without_nal_units_is_rejected() {
        let p = packetizer(H264, 1200);
        let mut q = VecFrameQueue::new();
        let mut data = vec![0xAA, 0xBB, 0xCC]; // no start codes
        assert_eq!(
            p.push_frame(&mut q, &mut data, 0),
            Err(RtpError::InvalidValue)
        );
        // transaction was torn down; a new one can open
        assert!(q.init_transaction().is_ok());
    }

    #[test]
    fn empty_buffer_is_rejected() {
        let p = packetizer(H264, 1200);
        let mut q = VecFrameQueue::new();
        assert_eq!(p.push_frame(&mut q, &mut [], 0), Err(RtpError::InvalidValue));
    }

    #[test]
    fn h264_aggregate_eligible_nals_fall_through_to_singles() {
        let p = packetizer(H264, 1200);
        let mut q = VecFrameQueue::new();
        let mut data = annexb(&[&[0x67, 1], &[0x68, 2], &[0x65, 3, 4]]);
        p.push_frame(&mut q, &mut data, 0).unwrap();
        assert_eq!(q.sent().len(), 3);
        assert_eq!(q.sent()[0], vec![0x67, 1]);
    }

    #[test]
    fn h265_small_nals_share_one_aggregation_packet() {
        let p = packetizer(H265, 1200);
        let mut q = VecFrameQueue::new();
        let vps: &[u8] = &[32 << 1, 1, 9];
        let sps: &[u8] = &[33 << 1, 1, 8, 8];
        let mut data = annexb(&[vps, sps]);
        p.push_frame(&mut q, &mut data, 0).unwrap();
        assert_eq!(q.sent().len(), 1);
        assert_eq!((q.sent()[0][0] >> 1) & 0x3F, 48);
    }

    #[test]
    fn enqueue_failure_rolls_the_transaction_back() {
        struct FailingQueue {
            calls: usize,
            deinits: usize,
        }
        impl FrameQueue for FailingQueue {
            fn init_transaction(&mut self) -> Result<(), RtpError> {
                Ok(())
            }
            fn enqueue_message(&mut self, _payload: Vec<u8>) -> Result<(), RtpError> {
                self.calls += 1;
                Err(RtpError::Generic("socket backpressure".into()))
            }
            fn flush_queue(&mut self) -> Result<(), RtpError> {
                Ok(())
            }
            fn deinit_transaction(&mut self) {
                self.deinits += 1;
            }
        }

        let p = packetizer(H264, 1200);
        let mut q = FailingQueue { calls: 0, deinits: 0 };
        let big = vec![0x65u8; 1199];
        let mut data = annexb(&[&big]);
        let err = p.push_frame(&mut q, &mut data, 0).unwrap_err();
        assert!(matches!(err, RtpError::Generic(_)));
        assert_eq!(q.calls, 1);
        assert_eq!(q.deinits, 1);
    }
}
