pub mod frame_queue;
pub mod rtp_frame;
pub use frame_queue::{FrameQueue, VecFrameQueue};
pub use rtp_frame::RtpFrame;
