pub mod partitioner;
pub mod scanner;
pub use partitioner::{partition, NalRecord};
pub use scanner::find_start_code;
