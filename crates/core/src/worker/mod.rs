//! Producer and resolver worker loops plus the shared output sink.

mod consumer;
mod producer;
mod sink;

pub use consumer::{Consumer, ConsumerError, ConsumerProgress, ConsumerReport};
pub use producer::{strip_line_terminator, Producer, ProducerError, ProducerReport};
pub use sink::{format_record, OutputSink};
