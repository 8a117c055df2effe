//! Splitting one batched response body into records.

mod demux;

pub use demux::RecordDemuxer;
