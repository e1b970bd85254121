mod block_cache;
mod local_reader;
mod range_reader;
#[cfg(feature = "s3")]
mod s3_reader;

pub use block_cache::{BlockCache, DEFAULT_BLOCK_SIZE};
pub use local_reader::LocalFileReader;
pub use range_reader::{
    read_u16_be, read_u16_le, read_u32_be, read_u32_le, read_u64_be, read_u64_le, RangeReader,
};
#[cfg(feature = "s3")]
pub use s3_reader::{create_s3_client, S3RangeReader};
