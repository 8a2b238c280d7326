pub mod aurora_like;
pub mod classic;
pub mod dynamic;
pub mod hadr;
pub mod in_memory;
pub mod remote_block_device;
pub mod socrates_like;
