pub mod frame_pool;
pub mod pcm;
pub mod slot_filler;
