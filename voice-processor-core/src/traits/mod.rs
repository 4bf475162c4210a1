pub mod audio_session;
pub mod input_backend;
pub mod listener;
pub mod permissions;
