pub mod delivery;
pub mod listeners;
pub mod voice_processor;
