pub mod input_engine;
