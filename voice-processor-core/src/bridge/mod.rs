pub mod method_call;
