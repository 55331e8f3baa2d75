mod control_test;
mod engine_test;
mod support;
