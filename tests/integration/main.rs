mod common;
mod health_test;
mod stream_test;
