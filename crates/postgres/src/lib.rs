#![deny(rust_2018_idioms)]
#![deny(unsafe_code)]

pub mod pool;
