#![allow(dead_code)]

mod ue_test;

pub use ue_test::*;
