#![allow(dead_code)]

pub mod assertions;
pub mod mock_store;
pub mod model;
pub mod vectors;
