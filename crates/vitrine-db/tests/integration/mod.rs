pub mod common;
mod export_store_tests;
