//! # spacelib - Main Entry Point
//!
//! Thin wrapper around [`lib_spacelib::init`].

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    lib_spacelib::init().await
}
