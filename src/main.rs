mod app;
mod bubbles;
mod config;
mod controller;
mod element;
mod input;
mod logging;
mod render;
mod timer;

use anyhow::Result;

fn main() -> Result<()> {
    app::run()
}
