mod console;

use clap::Parser;

fn main() -> anyhow::Result<()> {
    console::run_app(console::Args::parse())
}
