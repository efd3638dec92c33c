use anyhow::Result;
use clap::Parser;
use tikz_render::cli::{self, Cli};

fn main() -> Result<()> {
    let cli = Cli::parse();

    // --log-level wins over DEBUG_LEVEL; RUST_LOG mirrors to stderr.
    tikz_render::debug::init_log_bridge(cli.log_level);
    log::info!("Starting tikz-render {}", tikz_render::VERSION);

    // Requests are handled cooperatively on one thread.
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    match runtime.block_on(cli::run(cli)) {
        Ok(0) => Ok(()),
        Ok(code) => std::process::exit(code),
        Err(e) => {
            log::error!("tikz-render failed: {e:#}");
            eprintln!("tikz-render: error: {e:#}");
            std::process::exit(1);
        }
    }
}
