mod cli;

use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    let command_line_interface = cli::CommandLineInterface::load();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| match command_line_interface.verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    });
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).with_writer(std::io::stderr).init();

    command_line_interface.run()
}
