use scout::commands::command_argument_builder;
use scout::handlers::{build_config, handle_scan, init_logging};
use scout_core::print_banner;
use colored::Colorize;

#[tokio::main]
async fn main() {
    let cmd = command_argument_builder();
    let matches = cmd.get_matches();
    let quiet = matches.get_flag("quiet");

    // Show banner unless --quiet flag is set
    if !quiet {
        print_banner();
    }

    init_logging(matches.get_count("verbose"));

    let config = match build_config(&matches) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{} {}", "✗".red().bold(), e);
            std::process::exit(2);
        }
    };

    if let Err(e) = handle_scan(&config).await {
        eprintln!("{} {:#}", "✗".red().bold(), e);
        std::process::exit(1);
    }
}
