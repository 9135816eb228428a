pub mod config;
pub mod crawl;
pub mod enumerate;
pub mod report;
pub mod whois;

use colored::Colorize;

const BANNER: &str = r#"
    ╔══════════════════════════════════════════════╗
    ║   ███████╗ ██████╗ ██████╗ ██╗   ██╗████████╗ ║
    ║   ██╔════╝██╔════╝██╔═══██╗██║   ██║╚══██╔══╝ ║
    ║   ███████╗██║     ██║   ██║██║   ██║   ██║    ║
    ║   ╚════██║██║     ██║   ██║██║   ██║   ██║    ║
    ║   ███████║╚██████╗╚██████╔╝╚██████╔╝   ██║    ║
    ║   ╚══════╝ ╚═════╝ ╚═════╝  ╚═════╝    ╚═╝    ║
    ╚══════════════════════════════════════════════╝"#;

pub fn print_banner() {
    println!("{}", BANNER.bright_cyan().bold());
    println!(
        "    {} {}\n",
        "domain reconnaissance".bright_white(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
    );
}
