pub mod commands;
pub mod handlers;

pub use handlers::{
    build_config, handle_scan, init_logging, normalize_domain, parse_port_list, ScanSummary,
};
