use clap::{arg, value_parser};

pub const CLAP_STYLING: clap::builder::styling::Styles = clap::builder::styling::Styles::styled()
    .header(clap_cargo::style::HEADER)
    .usage(clap_cargo::style::USAGE)
    .literal(clap_cargo::style::LITERAL)
    .placeholder(clap_cargo::style::PLACEHOLDER)
    .error(clap_cargo::style::ERROR)
    .valid(clap_cargo::style::VALID)
    .invalid(clap_cargo::style::INVALID);

pub fn command_argument_builder() -> clap::Command {
    clap::Command::new("scout")
        .version(env!("CARGO_PKG_VERSION"))
        .bin_name("scout")
        .about(
            "Crawl a domain, report contacts found on every page, look up its registration \
            and brute-force its subdomains.",
        )
        .styles(CLAP_STYLING)
        .arg(
            arg!(-d --"domain" <DOMAIN>)
                .required(true)
                .help("Target domain without scheme, e.g. example.com"),
        )
        .arg(
            arg!(--"depth" <DEPTH>)
                .required(false)
                .help("Maximum crawl depth from the domain root")
                .value_parser(value_parser!(usize))
                .default_value("1"),
        )
        .arg(
            arg!(-t --"threads" <NUM_WORKERS>)
                .required(false)
                .help("Concurrent page fetches while crawling and building the report")
                .value_parser(value_parser!(usize))
                .default_value("10"),
        )
        .arg(
            arg!(--"subdomain-threads" <NUM_WORKERS>)
                .required(false)
                .help("Subdomain labels scanned at once")
                .value_parser(value_parser!(usize))
                .default_value("10"),
        )
        .arg(
            arg!(-w --"wordlist" <PATH>)
                .required(false)
                .help("Newline-delimited subdomain labels")
                .default_value("wordlist.txt"),
        )
        .arg(
            arg!(-o --"output" <PATH>)
                .required(false)
                .help("Report file, appended to on every run")
                .default_value("ipsocket.txt"),
        )
        .arg(
            arg!(-f --"format" <FORMAT>)
                .required(false)
                .help("Report file format: text table or JSON lines")
                .value_parser(["text", "json"])
                .default_value("text"),
        )
        .arg(
            arg!(--"deadline" <SECONDS>)
                .required(false)
                .help("Stop starting new work after this many seconds and report what was collected")
                .value_parser(value_parser!(u64)),
        )
        .arg(
            arg!(--"dedupe-overflow")
                .required(false)
                .help("Queue each over-depth URL once instead of once per referencing page")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            arg!(--"ports" <LIST>)
                .required(false)
                .help("Ports to probe on each subdomain, e.g. 22,80,443 or 8000-8010"),
        )
        .arg(
            arg!(--"no-crawl")
                .required(false)
                .help("Skip crawling and the crawl report")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            arg!(--"no-whois")
                .required(false)
                .help("Skip the registration lookup")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            arg!(--"no-subdomains")
                .required(false)
                .help("Skip subdomain enumeration")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(arg!(-q --"quiet" "Suppress banner and progress output").required(false))
        .arg(
            arg!(-v --"verbose" ...)
                .required(false)
                .help("Log verbosity on stderr (-v info, -vv debug, -vvv trace)"),
        )
}
