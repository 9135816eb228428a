pub mod crawler;
pub mod error;
pub mod extract;
pub mod fetch;
pub mod ports;
pub mod resolve;
pub mod result;
pub mod subdomain;

pub use crawler::{Crawler, DepthOverflow, ProgressCallback};
pub use error::ScanError;
pub use extract::{Contacts, extract_contacts, extract_title};
pub use fetch::{FetchedPage, PageFetcher};
pub use ports::PortProber;
pub use resolve::{HostKind, HostResolver, StaticResolver, SystemResolver};
pub use result::{CrawlReport, HttpStatus, SiteMap, SubdomainRecord};
pub use subdomain::SubdomainEnumerator;
