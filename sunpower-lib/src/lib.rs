//! Driver for Sunpower cryocooler controllers on a serial line or TCP.

pub mod cryocooler;
pub mod port;
pub mod protocol;
pub mod report;
pub mod transport;

pub use cryocooler::{AtomicItem, Config, CryocoolerError, SunpowerCryocooler};
pub use protocol::{parse_single_value, ParsedValue, Reply};
pub use transport::{ConnectError, Media};
