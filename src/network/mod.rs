mod monitor;

pub use monitor::{probe, Connectivity, NetworkMonitor, ProbeTarget};
