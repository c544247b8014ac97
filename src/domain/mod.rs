// Domain layer: chess and device-space value types, plus the ports the
// core talks to. No I/O here.

pub mod model;
pub mod ports;
