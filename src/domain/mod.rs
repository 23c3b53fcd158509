// Domain layer: request/response/record types and the transport port.

pub mod model;
pub mod ports;
