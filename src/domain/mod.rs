// Domain layer: import models and the ports the core talks to.

pub mod model;
pub mod ports;
