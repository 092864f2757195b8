// Domain layer: models and ports. No HTTP or storage details live here.

pub mod model;
pub mod ports;
