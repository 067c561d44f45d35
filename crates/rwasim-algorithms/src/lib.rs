//! Routing, wavelength assignment and optical quality models for RWASim.
//!
//! This crate provides the [`RoutingAlgorithm`] and [`WavelengthAlgorithm`]
//! traits, the k-shortest-paths engine they build on, and the
//! ASE/XPM/FWM quality estimator.
//!
//! | Routing | Strategy | Reservation |
//! |---------|----------|-------------|
//! | [`ShortestPath`] | k shortest paths by hop count, cached | backward |
//! | [`Lora`] | k shortest paths under `beta^usage` edge cost | backward |
//! | [`Pabr`] | LORA paths filtered by span budget | backward |
//! | [`ImpairmentAware`] | one shortest path per free wavelength | forward |
//! | [`QualityMeasurement`] | k shortest paths under measured degradation | backward |
//! | [`AdaptiveQos`] | QM paths re-ranked by free wavelengths | backward |
//! | [`DynamicProgramming`] | label-correcting Q/length search | forward |
//! | [`AntColony`] | ACO and MAX-MIN ACO | backward |
//!
//! Wavelength strategies live in [`wavelength`].

pub mod adaptive_qos;
pub mod ant_colony;
pub mod context;
pub mod dynamic_programming;
pub mod impairment_aware;
pub mod ksp;
pub mod lora;
pub mod pabr;
pub mod quality;
pub mod quality_measurement;
pub mod shortest_path;
pub mod traits;
pub mod wavelength;

pub use adaptive_qos::AdaptiveQos;
pub use ant_colony::AntColony;
pub use context::RoutingContext;
pub use dynamic_programming::DynamicProgramming;
pub use impairment_aware::ImpairmentAware;
pub use lora::Lora;
pub use pabr::Pabr;
pub use quality::{QualityEstimator, QualityParams, XpmTable};
pub use quality_measurement::QualityMeasurement;
pub use shortest_path::ShortestPath;
pub use traits::*;
pub use wavelength::wavelength_by_kind;

/// Create a routing algorithm for a kind.
pub fn routing_by_kind(kind: RoutingKind) -> Box<dyn RoutingAlgorithm> {
    match kind {
        RoutingKind::ShortestPath => Box::new(ShortestPath::new()),
        RoutingKind::Pabr => Box::new(Pabr::new()),
        RoutingKind::Lora => Box::new(Lora::new()),
        RoutingKind::ImpairmentAware => Box::new(ImpairmentAware::new()),
        RoutingKind::QualityMeasurement => Box::new(QualityMeasurement::new()),
        RoutingKind::AdaptiveQos => Box::new(AdaptiveQos::new()),
        RoutingKind::DynamicProgramming => Box::new(DynamicProgramming::new()),
        RoutingKind::AntColony => Box::new(AntColony::new()),
        RoutingKind::MaxMinAntColony => Box::new(AntColony::max_min()),
    }
}

/// Create a routing algorithm by short or snake_case name.
pub fn routing_by_name(name: &str) -> Option<Box<dyn RoutingAlgorithm>> {
    RoutingKind::from_name(name).map(routing_by_kind)
}

/// Create a wavelength strategy by short or snake_case name.
pub fn wavelength_by_name(name: &str) -> Option<Box<dyn WavelengthAlgorithm>> {
    WavelengthKind::from_name(name).map(wavelength_by_kind)
}

/// List all routing algorithm names.
pub fn available_routing() -> Vec<&'static str> {
    RoutingKind::ALL.iter().map(|k| k.name()).collect()
}

/// List all wavelength strategy names.
pub fn available_wavelength() -> Vec<&'static str> {
    WavelengthKind::ALL.iter().map(|k| k.name()).collect()
}
