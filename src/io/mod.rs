//! IO module - sweep configuration, potential profile input and the result store.

mod config;
mod profile;
mod store;

pub use config::{
    read_sweep_config, AnnealConfig, FieldConfig, GeometryConfig, OutputConfig, SolverConfig, SweepConfig,
    VoltageSweep,
};
pub use profile::{load_profile_csv, PotentialProfile};
pub use store::{ResultStore, StepRecord, StoreReader, SweepMetadata};
