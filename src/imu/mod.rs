pub mod measurement;
pub mod preintegration;
pub mod sample;
pub mod state;

pub use measurement::PreintegratedMeasurement;
pub use preintegration::{PreintegratedState, Preintegrator};
pub use sample::{GRAVITY, GRAVITY_MAGNITUDE, ImuBias, ImuNoise, ImuSample};
pub use state::NavState;
