//! CLV Engine: empirical customer lifetime value from history, and a
//! closed-form projected CLV under user-adjustable scenario deltas.

pub mod empirical;
pub mod scenario;

pub use empirical::{empirical_clv, CustomerClv};
pub use scenario::{
    simulate_scenario, CustomerProjection, ScenarioDeltas, ScenarioInput, ScenarioOutput,
    MAX_EFFECTIVE_RETENTION,
};
