//! Visualization Builder: pure transformations from analytic outputs to
//! serialisable chart specifications. Rendering belongs to the dashboard
//! front-end; this module only decides what each chart shows.

pub mod builders;
pub mod spec;

pub use builders::*;
pub use spec::*;
