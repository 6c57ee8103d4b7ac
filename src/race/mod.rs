mod policy;
mod scheduler;
mod track;

pub use policy::VisitationPolicy;
pub use scheduler::{RaceConfig, RaceScheduler, RaceState, RaceSummary, StepReport};
pub use track::Track;
