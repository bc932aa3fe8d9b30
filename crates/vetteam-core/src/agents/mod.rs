//! The research team: three stages wired into a linear graph.
//!
//! ```text
//! researcher ──► analyst ──► strategist ──► END
//!   tool call     completion    completion
//! ```

pub mod analyst;
pub mod prompts;
pub mod researcher;
pub mod strategist;

pub use analyst::AnalystStage;
pub use researcher::{ResearcherStage, NO_DATA};
pub use strategist::StrategistStage;

pub const RESEARCHER: &str = "researcher";
pub const ANALYST: &str = "analyst";
pub const STRATEGIST: &str = "strategist";
