mod container;
mod flow;
mod state;
mod store;

pub use container::Wizard;
pub use flow::{ProgressReporter, Step, WizardFlow, current_step};
pub use state::{AnalysisEdit, CustomizationPatch, WizardState};
pub use store::FileStore;
