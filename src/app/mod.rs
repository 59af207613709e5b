pub mod capture_session;
pub mod controller;
pub mod pipeline;
pub mod results;
pub mod session;
pub mod wizard;

pub use capture_session::MediaCaptureSession;
pub use controller::AppController;
pub use pipeline::{GenerationPipeline, SubmitOutcome};
pub use results::ResultRetriever;
pub use session::{Session, ViewTicket};
pub use wizard::WizardForm;
