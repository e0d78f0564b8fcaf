//! Stage progress events streamed to the front end.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStage {
    Importing,
    Transferring,
    Routing,
    Completed,
}

impl RunStage {
    pub fn label(self) -> &'static str {
        match self {
            RunStage::Importing => "importing input data",
            RunStage::Transferring => "running transfer models",
            RunStage::Routing => "routing loads",
            RunStage::Completed => "done",
        }
    }
}

#[derive(Debug, Clone)]
pub struct RunProgressEvent {
    pub stage: RunStage,
    pub elapsed_wall_s: f64,
    pub message: Option<String>,
}
