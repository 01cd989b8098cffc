pub mod job;
pub mod response;
pub mod result;
pub mod upload;

pub use job::{Job, JobId, JobState, JobType};
pub use response::{ConstraintReport, JobResponse};
pub use result::{
    BatchMetadata, DecodedResult, DocumentOutline, HeadingEntry, PersonaAnalysis, RankedSection,
    SubsectionEntry,
};
pub use upload::{BatchContext, StagedInputs, UploadedItem, PDF_CONTENT_TYPE};
