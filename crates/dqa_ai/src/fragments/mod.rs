pub mod chunking;
pub mod store;

pub use store::{AddDocumentInput, FragmentDocument, FragmentStore};
