//! Classifier model store port trait.

use crate::domain::classifier::Model;
use crate::domain::error::FusetraderError;

pub trait ModelStore: Send + Sync {
    /// `Ok(None)` when no model has been published yet.
    fn load_model(&self) -> Result<Option<Box<dyn Model>>, FusetraderError>;

    /// Produces a fresh model. Stores that do not train in-process simply
    /// reload whatever was published last.
    fn retrain(&self) -> Result<Option<Box<dyn Model>>, FusetraderError> {
        self.load_model()
    }
}
