//! Classifier store backed by a JSON [`SoftmaxSpec`] file.
//!
//! The file is re-read on every load, so publishing a new model is a matter of
//! replacing the file and letting the weekly retrain pick it up.

use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;

use tracing::info;

use crate::domain::classifier::{Model, SoftmaxModel};
use crate::domain::error::FusetraderError;
use crate::ports::model_port::ModelStore;

pub struct JsonModelStore {
    path: PathBuf,
}

impl JsonModelStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl ModelStore for JsonModelStore {
    fn load_model(&self) -> Result<Option<Box<dyn Model>>, FusetraderError> {
        let json = match fs::read_to_string(&self.path) {
            Ok(json) => json,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(FusetraderError::ModelUnavailable {
                    reason: format!("failed to read {}: {}", self.path.display(), e),
                });
            }
        };
        let model = SoftmaxModel::from_json(&json)?;
        info!(path = %self.path.display(), features = model.features().len(), "model file loaded");
        Ok(Some(Box::new(model)))
    }
}
