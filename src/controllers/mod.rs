//! Model controllers: one per task, each owning one pipeline.
//!
//! Every controller follows the same lifecycle: construct (not loaded) →
//! `load` → `run` any number of times. `run` is a straight sequence:
//! check loaded → apply defaults → validate → time and invoke the pipeline →
//! persist → return the record. Every failure along the way comes back as a
//! `ControllerError` value.

mod classifier;
#[cfg(test)]
pub(crate) mod fakes;
mod text_to_image;

pub use classifier::ImageClassifierController;
pub use text_to_image::TextToImageController;

use crate::error::ControllerError;
use crate::model::{LoadInfo, ModelInfo, Task};
use serde::Serialize;

pub trait ModelController {
    type Args;
    type Output: Serialize;

    fn task(&self) -> Task;

    fn is_loaded(&self) -> bool;

    /// (Re)initialize the pipeline. A failed re-load keeps the previous one.
    fn load(&mut self) -> Result<LoadInfo, ControllerError>;

    /// Pure input check; does not touch controller state.
    fn validate_input(&self, args: &Self::Args) -> Result<(), ControllerError>;

    fn run(&mut self, args: Self::Args) -> Result<Self::Output, ControllerError>;

    fn summarize_info(&self) -> ModelInfo;
}
