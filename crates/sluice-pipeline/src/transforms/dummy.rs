use crate::error::Result;
use crate::transform::{Flow, TransformIo, TransformLogic};

/// Passes every input row through unchanged.
#[derive(Debug, Default)]
pub struct Dummy;

impl TransformLogic for Dummy {
    fn process_row(&mut self, io: &mut TransformIo) -> Result<Flow> {
        match io.get_row()? {
            Some((meta, row)) => {
                io.put_row(&meta, row)?;
                Ok(Flow::Continue)
            }
            None => Ok(Flow::Finished),
        }
    }
}
