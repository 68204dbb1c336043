use crate::domain::{PersistError, PositionRecord};

/// Durable home of the position record.
///
/// Read once before the first cycle, written synchronously after every
/// committed transition.
pub trait StateStore: Send {
    fn load_state(&self) -> Result<PositionRecord, PersistError>;

    fn save_state(&self, record: &PositionRecord) -> Result<(), PersistError>;
}
