pub mod catalog;
pub mod nav;
pub mod orders;
pub mod picker;
pub mod stats;

pub use picker::ItemPicker;

use shared::error::{ApiError, ErrorCode};
use storage::Storage;

#[derive(Clone)]
pub struct ApiContext {
    pub storage: Storage,
    pub picker: ItemPicker,
}

pub(crate) fn store_error(err: anyhow::Error) -> ApiError {
    tracing::error!(%err, "store operation failed");
    ApiError::new(ErrorCode::StoreUnavailable, err.to_string())
}
