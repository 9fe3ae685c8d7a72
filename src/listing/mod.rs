mod editor;
mod types;

pub use editor::ServiceEditor;
pub use types::{normalize_phone, Category, City, CurrentUser, ServiceRecord};
