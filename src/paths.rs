//! Path utilities and file system helpers

use std::path::PathBuf;

use crate::error::WidgetResult;

/// Gets the application data directory
pub fn get_app_data_dir() -> WidgetResult<PathBuf> {
    dirs::data_dir()
        .map(|p| p.join("com.dockchat.widget"))
        .ok_or_else(|| {
            std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "could not find app data directory",
            )
            .into()
        })
}

/// Gets the local key-value store file path
pub fn get_store_path() -> WidgetResult<PathBuf> {
    get_app_data_dir().map(|p| p.join("widget_store.db"))
}
