//! ブラウザプロセスとページの管理

mod manager;
mod page;
mod profile;

pub use manager::SessionManager;
pub use page::BrowserPage;
pub use profile::prepare_profile_dir;
