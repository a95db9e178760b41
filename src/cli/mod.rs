mod add;
mod export;
mod items;
mod remove;
mod search;
pub mod server;
mod status;

pub use add::*;
pub use export::*;
pub use items::*;
pub use remove::*;
pub use search::*;
pub use server::*;
pub use status::*;

use crate::config::Opts;

pub trait SubCommandExtend {
    fn run(&self, opts: &Opts) -> impl std::future::Future<Output = anyhow::Result<()>> + Send;
}
