mod controller;
pub mod driver;
mod process;

pub use controller::{AutomationConfig, Controller, Phase, Session};
pub use driver::{Key, UiDriver, WindowRef, XdotoolDriver};
pub use process::RenderProcess;
