pub mod button;
pub mod name_field;
pub mod panel;

// Re-export component symbols so callers can `use crate::components::ui::Button` etc.
pub use button::*;
pub use name_field::*;
#[allow(unused_imports)]
pub use panel::*;
