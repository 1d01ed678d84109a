pub mod subject;
pub mod window;

pub use subject::{select_subject, SubjectFilter};
pub use window::{select_window, DateField, DateRange, Window, WindowFilter};
