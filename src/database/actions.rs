pub mod ingredients;
pub mod marks;
pub mod recipes;
pub mod tags;
pub mod users;

pub use ingredients::*;
pub use marks::*;
pub use recipes::*;
pub use tags::*;
pub use users::*;
