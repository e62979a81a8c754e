pub mod cart;
pub mod catalog;
pub mod enums;
pub mod money;
pub mod news;
pub mod page;
pub mod scoreboard;
pub mod search;
pub mod user;

pub use cart::*;
pub use catalog::*;
pub use enums::*;
pub use money::Money;
pub use news::*;
pub use page::{page_number, Page, PageWindow};
pub use scoreboard::*;
pub use search::*;
pub use user::*;
