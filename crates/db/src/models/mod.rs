pub mod attendance;
pub mod engagement;
pub mod meeting;
pub mod user;

pub use attendance::AttendanceRecord;
pub use engagement::{Engagement, Interested};
pub use meeting::Meeting;
pub use user::{User, UserRole};
