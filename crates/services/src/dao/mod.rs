pub mod attendance;
pub mod base;
pub mod engagement;
pub mod meeting;
pub mod user;

pub use attendance::AttendanceDao;
pub use base::{BaseDao, DaoError, DaoResult};
pub use engagement::EngagementDao;
pub use meeting::MeetingDao;
pub use user::UserDao;
