/// All database primary keys are PostgreSQL BIGSERIAL.
pub type DbId = i64;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Logical page number within a book.
///
/// Regular pages are numbered from 0. The front and back covers use the
/// reserved values [`crate::artifacts::FRONT_COVER_PAGE_NUM`] and
/// [`crate::artifacts::BACK_COVER_PAGE_NUM`].
pub type PageNum = i32;
