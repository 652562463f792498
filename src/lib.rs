pub mod calc;
pub mod diff;
pub mod district;
pub mod error;
pub mod gpa;
pub mod grade;
pub mod models;
pub mod page_state;
pub mod parser;
pub mod retriever;
pub mod transport;
pub mod utils;

pub use diff::{diff_class_grades, diff_courses};
pub use district::District;
pub use error::{Error, Result, TransportError};
pub use grade::{GradeValue, LetterGrade, NoGrade};
pub use models::{AttendanceEvent, GradeChange, GradeChangeKind};
pub use page_state::PageState;
pub use parser::GradeParser;
pub use retriever::{GradeRetriever, LoginOutcome, Stage};
pub use transport::{Form, Method, ReqwestTransport, Transport};
