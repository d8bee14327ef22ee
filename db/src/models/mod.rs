pub mod certificate;
pub mod course;
pub mod enrollment;
pub mod user;

pub use certificate::Entity as Certificate;
pub use course::Entity as Course;
pub use enrollment::Entity as Enrollment;
pub use user::Entity as User;
