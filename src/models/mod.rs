pub mod alert;
pub mod journey;
pub mod location;
pub mod request;
pub mod user;

pub use alert::{Alert, AlertType, NewAlert};
pub use journey::{Journey, JourneyFilter, JourneyPatch, JourneyStatus, NewJourney};
pub use location::{Location, NewLocation};
pub use user::{Actor, NewUser, Role, User, UserPatch};
