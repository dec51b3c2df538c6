pub(crate) mod auth;
pub(crate) mod conversations;
pub(crate) mod dashboard;
pub(crate) mod users;
