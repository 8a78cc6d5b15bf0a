// Notifier - user-visible responses and the audit trail.
//
// Services report what happened through these types; the Discord layer turns
// a `Response` into an embed and the infra layer decides where audit entries go.

pub mod audit;
pub mod responses;

pub use audit::*;
pub use responses::*;
