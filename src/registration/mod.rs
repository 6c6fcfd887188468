//! Attendee registration
//!
//! The state machine that moves attendees between NotRegistered and
//! Registered for an event, and the cascade that cleans up waivers and
//! back-references when an attendee is removed.

mod cascade;
mod machine;

pub use cascade::{
    delete_artifacts, remove_attendee_everywhere, remove_participant, CascadeOutcome,
};
pub use machine::{RegistrationOutcome, RegistrationService, UnregistrationOutcome};
