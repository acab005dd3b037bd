//! Repository implementations of the core's collaborator traits.

pub mod membership_repository;
pub mod message_repository;

pub use membership_repository::MembershipRepository;
pub use message_repository::MessageRepository;
