//! Commands for the Messaging context.

use uuid::Uuid;

/// Command to start a private conversation. The acting user is always a
/// member; `participants` lists the others.
#[derive(Debug, Clone)]
pub struct StartPrivateThread {
    /// Identifier for the new private thread.
    pub private_thread_id: Uuid,
    /// Conversation subject.
    pub subject: String,
    /// Other members to include.
    pub participants: Vec<Uuid>,
}

/// Command to invite a user into a private thread.
#[derive(Debug, Clone)]
pub struct AddParticipant {
    /// The private thread.
    pub private_thread_id: Uuid,
    /// User to add.
    pub participant_id: Uuid,
}

/// Command for the acting user to leave a private thread.
#[derive(Debug, Clone)]
pub struct LeavePrivateThread {
    /// The private thread.
    pub private_thread_id: Uuid,
}

/// Command to post a message into a private thread.
#[derive(Debug, Clone)]
pub struct PostMessage {
    /// The private thread.
    pub private_thread_id: Uuid,
    /// Identifier for the new message.
    pub message_id: Uuid,
    /// Message body.
    pub body: String,
}
