pub mod calculator;
pub mod category;
pub mod channel;
pub mod embed;
pub mod file;
pub mod member;
pub mod message;
pub mod messageable;
pub mod permissions;
pub mod role;
pub mod server;
pub mod user;
pub mod validation;

pub use category::Category;
pub use channel::{Channel, ChannelType};
pub use embed::{Embed, SendableEmbed};
pub use file::File;
pub use member::{Member, MemberId};
pub use message::{Message, MessageAuthor, SendMessage};
pub use messageable::Messageable;
pub use permissions::{PermissionOverride, Permissions};
pub use role::Role;
pub use server::Server;
pub use user::{RelationshipType, User};
