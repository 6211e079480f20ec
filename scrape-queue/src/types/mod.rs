pub mod capabilities;
pub mod delivery;
pub mod envelope;
pub mod events;
pub mod ids;

pub use capabilities::ChannelCapabilities;
pub use delivery::{Delivery, DeliveryMode, MessageProperties, OutboundMessage, APPLICATION_JSON};
pub use envelope::Envelope;
pub use events::JobEvent;
pub use ids::{ConsumerTag, DeliveryTag};
